//! SNOMED CT gRPC server binary.

use snomed_loader::{import_release, Rf2Config};
use snomed_service::proto::{
    concept_service_server::ConceptServiceServer, ecl_service_server::EclServiceServer,
    refset_service_server::RefsetServiceServer, search_service_server::SearchServiceServer,
};
use snomed_service::{ServerConfig, SnomedServer};
use snomed_store::Store;
use tonic::transport::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(core_db = %config.core_db_path.display(), refsets_db = %config.refsets_db_path.display(), "opening component store");
    let store = Store::open(config.store_config())?;

    let is_empty = store.all_concept_ids(false)?.is_empty();
    if is_empty && !config.read_only {
        tracing::info!(data_path = %config.data_path.display(), "store is empty, importing RF2 release");
        let stats = import_release(&config.data_path, &store, &Rf2Config::default())?;
        tracing::info!(
            written = stats.written,
            unchanged = stats.unchanged,
            parse_errors = stats.parse_errors,
            write_errors = stats.write_errors,
            "import complete"
        );
    } else if is_empty {
        tracing::warn!("store is empty and read_only is set; serving an empty terminology");
    }

    tracing::info!("building full-text and member indices");
    let (descriptions, members) = snomed_service::build_in_ram(&store)?;

    let server = SnomedServer::new(store, descriptions, members, &config);

    let addr = format!("[::]:{}", config.port).parse()?;
    tracing::info!(%addr, "starting SNOMED CT gRPC server");
    tracing::info!("services available: ConceptService, SearchService, EclService, RefsetService");

    Server::builder()
        .add_service(ConceptServiceServer::new(server.clone()))
        .add_service(SearchServiceServer::new(server.clone()))
        .add_service(EclServiceServer::new(server.clone()))
        .add_service(RefsetServiceServer::new(server))
        .serve(addr)
        .await?;

    Ok(())
}
