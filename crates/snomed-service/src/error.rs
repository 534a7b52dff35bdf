//! Errors surfaced by the service layer, translated to gRPC [`tonic::Status`]
//! at the RPC boundary.

use thiserror::Error;

/// Errors raised while loading a release, building search indices, or
/// serving a request.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// I/O error while building an on-disk index.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The component store returned an error.
    #[error("store error: {0}")]
    Store(#[from] snomed_store::StoreError),

    /// The description or member search index returned an error.
    #[error("search error: {0}")]
    Search(#[from] snomed_search::SearchError),

    /// RF2 discovery or parsing failed during import.
    #[error("loader error: {0}")]
    Loader(#[from] snomed_loader::Rf2Error),

    /// ECL compilation failed.
    #[error("ECL compile error: {0}")]
    Compile(#[from] snomed_ecl_compiler::CompileError),
}

/// Result type for service-layer operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

impl From<ServiceError> for tonic::Status {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Compile(snomed_ecl_compiler::CompileError::Parse(_)) => {
                tonic::Status::invalid_argument(error.to_string())
            }
            ServiceError::Compile(snomed_ecl_compiler::CompileError::Unsupported(_))
            | ServiceError::Compile(snomed_ecl_compiler::CompileError::UnsupportedMemberFilter(_)) => {
                tonic::Status::unimplemented(error.to_string())
            }
            _ => tonic::Status::internal(error.to_string()),
        }
    }
}
