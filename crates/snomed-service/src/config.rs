//! Server configuration: a `StoreConfig`/language-priority pair,
//! deserializable via `serde` and overridable from the environment
//! following the teacher's `SNOMED_DATA_PATH`/`SNOMED_PORT` convention.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use snomed_store::StoreConfig;

const DEFAULT_PORT: u16 = 50051;
const DEFAULT_DATA_PATH: &str = "./data/release";
const DEFAULT_CORE_DB_PATH: &str = "core.db";
const DEFAULT_REFSETS_DB_PATH: &str = "refsets.db";
const DEFAULT_MAP_SIZE_BYTES: u64 = 5 * 1024 * 1024 * 1024;
const DEFAULT_LANGUAGE_PRIORITY: &str = "en-GB;en-US";

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port the gRPC server listens on.
    pub port: u16,
    /// Path to an RF2 release directory to import on startup if the
    /// component store is empty.
    pub data_path: PathBuf,
    /// Directory holding the `concepts`/relationships database.
    pub core_db_path: PathBuf,
    /// Directory holding the `refsetItems`/membership database.
    pub refsets_db_path: PathBuf,
    /// Opens the store read-only; import is skipped.
    pub read_only: bool,
    /// Bypasses the store's checksum check on open.
    pub skip_check: bool,
    /// RocksDB write-buffer budget, in bytes.
    pub map_size_bytes: u64,
    /// BCP-47 language priority list for preferred-term resolution
    /// (semicolon-separated, most preferred first).
    pub language_priority_list: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            core_db_path: PathBuf::from(DEFAULT_CORE_DB_PATH),
            refsets_db_path: PathBuf::from(DEFAULT_REFSETS_DB_PATH),
            read_only: false,
            skip_check: false,
            map_size_bytes: DEFAULT_MAP_SIZE_BYTES,
            language_priority_list: DEFAULT_LANGUAGE_PRIORITY.to_string(),
        }
    }
}

impl ServerConfig {
    /// Builds a config from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_parsed("SNOMED_PORT").unwrap_or(defaults.port),
            data_path: env_path("SNOMED_DATA_PATH").unwrap_or(defaults.data_path),
            core_db_path: env_path("SNOMED_CORE_DB_PATH").unwrap_or(defaults.core_db_path),
            refsets_db_path: env_path("SNOMED_REFSETS_DB_PATH").unwrap_or(defaults.refsets_db_path),
            read_only: env_parsed("SNOMED_READ_ONLY").unwrap_or(defaults.read_only),
            skip_check: env_parsed("SNOMED_SKIP_CHECK").unwrap_or(defaults.skip_check),
            map_size_bytes: env_parsed("SNOMED_MAP_SIZE_BYTES").unwrap_or(defaults.map_size_bytes),
            language_priority_list: std::env::var("SNOMED_LANGUAGE_PRIORITY")
                .unwrap_or(defaults.language_priority_list),
        }
    }

    /// The `snomed-store` configuration this server config implies.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            core_db_path: self.core_db_path.clone(),
            refsets_db_path: self.refsets_db_path.clone(),
            read_only: self.read_only,
            map_size_bytes: self.map_size_bytes,
            skip_check: self.skip_check,
        }
    }

    /// The language priority list split into an ordered list of BCP-47
    /// tags, most preferred first.
    pub fn language_priority_tags(&self) -> Vec<String> {
        self.language_priority_list.split(';').map(|tag| tag.trim().to_string()).filter(|tag| !tag.is_empty()).collect()
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name).ok().map(PathBuf::from)
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|value| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(!config.read_only);
        assert_eq!(config.map_size_bytes, DEFAULT_MAP_SIZE_BYTES);
    }

    #[test]
    fn language_priority_tags_splits_and_trims() {
        let config = ServerConfig { language_priority_list: "en-GB; en-US ;fr".to_string(), ..Default::default() };
        assert_eq!(config.language_priority_tags(), vec!["en-GB", "en-US", "fr"]);
    }
}
