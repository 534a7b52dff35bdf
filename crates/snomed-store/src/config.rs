//! Store configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for opening a [`crate::Store`].
///
/// Deserialisable from the environment via [`StoreConfig::from_env`]:
/// `SNOMED_CORE_DB_PATH`, `SNOMED_REFSETS_DB_PATH`, `SNOMED_READ_ONLY`,
/// `SNOMED_MAP_SIZE_BYTES`, `SNOMED_SKIP_CHECKSUM`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the `concepts`/`relationships`/indices database.
    pub core_db_path: PathBuf,
    /// Directory holding the `refsetItems`/membership indices database.
    pub refsets_db_path: PathBuf,
    /// Opens both databases read-only; write operations return an error.
    pub read_only: bool,
    /// RocksDB write-buffer budget, in bytes.
    pub map_size_bytes: u64,
    /// Bypasses the checksum check normally performed on open.
    pub skip_check: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            core_db_path: PathBuf::from("core.db"),
            refsets_db_path: PathBuf::from("refsets.db"),
            read_only: false,
            map_size_bytes: 2 * 1024 * 1024 * 1024,
            skip_check: false,
        }
    }
}

impl StoreConfig {
    /// Builds a configuration from `SNOMED_*` environment variables,
    /// falling back to [`StoreConfig::default`] for any variable that is
    /// unset or fails to parse.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            core_db_path: std::env::var("SNOMED_CORE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.core_db_path),
            refsets_db_path: std::env::var("SNOMED_REFSETS_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.refsets_db_path),
            read_only: std::env::var("SNOMED_READ_ONLY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.read_only),
            map_size_bytes: std::env::var("SNOMED_MAP_SIZE_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.map_size_bytes),
            skip_check: std::env::var("SNOMED_SKIP_CHECKSUM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.skip_check),
        }
    }
}
