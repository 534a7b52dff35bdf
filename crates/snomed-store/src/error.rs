//! Error types for the persistent component store.

use thiserror::Error;

/// Errors raised by the component store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying RocksDB operation failed.
    #[error("storage engine error: {0}")]
    Engine(#[from] rocksdb::Error),

    /// A stored record could not be decoded.
    #[error("corrupt record at key {key:?}: {source}")]
    Decode {
        /// The raw key whose value failed to decode.
        key: Vec<u8>,
        /// The underlying bincode error.
        #[source]
        source: bincode::Error,
    },

    /// A record could not be serialised for storage.
    #[error("failed to encode record: {0}")]
    Encode(#[source] bincode::Error),

    /// The on-disk database failed its checksum check on open.
    #[error("checksum mismatch opening database at {path}: expected {expected}, found {found}")]
    ChecksumMismatch {
        /// Path to the database directory.
        path: String,
        /// Checksum recorded at last clean close.
        expected: String,
        /// Checksum computed on this open.
        found: String,
    },

    /// A write could not be durably committed after exhausting retries.
    #[error("write to column family {column_family} did not succeed after {attempts} attempts")]
    RetryExhausted {
        /// The column family being written to.
        column_family: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// A column family handle was requested that does not exist.
    #[error("unknown column family: {0}")]
    UnknownColumnFamily(String),

    /// Compaction could not complete.
    #[error("compaction failed: {0}")]
    Compaction(String),

    /// Filesystem I/O error outside of RocksDB itself (checksum files,
    /// atomic rename during compaction).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
