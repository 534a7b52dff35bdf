//! Persistent component store for SNOMED CT terminology data.
//!
//! Two RocksDB-backed databases hold the graph: `core.db` for concepts,
//! descriptions, relationships, concrete values, and the graph indices
//! derived from them; `refsets.db` for reference set members and their
//! membership/association indices. Keys are fixed-width big-endian tuples
//! (see [`key`]) so a byte-wise range scan is a numeric range scan.

pub mod checksum;
pub mod config;
pub mod error;
pub mod key;
mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use store::{Store, MAX_WRITE_ATTEMPTS};
