//! Error types for the description and member indices.

use thiserror::Error;

/// Errors raised while building or querying a search index.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The underlying tantivy index failed to open, write, or commit.
    #[error("index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    /// A query string could not be parsed into a tantivy query.
    #[error("invalid query '{query}': {message}")]
    InvalidQuery {
        /// The offending query text.
        query: String,
        /// What went wrong.
        message: String,
    },

    /// A wildcard term filter started with `*`, which the index forbids
    /// because it forces a full index scan.
    #[error("wildcard term filter cannot start with '*': {0}")]
    LeadingWildcard(String),
}

/// Result type for search index operations.
pub type SearchResult<T> = std::result::Result<T, SearchError>;
