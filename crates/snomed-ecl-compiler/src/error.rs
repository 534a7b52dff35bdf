//! Error types for ECL compilation.

use thiserror::Error;

/// Errors raised while compiling a parsed ECL expression into a realised
/// concept-id set.
#[derive(Error, Debug)]
pub enum CompileError {
    /// The expression text failed to parse.
    #[error("ECL parse error: {0}")]
    Parse(#[from] snomed_ecl::EclError),

    /// A construct is syntactically valid ECL but this compiler does not
    /// evaluate it (e.g. a `[card]+reverse` attribute, or a concrete value
    /// used outside an attribute refinement).
    #[error("unsupported ECL construct: {0}")]
    Unsupported(String),

    /// A member filter used a comparator other than `=`/`!=`, which the
    /// refset column predicate evaluator doesn't support.
    #[error("unsupported member filter: {0}")]
    UnsupportedMemberFilter(String),

    /// The component store returned an error while the compiler was
    /// realising a query.
    #[error("store error: {0}")]
    Store(#[from] snomed_store::StoreError),

    /// The description or member search index returned an error.
    #[error("search error: {0}")]
    Search(#[from] snomed_search::SearchError),
}

/// Result type for ECL compilation.
pub type CompileResult<T> = std::result::Result<T, CompileError>;
