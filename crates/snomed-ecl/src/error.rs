//! Error types for ECL parsing.

use thiserror::Error;

/// Errors that can occur while parsing an ECL expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EclError {
    /// The parser stopped at a specific byte offset in the input.
    #[error("parse error at position {position}: {message}")]
    Syntax {
        /// Byte offset into the original input where parsing failed.
        position: usize,
        /// Short description of what was expected.
        message: String,
    },

    /// The expression ended before a construct was closed (missing `)`,
    /// `}}`, `|`, etc).
    #[error("unexpected end of ECL expression: {0}")]
    UnexpectedEnd(String),

    /// The caller passed an empty or whitespace-only string.
    #[error("empty ECL expression")]
    Empty,
}

/// Result type for ECL parsing.
pub type EclResult<T> = std::result::Result<T, EclError>;
