//! Compiles parsed ECL expressions into realised concept-id sets.
//!
//! `snomed-ecl` only parses ECL text into an AST; this crate evaluates that
//! AST against a running system — the persistent graph in `snomed-store`
//! plus the full-text and member indices in `snomed-search` — and returns
//! the set of concept ids the expression denotes.
//!
//! ```ignore
//! use snomed_ecl_compiler::{CompilationContext, EclCompiler};
//!
//! let ctx = CompilationContext::new(&store, &descriptions, &members);
//! let compiler = EclCompiler::new();
//! let result = compiler.compile("<< 73211009 |Diabetes mellitus|", &ctx)?;
//! ```

#![warn(missing_docs)]

mod cache;
mod compiler;
mod context;
mod error;
mod query;

pub use cache::EclCompiler;
pub use compiler::compile;
pub use context::CompilationContext;
pub use error::{CompileError, CompileResult};
pub use query::ConceptSet;
