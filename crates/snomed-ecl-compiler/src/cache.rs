//! LRU cache of realised query results, keyed by ECL expression text.
//!
//! Compilation walks the concept graph and the search indices, so re-running
//! the same expression (a saved reference set definition, a repeated
//! browser query) is worth memoising. The cache holds whole results rather
//! than sub-expression fragments — simpler, and the dominant cost in this
//! compiler is graph traversal per focus concept, not parsing.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::compiler;
use crate::context::CompilationContext;
use crate::error::CompileResult;
use crate::query::ConceptSet;

const DEFAULT_CAPACITY: usize = 256;

/// Compiles ECL expression text, caching realised results by their exact
/// source text.
pub struct EclCompiler {
    cache: Mutex<LruCache<String, ConceptSet>>,
}

impl EclCompiler {
    /// Builds a compiler with the default cache capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Builds a compiler whose cache holds at most `capacity` results.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self { cache: Mutex::new(LruCache::new(capacity)) }
    }

    /// Parses and compiles `ecl`, returning a cached result if this exact
    /// text was compiled before.
    pub fn compile(&self, ecl: &str, ctx: &CompilationContext<'_>) -> CompileResult<ConceptSet> {
        if let Some(cached) = self.cache.lock().get(ecl) {
            return Ok(cached.clone());
        }

        let expression = snomed_ecl::parse(ecl)?;
        let result = compiler::compile(&expression, ctx)?;

        self.cache.lock().put(ecl.to_string(), result.clone());
        Ok(result)
    }

    /// Drops every cached result, e.g. after the store has been reloaded
    /// with a new RF2 release.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

impl Default for EclCompiler {
    fn default() -> Self {
        Self::new()
    }
}
