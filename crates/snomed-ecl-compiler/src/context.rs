//! The three collaborators a compiled ECL query is evaluated against.

use snomed_search::{DescriptionIndex, MemberIndex};
use snomed_store::Store;

/// Bundles the component store and the two search indices a compilation
/// needs. Borrowed for the lifetime of a single `compile` call; callers
/// that serve many queries keep one store and one pair of indices open
/// and build a fresh context per request.
#[derive(Clone, Copy)]
pub struct CompilationContext<'a> {
    /// The persistent component store, source of the concept graph,
    /// concrete values, and reference set membership.
    pub store: &'a Store,
    /// Full-text index over descriptions.
    pub descriptions: &'a DescriptionIndex,
    /// Index over reference set members.
    pub members: &'a MemberIndex,
}

impl<'a> CompilationContext<'a> {
    /// Builds a context from its three collaborators.
    pub fn new(store: &'a Store, descriptions: &'a DescriptionIndex, members: &'a MemberIndex) -> Self {
        Self { store, descriptions, members }
    }
}
