//! The realised result of compiling an ECL expression: a set of concept ids.
//!
//! Every compiled construct in [`crate::compiler`] is evaluated eagerly
//! against `snomed-store`/`snomed-search` and folded into one of these sets
//! rather than building a lazy, composable query object — the store and
//! search indices already do the expensive work (graph traversal, full-text
//! matching) behind a single call, so there is no deferred cost left to
//! amortise by keeping the tree unevaluated.

use roaring::RoaringTreemap;
use snomed_types::SctId;

/// A set of concept ids, backed by a compressed bitmap so that
/// hierarchy-sized intermediate results (tens of thousands of ids) stay
/// cheap to union, intersect, and subtract.
#[derive(Debug, Clone, Default)]
pub struct ConceptSet(RoaringTreemap);

impl ConceptSet {
    /// The empty set.
    pub fn new() -> Self {
        Self(RoaringTreemap::new())
    }

    /// Builds a set from an iterator of concept ids.
    pub fn from_ids(ids: impl IntoIterator<Item = SctId>) -> Self {
        let mut set = RoaringTreemap::new();
        for id in ids {
            set.insert(to_u64(id));
        }
        Self(set)
    }

    /// A set containing a single concept id.
    pub fn singleton(id: SctId) -> Self {
        Self::from_ids([id])
    }

    /// Number of concept ids in the set.
    pub fn len(&self) -> u64 {
        self.0.len()
    }

    /// Whether the set has no members.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `id` is a member of the set.
    pub fn contains(&self, id: SctId) -> bool {
        self.0.contains(to_u64(id))
    }

    /// `self ∪ other`.
    pub fn union(&self, other: &Self) -> Self {
        Self(&self.0 | &other.0)
    }

    /// `self ∩ other`.
    pub fn intersection(&self, other: &Self) -> Self {
        Self(&self.0 & &other.0)
    }

    /// `self \ other`.
    pub fn difference(&self, other: &Self) -> Self {
        Self(&self.0 - &other.0)
    }

    /// Folds `self ∪ other` in place.
    pub fn extend(&mut self, other: &Self) {
        self.0 |= &other.0;
    }

    /// Iterates the set's concept ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = SctId> + '_ {
        self.0.iter().map(from_u64)
    }

    /// Collects the set into a sorted `Vec`.
    pub fn into_vec(self) -> Vec<SctId> {
        self.0.into_iter().map(from_u64).collect()
    }
}

impl FromIterator<SctId> for ConceptSet {
    fn from_iter<T: IntoIterator<Item = SctId>>(iter: T) -> Self {
        Self::from_ids(iter)
    }
}

fn to_u64(id: SctId) -> u64 {
    id as u64
}

fn from_u64(value: u64) -> SctId {
    value as SctId
}
