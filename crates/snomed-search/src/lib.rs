//! Full-text description index and refset member index for SNOMED CT.
//!
//! Hierarchy and graph queries (`descendantOf`, `parentRelationships`, ...)
//! live in `snomed-store`, which owns the concept graph. This crate answers
//! the two query families the component store can't: free-text term search
//! over descriptions, and column predicates over reference set members.

#![warn(missing_docs)]

mod collector;
pub mod description;
pub mod error;
pub mod locale;
pub mod member;

pub use description::{DescriptionDoc, DescriptionIndex, DescriptionQuery, MatchMode};
pub use error::{SearchError, SearchResult};
pub use member::{FieldComparison, FieldValue, MemberDoc, MemberIndex, TextPredicate};
