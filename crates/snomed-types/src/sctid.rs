//! SNOMED CT Identifier (SCTID) type.
//!
//! This module provides a type alias for SNOMED CT identifiers (SCTIDs).
//! SCTIDs are modelled as signed 64-bit integers, matching the on-disk key
//! encoding used by `snomed-store` (fixed-width big-endian tuples of signed
//! longs). Real SCTIDs are always positive and well within `i64::MAX`, so
//! this is a lossless, ordering-preserving representation.

/// A SNOMED CT identifier (SCTID).
///
/// SCTIDs uniquely identify components within SNOMED CT. They follow a
/// specific structure with check digits; the penultimate two digits encode
/// the component's partition (concept/description/relationship).
///
/// # Examples
///
/// ```
/// use snomed_types::SctId;
///
/// let concept_id: SctId = 73211009; // Diabetes mellitus
/// let is_a_type: SctId = 116680003; // IS_A relationship type
/// ```
pub type SctId = i64;
