//! BCP-47 language tag to language-reference-set-id mapping.
//!
//! Pure lookup table, no index access, so preferred-term resolution and
//! index building can share it without a `Store` or `DescriptionIndex` in
//! scope.

use snomed_types::SctId;

/// The UK English language reference set (`999001261000000100`).
pub const GB_ENGLISH_REFSET: SctId = 999001261000000100;
/// The US English language reference set (`900000000000509007`).
pub const US_ENGLISH_REFSET: SctId = 900000000000509007;
/// The international core synonym "reference set", used as a fallback when
/// no dialect-specific refset matches.
pub const INTERNATIONAL_SYNONYM_REFSET: SctId = 900000000000508004;

/// Returns the ordered list of language reference set ids that should be
/// consulted, most-preferred first, for a BCP-47 language tag such as
/// `en-GB` or `en-US`.
///
/// Unrecognised tags and bare language subtags (`en`) fall back to the
/// international synonym reference set so callers always get at least one
/// candidate refset.
pub fn refset_ids_for_tag(tag: &str) -> Vec<SctId> {
    match tag.to_ascii_lowercase().as_str() {
        "en-gb" | "en_gb" => vec![GB_ENGLISH_REFSET, INTERNATIONAL_SYNONYM_REFSET],
        "en-us" | "en_us" => vec![US_ENGLISH_REFSET, INTERNATIONAL_SYNONYM_REFSET],
        _ => vec![INTERNATIONAL_SYNONYM_REFSET],
    }
}
