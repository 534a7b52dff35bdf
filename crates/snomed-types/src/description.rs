//! The RF2 Description row (`sct2_Description_*.txt`): a term attached to a
//! concept in a given language, with a type (FSN/Synonym/Definition) and
//! case-sensitivity rule.

use crate::SctId;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rf2Description {
    pub id: SctId,
    pub effective_time: u32,
    pub active: bool,
    pub module_id: SctId,
    /// The concept this description names.
    pub concept_id: SctId,
    /// ISO 639-1 code, e.g. `"en"`.
    pub language_code: String,
    /// FSN / Synonym / Definition, as a type-description concept SCTID.
    pub type_id: SctId,
    pub term: String,
    pub case_significance_id: SctId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description(type_id: SctId, language_code: &str) -> Rf2Description {
        Rf2Description {
            id: 754786011,
            effective_time: 20020131,
            active: true,
            module_id: 900000000000207008,
            concept_id: 73211009,
            language_code: language_code.to_string(),
            type_id,
            term: "Diabetes mellitus (disorder)".to_string(),
            case_significance_id: 900000000000448009,
        }
    }

    #[test]
    fn carries_the_fields_a_loader_reads_back() {
        let fsn = description(900000000000003001, "en");
        assert_eq!(fsn.concept_id, 73211009);
        assert_eq!(fsn.language_code, "en");
        assert_eq!(fsn.term, "Diabetes mellitus (disorder)");
    }
}
