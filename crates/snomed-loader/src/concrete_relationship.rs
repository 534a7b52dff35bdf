//! Reads `sct2_RelationshipConcreteValues_*.txt` rows — relationships whose
//! destination is a literal value rather than another concept — into
//! [`Rf2ConcreteRelationship`].

use csv::StringRecord;
use snomed_types::{ConcreteValue, Rf2ConcreteRelationship};

use crate::parser::{parse, Rf2Record};
use crate::types::{Rf2Config, Rf2Error, Rf2Result};

const CONCRETE_RELATIONSHIP_COLUMNS: &[&str] = &[
    "id",
    "effectiveTime",
    "active",
    "moduleId",
    "sourceId",
    "value",
    "relationshipGroup",
    "typeId",
    "characteristicTypeId",
    "modifierId",
];

impl Rf2Record for Rf2ConcreteRelationship {
    const EXPECTED_COLUMNS: &'static [&'static str] = CONCRETE_RELATIONSHIP_COLUMNS;

    fn from_record(record: &StringRecord) -> Rf2Result<Self> {
        let value_str = record.get(5).unwrap_or("");
        let value = ConcreteValue::parse(value_str).ok_or_else(|| Rf2Error::Parse(format!("invalid concrete value: {value_str}")))?;

        Ok(Rf2ConcreteRelationship {
            id: parse::sctid(record.get(0).unwrap_or(""))?,
            effective_time: parse::effective_time(record.get(1).unwrap_or(""))?,
            active: parse::boolean(record.get(2).unwrap_or(""))?,
            module_id: parse::sctid(record.get(3).unwrap_or(""))?,
            source_id: parse::sctid(record.get(4).unwrap_or(""))?,
            value,
            relationship_group: parse::integer(record.get(6).unwrap_or(""))?,
            type_id: parse::sctid(record.get(7).unwrap_or(""))?,
            characteristic_type_id: parse::sctid(record.get(8).unwrap_or(""))?,
            modifier_id: parse::sctid(record.get(9).unwrap_or(""))?,
        })
    }

    fn passes_filter(&self, config: &Rf2Config) -> bool {
        !(config.active_only && !self.active)
    }
}

/// Narrows a concrete relationship stream beyond `active`/inactive: by
/// relationship type and by stated/inferred characteristic.
#[derive(Debug, Clone)]
pub struct ConcreteRelationshipConfig {
    pub base: Rf2Config,
    pub type_ids: Vec<snomed_types::SctId>,
    pub inferred_only: bool,
    pub stated_only: bool,
}

impl Default for ConcreteRelationshipConfig {
    fn default() -> Self {
        Self { base: Rf2Config::default(), type_ids: vec![], inferred_only: false, stated_only: false }
    }
}

impl ConcreteRelationshipConfig {
    pub fn inferred_only() -> Self {
        Self { inferred_only: true, ..Default::default() }
    }

    pub fn stated_only() -> Self {
        Self { stated_only: true, ..Default::default() }
    }
}

pub trait ConcreteRelationshipFilter {
    fn passes_concrete_filter(&self, config: &ConcreteRelationshipConfig) -> bool;
}

impl ConcreteRelationshipFilter for Rf2ConcreteRelationship {
    fn passes_concrete_filter(&self, config: &ConcreteRelationshipConfig) -> bool {
        if !self.passes_filter(&config.base) {
            return false;
        }
        if !config.type_ids.is_empty() && !config.type_ids.contains(&self.type_id) {
            return false;
        }
        if config.inferred_only && !self.is_inferred() {
            return false;
        }
        if config.stated_only && !self.is_stated() {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(fields: &[&str]) -> StringRecord {
        let mut record = StringRecord::new();
        for field in fields {
            record.push_field(field);
        }
        record
    }

    #[test]
    fn parses_an_integer_value() {
        let record = make_record(&[
            "12345678901234",
            "20230101",
            "1",
            "900000000000207008",
            "322236009",
            "#500",
            "1",
            "1142135004",
            "900000000000011006",
            "900000000000451002",
        ]);

        let rel = Rf2ConcreteRelationship::from_record(&record).unwrap();
        assert_eq!(rel.source_id, 322236009);
        assert!(matches!(rel.value, ConcreteValue::Integer(500)));
        assert_eq!(rel.value.as_integer(), Some(500));
        assert!(rel.is_inferred());
    }

    #[test]
    fn parses_a_decimal_value() {
        let record = make_record(&[
            "12345678901234",
            "20230101",
            "1",
            "900000000000207008",
            "322236009",
            "#0.5",
            "1",
            "1142135004",
            "900000000000011006",
            "900000000000451002",
        ]);

        let rel = Rf2ConcreteRelationship::from_record(&record).unwrap();
        assert_eq!(rel.value.as_decimal(), Some(0.5));
    }

    #[test]
    fn parses_a_string_value() {
        let record = make_record(&[
            "12345678901234",
            "20230101",
            "1",
            "900000000000207008",
            "322236009",
            "\"tablet\"",
            "1",
            "1142135004",
            "900000000000011006",
            "900000000000451002",
        ]);

        let rel = Rf2ConcreteRelationship::from_record(&record).unwrap();
        assert_eq!(rel.value.as_string(), Some("tablet"));
    }

    #[test]
    fn inferred_only_filter_excludes_stated_relationships() {
        let record = make_record(&[
            "12345678901234",
            "20230101",
            "1",
            "900000000000207008",
            "322236009",
            "#500",
            "1",
            "1142135004",
            "900000000000010007",
            "900000000000451002",
        ]);

        let rel = Rf2ConcreteRelationship::from_record(&record).unwrap();

        assert!(!rel.passes_concrete_filter(&ConcreteRelationshipConfig::inferred_only()));
        assert!(rel.passes_concrete_filter(&ConcreteRelationshipConfig::stated_only()));
    }

    #[test]
    fn type_filter_keeps_only_matching_types() {
        let record = make_record(&[
            "12345678901234",
            "20230101",
            "1",
            "900000000000207008",
            "322236009",
            "#500",
            "1",
            "1142135004",
            "900000000000011006",
            "900000000000451002",
        ]);

        let rel = Rf2ConcreteRelationship::from_record(&record).unwrap();

        let mut config = ConcreteRelationshipConfig { type_ids: vec![1142135004], ..Default::default() };
        assert!(rel.passes_concrete_filter(&config));

        config.type_ids = vec![999999999];
        assert!(!rel.passes_concrete_filter(&config));
    }
}
