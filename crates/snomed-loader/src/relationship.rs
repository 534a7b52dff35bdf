//! Reads `sct2_Relationship_*.txt` rows into [`Rf2Relationship`], plus type
//! and characteristic-type narrowing on top of the base active-only filter.

use csv::StringRecord;
use snomed_types::{well_known, CharacteristicType, Rf2Relationship};

use crate::parser::{parse, Rf2Record};
use crate::types::{RelationshipConfig, Rf2Config, Rf2Result};

const RELATIONSHIP_COLUMNS: &[&str] = &[
    "id",
    "effectiveTime",
    "active",
    "moduleId",
    "sourceId",
    "destinationId",
    "relationshipGroup",
    "typeId",
    "characteristicTypeId",
    "modifierId",
];

impl Rf2Record for Rf2Relationship {
    const EXPECTED_COLUMNS: &'static [&'static str] = RELATIONSHIP_COLUMNS;

    fn from_record(record: &StringRecord) -> Rf2Result<Self> {
        Ok(Rf2Relationship {
            id: parse::sctid(record.get(0).unwrap_or(""))?,
            effective_time: parse::effective_time(record.get(1).unwrap_or(""))?,
            active: parse::boolean(record.get(2).unwrap_or(""))?,
            module_id: parse::sctid(record.get(3).unwrap_or(""))?,
            source_id: parse::sctid(record.get(4).unwrap_or(""))?,
            destination_id: parse::sctid(record.get(5).unwrap_or(""))?,
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

pub trait RelationshipFilter {
    fn passes_relationship_filter(&self, config: &RelationshipConfig) -> bool;
}

impl RelationshipFilter for Rf2Relationship {
    fn passes_relationship_filter(&self, config: &RelationshipConfig) -> bool {
        if !self.passes_filter(&config.base) {
            return false;
        }
        if !config.type_ids.is_empty() && !config.type_ids.contains(&self.type_id) {
            return false;
        }
        if !config.characteristic_type_ids.is_empty() && !config.characteristic_type_ids.contains(&self.characteristic_type_id) {
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
    fn parses_a_relationship_row() {
        let record = make_record(&[
            "100000028",
            "20020131",
            "1",
            "900000000000207008",
            "73211009",
            "362969004",
            "0",
            "116680003",
            "900000000000011006",
            "900000000000451002",
        ]);

        let rel = Rf2Relationship::from_record(&record).unwrap();
        assert_eq!(rel.id, 100000028);
        assert_eq!(rel.source_id, 73211009);
        assert_eq!(rel.destination_id, 362969004);
        assert_eq!(rel.relationship_group, 0);
        assert_eq!(rel.type_id, well_known::IS_A);
        assert_eq!(rel.characteristic_type_id, CharacteristicType::INFERRED_ID);
    }

    #[test]
    fn characteristic_type_filter_keeps_only_inferred() {
        let inferred = Rf2Relationship {
            id: 1,
            effective_time: 20020131,
            active: true,
            module_id: 900000000000207008,
            source_id: 73211009,
            destination_id: 362969004,
            relationship_group: 0,
            type_id: well_known::IS_A,
            characteristic_type_id: CharacteristicType::INFERRED_ID,
            modifier_id: 900000000000451002,
        };
        let stated = Rf2Relationship { characteristic_type_id: CharacteristicType::STATED_ID, ..inferred.clone() };

        let inferred_only = RelationshipConfig::inferred_only();

        assert!(inferred.passes_relationship_filter(&inferred_only));
        assert!(!stated.passes_relationship_filter(&inferred_only));
    }

    #[test]
    fn type_filter_keeps_only_matching_relationship_types() {
        let is_a = Rf2Relationship {
            id: 1,
            effective_time: 20020131,
            active: true,
            module_id: 900000000000207008,
            source_id: 73211009,
            destination_id: 362969004,
            relationship_group: 0,
            type_id: well_known::IS_A,
            characteristic_type_id: CharacteristicType::INFERRED_ID,
            modifier_id: 900000000000451002,
        };
        let finding_site = Rf2Relationship { type_id: well_known::FINDING_SITE, ..is_a.clone() };

        let is_a_only = RelationshipConfig::is_a_only();

        assert!(is_a.passes_relationship_filter(&is_a_only));
        assert!(!finding_site.passes_relationship_filter(&is_a_only));
    }
}
