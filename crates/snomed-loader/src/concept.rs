//! Reads `sct2_Concept_*.txt` rows into [`Rf2Concept`].

use csv::StringRecord;
use snomed_types::Rf2Concept;

use crate::parser::{parse, Rf2Record};
use crate::types::{Rf2Config, Rf2Result};

const CONCEPT_COLUMNS: &[&str] = &["id", "effectiveTime", "active", "moduleId", "definitionStatusId"];

impl Rf2Record for Rf2Concept {
    const EXPECTED_COLUMNS: &'static [&'static str] = CONCEPT_COLUMNS;

    fn from_record(record: &StringRecord) -> Rf2Result<Self> {
        Ok(Rf2Concept {
            id: parse::sctid(record.get(0).unwrap_or(""))?,
            effective_time: parse::effective_time(record.get(1).unwrap_or(""))?,
            active: parse::boolean(record.get(2).unwrap_or(""))?,
            module_id: parse::sctid(record.get(3).unwrap_or(""))?,
            definition_status_id: parse::sctid(record.get(4).unwrap_or(""))?,
        })
    }

    fn passes_filter(&self, config: &Rf2Config) -> bool {
        !(config.active_only && !self.active)
    }
}
