//! OWL Expression refset row parser for SNOMED CT RF2 files.
//!
//! Parses `sct2_sRefset_OWL*.txt` files containing OWL axiom and ontology
//! header expressions into [`snomed_types::RefsetItemKind::OwlExpression`].

use csv::StringRecord;
use snomed_types::{RefsetItem, RefsetItemKind};
use uuid::Uuid;

use crate::parser::{parse, Rf2Record};
use crate::types::{Rf2Config, Rf2Error, Rf2Result};

/// A row from an OWL Expression reference set file.
#[derive(Debug, Clone)]
pub struct OwlExpressionRow(pub RefsetItem);

impl Rf2Record for OwlExpressionRow {
    const EXPECTED_COLUMNS: &'static [&'static str] = &[
        "id",
        "effectiveTime",
        "active",
        "moduleId",
        "refsetId",
        "referencedComponentId",
        "owlExpression",
    ];

    fn from_record(record: &StringRecord) -> Rf2Result<Self> {
        let uuid = Uuid::parse_str(record.get(0).unwrap_or(""))
            .map_err(|_| Rf2Error::Parse(format!("invalid refset member id: {:?}", record.get(0))))?;

        Ok(Self(RefsetItem {
            header: snomed_types::RefsetItemHeader {
                uuid,
                effective_time: parse::effective_time(record.get(1).unwrap_or(""))?,
                active: parse::boolean(record.get(2).unwrap_or(""))?,
                module_id: parse::sctid(record.get(3).unwrap_or(""))?,
                refset_id: parse::sctid(record.get(4).unwrap_or(""))?,
                referenced_component_id: parse::sctid(record.get(5).unwrap_or(""))?,
            },
            kind: RefsetItemKind::OwlExpression {
                owl_expression: record.get(6).unwrap_or("").to_string(),
            },
        }))
    }

    fn passes_filter(&self, config: &Rf2Config) -> bool {
        !(config.active_only && !self.0.header.active)
    }
}
