//! RF2 Reference Set row parsers.
//!
//! Each RF2 refset file pattern (Simple, Language, Association, ...) has its
//! own column layout but the same six leading columns (`id`, `effectiveTime`,
//! `active`, `moduleId`, `refsetId`, `referencedComponentId`). Every parser
//! here reads those into a [`snomed_types::RefsetItemHeader`] plus whatever
//! tail columns the pattern defines, and produces a single
//! [`snomed_types::RefsetItem`] regardless of pattern, so downstream code
//! (`snomed-store::write_refset_item`) never needs to know which RF2 file a
//! row came from.

use csv::StringRecord;
use snomed_types::{MapTarget, RefsetItem, RefsetItemHeader, RefsetItemKind};
use uuid::Uuid;

use crate::parser::{parse, Rf2Record};
use crate::types::{Rf2Config, Rf2Error, Rf2Result};

fn uuid_field(record: &StringRecord, index: usize) -> Rf2Result<Uuid> {
    let value = record.get(index).unwrap_or("");
    Uuid::parse_str(value).map_err(|_| Rf2Error::Parse(format!("invalid refset member id: {value}")))
}

fn header(record: &StringRecord) -> Rf2Result<RefsetItemHeader> {
    Ok(RefsetItemHeader {
        uuid: uuid_field(record, 0)?,
        effective_time: parse::effective_time(record.get(1).unwrap_or(""))?,
        active: parse::boolean(record.get(2).unwrap_or(""))?,
        module_id: parse::sctid(record.get(3).unwrap_or(""))?,
        refset_id: parse::sctid(record.get(4).unwrap_or(""))?,
        referenced_component_id: parse::sctid(record.get(5).unwrap_or(""))?,
    })
}

fn passes_active_filter(item: &RefsetItem, config: &Rf2Config) -> bool {
    !(config.active_only && !item.header.active)
}

/// A row from a Simple reference set file (`refsetId`, no extra columns).
#[derive(Debug, Clone)]
pub struct SimpleRefsetRow(pub RefsetItem);

impl Rf2Record for SimpleRefsetRow {
    const EXPECTED_COLUMNS: &'static [&'static str] = &[
        "id",
        "effectiveTime",
        "active",
        "moduleId",
        "refsetId",
        "referencedComponentId",
    ];

    fn from_record(record: &StringRecord) -> Rf2Result<Self> {
        Ok(Self(RefsetItem {
            header: header(record)?,
            kind: RefsetItemKind::Simple,
        }))
    }

    fn passes_filter(&self, config: &Rf2Config) -> bool {
        passes_active_filter(&self.0, config)
    }
}

/// A row from a Language reference set file (dialect/acceptability).
#[derive(Debug, Clone)]
pub struct LanguageRefsetRow(pub RefsetItem);

impl Rf2Record for LanguageRefsetRow {
    const EXPECTED_COLUMNS: &'static [&'static str] = &[
        "id",
        "effectiveTime",
        "active",
        "moduleId",
        "refsetId",
        "referencedComponentId",
        "acceptabilityId",
    ];

    fn from_record(record: &StringRecord) -> Rf2Result<Self> {
        Ok(Self(RefsetItem {
            header: header(record)?,
            kind: RefsetItemKind::Language {
                acceptability_id: parse::sctid(record.get(6).unwrap_or(""))?,
            },
        }))
    }

    fn passes_filter(&self, config: &Rf2Config) -> bool {
        passes_active_filter(&self.0, config)
    }
}

/// A row from an Association reference set file.
#[derive(Debug, Clone)]
pub struct AssociationRefsetRow(pub RefsetItem);

impl Rf2Record for AssociationRefsetRow {
    const EXPECTED_COLUMNS: &'static [&'static str] = &[
        "id",
        "effectiveTime",
        "active",
        "moduleId",
        "refsetId",
        "referencedComponentId",
        "targetComponentId",
    ];

    fn from_record(record: &StringRecord) -> Rf2Result<Self> {
        Ok(Self(RefsetItem {
            header: header(record)?,
            kind: RefsetItemKind::Association {
                target_component_id: parse::sctid(record.get(6).unwrap_or(""))?,
            },
        }))
    }

    fn passes_filter(&self, config: &Rf2Config) -> bool {
        passes_active_filter(&self.0, config)
    }
}

/// A row from a Simple Map reference set file.
#[derive(Debug, Clone)]
pub struct SimpleMapRefsetRow(pub RefsetItem);

impl Rf2Record for SimpleMapRefsetRow {
    const EXPECTED_COLUMNS: &'static [&'static str] = &[
        "id",
        "effectiveTime",
        "active",
        "moduleId",
        "refsetId",
        "referencedComponentId",
        "mapTarget",
    ];

    fn from_record(record: &StringRecord) -> Rf2Result<Self> {
        Ok(Self(RefsetItem {
            header: header(record)?,
            kind: RefsetItemKind::SimpleMap {
                map_target: record.get(6).unwrap_or("").to_string(),
            },
        }))
    }

    fn passes_filter(&self, config: &Rf2Config) -> bool {
        passes_active_filter(&self.0, config)
    }
}

fn map_target(record: &StringRecord, offset: usize) -> Rf2Result<MapTarget> {
    Ok(MapTarget {
        map_group: record
            .get(offset)
            .unwrap_or("0")
            .parse()
            .map_err(|_| Rf2Error::InvalidInteger {
                value: record.get(offset).unwrap_or("").to_string(),
            })?,
        map_priority: record
            .get(offset + 1)
            .unwrap_or("0")
            .parse()
            .map_err(|_| Rf2Error::InvalidInteger {
                value: record.get(offset + 1).unwrap_or("").to_string(),
            })?,
        map_rule: record.get(offset + 2).unwrap_or("").to_string(),
        map_advice: record.get(offset + 3).unwrap_or("").to_string(),
        map_target: record.get(offset + 4).unwrap_or("").to_string(),
    })
}

/// A row from a Complex Map reference set file.
#[derive(Debug, Clone)]
pub struct ComplexMapRefsetRow(pub RefsetItem);

impl Rf2Record for ComplexMapRefsetRow {
    const EXPECTED_COLUMNS: &'static [&'static str] = &[
        "id",
        "effectiveTime",
        "active",
        "moduleId",
        "refsetId",
        "referencedComponentId",
        "mapGroup",
        "mapPriority",
        "mapRule",
        "mapAdvice",
        "mapTarget",
        "correlationId",
    ];

    fn from_record(record: &StringRecord) -> Rf2Result<Self> {
        Ok(Self(RefsetItem {
            header: header(record)?,
            kind: RefsetItemKind::ComplexMap {
                target: map_target(record, 6)?,
                correlation_id: parse::sctid(record.get(11).unwrap_or(""))?,
            },
        }))
    }

    fn passes_filter(&self, config: &Rf2Config) -> bool {
        passes_active_filter(&self.0, config)
    }
}

/// A row from an Extended Map reference set file.
#[derive(Debug, Clone)]
pub struct ExtendedMapRefsetRow(pub RefsetItem);

impl Rf2Record for ExtendedMapRefsetRow {
    const EXPECTED_COLUMNS: &'static [&'static str] = &[
        "id",
        "effectiveTime",
        "active",
        "moduleId",
        "refsetId",
        "referencedComponentId",
        "mapGroup",
        "mapPriority",
        "mapRule",
        "mapAdvice",
        "mapTarget",
        "correlationId",
        "mapCategoryId",
    ];

    fn from_record(record: &StringRecord) -> Rf2Result<Self> {
        Ok(Self(RefsetItem {
            header: header(record)?,
            kind: RefsetItemKind::ExtendedMap {
                target: map_target(record, 6)?,
                correlation_id: parse::sctid(record.get(11).unwrap_or(""))?,
                map_category_id: parse::sctid(record.get(12).unwrap_or(""))?,
            },
        }))
    }

    fn passes_filter(&self, config: &Rf2Config) -> bool {
        passes_active_filter(&self.0, config)
    }
}

/// A row from an Attribute Value reference set file.
#[derive(Debug, Clone)]
pub struct AttributeValueRefsetRow(pub RefsetItem);

impl Rf2Record for AttributeValueRefsetRow {
    const EXPECTED_COLUMNS: &'static [&'static str] = &[
        "id",
        "effectiveTime",
        "active",
        "moduleId",
        "refsetId",
        "referencedComponentId",
        "valueId",
    ];

    fn from_record(record: &StringRecord) -> Rf2Result<Self> {
        Ok(Self(RefsetItem {
            header: header(record)?,
            kind: RefsetItemKind::AttributeValue {
                value_id: parse::sctid(record.get(6).unwrap_or(""))?,
            },
        }))
    }

    fn passes_filter(&self, config: &Rf2Config) -> bool {
        passes_active_filter(&self.0, config)
    }
}

/// A row from a Reference Set Descriptor reference set file.
#[derive(Debug, Clone)]
pub struct RefsetDescriptorRow(pub RefsetItem);

impl Rf2Record for RefsetDescriptorRow {
    const EXPECTED_COLUMNS: &'static [&'static str] = &[
        "id",
        "effectiveTime",
        "active",
        "moduleId",
        "refsetId",
        "referencedComponentId",
        "attributeDescription",
        "attributeType",
        "attributeOrder",
    ];

    fn from_record(record: &StringRecord) -> Rf2Result<Self> {
        Ok(Self(RefsetItem {
            header: header(record)?,
            kind: RefsetItemKind::RefsetDescriptor {
                attribute_description: parse::sctid(record.get(6).unwrap_or(""))?,
                attribute_type: parse::sctid(record.get(7).unwrap_or(""))?,
                attribute_order: record
                    .get(8)
                    .unwrap_or("0")
                    .parse()
                    .map_err(|_| Rf2Error::InvalidInteger {
                        value: record.get(8).unwrap_or("").to_string(),
                    })?,
            },
        }))
    }

    fn passes_filter(&self, config: &Rf2Config) -> bool {
        passes_active_filter(&self.0, config)
    }
}

/// A row from a Module Dependency reference set file.
#[derive(Debug, Clone)]
pub struct ModuleDependencyRow(pub RefsetItem);

impl Rf2Record for ModuleDependencyRow {
    const EXPECTED_COLUMNS: &'static [&'static str] = &[
        "id",
        "effectiveTime",
        "active",
        "moduleId",
        "refsetId",
        "referencedComponentId",
        "sourceEffectiveTime",
        "targetEffectiveTime",
    ];

    fn from_record(record: &StringRecord) -> Rf2Result<Self> {
        Ok(Self(RefsetItem {
            header: header(record)?,
            kind: RefsetItemKind::ModuleDependency {
                source_effective_time: parse::effective_time(record.get(6).unwrap_or(""))?,
                target_effective_time: parse::effective_time(record.get(7).unwrap_or(""))?,
            },
        }))
    }

    fn passes_filter(&self, config: &Rf2Config) -> bool {
        passes_active_filter(&self.0, config)
    }
}

/// A row from an MRCM Domain reference set file.
///
/// Kept only to preserve the data shape described by the refset item
/// tagged union; nothing in this crate validates against it.
#[derive(Debug, Clone)]
pub struct MrcmDomainRow(pub RefsetItem);

impl Rf2Record for MrcmDomainRow {
    const EXPECTED_COLUMNS: &'static [&'static str] = &[
        "id",
        "effectiveTime",
        "active",
        "moduleId",
        "refsetId",
        "referencedComponentId",
        "domainConstraint",
        "parentDomain",
        "proximalPrimitiveConstraint",
        "proximalPrimitiveRefinement",
        "domainTemplateForPrecoordination",
        "domainTemplateForPostcoordination",
        "guideURL",
    ];

    fn from_record(record: &StringRecord) -> Rf2Result<Self> {
        Ok(Self(RefsetItem {
            header: header(record)?,
            kind: RefsetItemKind::MrcmDomain {
                domain_constraint: record.get(6).unwrap_or("").to_string(),
                parent_domain: record.get(7).unwrap_or("").to_string(),
                proximal_primitive_constraint: record.get(8).unwrap_or("").to_string(),
            },
        }))
    }

    fn passes_filter(&self, config: &Rf2Config) -> bool {
        passes_active_filter(&self.0, config)
    }
}

/// A row from an MRCM Attribute Domain reference set file.
#[derive(Debug, Clone)]
pub struct MrcmAttributeDomainRow(pub RefsetItem);

impl Rf2Record for MrcmAttributeDomainRow {
    const EXPECTED_COLUMNS: &'static [&'static str] = &[
        "id",
        "effectiveTime",
        "active",
        "moduleId",
        "refsetId",
        "referencedComponentId",
        "domainId",
        "grouped",
        "attributeCardinality",
        "attributeInGroupCardinality",
        "ruleStrengthId",
        "contentTypeId",
    ];

    fn from_record(record: &StringRecord) -> Rf2Result<Self> {
        Ok(Self(RefsetItem {
            header: header(record)?,
            kind: RefsetItemKind::MrcmAttributeDomain {
                domain_id: parse::sctid(record.get(6).unwrap_or(""))?,
                grouped: parse::boolean(record.get(7).unwrap_or(""))?,
                attribute_cardinality: record.get(8).unwrap_or("").to_string(),
            },
        }))
    }

    fn passes_filter(&self, config: &Rf2Config) -> bool {
        passes_active_filter(&self.0, config)
    }
}

/// A row from an MRCM Attribute Range reference set file.
#[derive(Debug, Clone)]
pub struct MrcmAttributeRangeRow(pub RefsetItem);

impl Rf2Record for MrcmAttributeRangeRow {
    const EXPECTED_COLUMNS: &'static [&'static str] = &[
        "id",
        "effectiveTime",
        "active",
        "moduleId",
        "refsetId",
        "referencedComponentId",
        "rangeConstraint",
        "attributeRule",
        "ruleStrengthId",
        "contentTypeId",
    ];

    fn from_record(record: &StringRecord) -> Rf2Result<Self> {
        Ok(Self(RefsetItem {
            header: header(record)?,
            kind: RefsetItemKind::MrcmAttributeRange {
                range_constraint: record.get(6).unwrap_or("").to_string(),
                rule_strength_id: parse::sctid(record.get(8).unwrap_or(""))?,
            },
        }))
    }

    fn passes_filter(&self, config: &Rf2Config) -> bool {
        passes_active_filter(&self.0, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> StringRecord {
        let mut record = StringRecord::new();
        for field in fields {
            record.push_field(field);
        }
        record
    }

    #[test]
    fn parses_simple_refset_row() {
        let row = SimpleRefsetRow::from_record(&record(&[
            "00000000-0000-0000-0000-000000000001",
            "20200101",
            "1",
            "900000000000207008",
            "723264001",
            "12345678",
        ]))
        .unwrap();
        assert!(row.0.header.active);
        assert_eq!(row.0.header.referenced_component_id, 12345678);
        assert_eq!(row.0.kind, RefsetItemKind::Simple);
    }

    #[test]
    fn parses_language_refset_row_preferred() {
        let row = LanguageRefsetRow::from_record(&record(&[
            "00000000-0000-0000-0000-000000000002",
            "20200101",
            "1",
            "900000000000207008",
            "900000000000509007",
            "754786011",
            "900000000000548007",
        ]))
        .unwrap();
        assert!(row.0.is_preferred());
        assert!(!row.0.is_acceptable());
    }

    #[test]
    fn parses_association_refset_row() {
        let row = AssociationRefsetRow::from_record(&record(&[
            "00000000-0000-0000-0000-000000000003",
            "20200101",
            "1",
            "900000000000207008",
            "900000000000527005",
            "12345678",
            "87654321",
        ]))
        .unwrap();
        assert_eq!(row.0.association_target(), Some(87654321));
    }

    #[test]
    fn parses_extended_map_refset_row() {
        let row = ExtendedMapRefsetRow::from_record(&record(&[
            "00000000-0000-0000-0000-000000000004",
            "20200101",
            "1",
            "900000000000207008",
            "447562003",
            "73211009",
            "0",
            "1",
            "",
            "",
            "E11",
            "447561005",
            "447637006",
        ]))
        .unwrap();
        match row.0.kind {
            RefsetItemKind::ExtendedMap {
                target,
                correlation_id,
                map_category_id,
            } => {
                assert_eq!(target.map_target, "E11");
                assert_eq!(correlation_id, 447561005);
                assert_eq!(map_category_id, 447637006);
            }
            _ => panic!("expected ExtendedMap"),
        }
    }

    #[test]
    fn inactive_row_filtered_when_active_only() {
        let row = SimpleRefsetRow::from_record(&record(&[
            "00000000-0000-0000-0000-000000000005",
            "20200101",
            "0",
            "900000000000207008",
            "723264001",
            "12345678",
        ]))
        .unwrap();
        assert!(!row.passes_filter(&Rf2Config {
            active_only: true,
            ..Rf2Config::default()
        }));
        assert!(row.passes_filter(&Rf2Config {
            active_only: false,
            ..Rf2Config::default()
        }));
    }

    #[test]
    fn rejects_malformed_uuid() {
        let err = SimpleRefsetRow::from_record(&record(&[
            "not-a-uuid",
            "20200101",
            "1",
            "900000000000207008",
            "723264001",
            "12345678",
        ]));
        assert!(err.is_err());
    }
}
