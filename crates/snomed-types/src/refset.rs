//! SNOMED CT Reference Set item types.
//!
//! A reference set (refset) member is a tagged union: every member shares a
//! common header (`uuid`, `effectiveTime`, `active`, `moduleId`, `refsetId`,
//! `referencedComponentId`) and carries a subtype-specific payload declared
//! by the refset's Refset Descriptor. Rather than one struct per RF2 file
//! pattern, `RefsetItem` models this directly as a sum type so the
//! component store can treat every refset uniformly and the wire encoding
//! needs only a single 1-byte discriminator.
//!
//! # Example
//!
//! ```
//! use snomed_types::{RefsetItem, RefsetItemHeader, RefsetItemKind};
//! use uuid::Uuid;
//!
//! let item = RefsetItem {
//!     header: RefsetItemHeader {
//!         uuid: Uuid::nil(),
//!         effective_time: 20200101,
//!         active: true,
//!         module_id: 900000000000207008,
//!         refset_id: 723264001,
//!         referenced_component_id: 12345678,
//!     },
//!     kind: RefsetItemKind::Simple,
//! };
//!
//! assert!(item.header.active);
//! assert_eq!(item.kind.discriminant(), 0);
//! ```

use crate::SctId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The header fields common to every reference set member (RF2 + all
/// extension columns), independent of the member's subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RefsetItemHeader {
    /// Unique identifier for this reference set member (128-bit UUID).
    pub uuid: uuid::Uuid,
    /// Effective time as a YYYYMMDD integer.
    pub effective_time: u32,
    /// Whether this member is currently active.
    pub active: bool,
    /// Module containing this member.
    pub module_id: SctId,
    /// The reference set this member belongs to.
    pub refset_id: SctId,
    /// The component this member refers to (concept, description, or
    /// relationship depending on the owning refset's declared scope).
    pub referenced_component_id: SctId,
}

/// Map correlation/priority metadata shared by the map refset variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MapTarget {
    /// Ordering group for multiple map targets from the same source.
    pub map_group: u8,
    /// Priority within the map group.
    pub map_priority: u8,
    /// Machine-readable rule governing when this map applies.
    pub map_rule: String,
    /// Human-readable advice accompanying the map rule.
    pub map_advice: String,
    /// The target code in the external classification.
    pub map_target: String,
}

/// The subtype-specific payload of a reference set member.
///
/// The discriminant used on the wire (see [`RefsetItemKind::discriminant`])
/// is stable and must not be renumbered without a store format migration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RefsetItemKind {
    /// Plain membership, no extra columns.
    Simple,
    /// Dialect/acceptability membership of a description.
    Language {
        /// Preferred (900000000000548007) or Acceptable (900000000000549004).
        acceptability_id: SctId,
    },
    /// Simple map to a single external code.
    SimpleMap {
        /// The external classification code (e.g. an ICD-10 code).
        map_target: String,
    },
    /// Complex map with correlation and prioritisation metadata.
    ComplexMap {
        /// Map target and rule/advice metadata.
        target: MapTarget,
        /// Degree of correlation between the SNOMED CT concept and the target.
        correlation_id: SctId,
    },
    /// Extended complex map, adding a map category.
    ExtendedMap {
        /// Map target and rule/advice metadata.
        target: MapTarget,
        /// Degree of correlation between the SNOMED CT concept and the target.
        correlation_id: SctId,
        /// Categorisation of the map (e.g. exact match, narrow to broad).
        map_category_id: SctId,
    },
    /// Association between two components (historical, cross-map, etc).
    Association {
        /// The target component of the association.
        target_component_id: SctId,
    },
    /// Attribute-value membership (e.g. concept inactivation reason).
    AttributeValue {
        /// The value concept assigned to the referenced component.
        value_id: SctId,
    },
    /// OWL axiom or ontology header expression.
    OwlExpression {
        /// The axiom in OWL 2 EL functional syntax.
        owl_expression: String,
    },
    /// Declares the ordered column list for another refset id.
    RefsetDescriptor {
        /// The description of the declared attribute (a concept id).
        attribute_description: SctId,
        /// The data type of the declared attribute (a concept id).
        attribute_type: SctId,
        /// 0-based position of this attribute among the refset's columns.
        attribute_order: u32,
    },
    /// Declares the module dependency graph between modules.
    ModuleDependency {
        /// Effective time of the source module at the point of dependency.
        source_effective_time: u32,
        /// Effective time of the target module required by the source.
        target_effective_time: u32,
    },
    /// MRCM Domain reference set member.
    ///
    /// Kept only as a data shape (spec §3 lists it as a refset item
    /// subtype); domain/range *validation* against these rows is an
    /// authoring-time concern and out of scope for the query engine.
    MrcmDomain {
        /// Serialised domain constraint (opaque to the query engine).
        domain_constraint: String,
        /// Human-readable parent domain description.
        parent_domain: String,
        /// Serialised proximal primitive constraint.
        proximal_primitive_constraint: String,
    },
    /// MRCM Attribute Domain reference set member.
    MrcmAttributeDomain {
        /// The domain concept this row constrains.
        domain_id: SctId,
        /// Whether the attribute is grouped.
        grouped: bool,
        /// Serialised cardinality, e.g. "0..1".
        attribute_cardinality: String,
    },
    /// MRCM Attribute Range reference set member.
    MrcmAttributeRange {
        /// Serialised value range constraint.
        range_constraint: String,
        /// Serialised rule strength (mandatory/optional).
        rule_strength_id: SctId,
    },
}

impl RefsetItemKind {
    /// The stable 1-byte discriminator used by the on-disk wire encoding
    /// (spec "Design Notes": dynamic dispatch by record subtype → a sum
    /// type with a 1-byte discriminator on the wire).
    pub fn discriminant(&self) -> u8 {
        match self {
            Self::Simple => 0,
            Self::Language { .. } => 1,
            Self::SimpleMap { .. } => 2,
            Self::ComplexMap { .. } => 3,
            Self::ExtendedMap { .. } => 4,
            Self::Association { .. } => 5,
            Self::AttributeValue { .. } => 6,
            Self::OwlExpression { .. } => 7,
            Self::RefsetDescriptor { .. } => 8,
            Self::ModuleDependency { .. } => 9,
            Self::MrcmDomain { .. } => 10,
            Self::MrcmAttributeDomain { .. } => 11,
            Self::MrcmAttributeRange { .. } => 12,
        }
    }
}

/// A fully-typed reference set member: common header plus subtype payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RefsetItem {
    /// Fields common to every refset member.
    pub header: RefsetItemHeader,
    /// The subtype-specific payload.
    pub kind: RefsetItemKind,
}

impl RefsetItem {
    /// Returns true if this member is preferred (Language refsets only).
    pub fn is_preferred(&self) -> bool {
        matches!(
            self.kind,
            RefsetItemKind::Language { acceptability_id } if acceptability_id == crate::well_known::PREFERRED
        )
    }

    /// Returns true if this member is acceptable (Language refsets only).
    pub fn is_acceptable(&self) -> bool {
        matches!(
            self.kind,
            RefsetItemKind::Language { acceptability_id } if acceptability_id == crate::well_known::ACCEPTABLE
        )
    }

    /// Returns the association target, if this member is an Association.
    pub fn association_target(&self) -> Option<SctId> {
        match self.kind {
            RefsetItemKind::Association {
                target_component_id,
            } => Some(target_component_id),
            _ => None,
        }
    }

    /// Returns the OWL expression text, if this member carries one.
    pub fn owl_expression(&self) -> Option<&str> {
        match &self.kind {
            RefsetItemKind::OwlExpression { owl_expression } => Some(owl_expression),
            _ => None,
        }
    }
}

/// Well-known reference set IDs.
pub mod well_known_refsets {
    use crate::SctId;

    // Language reference sets
    /// US English language reference set.
    pub const US_ENGLISH_LANG_REFSET: SctId = 900000000000509007;
    /// GB English language reference set.
    pub const GB_ENGLISH_LANG_REFSET: SctId = 900000000000508004;

    // Content reference sets
    /// ICD-10 simple map reference set.
    pub const ICD10_SIMPLE_MAP: SctId = 447562003;

    // Metadata reference sets
    /// Description format reference set.
    pub const DESCRIPTION_FORMAT_REFSET: SctId = 900000000000538005;

    // OWL reference sets
    /// OWL Axiom Reference Set.
    pub const OWL_AXIOM_REFSET: SctId = 733073007;
    /// OWL Ontology Reference Set.
    pub const OWL_ONTOLOGY_REFSET: SctId = 762103008;

    // Association reference sets
    /// REPLACED BY association reference set.
    pub const REPLACED_BY_REFSET: SctId = 900000000000526001;
    /// SAME AS association reference set.
    pub const SAME_AS_REFSET: SctId = 900000000000527005;
    /// WAS A association reference set.
    pub const WAS_A_REFSET: SctId = 900000000000528000;
    /// POSSIBLY EQUIVALENT TO association reference set.
    pub const POSSIBLY_EQUIVALENT_TO_REFSET: SctId = 900000000000523009;
    /// MOVED TO association reference set.
    pub const MOVED_TO_REFSET: SctId = 900000000000524003;
    /// MOVED FROM association reference set.
    pub const MOVED_FROM_REFSET: SctId = 900000000000525002;
    /// ALTERNATIVE association reference set.
    pub const ALTERNATIVE_REFSET: SctId = 900000000000530003;
    /// REFERS TO association reference set.
    pub const REFERS_TO_REFSET: SctId = 900000000000531004;

    /// Returns true if `refset_id` is one of the historical association refsets.
    pub fn is_historical_association(refset_id: SctId) -> bool {
        matches!(
            refset_id,
            REPLACED_BY_REFSET
                | SAME_AS_REFSET
                | WAS_A_REFSET
                | POSSIBLY_EQUIVALENT_TO_REFSET
                | MOVED_TO_REFSET
                | MOVED_FROM_REFSET
                | ALTERNATIVE_REFSET
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(refset_id: SctId, referenced_component_id: SctId) -> RefsetItemHeader {
        RefsetItemHeader {
            uuid: uuid::Uuid::from_u128(1),
            effective_time: 20200101,
            active: true,
            module_id: 900000000000207008,
            refset_id,
            referenced_component_id,
        }
    }

    #[test]
    fn simple_member_has_discriminant_zero() {
        let item = RefsetItem {
            header: header(723264001, 12345678),
            kind: RefsetItemKind::Simple,
        };
        assert_eq!(item.kind.discriminant(), 0);
    }

    #[test]
    fn language_member_preferred_and_acceptable() {
        let preferred = RefsetItem {
            header: header(well_known_refsets::US_ENGLISH_LANG_REFSET, 754786011),
            kind: RefsetItemKind::Language {
                acceptability_id: crate::well_known::PREFERRED,
            },
        };
        assert!(preferred.is_preferred());
        assert!(!preferred.is_acceptable());

        let acceptable = RefsetItem {
            header: header(well_known_refsets::GB_ENGLISH_LANG_REFSET, 754786011),
            kind: RefsetItemKind::Language {
                acceptability_id: crate::well_known::ACCEPTABLE,
            },
        };
        assert!(acceptable.is_acceptable());
        assert!(!acceptable.is_preferred());
    }

    #[test]
    fn association_member_exposes_target() {
        let item = RefsetItem {
            header: header(well_known_refsets::SAME_AS_REFSET, 12345678),
            kind: RefsetItemKind::Association {
                target_component_id: 87654321,
            },
        };
        assert_eq!(item.association_target(), Some(87654321));
        assert!(well_known_refsets::is_historical_association(
            item.header.refset_id
        ));
    }

    #[test]
    fn owl_expression_member_exposes_text() {
        let item = RefsetItem {
            header: header(well_known_refsets::OWL_AXIOM_REFSET, 404684003),
            kind: RefsetItemKind::OwlExpression {
                owl_expression: "SubClassOf(:404684003 :138875005)".to_string(),
            },
        };
        assert_eq!(
            item.owl_expression(),
            Some("SubClassOf(:404684003 :138875005)")
        );
    }

    #[test]
    fn discriminants_are_distinct() {
        let kinds = [
            RefsetItemKind::Simple,
            RefsetItemKind::Language {
                acceptability_id: crate::well_known::PREFERRED,
            },
            RefsetItemKind::SimpleMap {
                map_target: "G35".into(),
            },
            RefsetItemKind::Association {
                target_component_id: 1,
            },
            RefsetItemKind::AttributeValue { value_id: 1 },
            RefsetItemKind::OwlExpression {
                owl_expression: String::new(),
            },
            RefsetItemKind::RefsetDescriptor {
                attribute_description: 1,
                attribute_type: 1,
                attribute_order: 0,
            },
            RefsetItemKind::ModuleDependency {
                source_effective_time: 1,
                target_effective_time: 1,
            },
        ];
        let mut seen = std::collections::HashSet::new();
        for k in &kinds {
            assert!(seen.insert(k.discriminant()), "duplicate discriminant");
        }
    }
}
