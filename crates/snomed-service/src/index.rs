//! Builds the full-text description index and the reference-set member
//! index from the authoritative component store.
//!
//! Per the store's own lifecycle contract, indices are derived data: they
//! are rebuilt wholesale from `snomed-store` rather than maintained
//! incrementally, so there is exactly one place (here) that needs to agree
//! with the store's schema.

use std::path::Path;

use snomed_search::{DescriptionDoc, DescriptionIndex, FieldValue, MemberDoc, MemberIndex};
use snomed_store::Store;
use snomed_types::{well_known, ConcreteValue, RefsetItemKind, SctId};

use crate::error::{ServiceError, ServiceResult};

/// Reads every description and reference-set member out of `store` and
/// builds fresh in-memory search indices over them.
pub fn build_in_ram(store: &Store) -> ServiceResult<(DescriptionIndex, MemberIndex)> {
    let description_docs = description_docs(store)?;
    let member_docs = member_docs(store)?;

    let descriptions = DescriptionIndex::build_in_ram(&description_docs)?;
    let members = MemberIndex::build_in_ram(&member_docs)?;
    Ok((descriptions, members))
}

/// Builds fresh on-disk indices under `dir/descriptions` and `dir/members`.
pub fn create_in_dir(store: &Store, dir: &Path) -> ServiceResult<(DescriptionIndex, MemberIndex)> {
    let description_docs = description_docs(store)?;
    let member_docs = member_docs(store)?;

    std::fs::create_dir_all(dir.join("descriptions")).map_err(ServiceError::Io)?;
    std::fs::create_dir_all(dir.join("members")).map_err(ServiceError::Io)?;

    let descriptions = DescriptionIndex::create_in_dir(&dir.join("descriptions"), &description_docs)?;
    let members = MemberIndex::create_in_dir(&dir.join("members"), &member_docs)?;
    Ok((descriptions, members))
}

fn description_docs(store: &Store) -> ServiceResult<Vec<DescriptionDoc>> {
    let descriptions = store.all_descriptions(false)?;
    let mut docs = Vec::with_capacity(descriptions.len());
    for description in &descriptions {
        let language_memberships = store.component_refset_items(description.id, None)?;
        let mut preferred_in = Vec::new();
        let mut acceptable_in = Vec::new();
        for item in &language_memberships {
            if let RefsetItemKind::Language { acceptability_id } = item.kind {
                if acceptability_id == well_known::PREFERRED {
                    preferred_in.push(item.header.refset_id);
                } else if acceptability_id == well_known::ACCEPTABLE {
                    acceptable_in.push(item.header.refset_id);
                }
            }
        }

        let direct = store.parent_relationships(description.concept_id)?;
        let direct_attributes: Vec<(SctId, SctId)> = direct
            .iter()
            .flat_map(|(type_id, destinations)| destinations.iter().map(move |d| (*type_id, *d)))
            .collect();

        let transitive = store.parent_relationships_expanded(description.concept_id)?;
        let transitive_attributes: Vec<(SctId, SctId)> = transitive
            .iter()
            .flat_map(|(type_id, ancestors)| ancestors.iter().map(move |a| (*type_id, *a)))
            .collect();

        let mut counts: std::collections::HashMap<SctId, u32> = std::collections::HashMap::new();
        for (_, group) in store.grouped_properties(description.concept_id, None)? {
            for (type_id, _) in group {
                *counts.entry(type_id).or_default() += 1;
            }
        }
        let attribute_counts: Vec<(SctId, u32)> = counts.into_iter().collect();

        let concrete_attributes: Vec<(SctId, ConcreteValue)> = store
            .concrete_values(description.concept_id)?
            .into_iter()
            .filter(|relationship| relationship.active)
            .map(|relationship| (relationship.type_id, relationship.value))
            .collect();

        let concept_refsets = store.component_refset_ids(description.concept_id)?;
        let description_refsets: Vec<SctId> = language_memberships.iter().map(|item| item.header.refset_id).collect();

        let preferred_term = store
            .preferred_synonym(description.concept_id, &preferred_in)?
            .unwrap_or_else(|| description.term.clone());

        let length_boost = 1.0 / (description.term.chars().count().max(1) as f32).sqrt();

        docs.push(DescriptionDoc {
            description_id: description.id,
            concept_id: description.concept_id,
            term: description.term.clone(),
            language: description.language_code.clone(),
            type_id: description.type_id,
            case_significance_id: description.case_significance_id,
            active: description.active,
            module_id: description.module_id,
            preferred_in,
            acceptable_in,
            direct_attributes,
            transitive_attributes,
            attribute_counts,
            concrete_attributes,
            concept_refsets,
            description_refsets,
            preferred_term,
            length_boost,
        });
    }
    Ok(docs)
}

fn member_docs(store: &Store) -> ServiceResult<Vec<MemberDoc>> {
    let items = store.all_refset_items(false)?;
    let mut docs = Vec::with_capacity(items.len());
    for item in &items {
        docs.push(MemberDoc {
            uuid: item.header.uuid.to_string(),
            refset_id: item.header.refset_id,
            referenced_component_id: item.header.referenced_component_id,
            module_id: item.header.module_id,
            active: item.header.active,
            fields: refset_fields(&item.kind),
        });
    }
    Ok(docs)
}

/// Flattens a refset item's subtype payload into the named-field list the
/// member index's `M field = value` predicates look up, mirroring the
/// column names RF2 refset descriptor rows declare for each pattern.
fn refset_fields(kind: &RefsetItemKind) -> Vec<(String, FieldValue)> {
    match kind {
        RefsetItemKind::Simple => Vec::new(),
        RefsetItemKind::Language { acceptability_id } => {
            vec![("acceptabilityId".to_string(), FieldValue::Integer(*acceptability_id))]
        }
        RefsetItemKind::SimpleMap { map_target } => {
            vec![("mapTarget".to_string(), FieldValue::Str(map_target.clone()))]
        }
        RefsetItemKind::ComplexMap { target, correlation_id } => map_target_fields(target, *correlation_id, None),
        RefsetItemKind::ExtendedMap { target, correlation_id, map_category_id } => {
            map_target_fields(target, *correlation_id, Some(*map_category_id))
        }
        RefsetItemKind::Association { target_component_id } => {
            vec![("targetComponentId".to_string(), FieldValue::Integer(*target_component_id))]
        }
        RefsetItemKind::AttributeValue { value_id } => {
            vec![("valueId".to_string(), FieldValue::Integer(*value_id))]
        }
        RefsetItemKind::OwlExpression { owl_expression } => {
            vec![("owlExpression".to_string(), FieldValue::Str(owl_expression.clone()))]
        }
        RefsetItemKind::RefsetDescriptor { attribute_description, attribute_type, attribute_order } => vec![
            ("attributeDescription".to_string(), FieldValue::Integer(*attribute_description)),
            ("attributeType".to_string(), FieldValue::Integer(*attribute_type)),
            ("attributeOrder".to_string(), FieldValue::Integer(*attribute_order as i64)),
        ],
        RefsetItemKind::ModuleDependency { source_effective_time, target_effective_time } => vec![
            ("sourceEffectiveTime".to_string(), FieldValue::Integer(*source_effective_time as i64)),
            ("targetEffectiveTime".to_string(), FieldValue::Integer(*target_effective_time as i64)),
        ],
        RefsetItemKind::MrcmDomain { domain_constraint, parent_domain, proximal_primitive_constraint } => vec![
            ("domainConstraint".to_string(), FieldValue::Str(domain_constraint.clone())),
            ("parentDomain".to_string(), FieldValue::Str(parent_domain.clone())),
            ("proximalPrimitiveConstraint".to_string(), FieldValue::Str(proximal_primitive_constraint.clone())),
        ],
        RefsetItemKind::MrcmAttributeDomain { domain_id, grouped, attribute_cardinality } => vec![
            ("domainId".to_string(), FieldValue::Integer(*domain_id)),
            ("grouped".to_string(), FieldValue::Boolean(*grouped)),
            ("attributeCardinality".to_string(), FieldValue::Str(attribute_cardinality.clone())),
        ],
        RefsetItemKind::MrcmAttributeRange { range_constraint, rule_strength_id } => vec![
            ("rangeConstraint".to_string(), FieldValue::Str(range_constraint.clone())),
            ("ruleStrengthId".to_string(), FieldValue::Integer(*rule_strength_id)),
        ],
    }
}

fn map_target_fields(
    target: &snomed_types::MapTarget,
    correlation_id: SctId,
    map_category_id: Option<SctId>,
) -> Vec<(String, FieldValue)> {
    let mut fields = vec![
        ("mapGroup".to_string(), FieldValue::Integer(target.map_group as i64)),
        ("mapPriority".to_string(), FieldValue::Integer(target.map_priority as i64)),
        ("mapRule".to_string(), FieldValue::Str(target.map_rule.clone())),
        ("mapAdvice".to_string(), FieldValue::Str(target.map_advice.clone())),
        ("mapTarget".to_string(), FieldValue::Str(target.map_target.clone())),
        ("correlationId".to_string(), FieldValue::Integer(correlation_id)),
    ];
    if let Some(category) = map_category_id {
        fields.push(("mapCategoryId".to_string(), FieldValue::Integer(category)));
    }
    fields
}
