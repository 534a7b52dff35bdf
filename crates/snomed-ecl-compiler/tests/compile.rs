//! End-to-end compilation tests against an in-memory store and search index.

use snomed_ecl_compiler::{compile, CompilationContext, CompileError};
use snomed_search::{DescriptionDoc, DescriptionIndex, MemberDoc, MemberIndex};
use snomed_store::{Store, StoreConfig};
use snomed_types::refset::well_known_refsets;
use snomed_types::{
    well_known, ConcreteValue, Rf2Concept, Rf2ConcreteRelationship, Rf2Relationship, RefsetItem,
    RefsetItemHeader, RefsetItemKind,
};

const MODULE: i64 = 900000000000207008;

fn open_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        core_db_path: dir.path().join("core.db"),
        refsets_db_path: dir.path().join("refsets.db"),
        ..StoreConfig::default()
    };
    (dir, Store::open(config).unwrap())
}

fn concept(id: i64) -> Rf2Concept {
    Rf2Concept { id, effective_time: 20200131, active: true, module_id: MODULE, definition_status_id: 900000000000074008 }
}

fn is_a(id: i64, source: i64, destination: i64) -> Rf2Relationship {
    Rf2Relationship {
        id,
        effective_time: 20200131,
        active: true,
        module_id: MODULE,
        source_id: source,
        destination_id: destination,
        relationship_group: 0,
        type_id: well_known::IS_A,
        characteristic_type_id: 900000000000011006,
        modifier_id: 900000000000451002,
    }
}

fn attribute(id: i64, source: i64, type_id: i64, destination: i64, group: u16) -> Rf2Relationship {
    Rf2Relationship {
        id,
        effective_time: 20200131,
        active: true,
        module_id: MODULE,
        source_id: source,
        destination_id: destination,
        relationship_group: group,
        type_id,
        characteristic_type_id: 900000000000011006,
        modifier_id: 900000000000451002,
    }
}

/// Builds a tiny diabetes subtree:
/// 64572001 (Disease) <- 73211009 (Diabetes mellitus) <- 46635009 (Type 1 diabetes mellitus)
/// with 73211009 --FINDING_SITE--> 113331007 (Endocrine system structure).
fn diabetes_fixture() -> (tempfile::TempDir, Store) {
    let (dir, store) = open_store();
    for id in [64572001, 73211009, 46635009, 113331007] {
        store.write_concept(&concept(id)).unwrap();
    }
    store.write_relationship(&is_a(1, 73211009, 64572001)).unwrap();
    store.write_relationship(&is_a(2, 46635009, 73211009)).unwrap();
    store
        .write_relationship(&attribute(3, 73211009, well_known::FINDING_SITE, 113331007, 1))
        .unwrap();
    store.index_relationships().unwrap();
    (dir, store)
}

fn empty_descriptions() -> DescriptionIndex {
    DescriptionIndex::build_in_ram(&[]).unwrap()
}

fn empty_members() -> MemberIndex {
    MemberIndex::build_in_ram(&[]).unwrap()
}

#[test]
fn descendant_of_excludes_self() {
    let (_dir, store) = diabetes_fixture();
    let descriptions = empty_descriptions();
    let members = empty_members();
    let ctx = CompilationContext::new(&store, &descriptions, &members);

    let expr = snomed_ecl::parse("< 73211009").unwrap();
    let result = compile(&expr, &ctx).unwrap();

    assert!(result.contains(46635009));
    assert!(!result.contains(73211009));
    assert!(!result.contains(64572001));
}

#[test]
fn descendant_or_self_of_includes_self() {
    let (_dir, store) = diabetes_fixture();
    let descriptions = empty_descriptions();
    let members = empty_members();
    let ctx = CompilationContext::new(&store, &descriptions, &members);

    let expr = snomed_ecl::parse("<< 73211009").unwrap();
    let result = compile(&expr, &ctx).unwrap();

    assert!(result.contains(46635009));
    assert!(result.contains(73211009));
    assert!(!result.contains(64572001));
}

#[test]
fn attribute_refinement_narrows_to_matching_finding_site() {
    let (_dir, store) = diabetes_fixture();
    let descriptions = empty_descriptions();
    let members = empty_members();
    let ctx = CompilationContext::new(&store, &descriptions, &members);

    let expr = snomed_ecl::parse("<< 64572001 : 363698007 = 113331007").unwrap();
    let result = compile(&expr, &ctx).unwrap();

    assert!(result.contains(73211009));
    assert!(!result.contains(46635009));
    assert!(!result.contains(64572001));
}

#[test]
fn and_or_minus_combine_sets() {
    let (_dir, store) = diabetes_fixture();
    let descriptions = empty_descriptions();
    let members = empty_members();
    let ctx = CompilationContext::new(&store, &descriptions, &members);

    let and_expr = snomed_ecl::parse("<< 73211009 AND << 46635009").unwrap();
    assert_eq!(compile(&and_expr, &ctx).unwrap().into_vec(), vec![46635009]);

    let minus_expr = snomed_ecl::parse("<< 73211009 MINUS 46635009").unwrap();
    let minus_result = compile(&minus_expr, &ctx).unwrap();
    assert!(minus_result.contains(73211009));
    assert!(!minus_result.contains(46635009));
}

#[test]
fn member_of_resolves_against_member_index() {
    let (_dir, store) = open_store();
    store.write_concept(&concept(73211009)).unwrap();

    let refset_id = 447562003;
    let members = MemberIndex::build_in_ram(&[MemberDoc {
        uuid: "11111111-1111-1111-1111-111111111111".into(),
        refset_id,
        referenced_component_id: 73211009,
        module_id: MODULE,
        active: true,
        fields: vec![],
    }])
    .unwrap();
    let descriptions = empty_descriptions();
    let ctx = CompilationContext::new(&store, &descriptions, &members);

    let expr = snomed_ecl::parse(&format!("^ {refset_id}")).unwrap();
    let result = compile(&expr, &ctx).unwrap();
    assert_eq!(result.into_vec(), vec![73211009]);
}

#[test]
fn term_filter_narrows_by_description_text() {
    let (_dir, store) = diabetes_fixture();
    let descriptions = DescriptionIndex::build_in_ram(&[DescriptionDoc {
        description_id: 1,
        concept_id: 73211009,
        term: "Diabetes mellitus".into(),
        language: "en".into(),
        type_id: well_known::FSN_TYPE,
        case_significance_id: 900000000000448009,
        active: true,
        module_id: MODULE,
        preferred_in: vec![],
        acceptable_in: vec![],
        ..Default::default()
    }])
    .unwrap();
    let members = empty_members();
    let ctx = CompilationContext::new(&store, &descriptions, &members);

    let expr = snomed_ecl::parse("<< 64572001 {{ term = \"diabetes\" }}").unwrap();
    let result = compile(&expr, &ctx).unwrap();

    assert_eq!(result.into_vec(), vec![73211009]);
}

#[test]
fn member_filter_matches_map_target_prefix() {
    let (_dir, store) = open_store();
    for id in [73211009, 46635009] {
        store.write_concept(&concept(id)).unwrap();
    }
    store.write_relationship(&is_a(1, 46635009, 73211009)).unwrap();
    store.index_relationships().unwrap();

    let refset_id = well_known_refsets::ICD10_SIMPLE_MAP;
    let members = MemberIndex::build_in_ram(&[
        MemberDoc {
            uuid: "11111111-1111-1111-1111-111111111111".into(),
            refset_id,
            referenced_component_id: 73211009,
            module_id: MODULE,
            active: true,
            fields: vec![("mapTarget".into(), snomed_search::FieldValue::Str("E11.9".into()))],
        },
        MemberDoc {
            uuid: "22222222-2222-2222-2222-222222222222".into(),
            refset_id,
            referenced_component_id: 46635009,
            module_id: MODULE,
            active: true,
            fields: vec![("mapTarget".into(), snomed_search::FieldValue::Str("E10.9".into()))],
        },
    ])
    .unwrap();
    let descriptions = empty_descriptions();
    let ctx = CompilationContext::new(&store, &descriptions, &members);

    let expr = snomed_ecl::parse("<< 73211009 {{ M mapTarget = \"E11\" }}").unwrap();
    let result = compile(&expr, &ctx).unwrap();

    assert_eq!(result.into_vec(), vec![73211009]);
}

#[test]
fn concrete_value_refinement_matches_numeric_attribute() {
    let (_dir, store) = open_store();
    store.write_concept(&concept(373873005)).unwrap();
    store
        .write_concrete_value(&Rf2ConcreteRelationship {
            id: 1,
            effective_time: 20200131,
            active: true,
            module_id: MODULE,
            source_id: 373873005,
            value: ConcreteValue::Integer(500),
            relationship_group: 1,
            type_id: 732947008,
            characteristic_type_id: 900000000000011006,
            modifier_id: 900000000000451002,
        })
        .unwrap();
    let descriptions = empty_descriptions();
    let members = empty_members();
    let ctx = CompilationContext::new(&store, &descriptions, &members);

    let expr = snomed_ecl::parse("373873005 : 732947008 = #500").unwrap();
    let result = compile(&expr, &ctx).unwrap();
    assert_eq!(result.into_vec(), vec![373873005]);

    let mismatch = snomed_ecl::parse("373873005 : 732947008 = #250").unwrap();
    assert!(compile(&mismatch, &ctx).unwrap().is_empty());
}

#[test]
fn history_supplement_adds_replaced_predecessor() {
    let (_dir, store) = open_store();
    store.write_concept(&concept(73211009)).unwrap();

    let refset_id = well_known_refsets::REPLACED_BY_REFSET;
    store
        .write_refset_item(
            &[],
            &RefsetItem {
                header: RefsetItemHeader {
                    uuid: uuid::Uuid::new_v4(),
                    effective_time: 20200131,
                    active: true,
                    module_id: MODULE,
                    refset_id,
                    referenced_component_id: 999999990,
                },
                kind: RefsetItemKind::Association { target_component_id: 73211009 },
            },
        )
        .unwrap();
    store.index_refsets().unwrap();

    let descriptions = empty_descriptions();
    let members = empty_members();
    let ctx = CompilationContext::new(&store, &descriptions, &members);

    let expr = snomed_ecl::parse("73211009 {{ +HISTORY-MOD }}").unwrap();
    let result = compile(&expr, &ctx).unwrap();

    assert!(result.contains(73211009));
    assert!(result.contains(999999990));
}

#[test]
fn cardinality_range_counts_matching_attribute_groups() {
    let (_dir, store) = open_store();
    store.write_concept(&concept(373873005)).unwrap();
    let links: [(i64, u16); 3] = [(1001, 1), (1002, 2), (1003, 3)];
    for (destination, group) in links {
        store.write_concept(&concept(destination)).unwrap();
        store
            .write_relationship(&attribute(100 + group as i64, 373873005, 127489000, destination, group))
            .unwrap();
    }
    store.index_relationships().unwrap();
    let descriptions = empty_descriptions();
    let members = empty_members();
    let ctx = CompilationContext::new(&store, &descriptions, &members);

    let in_range = snomed_ecl::parse("373873005 : [3..5] 127489000 = *").unwrap();
    assert_eq!(compile(&in_range, &ctx).unwrap().into_vec(), vec![373873005]);

    let out_of_range = snomed_ecl::parse("373873005 : [4..5] 127489000 = *").unwrap();
    assert!(compile(&out_of_range, &ctx).unwrap().is_empty());
}

#[test]
fn zero_cardinality_matches_absence_of_attribute() {
    let (_dir, store) = open_store();
    store.write_concept(&concept(64572001)).unwrap();
    let descriptions = empty_descriptions();
    let members = empty_members();
    let ctx = CompilationContext::new(&store, &descriptions, &members);

    let expr = snomed_ecl::parse("64572001 : [0..0] 363698007 = *").unwrap();
    assert_eq!(compile(&expr, &ctx).unwrap().into_vec(), vec![64572001]);
}

#[test]
fn dialect_and_type_filters_narrow_wildcard_term_match() {
    let (_dir, store) = diabetes_fixture();
    let refset_id: i64 = 999001261000000100; // GB English language reference set
    let descriptions = DescriptionIndex::build_in_ram(&[
        DescriptionDoc {
            description_id: 1,
            concept_id: 73211009,
            term: "Cardiomyopathy".into(),
            language: "en".into(),
            type_id: well_known::SYNONYM_TYPE,
            case_significance_id: 900000000000448009,
            active: true,
            module_id: MODULE,
            preferred_in: vec![refset_id],
            acceptable_in: vec![],
            ..Default::default()
        },
        DescriptionDoc {
            description_id: 2,
            concept_id: 46635009,
            term: "Cardiomyopathy".into(),
            language: "en".into(),
            type_id: well_known::FSN_TYPE,
            case_significance_id: 900000000000448009,
            active: true,
            module_id: MODULE,
            preferred_in: vec![],
            acceptable_in: vec![],
            ..Default::default()
        },
    ])
    .unwrap();
    let members = empty_members();
    let ctx = CompilationContext::new(&store, &descriptions, &members);

    let expr = snomed_ecl::parse(&format!(
        "<< 64572001 {{{{ term wild= \"cardi*opathy\", type = syn, dialect = {refset_id} }}}}"
    ))
    .unwrap();
    let result = compile(&expr, &ctx).unwrap();

    assert_eq!(result.into_vec(), vec![73211009]);
}

#[test]
fn any_wildcard_matches_every_concept() {
    let (_dir, store) = open_store();
    store.write_concept(&concept(73211009)).unwrap();
    store.write_concept(&concept(46635009)).unwrap();
    let descriptions = empty_descriptions();
    let members = empty_members();
    let ctx = CompilationContext::new(&store, &descriptions, &members);

    let expr = snomed_ecl::parse("*").unwrap();
    let result = compile(&expr, &ctx).unwrap();

    assert_eq!(result.len(), 2);
}

#[test]
fn descendant_wildcard_resolves_to_descendants_of_root() {
    let (_dir, store) = open_store();
    store.write_concept(&concept(well_known::SNOMED_CT_ROOT)).unwrap();
    store.write_concept(&concept(64572001)).unwrap();
    store.write_concept(&concept(73211009)).unwrap();
    store.write_relationship(&is_a(1, 64572001, well_known::SNOMED_CT_ROOT)).unwrap();
    store.write_relationship(&is_a(2, 73211009, 64572001)).unwrap();
    store.index_relationships().unwrap();

    let descriptions = empty_descriptions();
    let members = empty_members();
    let ctx = CompilationContext::new(&store, &descriptions, &members);

    let proper = snomed_ecl::parse("<*").unwrap();
    let proper_result = compile(&proper, &ctx).unwrap();
    assert!(proper_result.contains(64572001));
    assert!(proper_result.contains(73211009));
    assert!(!proper_result.contains(well_known::SNOMED_CT_ROOT));

    let or_self = snomed_ecl::parse("<<!*").unwrap();
    let or_self_result = compile(&or_self, &ctx).unwrap();
    assert!(or_self_result.contains(well_known::SNOMED_CT_ROOT));
    assert!(or_self_result.contains(64572001));
}

#[test]
fn ancestor_wildcard_is_rejected() {
    let (_dir, store) = open_store();
    let descriptions = empty_descriptions();
    let members = empty_members();
    let ctx = CompilationContext::new(&store, &descriptions, &members);

    let proper = snomed_ecl::parse(">*").unwrap();
    assert!(matches!(compile(&proper, &ctx), Err(CompileError::Unsupported(_))));

    let or_self = snomed_ecl::parse(">>!*").unwrap();
    assert!(matches!(compile(&or_self, &ctx), Err(CompileError::Unsupported(_))));
}
