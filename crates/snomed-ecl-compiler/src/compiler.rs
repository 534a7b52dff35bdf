//! Compiles a parsed [`EclExpression`] into a realised [`ConceptSet`].
//!
//! Each construct below mirrors one row of the ECL compilation table: a
//! focus expression resolves against the concept graph in `snomed-store`,
//! `{{ ... }}` filters narrow the result through `snomed-search` or the
//! concept's own properties, and `+HISTORY` extends it with historical
//! predecessors after every other filter has applied.

use std::collections::{HashMap, HashSet};

use snomed_ecl::{
    AttributeConstraint, AttributeGroup, ComparisonOperator, EclExpression, EclFilter,
    FilterAcceptability, HistoryProfile, MemberFieldValue, RefinementOperator,
};
use snomed_search::{FieldComparison, FieldValue, MatchMode};
use snomed_store::Store;
use snomed_types::refset::well_known_refsets;
use snomed_types::{well_known, ConcreteValue, SctId};

use crate::context::CompilationContext;
use crate::error::{CompileError, CompileResult};
use crate::query::ConceptSet;

/// Compiles and realises `expression` against `ctx`.
pub fn compile(expression: &EclExpression, ctx: &CompilationContext<'_>) -> CompileResult<ConceptSet> {
    match expression {
        EclExpression::ConceptReference { concept_id, .. } => compile_self(*concept_id, ctx),
        EclExpression::Any => Ok(ConceptSet::from_ids(ctx.store.all_concept_ids(false)?)),
        EclExpression::MemberOf { refset_id, .. } => compile_member_of(*refset_id, ctx),
        EclExpression::DescendantOf(inner) => compile_hierarchy_from_root(inner, ctx, descendants_proper),
        EclExpression::DescendantOrSelfOf(inner) => compile_hierarchy_from_root(inner, ctx, descendants_or_self),
        EclExpression::ChildOf(inner) => compile_hierarchy_from_root(inner, ctx, children_proper),
        EclExpression::ChildOrSelfOf(inner) => compile_hierarchy_from_root(inner, ctx, children_or_self),
        EclExpression::AncestorOf(inner) => compile_hierarchy_reject_wildcard(inner, ctx, ancestors_proper),
        EclExpression::AncestorOrSelfOf(inner) => compile_hierarchy_reject_wildcard(inner, ctx, ancestors_or_self),
        EclExpression::ParentOf(inner) => compile_hierarchy_reject_wildcard(inner, ctx, parents_proper),
        EclExpression::ParentOrSelfOf(inner) => compile_hierarchy_reject_wildcard(inner, ctx, parents_or_self),
        EclExpression::And(a, b) => Ok(compile(a, ctx)?.intersection(&compile(b, ctx)?)),
        EclExpression::Or(a, b) => Ok(compile(a, ctx)?.union(&compile(b, ctx)?)),
        EclExpression::Minus(a, b) => Ok(compile(a, ctx)?.difference(&compile(b, ctx)?)),
        EclExpression::Nested(inner) => compile(inner, ctx),
        EclExpression::Refined { focus, refinement } => {
            let base = compile(focus, ctx)?;
            compile_refinement(base, &refinement.ungrouped, &refinement.groups, ctx)
        }
        EclExpression::DotNotation { source, attribute_type } => compile_dot_notation(source, attribute_type, ctx),
        EclExpression::Concrete { .. } => {
            Err(CompileError::Unsupported("a concrete value is only meaningful as a refinement value".into()))
        }
        EclExpression::Filtered { expression, filters } => {
            let base = compile(expression, ctx)?;
            compile_filters(base, filters, ctx)
        }
        EclExpression::TopOfSet(inner) => {
            let set = compile(inner, ctx)?;
            top_of_set(&set, ctx.store)
        }
        EclExpression::BottomOfSet(inner) => {
            let set = compile(inner, ctx)?;
            bottom_of_set(&set, ctx.store)
        }
    }
}

fn compile_self(concept_id: SctId, ctx: &CompilationContext<'_>) -> CompileResult<ConceptSet> {
    Ok(match ctx.store.concept(concept_id)? {
        Some(_) => ConceptSet::singleton(concept_id),
        None => ConceptSet::new(),
    })
}

fn compile_member_of(refset_id: SctId, ctx: &CompilationContext<'_>) -> CompileResult<ConceptSet> {
    if refset_id == 0 {
        let mut set = ConceptSet::new();
        for installed in ctx.store.installed_reference_sets()? {
            set.extend(&ConceptSet::from_ids(ctx.members.members_of(installed)?));
        }
        return Ok(set);
    }
    Ok(ConceptSet::from_ids(ctx.members.members_of(refset_id)?))
}

fn compile_hierarchy(
    inner: &EclExpression,
    ctx: &CompilationContext<'_>,
    expand: impl Fn(&Store, SctId) -> CompileResult<HashSet<SctId>>,
) -> CompileResult<ConceptSet> {
    let base = compile(inner, ctx)?;
    let mut result = ConceptSet::new();
    for concept_id in base.iter() {
        result.extend(&ConceptSet::from_ids(expand(ctx.store, concept_id)?));
    }
    Ok(result)
}

/// `<*`/`<<*` have no general-purpose meaning as "descendants of every
/// concept" — SNOMED ECL defines the wildcard applied to a descendant
/// operator as the descendants of root specifically, so it's resolved
/// directly against [`well_known::SNOMED_CT_ROOT`] rather than falling
/// through to [`compile_hierarchy`]'s per-concept expansion.
fn compile_hierarchy_from_root(
    inner: &EclExpression,
    ctx: &CompilationContext<'_>,
    expand: impl Fn(&Store, SctId) -> CompileResult<HashSet<SctId>>,
) -> CompileResult<ConceptSet> {
    if matches!(inner, EclExpression::Any) {
        return Ok(ConceptSet::from_ids(expand(ctx.store, well_known::SNOMED_CT_ROOT)?));
    }
    compile_hierarchy(inner, ctx, expand)
}

/// `>*`/`>!*` have no finite result — "ancestors of every concept" is
/// effectively every non-leaf concept in the terminology and isn't a
/// meaningful query, so it's rejected rather than silently computed.
fn compile_hierarchy_reject_wildcard(
    inner: &EclExpression,
    ctx: &CompilationContext<'_>,
    expand: impl Fn(&Store, SctId) -> CompileResult<HashSet<SctId>>,
) -> CompileResult<ConceptSet> {
    if matches!(inner, EclExpression::Any) {
        return Err(CompileError::Unsupported("> * is not supported".into()));
    }
    compile_hierarchy(inner, ctx, expand)
}

fn descendants_proper(store: &Store, concept_id: SctId) -> CompileResult<HashSet<SctId>> {
    let mut set = store.all_children(concept_id, None)?;
    set.remove(&concept_id);
    Ok(set)
}

fn descendants_or_self(store: &Store, concept_id: SctId) -> CompileResult<HashSet<SctId>> {
    Ok(store.all_children(concept_id, None)?)
}

fn ancestors_proper(store: &Store, concept_id: SctId) -> CompileResult<HashSet<SctId>> {
    let mut set = store.all_parents(concept_id, None)?;
    set.remove(&concept_id);
    Ok(set)
}

fn ancestors_or_self(store: &Store, concept_id: SctId) -> CompileResult<HashSet<SctId>> {
    Ok(store.all_parents(concept_id, None)?)
}

fn parents_proper(store: &Store, concept_id: SctId) -> CompileResult<HashSet<SctId>> {
    Ok(store.proximal_parent_ids(concept_id)?)
}

fn parents_or_self(store: &Store, concept_id: SctId) -> CompileResult<HashSet<SctId>> {
    let mut set = store.proximal_parent_ids(concept_id)?;
    set.insert(concept_id);
    Ok(set)
}

fn children_proper(store: &Store, concept_id: SctId) -> CompileResult<HashSet<SctId>> {
    Ok(store
        .raw_child_relationships(concept_id, Some(well_known::IS_A))?
        .into_iter()
        .map(|(_, _, _, source)| source)
        .collect())
}

fn children_or_self(store: &Store, concept_id: SctId) -> CompileResult<HashSet<SctId>> {
    let mut set = children_proper(store, concept_id)?;
    set.insert(concept_id);
    Ok(set)
}

/// The most general members of `set`: those with no proper ancestor also
/// present. Mirrors [`Store::leaves`], which computes the symmetric
/// "most specific" case via ancestor closures instead of descendant ones.
fn top_of_set(set: &ConceptSet, store: &Store) -> CompileResult<ConceptSet> {
    let mut covered = HashSet::new();
    for concept_id in set.iter() {
        let mut descendants = store.all_children(concept_id, None)?;
        descendants.remove(&concept_id);
        covered.extend(descendants);
    }
    Ok(ConceptSet::from_ids(set.iter().filter(|id| !covered.contains(id))))
}

fn bottom_of_set(set: &ConceptSet, store: &Store) -> CompileResult<ConceptSet> {
    let ids: HashSet<SctId> = set.iter().collect();
    Ok(ConceptSet::from_ids(store.leaves(&ids)?))
}

fn compile_dot_notation(
    source: &EclExpression,
    attribute_type: &EclExpression,
    ctx: &CompilationContext<'_>,
) -> CompileResult<ConceptSet> {
    let sources = compile(source, ctx)?;
    let types = compile(attribute_type, ctx)?;
    let mut result = ConceptSet::new();
    for concept_id in sources.iter() {
        for (type_id, destinations) in ctx.store.parent_relationships(concept_id)? {
            if types.contains(type_id) {
                result.extend(&ConceptSet::from_ids(destinations));
            }
        }
    }
    Ok(result)
}

// ---------------------------------------------------------------------
// Attribute refinement
// ---------------------------------------------------------------------

fn compile_refinement(
    base: ConceptSet,
    ungrouped: &[AttributeConstraint],
    groups: &[AttributeGroup],
    ctx: &CompilationContext<'_>,
) -> CompileResult<ConceptSet> {
    // Resolved once per constraint rather than once per candidate concept: a
    // plain `=`/`<<` refinement against the description index's attribute
    // fields turns every concept's membership check into a single hash
    // lookup instead of a per-concept relationship walk.
    let fast_hits: Vec<Option<HashSet<SctId>>> =
        ungrouped.iter().map(|constraint| fast_path_hits(constraint, ctx)).collect::<CompileResult<_>>()?;

    let mut matches = Vec::new();
    for concept_id in base.iter() {
        if satisfies_refinement(concept_id, ungrouped, &fast_hits, groups, ctx)? {
            matches.push(concept_id);
        }
    }
    Ok(ConceptSet::from_ids(matches))
}

/// Attempts to answer `constraint` entirely from the description index's
/// precomputed attribute fields. Only the common shape — ungrouped, default
/// cardinality, `=`, and a value that's a plain concept reference, a `<<`
/// subsumption, or an `OR` of those — is handled; anything else (reverse
/// attributes, explicit cardinality, `!=`, nested value expressions) returns
/// `None` and falls back to the per-concept store walk in
/// [`satisfies_refinement`].
fn fast_path_hits(
    constraint: &AttributeConstraint,
    ctx: &CompilationContext<'_>,
) -> CompileResult<Option<HashSet<SctId>>> {
    if constraint.reverse || constraint.cardinality.is_some() || constraint.operator != RefinementOperator::Equal {
        return Ok(None);
    }
    let Some(terms) = simple_value_terms(&constraint.value) else {
        return Ok(None);
    };

    let attribute_types: Vec<SctId> = compile(&constraint.attribute_type, ctx)?.iter().collect();
    if attribute_types.is_empty() {
        return Ok(Some(HashSet::new()));
    }

    let direct_ids: Vec<SctId> = terms.iter().filter(|(transitive, _)| !transitive).map(|(_, id)| *id).collect();
    let transitive_ids: Vec<SctId> = terms.iter().filter(|(transitive, _)| *transitive).map(|(_, id)| *id).collect();

    let mut hits = HashSet::new();
    if !direct_ids.is_empty() {
        hits.extend(ctx.descriptions.concepts_with_attribute(&attribute_types, &direct_ids, false)?);
    }
    if !transitive_ids.is_empty() {
        hits.extend(ctx.descriptions.concepts_with_attribute(&attribute_types, &transitive_ids, true)?);
    }
    Ok(Some(hits))
}

/// Flattens a refinement value into `(transitive, concept_id)` pairs when
/// it's a shape the attribute index can answer directly. `None` for
/// anything the index doesn't have a field for (nested refinements,
/// `memberOf`, dot notation, ...).
fn simple_value_terms(value: &EclExpression) -> Option<Vec<(bool, SctId)>> {
    match value {
        EclExpression::ConceptReference { concept_id, .. } => Some(vec![(false, *concept_id)]),
        EclExpression::DescendantOrSelfOf(inner) => match inner.as_ref() {
            EclExpression::ConceptReference { concept_id, .. } => Some(vec![(true, *concept_id)]),
            _ => None,
        },
        EclExpression::Nested(inner) => simple_value_terms(inner),
        EclExpression::Or(a, b) => {
            let mut terms = simple_value_terms(a)?;
            terms.extend(simple_value_terms(b)?);
            Some(terms)
        }
        _ => None,
    }
}

fn satisfies_refinement(
    concept_id: SctId,
    ungrouped: &[AttributeConstraint],
    fast_hits: &[Option<HashSet<SctId>>],
    groups: &[AttributeGroup],
    ctx: &CompilationContext<'_>,
) -> CompileResult<bool> {
    // Relationship groups and concrete values are only fetched from the
    // store when something actually needs them: a concept whose ungrouped
    // constraints all resolved through the attribute index, and that has no
    // grouped refinement to satisfy, never touches the store at all.
    let needs_store_data = !groups.is_empty()
        || ungrouped.iter().zip(fast_hits).any(|(constraint, fast)| !constraint.reverse && fast.is_none());
    let (grouped, concrete) = if needs_store_data {
        (ctx.store.grouped_properties(concept_id, None)?, ctx.store.concrete_values(concept_id)?)
    } else {
        (HashMap::new(), Vec::new())
    };

    for (constraint, fast) in ungrouped.iter().zip(fast_hits) {
        // Reverse attributes look at who points at `concept_id`, not at its own
        // relationship groups, so they're evaluated once rather than folded into
        // the per-group occurrence count below.
        if constraint.reverse {
            if constraint.cardinality.is_some() {
                return Err(CompileError::Unsupported("cardinality combined with the R (reverse) flag".into()));
            }
            let attribute_types = compile(&constraint.attribute_type, ctx)?;
            let matched = reverse_attribute_matches(concept_id, &attribute_types, &constraint.value, ctx)?;
            let satisfied = match constraint.operator {
                RefinementOperator::Equal => matched,
                RefinementOperator::NotEqual => !matched,
            };
            if !satisfied {
                return Ok(false);
            }
            continue;
        }

        if let Some(hits) = fast {
            let count = u32::from(hits.contains(&concept_id));
            let cardinality = constraint.cardinality.unwrap_or(snomed_ecl::Cardinality { min: 1, max: None });
            if !cardinality.matches(count) {
                return Ok(false);
            }
            continue;
        }

        let count = count_matches_any_group(concept_id, constraint, &grouped, &concrete, ctx)?;
        let cardinality = constraint.cardinality.unwrap_or(snomed_ecl::Cardinality { min: 1, max: None });
        if !cardinality.matches(count) {
            return Ok(false);
        }
    }

    for group in groups {
        let relationship_groups: HashSet<u32> =
            grouped.keys().copied().chain(concrete.iter().map(|c| c.relationship_group as u32)).collect();

        let mut satisfying_groups = 0u32;
        for relationship_group in relationship_groups {
            let mut all_met = true;
            for constraint in &group.constraints {
                if !group_satisfies_constraint(relationship_group, concept_id, constraint, &grouped, &concrete, ctx)? {
                    all_met = false;
                    break;
                }
            }
            if all_met {
                satisfying_groups += 1;
            }
        }

        let cardinality = group.cardinality.unwrap_or(snomed_ecl::Cardinality { min: 1, max: None });
        if !cardinality.matches(satisfying_groups) {
            return Ok(false);
        }
    }

    Ok(true)
}

fn count_matches_any_group(
    concept_id: SctId,
    constraint: &AttributeConstraint,
    grouped: &std::collections::HashMap<u32, Vec<(SctId, SctId)>>,
    concrete: &[snomed_types::Rf2ConcreteRelationship],
    ctx: &CompilationContext<'_>,
) -> CompileResult<u32> {
    let mut count = 0;
    let relationship_groups: HashSet<u32> =
        grouped.keys().copied().chain(concrete.iter().map(|c| c.relationship_group as u32)).collect();
    for relationship_group in relationship_groups {
        if group_satisfies_constraint(relationship_group, concept_id, constraint, grouped, concrete, ctx)? {
            count += 1;
        }
    }
    Ok(count)
}

fn group_satisfies_constraint(
    relationship_group: u32,
    concept_id: SctId,
    constraint: &AttributeConstraint,
    grouped: &std::collections::HashMap<u32, Vec<(SctId, SctId)>>,
    concrete: &[snomed_types::Rf2ConcreteRelationship],
    ctx: &CompilationContext<'_>,
) -> CompileResult<bool> {
    if constraint.cardinality.is_some() && constraint.reverse {
        return Err(CompileError::Unsupported("cardinality combined with the R (reverse) flag".into()));
    }

    let attribute_types = compile(&constraint.attribute_type, ctx)?;

    let matched = if constraint.reverse {
        reverse_attribute_matches(concept_id, &attribute_types, &constraint.value, ctx)?
    } else {
        let empty = Vec::new();
        let relationships = grouped.get(&relationship_group).unwrap_or(&empty);
        let mut found = relationships
            .iter()
            .filter(|(type_id, _)| attribute_types.contains(*type_id))
            .any(|(_, destination)| attribute_value_matches(*destination, &constraint.value, ctx).unwrap_or(false));

        if !found {
            found = concrete
                .iter()
                .filter(|c| c.relationship_group as u32 == relationship_group && attribute_types.contains(c.type_id))
                .any(|c| concrete_value_matches(&c.value, &constraint.value));
        }
        found
    };

    Ok(match constraint.operator {
        RefinementOperator::Equal => matched,
        RefinementOperator::NotEqual => !matched,
    })
}

fn attribute_value_matches(
    destination: SctId,
    value: &EclExpression,
    ctx: &CompilationContext<'_>,
) -> CompileResult<bool> {
    if matches!(value, EclExpression::Concrete { .. }) {
        return Ok(false);
    }
    let allowed = compile(value, ctx)?;
    Ok(allowed.contains(destination))
}

fn concrete_value_matches(actual: &ConcreteValue, value: &EclExpression) -> bool {
    match value {
        EclExpression::Concrete { value: expected, .. } => actual == expected,
        _ => false,
    }
}

fn reverse_attribute_matches(
    concept_id: SctId,
    attribute_types: &ConceptSet,
    value: &EclExpression,
    ctx: &CompilationContext<'_>,
) -> CompileResult<bool> {
    let sources = compile(value, ctx)?;
    for type_id in attribute_types.iter() {
        for (_, _, _, source) in ctx.store.raw_child_relationships(concept_id, Some(type_id))? {
            if sources.contains(source) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

// ---------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------

fn compile_filters(
    base: ConceptSet,
    filters: &[EclFilter],
    ctx: &CompilationContext<'_>,
) -> CompileResult<ConceptSet> {
    let history = filters.iter().find_map(|f| match f {
        EclFilter::History(profile) => Some(*profile),
        _ => None,
    });

    let mut set = base;
    for filter in filters {
        if matches!(filter, EclFilter::History(_)) {
            continue;
        }
        set = apply_filter(set, filter, ctx)?;
    }

    if let Some(profile) = history {
        set = extend_with_history(set, profile, ctx.store)?;
    }
    Ok(set)
}

fn apply_filter(set: ConceptSet, filter: &EclFilter, ctx: &CompilationContext<'_>) -> CompileResult<ConceptSet> {
    match filter {
        EclFilter::Term { match_type, value } => {
            let mode = match match_type {
                snomed_ecl::TermMatchType::Contains => MatchMode::Contains,
                snomed_ecl::TermMatchType::StartsWith => MatchMode::StartsWith,
                snomed_ecl::TermMatchType::Wildcard => MatchMode::Wildcard,
                snomed_ecl::TermMatchType::Regex => MatchMode::Regex,
                snomed_ecl::TermMatchType::Exact => MatchMode::Exact,
            };
            let hits = ctx.descriptions.search(&snomed_search::DescriptionQuery {
                term: Some((mode, value.clone())),
                ..Default::default()
            })?;
            Ok(set.intersection(&ConceptSet::from_ids(hits)))
        }
        EclFilter::Language(languages) => {
            let hits = ctx.descriptions.search(&snomed_search::DescriptionQuery {
                languages: Some(languages.clone()),
                ..Default::default()
            })?;
            Ok(set.intersection(&ConceptSet::from_ids(hits)))
        }
        EclFilter::DescriptionType(type_ids) => {
            let hits = ctx.descriptions.search(&snomed_search::DescriptionQuery {
                type_ids: Some(type_ids.clone()),
                ..Default::default()
            })?;
            Ok(set.intersection(&ConceptSet::from_ids(hits)))
        }
        EclFilter::Dialect { refset_ids, acceptability } => {
            let query = match acceptability {
                Some(FilterAcceptability::Preferred) => {
                    snomed_search::DescriptionQuery { preferred_in: Some(refset_ids.clone()), ..Default::default() }
                }
                _ => snomed_search::DescriptionQuery { acceptable_in: Some(refset_ids.clone()), ..Default::default() },
            };
            let hits = ctx.descriptions.search(&query)?;
            Ok(set.intersection(&ConceptSet::from_ids(hits)))
        }
        EclFilter::CaseSignificance(id) => {
            let hits = ctx.descriptions.search(&snomed_search::DescriptionQuery {
                case_significance_ids: Some(vec![*id]),
                ..Default::default()
            })?;
            Ok(set.intersection(&ConceptSet::from_ids(hits)))
        }
        EclFilter::Active(active) => filter_concepts(set, ctx.store, |concept| concept.active == *active),
        EclFilter::Module { module_ids, negated } => filter_concepts(set, ctx.store, |concept| {
            module_ids.contains(&concept.module_id) != *negated
        }),
        EclFilter::EffectiveTime { operator, date } => {
            filter_concepts(set, ctx.store, |concept| compare(concept.effective_time, *operator, *date))
        }
        EclFilter::DefinitionStatus { is_primitive } => {
            filter_concepts(set, ctx.store, |concept| concept.is_primitive() == *is_primitive)
        }
        EclFilter::SemanticTag(tags) => {
            let mut hits = ConceptSet::new();
            for tag in tags {
                let regex = format!(r".*\({}\)$", regex_escape(tag));
                let found = ctx.descriptions.search(&snomed_search::DescriptionQuery {
                    term: Some((MatchMode::Regex, regex)),
                    type_ids: Some(vec![well_known::FSN_TYPE]),
                    ..Default::default()
                })?;
                hits.extend(&ConceptSet::from_ids(found));
            }
            Ok(set.intersection(&hits))
        }
        EclFilter::PreferredIn(refset_ids) => {
            let hits = ctx.descriptions.search(&snomed_search::DescriptionQuery {
                preferred_in: Some(refset_ids.clone()),
                ..Default::default()
            })?;
            Ok(set.intersection(&ConceptSet::from_ids(hits)))
        }
        EclFilter::AcceptableIn(refset_ids) => {
            let hits = ctx.descriptions.search(&snomed_search::DescriptionQuery {
                acceptable_in: Some(refset_ids.clone()),
                ..Default::default()
            })?;
            Ok(set.intersection(&ConceptSet::from_ids(hits)))
        }
        EclFilter::LanguageRefSet(refset_ids) => {
            let mut hits = ConceptSet::from_ids(ctx.descriptions.search(&snomed_search::DescriptionQuery {
                preferred_in: Some(refset_ids.clone()),
                ..Default::default()
            })?);
            hits.extend(&ConceptSet::from_ids(ctx.descriptions.search(&snomed_search::DescriptionQuery {
                acceptable_in: Some(refset_ids.clone()),
                ..Default::default()
            })?));
            Ok(set.intersection(&hits))
        }
        EclFilter::Member { field, operator, value } => {
            let comparison = match operator {
                ComparisonOperator::Equal => FieldComparison::Equal,
                ComparisonOperator::NotEqual => FieldComparison::NotEqual,
                ComparisonOperator::LessThan => FieldComparison::LessThan,
                ComparisonOperator::LessThanOrEqual => FieldComparison::LessThanOrEqual,
                ComparisonOperator::GreaterThan => FieldComparison::GreaterThan,
                ComparisonOperator::GreaterThanOrEqual => FieldComparison::GreaterThanOrEqual,
            };
            let field_value = member_field_value(value);
            let mut hits = ConceptSet::new();
            for refset_id in ctx.store.installed_reference_sets()? {
                let matches = ctx.members.filter(refset_id, field, comparison, &field_value)?;
                hits.extend(&ConceptSet::from_ids(matches));
            }
            Ok(set.intersection(&hits))
        }
        EclFilter::Id(ids) => Ok(set.intersection(&ConceptSet::from_ids(ids.clone()))),
        EclFilter::History(_) => Ok(set),
    }
}

fn member_field_value(value: &MemberFieldValue) -> FieldValue {
    match value {
        MemberFieldValue::Str(s) => FieldValue::Str(s.clone()),
        MemberFieldValue::Integer(i) => FieldValue::Integer(*i),
        MemberFieldValue::Decimal(d) => FieldValue::Decimal(*d),
        MemberFieldValue::Boolean(b) => FieldValue::Boolean(*b),
        MemberFieldValue::Component(id) => FieldValue::Integer(*id),
    }
}

fn filter_concepts(
    set: ConceptSet,
    store: &Store,
    predicate: impl Fn(&snomed_types::Rf2Concept) -> bool,
) -> CompileResult<ConceptSet> {
    let mut kept = Vec::new();
    for concept_id in set.iter() {
        if let Some(concept) = store.concept(concept_id)? {
            if predicate(&concept) {
                kept.push(concept_id);
            }
        }
    }
    Ok(ConceptSet::from_ids(kept))
}

fn compare(actual: u32, operator: ComparisonOperator, expected: u32) -> bool {
    match operator {
        ComparisonOperator::Equal => actual == expected,
        ComparisonOperator::NotEqual => actual != expected,
        ComparisonOperator::LessThan => actual < expected,
        ComparisonOperator::LessThanOrEqual => actual <= expected,
        ComparisonOperator::GreaterThan => actual > expected,
        ComparisonOperator::GreaterThanOrEqual => actual >= expected,
    }
}

fn regex_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn extend_with_history(set: ConceptSet, profile: HistoryProfile, store: &Store) -> CompileResult<ConceptSet> {
    let refsets = history_refsets(profile);
    let mut extended = set.clone();
    for concept_id in set.iter() {
        for refset_id in &refsets {
            let predecessors = store.source_association_referenced_components(concept_id, *refset_id)?;
            extended.extend(&ConceptSet::from_ids(predecessors));
        }
    }
    Ok(extended)
}

fn history_refsets(profile: HistoryProfile) -> Vec<SctId> {
    use well_known_refsets::*;
    match profile {
        HistoryProfile::Min => vec![SAME_AS_REFSET],
        HistoryProfile::Mod => vec![SAME_AS_REFSET, REPLACED_BY_REFSET, POSSIBLY_EQUIVALENT_TO_REFSET],
        HistoryProfile::Max => vec![
            SAME_AS_REFSET,
            REPLACED_BY_REFSET,
            POSSIBLY_EQUIVALENT_TO_REFSET,
            WAS_A_REFSET,
            MOVED_TO_REFSET,
            MOVED_FROM_REFSET,
            ALTERNATIVE_REFSET,
        ],
    }
}
