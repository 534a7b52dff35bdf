//! `nom`-based recursive-descent parser for ECL v2.0 expression constraints.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_until, take_while, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{all_consuming, map, opt, recognize, value},
    multi::{separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use snomed_types::{well_known, ConcreteValue, SctId};

use crate::ast::{
    AttributeConstraint, AttributeGroup, Cardinality, ComparisonOperator, EclExpression,
    EclFilter, FilterAcceptability, HistoryProfile, MemberFieldValue, Refinement,
    RefinementOperator, TermMatchType,
};
use crate::error::{EclError, EclResult};

/// Parses a complete ECL expression constraint.
///
/// ```
/// let expr = snomed_ecl::parse("<< 404684003 |Clinical finding|").unwrap();
/// assert!(matches!(expr, snomed_ecl::EclExpression::DescendantOrSelfOf(_)));
/// ```
pub fn parse(input: &str) -> EclResult<EclExpression> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(EclError::Empty);
    }

    match all_consuming(expression_constraint)(trimmed) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(EclError::Syntax {
            position: trimmed.len() - e.input.len(),
            message: format!("unexpected input near '{}'", truncate(e.input, 24)),
        }),
        Err(nom::Err::Incomplete(_)) => {
            Err(EclError::UnexpectedEnd("expression constraint".to_string()))
        }
    }
}

fn truncate(s: &str, max_len: usize) -> &str {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn expression_constraint(input: &str) -> IResult<&str, EclExpression> {
    delimited(ws, compound_or_simple_expression, ws)(input)
}

fn compound_or_simple_expression(input: &str) -> IResult<&str, EclExpression> {
    let (input, first) = refined_expression(input)?;
    compound_tail(input, first)
}

#[derive(Debug, Clone, Copy)]
enum CompoundOp {
    And,
    Or,
    Minus,
}

fn compound_tail(input: &str, left: EclExpression) -> IResult<&str, EclExpression> {
    let attempt = alt((preceded(mws, word_compound_operator), preceded(ws, comma_operator)))(input);

    match attempt {
        Ok((rest, op)) => {
            let (rest, right) = preceded(ws, sub_expression_constraint)(rest)?;
            let combined = match op {
                CompoundOp::And => EclExpression::And(Box::new(left), Box::new(right)),
                CompoundOp::Or => EclExpression::Or(Box::new(left), Box::new(right)),
                CompoundOp::Minus => EclExpression::Minus(Box::new(left), Box::new(right)),
            };
            compound_tail(rest, combined)
        }
        Err(_) => Ok((input, left)),
    }
}

fn word_compound_operator(input: &str) -> IResult<&str, CompoundOp> {
    alt((
        value(CompoundOp::And, tag_no_case("AND")),
        value(CompoundOp::Or, tag_no_case("OR")),
        value(CompoundOp::Minus, tag_no_case("MINUS")),
    ))(input)
}

fn comma_operator(input: &str) -> IResult<&str, CompoundOp> {
    value(CompoundOp::And, char(','))(input)
}

fn base_sub_expression(input: &str) -> IResult<&str, EclExpression> {
    alt((
        top_of_set,
        bottom_of_set,
        map(
            delimited(pair(char('('), ws), compound_or_simple_expression, pair(ws, char(')'))),
            |inner| EclExpression::Nested(Box::new(inner)),
        ),
        constraint_expression,
        member_of_expression,
        focus_concept,
    ))(input)
}

fn sub_expression_constraint(input: &str) -> IResult<&str, EclExpression> {
    let (input, expr) = base_sub_expression(input)?;
    let (input, expr) = dot_notation_tail(input, expr)?;
    filtered_expression_tail(input, expr)
}

#[derive(Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
enum HierarchyOp {
    DescendantOf,
    DescendantOrSelfOf,
    ChildOf,
    ChildOrSelfOf,
    AncestorOf,
    AncestorOrSelfOf,
    ParentOf,
    ParentOrSelfOf,
}

fn constraint_expression(input: &str) -> IResult<&str, EclExpression> {
    let (input, op) = hierarchy_operator(input)?;
    let (input, _) = ws(input)?;
    let (input, inner) = base_sub_expression(input)?;

    let expr = match op {
        HierarchyOp::DescendantOf => EclExpression::DescendantOf(Box::new(inner)),
        HierarchyOp::DescendantOrSelfOf => EclExpression::DescendantOrSelfOf(Box::new(inner)),
        HierarchyOp::ChildOf => EclExpression::ChildOf(Box::new(inner)),
        HierarchyOp::ChildOrSelfOf => EclExpression::ChildOrSelfOf(Box::new(inner)),
        HierarchyOp::AncestorOf => EclExpression::AncestorOf(Box::new(inner)),
        HierarchyOp::AncestorOrSelfOf => EclExpression::AncestorOrSelfOf(Box::new(inner)),
        HierarchyOp::ParentOf => EclExpression::ParentOf(Box::new(inner)),
        HierarchyOp::ParentOrSelfOf => EclExpression::ParentOrSelfOf(Box::new(inner)),
    };
    Ok((input, expr))
}

fn hierarchy_operator(input: &str) -> IResult<&str, HierarchyOp> {
    alt((
        value(HierarchyOp::ChildOrSelfOf, tag("<<!")),
        value(HierarchyOp::DescendantOrSelfOf, tag("<<")),
        value(HierarchyOp::ChildOf, tag("<!")),
        value(HierarchyOp::DescendantOf, tag("<")),
        value(HierarchyOp::ParentOrSelfOf, tag(">>!")),
        value(HierarchyOp::AncestorOrSelfOf, tag(">>")),
        value(HierarchyOp::ParentOf, tag(">!")),
        value(HierarchyOp::AncestorOf, tag(">")),
    ))(input)
}

fn member_of_expression(input: &str) -> IResult<&str, EclExpression> {
    let (input, _) = char('^')(input)?;
    let (input, _) = ws(input)?;
    let (input, inner) = focus_concept(input)?;

    match inner {
        EclExpression::ConceptReference { concept_id, term } => {
            Ok((input, EclExpression::MemberOf { refset_id: concept_id, term }))
        }
        _ => Ok((input, EclExpression::MemberOf { refset_id: 0, term: None })),
    }
}

fn focus_concept(input: &str) -> IResult<&str, EclExpression> {
    alt((wildcard, concept_reference))(input)
}

fn wildcard(input: &str) -> IResult<&str, EclExpression> {
    value(EclExpression::Any, char('*'))(input)
}

fn concept_reference(input: &str) -> IResult<&str, EclExpression> {
    let (input, id) = sct_id(input)?;
    let (input, term) = opt(preceded(ws, term_in_pipes))(input)?;
    Ok((input, EclExpression::ConceptReference { concept_id: id, term }))
}

fn sct_id(input: &str) -> IResult<&str, SctId> {
    let (input, digits) = digit1(input)?;
    digits
        .parse::<SctId>()
        .map(|id| (input, id))
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)))
}

fn term_in_pipes(input: &str) -> IResult<&str, String> {
    let (input, _) = char('|')(input)?;
    let (input, term) = take_while(|c| c != '|')(input)?;
    let (input, _) = char('|')(input)?;
    Ok((input, term.trim().to_string()))
}

fn ws(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}

fn mws(input: &str) -> IResult<&str, &str> {
    multispace1(input)
}

// ----------------------------------------------------------------------
// Refinement
// ----------------------------------------------------------------------

fn cardinality(input: &str) -> IResult<&str, Cardinality> {
    let (input, _) = char('[')(input)?;
    let (input, _) = ws(input)?;
    let (input, min_str) = digit1(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = tag("..")(input)?;
    let (input, _) = ws(input)?;
    let (input, max) = alt((
        value(None, char('*')),
        map(digit1, |s: &str| Some(s.parse::<u32>().unwrap_or(0))),
    ))(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = char(']')(input)?;
    Ok((input, Cardinality { min: min_str.parse::<u32>().unwrap_or(0), max }))
}

fn refinement_operator(input: &str) -> IResult<&str, RefinementOperator> {
    alt((
        value(RefinementOperator::NotEqual, tag("!=")),
        value(RefinementOperator::Equal, char('=')),
    ))(input)
}

fn attribute_constraint(input: &str) -> IResult<&str, AttributeConstraint> {
    let (input, cardinality) = opt(preceded(ws, cardinality))(input)?;
    let (input, _) = ws(input)?;
    let (input, reverse) = opt(pair(tag_no_case("R"), mws))(input)?;
    let (input, _) = ws(input)?;
    let (input, attribute_type) = alt((wildcard, concept_reference))(input)?;
    let (input, _) = ws(input)?;
    let (input, operator) = refinement_operator(input)?;
    let (input, _) = ws(input)?;
    let (input, value) = alt((concrete_value_expression, sub_expression_constraint))(input)?;

    Ok((
        input,
        AttributeConstraint {
            cardinality,
            reverse: reverse.is_some(),
            attribute_type: Box::new(attribute_type),
            operator,
            value: Box::new(value),
        },
    ))
}

fn attribute_group(input: &str) -> IResult<&str, AttributeGroup> {
    let (input, cardinality) = opt(preceded(ws, cardinality))(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = char('{')(input)?;
    let (input, _) = ws(input)?;
    let (input, constraints) =
        separated_list1(preceded(ws, char(',')), preceded(ws, attribute_constraint))(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = char('}')(input)?;
    Ok((input, AttributeGroup { cardinality, constraints }))
}

enum RefinementItem {
    Constraint(AttributeConstraint),
    Group(AttributeGroup),
}

fn refinement_item(input: &str) -> IResult<&str, RefinementItem> {
    alt((
        map(attribute_group, RefinementItem::Group),
        map(attribute_constraint, RefinementItem::Constraint),
    ))(input)
}

fn refinement_clause(input: &str) -> IResult<&str, Refinement> {
    let (input, items) = separated_list1(preceded(ws, char(',')), preceded(ws, refinement_item))(input)?;

    let mut refinement = Refinement::default();
    for item in items {
        match item {
            RefinementItem::Constraint(c) => refinement.ungrouped.push(c),
            RefinementItem::Group(g) => refinement.groups.push(g),
        }
    }
    Ok((input, refinement))
}

fn refined_expression(input: &str) -> IResult<&str, EclExpression> {
    let (remaining, focus) = sub_expression_constraint(input)?;

    if remaining.trim_start().starts_with(':') {
        let (rest, _) = ws(remaining)?;
        let (rest, _) = char(':')(rest)?;
        let (rest, _) = ws(rest)?;
        let (rest, refinement) = refinement_clause(rest)?;
        Ok((rest, EclExpression::Refined { focus: Box::new(focus), refinement }))
    } else {
        Ok((remaining, focus))
    }
}

// ----------------------------------------------------------------------
// Dot notation
// ----------------------------------------------------------------------

fn dot_notation_tail(input: &str, left: EclExpression) -> IResult<&str, EclExpression> {
    if input.trim_start().starts_with('.') {
        let (rest, _) = ws(input)?;
        let (rest, _) = char('.')(rest)?;
        let (rest, _) = ws(rest)?;
        let (rest, attribute_type) = alt((wildcard, concept_reference))(rest)?;
        let expr =
            EclExpression::DotNotation { source: Box::new(left), attribute_type: Box::new(attribute_type) };
        dot_notation_tail(rest, expr)
    } else {
        Ok((input, left))
    }
}

// ----------------------------------------------------------------------
// Concrete values
// ----------------------------------------------------------------------

fn concrete_value(input: &str) -> IResult<&str, ConcreteValue> {
    let (input, _) = char('#')(input)?;
    alt((
        map(delimited(char('"'), take_until("\""), char('"')), |s: &str| {
            ConcreteValue::String(s.to_string())
        }),
        map(
            recognize(tuple((opt(char('-')), digit1, opt(pair(char('.'), digit1))))),
            |s: &str| {
                if s.contains('.') {
                    ConcreteValue::Decimal(s.parse().unwrap_or(0.0))
                } else {
                    ConcreteValue::Integer(s.parse().unwrap_or(0))
                }
            },
        ),
    ))(input)
}

fn concrete_value_expression(input: &str) -> IResult<&str, EclExpression> {
    let (input, value) = concrete_value(input)?;
    Ok((input, EclExpression::Concrete { value, operator: ComparisonOperator::Equal }))
}

// ----------------------------------------------------------------------
// Filters
// ----------------------------------------------------------------------

fn comparison_operator(input: &str) -> IResult<&str, ComparisonOperator> {
    alt((
        value(ComparisonOperator::LessThanOrEqual, tag("<=")),
        value(ComparisonOperator::GreaterThanOrEqual, tag(">=")),
        value(ComparisonOperator::NotEqual, tag("!=")),
        value(ComparisonOperator::LessThan, char('<')),
        value(ComparisonOperator::GreaterThan, char('>')),
        value(ComparisonOperator::Equal, char('=')),
    ))(input)
}

fn quoted_string(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"')(input)?;
    let (input, content) = take_until("\"")(input)?;
    let (input, _) = char('"')(input)?;
    Ok((input, content.to_string()))
}

fn bare_token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '-' || c == '_')(input)
}

fn sct_id_list(input: &str) -> IResult<&str, Vec<SctId>> {
    alt((
        map(sct_id, |id| vec![id]),
        delimited(
            pair(char('('), ws),
            separated_list1(mws, terminated_sct_id),
            pair(ws, char(')')),
        ),
    ))(input)
}

fn terminated_sct_id(input: &str) -> IResult<&str, SctId> {
    let (input, id) = sct_id(input)?;
    let (input, _) = opt(preceded(ws, term_in_pipes))(input)?;
    Ok((input, id))
}

fn string_list(input: &str) -> IResult<&str, Vec<String>> {
    alt((
        map(quoted_string, |s| vec![s]),
        delimited(
            pair(char('('), ws),
            separated_list1(mws, quoted_string),
            pair(ws, char(')')),
        ),
    ))(input)
}

fn equals(input: &str) -> IResult<&str, &str> {
    delimited(ws, tag("="), ws)(input)
}

fn term_filter(input: &str) -> IResult<&str, EclFilter> {
    let (input, _) = tag_no_case("term")(input)?;
    let (input, _) = ws(input)?;
    let (input, match_type) = alt((
        value(TermMatchType::StartsWith, tag_no_case("startsWith")),
        value(TermMatchType::Wildcard, tag_no_case("wild")),
        value(TermMatchType::Regex, tag_no_case("regex")),
        value(TermMatchType::Exact, tag("==")),
        value(TermMatchType::Contains, char('=')),
    ))(input)?;
    let (input, _) = ws(input)?;
    let (input, value) = quoted_string(input)?;
    Ok((input, EclFilter::Term { match_type, value }))
}

fn language_filter(input: &str) -> IResult<&str, EclFilter> {
    let (input, _) = tag_no_case("language")(input)?;
    let (input, _) = equals(input)?;
    let (input, codes) = alt((
        map(bare_token, |s| vec![s.to_string()]),
        delimited(
            pair(char('('), ws),
            separated_list1(mws, map(bare_token, str::to_string)),
            pair(ws, char(')')),
        ),
    ))(input)?;
    Ok((input, EclFilter::Language(codes)))
}

fn description_type_filter(input: &str) -> IResult<&str, EclFilter> {
    let (input, _) = alt((tag_no_case("typeId"), tag_no_case("type")))(input)?;
    let (input, _) = equals(input)?;
    let (input, ids) = alt((
        map(description_type_shorthand, |id| vec![id]),
        sct_id_list,
    ))(input)?;
    Ok((input, EclFilter::DescriptionType(ids)))
}

fn description_type_shorthand(input: &str) -> IResult<&str, SctId> {
    alt((
        value(well_known::SYNONYM_TYPE, tag_no_case("syn")),
        value(well_known::FSN_TYPE, tag_no_case("fsn")),
        value(well_known::DEFINITION_TYPE, tag_no_case("def")),
    ))(input)
}

fn dialect_filter(input: &str) -> IResult<&str, EclFilter> {
    let (input, _) = alt((tag_no_case("dialectId"), tag_no_case("dialect")))(input)?;
    let (input, _) = equals(input)?;
    let (input, refset_ids) = sct_id_list(input)?;
    let (input, acceptability) = opt(preceded(
        mws,
        alt((
            value(FilterAcceptability::Preferred, tag_no_case("prefer")),
            value(FilterAcceptability::Acceptable, tag_no_case("accept")),
        )),
    ))(input)?;
    Ok((input, EclFilter::Dialect { refset_ids, acceptability }))
}

fn case_significance_filter(input: &str) -> IResult<&str, EclFilter> {
    let (input, _) = tag_no_case("caseSignificance")(input)?;
    let (input, _) = equals(input)?;
    let (input, id) = sct_id(input)?;
    Ok((input, EclFilter::CaseSignificance(id)))
}

fn active_filter(input: &str) -> IResult<&str, EclFilter> {
    let (input, _) = tag_no_case("active")(input)?;
    let (input, _) = equals(input)?;
    let (input, active) = alt((
        value(true, tag_no_case("true")),
        value(false, tag_no_case("false")),
        value(true, char('1')),
        value(false, char('0')),
    ))(input)?;
    Ok((input, EclFilter::Active(active)))
}

fn module_filter(input: &str) -> IResult<&str, EclFilter> {
    let (input, _) = tag_no_case("moduleId")(input)?;
    let (input, _) = ws(input)?;
    let (input, negated) = alt((value(true, tag("!=")), value(false, char('='))))(input)?;
    let (input, _) = ws(input)?;
    let (input, module_ids) = sct_id_list(input)?;
    Ok((input, EclFilter::Module { module_ids, negated }))
}

fn effective_time_filter(input: &str) -> IResult<&str, EclFilter> {
    let (input, _) = tag_no_case("effectiveTime")(input)?;
    let (input, _) = ws(input)?;
    let (input, operator) = comparison_operator(input)?;
    let (input, _) = ws(input)?;
    let (input, digits) = digit1(input)?;
    let date = digits.parse::<u32>().unwrap_or(0);
    Ok((input, EclFilter::EffectiveTime { operator, date }))
}

fn definition_status_filter(input: &str) -> IResult<&str, EclFilter> {
    let (input, _) = tag_no_case("definitionStatus")(input)?;
    let (input, _) = equals(input)?;
    let (input, is_primitive) = alt((
        value(true, tag_no_case("primitive")),
        value(false, tag_no_case("defined")),
    ))(input)?;
    Ok((input, EclFilter::DefinitionStatus { is_primitive }))
}

fn semantic_tag_filter(input: &str) -> IResult<&str, EclFilter> {
    let (input, _) = tag_no_case("semanticTag")(input)?;
    let (input, _) = equals(input)?;
    let (input, tags) = string_list(input)?;
    Ok((input, EclFilter::SemanticTag(tags)))
}

fn preferred_in_filter(input: &str) -> IResult<&str, EclFilter> {
    let (input, _) = tag_no_case("preferredIn")(input)?;
    let (input, _) = equals(input)?;
    let (input, ids) = sct_id_list(input)?;
    Ok((input, EclFilter::PreferredIn(ids)))
}

fn acceptable_in_filter(input: &str) -> IResult<&str, EclFilter> {
    let (input, _) = tag_no_case("acceptableIn")(input)?;
    let (input, _) = equals(input)?;
    let (input, ids) = sct_id_list(input)?;
    Ok((input, EclFilter::AcceptableIn(ids)))
}

fn language_refset_filter(input: &str) -> IResult<&str, EclFilter> {
    let (input, _) = tag_no_case("languageRefSetId")(input)?;
    let (input, _) = equals(input)?;
    let (input, ids) = sct_id_list(input)?;
    Ok((input, EclFilter::LanguageRefSet(ids)))
}

fn id_filter(input: &str) -> IResult<&str, EclFilter> {
    let (input, _) = tag_no_case("id")(input)?;
    let (input, _) = equals(input)?;
    let (input, ids) = sct_id_list(input)?;
    Ok((input, EclFilter::Id(ids)))
}

fn member_field_value(input: &str) -> IResult<&str, MemberFieldValue> {
    alt((
        map(quoted_string, MemberFieldValue::Str),
        value(MemberFieldValue::Boolean(true), tag_no_case("true")),
        value(MemberFieldValue::Boolean(false), tag_no_case("false")),
        map(
            recognize(tuple((opt(char('-')), digit1, char('.'), digit1))),
            |s: &str| MemberFieldValue::Decimal(s.parse().unwrap_or(0.0)),
        ),
        map(recognize(pair(opt(char('-')), digit1)), |s: &str| {
            s.parse::<i64>()
                .map(MemberFieldValue::Integer)
                .unwrap_or_else(|_| MemberFieldValue::Component(s.parse().unwrap_or(0)))
        }),
    ))(input)
}

fn member_filter(input: &str) -> IResult<&str, EclFilter> {
    let (input, _) = alt((tag("M"), tag("m")))(input)?;
    let (input, _) = mws(input)?;
    let (input, field) = bare_token(input)?;
    let (input, _) = ws(input)?;
    let (input, operator) = comparison_operator(input)?;
    let (input, _) = ws(input)?;
    let (input, value) = member_field_value(input)?;
    Ok((input, EclFilter::Member { field: field.to_string(), operator, value }))
}

fn history_filter(input: &str) -> IResult<&str, EclFilter> {
    let (input, _) = char('+')(input)?;
    let (input, _) = tag_no_case("HISTORY")(input)?;
    let (input, profile) = opt(preceded(
        char('-'),
        alt((
            value(HistoryProfile::Min, tag_no_case("MIN")),
            value(HistoryProfile::Mod, tag_no_case("MOD")),
            value(HistoryProfile::Max, tag_no_case("MAX")),
        )),
    ))(input)?;
    Ok((input, EclFilter::History(profile.unwrap_or_default())))
}

fn single_filter(input: &str) -> IResult<&str, EclFilter> {
    alt((
        history_filter,
        member_filter,
        term_filter,
        alt((
            language_filter,
            description_type_filter,
            dialect_filter,
            case_significance_filter,
            active_filter,
            module_filter,
        )),
        alt((
            effective_time_filter,
            definition_status_filter,
            semantic_tag_filter,
            preferred_in_filter,
            acceptable_in_filter,
            language_refset_filter,
            id_filter,
        )),
    ))(input)
}

fn filter_block(input: &str) -> IResult<&str, Vec<EclFilter>> {
    let (input, _) = tag("{{")(input)?;
    let (input, _) = ws(input)?;
    let (input, filters) = separated_list0(
        preceded(ws, alt((tag(","), tag_no_case("AND")))),
        preceded(ws, single_filter),
    )(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = tag("}}")(input)?;
    Ok((input, filters))
}

fn filtered_expression_tail(input: &str, expr: EclExpression) -> IResult<&str, EclExpression> {
    if input.trim_start().starts_with("{{") {
        let (rest, _) = ws(input)?;
        let (rest, filters) = filter_block(rest)?;
        let filtered = EclExpression::Filtered { expression: Box::new(expr), filters };
        filtered_expression_tail(rest, filtered)
    } else {
        Ok((input, expr))
    }
}

// ----------------------------------------------------------------------
// Top/bottom of set
// ----------------------------------------------------------------------

fn top_of_set(input: &str) -> IResult<&str, EclExpression> {
    let (input, _) = tag("!!>")(input)?;
    let (input, _) = ws(input)?;
    let (input, inner) = sub_expression_constraint(input)?;
    Ok((input, EclExpression::TopOfSet(Box::new(inner))))
}

fn bottom_of_set(input: &str) -> IResult<&str, EclExpression> {
    let (input, _) = tag("!!<")(input)?;
    let (input, _) = ws(input)?;
    let (input, inner) = sub_expression_constraint(input)?;
    Ok((input, EclExpression::BottomOfSet(Box::new(inner))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;

    #[test]
    fn self_reference_with_term() {
        let expr = parse("404684003 |Clinical finding|").unwrap();
        match expr {
            EclExpression::ConceptReference { concept_id, term } => {
                assert_eq!(concept_id, 404684003);
                assert_eq!(term.as_deref(), Some("Clinical finding"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wildcard_is_any() {
        assert!(matches!(parse("*").unwrap(), EclExpression::Any));
    }

    #[test]
    fn hierarchy_operators_nest_correctly() {
        assert!(matches!(parse("<404684003").unwrap(), EclExpression::DescendantOf(_)));
        assert!(matches!(parse("<<404684003").unwrap(), EclExpression::DescendantOrSelfOf(_)));
        assert!(matches!(parse("<!404684003").unwrap(), EclExpression::ChildOf(_)));
        assert!(matches!(parse("<<!404684003").unwrap(), EclExpression::ChildOrSelfOf(_)));
        assert!(matches!(parse(">404684003").unwrap(), EclExpression::AncestorOf(_)));
        assert!(matches!(parse(">>404684003").unwrap(), EclExpression::AncestorOrSelfOf(_)));
        assert!(matches!(parse(">!404684003").unwrap(), EclExpression::ParentOf(_)));
        assert!(matches!(parse(">>!404684003").unwrap(), EclExpression::ParentOrSelfOf(_)));
    }

    #[test]
    fn member_of_extracts_refset_id() {
        match parse("^ 700043003 |problem list|").unwrap() {
            EclExpression::MemberOf { refset_id, term } => {
                assert_eq!(refset_id, 700043003);
                assert_eq!(term.as_deref(), Some("problem list"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn compound_operators_are_left_associative() {
        match parse("<< 1 AND << 2 AND << 3").unwrap() {
            EclExpression::And(left, right) => {
                assert!(matches!(*right, EclExpression::DescendantOrSelfOf(_)));
                assert!(matches!(*left, EclExpression::And(_, _)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn comma_parses_as_and() {
        assert!(matches!(parse("<<1, <<2").unwrap(), EclExpression::And(_, _)));
    }

    #[test]
    fn minus_parses_right_operand() {
        match parse("19829001 MINUS 301867009").unwrap() {
            EclExpression::Minus(left, right) => {
                assert_eq!(left.as_concept_id(), Some(19829001));
                assert_eq!(right.as_concept_id(), Some(301867009));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nested_parentheses_round_trip() {
        match parse("(<< 1 OR << 2) AND << 3").unwrap() {
            EclExpression::And(left, _) => {
                assert!(matches!(*left, EclExpression::Nested(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn refinement_with_ungrouped_attributes() {
        match parse("< 404684003 : 363698007 = << 39057004, 116676008 = << 79654002").unwrap() {
            EclExpression::Refined { refinement, .. } => {
                assert_eq!(refinement.ungrouped.len(), 2);
                assert!(refinement.groups.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn refinement_group_with_cardinality() {
        match parse("< 404684003 : [1..2] { 363698007 = << 39057004 }").unwrap() {
            EclExpression::Refined { refinement, .. } => {
                let group = &refinement.groups[0];
                assert_eq!(group.cardinality.unwrap().min, 1);
                assert_eq!(group.cardinality.unwrap().max, Some(2));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reverse_flag_is_parsed() {
        match parse("< 404684003 : R 363698007 = 39057004").unwrap() {
            EclExpression::Refined { refinement, .. } => {
                assert!(refinement.ungrouped[0].reverse);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn zero_cardinality_excludes_attribute() {
        match parse("< 404684003 : [0..0] 363698007 = *").unwrap() {
            EclExpression::Refined { refinement, .. } => {
                assert_eq!(refinement.ungrouped[0].cardinality, Some(Cardinality::none()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn dot_notation_chains() {
        match parse("< 404684003 . 363698007 . 116676008").unwrap() {
            EclExpression::DotNotation { source, .. } => {
                assert!(matches!(*source, EclExpression::DotNotation { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn concrete_value_variants() {
        match parse(r#"< 1 : 2 = #250"#).unwrap() {
            EclExpression::Refined { refinement, .. } => {
                assert!(matches!(
                    refinement.ungrouped[0].value.as_ref(),
                    EclExpression::Concrete { value: ConcreteValue::Integer(250), .. }
                ));
            }
            other => panic!("unexpected {other:?}"),
        }
        match parse(r#"< 1 : 2 = #-3.5"#).unwrap() {
            EclExpression::Refined { refinement, .. } => match refinement.ungrouped[0].value.as_ref() {
                EclExpression::Concrete { value: ConcreteValue::Decimal(v), .. } => {
                    assert!((v + 3.5).abs() < 1e-9);
                }
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn term_filter_match_types() {
        match parse(r#"< 1 {{ term = "heart" }}"#).unwrap() {
            EclExpression::Filtered { filters, .. } => {
                assert!(matches!(&filters[0], EclFilter::Term { match_type: TermMatchType::Contains, value } if value == "heart"));
            }
            other => panic!("unexpected {other:?}"),
        }
        match parse(r#"< 1 {{ term startsWith "card" }}"#).unwrap() {
            EclExpression::Filtered { filters, .. } => {
                assert!(matches!(&filters[0], EclFilter::Term { match_type: TermMatchType::StartsWith, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn active_and_module_filters() {
        match parse("< 1 {{ active = true }}").unwrap() {
            EclExpression::Filtered { filters, .. } => {
                assert!(matches!(&filters[0], EclFilter::Active(true)));
            }
            other => panic!("unexpected {other:?}"),
        }
        match parse("< 1 {{ moduleId != (900000000000207008 900000000000012004) }}").unwrap() {
            EclExpression::Filtered { filters, .. } => match &filters[0] {
                EclFilter::Module { module_ids, negated } => {
                    assert!(*negated);
                    assert_eq!(module_ids.len(), 2);
                }
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn member_field_filter_values() {
        match parse(r#"^ 447562003 {{ M mapTarget = "J45.9" }}"#).unwrap() {
            EclExpression::Filtered { filters, .. } => match &filters[0] {
                EclFilter::Member { field, value, .. } => {
                    assert_eq!(field, "mapTarget");
                    assert_eq!(*value, MemberFieldValue::Str("J45.9".to_string()));
                }
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn history_filter_defaults_to_mod_profile() {
        match parse("< 1 {{ +HISTORY }}").unwrap() {
            EclExpression::Filtered { filters, .. } => {
                assert!(matches!(&filters[0], EclFilter::History(HistoryProfile::Mod)));
            }
            other => panic!("unexpected {other:?}"),
        }
        match parse("< 1 {{ +HISTORY-MAX }}").unwrap() {
            EclExpression::Filtered { filters, .. } => {
                assert!(matches!(&filters[0], EclFilter::History(HistoryProfile::Max)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn semantic_tag_and_definition_status_filters() {
        match parse(r#"< 1 {{ semanticTag = "disorder", definitionStatus = primitive }}"#).unwrap() {
            EclExpression::Filtered { filters, .. } => {
                assert_eq!(filters.len(), 2);
                assert!(matches!(&filters[0], EclFilter::SemanticTag(tags) if tags == &["disorder".to_string()]));
                assert!(matches!(&filters[1], EclFilter::DefinitionStatus { is_primitive: true }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn top_and_bottom_of_set() {
        assert!(matches!(parse("!!> < 1").unwrap(), EclExpression::TopOfSet(_)));
        assert!(matches!(parse("!!< < 1").unwrap(), EclExpression::BottomOfSet(_)));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(parse("").unwrap_err(), EclError::Empty);
        assert_eq!(parse("   ").unwrap_err(), EclError::Empty);
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(parse("404684003 garbage").is_err());
    }

    #[test]
    fn unclosed_parenthesis_is_rejected() {
        assert!(parse("(<< 404684003").is_err());
    }
}
