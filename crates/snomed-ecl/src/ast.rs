//! Abstract syntax tree for parsed ECL expressions.

use snomed_types::{ConcreteValue, SctId};

/// A parsed ECL expression constraint.
///
/// Follows the ECL v2.0 grammar: a focus expression (concept reference,
/// wildcard, or reference set membership) combined with hierarchy
/// operators, boolean composition, attribute refinement, dot notation,
/// and description/member filters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EclExpression {
    /// A single concept, optionally annotated with its term in pipes.
    ConceptReference {
        /// The referenced concept.
        concept_id: SctId,
        /// Optional human-readable term, informational only.
        term: Option<String>,
    },
    /// `*` — every concept.
    Any,
    /// `^ refsetId` — members of a reference set.
    MemberOf {
        /// The reference set, or `0` for `^*` — member of any installed
        /// reference set.
        refset_id: SctId,
        /// Optional human-readable term.
        term: Option<String>,
    },
    /// `< e` — proper descendants of `e`.
    DescendantOf(Box<EclExpression>),
    /// `<< e` — descendants of `e`, including `e`.
    DescendantOrSelfOf(Box<EclExpression>),
    /// `<! e` — direct children of `e`.
    ChildOf(Box<EclExpression>),
    /// `<<! e` — direct children of `e`, including `e`.
    ChildOrSelfOf(Box<EclExpression>),
    /// `> e` — proper ancestors of `e`.
    AncestorOf(Box<EclExpression>),
    /// `>> e` — ancestors of `e`, including `e`.
    AncestorOrSelfOf(Box<EclExpression>),
    /// `>! e` — direct parents of `e`.
    ParentOf(Box<EclExpression>),
    /// `>>! e` — direct parents of `e`, including `e`.
    ParentOrSelfOf(Box<EclExpression>),
    /// `a AND b`.
    And(Box<EclExpression>, Box<EclExpression>),
    /// `a OR b`.
    Or(Box<EclExpression>, Box<EclExpression>),
    /// `a MINUS b`.
    Minus(Box<EclExpression>, Box<EclExpression>),
    /// `( e )`, kept distinct from `e` only to round-trip formatting.
    Nested(Box<EclExpression>),
    /// `focus : refinement` — attribute-constrained expression.
    Refined {
        /// The unconstrained focus set.
        focus: Box<EclExpression>,
        /// The attribute constraints narrowing it.
        refinement: Refinement,
    },
    /// `source . attributeType` — the values of `attributeType` on
    /// members of `source`.
    DotNotation {
        /// The expression whose members supply the attribute.
        source: Box<EclExpression>,
        /// The relationship type to project through.
        attribute_type: Box<EclExpression>,
    },
    /// A literal concrete value used as an attribute's comparison target.
    Concrete {
        /// The value.
        value: ConcreteValue,
        /// The comparator it's being matched with.
        operator: ComparisonOperator,
    },
    /// `expression {{ filters }}`.
    Filtered {
        /// The expression being filtered.
        expression: Box<EclExpression>,
        /// The filters applied to it, implicitly AND-combined.
        filters: Vec<EclFilter>,
    },
    /// `!!> e` — the most general concepts of `e`.
    TopOfSet(Box<EclExpression>),
    /// `!!< e` — the most specific concepts of `e`.
    BottomOfSet(Box<EclExpression>),
}

impl EclExpression {
    /// Builds a plain concept reference with no term.
    pub fn concept(id: SctId) -> Self {
        EclExpression::ConceptReference { concept_id: id, term: None }
    }

    /// Returns the concept id if this is a bare concept reference.
    pub fn as_concept_id(&self) -> Option<SctId> {
        match self {
            EclExpression::ConceptReference { concept_id, .. } => Some(*concept_id),
            _ => None,
        }
    }

    /// Strips any [`EclExpression::Nested`] wrapper.
    pub fn unwrap_nested(&self) -> &EclExpression {
        match self {
            EclExpression::Nested(inner) => inner.unwrap_nested(),
            other => other,
        }
    }
}

/// A cardinality constraint on an attribute or attribute group,
/// `[min..max]` with `max = None` meaning `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cardinality {
    /// Minimum occurrences, inclusive.
    pub min: u32,
    /// Maximum occurrences, inclusive; `None` for unbounded.
    pub max: Option<u32>,
}

impl Cardinality {
    /// `[0..0]` — the attribute must not occur.
    pub const fn none() -> Self {
        Self { min: 0, max: Some(0) }
    }

    /// Whether `count` satisfies this constraint.
    pub fn matches(&self, count: u32) -> bool {
        count >= self.min && self.max.is_none_or(|max| count <= max)
    }
}

/// The comparator in an attribute constraint's `attributeType op value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RefinementOperator {
    /// `=` — value matches exactly (or the value's descendant-or-self
    /// closure, when the value itself carries a hierarchy operator).
    Equal,
    /// `!=` — value does not match.
    NotEqual,
}

/// One `[cardinality] [R] attributeType op value` clause.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeConstraint {
    /// How many times this attribute must occur in its group.
    pub cardinality: Option<Cardinality>,
    /// `R` prefix: match components that are the *target* of
    /// `attributeType`, rather than the source.
    pub reverse: bool,
    /// The relationship type being constrained.
    pub attribute_type: Box<EclExpression>,
    /// The comparator.
    pub operator: RefinementOperator,
    /// The permitted value set.
    pub value: Box<EclExpression>,
}

/// A `{ constraint, constraint, ... }` group: constraints that must all
/// hold within the same relationship group.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeGroup {
    /// How many groups must satisfy these constraints.
    pub cardinality: Option<Cardinality>,
    /// The constraints every satisfying group must meet.
    pub constraints: Vec<AttributeConstraint>,
}

/// The refinement clause of a `focus : refinement` expression.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Refinement {
    /// Constraints that apply without regard to relationship group.
    pub ungrouped: Vec<AttributeConstraint>,
    /// Constraints that must be satisfied within a single group.
    pub groups: Vec<AttributeGroup>,
}

/// Comparator used by filter constraints (`effectiveTime`, member
/// numeric/date fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComparisonOperator {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
}

/// How a `term` filter matches its value against a description's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TermMatchType {
    /// Tokenized substring match (the default).
    Contains,
    /// `startsWith "..."` — literal prefix match.
    StartsWith,
    /// `wild "..."` — glob-style `*`/`?` wildcard match.
    Wildcard,
    /// `regex "..."`.
    Regex,
    /// `==` — exact, case-sensitive term match.
    Exact,
}

/// `prefer` / `accept` qualifier on a `dialect` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FilterAcceptability {
    /// The description must be Preferred in the named dialect.
    Preferred,
    /// The description must be Acceptable (or Preferred) in the dialect.
    Acceptable,
}

/// Breadth of historical associations pulled in by a `{{ +HISTORY }}`
/// supplement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HistoryProfile {
    /// `SAME_AS` only.
    Min,
    /// `SAME_AS`, `REPLACED_BY`, `POSSIBLY_EQUIVALENT_TO`.
    #[default]
    Mod,
    /// Every historical association refset.
    Max,
}

/// The value side of a member field filter (`{{ M mapTarget = "J45.9" }}`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemberFieldValue {
    /// A quoted string.
    Str(String),
    /// A bare integer.
    Integer(i64),
    /// A `#`-prefixed decimal.
    Decimal(f64),
    /// `true`/`false`.
    Boolean(bool),
    /// A bare SCTID (used for component-reference-typed fields).
    Component(SctId),
}

/// A single `{{ ... }}` filter clause.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EclFilter {
    /// `term = "..."` / `term startsWith "..."` / etc.
    Term {
        /// The match mode.
        match_type: TermMatchType,
        /// The text to match.
        value: String,
    },
    /// `language = en` / `language = (en es)`.
    Language(Vec<String>),
    /// `type = syn` / `typeId = (...)`.
    DescriptionType(Vec<SctId>),
    /// `dialect = en-US [prefer|accept]` / `dialectId = (...)`.
    Dialect {
        /// The language refset(s) named by the filter.
        refset_ids: Vec<SctId>,
        /// Optional acceptability qualifier.
        acceptability: Option<FilterAcceptability>,
    },
    /// `caseSignificance = caseInsensitive`.
    CaseSignificance(SctId),
    /// `active = true|false`.
    Active(bool),
    /// `moduleId = (...)`, with `!=` negating the set.
    Module {
        /// The module ids named by the filter.
        module_ids: Vec<SctId>,
        /// Whether the filter excludes rather than includes this set.
        negated: bool,
    },
    /// `effectiveTime >= 20200101`.
    EffectiveTime {
        /// The comparator.
        operator: ComparisonOperator,
        /// A `YYYYMMDD` date.
        date: u32,
    },
    /// `definitionStatus = primitive|defined`.
    DefinitionStatus {
        /// True for `primitive`, false for `defined`.
        is_primitive: bool,
    },
    /// `semanticTag = "disorder"`.
    SemanticTag(Vec<String>),
    /// `preferredIn = (...)`.
    PreferredIn(Vec<SctId>),
    /// `acceptableIn = (...)`.
    AcceptableIn(Vec<SctId>),
    /// `languageRefSetId = (...)` — preferred or acceptable, either way.
    LanguageRefSet(Vec<SctId>),
    /// `M field op value` — a refset column predicate.
    Member {
        /// The declared column name.
        field: String,
        /// The comparator.
        operator: ComparisonOperator,
        /// The comparison value.
        value: MemberFieldValue,
    },
    /// `id = (...)`.
    Id(Vec<SctId>),
    /// `+HISTORY[-MIN|-MOD|-MAX]`.
    History(HistoryProfile),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cardinality_matches_bounds() {
        let card = Cardinality { min: 1, max: Some(2) };
        assert!(!card.matches(0));
        assert!(card.matches(1));
        assert!(card.matches(2));
        assert!(!card.matches(3));
    }

    #[test]
    fn cardinality_none_rejects_any_occurrence() {
        assert!(Cardinality::none().matches(0));
        assert!(!Cardinality::none().matches(1));
    }

    #[test]
    fn as_concept_id_only_matches_bare_references() {
        let reference = EclExpression::concept(73211009);
        assert_eq!(reference.as_concept_id(), Some(73211009));

        let descendants = EclExpression::DescendantOf(Box::new(reference));
        assert_eq!(descendants.as_concept_id(), None);
    }

    #[test]
    fn unwrap_nested_strips_every_layer() {
        let inner = EclExpression::concept(1);
        let wrapped = EclExpression::Nested(Box::new(EclExpression::Nested(Box::new(inner.clone()))));
        assert_eq!(wrapped.unwrap_nested(), &inner);
    }
}
