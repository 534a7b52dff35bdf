//! Refset member index: narrows by refset/component/module/active via
//! tantivy fast fields, and indexes each refset's declared extra columns
//! (map target, correlation id, ...) as its own typed field rather than
//! one shared blob, since the column set is known up front from the rows
//! being indexed and RF2 refset descriptors fix each column's type.

use std::collections::HashMap;

use snomed_types::SctId;
use tantivy::query::{BooleanQuery, Occur, Query as TantivyQuery, RegexQuery, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, FAST, INDEXED, STORED, STRING};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, Term};

use crate::collector::FastFieldCollector;
use crate::error::SearchResult;

const WRITER_BUDGET_BYTES: usize = 50_000_000;

/// A declared column value on a reference set member.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A text value.
    Str(String),
    /// A whole-number value.
    Integer(i64),
    /// A fractional value.
    Decimal(f64),
    /// A true/false value.
    Boolean(bool),
}

/// The tantivy field type a column is indexed as, fixed by the type of
/// the first value seen for that column name (RF2 refset descriptors
/// never mix types within a column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Str,
    Integer,
    Decimal,
    Boolean,
}

impl ColumnKind {
    fn of(value: &FieldValue) -> Self {
        match value {
            FieldValue::Str(_) => ColumnKind::Str,
            FieldValue::Integer(_) => ColumnKind::Integer,
            FieldValue::Decimal(_) => ColumnKind::Decimal,
            FieldValue::Boolean(_) => ColumnKind::Boolean,
        }
    }
}

/// A comparator for a member field predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldComparison {
    /// Exact equality.
    Equal,
    /// Inequality.
    NotEqual,
    /// Ordered `<` over numeric columns.
    LessThan,
    /// Ordered `<=` over numeric columns.
    LessThanOrEqual,
    /// Ordered `>` over numeric columns.
    GreaterThan,
    /// Ordered `>=` over numeric columns.
    GreaterThanOrEqual,
}

/// A distinct text-matching predicate, kept separate from [`FieldComparison`]
/// so an exact-equality lookup never silently widens into a prefix scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextPredicate {
    /// Literal prefix match.
    Prefix,
    /// `*`/`?` glob-style wildcard.
    Wildcard,
    /// Exact term match (equivalent to `FieldComparison::Equal` on a `Str`
    /// column, exposed here so callers that already have a [`TextPredicate`]
    /// in hand don't need to reach for [`MemberIndex::filter`]).
    Term,
}

/// One row to index: a reference set member plus its declared extra columns.
#[derive(Debug, Clone)]
pub struct MemberDoc {
    /// The member's own uuid, as text.
    pub uuid: String,
    /// The reference set this member belongs to.
    pub refset_id: SctId,
    /// The component the member refers to.
    pub referenced_component_id: SctId,
    /// The member's module.
    pub module_id: SctId,
    /// Whether the member row is active.
    pub active: bool,
    /// The refset-specific columns (`mapTarget`, `correlationId`, ...).
    pub fields: Vec<(String, FieldValue)>,
}

#[derive(Clone)]
struct Column {
    field: Field,
    kind: ColumnKind,
}

#[derive(Clone)]
struct Fields {
    uuid: Field,
    refset_id: Field,
    referenced_component_id: Field,
    module_id: Field,
    active: Field,
    columns: HashMap<String, Column>,
}

/// Builds a schema with one indexed field per distinct column name found
/// across `docs`. Tantivy schemas are fixed at build time, so (as with
/// [`crate::description::DescriptionIndex`]'s per-attribute-type fields)
/// the full document set has to be in hand before the schema is declared.
fn build_schema(docs: &[MemberDoc]) -> (Schema, Fields) {
    let mut builder = Schema::builder();
    let uuid = builder.add_text_field("uuid", STRING | STORED);
    let refset_id = builder.add_u64_field("refset_id", STORED | FAST | INDEXED);
    let referenced_component_id = builder.add_u64_field("referenced_component_id", STORED | FAST | INDEXED);
    let module_id = builder.add_u64_field("module_id", STORED | FAST | INDEXED);
    let active = builder.add_u64_field("active", STORED | FAST | INDEXED);

    let mut kinds: HashMap<String, ColumnKind> = HashMap::new();
    for row in docs {
        for (name, value) in &row.fields {
            kinds.entry(name.clone()).or_insert_with(|| ColumnKind::of(value));
        }
    }

    let mut columns = HashMap::new();
    for (name, kind) in kinds {
        let field_name = format!("col_{name}");
        let field = match kind {
            ColumnKind::Str => builder.add_text_field(&field_name, STRING | STORED | FAST),
            ColumnKind::Integer => builder.add_i64_field(&field_name, STORED | FAST | INDEXED),
            ColumnKind::Decimal => builder.add_f64_field(&field_name, STORED | FAST | INDEXED),
            ColumnKind::Boolean => builder.add_u64_field(&field_name, STORED | FAST | INDEXED),
        };
        columns.insert(name, Column { field, kind });
    }

    let fields = Fields { uuid, refset_id, referenced_component_id, module_id, active, columns };
    (builder.build(), fields)
}

/// A persistent or in-memory index over reference set members.
pub struct MemberIndex {
    index: Index,
    reader: IndexReader,
    fields: Fields,
}

impl MemberIndex {
    /// Builds a fresh in-memory index from `docs`.
    pub fn build_in_ram(docs: &[MemberDoc]) -> SearchResult<Self> {
        let (schema, fields) = build_schema(docs);
        let index = Index::create_in_ram(schema);
        Self::from_index(index, fields, docs)
    }

    /// Builds a fresh on-disk index at `path`.
    pub fn create_in_dir(path: &std::path::Path, docs: &[MemberDoc]) -> SearchResult<Self> {
        let (schema, fields) = build_schema(docs);
        let index = Index::create_in_dir(path, schema)?;
        Self::from_index(index, fields, docs)
    }

    fn from_index(index: Index, fields: Fields, docs: &[MemberDoc]) -> SearchResult<Self> {
        let mut writer: IndexWriter = index.writer(WRITER_BUDGET_BYTES)?;
        for row in docs {
            let mut document = doc!(
                fields.uuid => row.uuid.as_str(),
                fields.refset_id => row.refset_id as u64,
                fields.referenced_component_id => row.referenced_component_id as u64,
                fields.module_id => row.module_id as u64,
                fields.active => row.active as u64,
            );
            for (name, value) in &row.fields {
                let Some(column) = fields.columns.get(name) else { continue };
                match value {
                    FieldValue::Str(s) => document.add_text(column.field, s),
                    FieldValue::Integer(i) => document.add_i64(column.field, *i),
                    FieldValue::Decimal(d) => document.add_f64(column.field, *d),
                    FieldValue::Boolean(b) => document.add_u64(column.field, *b as u64),
                }
            }
            writer.add_document(document)?;
        }
        writer.commit()?;

        let reader = index.reader_builder().reload_policy(ReloadPolicy::OnCommitWithDelay).try_into()?;
        Ok(Self { index, reader, fields })
    }

    /// Returns every referenced component of an active member of `refset_id`.
    pub fn members_of(&self, refset_id: SctId) -> SearchResult<Vec<SctId>> {
        let searcher = self.reader.searcher();
        let query = BooleanQuery::new(vec![
            (Occur::Must, self.term_u64(self.fields.refset_id, refset_id as u64)),
            (Occur::Must, self.term_u64(self.fields.active, 1)),
        ]);
        let hits = searcher.search(&query, &FastFieldCollector::new("referenced_component_id"))?;
        Ok(hits.into_iter().map(|v| v as SctId).collect())
    }

    /// Evaluates a `field op value` predicate over the active members of
    /// `refset_id`, returning the referenced components that satisfy it.
    /// Ordered comparisons and equality are both resolved as indexed range
    /// or term queries over the column's own typed field, not by scanning
    /// and decoding every candidate row.
    pub fn filter(
        &self,
        refset_id: SctId,
        field: &str,
        comparison: FieldComparison,
        value: &FieldValue,
    ) -> SearchResult<Vec<SctId>> {
        let Some(column) = self.fields.columns.get(field) else {
            return Ok(Vec::new());
        };

        let searcher = self.reader.searcher();
        let mut clauses = vec![
            (Occur::Must, self.term_u64(self.fields.refset_id, refset_id as u64)),
            (Occur::Must, self.term_u64(self.fields.active, 1)),
        ];

        match comparison {
            FieldComparison::NotEqual => {
                let Some(equal) = self.column_equal_query(column, value) else {
                    return Ok(Vec::new());
                };
                clauses.push((Occur::MustNot, equal));
            }
            _ => {
                let Some(predicate) = self.column_query(column, comparison, value) else {
                    return Ok(Vec::new());
                };
                clauses.push((Occur::Must, predicate));
            }
        }

        let query = BooleanQuery::new(clauses);
        let top_docs = searcher.search(&query, &FastFieldCollector::new("referenced_component_id"))?;
        let mut matches: Vec<SctId> = top_docs.into_iter().map(|v| v as SctId).collect();
        matches.sort_unstable();
        matches.dedup();
        Ok(matches)
    }

    /// Evaluates a text predicate (prefix, wildcard, or exact term) against
    /// a declared `Str` column, as its own query primitive distinct from
    /// [`FieldComparison::Equal`]'s exact-match semantics.
    pub fn filter_text(
        &self,
        refset_id: SctId,
        field: &str,
        predicate: TextPredicate,
        text: &str,
    ) -> SearchResult<Vec<SctId>> {
        let Some(column) = self.fields.columns.get(field) else {
            return Ok(Vec::new());
        };
        if column.kind != ColumnKind::Str {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let text_query: Box<dyn TantivyQuery> = match predicate {
            TextPredicate::Term => self.term_text(column.field, text),
            TextPredicate::Prefix => {
                Box::new(RegexQuery::from_pattern(&format!("{}.*", regex_escape(text)), column.field)?)
            }
            TextPredicate::Wildcard => Box::new(RegexQuery::from_pattern(&glob_to_regex(text), column.field)?),
        };
        let query = BooleanQuery::new(vec![
            (Occur::Must, self.term_u64(self.fields.refset_id, refset_id as u64)),
            (Occur::Must, self.term_u64(self.fields.active, 1)),
            (Occur::Must, text_query),
        ]);
        let top_docs = searcher.search(&query, &FastFieldCollector::new("referenced_component_id"))?;
        let mut matches: Vec<SctId> = top_docs.into_iter().map(|v| v as SctId).collect();
        matches.sort_unstable();
        matches.dedup();
        Ok(matches)
    }

    /// The exact-equality query for a column, used both by `Equal` and as
    /// the negated clause behind `NotEqual`.
    fn column_equal_query(&self, column: &Column, value: &FieldValue) -> Option<Box<dyn TantivyQuery>> {
        match (column.kind, value) {
            (ColumnKind::Str, FieldValue::Str(s)) => Some(self.term_text(column.field, s)),
            (ColumnKind::Integer, FieldValue::Integer(i)) => Some(self.term_i64(column.field, *i)),
            (ColumnKind::Decimal, FieldValue::Decimal(d)) => {
                let name = self.index.schema().get_field_name(column.field).to_string();
                Some(Box::new(tantivy::query::RangeQuery::new_f64(name, *d..f64_next(*d))))
            }
            (ColumnKind::Boolean, FieldValue::Boolean(b)) => Some(self.term_u64(column.field, *b as u64)),
            _ => None,
        }
    }

    fn column_query(
        &self,
        column: &Column,
        comparison: FieldComparison,
        value: &FieldValue,
    ) -> Option<Box<dyn TantivyQuery>> {
        match comparison {
            FieldComparison::Equal => self.column_equal_query(column, value),
            FieldComparison::NotEqual => None,
            FieldComparison::LessThan
            | FieldComparison::LessThanOrEqual
            | FieldComparison::GreaterThan
            | FieldComparison::GreaterThanOrEqual => match (column.kind, value) {
                (ColumnKind::Integer, FieldValue::Integer(i)) => {
                    Some(self.i64_range_query(column.field, comparison, *i))
                }
                (ColumnKind::Decimal, FieldValue::Decimal(d)) => {
                    Some(self.f64_range_query(column.field, comparison, *d))
                }
                _ => None,
            },
        }
    }

    /// Builds a half-open range query for an ordered comparison (`Equal`
    /// is never passed here — it goes through [`Self::column_equal_query`]
    /// instead, which uses a point [`TermQuery`]).
    fn i64_range_query(&self, field: Field, comparison: FieldComparison, value: i64) -> Box<dyn TantivyQuery> {
        use tantivy::query::RangeQuery;
        let range = match comparison {
            FieldComparison::LessThan => i64::MIN..value,
            FieldComparison::LessThanOrEqual => i64::MIN..value.saturating_add(1),
            FieldComparison::GreaterThan => value.saturating_add(1)..i64::MAX,
            FieldComparison::GreaterThanOrEqual => value..i64::MAX,
            FieldComparison::Equal | FieldComparison::NotEqual => value..value.saturating_add(1),
        };
        let name = self.index.schema().get_field_name(field).to_string();
        Box::new(RangeQuery::new_i64(name, range))
    }

    fn f64_range_query(&self, field: Field, comparison: FieldComparison, value: f64) -> Box<dyn TantivyQuery> {
        use tantivy::query::RangeQuery;
        let range = match comparison {
            FieldComparison::LessThan => f64::MIN..value,
            FieldComparison::LessThanOrEqual => f64::MIN..f64_next(value),
            FieldComparison::GreaterThan => f64_next(value)..f64::MAX,
            FieldComparison::GreaterThanOrEqual => value..f64::MAX,
            FieldComparison::Equal | FieldComparison::NotEqual => value..f64_next(value),
        };
        let name = self.index.schema().get_field_name(field).to_string();
        Box::new(RangeQuery::new_f64(name, range))
    }

    fn term_u64(&self, field: Field, value: u64) -> Box<dyn TantivyQuery> {
        Box::new(TermQuery::new(Term::from_field_u64(field, value), IndexRecordOption::Basic))
    }

    fn term_i64(&self, field: Field, value: i64) -> Box<dyn TantivyQuery> {
        Box::new(TermQuery::new(Term::from_field_i64(field, value), IndexRecordOption::Basic))
    }

    fn term_text(&self, field: Field, value: &str) -> Box<dyn TantivyQuery> {
        Box::new(TermQuery::new(Term::from_field_text(field, value), IndexRecordOption::Basic))
    }
}

/// The smallest representable value greater than `value`, used to turn an
/// inclusive bound into the half-open range tantivy's `RangeQuery` expects.
fn f64_next(value: f64) -> f64 {
    const EPSILON: f64 = 1e-9;
    value + EPSILON
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

fn glob_to_regex(glob: &str) -> String {
    let mut regex = String::with_capacity(glob.len() + 2);
    for c in glob.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            '\\' | '.' | '+' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' => {
                regex.push('\\');
                regex.push(c);
            }
            other => regex.push(other),
        }
    }
    regex
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_docs() -> Vec<MemberDoc> {
        vec![
            MemberDoc {
                uuid: "11111111-1111-1111-1111-111111111111".to_string(),
                refset_id: 447562003,
                referenced_component_id: 24700007,
                module_id: 900000000000207008,
                active: true,
                fields: vec![
                    ("mapTarget".to_string(), FieldValue::Str("G35".to_string())),
                    ("mapPriority".to_string(), FieldValue::Integer(1)),
                ],
            },
            MemberDoc {
                uuid: "22222222-2222-2222-2222-222222222222".to_string(),
                refset_id: 447562003,
                referenced_component_id: 398254007,
                module_id: 900000000000207008,
                active: true,
                fields: vec![
                    ("mapTarget".to_string(), FieldValue::Str("K90.0".to_string())),
                    ("mapPriority".to_string(), FieldValue::Integer(3)),
                ],
            },
        ]
    }

    #[test]
    fn members_of_returns_active_referenced_components() {
        let index = MemberIndex::build_in_ram(&sample_docs()).unwrap();
        let mut members = index.members_of(447562003).unwrap();
        members.sort_unstable();
        assert_eq!(members, vec![24700007, 398254007]);
    }

    #[test]
    fn filter_equal_is_exact_not_a_prefix_match() {
        let index = MemberIndex::build_in_ram(&sample_docs()).unwrap();
        let hits = index
            .filter(447562003, "mapTarget", FieldComparison::Equal, &FieldValue::Str("G35".to_string()))
            .unwrap();
        assert_eq!(hits, vec![24700007]);

        let no_hits = index
            .filter(447562003, "mapTarget", FieldComparison::Equal, &FieldValue::Str("G3".to_string()))
            .unwrap();
        assert!(no_hits.is_empty());
    }

    #[test]
    fn filter_prefix_matches_via_text_predicate() {
        let index = MemberIndex::build_in_ram(&sample_docs()).unwrap();
        let hits = index.filter_text(447562003, "mapTarget", TextPredicate::Prefix, "G3").unwrap();
        assert_eq!(hits, vec![24700007]);
    }

    #[test]
    fn filter_wildcard_matches_glob_pattern() {
        let index = MemberIndex::build_in_ram(&sample_docs()).unwrap();
        let hits = index.filter_text(447562003, "mapTarget", TextPredicate::Wildcard, "K90.*").unwrap();
        assert_eq!(hits, vec![398254007]);
    }

    #[test]
    fn filter_ordered_comparison_on_integer_column() {
        let index = MemberIndex::build_in_ram(&sample_docs()).unwrap();
        let hits = index
            .filter(447562003, "mapPriority", FieldComparison::GreaterThan, &FieldValue::Integer(1))
            .unwrap();
        assert_eq!(hits, vec![398254007]);

        let hits = index
            .filter(447562003, "mapPriority", FieldComparison::LessThanOrEqual, &FieldValue::Integer(1))
            .unwrap();
        assert_eq!(hits, vec![24700007]);
    }

    #[test]
    fn filter_unknown_column_returns_no_matches() {
        let index = MemberIndex::build_in_ram(&sample_docs()).unwrap();
        let hits = index
            .filter(447562003, "noSuchColumn", FieldComparison::Equal, &FieldValue::Str("x".to_string()))
            .unwrap();
        assert!(hits.is_empty());
    }
}
