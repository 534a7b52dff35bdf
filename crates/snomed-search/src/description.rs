//! Lucene-style description index: one document per active or inactive
//! description, searchable by term (exact, prefix, wildcard, fuzzy) and
//! filterable by type, dialect, and active status.
//!
//! Every description document also carries its owning concept's attribute
//! profile — direct relationship targets (`d<typeId>`), their IsA-ancestor
//! closures (`t<typeId>`), per-type occurrence counts (`c<typeId>`), and
//! concrete relationship values (`v<typeId>`) — baked in by
//! [`crate`]'s caller at index-build time from
//! `Store::parent_relationships_expanded`/`grouped_properties`/
//! `concrete_values`. This is what lets ECL attribute refinement resolve
//! `: 363698007 |Finding site| = << 442083009` as a handful of term
//! lookups instead of walking the concept graph per candidate.

use std::collections::{BTreeSet, HashMap};

use snomed_types::{ConcreteValue, SctId};
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, FuzzyTermQuery, Occur, Query as TantivyQuery, RegexQuery, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value, FAST, INDEXED, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, Term};

use crate::collector::FastFieldCollector;
use crate::error::{SearchError, SearchResult};

const WRITER_BUDGET_BYTES: usize = 50_000_000;

/// One row to be indexed: a description together with the concept-level
/// and dialect-level facts the index needs to answer ECL description
/// filters without consulting the component store.
#[derive(Debug, Clone, Default)]
pub struct DescriptionDoc {
    /// The description's own id.
    pub description_id: SctId,
    /// The concept this description belongs to.
    pub concept_id: SctId,
    /// The description text.
    pub term: String,
    /// ISO language code, e.g. `en`.
    pub language: String,
    /// FSN / Synonym / Definition type id.
    pub type_id: SctId,
    /// Case significance id.
    pub case_significance_id: SctId,
    /// Whether the description row is active.
    pub active: bool,
    /// The description's module.
    pub module_id: SctId,
    /// Language reference sets in which this description is Preferred.
    pub preferred_in: Vec<SctId>,
    /// Language reference sets in which this description is Acceptable
    /// (including those where it's Preferred — Preferred implies Acceptable).
    pub acceptable_in: Vec<SctId>,
    /// `{typeId -> destinationId}`: the concept's direct (unexpanded)
    /// relationship targets, one entry per relationship.
    pub direct_attributes: Vec<(SctId, SctId)>,
    /// `{typeId -> ancestorId}`: each direct target's own IsA-ancestor
    /// closure (itself included), per [`snomed_store::Store::parent_relationships_expanded`].
    /// Lets a `<<value` refinement resolve to a single term lookup instead
    /// of computing the descendant closure of `value`.
    pub transitive_attributes: Vec<(SctId, SctId)>,
    /// `{typeId -> occurrence count}`: how many relationships of each type
    /// the concept has, for cardinality refinements (`2..* hasActiveIngredient = ...`).
    pub attribute_counts: Vec<(SctId, u32)>,
    /// `{typeId -> value}`: concrete relationship values.
    pub concrete_attributes: Vec<(SctId, ConcreteValue)>,
    /// Reference sets the owning concept itself is a member of.
    pub concept_refsets: Vec<SctId>,
    /// Reference sets this description (not its concept) is a member of,
    /// beyond the language reference sets already captured by
    /// `preferred_in`/`acceptable_in`.
    pub description_refsets: Vec<SctId>,
    /// The concept's preferred term in `language`, stored alongside `term`
    /// so a synonym hit can still surface the form users expect to see.
    pub preferred_term: String,
    /// A ranking nudge favouring shorter terms among equally relevant
    /// matches — SNOMED's FSNs and long synonyms otherwise crowd out the
    /// term a user most likely meant.
    pub length_boost: f32,
}

/// The tantivy field type an attribute-value column is indexed as. Fixed
/// per type id by the kind of the first concrete value seen for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConcreteKind {
    Str,
    Integer,
    Decimal,
}

impl ConcreteKind {
    fn of(value: &ConcreteValue) -> Self {
        match value {
            ConcreteValue::String(_) => ConcreteKind::Str,
            ConcreteValue::Integer(_) => ConcreteKind::Integer,
            ConcreteValue::Decimal(_) => ConcreteKind::Decimal,
        }
    }
}

#[derive(Clone)]
struct ConcreteColumn {
    field: Field,
    kind: ConcreteKind,
}

#[derive(Clone)]
struct Fields {
    description_id: Field,
    concept_id: Field,
    term: Field,
    preferred_term: Field,
    language: Field,
    type_id: Field,
    case_significance_id: Field,
    active: Field,
    module_id: Field,
    preferred_in: Field,
    acceptable_in: Field,
    concept_refsets: Field,
    description_refsets: Field,
    length_boost: Field,
    /// `d<typeId>`, keyed by `typeId`.
    direct_attributes: HashMap<SctId, Field>,
    /// `t<typeId>`, keyed by `typeId`.
    transitive_attributes: HashMap<SctId, Field>,
    /// `c<typeId>`, keyed by `typeId`.
    attribute_counts: HashMap<SctId, Field>,
    /// `v<typeId>`, keyed by `typeId`.
    concrete_attributes: HashMap<SctId, ConcreteColumn>,
}

/// Builds a schema with one dynamic field per distinct attribute type id
/// seen across `docs`, alongside the fixed description-level fields.
/// Tantivy schemas are fixed at index-build time, so (as with
/// [`crate::member::MemberIndex`]'s per-column fields) the full document
/// set has to be in hand before the schema is declared.
fn build_schema(docs: &[DescriptionDoc]) -> (Schema, Fields) {
    let mut builder = Schema::builder();
    let description_id = builder.add_u64_field("description_id", STORED);
    let concept_id = builder.add_u64_field("concept_id", STORED | FAST);
    let term = builder.add_text_field("term", TEXT | STORED);
    let preferred_term = builder.add_text_field("preferred-term", TEXT | STORED);
    let language = builder.add_text_field("language", STRING | STORED);
    let type_id = builder.add_u64_field("type_id", STORED | FAST | INDEXED);
    let case_significance_id = builder.add_u64_field("case_significance_id", STORED | INDEXED);
    let active = builder.add_u64_field("active", STORED | FAST | INDEXED);
    let module_id = builder.add_u64_field("module_id", STORED | FAST | INDEXED);
    let preferred_in = builder.add_u64_field("preferred_in", FAST | INDEXED);
    let acceptable_in = builder.add_u64_field("acceptable_in", FAST | INDEXED);
    let concept_refsets = builder.add_u64_field("concept-refsets", FAST | INDEXED);
    let description_refsets = builder.add_u64_field("description-refsets", FAST | INDEXED);
    let length_boost = builder.add_f64_field("length-boost", FAST | STORED);

    let mut direct_type_ids = BTreeSet::new();
    let mut transitive_type_ids = BTreeSet::new();
    let mut count_type_ids = BTreeSet::new();
    let mut concrete_kinds: HashMap<SctId, ConcreteKind> = HashMap::new();
    for row in docs {
        direct_type_ids.extend(row.direct_attributes.iter().map(|(t, _)| *t));
        transitive_type_ids.extend(row.transitive_attributes.iter().map(|(t, _)| *t));
        count_type_ids.extend(row.attribute_counts.iter().map(|(t, _)| *t));
        for (type_id, value) in &row.concrete_attributes {
            concrete_kinds.entry(*type_id).or_insert_with(|| ConcreteKind::of(value));
        }
    }

    let direct_attributes = direct_type_ids
        .into_iter()
        .map(|type_id| (type_id, builder.add_u64_field(&format!("d{type_id}"), FAST | INDEXED)))
        .collect();
    let transitive_attributes = transitive_type_ids
        .into_iter()
        .map(|type_id| (type_id, builder.add_u64_field(&format!("t{type_id}"), FAST | INDEXED)))
        .collect();
    let attribute_counts = count_type_ids
        .into_iter()
        .map(|type_id| (type_id, builder.add_u64_field(&format!("c{type_id}"), FAST | STORED)))
        .collect();
    let concrete_attributes = concrete_kinds
        .into_iter()
        .map(|(type_id, kind)| {
            let name = format!("v{type_id}");
            let field = match kind {
                ConcreteKind::Str => builder.add_text_field(&name, STRING | STORED),
                ConcreteKind::Integer => builder.add_i64_field(&name, STORED | FAST | INDEXED),
                ConcreteKind::Decimal => builder.add_f64_field(&name, STORED | FAST | INDEXED),
            };
            (type_id, ConcreteColumn { field, kind })
        })
        .collect();

    let fields = Fields {
        description_id,
        concept_id,
        term,
        preferred_term,
        language,
        type_id,
        case_significance_id,
        active,
        module_id,
        preferred_in,
        acceptable_in,
        concept_refsets,
        description_refsets,
        length_boost,
        direct_attributes,
        transitive_attributes,
        attribute_counts,
        concrete_attributes,
    };
    (builder.build(), fields)
}

/// How a term filter's text should be matched against a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Tokenized substring match (the tantivy default text query).
    Contains,
    /// Literal prefix match.
    StartsWith,
    /// `*`/`?` glob-style wildcard, translated to a regex.
    Wildcard,
    /// A regular expression over the raw term.
    Regex,
    /// Exact, case-sensitive match on the stored (untokenized) term.
    Exact,
}

/// The parameters of a single description-index lookup.
#[derive(Debug, Clone, Default)]
pub struct DescriptionQuery {
    /// Text to match against the description term, if any.
    pub term: Option<(MatchMode, String)>,
    /// Fuzzy edit distance to allow (0, 1, or 2); only applies to `Contains`.
    pub fuzzy_distance: u8,
    /// Restrict to these ISO language codes.
    pub languages: Option<Vec<String>>,
    /// Restrict to these description type ids.
    pub type_ids: Option<Vec<SctId>>,
    /// Restrict to these case significance ids.
    pub case_significance_ids: Option<Vec<SctId>>,
    /// Restrict to descriptions Preferred in one of these refsets.
    pub preferred_in: Option<Vec<SctId>>,
    /// Restrict to descriptions Acceptable in one of these refsets.
    pub acceptable_in: Option<Vec<SctId>>,
    /// Restrict to a specific active/inactive status.
    pub active: Option<bool>,
    /// Restrict to specific modules.
    pub module_ids: Option<Vec<SctId>>,
    /// Cap on the number of concept ids returned; `None` uses the
    /// unbounded collector.
    pub max_hits: Option<usize>,
}

/// A persistent or in-memory full-text index over SNOMED CT descriptions.
pub struct DescriptionIndex {
    index: Index,
    reader: IndexReader,
    fields: Fields,
}

impl DescriptionIndex {
    /// Builds a fresh in-memory index from `docs`. Intended for tests and
    /// for small demo datasets; production callers use [`Self::create_in_dir`].
    pub fn build_in_ram(docs: &[DescriptionDoc]) -> SearchResult<Self> {
        let (schema, fields) = build_schema(docs);
        let index = Index::create_in_ram(schema);
        Self::from_index(index, fields, docs)
    }

    /// Builds a fresh on-disk index at `path`, overwriting anything already
    /// indexed there.
    pub fn create_in_dir(path: &std::path::Path, docs: &[DescriptionDoc]) -> SearchResult<Self> {
        let (schema, fields) = build_schema(docs);
        let index = Index::create_in_dir(path, schema)?;
        Self::from_index(index, fields, docs)
    }

    fn from_index(index: Index, fields: Fields, docs: &[DescriptionDoc]) -> SearchResult<Self> {
        let mut writer: IndexWriter = index.writer(WRITER_BUDGET_BYTES)?;
        for row in docs {
            let mut document = doc!(
                fields.description_id => row.description_id as u64,
                fields.concept_id => row.concept_id as u64,
                fields.term => row.term.as_str(),
                fields.preferred_term => row.preferred_term.as_str(),
                fields.language => row.language.as_str(),
                fields.type_id => row.type_id as u64,
                fields.case_significance_id => row.case_significance_id as u64,
                fields.active => row.active as u64,
                fields.module_id => row.module_id as u64,
                fields.length_boost => row.length_boost as f64,
            );
            for refset_id in &row.preferred_in {
                document.add_u64(fields.preferred_in, *refset_id as u64);
            }
            for refset_id in &row.acceptable_in {
                document.add_u64(fields.acceptable_in, *refset_id as u64);
            }
            for refset_id in &row.concept_refsets {
                document.add_u64(fields.concept_refsets, *refset_id as u64);
            }
            for refset_id in &row.description_refsets {
                document.add_u64(fields.description_refsets, *refset_id as u64);
            }
            for (type_id, destination) in &row.direct_attributes {
                if let Some(field) = fields.direct_attributes.get(type_id) {
                    document.add_u64(*field, *destination as u64);
                }
            }
            for (type_id, ancestor) in &row.transitive_attributes {
                if let Some(field) = fields.transitive_attributes.get(type_id) {
                    document.add_u64(*field, *ancestor as u64);
                }
            }
            for (type_id, count) in &row.attribute_counts {
                if let Some(field) = fields.attribute_counts.get(type_id) {
                    document.add_u64(*field, *count as u64);
                }
            }
            for (type_id, value) in &row.concrete_attributes {
                if let Some(column) = fields.concrete_attributes.get(type_id) {
                    match value {
                        ConcreteValue::String(s) => document.add_text(column.field, s),
                        ConcreteValue::Integer(i) => document.add_i64(column.field, *i),
                        ConcreteValue::Decimal(d) => document.add_f64(column.field, *d),
                    }
                }
            }
            writer.add_document(document)?;
        }
        writer.commit()?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;

        Ok(Self { index, reader, fields })
    }

    /// Runs `query` and returns the distinct concept ids of matching
    /// descriptions.
    pub fn search(&self, query: &DescriptionQuery) -> SearchResult<Vec<SctId>> {
        let searcher = self.reader.searcher();

        let mut clauses: Vec<(Occur, Box<dyn TantivyQuery>)> = Vec::new();
        if let Some((mode, text)) = &query.term {
            clauses.push((Occur::Must, self.term_query(*mode, text, query.fuzzy_distance)?));
        }
        if let Some(languages) = &query.languages {
            clauses.push((Occur::Must, self.text_set_query(self.fields.language, languages)));
        }
        if let Some(type_ids) = &query.type_ids {
            clauses.push((Occur::Must, self.u64_set_query(self.fields.type_id, type_ids)));
        }
        if let Some(case_significance_ids) = &query.case_significance_ids {
            clauses.push((Occur::Must, self.u64_set_query(self.fields.case_significance_id, case_significance_ids)));
        }
        if let Some(refsets) = &query.preferred_in {
            clauses.push((Occur::Must, self.u64_set_query(self.fields.preferred_in, refsets)));
        }
        if let Some(refsets) = &query.acceptable_in {
            clauses.push((Occur::Must, self.u64_set_query(self.fields.acceptable_in, refsets)));
        }
        if let Some(active) = query.active {
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_u64(self.fields.active, active as u64),
                    IndexRecordOption::Basic,
                )),
            ));
        }
        if let Some(modules) = &query.module_ids {
            clauses.push((Occur::Must, self.u64_set_query(self.fields.module_id, modules)));
        }

        if clauses.is_empty() {
            return Ok(Vec::new());
        }
        let combined = BooleanQuery::new(clauses);

        let mut concept_ids: BTreeSet<SctId> = BTreeSet::new();
        if let Some(limit) = query.max_hits {
            let top_docs = searcher.search(&combined, &TopDocs::with_limit(limit.max(1)))?;
            for (_score, address) in top_docs {
                let retrieved: tantivy::TantivyDocument = searcher.doc(address)?;
                if let Some(value) = retrieved.get_first(self.fields.concept_id).and_then(|v| v.as_u64()) {
                    concept_ids.insert(value as SctId);
                }
            }
        } else {
            let hits = searcher.search(&combined, &FastFieldCollector::new("concept_id"))?;
            concept_ids.extend(hits.into_iter().map(|v| v as SctId));
        }

        Ok(concept_ids.into_iter().collect())
    }

    /// Concepts with a relationship whose type is one of `type_ids` and
    /// whose value resolves to one of `value_ids` — `transitive = true`
    /// checks each type's ancestor-closure field (`t<typeId>`, matching
    /// ECL's `<<value` subsumption), `transitive = false` checks the
    /// direct, unexpanded field (`d<typeId>`, exact-value match).
    ///
    /// Returns `Ok(Vec::new())` for type ids the store never indexed a
    /// relationship of; callers shouldn't need to fall back for those,
    /// since "no field" and "field never matches" mean the same thing.
    pub fn concepts_with_attribute(
        &self,
        type_ids: &[SctId],
        value_ids: &[SctId],
        transitive: bool,
    ) -> SearchResult<Vec<SctId>> {
        let columns = if transitive { &self.fields.transitive_attributes } else { &self.fields.direct_attributes };
        let mut clauses: Vec<(Occur, Box<dyn TantivyQuery>)> = Vec::new();
        for type_id in type_ids {
            let Some(field) = columns.get(type_id) else { continue };
            for value_id in value_ids {
                clauses.push((
                    Occur::Should,
                    Box::new(TermQuery::new(Term::from_field_u64(*field, *value_id as u64), IndexRecordOption::Basic))
                        as Box<dyn TantivyQuery>,
                ));
            }
        }
        if clauses.is_empty() {
            return Ok(Vec::new());
        }
        let query = BooleanQuery::new(clauses);
        let searcher = self.reader.searcher();
        let hits = searcher.search(&query, &FastFieldCollector::new("concept_id"))?;
        let mut ids: Vec<SctId> = hits.into_iter().map(|v| v as SctId).collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    /// The number of relationships of `type_id` on `concept_id`, read from
    /// the precomputed `c<typeId>` field of one of its description rows
    /// (every description of a concept carries the same attribute counts,
    /// so the first match suffices). Returns 0 if `concept_id` has no
    /// description in the index or no relationship of `type_id`.
    pub fn attribute_count(&self, concept_id: SctId, type_id: SctId) -> SearchResult<u32> {
        let Some(field) = self.fields.attribute_counts.get(&type_id) else {
            return Ok(0);
        };
        let searcher = self.reader.searcher();
        let query =
            TermQuery::new(Term::from_field_u64(self.fields.concept_id, concept_id as u64), IndexRecordOption::Basic);
        let top_docs = searcher.search(&query, &TopDocs::with_limit(1))?;
        for (_score, address) in top_docs {
            let retrieved: tantivy::TantivyDocument = searcher.doc(address)?;
            if let Some(value) = retrieved.get_first(*field).and_then(|v| v.as_u64()) {
                return Ok(value as u32);
            }
        }
        Ok(0)
    }

    /// Concepts with a concrete relationship of `type_id` equal to `value`,
    /// read from the precomputed `v<typeId>` field instead of decoding
    /// `Store::concrete_values` per candidate.
    pub fn concepts_with_concrete_attribute(&self, type_id: SctId, value: &ConcreteValue) -> SearchResult<Vec<SctId>> {
        let Some(column) = self.fields.concrete_attributes.get(&type_id) else {
            return Ok(Vec::new());
        };
        let query: Box<dyn TantivyQuery> = match (column.kind, value) {
            (ConcreteKind::Str, ConcreteValue::String(s)) => {
                Box::new(TermQuery::new(Term::from_field_text(column.field, s), IndexRecordOption::Basic))
            }
            (ConcreteKind::Integer, ConcreteValue::Integer(i)) => {
                Box::new(TermQuery::new(Term::from_field_i64(column.field, *i), IndexRecordOption::Basic))
            }
            (ConcreteKind::Decimal, ConcreteValue::Decimal(d)) => {
                let name = self.index.schema().get_field_name(column.field).to_string();
                Box::new(tantivy::query::RangeQuery::new_f64(name, *d..(*d + 1e-9)))
            }
            _ => return Ok(Vec::new()),
        };
        let searcher = self.reader.searcher();
        let hits = searcher.search(&*query, &FastFieldCollector::new("concept_id"))?;
        let mut ids: Vec<SctId> = hits.into_iter().map(|v| v as SctId).collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn term_query(&self, mode: MatchMode, text: &str, fuzzy_distance: u8) -> SearchResult<Box<dyn TantivyQuery>> {
        match mode {
            MatchMode::Contains if fuzzy_distance > 0 => {
                let term = Term::from_field_text(self.fields.term, text);
                Ok(Box::new(FuzzyTermQuery::new(term, fuzzy_distance.min(2) as u8, true)))
            }
            MatchMode::Contains => {
                let parser = tantivy::query::QueryParser::for_index(&self.index, vec![self.fields.term]);
                parser
                    .parse_query(text)
                    .map_err(|e| SearchError::InvalidQuery { query: text.to_string(), message: e.to_string() })
            }
            MatchMode::StartsWith => {
                let regex = format!("{}.*", regex_escape(text));
                Ok(Box::new(RegexQuery::from_pattern(&regex, self.fields.term)?))
            }
            MatchMode::Wildcard => {
                if text.starts_with('*') {
                    return Err(SearchError::LeadingWildcard(text.to_string()));
                }
                let regex = glob_to_regex(text);
                Ok(Box::new(RegexQuery::from_pattern(&regex, self.fields.term)?))
            }
            MatchMode::Regex => Ok(Box::new(RegexQuery::from_pattern(text, self.fields.term)?)),
            MatchMode::Exact => Ok(Box::new(TermQuery::new(
                Term::from_field_text(self.fields.term, text),
                IndexRecordOption::Basic,
            ))),
        }
    }

    fn text_set_query(&self, field: Field, values: &[String]) -> Box<dyn TantivyQuery> {
        let clauses = values
            .iter()
            .map(|v| {
                let term = Term::from_field_text(field, v);
                (Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::Basic)) as Box<dyn TantivyQuery>)
            })
            .collect();
        Box::new(BooleanQuery::new(clauses))
    }

    fn u64_set_query(&self, field: Field, values: &[SctId]) -> Box<dyn TantivyQuery> {
        let clauses = values
            .iter()
            .map(|v| {
                let term = Term::from_field_u64(field, *v as u64);
                (Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::Basic)) as Box<dyn TantivyQuery>)
            })
            .collect();
        Box::new(BooleanQuery::new(clauses))
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

    fn sample_docs() -> Vec<DescriptionDoc> {
        vec![
            DescriptionDoc {
                description_id: 1,
                concept_id: 73211009,
                term: "Diabetes mellitus".to_string(),
                preferred_term: "Diabetes mellitus".to_string(),
                language: "en".to_string(),
                type_id: 900000000000013009,
                case_significance_id: 900000000000448009,
                active: true,
                module_id: 900000000000207008,
                preferred_in: vec![900000000000509007],
                acceptable_in: vec![900000000000509007],
                direct_attributes: vec![(363698007, 113331007)],
                transitive_attributes: vec![(363698007, 113331007), (363698007, 123037004)],
                attribute_counts: vec![(363698007, 1)],
                length_boost: 1.0,
                ..Default::default()
            },
            DescriptionDoc {
                description_id: 2,
                concept_id: 46635009,
                term: "Type 1 diabetes mellitus".to_string(),
                preferred_term: "Type 1 diabetes mellitus".to_string(),
                language: "en".to_string(),
                type_id: 900000000000013009,
                case_significance_id: 900000000000448009,
                active: true,
                module_id: 900000000000207008,
                preferred_in: vec![900000000000509007],
                acceptable_in: vec![900000000000509007],
                length_boost: 1.0,
                ..Default::default()
            },
            DescriptionDoc {
                description_id: 3,
                concept_id: 64572001,
                term: "Cardiomyopathy".to_string(),
                preferred_term: "Cardiomyopathy".to_string(),
                language: "en".to_string(),
                type_id: 900000000000013009,
                case_significance_id: 900000000000448009,
                active: true,
                module_id: 900000000000207008,
                preferred_in: vec![],
                acceptable_in: vec![999001261000000100],
                length_boost: 1.0,
                ..Default::default()
            },
        ]
    }

    #[test]
    fn contains_query_finds_both_diabetes_descriptions() {
        let index = DescriptionIndex::build_in_ram(&sample_docs()).unwrap();
        let hits = index
            .search(&DescriptionQuery { term: Some((MatchMode::Contains, "diabetes".into())), ..Default::default() })
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.contains(&73211009));
        assert!(hits.contains(&46635009));
    }

    #[test]
    fn wildcard_query_matches_glob_pattern() {
        let index = DescriptionIndex::build_in_ram(&sample_docs()).unwrap();
        let hits = index
            .search(&DescriptionQuery {
                term: Some((MatchMode::Wildcard, "cardi*opathy".into())),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(hits, vec![64572001]);
    }

    #[test]
    fn leading_wildcard_is_rejected() {
        let index = DescriptionIndex::build_in_ram(&sample_docs()).unwrap();
        let err = index
            .search(&DescriptionQuery { term: Some((MatchMode::Wildcard, "*opathy".into())), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, SearchError::LeadingWildcard(_)));
    }

    #[test]
    fn dialect_filter_restricts_to_acceptable_in_refset() {
        let index = DescriptionIndex::build_in_ram(&sample_docs()).unwrap();
        let hits = index
            .search(&DescriptionQuery { acceptable_in: Some(vec![999001261000000100]), ..Default::default() })
            .unwrap();
        assert_eq!(hits, vec![64572001]);
    }

    #[test]
    fn language_filter_restricts_to_requested_codes() {
        let mut docs = sample_docs();
        docs.push(DescriptionDoc {
            description_id: 4,
            concept_id: 73211009,
            term: "Diabetes mellitus".to_string(),
            preferred_term: "Diabetes mellitus".to_string(),
            language: "es".to_string(),
            type_id: 900000000000013009,
            case_significance_id: 900000000000448009,
            active: true,
            module_id: 900000000000207008,
            length_boost: 1.0,
            ..Default::default()
        });
        let index = DescriptionIndex::build_in_ram(&docs).unwrap();
        let hits = index
            .search(&DescriptionQuery { languages: Some(vec!["es".to_string()]), ..Default::default() })
            .unwrap();
        assert_eq!(hits, vec![73211009]);
    }

    #[test]
    fn type_filter_combines_with_term_filter() {
        let index = DescriptionIndex::build_in_ram(&sample_docs()).unwrap();
        let hits = index
            .search(&DescriptionQuery {
                term: Some((MatchMode::Contains, "diabetes".into())),
                type_ids: Some(vec![900000000000013009]),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn concepts_with_attribute_matches_direct_target() {
        let index = DescriptionIndex::build_in_ram(&sample_docs()).unwrap();
        let hits = index.concepts_with_attribute(&[363698007], &[113331007], false).unwrap();
        assert_eq!(hits, vec![73211009]);
    }

    #[test]
    fn concepts_with_attribute_transitive_matches_ancestor() {
        let index = DescriptionIndex::build_in_ram(&sample_docs()).unwrap();
        let hits = index.concepts_with_attribute(&[363698007], &[123037004], true).unwrap();
        assert_eq!(hits, vec![73211009]);

        let exact_only = index.concepts_with_attribute(&[363698007], &[123037004], false).unwrap();
        assert!(exact_only.is_empty());
    }

    #[test]
    fn attribute_count_reads_back_precomputed_count() {
        let index = DescriptionIndex::build_in_ram(&sample_docs()).unwrap();
        assert_eq!(index.attribute_count(73211009, 363698007).unwrap(), 1);
        assert_eq!(index.attribute_count(73211009, 999999999).unwrap(), 0);
    }
}
