//! Orchestrates a full RF2 release import into a [`snomed_store::Store`].
//!
//! Each file is streamed in batches of `config.batch_size` rows. A row that
//! fails to parse is logged and skipped; it never aborts the file. A row
//! that parses but fails to write (the store's own retry budget exhausted)
//! is retried once in isolation from the rest of its batch so a single bad
//! row can't sink every other row alongside it — the error is logged and
//! surfaced to the caller only after the whole file has been processed.

use std::path::Path;

use snomed_store::{Store, StoreError, StoreResult};
use snomed_types::{Rf2Concept, Rf2ConcreteRelationship, Rf2Description, Rf2Relationship};
use tracing::{error, info, warn};

use crate::loader::discover_rf2_files;
use crate::parser::{Rf2Parser, Rf2Record};
use crate::refset::*;
use crate::types::{Rf2Config, Rf2Error, Rf2Files, Rf2Result};

/// Row counts accumulated while importing one release.
#[derive(Debug, Clone, Default)]
pub struct ImportStats {
    /// Rows written (new or updated an older effective time).
    pub written: usize,
    /// Rows read but left unchanged (an equal or newer row already stored).
    pub unchanged: usize,
    /// Rows that failed to parse and were skipped.
    pub parse_errors: usize,
    /// Rows that parsed but failed to write even after the isolated retry.
    pub write_errors: usize,
}

impl ImportStats {
    fn merge(&mut self, other: ImportStats) {
        self.written += other.written;
        self.unchanged += other.unchanged;
        self.parse_errors += other.parse_errors;
        self.write_errors += other.write_errors;
    }
}

/// Discovers and imports every RF2 file in `release_dir` into `store`,
/// then rebuilds the derived indices.
pub fn import_release<P: AsRef<Path>>(release_dir: P, store: &Store, config: &Rf2Config) -> Rf2Result<ImportStats> {
    let files = discover_rf2_files(release_dir)?;
    let mut stats = ImportStats::default();

    if let Some(path) = &files.concept_file {
        stats.merge(import_rows::<Rf2Concept>(path, config, |row| store.write_concept(row))?);
    }
    if let Some(path) = &files.description_file {
        stats.merge(import_rows::<Rf2Description>(path, config, |row| store.write_description(row))?);
    }
    if let Some(path) = &files.text_definition_file {
        stats.merge(import_rows::<Rf2Description>(path, config, |row| store.write_description(row))?);
    }
    if let Some(path) = &files.relationship_file {
        stats.merge(import_rows::<Rf2Relationship>(path, config, |row| store.write_relationship(row))?);
    }
    if let Some(path) = &files.concrete_relationship_file {
        stats.merge(import_rows::<Rf2ConcreteRelationship>(path, config, |row| store.write_concrete_value(row))?);
    }

    info!(
        written = stats.written,
        unchanged = stats.unchanged,
        parse_errors = stats.parse_errors,
        write_errors = stats.write_errors,
        "import.batch: core component files done, rebuilding relationship indices"
    );
    store.index_relationships()?;

    stats.merge(import_refsets(&files, store, config)?);
    store.index_refsets()?;

    Ok(stats)
}

fn import_refsets(files: &Rf2Files, store: &Store, config: &Rf2Config) -> Rf2Result<ImportStats> {
    let mut stats = ImportStats::default();

    for path in &files.simple_refset_files {
        stats.merge(import_refset_rows::<SimpleRefsetRow>(path, config, store)?);
    }
    for path in &files.language_refset_files {
        stats.merge(import_refset_rows::<LanguageRefsetRow>(path, config, store)?);
    }
    for path in &files.association_refset_files {
        stats.merge(import_refset_rows::<AssociationRefsetRow>(path, config, store)?);
    }
    for path in &files.owl_expression_files {
        stats.merge(import_refset_rows::<OwlExpressionRow>(path, config, store)?);
    }
    for path in &files.simple_map_refset_files {
        stats.merge(import_refset_rows::<SimpleMapRefsetRow>(path, config, store)?);
    }
    for path in &files.complex_map_refset_files {
        stats.merge(import_refset_rows::<ComplexMapRefsetRow>(path, config, store)?);
    }
    for path in &files.extended_map_refset_files {
        stats.merge(import_refset_rows::<ExtendedMapRefsetRow>(path, config, store)?);
    }
    for path in &files.attribute_value_refset_files {
        stats.merge(import_refset_rows::<AttributeValueRefsetRow>(path, config, store)?);
    }
    if let Some(path) = &files.refset_descriptor_file {
        stats.merge(import_refset_rows::<RefsetDescriptorRow>(path, config, store)?);
    }
    if let Some(path) = &files.module_dependency_file {
        stats.merge(import_refset_rows::<ModuleDependencyRow>(path, config, store)?);
    }
    if let Some(path) = &files.mrcm_domain {
        stats.merge(import_refset_rows::<MrcmDomainRow>(path, config, store)?);
    }
    if let Some(path) = &files.mrcm_attribute_domain {
        stats.merge(import_refset_rows::<MrcmAttributeDomainRow>(path, config, store)?);
    }
    if let Some(path) = &files.mrcm_attribute_range {
        stats.merge(import_refset_rows::<MrcmAttributeRangeRow>(path, config, store)?);
    }

    Ok(stats)
}

fn import_refset_rows<T>(path: &Path, config: &Rf2Config, store: &Store) -> Rf2Result<ImportStats>
where
    T: Rf2Record + RefsetRow,
{
    let headings: Vec<String> = T::EXPECTED_COLUMNS[6..].iter().map(|s| s.to_string()).collect();
    import_rows::<T>(path, config, |row| store.write_refset_item(&headings, row.item()))
}

/// Adapts a refset row wrapper to the `RefsetItem` it carries.
trait RefsetRow {
    fn item(&self) -> &snomed_types::RefsetItem;
}

macro_rules! impl_refset_row {
    ($($ty:ty),* $(,)?) => {
        $(impl RefsetRow for $ty {
            fn item(&self) -> &snomed_types::RefsetItem {
                &self.0
            }
        })*
    };
}

impl_refset_row!(
    SimpleRefsetRow,
    LanguageRefsetRow,
    AssociationRefsetRow,
    crate::owl_expression::OwlExpressionRow,
    SimpleMapRefsetRow,
    ComplexMapRefsetRow,
    ExtendedMapRefsetRow,
    AttributeValueRefsetRow,
    RefsetDescriptorRow,
    ModuleDependencyRow,
    MrcmDomainRow,
    MrcmAttributeDomainRow,
    MrcmAttributeRangeRow,
);

fn import_rows<T: Rf2Record>(
    path: &Path,
    config: &Rf2Config,
    mut write_row: impl FnMut(&T) -> StoreResult<bool>,
) -> Rf2Result<ImportStats> {
    let mut parser = Rf2Parser::<_, T>::from_path(path, config.clone())?;
    let mut batch: Vec<T> = Vec::with_capacity(config.batch_size);
    let mut stats = ImportStats::default();
    let mut first_write_error: Option<StoreError> = None;

    loop {
        match parser.next() {
            Some(Ok(row)) => {
                batch.push(row);
                if batch.len() >= config.batch_size {
                    flush_batch(path, &mut batch, &mut write_row, &mut stats, &mut first_write_error);
                }
            }
            Some(Err(err)) => {
                error!(file = %path.display(), error = %err, "import.batch: skipping malformed RF2 row");
                stats.parse_errors += 1;
            }
            None => break,
        }
    }
    flush_batch(path, &mut batch, &mut write_row, &mut stats, &mut first_write_error);

    if let Some(err) = first_write_error {
        return Err(Rf2Error::from(err));
    }
    Ok(stats)
}

fn flush_batch<T>(
    path: &Path,
    batch: &mut Vec<T>,
    write_row: &mut impl FnMut(&T) -> StoreResult<bool>,
    stats: &mut ImportStats,
    first_error: &mut Option<StoreError>,
) {
    for row in batch.drain(..) {
        match write_row(&row) {
            Ok(true) => stats.written += 1,
            Ok(false) => stats.unchanged += 1,
            Err(err) => {
                warn!(file = %path.display(), error = %err, "import.batch: row write failed, retrying in isolation");
                match write_row(&row) {
                    Ok(true) => stats.written += 1,
                    Ok(false) => stats.unchanged += 1,
                    Err(retry_err) => {
                        error!(file = %path.display(), error = %retry_err, "import.batch: row failed after isolated retry");
                        stats.write_errors += 1;
                        first_error.get_or_insert(retry_err);
                    }
                }
            }
        }
    }
}
