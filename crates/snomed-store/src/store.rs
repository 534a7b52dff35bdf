//! The persistent component store: two RocksDB-backed databases (`core`
//! for concepts/descriptions/relationships and their graph indices,
//! `refsets` for reference set members and their membership indices).

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;

use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use snomed_types::{well_known, RefsetItem, Rf2Concept, Rf2ConcreteRelationship, Rf2Description, Rf2Relationship, SctId};
use uuid::Uuid;

use crate::checksum;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::key;

const CF_CONCEPTS: &str = "concepts";
const CF_DESCRIPTIONS: &str = "conceptDescriptions";
const CF_RELATIONSHIPS: &str = "relationships";
const CF_CONCRETE_VALUES: &str = "concreteValues";
const CF_DESCRIPTION_CONCEPT: &str = "descriptionConcept";
const CF_PARENT_RELATIONSHIPS: &str = "conceptParentRelationships";
const CF_CHILD_RELATIONSHIPS: &str = "conceptChildRelationships";

const CORE_COLUMN_FAMILIES: &[&str] = &[
    CF_CONCEPTS,
    CF_DESCRIPTIONS,
    CF_RELATIONSHIPS,
    CF_CONCRETE_VALUES,
    CF_DESCRIPTION_CONCEPT,
    CF_PARENT_RELATIONSHIPS,
    CF_CHILD_RELATIONSHIPS,
];

const CF_COMPONENT_REFSETS: &str = "componentRefsets";
const CF_ASSOCIATIONS: &str = "associations";
const CF_REFSET_ITEMS: &str = "refsetItems";
const CF_REFSET_FIELD_NAMES: &str = "refsetFieldNames";

const REFSETS_COLUMN_FAMILIES: &[&str] = &[
    CF_COMPONENT_REFSETS,
    CF_ASSOCIATIONS,
    CF_REFSET_ITEMS,
    CF_REFSET_FIELD_NAMES,
];

/// Maximum number of attempts made by [`Store::write_with_retry`] before
/// giving up on a single row.
pub const MAX_WRITE_ATTEMPTS: u32 = 10;

fn open_db(path: &Path, column_families: &[&str], config: &StoreConfig) -> StoreResult<DB> {
    let mut opts = Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);
    opts.set_write_buffer_size(config.map_size_bytes as usize / column_families.len().max(1));

    let descriptors = column_families
        .iter()
        .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
        .collect::<Vec<_>>();

    let db = if config.read_only {
        DB::open_cf_descriptors_read_only(&opts, path, descriptors, false)?
    } else {
        DB::open_cf_descriptors(&opts, path, descriptors)?
    };
    Ok(db)
}

/// The persistent, authoritative store for SNOMED CT components and their
/// graph indices.
pub struct Store {
    core: Arc<DB>,
    refsets: Arc<DB>,
    config: StoreConfig,
}

impl Store {
    /// Opens (or creates) the store at the paths named in `config`.
    ///
    /// Verifies each database directory's checksum recorded at the last
    /// clean close, unless `config.skip_check` is set.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        checksum::verify(&config.core_db_path, config.skip_check)?;
        checksum::verify(&config.refsets_db_path, config.skip_check)?;

        let core = open_db(&config.core_db_path, CORE_COLUMN_FAMILIES, &config)?;
        let refsets = open_db(&config.refsets_db_path, REFSETS_COLUMN_FAMILIES, &config)?;

        tracing::info!(
            core = %config.core_db_path.display(),
            refsets = %config.refsets_db_path.display(),
            "store.open"
        );

        Ok(Self {
            core: Arc::new(core),
            refsets: Arc::new(refsets),
            config,
        })
    }

    /// Records a fresh checksum for both databases. Call before the
    /// process exits to mark the store as cleanly closed.
    pub fn close(&self) -> StoreResult<()> {
        checksum::record(&self.config.core_db_path)?;
        checksum::record(&self.config.refsets_db_path)?;
        Ok(())
    }

    fn core_cf(&self, name: &str) -> StoreResult<&rocksdb::ColumnFamily> {
        self.core
            .cf_handle(name)
            .ok_or_else(|| StoreError::UnknownColumnFamily(name.to_string()))
    }

    fn refsets_cf(&self, name: &str) -> StoreResult<&rocksdb::ColumnFamily> {
        self.refsets
            .cf_handle(name)
            .ok_or_else(|| StoreError::UnknownColumnFamily(name.to_string()))
    }

    /// Retries `op` up to [`MAX_WRITE_ATTEMPTS`] times, for the transient
    /// RocksDB errors that can occur under concurrent compaction.
    fn write_with_retry<F>(&self, column_family: &str, mut op: F) -> StoreResult<()>
    where
        F: FnMut() -> Result<(), rocksdb::Error>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(()) => return Ok(()),
                Err(_) if attempt < MAX_WRITE_ATTEMPTS => continue,
                Err(source) => {
                    tracing::warn!(column_family, attempt, %source, "store.write_retry_exhausted");
                    return Err(StoreError::RetryExhausted {
                        column_family: column_family.to_string(),
                        attempts: attempt,
                    });
                }
            }
        }
    }

    fn get_decoded<T: for<'de> serde::Deserialize<'de>>(
        &self,
        cf: &rocksdb::ColumnFamily,
        db: &DB,
        key: &[u8],
    ) -> StoreResult<Option<T>> {
        match db.get_cf(cf, key)? {
            Some(bytes) => {
                let value = bincode::deserialize(&bytes)
                    .map_err(|source| StoreError::Decode { key: key.to_vec(), source })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    // ---------------------------------------------------------------
    // Write contract
    // ---------------------------------------------------------------

    /// Upserts a concept if `concept.effective_time` is strictly newer
    /// than the stored version. Returns whether the write happened.
    pub fn write_concept(&self, concept: &Rf2Concept) -> StoreResult<bool> {
        let cf = self.core_cf(CF_CONCEPTS)?;
        let key = key::concept_key(concept.id);

        if let Some(existing) = self.get_decoded::<Rf2Concept>(cf, &self.core, &key)? {
            if existing.effective_time >= concept.effective_time {
                return Ok(false);
            }
        }

        let value = bincode::serialize(concept).map_err(StoreError::Encode)?;
        self.write_with_retry(CF_CONCEPTS, || self.core.put_cf(cf, &key, &value))?;
        Ok(true)
    }

    /// Upserts a description and its `descriptionConcept` index entry.
    pub fn write_description(&self, description: &Rf2Description) -> StoreResult<bool> {
        let cf = self.core_cf(CF_DESCRIPTIONS)?;
        let key = key::concept_description_key(description.concept_id, description.id);

        if let Some(existing) = self.get_decoded::<Rf2Description>(cf, &self.core, &key)? {
            if existing.effective_time >= description.effective_time {
                return Ok(false);
            }
        }

        let value = bincode::serialize(description).map_err(StoreError::Encode)?;
        let index_cf = self.core_cf(CF_DESCRIPTION_CONCEPT)?;
        let index_key = key::description_concept_key(description.id, description.concept_id);

        self.write_with_retry(CF_DESCRIPTIONS, || {
            let mut batch = WriteBatch::default();
            batch.put_cf(cf, &key, &value);
            batch.put_cf(index_cf, &index_key, Vec::<u8>::new());
            self.core.write(batch)
        })?;
        Ok(true)
    }

    /// Upserts a relationship. Does not touch the parent/child indices;
    /// call [`Store::index_relationships`] after a batch of writes.
    pub fn write_relationship(&self, relationship: &Rf2Relationship) -> StoreResult<bool> {
        let cf = self.core_cf(CF_RELATIONSHIPS)?;
        let key = key::relationship_key(relationship.id);

        if let Some(existing) = self.get_decoded::<Rf2Relationship>(cf, &self.core, &key)? {
            if existing.effective_time >= relationship.effective_time {
                return Ok(false);
            }
        }

        let value = bincode::serialize(relationship).map_err(StoreError::Encode)?;
        self.write_with_retry(CF_RELATIONSHIPS, || self.core.put_cf(cf, &key, &value))?;
        Ok(true)
    }

    /// Upserts a concrete-value relationship.
    pub fn write_concrete_value(&self, value: &Rf2ConcreteRelationship) -> StoreResult<bool> {
        let cf = self.core_cf(CF_CONCRETE_VALUES)?;
        let key = key::concrete_value_key(value.source_id, value.id);

        if let Some(existing) = self.get_decoded::<Rf2ConcreteRelationship>(cf, &self.core, &key)? {
            if existing.effective_time >= value.effective_time {
                return Ok(false);
            }
        }

        let encoded = bincode::serialize(value).map_err(StoreError::Encode)?;
        self.write_with_retry(CF_CONCRETE_VALUES, || self.core.put_cf(cf, &key, &encoded))?;
        Ok(true)
    }

    /// Upserts a reference set member and records its column headings
    /// for `refsetId` (first writer wins).
    pub fn write_refset_item(&self, headings: &[String], item: &RefsetItem) -> StoreResult<bool> {
        let cf = self.refsets_cf(CF_REFSET_ITEMS)?;
        let key = key::refset_item_key(item.header.uuid);

        if let Some(existing) = self.get_decoded::<RefsetItem>(cf, &self.refsets, &key)? {
            if existing.header.effective_time >= item.header.effective_time {
                return Ok(false);
            }
        }

        let value = bincode::serialize(item).map_err(StoreError::Encode)?;
        self.write_with_retry(CF_REFSET_ITEMS, || self.refsets.put_cf(cf, &key, &value))?;

        let field_names_cf = self.refsets_cf(CF_REFSET_FIELD_NAMES)?;
        let field_names_key = key::refset_field_names_key(item.header.refset_id);
        if self.refsets.get_cf(field_names_cf, &field_names_key)?.is_none() {
            let encoded = bincode::serialize(&headings.to_vec()).map_err(StoreError::Encode)?;
            self.refsets.put_cf(field_names_cf, &field_names_key, encoded)?;
        }

        Ok(true)
    }

    /// Drops and rebuilds the parent/child relationship indices from
    /// every active row in `relationships`.
    pub fn index_relationships(&self) -> StoreResult<()> {
        let cf = self.core_cf(CF_RELATIONSHIPS)?;
        let mut batch = WriteBatch::default();
        batch.delete_range_cf(self.core_cf(CF_PARENT_RELATIONSHIPS)?, Vec::<u8>::new(), vec![0xffu8; 28]);
        batch.delete_range_cf(self.core_cf(CF_CHILD_RELATIONSHIPS)?, Vec::<u8>::new(), vec![0xffu8; 28]);

        let parent_cf = self.core_cf(CF_PARENT_RELATIONSHIPS)?;
        let child_cf = self.core_cf(CF_CHILD_RELATIONSHIPS)?;

        for item in self.core.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            let relationship: Rf2Relationship = bincode::deserialize(&value).map_err(StoreError::Encode)?;
            if !relationship.active {
                continue;
            }
            let parent_key = key::parent_relationship_key(
                relationship.source_id,
                relationship.type_id,
                relationship.relationship_group as u32,
                relationship.destination_id,
            );
            let child_key = key::child_relationship_key(
                relationship.destination_id,
                relationship.type_id,
                relationship.relationship_group as u32,
                relationship.source_id,
            );
            batch.put_cf(parent_cf, parent_key, Vec::<u8>::new());
            batch.put_cf(child_cf, child_key, Vec::<u8>::new());
        }

        self.core.write(batch)?;
        tracing::info!("store.index_relationships rebuilt");
        Ok(())
    }

    /// Drops and rebuilds the membership/association indices from every
    /// active row in `refsetItems`.
    pub fn index_refsets(&self) -> StoreResult<()> {
        let cf = self.refsets_cf(CF_REFSET_ITEMS)?;
        let mut batch = WriteBatch::default();
        batch.delete_range_cf(self.refsets_cf(CF_COMPONENT_REFSETS)?, Vec::<u8>::new(), vec![0xffu8; 32]);
        batch.delete_range_cf(self.refsets_cf(CF_ASSOCIATIONS)?, Vec::<u8>::new(), vec![0xffu8; 40]);

        let component_cf = self.refsets_cf(CF_COMPONENT_REFSETS)?;
        let association_cf = self.refsets_cf(CF_ASSOCIATIONS)?;

        for item in self.refsets.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            let refset_item: RefsetItem = bincode::deserialize(&value).map_err(StoreError::Encode)?;
            if !refset_item.header.active {
                continue;
            }

            let component_key = key::component_refset_key(
                refset_item.header.referenced_component_id,
                refset_item.header.refset_id,
                refset_item.header.uuid,
            );
            batch.put_cf(component_cf, component_key, Vec::<u8>::new());

            if let Some(target) = refset_item.association_target() {
                let association_key = key::association_key(
                    target,
                    refset_item.header.refset_id,
                    refset_item.header.referenced_component_id,
                    refset_item.header.uuid,
                );
                batch.put_cf(association_cf, association_key, Vec::<u8>::new());
            }
        }

        self.refsets.write(batch)?;
        tracing::info!("store.index_refsets rebuilt");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Read contract
    // ---------------------------------------------------------------

    /// Looks up a concept by id.
    pub fn concept(&self, concept_id: SctId) -> StoreResult<Option<Rf2Concept>> {
        let cf = self.core_cf(CF_CONCEPTS)?;
        self.get_decoded(cf, &self.core, &key::concept_key(concept_id))
    }

    /// Every concept id in the store, optionally restricted to active
    /// concepts. Backs ECL's unqualified wildcard (`*`), which matches
    /// every concept rather than the descendants of any one root.
    pub fn all_concept_ids(&self, active_only: bool) -> StoreResult<HashSet<SctId>> {
        let cf = self.core_cf(CF_CONCEPTS)?;
        let mut ids = HashSet::new();
        for entry in self.core.iterator_cf(cf, IteratorMode::Start) {
            let (found_key, value) = entry?;
            let concept: Rf2Concept = bincode::deserialize(&value)
                .map_err(|source| StoreError::Decode { key: found_key.to_vec(), source })?;
            if !active_only || concept.active {
                ids.insert(concept.id);
            }
        }
        Ok(ids)
    }

    /// Every description row in the store, optionally restricted to active
    /// descriptions. Used to (re)build the full-text description index
    /// from scratch rather than incrementally.
    pub fn all_descriptions(&self, active_only: bool) -> StoreResult<Vec<Rf2Description>> {
        let cf = self.core_cf(CF_DESCRIPTIONS)?;
        let mut descriptions = Vec::new();
        for entry in self.core.iterator_cf(cf, IteratorMode::Start) {
            let (found_key, value) = entry?;
            let description: Rf2Description = bincode::deserialize(&value)
                .map_err(|source| StoreError::Decode { key: found_key.to_vec(), source })?;
            if !active_only || description.active {
                descriptions.push(description);
            }
        }
        Ok(descriptions)
    }

    /// Looks up a description by its owning concept and its own id.
    pub fn description(&self, concept_id: SctId, description_id: SctId) -> StoreResult<Option<Rf2Description>> {
        let cf = self.core_cf(CF_DESCRIPTIONS)?;
        self.get_decoded(
            cf,
            &self.core,
            &key::concept_description_key(concept_id, description_id),
        )
    }

    /// Looks up a description by id alone, resolving its owning concept
    /// via the `descriptionConcept` index first.
    pub fn description_by_id(&self, description_id: SctId) -> StoreResult<Option<Rf2Description>> {
        let index_cf = self.core_cf(CF_DESCRIPTION_CONCEPT)?;
        let prefix = key::prefix_i64(description_id);
        let mut iter = self.core.iterator_cf(
            index_cf,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );
        let Some(Ok((found_key, _))) = iter.next() else {
            return Ok(None);
        };
        if !found_key.starts_with(&prefix) {
            return Ok(None);
        }
        let concept_id = key::read_i64(&found_key, 8);
        self.description(concept_id, description_id)
    }

    /// All concrete-value relationships sourced from `concept_id`.
    pub fn concrete_values(&self, concept_id: SctId) -> StoreResult<Vec<Rf2ConcreteRelationship>> {
        let cf = self.core_cf(CF_CONCRETE_VALUES)?;
        let prefix = key::prefix_i64(concept_id);
        let upper = key::upper_bound(&prefix);
        let mut results = Vec::new();
        for item in self.core.iterator_cf(cf, IteratorMode::From(&prefix, rocksdb::Direction::Forward)) {
            let (found_key, value) = item?;
            if found_key.as_ref() >= upper.as_slice() {
                break;
            }
            results.push(bincode::deserialize(&value).map_err(StoreError::Encode)?);
        }
        Ok(results)
    }

    /// Looks up a reference set member by its member uuid.
    pub fn refset_item(&self, member: Uuid) -> StoreResult<Option<RefsetItem>> {
        let cf = self.refsets_cf(CF_REFSET_ITEMS)?;
        self.get_decoded(cf, &self.refsets, &key::refset_item_key(member))
    }

    /// The declared column headings for `refset_id`, if any member has
    /// been imported.
    pub fn refset_field_names(&self, refset_id: SctId) -> StoreResult<Option<Vec<String>>> {
        let cf = self.refsets_cf(CF_REFSET_FIELD_NAMES)?;
        self.get_decoded(cf, &self.refsets, &key::refset_field_names_key(refset_id))
    }

    fn scan_parent_or_child<F>(
        &self,
        cf_name: &str,
        prefix: &[u8],
        type_filter: Option<SctId>,
        mut emit: F,
    ) -> StoreResult<()>
    where
        F: FnMut(SctId, SctId, u32, SctId),
    {
        let cf = self.core_cf(cf_name)?;
        let upper = key::upper_bound(prefix);
        for item in self.core.iterator_cf(cf, IteratorMode::From(prefix, rocksdb::Direction::Forward)) {
            let (found_key, _) = item?;
            if found_key.as_ref() >= upper.as_slice() {
                break;
            }
            let a = key::read_i64(&found_key, 0);
            let type_id = key::read_i64(&found_key, 8);
            let group = key::read_u32(&found_key, 16);
            let b = key::read_i64(&found_key, 20);

            if let Some(wanted) = type_filter {
                if type_id != wanted {
                    continue;
                }
            }
            emit(a, type_id, group, b);
        }
        Ok(())
    }

    /// Raw `(source, type, group, destination)` tuples for `concept_id`'s
    /// outgoing relationships, optionally restricted to `type_id`.
    pub fn raw_parent_relationships(
        &self,
        concept_id: SctId,
        type_id: Option<SctId>,
    ) -> StoreResult<Vec<(SctId, SctId, u32, SctId)>> {
        let mut results = Vec::new();
        self.scan_parent_or_child(
            CF_PARENT_RELATIONSHIPS,
            &key::prefix_i64(concept_id),
            type_id,
            |a, t, g, b| results.push((a, t, g, b)),
        )?;
        Ok(results)
    }

    /// Raw `(destination, type, group, source)` tuples for `concept_id`'s
    /// incoming relationships, optionally restricted to `type_id`.
    pub fn raw_child_relationships(
        &self,
        concept_id: SctId,
        type_id: Option<SctId>,
    ) -> StoreResult<Vec<(SctId, SctId, u32, SctId)>> {
        let mut results = Vec::new();
        self.scan_parent_or_child(
            CF_CHILD_RELATIONSHIPS,
            &key::prefix_i64(concept_id),
            type_id,
            |a, t, g, b| results.push((a, t, g, b)),
        )?;
        Ok(results)
    }

    /// Reference set members referencing `component_id`, optionally
    /// restricted to one `refset_id`.
    pub fn component_refset_items(
        &self,
        component_id: SctId,
        refset_id: Option<SctId>,
    ) -> StoreResult<Vec<RefsetItem>> {
        let cf = self.refsets_cf(CF_COMPONENT_REFSETS)?;
        let prefix = match refset_id {
            Some(r) => key::prefix_i64_i64(component_id, r),
            None => key::prefix_i64(component_id),
        };
        let upper = key::upper_bound(&prefix);

        let mut items = Vec::new();
        for entry in self.refsets.iterator_cf(cf, IteratorMode::From(&prefix, rocksdb::Direction::Forward)) {
            let (found_key, _) = entry?;
            if found_key.as_ref() >= upper.as_slice() {
                break;
            }
            let msb = key::read_i64(&found_key, 16);
            let lsb = key::read_i64(&found_key, 24);
            let member = key::uuid_from_halves(msb, lsb);
            if let Some(item) = self.refset_item(member)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    /// The distinct refset ids that `component_id` is a member of.
    pub fn component_refset_ids(&self, component_id: SctId) -> StoreResult<Vec<SctId>> {
        let ids: HashSet<SctId> = self
            .component_refset_items(component_id, None)?
            .into_iter()
            .map(|item| item.header.refset_id)
            .collect();
        Ok(ids.into_iter().collect())
    }

    /// Whether `component_id` is a member of `refset_id`.
    pub fn component_in_refset(&self, component_id: SctId, refset_id: SctId) -> StoreResult<bool> {
        Ok(!self.component_refset_items(component_id, Some(refset_id))?.is_empty())
    }

    /// Association refset members targeting `component_id`.
    pub fn source_associations(
        &self,
        component_id: SctId,
        refset_id: Option<SctId>,
    ) -> StoreResult<Vec<RefsetItem>> {
        let cf = self.refsets_cf(CF_ASSOCIATIONS)?;
        let prefix = match refset_id {
            Some(r) => key::prefix_i64_i64(component_id, r),
            None => key::prefix_i64(component_id),
        };
        let upper = key::upper_bound(&prefix);

        let mut items = Vec::new();
        for entry in self.refsets.iterator_cf(cf, IteratorMode::From(&prefix, rocksdb::Direction::Forward)) {
            let (found_key, _) = entry?;
            if found_key.as_ref() >= upper.as_slice() {
                break;
            }
            let msb = key::read_i64(&found_key, 24);
            let lsb = key::read_i64(&found_key, 32);
            let member = key::uuid_from_halves(msb, lsb);
            if let Some(item) = self.refset_item(member)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    /// The referenced-component ids of every association targeting
    /// `component_id` within `refset_id`.
    pub fn source_association_referenced_components(
        &self,
        component_id: SctId,
        refset_id: SctId,
    ) -> StoreResult<Vec<SctId>> {
        Ok(self
            .source_associations(component_id, Some(refset_id))?
            .into_iter()
            .map(|item| item.header.referenced_component_id)
            .collect())
    }

    /// Every reference set member row in the store, optionally restricted
    /// to active members. Used to (re)build the member index from scratch.
    pub fn all_refset_items(&self, active_only: bool) -> StoreResult<Vec<RefsetItem>> {
        let cf = self.refsets_cf(CF_REFSET_ITEMS)?;
        let mut items = Vec::new();
        for entry in self.refsets.iterator_cf(cf, IteratorMode::Start) {
            let (found_key, value) = entry?;
            let item: RefsetItem = bincode::deserialize(&value)
                .map_err(|source| StoreError::Decode { key: found_key.to_vec(), source })?;
            if !active_only || item.header.active {
                items.push(item);
            }
        }
        Ok(items)
    }

    /// Every refset id that has at least one imported member.
    pub fn installed_reference_sets(&self) -> StoreResult<Vec<SctId>> {
        let cf = self.refsets_cf(CF_REFSET_FIELD_NAMES)?;
        let mut ids = Vec::new();
        for entry in self.refsets.iterator_cf(cf, IteratorMode::Start) {
            let (found_key, _) = entry?;
            ids.push(key::read_i64(&found_key, 0));
        }
        Ok(ids)
    }

    // ---------------------------------------------------------------
    // Graph derivations
    // ---------------------------------------------------------------

    /// Breadth-first closure of `IsA` ancestors of `concept_id` (or of
    /// `type_id` if given), including `concept_id` itself.
    pub fn all_parents(&self, concept_id: SctId, type_id: Option<SctId>) -> StoreResult<HashSet<SctId>> {
        let type_id = type_id.unwrap_or(well_known::IS_A);
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(concept_id);
        queue.push_back(concept_id);

        while let Some(current) = queue.pop_front() {
            for (_, _, _, destination) in self.raw_parent_relationships(current, Some(type_id))? {
                if seen.insert(destination) {
                    queue.push_back(destination);
                }
            }
        }
        Ok(seen)
    }

    /// Breadth-first closure of `IsA` descendants of `concept_id`,
    /// including `concept_id` itself.
    pub fn all_children(&self, concept_id: SctId, type_id: Option<SctId>) -> StoreResult<HashSet<SctId>> {
        let type_id = type_id.unwrap_or(well_known::IS_A);
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(concept_id);
        queue.push_back(concept_id);

        while let Some(current) = queue.pop_front() {
            for (_, _, _, source) in self.raw_child_relationships(current, Some(type_id))? {
                if seen.insert(source) {
                    queue.push_back(source);
                }
            }
        }
        Ok(seen)
    }

    /// The immediate `IsA` destinations of `concept_id`.
    pub fn proximal_parent_ids(&self, concept_id: SctId) -> StoreResult<HashSet<SctId>> {
        Ok(self
            .raw_parent_relationships(concept_id, Some(well_known::IS_A))?
            .into_iter()
            .map(|(_, _, _, destination)| destination)
            .collect())
    }

    /// `{typeId -> set<destinationId>}` over every parent relationship of
    /// `concept_id` (all types, not just `IsA`).
    pub fn parent_relationships(&self, concept_id: SctId) -> StoreResult<HashMap<SctId, HashSet<SctId>>> {
        let mut map: HashMap<SctId, HashSet<SctId>> = HashMap::new();
        for (_, type_id, _, destination) in self.raw_parent_relationships(concept_id, None)? {
            map.entry(type_id).or_default().insert(destination);
        }
        Ok(map)
    }

    /// Same as [`Store::parent_relationships`], but every destination is
    /// replaced by its own `allParents` closure — precomputed so the
    /// description index can encode "has attribute whose value is a
    /// descendant of X" as a single exact-match field.
    pub fn parent_relationships_expanded(
        &self,
        concept_id: SctId,
    ) -> StoreResult<HashMap<SctId, HashSet<SctId>>> {
        let direct = self.parent_relationships(concept_id)?;
        let mut expanded = HashMap::new();
        for (type_id, destinations) in direct {
            let mut closure = HashSet::new();
            for destination in destinations {
                closure.extend(self.all_parents(destination, Some(well_known::IS_A))?);
            }
            expanded.insert(type_id, closure);
        }
        Ok(expanded)
    }

    /// Parent relationships of `concept_id` partitioned by
    /// `relationshipGroup`.
    pub fn grouped_properties(
        &self,
        concept_id: SctId,
        type_id: Option<SctId>,
    ) -> StoreResult<HashMap<u32, Vec<(SctId, SctId)>>> {
        let mut groups: HashMap<u32, Vec<(SctId, SctId)>> = HashMap::new();
        for (_, t, group, destination) in self.raw_parent_relationships(concept_id, type_id)? {
            groups.entry(group).or_default().push((t, destination));
        }
        Ok(groups)
    }

    /// `set` minus the union of `allParents(x) \ {x}` for each `x` in
    /// `set` — the most specific concepts in the set.
    pub fn leaves(&self, set: &HashSet<SctId>) -> StoreResult<HashSet<SctId>> {
        let mut ancestors = HashSet::new();
        for &concept_id in set {
            let mut parents = self.all_parents(concept_id, None)?;
            parents.remove(&concept_id);
            ancestors.extend(parents);
        }
        Ok(set.difference(&ancestors).copied().collect())
    }

    // ---------------------------------------------------------------
    // Preferred descriptions
    // ---------------------------------------------------------------

    /// The description of `concept_id` with type `type_id` marked
    /// Preferred in `refset_id`.
    pub fn preferred_description(
        &self,
        concept_id: SctId,
        type_id: SctId,
        refset_id: SctId,
    ) -> StoreResult<Option<Rf2Description>> {
        let cf = self.core_cf(CF_DESCRIPTIONS)?;
        let prefix = key::prefix_i64(concept_id);
        let upper = key::upper_bound(&prefix);

        for entry in self.core.iterator_cf(cf, IteratorMode::From(&prefix, rocksdb::Direction::Forward)) {
            let (found_key, value) = entry?;
            if found_key.as_ref() >= upper.as_slice() {
                break;
            }
            let description: Rf2Description = bincode::deserialize(&value).map_err(StoreError::Encode)?;
            if description.type_id != type_id || !description.active {
                continue;
            }
            let items = self.component_refset_items(description.id, Some(refset_id))?;
            if items.iter().any(|item| item.is_preferred()) {
                return Ok(Some(description));
            }
        }
        Ok(None)
    }

    /// Probes `refset_ids` in order for a preferred synonym, falling back
    /// to the concept's first active FSN.
    pub fn preferred_synonym(&self, concept_id: SctId, refset_ids: &[SctId]) -> StoreResult<Option<String>> {
        for &refset_id in refset_ids {
            if let Some(description) =
                self.preferred_description(concept_id, well_known::SYNONYM_TYPE, refset_id)?
            {
                return Ok(Some(description.term));
            }
        }

        let cf = self.core_cf(CF_DESCRIPTIONS)?;
        let prefix = key::prefix_i64(concept_id);
        let upper = key::upper_bound(&prefix);
        for entry in self.core.iterator_cf(cf, IteratorMode::From(&prefix, rocksdb::Direction::Forward)) {
            let (found_key, value) = entry?;
            if found_key.as_ref() >= upper.as_slice() {
                break;
            }
            let description: Rf2Description = bincode::deserialize(&value).map_err(StoreError::Encode)?;
            if description.active && description.type_id == well_known::FSN_TYPE {
                return Ok(Some(description.term));
            }
        }
        Ok(None)
    }

    // ---------------------------------------------------------------
    // Compaction
    // ---------------------------------------------------------------

    /// Compacts both databases into fresh directories (`<path>2`
    /// conventionally) and atomically swaps them in for the originals.
    pub fn compact_into(&self, new_core_path: &Path, new_refsets_path: &Path) -> StoreResult<()> {
        self.copy_database(&self.core, CORE_COLUMN_FAMILIES, new_core_path)?;
        self.copy_database(&self.refsets, REFSETS_COLUMN_FAMILIES, new_refsets_path)?;

        swap_in(&self.config.core_db_path, new_core_path)?;
        swap_in(&self.config.refsets_db_path, new_refsets_path)?;

        checksum::record(&self.config.core_db_path)?;
        checksum::record(&self.config.refsets_db_path)?;

        tracing::info!("store.compact_into completed");
        Ok(())
    }

    fn copy_database(&self, source: &DB, column_families: &[&str], dest_path: &Path) -> StoreResult<()> {
        let dest = open_db(dest_path, column_families, &self.config)?;
        for name in column_families {
            let src_cf = source
                .cf_handle(name)
                .ok_or_else(|| StoreError::UnknownColumnFamily(name.to_string()))?;
            let dst_cf = dest
                .cf_handle(name)
                .ok_or_else(|| StoreError::UnknownColumnFamily(name.to_string()))?;

            let mut batch = WriteBatch::default();
            for entry in source.iterator_cf(src_cf, IteratorMode::Start) {
                let (k, v) = entry?;
                batch.put_cf(dst_cf, k, v);
            }
            dest.write(batch)?;
        }
        dest.compact_range(None::<&[u8]>, None::<&[u8]>);
        Ok(())
    }
}

fn swap_in(live_path: &Path, compacted_path: &Path) -> StoreResult<()> {
    let backup = live_path.with_extension("bak");
    if live_path.exists() {
        if backup.exists() {
            std::fs::remove_dir_all(&backup)?;
        }
        std::fs::rename(live_path, &backup)?;
    }
    std::fs::rename(compacted_path, live_path)?;
    if backup.exists() {
        std::fs::remove_dir_all(&backup)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use snomed_types::well_known;

    fn open_temp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            core_db_path: dir.path().join("core.db"),
            refsets_db_path: dir.path().join("refsets.db"),
            ..StoreConfig::default()
        };
        let store = Store::open(config).unwrap();
        (dir, store)
    }

    fn concept(id: SctId, effective_time: u32) -> Rf2Concept {
        Rf2Concept {
            id,
            effective_time,
            active: true,
            module_id: well_known::SNOMED_CT_CORE_MODULE,
            definition_status_id: 900000000000074008,
        }
    }

    #[test]
    fn write_concept_is_idempotent_on_older_effective_time() {
        let (_dir, store) = open_temp();
        assert!(store.write_concept(&concept(1, 20200101)).unwrap());
        assert!(!store.write_concept(&concept(1, 20190101)).unwrap());
        assert!(store.write_concept(&concept(1, 20210101)).unwrap());

        let stored = store.concept(1).unwrap().unwrap();
        assert_eq!(stored.effective_time, 20210101);
    }

    #[test]
    fn index_relationships_populates_parent_and_child() {
        let (_dir, store) = open_temp();
        store.write_concept(&concept(73211009, 20020131)).unwrap();
        store.write_concept(&concept(64572001, 20020131)).unwrap();

        let rel = Rf2Relationship {
            id: 1,
            effective_time: 20020131,
            active: true,
            module_id: well_known::SNOMED_CT_CORE_MODULE,
            source_id: 73211009,
            destination_id: 64572001,
            relationship_group: 0,
            type_id: well_known::IS_A,
            characteristic_type_id: 900000000000011006,
            modifier_id: 900000000000451002,
        };
        store.write_relationship(&rel).unwrap();
        store.index_relationships().unwrap();

        let parents = store.raw_parent_relationships(73211009, None).unwrap();
        assert_eq!(parents, vec![(73211009, well_known::IS_A, 0, 64572001)]);

        let children = store.raw_child_relationships(64572001, None).unwrap();
        assert_eq!(children, vec![(64572001, well_known::IS_A, 0, 73211009)]);

        let parent_set = store.all_parents(73211009, None).unwrap();
        assert!(parent_set.contains(&64572001));
        assert!(parent_set.contains(&73211009));
    }

    #[test]
    fn index_refsets_populates_membership_and_associations() {
        let (_dir, store) = open_temp();
        let header = snomed_types::RefsetItemHeader {
            uuid: Uuid::from_u128(1),
            effective_time: 20200101,
            active: true,
            module_id: well_known::SNOMED_CT_CORE_MODULE,
            refset_id: 723264001,
            referenced_component_id: 404684003,
        };
        let item = RefsetItem {
            header,
            kind: snomed_types::RefsetItemKind::Simple,
        };
        store.write_refset_item(&["id".into(), "effectiveTime".into()], &item).unwrap();
        store.index_refsets().unwrap();

        assert!(store.component_in_refset(404684003, 723264001).unwrap());
        assert_eq!(store.installed_reference_sets().unwrap(), vec![723264001]);
    }

    #[test]
    fn leaves_excludes_ancestors() {
        let (_dir, store) = open_temp();
        for id in [1, 2, 3] {
            store.write_concept(&concept(id, 20200101)).unwrap();
        }
        let rel = Rf2Relationship {
            id: 1,
            effective_time: 20200101,
            active: true,
            module_id: well_known::SNOMED_CT_CORE_MODULE,
            source_id: 2,
            destination_id: 1,
            relationship_group: 0,
            type_id: well_known::IS_A,
            characteristic_type_id: 900000000000011006,
            modifier_id: 900000000000451002,
        };
        store.write_relationship(&rel).unwrap();
        store.index_relationships().unwrap();

        let set: HashSet<SctId> = [1, 2].into_iter().collect();
        let leaves = store.leaves(&set).unwrap();
        assert_eq!(leaves, [2].into_iter().collect());
    }

    #[test]
    fn checksum_round_trips_through_close_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            core_db_path: dir.path().join("core.db"),
            refsets_db_path: dir.path().join("refsets.db"),
            ..StoreConfig::default()
        };
        let store = Store::open(config.clone()).unwrap();
        store.write_concept(&concept(1, 20200101)).unwrap();
        store.close().unwrap();
        drop(store);

        assert!(Store::open(config).is_ok());
    }
}
