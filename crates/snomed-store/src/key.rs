//! Fixed-width big-endian key encoding.
//!
//! Every logical database in the store uses keys built from tuples of
//! signed 64-bit integers packed big-endian, so that a byte-wise range
//! scan `[low, high]` over any key prefix is exactly a numeric range scan
//! over the trailing fields. `rocksdb`'s default bytewise comparator is
//! therefore sufficient; no custom comparator is registered anywhere in
//! this crate.

use byteorder::{BigEndian, ByteOrder};
use snomed_types::SctId;
use uuid::Uuid;

fn push_i64(buf: &mut Vec<u8>, value: i64) {
    let mut bytes = [0u8; 8];
    BigEndian::write_i64(&mut bytes, value);
    buf.extend_from_slice(&bytes);
}

fn push_u32(buf: &mut Vec<u8>, value: u32) {
    let mut bytes = [0u8; 4];
    BigEndian::write_u32(&mut bytes, value);
    buf.extend_from_slice(&bytes);
}

fn push_uuid(buf: &mut Vec<u8>, value: Uuid) {
    let (msb, lsb) = uuid_halves(value);
    push_i64(buf, msb);
    push_i64(buf, lsb);
}

/// Splits a UUID into its big-endian most- and least-significant 64-bit
/// halves, matching the `uuidMsb ∥ uuidLsb` key fields.
pub fn uuid_halves(value: Uuid) -> (i64, i64) {
    let bytes = value.as_bytes();
    (
        BigEndian::read_i64(&bytes[0..8]),
        BigEndian::read_i64(&bytes[8..16]),
    )
}

/// Reassembles a UUID from its big-endian msb/lsb halves.
pub fn uuid_from_halves(msb: i64, lsb: i64) -> Uuid {
    let mut bytes = [0u8; 16];
    BigEndian::write_i64(&mut bytes[0..8], msb);
    BigEndian::write_i64(&mut bytes[8..16], lsb);
    Uuid::from_bytes(bytes)
}

/// `conceptId` key for the `concepts` database.
pub fn concept_key(concept_id: SctId) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8);
    push_i64(&mut buf, concept_id);
    buf
}

/// `conceptId ∥ descriptionId` key for `conceptDescriptions`.
pub fn concept_description_key(concept_id: SctId, description_id: SctId) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16);
    push_i64(&mut buf, concept_id);
    push_i64(&mut buf, description_id);
    buf
}

/// `relationshipId` key for `relationships`.
pub fn relationship_key(relationship_id: SctId) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8);
    push_i64(&mut buf, relationship_id);
    buf
}

/// `sourceConceptId ∥ relationshipId` key for `concreteValues`.
pub fn concrete_value_key(source_concept_id: SctId, relationship_id: SctId) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16);
    push_i64(&mut buf, source_concept_id);
    push_i64(&mut buf, relationship_id);
    buf
}

/// `descriptionId ∥ conceptId` key for the `descriptionConcept` index.
pub fn description_concept_key(description_id: SctId, concept_id: SctId) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16);
    push_i64(&mut buf, description_id);
    push_i64(&mut buf, concept_id);
    buf
}

/// `sourceId ∥ typeId ∥ group ∥ destinationId` key for
/// `conceptParentRelationships`.
pub fn parent_relationship_key(
    source_id: SctId,
    type_id: SctId,
    group: u32,
    destination_id: SctId,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(28);
    push_i64(&mut buf, source_id);
    push_i64(&mut buf, type_id);
    push_u32(&mut buf, group);
    push_i64(&mut buf, destination_id);
    buf
}

/// `destinationId ∥ typeId ∥ group ∥ sourceId` key for
/// `conceptChildRelationships`.
pub fn child_relationship_key(
    destination_id: SctId,
    type_id: SctId,
    group: u32,
    source_id: SctId,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(28);
    push_i64(&mut buf, destination_id);
    push_i64(&mut buf, type_id);
    push_u32(&mut buf, group);
    push_i64(&mut buf, source_id);
    buf
}

/// `referencedComponentId ∥ refsetId ∥ uuidMsb ∥ uuidLsb` key for
/// `componentRefsets`.
pub fn component_refset_key(referenced_component_id: SctId, refset_id: SctId, member: Uuid) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32);
    push_i64(&mut buf, referenced_component_id);
    push_i64(&mut buf, refset_id);
    push_uuid(&mut buf, member);
    buf
}

/// `targetComponentId ∥ refsetId ∥ referencedComponentId ∥ uuidMsb ∥
/// uuidLsb` key for `associations`.
pub fn association_key(
    target_component_id: SctId,
    refset_id: SctId,
    referenced_component_id: SctId,
    member: Uuid,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(40);
    push_i64(&mut buf, target_component_id);
    push_i64(&mut buf, refset_id);
    push_i64(&mut buf, referenced_component_id);
    push_uuid(&mut buf, member);
    buf
}

/// `uuidMsb ∥ uuidLsb` key for `refsetItems`.
pub fn refset_item_key(member: Uuid) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16);
    push_uuid(&mut buf, member);
    buf
}

/// `refsetId` key for `refsetFieldNames`.
pub fn refset_field_names_key(refset_id: SctId) -> Vec<u8> {
    concept_key(refset_id)
}

/// Encodes an `i64` prefix alone, for range-scanning keys that start with
/// it (e.g. all parent relationships of a concept, regardless of type).
pub fn prefix_i64(value: SctId) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8);
    push_i64(&mut buf, value);
    buf
}

/// Encodes a two-`i64` prefix, for range-scanning by `(id, typeId)`.
pub fn prefix_i64_i64(a: SctId, b: SctId) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16);
    push_i64(&mut buf, a);
    push_i64(&mut buf, b);
    buf
}

/// The immediate successor of a byte string, used as the exclusive upper
/// bound of a prefix range scan (`[prefix, upper_bound(prefix))`).
pub fn upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut bound = prefix.to_vec();
    for i in (0..bound.len()).rev() {
        if bound[i] != 0xff {
            bound[i] += 1;
            bound.truncate(i + 1);
            return bound;
        }
    }
    // All bytes were 0xff: no finite successor, scan must run to the end.
    vec![0xff; bound.len() + 1]
}

/// Decodes a big-endian `i64` at `offset` within `bytes`.
pub fn read_i64(bytes: &[u8], offset: usize) -> i64 {
    BigEndian::read_i64(&bytes[offset..offset + 8])
}

/// Decodes a big-endian `u32` at `offset` within `bytes`.
pub fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    BigEndian::read_u32(&bytes[offset..offset + 4])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concept_key_round_trips_ordering() {
        let a = concept_key(1);
        let b = concept_key(2);
        assert!(a < b);
    }

    #[test]
    fn parent_relationship_key_orders_by_field() {
        let a = parent_relationship_key(1, 1, 0, 1);
        let b = parent_relationship_key(1, 1, 0, 2);
        let c = parent_relationship_key(1, 2, 0, 1);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn upper_bound_increments_last_non_ff_byte() {
        let prefix = prefix_i64(1);
        let bound = upper_bound(&prefix);
        assert!(bound > prefix);

        let mut probe = prefix.clone();
        probe.push(0);
        assert!(probe < bound);
    }

    #[test]
    fn uuid_halves_round_trip() {
        let id = Uuid::from_u128(0x1234_5678_9abc_def0_1122_3344_5566_7788);
        let (msb, lsb) = uuid_halves(id);
        assert_eq!(uuid_from_halves(msb, lsb), id);
    }

    #[test]
    fn prefix_scan_contains_only_matching_keys() {
        let prefix = prefix_i64(42);
        let bound = upper_bound(&prefix);
        let matching = parent_relationship_key(42, 1, 0, 100);
        let non_matching = parent_relationship_key(43, 1, 0, 100);
        assert!(matching.as_slice() >= prefix.as_slice() && matching.as_slice() < bound.as_slice());
        assert!(!(non_matching.as_slice() >= prefix.as_slice() && non_matching.as_slice() < bound.as_slice()));
    }
}
