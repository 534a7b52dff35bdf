//! The RF2 Relationship row (`sct2_Relationship_*.txt`): a typed edge
//! between two concepts, optionally grouped with sibling relationships that
//! must hold together (`relationship_group`).

use crate::SctId;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rf2Relationship {
    pub id: SctId,
    pub effective_time: u32,
    pub active: bool,
    pub module_id: SctId,
    pub source_id: SctId,
    pub destination_id: SctId,
    /// `0` means ungrouped; relationships sharing a nonzero group on the
    /// same source must be read together (e.g. a finding site paired with
    /// the morphology it applies to).
    pub relationship_group: u16,
    pub type_id: SctId,
    pub characteristic_type_id: SctId,
    pub modifier_id: SctId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relationship(type_id: SctId, group: u16) -> Rf2Relationship {
        Rf2Relationship {
            id: 100000028,
            effective_time: 20020131,
            active: true,
            module_id: 900000000000207008,
            source_id: 73211009,
            destination_id: 362969004,
            relationship_group: group,
            type_id,
            characteristic_type_id: 900000000000011006,
            modifier_id: 900000000000451002,
        }
    }

    #[test]
    fn group_zero_is_ungrouped() {
        let rel = relationship(116680003, 0);
        assert_eq!(rel.relationship_group, 0);
        assert_eq!(rel.source_id, 73211009);
        assert_eq!(rel.destination_id, 362969004);
    }

    #[test]
    fn nonzero_group_survives_round_trip() {
        let rel = relationship(363698007, 1);
        assert_eq!(rel.relationship_group, 1);
    }
}
