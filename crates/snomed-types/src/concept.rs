//! The RF2 Concept row (`sct2_Concept_*.txt`).

use crate::{DefinitionStatus, SctId};

/// One row of an RF2 Concept file: a bare SCTID plus its status metadata.
/// Everything else about a concept (descriptions, relationships, refset
/// memberships) lives in separate files and is joined on `id` at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rf2Concept {
    /// SCTID of the concept.
    pub id: SctId,
    /// YYYYMMDD, stored as `u32` rather than a calendar date type.
    pub effective_time: u32,
    pub active: bool,
    pub module_id: SctId,
    /// Primitive vs. fully-defined — see [`DefinitionStatus`].
    pub definition_status_id: SctId,
}

impl Rf2Concept {
    /// A primitive concept has only necessary conditions; everything that
    /// isn't [`DefinitionStatus::FULLY_DEFINED_ID`] is treated as primitive.
    pub fn is_primitive(&self) -> bool {
        self.definition_status_id == DefinitionStatus::PRIMITIVE_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concept(definition_status_id: SctId) -> Rf2Concept {
        Rf2Concept { id: 404684003, effective_time: 20020131, active: true, module_id: 900000000000207008, definition_status_id }
    }

    #[test]
    fn primitive_by_status_id() {
        assert!(concept(DefinitionStatus::PRIMITIVE_ID).is_primitive());
        assert!(!concept(DefinitionStatus::FULLY_DEFINED_ID).is_primitive());
    }
}
