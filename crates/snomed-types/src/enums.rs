//! Typed views over the small, fixed sets of SCTIDs that show up as coded
//! values on concepts/descriptions/relationships (definition status,
//! description type, case significance, characteristic type, modifier).
//! Each wraps a handful of well-known SCTIDs behind `from_id`/`to_id` so
//! callers who want to match on them don't have to spell out the raw ids.

use crate::SctId;

macro_rules! sctid_enum {
    ($name:ident { $($variant:ident = $id:expr),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn from_id(id: SctId) -> Option<Self> {
                match id {
                    $($id => Some(Self::$variant)),+,
                    _ => None,
                }
            }

            pub fn to_id(self) -> SctId {
                match self {
                    $(Self::$variant => $id),+
                }
            }
        }
    };
}

sctid_enum!(DefinitionStatus {
    Primitive = 900000000000074008,
    FullyDefined = 900000000000073002,
});

impl DefinitionStatus {
    pub const PRIMITIVE_ID: SctId = 900000000000074008;
    pub const FULLY_DEFINED_ID: SctId = 900000000000073002;
}

sctid_enum!(DescriptionType {
    Fsn = 900000000000003001,
    Synonym = 900000000000013009,
    Definition = 900000000000550004,
});

impl DescriptionType {
    pub const FSN_ID: SctId = 900000000000003001;
    pub const SYNONYM_ID: SctId = 900000000000013009;
    pub const DEFINITION_ID: SctId = 900000000000550004;
}

sctid_enum!(CaseSignificance {
    CaseInsensitive = 900000000000448009,
    EntireTermCaseSensitive = 900000000000017005,
    InitialCharacterCaseSensitive = 900000000000020002,
});

impl CaseSignificance {
    pub const CASE_INSENSITIVE_ID: SctId = 900000000000448009;
    pub const ENTIRE_TERM_CASE_SENSITIVE_ID: SctId = 900000000000017005;
    pub const INITIAL_CHAR_CASE_SENSITIVE_ID: SctId = 900000000000020002;
}

sctid_enum!(CharacteristicType {
    Stated = 900000000000010007,
    Inferred = 900000000000011006,
    Additional = 900000000000227009,
});

impl CharacteristicType {
    pub const STATED_ID: SctId = 900000000000010007;
    pub const INFERRED_ID: SctId = 900000000000011006;
    pub const ADDITIONAL_ID: SctId = 900000000000227009;
}

sctid_enum!(ModifierType {
    Existential = 900000000000451002,
    Universal = 900000000000450001,
});

impl ModifierType {
    pub const EXISTENTIAL_ID: SctId = 900000000000451002;
    pub const UNIVERSAL_ID: SctId = 900000000000450001;
}
