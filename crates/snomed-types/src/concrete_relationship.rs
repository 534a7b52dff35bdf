//! The RF2 concrete-value relationship row
//! (`sct2_RelationshipConcreteValues_*.txt`): ties a concept to a literal
//! string/integer/decimal instead of another concept — medication
//! strengths, counts, units, and similar concrete domain attributes.

use crate::SctId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A literal value carried by a concrete relationship. RF2 encodes these as
/// `"text"`, `#123`, or `#1.5` in the relationship's `value` column.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConcreteValue {
    String(String),
    Integer(i64),
    Decimal(f64),
}

impl ConcreteValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Parses the RF2 wire form: `"quoted"` strings, `#123` integers, `#1.5`
    /// decimals (a `#`-prefixed number with a `.` is read as decimal).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(inner) = s.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
            return Some(Self::String(inner.to_string()));
        }

        let num_str = s.strip_prefix('#')?;
        if num_str.contains('.') {
            num_str.parse::<f64>().ok().map(Self::Decimal)
        } else {
            num_str.parse::<i64>().ok().map(Self::Integer)
        }
    }
}

/// A concrete-value relationship: a concept paired with a literal value
/// rather than another concept.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rf2ConcreteRelationship {
    pub id: SctId,
    pub effective_time: u32,
    pub active: bool,
    pub module_id: SctId,
    pub source_id: SctId,
    pub value: ConcreteValue,
    pub relationship_group: u16,
    pub type_id: SctId,
    pub characteristic_type_id: SctId,
    pub modifier_id: SctId,
}

impl Rf2ConcreteRelationship {
    pub const INFERRED_CHARACTERISTIC_TYPE: SctId = 900000000000011006;
    pub const STATED_CHARACTERISTIC_TYPE: SctId = 900000000000010007;

    pub fn is_inferred(&self) -> bool {
        self.characteristic_type_id == Self::INFERRED_CHARACTERISTIC_TYPE
    }

    pub fn is_stated(&self) -> bool {
        self.characteristic_type_id == Self::STATED_CHARACTERISTIC_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_string() {
        assert_eq!(ConcreteValue::parse("\"tablet\""), Some(ConcreteValue::String("tablet".into())));
    }

    #[test]
    fn parses_hash_prefixed_integer() {
        assert_eq!(ConcreteValue::parse("#500"), Some(ConcreteValue::Integer(500)));
    }

    #[test]
    fn parses_hash_prefixed_decimal() {
        assert_eq!(ConcreteValue::parse("#0.5"), Some(ConcreteValue::Decimal(0.5)));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(ConcreteValue::parse(""), None);
        assert_eq!(ConcreteValue::parse("500"), None);
    }

    #[test]
    fn characteristic_type_distinguishes_inferred_from_stated() {
        let base = Rf2ConcreteRelationship {
            id: 1,
            effective_time: 20230101,
            active: true,
            module_id: 900000000000207008,
            source_id: 322236009,
            value: ConcreteValue::Integer(500),
            relationship_group: 1,
            type_id: 1142135004,
            characteristic_type_id: Rf2ConcreteRelationship::INFERRED_CHARACTERISTIC_TYPE,
            modifier_id: 900000000000451002,
        };
        assert!(base.is_inferred());
        assert!(!base.is_stated());

        let stated = Rf2ConcreteRelationship {
            characteristic_type_id: Rf2ConcreteRelationship::STATED_CHARACTERISTIC_TYPE,
            ..base
        };
        assert!(stated.is_stated());
    }
}
