//! Positional slot values.
//!
//! Build consumes one [`Value`] per leaf or `any` command, in grammar
//! order. Read produces one per leaf, `any`, `choice` selector and
//! `optional` flag, in grammar order, using [`Value::Absent`] for slots of
//! branches that were not taken.

use crate::ber::{BitString, Oid, Time};
use crate::tree::NodeId;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// One grammar slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// BOOLEAN
    Boolean(bool),
    /// INTEGER or ENUMERATED
    Integer(BigInt),
    /// INTEGER or ENUMERATED that fits an `i64`
    Short(i64),
    /// BIT STRING
    BitString(BitString),
    /// OCTET STRING or a character string type
    OctetString(Vec<u8>),
    /// NULL
    Null,
    /// OBJECT IDENTIFIER
    Oid(Oid),
    /// UTCTime or GeneralizedTime
    Time(Time),
    /// A whole element, for `any`
    Node(NodeId),
    /// Index of the `choice` alternative that matched
    Selector(usize),
    /// Whether an `optional` block was present
    Found(bool),
    /// Slot of a branch that was not taken
    Absent,
}

impl Value {
    /// Short name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Short(_) => "short integer",
            Value::BitString(_) => "bit string",
            Value::OctetString(_) => "octet string",
            Value::Null => "null",
            Value::Oid(_) => "object identifier",
            Value::Time(_) => "time",
            Value::Node(_) => "node",
            Value::Selector(_) => "selector",
            Value::Found(_) => "found flag",
            Value::Absent => "absent",
        }
    }

    /// True for slots of branches that were not taken
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// Boolean payload
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer payload as a big integer, from either integer variant
    pub fn as_integer(&self) -> Option<BigInt> {
        match self {
            Value::Integer(i) => Some(i.clone()),
            Value::Short(i) => Some(BigInt::from(*i)),
            _ => None,
        }
    }

    /// Integer payload as an `i64`, if it fits
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => i.to_i64(),
            Value::Short(i) => Some(*i),
            _ => None,
        }
    }

    /// Octet string payload
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Octet string payload as UTF-8 text
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Bit string payload
    pub fn as_bit_string(&self) -> Option<&BitString> {
        match self {
            Value::BitString(bits) => Some(bits),
            _ => None,
        }
    }

    /// Object identifier payload
    pub fn as_oid(&self) -> Option<&Oid> {
        match self {
            Value::Oid(oid) => Some(oid),
            _ => None,
        }
    }

    /// Time payload
    pub fn as_time(&self) -> Option<&Time> {
        match self {
            Value::Time(time) => Some(time),
            _ => None,
        }
    }

    /// Node payload of an `any` slot
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    /// Alternative index of a `choice` slot
    pub fn as_selector(&self) -> Option<usize> {
        match self {
            Value::Selector(index) => Some(*index),
            _ => None,
        }
    }

    /// Presence flag of an `optional` slot
    pub fn as_found(&self) -> Option<bool> {
        match self {
            Value::Found(found) => Some(*found),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Short(value)
    }
}

impl From<BigInt> for Value {
    fn from(value: BigInt) -> Self {
        Value::Integer(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::OctetString(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::OctetString(value.to_vec())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::OctetString(value.as_bytes().to_vec())
    }
}

impl From<BitString> for Value {
    fn from(value: BitString) -> Self {
        Value::BitString(value)
    }
}

impl From<Oid> for Value {
    fn from(value: Oid) -> Self {
        Value::Oid(value)
    }
}

impl From<Time> for Value {
    fn from(value: Time) -> Self {
        Value::Time(value)
    }
}

impl From<NodeId> for Value {
    fn from(value: NodeId) -> Self {
        Value::Node(value)
    }
}
