// Closed value type exchanged with the pack/unpack engine.
use std::fmt;

use serde::Serialize;

use crate::core::format::Tag;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int64(i64),
    Uint64(u64),
    Text(String),
    Bytes(Vec<u8>),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueKind {
    Int64,
    Uint64,
    Text,
    Bytes,
}

impl ValueKind {
    /// The representation a field tag reads and writes. Padding has none.
    pub fn for_tag(tag: Tag) -> Option<Self> {
        match tag {
            Tag::Pad => None,
            Tag::FixedStr | Tag::CStr => Some(ValueKind::Text),
            Tag::Raw | Tag::SizedRaw => Some(ValueKind::Bytes),
            Tag::Int8 | Tag::Int(_) => Some(ValueKind::Int64),
            Tag::Uint8 | Tag::Bits | Tag::Uint(_) | Tag::RecordId => Some(ValueKind::Uint64),
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            ValueKind::Int64 => "a signed integer",
            ValueKind::Uint64 => "an unsigned integer",
            ValueKind::Text => "a string",
            ValueKind::Bytes => "a byte string",
        }
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int64(_) => ValueKind::Int64,
            Value::Uint64(_) => ValueKind::Uint64,
            Value::Text(_) => ValueKind::Text,
            Value::Bytes(_) => ValueKind::Bytes,
        }
    }

    /// Placeholder slot of the given kind, for `unpack_into`.
    pub fn empty(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Int64 => Value::Int64(0),
            ValueKind::Uint64 => Value::Uint64(0),
            ValueKind::Text => Value::Text(String::new()),
            ValueKind::Bytes => Value::Bytes(Vec::new()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int64(value) => write!(f, "{value}"),
            Value::Uint64(value) => write!(f, "{value}"),
            Value::Text(value) => write!(f, "{value:?}"),
            Value::Bytes(value) => write!(f, "{value:02x?}"),
        }
    }
}

macro_rules! impl_from_int {
    ($variant:ident, $target:ty, $($source:ty),+) => {
        $(
            impl From<$source> for Value {
                fn from(value: $source) -> Self {
                    Value::$variant(<$target>::from(value))
                }
            }
        )+
    };
}

impl_from_int!(Int64, i64, i8, i16, i32, i64);
impl_from_int!(Uint64, u64, u8, u16, u32, u64);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Value {
    fn from(value: [u8; N]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}
