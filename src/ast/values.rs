use chrono::{DateTime, FixedOffset, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Primitive kinds of the conceptual type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Binary,
    Boolean,
    Byte,
    DateTime,
    DateTimeOffset,
    Decimal,
    Double,
    Guid,
    Int16,
    Int32,
    Int64,
    SByte,
    Single,
    String,
    Time,
    /// Spatial and hierarchy kinds have no backend mapping.
    Geography,
    Geometry,
    HierarchyId,
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A constant value carried by the relational tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Binary(Vec<u8>),
    Boolean(bool),
    Byte(u8),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Decimal(Decimal),
    Double(f64),
    Guid(Uuid),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    SByte(i8),
    Single(f32),
    String(String),
    /// Time span in microseconds.
    Time(i64),
}

impl Value {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Value::Binary(_) => PrimitiveKind::Binary,
            Value::Boolean(_) => PrimitiveKind::Boolean,
            Value::Byte(_) => PrimitiveKind::Byte,
            Value::DateTime(_) => PrimitiveKind::DateTime,
            Value::DateTimeOffset(_) => PrimitiveKind::DateTimeOffset,
            Value::Decimal(_) => PrimitiveKind::Decimal,
            Value::Double(_) => PrimitiveKind::Double,
            Value::Guid(_) => PrimitiveKind::Guid,
            Value::Int16(_) => PrimitiveKind::Int16,
            Value::Int32(_) => PrimitiveKind::Int32,
            Value::Int64(_) => PrimitiveKind::Int64,
            Value::SByte(_) => PrimitiveKind::SByte,
            Value::Single(_) => PrimitiveKind::Single,
            Value::String(_) => PrimitiveKind::String,
            Value::Time(_) => PrimitiveKind::Time,
        }
    }

    /// Integral value, if this constant is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(n) => Some(i64::from(*n)),
            Value::SByte(n) => Some(i64::from(*n)),
            Value::Int16(n) => Some(i64::from(*n)),
            Value::Int32(n) => Some(i64::from(*n)),
            Value::Int64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Guid(u)
    }
}

/// Declared type of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamType {
    Scalar(PrimitiveKind),
    /// Array-valued parameter unnested into rows.
    Vector(PrimitiveKind),
}

impl ParamType {
    pub fn element(&self) -> PrimitiveKind {
        match self {
            ParamType::Scalar(kind) | ParamType::Vector(kind) => *kind,
        }
    }
}
