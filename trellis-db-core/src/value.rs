//! Scalar attribute values and their total order.
//!
//! An attribute value is a typed scalar drawn from the closed set the catalog
//! supports. Values materialize out of postings for sorting and comparison;
//! on the wire they travel as [`WireValue`] (a type tag plus encoded bytes).
//!
//! ## Ordering
//!
//! [`cmp_values`] implements a strict total order:
//!
//! 1. **Numeric class**: `Int` and `Float` are compared mathematically by
//!    value, not by type. `NaN` sorts after every other number.
//! 2. **String class**: `Str`, `Default` and `Password` compare code-point
//!    lexicographically within their own type.
//! 3. **Nil is greater**: `Nil` sorts after every present value, so missing
//!    data lands at the end of an ascending sort.
//! 4. Everything else compares by type discriminant first, then by value
//!    within the type.

use crate::convert::ConversionError;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One-byte marker distinguishing "explicitly nil" value bytes from a posting
/// that does not exist at all. Scalar encodings never produce this payload:
/// the zero byte is reserved for it.
pub const NIL_SENTINEL: [u8; 1] = [0x00];

/// Attribute type, as declared in the catalog.
///
/// `Node` is the object (uid reference) type; it is not a scalar and cannot
/// be sorted on. Everything else is a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrType {
    /// Untyped default: a string payload with relaxed conversion rules
    Default,
    /// 64-bit signed integer
    Int,
    /// 64-bit float
    Float,
    /// Boolean
    Bool,
    /// UTF-8 string
    #[serde(rename = "string")]
    Str,
    /// Timezone-aware instant
    DateTime,
    /// Opaque encoded geometry
    Geo,
    /// Write-only credential string
    Password,
    /// Object type: a reference to another node
    Node,
}

impl AttrType {
    /// Whether values of this type can materialize for comparison.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, AttrType::Node)
    }

    /// Catalog-facing name of the type.
    pub fn name(&self) -> &'static str {
        match self {
            AttrType::Default => "default",
            AttrType::Int => "int",
            AttrType::Float => "float",
            AttrType::Bool => "bool",
            AttrType::Str => "string",
            AttrType::DateTime => "datetime",
            AttrType::Geo => "geo",
            AttrType::Password => "password",
            AttrType::Node => "uid",
        }
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A materialized scalar value.
///
/// `Nil` stands for an explicitly-missing value that still carries its schema
/// type; it sorts after every present value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// Timezone-aware instant
    DateTime(DateTime<FixedOffset>),
    /// Untyped default payload
    Default(String),
    /// UTF-8 string
    Str(String),
    /// Write-only credential string
    Password(String),
    /// Opaque encoded geometry; ordered by encoded bytes
    Geo(Vec<u8>),
    /// Missing value of a known type; greater than every present value
    Nil(AttrType),
}

impl Value {
    /// The catalog type this value belongs to.
    pub fn attr_type(&self) -> AttrType {
        match self {
            Value::Bool(_) => AttrType::Bool,
            Value::Int(_) => AttrType::Int,
            Value::Float(_) => AttrType::Float,
            Value::DateTime(_) => AttrType::DateTime,
            Value::Default(_) => AttrType::Default,
            Value::Str(_) => AttrType::Str,
            Value::Password(_) => AttrType::Password,
            Value::Geo(_) => AttrType::Geo,
            Value::Nil(t) => *t,
        }
    }

    /// Whether this is the nil (missing) value.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil(_))
    }

    /// Type discriminant for cross-type ordering. Lower sorts earlier.
    ///
    /// `Int` and `Float` share the numeric class and never fall back to the
    /// discriminant; `Nil` is handled before discriminants apply.
    fn type_discriminant(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::Int(_) => 1,
            Value::Float(_) => 2,
            Value::DateTime(_) => 3,
            Value::Default(_) => 4,
            Value::Str(_) => 5,
            Value::Password(_) => 6,
            Value::Geo(_) => 7,
            Value::Nil(_) => u8::MAX,
        }
    }

    /// Encode to the wire form.
    pub fn to_wire(&self) -> WireValue {
        let type_tag = self.attr_type();
        let bytes = match self {
            // 0x00 is the nil sentinel, so booleans start at 0x01.
            Value::Bool(false) => vec![0x01],
            Value::Bool(true) => vec![0x02],
            Value::Int(v) => v.to_be_bytes().to_vec(),
            Value::Float(v) => v.to_bits().to_be_bytes().to_vec(),
            Value::DateTime(dt) => dt
                .to_rfc3339_opts(SecondsFormat::AutoSi, true)
                .into_bytes(),
            Value::Default(s) | Value::Str(s) | Value::Password(s) => s.clone().into_bytes(),
            Value::Geo(b) => b.clone(),
            Value::Nil(_) => NIL_SENTINEL.to_vec(),
        };
        WireValue { type_tag, bytes }
    }
}

/// Compare two floats with NaN sorting last.
fn cmp_f64(a: f64, b: f64) -> Ordering {
    match a.partial_cmp(&b) {
        Some(ord) => ord,
        None => match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            // partial_cmp only fails on NaN
            (false, false) => Ordering::Equal,
        },
    }
}

/// Total order over scalar values. See the module docs for the rules.
pub fn cmp_values(a: &Value, b: &Value) -> Ordering {
    use Value::*;
    match (a, b) {
        (Nil(_), Nil(_)) => Ordering::Equal,
        (Nil(_), _) => Ordering::Greater,
        (_, Nil(_)) => Ordering::Less,

        // Numeric class: compare by mathematical value.
        (Int(x), Int(y)) => x.cmp(y),
        (Float(x), Float(y)) => cmp_f64(*x, *y),
        (Int(x), Float(y)) => cmp_f64(*x as f64, *y),
        (Float(x), Int(y)) => cmp_f64(*x, *y as f64),

        (Bool(x), Bool(y)) => x.cmp(y),
        (DateTime(x), DateTime(y)) => x.cmp(y),
        (Default(x), Default(y)) => x.cmp(y),
        (Str(x), Str(y)) => x.cmp(y),
        (Password(x), Password(y)) => x.cmp(y),
        (Geo(x), Geo(y)) => x.cmp(y),

        _ => a.type_discriminant().cmp(&b.type_discriminant()),
    }
}

/// Wire form of a value: a type tag plus the encoded payload.
///
/// This is what posting lists hand back and what value-for-list replies
/// carry between shards. A payload equal to [`NIL_SENTINEL`] means
/// "explicitly nil" as opposed to "no posting".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireValue {
    /// Declared type of the payload
    pub type_tag: AttrType,
    /// Encoded payload bytes
    pub bytes: Vec<u8>,
}

impl WireValue {
    /// The nil value of the given type.
    pub fn nil(type_tag: AttrType) -> Self {
        WireValue {
            type_tag,
            bytes: NIL_SENTINEL.to_vec(),
        }
    }

    /// Whether the payload is the nil sentinel.
    pub fn is_nil(&self) -> bool {
        self.bytes == NIL_SENTINEL
    }

    /// Decode the payload into a materialized value of its own declared type.
    pub fn decode(&self) -> std::result::Result<Value, ConversionError> {
        crate::convert::decode(self)
    }
}
