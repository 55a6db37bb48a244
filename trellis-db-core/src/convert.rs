//! Decoding and conversion of wire values.
//!
//! Two layers:
//!
//! - [`decode`] turns a [`WireValue`] payload into the [`Value`] of its own
//!   declared type (pure byte decoding).
//! - [`convert`] decodes and then converts to a requested schema type, e.g.
//!   an `int` posting sorted under a `float` attribute, or a `default`
//!   payload parsed into the type the catalog declares.
//!
//! Conversion is deliberately conservative: anything not listed below fails
//! with [`ConversionError::Incompatible`].

use crate::value::{AttrType, Value, WireValue};
use chrono::{DateTime, FixedOffset, NaiveDate};
use thiserror::Error;

/// Error returned when a wire payload cannot become the requested value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// No conversion exists between the two types
    #[error("cannot convert {from} value to type {to}")]
    Incompatible {
        /// Declared type of the payload
        from: AttrType,
        /// Requested type
        to: AttrType,
    },

    /// The payload bytes do not decode as the declared type
    #[error("malformed {ty} payload: {reason}")]
    Malformed {
        /// Declared type of the payload
        ty: AttrType,
        /// What went wrong
        reason: String,
    },
}

fn malformed(ty: AttrType, reason: impl Into<String>) -> ConversionError {
    ConversionError::Malformed {
        ty,
        reason: reason.into(),
    }
}

fn incompatible(from: AttrType, to: AttrType) -> ConversionError {
    ConversionError::Incompatible { from, to }
}

fn utf8(ty: AttrType, bytes: &[u8]) -> Result<String, ConversionError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| malformed(ty, e.to_string()))
}

fn eight(ty: AttrType, bytes: &[u8]) -> Result<[u8; 8], ConversionError> {
    bytes
        .try_into()
        .map_err(|_| malformed(ty, format!("expected 8 bytes, got {}", bytes.len())))
}

fn parse_datetime(ty: AttrType, s: &str) -> Result<DateTime<FixedOffset>, ConversionError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    // Date-only form: midnight UTC.
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().fixed_offset())
        .ok_or_else(|| malformed(ty, format!("unparseable datetime {s:?}")))
}

/// Decode a wire payload into the value of its own declared type.
///
/// The nil sentinel decodes to [`Value::Nil`] of the declared type.
pub fn decode(wire: &WireValue) -> Result<Value, ConversionError> {
    let ty = wire.type_tag;
    if wire.is_nil() {
        return Ok(Value::Nil(ty));
    }
    match ty {
        AttrType::Default => Ok(Value::Default(utf8(ty, &wire.bytes)?)),
        AttrType::Str => Ok(Value::Str(utf8(ty, &wire.bytes)?)),
        AttrType::Password => Ok(Value::Password(utf8(ty, &wire.bytes)?)),
        AttrType::Int => Ok(Value::Int(i64::from_be_bytes(eight(ty, &wire.bytes)?))),
        AttrType::Float => Ok(Value::Float(f64::from_bits(u64::from_be_bytes(eight(
            ty,
            &wire.bytes,
        )?)))),
        AttrType::Bool => match wire.bytes.as_slice() {
            [0x01] => Ok(Value::Bool(false)),
            [0x02] => Ok(Value::Bool(true)),
            other => Err(malformed(ty, format!("bad bool payload {other:?}"))),
        },
        AttrType::DateTime => {
            let s = utf8(ty, &wire.bytes)?;
            Ok(Value::DateTime(parse_datetime(ty, &s)?))
        }
        AttrType::Geo => Ok(Value::Geo(wire.bytes.clone())),
        AttrType::Node => Err(malformed(ty, "object values do not materialize as scalars")),
    }
}

/// Decode a wire payload and convert it to the requested schema type.
pub fn convert(wire: &WireValue, to: AttrType) -> Result<Value, ConversionError> {
    if wire.is_nil() {
        return Ok(Value::Nil(to));
    }
    let from = wire.type_tag;
    let src = decode(wire)?;
    if from == to {
        return Ok(src);
    }
    match (src, to) {
        // Numeric widening / narrowing.
        (Value::Int(v), AttrType::Float) => Ok(Value::Float(v as f64)),
        (Value::Float(v), AttrType::Int) => Ok(Value::Int(v as i64)),
        (Value::Bool(v), AttrType::Int) => Ok(Value::Int(v as i64)),
        (Value::Bool(v), AttrType::Float) => Ok(Value::Float(v as i64 as f64)),
        (Value::Int(v), AttrType::Bool) => Ok(Value::Bool(v != 0)),

        // Anything stringifiable becomes a string or default payload.
        (src, AttrType::Str | AttrType::Default) => {
            let s = match src {
                Value::Bool(v) => v.to_string(),
                Value::Int(v) => v.to_string(),
                Value::Float(v) => v.to_string(),
                Value::DateTime(dt) => dt.to_rfc3339(),
                Value::Default(s) | Value::Str(s) => s,
                _ => return Err(incompatible(from, to)),
            };
            Ok(if to == AttrType::Str {
                Value::Str(s)
            } else {
                Value::Default(s)
            })
        }

        // String-ish payloads parse into the declared scalar.
        (Value::Default(s) | Value::Str(s), AttrType::Int) => s
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| malformed(to, format!("{s:?}: {e}"))),
        (Value::Default(s) | Value::Str(s), AttrType::Float) => s
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| malformed(to, format!("{s:?}: {e}"))),
        (Value::Default(s) | Value::Str(s), AttrType::Bool) => s
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|e| malformed(to, format!("{s:?}: {e}"))),
        (Value::Default(s) | Value::Str(s), AttrType::DateTime) => {
            Ok(Value::DateTime(parse_datetime(to, &s)?))
        }

        _ => Err(incompatible(from, to)),
    }
}
