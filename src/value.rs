//! Native field values and wire type coercion.
//!
//! The wire speaks JSON; the schema says what a field's JSON actually
//! means. Coercion turns a raw wire value into a native [`FieldValue`]
//! (ISO date/datetime strings become chrono values) and back for the
//! write path.

use crate::error::{Error, Result};
use crate::schema::WireType;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::fmt;

/// A field value after wire -> native coercion.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    List(Vec<Value>),
    Json(Value),
}

impl FieldValue {
    /// String content, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content, if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Whether this is the null value.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            FieldValue::List(items) => write!(f, "{}", Value::Array(items.clone())),
            FieldValue::Json(v) => write!(f, "{}", v),
        }
    }
}

/// Coerce a raw wire value into a native value according to its wire type.
///
/// Unknown wire types pass through as raw JSON; a `null` coerces to
/// `FieldValue::Null` for every type.
///
/// # Errors
///
/// Returns `Error::DeserializationError` when a date/datetime string does
/// not parse, or when the JSON shape contradicts the declared type.
pub fn coerce(wire_type: WireType, raw: &Value) -> Result<FieldValue> {
    if raw.is_null() {
        return Ok(FieldValue::Null);
    }

    match wire_type {
        WireType::String => match raw.as_str() {
            Some(s) => Ok(FieldValue::String(s.to_string())),
            None => Err(type_mismatch("string", raw)),
        },
        WireType::Integer => match raw.as_i64() {
            Some(i) => Ok(FieldValue::Int(i)),
            None => Err(type_mismatch("integer", raw)),
        },
        WireType::Float => match raw.as_f64() {
            Some(x) => Ok(FieldValue::Float(x)),
            None => Err(type_mismatch("float", raw)),
        },
        WireType::Boolean => match raw.as_bool() {
            Some(b) => Ok(FieldValue::Bool(b)),
            None => Err(type_mismatch("boolean", raw)),
        },
        WireType::Date => {
            let s = raw.as_str().ok_or_else(|| type_mismatch("date", raw))?;
            parse_date(s).map(FieldValue::Date)
        }
        WireType::Datetime => {
            let s = raw.as_str().ok_or_else(|| type_mismatch("datetime", raw))?;
            parse_datetime(s).map(FieldValue::DateTime)
        }
        WireType::List => match raw.as_array() {
            Some(items) => Ok(FieldValue::List(items.clone())),
            None => Err(type_mismatch("list", raw)),
        },
        WireType::Json | WireType::Unknown => Ok(FieldValue::Json(raw.clone())),
    }
}

/// Serialize a native value back into its wire representation.
pub fn to_wire(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Int(i) => Value::from(*i),
        FieldValue::Float(x) => Value::from(*x),
        FieldValue::String(s) => Value::String(s.clone()),
        FieldValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
        FieldValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
        FieldValue::List(items) => Value::Array(items.clone()),
        FieldValue::Json(v) => v.clone(),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| Error::DeserializationError(format!("Bad date value \"{}\": {}", s, e)))
}

fn parse_datetime(s: &str) -> Result<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }

    // Offset-less datetimes come back from some serializers; treat them
    // as UTC.
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|e| Error::DeserializationError(format!("Bad datetime value \"{}\": {}", s, e)))
}

fn type_mismatch(expected: &str, raw: &Value) -> Error {
    Error::DeserializationError(format!("Expected {} wire value, got {}", expected, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_scalars() {
        assert_eq!(
            coerce(WireType::String, &json!("abc")).unwrap(),
            FieldValue::String("abc".to_string())
        );
        assert_eq!(
            coerce(WireType::Integer, &json!(42)).unwrap(),
            FieldValue::Int(42)
        );
        assert_eq!(
            coerce(WireType::Boolean, &json!(true)).unwrap(),
            FieldValue::Bool(true)
        );
        assert_eq!(
            coerce(WireType::Float, &json!(1.5)).unwrap(),
            FieldValue::Float(1.5)
        );
    }

    #[test]
    fn test_coerce_null_for_any_type() {
        assert_eq!(
            coerce(WireType::Date, &Value::Null).unwrap(),
            FieldValue::Null
        );
        assert_eq!(
            coerce(WireType::Integer, &Value::Null).unwrap(),
            FieldValue::Null
        );
    }

    #[test]
    fn test_coerce_date() {
        let value = coerce(WireType::Date, &json!("2013-05-16")).unwrap();
        assert_eq!(
            value,
            FieldValue::Date(NaiveDate::from_ymd_opt(2013, 5, 16).unwrap())
        );
    }

    #[test]
    fn test_coerce_datetime_rfc3339() {
        let value = coerce(WireType::Datetime, &json!("2013-05-16T04:20:00+00:00")).unwrap();
        match value {
            FieldValue::DateTime(dt) => assert_eq!(dt.to_rfc3339(), "2013-05-16T04:20:00+00:00"),
            other => panic!("Expected DateTime, got {:?}", other),
        }
    }

    #[test]
    fn test_coerce_datetime_without_offset() {
        let value = coerce(WireType::Datetime, &json!("2013-05-16T04:20:00.123456")).unwrap();
        assert!(matches!(value, FieldValue::DateTime(_)));
    }

    #[test]
    fn test_coerce_bad_date_rejected() {
        let err = coerce(WireType::Date, &json!("not-a-date")).unwrap_err();
        assert!(matches!(err, Error::DeserializationError(_)));
    }

    #[test]
    fn test_coerce_type_mismatch() {
        let err = coerce(WireType::Integer, &json!("nope")).unwrap_err();
        assert!(matches!(err, Error::DeserializationError(_)));
    }

    #[test]
    fn test_wire_roundtrip_date() {
        let value = coerce(WireType::Date, &json!("2013-05-16")).unwrap();
        assert_eq!(to_wire(&value), json!("2013-05-16"));
    }

    #[test]
    fn test_unknown_type_passes_through() {
        let raw = json!({"nested": [1, 2]});
        let value = coerce(WireType::Unknown, &raw).unwrap();
        assert_eq!(value, FieldValue::Json(raw.clone()));
        assert_eq!(to_wire(&value), raw);
    }
}
