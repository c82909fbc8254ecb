//! Plain JSON encoding of typed values.
//!
//! Serialized records store values as bare JSON scalars (`2.5`, `true`, `"a.png"`);
//! the storage kind comes from the live knob, so decoding always takes the expected kind.

use serde_json::{Number, Value as JsonValue};
use thiserror::Error;

use crate::{TypedValue, ValueKind};

#[derive(Debug, Error, PartialEq)]
pub enum JsonError {
    #[error("expected {expected} value, found {found}")]
    TypeMismatch { expected: ValueKind, found: String },
    #[error("non-finite number cannot be encoded: {0}")]
    NonFinite(f64),
}

fn describe(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "null".to_string(),
        JsonValue::Bool(_) => "bool".to_string(),
        JsonValue::Number(n) => format!("number {n}"),
        JsonValue::String(_) => "string".to_string(),
        JsonValue::Array(_) => "array".to_string(),
        JsonValue::Object(_) => "object".to_string(),
    }
}

/// Encode a value as a bare JSON scalar.
pub fn value_to_json(value: &TypedValue) -> Result<JsonValue, JsonError> {
    Ok(match value {
        TypedValue::Int(i) => JsonValue::Number((*i).into()),
        TypedValue::Bool(b) => JsonValue::Bool(*b),
        TypedValue::Double(d) => {
            JsonValue::Number(Number::from_f64(*d).ok_or(JsonError::NonFinite(*d))?)
        }
        TypedValue::String(s) => JsonValue::String(s.clone()),
    })
}

/// Decode a bare JSON scalar as `kind`.
///
/// Integers written as whole floats (`3.0`) are accepted for Int, and numbers are
/// accepted for Bool, since older writers did not distinguish them.
pub fn value_from_json(kind: ValueKind, value: &JsonValue) -> Result<TypedValue, JsonError> {
    let mismatch = || JsonError::TypeMismatch {
        expected: kind,
        found: describe(value),
    };
    match (kind, value) {
        (ValueKind::Int, JsonValue::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Ok(TypedValue::Int(i))
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 => Ok(TypedValue::Int(f as i64)),
                    _ => Err(mismatch()),
                }
            }
        }
        (ValueKind::Bool, JsonValue::Bool(b)) => Ok(TypedValue::Bool(*b)),
        (ValueKind::Bool, JsonValue::Number(n)) => n
            .as_f64()
            .map(|f| TypedValue::Bool(f != 0.0))
            .ok_or_else(mismatch),
        (ValueKind::Double, JsonValue::Number(n)) => {
            n.as_f64().map(TypedValue::Double).ok_or_else(mismatch)
        }
        (ValueKind::String, JsonValue::String(s)) => Ok(TypedValue::String(s.clone())),
        _ => Err(mismatch()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_uses_expected_kind() {
        assert_eq!(
            value_from_json(ValueKind::Double, &json!(3)),
            Ok(TypedValue::Double(3.0))
        );
        assert_eq!(
            value_from_json(ValueKind::Int, &json!(3.0)),
            Ok(TypedValue::Int(3))
        );
        assert_eq!(
            value_from_json(ValueKind::Bool, &json!(1)),
            Ok(TypedValue::Bool(true))
        );
        assert!(value_from_json(ValueKind::Int, &json!(3.5)).is_err());
        assert!(value_from_json(ValueKind::String, &json!(1)).is_err());
    }

    #[test]
    fn nan_is_rejected() {
        assert_eq!(
            value_to_json(&TypedValue::Double(f64::NAN)).map_err(|e| e.to_string()),
            Err("non-finite number cannot be encoded: NaN".to_string())
        );
    }
}
