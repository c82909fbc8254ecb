//! Coercion helpers between typed values and the floating curve representation.
//!
//! Rules:
//! - Int and Double convert through f64; curve values round to the nearest integer.
//! - Bool maps to 1.0 / 0.0; a curve value is true when it is not zero.
//! - String never converts to or from a number.

use crate::{TypedValue, ValueKind};

/// Numeric view of a value, `None` for strings.
pub fn to_f64(v: &TypedValue) -> Option<f64> {
    match v {
        TypedValue::Int(i) => Some(*i as f64),
        TypedValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        TypedValue::Double(d) => Some(*d),
        TypedValue::String(_) => None,
    }
}

/// Convert a sampled curve value into the storage kind of a knob.
pub fn from_curve_value(kind: ValueKind, x: f64) -> Option<TypedValue> {
    match kind {
        ValueKind::Int => Some(TypedValue::Int(x.round() as i64)),
        ValueKind::Bool => Some(TypedValue::Bool(x != 0.0)),
        ValueKind::Double => Some(TypedValue::Double(x)),
        ValueKind::String => None,
    }
}

/// Convert `v` into `target`. Numeric kinds convert freely between each other,
/// strings only convert to strings.
pub fn coerce(v: &TypedValue, target: ValueKind) -> Option<TypedValue> {
    if v.kind() == target {
        return Some(v.clone());
    }
    match target {
        ValueKind::String => None,
        _ => to_f64(v).and_then(|x| from_curve_value(target, x)),
    }
}
