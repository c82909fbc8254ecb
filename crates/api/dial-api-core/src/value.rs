//! TypedValue: the closed set of scalar values a knob dimension can hold.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage kind of a value. Every knob kind maps onto exactly one of these.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Int,
    Bool,
    Double,
    String,
}

impl ValueKind {
    /// True for the kinds that an animation curve can represent directly.
    #[inline]
    pub fn is_numeric(self) -> bool {
        !matches!(self, ValueKind::String)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Int => "int",
            ValueKind::Bool => "bool",
            ValueKind::Double => "double",
            ValueKind::String => "string",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum TypedValue {
    Int(i64),
    Bool(bool),
    Double(f64),
    String(String),
}

impl TypedValue {
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            TypedValue::Int(_) => ValueKind::Int,
            TypedValue::Bool(_) => ValueKind::Bool,
            TypedValue::Double(_) => ValueKind::Double,
            TypedValue::String(_) => ValueKind::String,
        }
    }

    /// Zero value of a kind, used when a knob is built without explicit defaults.
    pub fn zero(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Int => TypedValue::Int(0),
            ValueKind::Bool => TypedValue::Bool(false),
            ValueKind::Double => TypedValue::Double(0.0),
            ValueKind::String => TypedValue::String(String::new()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        crate::coercion::to_f64(self)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TypedValue::Int(i) => Some(*i),
            TypedValue::Bool(b) => Some(i64::from(*b)),
            TypedValue::Double(d) => Some(d.round() as i64),
            TypedValue::String(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Bool(b) => Some(*b),
            TypedValue::Int(i) => Some(*i != 0),
            TypedValue::Double(d) => Some(*d != 0.0),
            TypedValue::String(_) => None,
        }
    }
}

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        TypedValue::Double(v)
    }
}

impl From<i64> for TypedValue {
    fn from(v: i64) -> Self {
        TypedValue::Int(v)
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        TypedValue::Bool(v)
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        TypedValue::String(v.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        TypedValue::String(v)
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Int(i) => write!(f, "{i}"),
            TypedValue::Bool(b) => write!(f, "{b}"),
            TypedValue::Double(d) => write!(f, "{d}"),
            TypedValue::String(s) => f.write_str(s),
        }
    }
}
