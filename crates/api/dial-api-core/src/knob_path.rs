//! KnobPath parsing and formatting.
//!
//! Grammar:
//!   node.knob[.dimension]
//! Examples:
//!   "Blur1.size"   -> node="Blur1", knob="size", dimension=None
//!   "Blur1.size.1" -> node="Blur1", knob="size", dimension=Some(1)
//!
//! This is the text form used by link expressions and log messages.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::DimIdx;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KnobPath {
    pub node: String,
    pub knob: String,
    pub dimension: Option<DimIdx>,
}

impl KnobPath {
    pub fn new(node: impl Into<String>, knob: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            knob: knob.into(),
            dimension: None,
        }
    }

    pub fn with_dimension(mut self, dim: DimIdx) -> Self {
        self.dimension = Some(dim);
        self
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        if s.is_empty() {
            return Err("empty knob path".to_string());
        }
        if s.chars().any(char::is_whitespace) {
            return Err("invalid knob path: contains whitespace".to_string());
        }
        let parts: Vec<&str> = s.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err("invalid knob path: empty segment".to_string());
        }
        match parts.as_slice() {
            [node, knob] => Ok(KnobPath::new(*node, *knob)),
            [node, knob, dim] => {
                let dim: DimIdx = dim
                    .parse()
                    .map_err(|_| format!("invalid knob path: bad dimension '{dim}'"))?;
                Ok(KnobPath::new(*node, *knob).with_dimension(dim))
            }
            _ => Err(format!("invalid knob path: expected node.knob[.dim], got '{s}'")),
        }
    }
}

impl fmt::Display for KnobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dimension {
            Some(dim) => write!(f, "{}.{}.{}", self.node, self.knob, dim),
            None => write!(f, "{}.{}", self.node, self.knob),
        }
    }
}

impl FromStr for KnobPath {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KnobPath::parse(s)
    }
}

impl Serialize for KnobPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for KnobPath {
    fn deserialize<D>(deserializer: D) -> Result<KnobPath, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        KnobPath::parse(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_dimension() {
        let p = KnobPath::parse("Blur1.size.1").unwrap();
        assert_eq!(p.node, "Blur1");
        assert_eq!(p.knob, "size");
        assert_eq!(p.dimension, Some(1));
        assert_eq!(p.to_string(), "Blur1.size.1");
    }

    #[test]
    fn parse_without_dimension() {
        let p: KnobPath = "Grade1.white".parse().unwrap();
        assert_eq!(p, KnobPath::new("Grade1", "white"));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(KnobPath::parse("").is_err());
        assert!(KnobPath::parse("Blur1").is_err());
        assert!(KnobPath::parse("Blur1..size").is_err());
        assert!(KnobPath::parse("Blur1.size.x").is_err());
        assert!(KnobPath::parse("Blur 1.size").is_err());
        assert!(KnobPath::parse("a.b.1.2").is_err());
    }

    #[test]
    fn serde_as_string() {
        let p = KnobPath::new("Blur1", "size").with_dimension(0);
        let s = serde_json::to_string(&p).unwrap();
        assert_eq!(s, "\"Blur1.size.0\"");
        let back: KnobPath = serde_json::from_str(&s).unwrap();
        assert_eq!(back, p);
    }
}
