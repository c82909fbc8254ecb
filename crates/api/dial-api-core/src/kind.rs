//! Knob kinds and the value categories that decide which knobs may be linked.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::ValueKind;

/// Tag describing what a knob represents. The tag is fixed when the knob is built.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KnobKind {
    Int,
    Bool,
    Double,
    String,
    Choice,
    File,
    OutputFile,
    Path,
    Color,
    Parametric,
    Button,
    Group,
    Page,
    Separator,
}

/// Link compatibility class. Knobs link only inside the same category.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueCategory {
    Numeric,
    Text,
}

impl KnobKind {
    pub const ALL: [KnobKind; 14] = [
        KnobKind::Int,
        KnobKind::Bool,
        KnobKind::Double,
        KnobKind::String,
        KnobKind::Choice,
        KnobKind::File,
        KnobKind::OutputFile,
        KnobKind::Path,
        KnobKind::Color,
        KnobKind::Parametric,
        KnobKind::Button,
        KnobKind::Group,
        KnobKind::Page,
        KnobKind::Separator,
    ];

    /// Storage kind of each dimension.
    pub fn value_kind(self) -> ValueKind {
        match self {
            KnobKind::Int | KnobKind::Choice => ValueKind::Int,
            KnobKind::Double | KnobKind::Color | KnobKind::Parametric => ValueKind::Double,
            KnobKind::String | KnobKind::File | KnobKind::OutputFile | KnobKind::Path => {
                ValueKind::String
            }
            KnobKind::Bool
            | KnobKind::Button
            | KnobKind::Group
            | KnobKind::Page
            | KnobKind::Separator => ValueKind::Bool,
        }
    }

    /// Category used by link type checks. Layout-only kinds have none and never link.
    pub fn category(self) -> Option<ValueCategory> {
        match self {
            KnobKind::Int
            | KnobKind::Bool
            | KnobKind::Double
            | KnobKind::Choice
            | KnobKind::Color => Some(ValueCategory::Numeric),
            KnobKind::String | KnobKind::File | KnobKind::OutputFile | KnobKind::Path => {
                Some(ValueCategory::Text)
            }
            KnobKind::Parametric
            | KnobKind::Button
            | KnobKind::Group
            | KnobKind::Page
            | KnobKind::Separator => None,
        }
    }

    /// Whether per-(dim, view) animation is stored for this kind.
    pub fn can_animate(self) -> bool {
        matches!(
            self,
            KnobKind::Int
                | KnobKind::Bool
                | KnobKind::Double
                | KnobKind::String
                | KnobKind::Choice
                | KnobKind::Color
        )
    }

    /// Name written to the `Type` field of serialized records.
    pub fn type_name(self) -> &'static str {
        match self {
            KnobKind::Int => "Int",
            KnobKind::Bool => "Bool",
            KnobKind::Double => "Double",
            KnobKind::String => "String",
            KnobKind::Choice => "Choice",
            KnobKind::File => "InputFile",
            KnobKind::OutputFile => "OutputFile",
            KnobKind::Path => "Path",
            KnobKind::Color => "Color",
            KnobKind::Parametric => "Parametric",
            KnobKind::Button => "Button",
            KnobKind::Group => "Group",
            KnobKind::Page => "Page",
            KnobKind::Separator => "Separator",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        KnobKind::ALL.into_iter().find(|k| k.type_name() == name)
    }
}

impl fmt::Display for KnobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}
