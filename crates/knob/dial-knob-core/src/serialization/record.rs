//! Persisted shapes of knobs and projects.
//!
//! Field names are PascalCase. Optional parts are only written when the boolean that
//! announces them is set (`HasAnimation`, `HasMaster`, a non-empty `Expression`).

use dial_api_core::DimIdx;
use dial_curve_core::{Curve, StringKey};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::expression::ExpressionLanguage;
use crate::knob::KnobExtra;

fn yes() -> bool {
    true
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MasterRecord {
    pub master_dimension: DimIdx,
    pub master_node_name: String,
    pub master_knob_name: String,
    #[serde(default)]
    pub master_view: u32,
}

/// One (dimension, view) channel of a knob.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ValueRecord {
    #[serde(default)]
    pub dim: DimIdx,
    #[serde(default)]
    pub view: u32,
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(default)]
    pub has_animation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<Curve>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strings_animation: Option<Vec<StringKey>>,
    pub value: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    #[serde(default)]
    pub has_master: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<MasterRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr_language: Option<ExpressionLanguage>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub expr_has_ret: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KnobRecord {
    pub name: String,
    /// `KnobKind::type_name` of the knob.
    #[serde(rename = "Type")]
    pub kind: String,
    pub dimension: u32,
    #[serde(default)]
    pub secret: bool,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub hint: String,
    #[serde(default)]
    pub user_knob: bool,
    #[serde(default = "yes")]
    pub persistent: bool,
    #[serde(default)]
    pub animation_enabled: bool,
    #[serde(default)]
    pub extra: KnobExtra,
    #[serde(default)]
    pub values: Vec<ValueRecord>,
}

impl KnobRecord {
    /// Records of one serialized dimension, any view.
    pub fn values_of(&self, dim: DimIdx) -> impl Iterator<Item = &ValueRecord> {
        self.values.iter().filter(move |v| v.dim == dim)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeRecord {
    pub name: String,
    #[serde(default)]
    pub knobs: Vec<KnobRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectDocument {
    pub schema_version: u32,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
}
