//! Schema upgrades for project documents.
//!
//! Each step rewrites a `serde_json::Value` from version N to N+1 and knows nothing
//! about live knobs. `migrate` applies the steps an older document needs, in order.
//!
//! | step   | change                                                              |
//! |--------|---------------------------------------------------------------------|
//! | 1 -> 2 | choice label moves from value records to `Extra.ChoiceLabel`        |
//! | 2 -> 3 | animated file knobs become one frame pattern, keys are dropped      |
//! | 3 -> 4 | numeric extras gain `DisplayMin`/`DisplayMax` copied from `Min`/`Max` |
//! | 4 -> 5 | value records gain explicit `Dim`/`View`                            |

use serde_json::{json, Map, Value};

use super::filename::legacy_filename_pattern;
use crate::error::SerializationError;

pub const CURRENT_SCHEMA_VERSION: u32 = 5;

type Step = fn(&mut Value);

const STEPS: [(u32, Step); 4] = [
    (1, choice_label_to_extra),
    (2, file_keys_to_pattern),
    (3, numeric_display_range),
    (4, explicit_channels),
];

/// `SchemaVersion` of a raw document.
pub fn schema_version(doc: &Value) -> Result<u32, SerializationError> {
    let raw = doc
        .get("SchemaVersion")
        .ok_or_else(|| SerializationError::malformed("<project>", "missing SchemaVersion"))?;
    raw.as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| {
            SerializationError::malformed("<project>", format!("bad SchemaVersion {raw}"))
        })
}

/// Bring a document to `CURRENT_SCHEMA_VERSION`.
pub fn migrate(mut doc: Value) -> Result<Value, SerializationError> {
    let found = schema_version(&doc)?;
    if found == 0 || found > CURRENT_SCHEMA_VERSION {
        return Err(SerializationError::UnsupportedVersion {
            found,
            current: CURRENT_SCHEMA_VERSION,
        });
    }
    for (from, step) in STEPS {
        if found <= from {
            step(&mut doc);
            log::debug!("project schema migrated {from} -> {}", from + 1);
        }
    }
    doc["SchemaVersion"] = json!(CURRENT_SCHEMA_VERSION);
    Ok(doc)
}

fn for_each_knob(doc: &mut Value, mut f: impl FnMut(&mut Map<String, Value>)) {
    let Some(nodes) = doc.get_mut("Nodes").and_then(Value::as_array_mut) else {
        return;
    };
    for node in nodes {
        let Some(knobs) = node.get_mut("Knobs").and_then(Value::as_array_mut) else {
            continue;
        };
        for knob in knobs.iter_mut().filter_map(Value::as_object_mut) {
            f(knob);
        }
    }
}

fn value_records(knob: &mut Map<String, Value>) -> impl Iterator<Item = &mut Map<String, Value>> {
    knob.get_mut("Values")
        .and_then(Value::as_array_mut)
        .into_iter()
        .flat_map(|values| values.iter_mut().filter_map(Value::as_object_mut))
}

fn knob_type(knob: &Map<String, Value>) -> &str {
    knob.get("Type").and_then(Value::as_str).unwrap_or_default()
}

fn choice_label_to_extra(doc: &mut Value) {
    for_each_knob(doc, |knob| {
        let mut label = None;
        for record in value_records(knob) {
            if let Some(Value::String(l)) = record.remove("Label") {
                if label.is_none() {
                    label = Some(l);
                }
            }
        }
        let Some(label) = label else {
            return;
        };
        if knob_type(knob) != "Choice" {
            return;
        }
        let extra = knob
            .entry("Extra")
            .or_insert_with(|| json!({ "Kind": "Choice", "Entries": [] }));
        if let Some(extra) = extra.as_object_mut() {
            extra.insert("ChoiceLabel".to_string(), Value::String(label));
        }
    });
}

fn file_keys_to_pattern(doc: &mut Value) {
    for_each_knob(doc, |knob| {
        if knob_type(knob) != "InputFile" {
            return;
        }
        for record in value_records(knob) {
            let animated = record
                .get("HasAnimation")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if !animated {
                continue;
            }
            let first_key = record
                .get("StringsAnimation")
                .and_then(Value::as_array)
                .and_then(|keys| keys.first())
                .and_then(|k| k.get("Value"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let name = first_key.or_else(|| {
                record
                    .get("Value")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });
            if let Some(name) = name {
                record.insert(
                    "Value".to_string(),
                    Value::String(legacy_filename_pattern(&name)),
                );
            }
            record.insert("HasAnimation".to_string(), Value::Bool(false));
            record.remove("StringsAnimation");
            record.remove("Curve");
        }
    });
}

fn numeric_display_range(doc: &mut Value) {
    for_each_knob(doc, |knob| {
        let Some(extra) = knob.get_mut("Extra").and_then(Value::as_object_mut) else {
            return;
        };
        if extra.get("Kind").and_then(Value::as_str) != Some("Numeric") {
            return;
        }
        for (from, to) in [("Min", "DisplayMin"), ("Max", "DisplayMax")] {
            if extra.contains_key(to) {
                continue;
            }
            if let Some(v) = extra.get(from).cloned() {
                extra.insert(to.to_string(), v);
            }
        }
    });
}

fn explicit_channels(doc: &mut Value) {
    for_each_knob(doc, |knob| {
        for (dim, record) in value_records(knob).enumerate() {
            record.entry("Dim").or_insert_with(|| json!(dim));
            record.entry("View").or_insert_with(|| json!(0));
        }
    });
}
