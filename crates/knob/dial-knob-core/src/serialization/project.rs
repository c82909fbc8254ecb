use std::sync::atomic::Ordering;

use dial_api_core::{KnobHandle, KnobKind};

use super::migration::{migrate, CURRENT_SCHEMA_VERSION};
use super::record::{KnobRecord, NodeRecord, ProjectDocument};
use crate::document::Document;
use crate::error::SerializationError;
use crate::knob::KnobSpec;
use crate::sync::read;

/// A problem met while loading one node or knob. Loading carries on past it.
#[derive(Debug)]
pub struct LoadIssue {
    pub node: String,
    pub knob: Option<String>,
    pub error: SerializationError,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    /// Knobs whose record was applied.
    pub loaded: usize,
    /// User knobs created from their record.
    pub created: usize,
    pub issues: Vec<LoadIssue>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    fn push(&mut self, node: &str, knob: Option<&str>, error: SerializationError) {
        log::warn!(
            "loading {node}{}: {error}",
            knob.map(|k| format!(".{k}")).unwrap_or_default()
        );
        self.issues.push(LoadIssue {
            node: node.to_string(),
            knob: knob.map(str::to_string),
            error,
        });
    }
}

fn spec_from_record(record: &KnobRecord, kind: KnobKind) -> KnobSpec {
    KnobSpec::new(record.name.clone(), kind)
        .label(record.label.clone())
        .hint(record.hint.clone())
        .dimensions(record.dimension)
        .animated(record.animation_enabled)
        .persistent(record.persistent)
        .user_created(true)
        .extra(record.extra.clone())
}

impl Document {
    /// Snapshot of every holder's persistent knobs, in holder and knob creation order.
    pub fn save_project(&self) -> Result<ProjectDocument, SerializationError> {
        let mut nodes = Vec::new();
        for h in self.holders() {
            let entry = self.holder(h)?;
            let mut knobs = Vec::new();
            for k in self.holder_knobs(h)? {
                if !read(&self.knob(k)?.meta).persistent {
                    continue;
                }
                knobs.push(self.to_serialization(k)?);
            }
            nodes.push(NodeRecord {
                name: entry.name.clone(),
                knobs,
            });
        }
        Ok(ProjectDocument {
            schema_version: CURRENT_SCHEMA_VERSION,
            nodes,
        })
    }

    /// Apply a current-version project to the live holders.
    ///
    /// Nodes are matched by name and knobs by name within their node. Missing user knobs
    /// are created from their record. Links are restored once every node is loaded, so
    /// masters may live on nodes that come later in the document.
    pub fn load_project(&self, project: &ProjectDocument) -> LoadReport {
        let mut report = LoadReport::default();
        if project.schema_version != CURRENT_SCHEMA_VERSION {
            report.push(
                "<project>",
                None,
                SerializationError::UnsupportedVersion {
                    found: project.schema_version,
                    current: CURRENT_SCHEMA_VERSION,
                },
            );
            return report;
        }

        let mut loaded: Vec<(String, KnobHandle)> = Vec::new();
        for node in &project.nodes {
            let Some(h) = self.find_holder(&node.name) else {
                report.push(
                    &node.name,
                    None,
                    SerializationError::malformed(&node.name, "no such node in the document"),
                );
                continue;
            };
            let Ok(entry) = self.holder(h) else {
                continue;
            };
            let _bracket = self.begin_changes(h).ok();
            let was_loading = entry.loading.swap(true, Ordering::SeqCst);
            for record in &node.knobs {
                let k = match self.find_knob(h, &record.name) {
                    Some(k) => k,
                    None if record.user_knob => {
                        let Some(kind) = KnobKind::from_type_name(&record.kind) else {
                            report.push(
                                &node.name,
                                Some(&record.name),
                                SerializationError::malformed(
                                    &record.name,
                                    format!("unknown knob type '{}'", record.kind),
                                ),
                            );
                            continue;
                        };
                        match self.create_knob(h, spec_from_record(record, kind)) {
                            Ok(k) => {
                                report.created += 1;
                                k
                            }
                            Err(e) => {
                                report.push(&node.name, Some(&record.name), e.into());
                                continue;
                            }
                        }
                    }
                    None => {
                        report.push(
                            &node.name,
                            Some(&record.name),
                            SerializationError::malformed(&record.name, "no such knob on the node"),
                        );
                        continue;
                    }
                };
                match self.from_serialization(record, k) {
                    Ok(()) => {
                        report.loaded += 1;
                        loaded.push((node.name.clone(), k));
                    }
                    Err(e) => report.push(&node.name, Some(&record.name), e),
                }
            }
            entry.loading.store(was_loading, Ordering::SeqCst);
        }

        for (node, k) in loaded {
            if let Err(e) = self.restore_links(&[k]) {
                let name = self.knob_name(k).ok();
                report.push(&node, name.as_deref(), e);
            }
        }
        report
    }

    pub fn project_to_json(&self) -> Result<String, SerializationError> {
        Ok(serde_json::to_string_pretty(&self.save_project()?)?)
    }

    /// Parse, migrate to the current schema, then load.
    pub fn project_from_json(&self, text: &str) -> Result<LoadReport, SerializationError> {
        let raw: serde_json::Value = serde_json::from_str(text)?;
        let project: ProjectDocument = serde_json::from_value(migrate(raw)?)?;
        Ok(self.load_project(&project))
    }
}
