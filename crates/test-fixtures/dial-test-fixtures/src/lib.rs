//! Shared project fixtures for dial tests and benches.
//!
//! Fixture files live under the workspace `fixtures/` directory and are looked up by
//! name through `fixtures/manifest.json`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    projects: HashMap<String, ProjectEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProjectEntry {
    Path(String),
    Detailed {
        path: String,
        #[serde(rename = "schema-version")]
        schema_version: u32,
    },
}

impl ProjectEntry {
    fn as_path(&self) -> &str {
        match self {
            ProjectEntry::Path(path) => path,
            ProjectEntry::Detailed { path, .. } => path,
        }
    }
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn lookup<'a>(name: &str) -> Result<&'a ProjectEntry> {
    MANIFEST
        .projects
        .get(name)
        .ok_or_else(|| anyhow!("unknown project fixture '{name}'"))
}

pub mod projects {
    use super::*;

    pub fn keys() -> Vec<String> {
        let mut keys: Vec<String> = MANIFEST.projects.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn json(name: &str) -> Result<String> {
        read_to_string(lookup(name)?.as_path())
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let text = json(name)?;
        serde_json::from_str(&text).with_context(|| format!("failed to parse project fixture {name}"))
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        Ok(resolve_path(lookup(name)?.as_path()))
    }

    /// Schema version declared in the manifest, when the entry carries one.
    pub fn declared_version(name: &str) -> Result<Option<u32>> {
        Ok(match lookup(name)? {
            ProjectEntry::Detailed { schema_version, .. } => Some(*schema_version),
            ProjectEntry::Path(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_manifest_entry_resolves() {
        for name in projects::keys() {
            let value: serde_json::Value = projects::load(&name).unwrap();
            assert!(value.get("SchemaVersion").is_some(), "{name} lacks a version");
            if let Some(v) = projects::declared_version(&name).unwrap() {
                assert_eq!(value["SchemaVersion"], v, "{name}");
            }
        }
    }

    #[test]
    fn unknown_fixture_is_an_error() {
        assert!(projects::json("does-not-exist").is_err());
    }
}
