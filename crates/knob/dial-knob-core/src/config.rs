//! Core configuration for dial-knob-core.

use serde::{Deserialize, Serialize};

/// When `set_value` on an animation-enabled knob also writes a keyframe.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutoKeyPolicy {
    /// Every edit keys the current time.
    #[default]
    Always,
    /// Only channels that already carry keyframes are keyed.
    WhenAnimated,
    /// Never key implicitly; only `set_value_at_time` writes keys.
    Never,
}

/// Document-wide behaviour switches.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub auto_key: AutoKeyPolicy,

    /// Maximum number of entries an `UndoStack` built from this config retains.
    pub undo_limit: usize,

    /// Bound on master delegation and slave refresh chains.
    pub max_link_depth: u32,

    /// Deliver change notifications for edits made while a holder loads a project.
    pub notify_on_project_load: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_key: AutoKeyPolicy::Always,
            undo_limit: 100,
            max_link_depth: 64,
            notify_on_project_load: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: Config = serde_json::from_str(r#"{ "undo_limit": 5 }"#).unwrap();
        assert_eq!(cfg.undo_limit, 5);
        assert_eq!(cfg.auto_key, AutoKeyPolicy::Always);
        assert_eq!(cfg.max_link_depth, 64);
    }
}
