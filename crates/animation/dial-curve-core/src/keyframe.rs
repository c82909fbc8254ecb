//! Keyframe data model.

use dial_api_core::Time;
use serde::{Deserialize, Serialize};

/// Two keys closer than this are considered to sit at the same time.
pub const TIME_EPSILON: f64 = 1e-6;

/// How the curve leaves (and arrives at) a keyframe.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interpolation {
    /// Hold the key value until the next key.
    Constant,
    Linear,
    /// Catmull-Rom tangents flattened at local extrema.
    #[default]
    Smooth,
    CatmullRom,
    /// Flat tangents.
    Horizontal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyFrame {
    pub time: Time,
    pub value: f64,
    #[serde(default)]
    pub interpolation: Interpolation,
}

impl KeyFrame {
    pub fn new(time: Time, value: f64) -> Self {
        Self {
            time,
            value,
            interpolation: Interpolation::default(),
        }
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    #[inline]
    pub fn same_time(&self, time: Time) -> bool {
        (self.time - time).abs() < TIME_EPSILON
    }
}

/// Result of inserting a key.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyframeOutcome {
    Added,
    Replaced,
}
