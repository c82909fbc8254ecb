//! String animation: sorted (time, text) keys sampled through an interpolation hook.

use std::fmt;

use dial_api_core::Time;
use serde::{Deserialize, Serialize};

use crate::error::CurveError;
use crate::keyframe::{KeyframeOutcome, TIME_EPSILON};
use crate::warp::{warp_sorted, KeyWarp};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StringKey {
    pub time: Time,
    pub value: String,
}

/// Hook turning string keys into a value at `time`.
/// Returning `None` (or an empty string) tells the caller to use its scalar value.
pub trait StringInterpolator: Send + Sync + fmt::Debug {
    fn interpolate(&self, keys: &[StringKey], time: Time) -> Option<String>;
}

/// Step interpolation: the last key at or before `time`; nothing before the first key.
#[derive(Clone, Copy, Debug, Default)]
pub struct HoldPrevious;

impl StringInterpolator for HoldPrevious {
    fn interpolate(&self, keys: &[StringKey], time: Time) -> Option<String> {
        let idx = keys.partition_point(|k| k.time <= time + TIME_EPSILON);
        idx.checked_sub(1).map(|i| keys[i].value.clone())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StringAnimation {
    #[serde(default)]
    keys: Vec<StringKey>,
}

impl StringAnimation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> &[StringKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    fn index_of(&self, time: Time) -> Result<usize, usize> {
        let pos = self.keys.partition_point(|k| k.time < time - TIME_EPSILON);
        match self.keys.get(pos) {
            Some(k) if (k.time - time).abs() < TIME_EPSILON => Ok(pos),
            _ => Err(pos),
        }
    }

    pub fn key_at(&self, time: Time) -> Option<&StringKey> {
        self.index_of(time).ok().map(|i| &self.keys[i])
    }

    pub fn set_key(&mut self, time: Time, value: impl Into<String>) -> KeyframeOutcome {
        let value = value.into();
        match self.index_of(time) {
            Ok(i) => {
                self.keys[i].value = value;
                KeyframeOutcome::Replaced
            }
            Err(i) => {
                self.keys.insert(i, StringKey { time, value });
                KeyframeOutcome::Added
            }
        }
    }

    pub fn remove_key_at(&mut self, time: Time) -> Option<StringKey> {
        self.index_of(time).ok().map(|i| self.keys.remove(i))
    }

    /// Move the keys at `times` in time; the value part of `warp` is ignored.
    pub fn warp(&mut self, times: &[Time], warp: &KeyWarp) -> Result<Vec<Time>, CurveError> {
        let (keys, moved) = warp_sorted(
            &self.keys,
            times,
            |k| k.time,
            |k| StringKey {
                time: warp.time(k.time),
                value: k.value.clone(),
            },
        )?;
        self.keys = keys;
        Ok(moved)
    }

    /// Sample through `hook`; `None` when the hook has nothing for `time`.
    pub fn value_at(&self, time: Time, hook: &dyn StringInterpolator) -> Option<String> {
        if self.keys.is_empty() {
            return None;
        }
        hook.interpolate(&self.keys, time).filter(|s| !s.is_empty())
    }
}
