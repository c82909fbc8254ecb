//! Per-(dimension, view) storage of a knob's current values, defaults and animation.
//!
//! The store is plain data: locking, link resolution and notifications are done by the
//! `Document` around it.

use dial_api_core::coercion::{from_curve_value, to_f64};
use dial_api_core::{DimIdx, DimView, Time, TypedValue, ValueKind, ViewId};
use dial_curve_core::{
    Curve, CurveError, KeyFrame, KeyWarp, KeyframeOutcome, StringAnimation, StringInterpolator,
};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// What a write did to the knob.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValueChangeOutcome {
    NoChange,
    Modified,
    KeyframeModified,
    KeyframeAdded,
}

impl ValueChangeOutcome {
    #[inline]
    pub fn changed(self) -> bool {
        self != ValueChangeOutcome::NoChange
    }
}

/// Why a value changed, forwarded to holders with every notification.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueChangedReason {
    UserEdited,
    PluginEdited,
    ProjectLoading,
    RestoreDefault,
    TimeChanged,
    SlaveRefresh,
}

impl ValueChangedReason {
    /// Significant changes require downstream re-evaluation when a bracket closes.
    pub fn is_significant(self) -> bool {
        !matches!(
            self,
            ValueChangedReason::TimeChanged | ValueChangedReason::ProjectLoading
        )
    }
}

/// Value and animation of one channel, used to copy state between knobs.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelState {
    pub value: TypedValue,
    pub curve: Option<Curve>,
    pub strings: Option<StringAnimation>,
}

#[derive(Debug)]
pub(crate) struct ValueStore {
    kind: ValueKind,
    values: HashMap<DimView, TypedValue>,
    defaults: HashMap<DimView, TypedValue>,
    curves: HashMap<DimView, Curve>,
    strings: HashMap<DimView, StringAnimation>,
}

impl ValueStore {
    pub fn new(kind: ValueKind, defaults: &[TypedValue]) -> Self {
        let mut store = Self {
            kind,
            values: HashMap::new(),
            defaults: HashMap::new(),
            curves: HashMap::new(),
            strings: HashMap::new(),
        };
        for (dim, v) in defaults.iter().enumerate() {
            let dv = DimView::main(dim as DimIdx);
            store.defaults.insert(dv, v.clone());
            store.values.insert(dv, v.clone());
        }
        store
    }

    fn main_of(dv: DimView) -> DimView {
        DimView::main(dv.dim)
    }

    pub fn value(&self, dv: DimView) -> TypedValue {
        self.values
            .get(&dv)
            .or_else(|| self.values.get(&Self::main_of(dv)))
            .cloned()
            .unwrap_or_else(|| TypedValue::zero(self.kind))
    }

    /// Write the scalar; returns whether it differed.
    pub fn set_scalar(&mut self, dv: DimView, value: TypedValue) -> bool {
        match self.values.get(&dv) {
            Some(old) if *old == value => false,
            _ => {
                self.values.insert(dv, value);
                true
            }
        }
    }

    pub fn default_value(&self, dv: DimView) -> TypedValue {
        self.defaults
            .get(&dv)
            .or_else(|| self.defaults.get(&Self::main_of(dv)))
            .cloned()
            .unwrap_or_else(|| TypedValue::zero(self.kind))
    }

    pub fn set_default(&mut self, dv: DimView, value: TypedValue) {
        self.defaults.insert(dv, value);
    }

    pub fn curve(&self, dv: DimView) -> Option<&Curve> {
        self.curves.get(&dv)
    }

    pub fn strings(&self, dv: DimView) -> Option<&StringAnimation> {
        self.strings.get(&dv)
    }

    pub fn key_count(&self, dv: DimView) -> usize {
        match self.kind {
            ValueKind::String => self.strings.get(&dv).map_or(0, |s| s.len()),
            _ => self.curves.get(&dv).map_or(0, |c| c.len()),
        }
    }

    pub fn key_times(&self, dv: DimView) -> Vec<Time> {
        match self.kind {
            ValueKind::String => self
                .strings
                .get(&dv)
                .map(|s| s.keys().iter().map(|k| k.time).collect())
                .unwrap_or_default(),
            _ => self
                .curves
                .get(&dv)
                .map(|c| c.keyframes().iter().map(|k| k.time).collect())
                .unwrap_or_default(),
        }
    }

    /// Animated value at `time`, or `None` when the scalar is authoritative:
    /// no keys, a time before the first key, or an empty string hook result.
    pub fn sample(
        &self,
        dv: DimView,
        time: Time,
        hook: &dyn StringInterpolator,
    ) -> Option<TypedValue> {
        match self.kind {
            ValueKind::String => self
                .strings
                .get(&dv)
                .and_then(|s| s.value_at(time, hook))
                .map(TypedValue::String),
            kind => {
                let curve = self.curves.get(&dv)?;
                if time < curve.first_time()? {
                    return None;
                }
                curve.evaluate(time).and_then(|x| from_curve_value(kind, x))
            }
        }
    }

    /// Key value stored exactly at `time`, if any.
    pub fn key_value_at(&self, dv: DimView, time: Time) -> Option<TypedValue> {
        match self.kind {
            ValueKind::String => self
                .strings
                .get(&dv)
                .and_then(|s| s.key_at(time))
                .map(|k| TypedValue::String(k.value.clone())),
            kind => self
                .curves
                .get(&dv)
                .and_then(|c| c.keyframe_at(time))
                .and_then(|k| from_curve_value(kind, k.value)),
        }
    }

    /// Add or replace the key at `time`.
    pub fn set_key(&mut self, dv: DimView, time: Time, value: &TypedValue) -> ValueChangeOutcome {
        if self.key_value_at(dv, time).as_ref() == Some(value) {
            return ValueChangeOutcome::NoChange;
        }
        let outcome = match value {
            TypedValue::String(s) => self.strings.entry(dv).or_default().set_key(time, s.clone()),
            other => match to_f64(other) {
                Some(x) => self
                    .curves
                    .entry(dv)
                    .or_default()
                    .add_keyframe(KeyFrame::new(time, x)),
                None => return ValueChangeOutcome::NoChange,
            },
        };
        match outcome {
            KeyframeOutcome::Added => ValueChangeOutcome::KeyframeAdded,
            KeyframeOutcome::Replaced => ValueChangeOutcome::KeyframeModified,
        }
    }

    pub fn remove_key(&mut self, dv: DimView, time: Time) -> bool {
        match self.kind {
            ValueKind::String => self
                .strings
                .get_mut(&dv)
                .and_then(|s| s.remove_key_at(time))
                .is_some(),
            _ => self
                .curves
                .get_mut(&dv)
                .and_then(|c| c.remove_keyframe_at(time))
                .is_some(),
        }
    }

    /// Move the keys at `times`; all or nothing.
    pub fn warp_keys(
        &mut self,
        dv: DimView,
        times: &[Time],
        warp: &KeyWarp,
    ) -> Result<Vec<Time>, CurveError> {
        let missing = || CurveError::MissingKey {
            time: times.first().copied().unwrap_or_default(),
        };
        if times.is_empty() {
            return Ok(Vec::new());
        }
        match self.kind {
            ValueKind::String => self.strings.get_mut(&dv).ok_or_else(missing)?.warp(times, warp),
            _ => self.curves.get_mut(&dv).ok_or_else(missing)?.warp(times, warp),
        }
    }

    pub fn set_interpolation_at(
        &mut self,
        dv: DimView,
        time: Time,
        interpolation: dial_curve_core::Interpolation,
    ) -> bool {
        self.curves
            .get_mut(&dv)
            .map_or(false, |c| c.set_interpolation_at(time, interpolation))
    }

    /// Drop all keys of a channel; returns whether anything was removed.
    pub fn clear_animation(&mut self, dv: DimView) -> bool {
        let curve = self.curves.remove(&dv).map_or(false, |c| !c.is_empty());
        let strings = self.strings.remove(&dv).map_or(false, |s| !s.is_empty());
        curve || strings
    }

    pub fn channel(&self, dv: DimView) -> ChannelState {
        ChannelState {
            value: self.value(dv),
            curve: self.curves.get(&dv).filter(|c| !c.is_empty()).cloned(),
            strings: self.strings.get(&dv).filter(|s| !s.is_empty()).cloned(),
        }
    }

    /// Replace a channel wholesale.
    pub fn put_channel(&mut self, dv: DimView, state: ChannelState) {
        self.values.insert(dv, state.value);
        match state.curve {
            Some(c) if !c.is_empty() => {
                self.curves.insert(dv, c);
            }
            _ => {
                self.curves.remove(&dv);
            }
        }
        match state.strings {
            Some(s) if !s.is_empty() => {
                self.strings.insert(dv, s);
            }
            _ => {
                self.strings.remove(&dv);
            }
        }
    }

    /// Give `view` its own copy of the main view channels.
    pub fn split_view(&mut self, view: ViewId, dimensions: u32) {
        for dim in 0..dimensions {
            let main = DimView::main(dim);
            let dv = DimView::new(dim, view);
            let state = self.channel(main);
            self.put_channel(dv, state);
            let default = self.default_value(main);
            self.defaults.insert(dv, default);
        }
    }

    pub fn drop_view(&mut self, view: ViewId) {
        self.values.retain(|k, _| k.view != view);
        self.defaults.retain(|k, _| k.view != view);
        self.curves.retain(|k, _| k.view != view);
        self.strings.retain(|k, _| k.view != view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dial_curve_core::HoldPrevious;

    #[test]
    fn unknown_view_reads_main() {
        let store = ValueStore::new(ValueKind::Double, &[TypedValue::Double(1.5)]);
        assert_eq!(
            store.value(DimView::new(0, ViewId(3))),
            TypedValue::Double(1.5)
        );
    }

    #[test]
    fn scalar_is_held_before_first_key() {
        let mut store = ValueStore::new(ValueKind::Double, &[TypedValue::Double(0.0)]);
        let dv = DimView::main(0);
        store.set_scalar(dv, TypedValue::Double(2.5));
        assert_eq!(
            store.set_key(dv, 10.0, &TypedValue::Double(4.0)),
            ValueChangeOutcome::KeyframeAdded
        );
        assert_eq!(store.sample(dv, 5.0, &HoldPrevious), None);
        assert_eq!(
            store.sample(dv, 12.0, &HoldPrevious),
            Some(TypedValue::Double(4.0))
        );
    }

    #[test]
    fn string_keys_move_in_time_only() {
        let mut store = ValueStore::new(ValueKind::String, &[TypedValue::String(String::new())]);
        let dv = DimView::main(0);
        store.set_key(dv, 1.0, &TypedValue::String("a".into()));
        store.set_key(dv, 2.0, &TypedValue::String("b".into()));
        let moved = store.warp_keys(dv, &[2.0], &KeyWarp::offset(3.0, 100.0)).unwrap();
        assert_eq!(moved, vec![5.0]);
        assert_eq!(store.key_times(dv), vec![1.0, 5.0]);
        assert_eq!(
            store.key_value_at(dv, 5.0),
            Some(TypedValue::String("b".into()))
        );
        assert!(store.warp_keys(DimView::main(1), &[1.0], &KeyWarp::IDENTITY).is_err());
    }

    #[test]
    fn same_key_value_is_no_change() {
        let mut store = ValueStore::new(ValueKind::Int, &[TypedValue::Int(0)]);
        let dv = DimView::main(0);
        store.set_key(dv, 1.0, &TypedValue::Int(3));
        assert_eq!(
            store.set_key(dv, 1.0, &TypedValue::Int(3)),
            ValueChangeOutcome::NoChange
        );
        assert_eq!(
            store.set_key(dv, 1.0, &TypedValue::Int(4)),
            ValueChangeOutcome::KeyframeModified
        );
    }
}
