//! Reading and writing knob values: scalars, keyframes and defaults.

use std::sync::atomic::Ordering;

use dial_api_core::coercion::coerce;
use dial_api_core::{DimIdx, DimView, KnobHandle, Time, TypedValue, ValueKind, ViewId};
use dial_curve_core::{Interpolation, KeyFrame, KeyWarp, StringKey};

use crate::config::AutoKeyPolicy;
use crate::document::Document;
use crate::error::{KnobError, Result};
use crate::expression::ExpressionContext;
use crate::knob::{Knob, KnobExtra};
use crate::links::Binding;
use crate::sync::{lock, read, write};
use crate::undo::KnobEdit;
use crate::value_store::{ValueChangeOutcome, ValueChangedReason};

/// How an accepted value lands in the store.
#[derive(Copy, Clone, Debug, PartialEq)]
enum SetMode {
    /// Scalar only.
    Scalar,
    /// Scalar plus a keyframe at the given time.
    ScalarAndKey(Time),
    /// Keyframe only; the scalar is left alone.
    KeyOnly(Time),
}

impl Document {
    pub(crate) fn time_of(&self, knob: &Knob) -> Time {
        self.holder(knob.holder)
            .map(|e| e.hooks.current_time())
            .unwrap_or(0.0)
    }

    /// Effective value of a channel at `time`: follows links and expressions, then the
    /// channel's own animation (skipped when `gate` is set and animation is disabled).
    pub(crate) fn value_of(
        &self,
        knob: &Knob,
        dv: DimView,
        time: Time,
        gate: bool,
        depth: u32,
    ) -> Result<TypedValue> {
        let binding = lock(&knob.links).bindings.get(&dv).cloned();
        match binding {
            Some(Binding::Slaved(m)) if depth <= self.config.max_link_depth => {
                let master = self.knob(m.knob)?;
                let mdv = master.resolve(m.dim, m.view)?;
                let v = self.value_of(&master, mdv, time, gate, depth + 1)?;
                let kind = knob.kind.value_kind();
                Ok(coerce(&v, kind).unwrap_or_else(|| read(&knob.store).value(dv)))
            }
            Some(Binding::Expression(expr)) => {
                let local = self.local_value(knob, dv, time, gate);
                if expr.error.is_some() {
                    return Ok(local);
                }
                let node_name = self
                    .holder(knob.holder)
                    .map(|e| e.name.clone())
                    .unwrap_or_default();
                let ctx = ExpressionContext {
                    time,
                    dim: dv.dim,
                    view: dv.view,
                    value: &local,
                    knob_name: &knob.name,
                    node_name: &node_name,
                };
                match self.evaluator.evaluate(&expr, &ctx) {
                    Ok(v) => Ok(coerce(&v, knob.kind.value_kind()).unwrap_or(local)),
                    Err(e) => {
                        log::debug!("{}: expression '{}' failed: {e}", knob.name, expr.source_text);
                        Ok(local)
                    }
                }
            }
            Some(Binding::Slaved(_)) => {
                log::warn!("{}: link chain too deep, using stored value", knob.name);
                Ok(self.local_value(knob, dv, time, gate))
            }
            _ => Ok(self.local_value(knob, dv, time, gate)),
        }
    }

    fn local_value(&self, knob: &Knob, dv: DimView, time: Time, gate: bool) -> TypedValue {
        if gate && !knob.animation_enabled() {
            return read(&knob.store).value(dv);
        }
        let hook = knob.string_hook();
        let store = read(&knob.store);
        store
            .sample(dv, time, hook.as_ref())
            .unwrap_or_else(|| store.value(dv))
    }

    /// Value at the holder's current time.
    pub fn get_value(&self, k: KnobHandle, dim: DimIdx, view: ViewId) -> Result<TypedValue> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        let time = self.time_of(&knob);
        self.value_of(&knob, dv, time, true, 0)
    }

    /// Value at `time`, from the animation when the channel has keys.
    pub fn get_value_at_time(
        &self,
        k: KnobHandle,
        time: Time,
        dim: DimIdx,
        view: ViewId,
    ) -> Result<TypedValue> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        self.value_of(&knob, dv, time, false, 0)
    }

    fn accept(&self, knob: &Knob, value: TypedValue) -> Result<TypedValue> {
        let target = knob.kind.value_kind();
        match coerce(&value, target) {
            Some(v) => Ok(v),
            None => {
                debug_assert!(
                    false,
                    "{} value written to {} knob '{}'",
                    value.kind(),
                    target,
                    knob.name
                );
                Err(KnobError::KindMismatch {
                    expected: target,
                    found: value.kind(),
                })
            }
        }
    }

    fn auto_key_time(&self, knob: &Knob, dv: DimView, loading: bool, time: Time) -> Option<Time> {
        if loading || !knob.animation_enabled() {
            return None;
        }
        let keyed = match self.config.auto_key {
            AutoKeyPolicy::Always => true,
            AutoKeyPolicy::WhenAnimated => read(&knob.store).key_count(dv) > 0,
            AutoKeyPolicy::Never => false,
        };
        keyed.then_some(time)
    }

    /// Write a value. On an animated knob this also keys the holder's current time.
    ///
    /// Slaved channels ignore the write and report `NoChange`.
    pub fn set_value(
        &self,
        k: KnobHandle,
        value: impl Into<TypedValue>,
        dim: DimIdx,
        view: ViewId,
        reason: ValueChangedReason,
    ) -> Result<ValueChangeOutcome> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        if lock(&knob.links).is_slaved(dv) {
            return Ok(ValueChangeOutcome::NoChange);
        }
        let value = self.accept(&knob, value.into())?;
        let entry = self.holder(knob.holder)?;
        let loading = entry.loading.load(Ordering::SeqCst);
        let time = entry.hooks.current_time();
        let mode = match self.auto_key_time(&knob, dv, loading, time) {
            Some(t) => SetMode::ScalarAndKey(t),
            None => SetMode::Scalar,
        };
        Ok(self.apply(k, &knob, dv, value, mode, reason, time))
    }

    /// Key `value` at `time` without touching the scalar. Kinds that cannot animate
    /// take the value as a plain `set_value`.
    pub fn set_value_at_time(
        &self,
        k: KnobHandle,
        time: Time,
        value: impl Into<TypedValue>,
        dim: DimIdx,
        view: ViewId,
        reason: ValueChangedReason,
    ) -> Result<ValueChangeOutcome> {
        let knob = self.knob(k)?;
        if !knob.kind.can_animate() {
            return self.set_value(k, value, dim, view, reason);
        }
        if !knob.animation_enabled() {
            return Err(KnobError::AnimationDisabled(knob.name.clone()));
        }
        let dv = knob.resolve(dim, view)?;
        if lock(&knob.links).is_slaved(dv) {
            return Ok(ValueChangeOutcome::NoChange);
        }
        let value = self.accept(&knob, value.into())?;
        Ok(self.apply(k, &knob, dv, value, SetMode::KeyOnly(time), reason, time))
    }

    #[allow(clippy::too_many_arguments)]
    fn apply(
        &self,
        k: KnobHandle,
        knob: &Knob,
        dv: DimView,
        value: TypedValue,
        mode: SetMode,
        reason: ValueChangedReason,
        time: Time,
    ) -> ValueChangeOutcome {
        let (old, old_key, key_time, outcome) = {
            let mut store = write(&knob.store);
            let old = store.value(dv);
            let mut outcome = ValueChangeOutcome::NoChange;
            if !matches!(mode, SetMode::KeyOnly(_)) && store.set_scalar(dv, value.clone()) {
                outcome = ValueChangeOutcome::Modified;
            }
            let key_time = match mode {
                SetMode::Scalar => None,
                SetMode::ScalarAndKey(t) | SetMode::KeyOnly(t) => Some(t),
            };
            let mut old_key = None;
            if let Some(t) = key_time {
                old_key = store.key_value_at(dv, t);
                outcome = outcome.max(store.set_key(dv, t, &value));
            }
            (old, old_key, key_time, outcome)
        };
        if !outcome.changed() {
            return outcome;
        }
        self.record_edit(
            knob.holder,
            k,
            KnobEdit {
                dim: dv.dim,
                view: dv.view,
                old,
                old_key,
                new: value,
                time: key_time.unwrap_or(time),
                set_keyframe: key_time.is_some(),
                keyframe_only: matches!(mode, SetMode::KeyOnly(_)),
                outcome,
                reason,
            },
        );
        self.propagate(k, dv, reason, time, 0);
        outcome
    }

    pub(crate) fn resolve_channel(&self, k: KnobHandle, dim: DimIdx, view: ViewId) -> Result<DimView> {
        self.knob(k)?.resolve(dim, view)
    }

    /// Stored scalar of a channel, ignoring links and animation.
    pub(crate) fn stored_value(&self, k: KnobHandle, dv: DimView) -> Result<TypedValue> {
        let knob = self.knob(k)?;
        let v = read(&knob.store).value(dv);
        Ok(v)
    }

    pub(crate) fn key_value(&self, k: KnobHandle, dv: DimView, time: Time) -> Result<Option<TypedValue>> {
        let knob = self.knob(k)?;
        let v = read(&knob.store).key_value_at(dv, time);
        Ok(v)
    }

    /// Write a scalar without auto-keying or recording. Used by undo.
    pub(crate) fn restore_scalar(
        &self,
        k: KnobHandle,
        dv: DimView,
        value: &TypedValue,
        reason: ValueChangedReason,
    ) -> Result<()> {
        let knob = self.knob(k)?;
        let changed = write(&knob.store).set_scalar(dv, value.clone());
        if changed {
            let time = self.time_of(&knob);
            self.propagate(k, dv, reason, time, 0);
        }
        Ok(())
    }

    /// Put back (`Some`) or remove (`None`) the key at `time` without recording. Used by undo.
    pub(crate) fn restore_key(
        &self,
        k: KnobHandle,
        dv: DimView,
        time: Time,
        value: Option<&TypedValue>,
        reason: ValueChangedReason,
    ) -> Result<()> {
        let knob = self.knob(k)?;
        let changed = {
            let mut store = write(&knob.store);
            match value {
                Some(v) => store.set_key(dv, time, v).changed(),
                None => store.remove_key(dv, time),
            }
        };
        if changed {
            self.propagate(k, dv, reason, time, 0);
        }
        Ok(())
    }

    /// Notify observers of a channel written through a crate-internal path.
    pub(crate) fn notify_channel(
        &self,
        k: KnobHandle,
        dv: DimView,
        reason: ValueChangedReason,
    ) -> Result<()> {
        let knob = self.knob(k)?;
        let time = self.time_of(&knob);
        self.propagate(k, dv, reason, time, 0);
        Ok(())
    }

    /// Replay a recorded edit. Used by redo.
    pub(crate) fn replay_edit(&self, k: KnobHandle, edit: &KnobEdit) -> Result<()> {
        let dv = DimView::new(edit.dim, edit.view);
        if !edit.keyframe_only {
            self.restore_scalar(k, dv, &edit.new, edit.reason)?;
        }
        if edit.set_keyframe {
            self.restore_key(k, dv, edit.time, Some(&edit.new), edit.reason)?;
        }
        Ok(())
    }

    pub fn default_value(&self, k: KnobHandle, dim: DimIdx, view: ViewId) -> Result<TypedValue> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        let v = read(&knob.store).default_value(dv);
        Ok(v)
    }

    /// Set the default of `dim` on every view, and the current value with it.
    pub fn set_default_value(
        &self,
        k: KnobHandle,
        value: impl Into<TypedValue>,
        dim: DimIdx,
    ) -> Result<()> {
        let knob = self.knob(k)?;
        knob.check_dim(dim)?;
        let value = self.accept(&knob, value.into())?;
        let views = knob.views();
        {
            let mut store = write(&knob.store);
            for view in &views {
                let dv = DimView::new(dim, *view);
                store.set_default(dv, value.clone());
                store.set_scalar(dv, value.clone());
            }
        }
        let time = self.time_of(&knob);
        for view in views {
            self.propagate(
                k,
                DimView::new(dim, view),
                ValueChangedReason::RestoreDefault,
                time,
                0,
            );
        }
        Ok(())
    }

    /// Drop the channel's animation and expression and restore its default value.
    /// Observers are always notified, even when nothing changed.
    pub fn reset_to_default(&self, k: KnobHandle, dim: DimIdx, view: ViewId) -> Result<()> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        {
            let _serial = lock(&self.link_lock);
            let mut links = lock(&knob.links);
            if let Some(Binding::Expression(_)) = links.bindings.get(&dv) {
                links.bindings.remove(&dv);
            }
        }
        {
            let mut store = write(&knob.store);
            store.clear_animation(dv);
            let default = store.default_value(dv);
            store.set_scalar(dv, default);
        }
        let time = self.time_of(&knob);
        self.propagate(k, dv, ValueChangedReason::ProjectLoading, time, 0);
        Ok(())
    }

    /// Remove the key at `time`. Returns whether one existed.
    pub fn delete_value_at_time(
        &self,
        k: KnobHandle,
        time: Time,
        dim: DimIdx,
        view: ViewId,
        reason: ValueChangedReason,
    ) -> Result<bool> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        let removed = write(&knob.store).remove_key(dv, time);
        if removed {
            self.propagate(k, dv, reason, time, 0);
        }
        Ok(removed)
    }

    /// Move the keys at `times` through `warp` and return their new times.
    /// Nothing moves when a time has no key or a key would land on another one.
    pub fn warp_values_at_time(
        &self,
        k: KnobHandle,
        times: &[Time],
        warp: &KeyWarp,
        dim: DimIdx,
        view: ViewId,
        reason: ValueChangedReason,
    ) -> Result<Vec<Time>> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        if warp.is_identity() || times.is_empty() {
            return Ok(times.to_vec());
        }
        let moved = write(&knob.store).warp_keys(dv, times, warp)?;
        log::debug!("{}: moved {} key(s) on {dv:?}", knob.name, moved.len());
        let time = self.time_of(&knob);
        self.propagate(k, dv, reason, time, 0);
        Ok(moved)
    }

    /// Retime the key at `from` to `to`. Fails when there is no key at `from` or a key
    /// already sits at `to`.
    pub fn move_value_at_time(
        &self,
        k: KnobHandle,
        from: Time,
        to: Time,
        dim: DimIdx,
        view: ViewId,
        reason: ValueChangedReason,
    ) -> Result<()> {
        let warp = KeyWarp::offset(to - from, 0.0);
        self.warp_values_at_time(k, &[from], &warp, dim, view, reason)
            .map(|_| ())
    }

    /// Whether any channel of `dim` (every dimension when `None`) differs from a
    /// freshly created knob: keys, a link or expression, or a value off its default.
    pub fn has_modifications(&self, k: KnobHandle, dim: Option<DimIdx>) -> Result<bool> {
        let knob = self.knob(k)?;
        if let Some(d) = dim {
            knob.check_dim(d)?;
        }
        let channels: Vec<DimView> = knob
            .channels()
            .into_iter()
            .filter(|dv| dim.map_or(true, |d| dv.dim == d))
            .collect();
        {
            let links = lock(&knob.links);
            let bound = channels.iter().any(|dv| {
                !matches!(links.bindings.get(dv), None | Some(Binding::Unbound))
            });
            if bound || links.pending.iter().any(|p| channels.contains(&p.channel())) {
                return Ok(true);
            }
        }
        let store = read(&knob.store);
        let modified = channels
            .iter()
            .any(|dv| store.key_count(*dv) > 0 || store.value(*dv) != store.default_value(*dv));
        Ok(modified)
    }

    pub fn remove_animation(
        &self,
        k: KnobHandle,
        dim: DimIdx,
        view: ViewId,
        reason: ValueChangedReason,
    ) -> Result<bool> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        let removed = write(&knob.store).clear_animation(dv);
        if removed {
            let time = self.time_of(&knob);
            self.propagate(k, dv, reason, time, 0);
        }
        Ok(removed)
    }

    /// Numeric keyframes of a channel; empty for string knobs.
    pub fn keyframes(&self, k: KnobHandle, dim: DimIdx, view: ViewId) -> Result<Vec<KeyFrame>> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        let store = read(&knob.store);
        Ok(store
            .curve(dv)
            .map(|c| c.keyframes().to_vec())
            .unwrap_or_default())
    }

    pub fn string_keys(&self, k: KnobHandle, dim: DimIdx, view: ViewId) -> Result<Vec<StringKey>> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        let store = read(&knob.store);
        Ok(store
            .strings(dv)
            .map(|s| s.keys().to_vec())
            .unwrap_or_default())
    }

    pub fn keyframe_count(&self, k: KnobHandle, dim: DimIdx, view: ViewId) -> Result<usize> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        let n = read(&knob.store).key_count(dv);
        Ok(n)
    }

    pub fn is_animated(&self, k: KnobHandle, dim: DimIdx, view: ViewId) -> Result<bool> {
        Ok(self.keyframe_count(k, dim, view)? > 0)
    }

    pub fn set_interpolation_at_time(
        &self,
        k: KnobHandle,
        time: Time,
        interpolation: Interpolation,
        dim: DimIdx,
        view: ViewId,
    ) -> Result<bool> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        let changed = write(&knob.store).set_interpolation_at(dv, time, interpolation);
        if changed {
            self.propagate(k, dv, ValueChangedReason::UserEdited, time, 0);
        }
        Ok(changed)
    }

    /// Integral of the channel over `[t1, t2]`; a constant channel integrates its scalar.
    pub fn get_integrate_from_time_to_time(
        &self,
        k: KnobHandle,
        t1: Time,
        t2: Time,
        dim: DimIdx,
        view: ViewId,
    ) -> Result<f64> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        let store = read(&knob.store);
        match store.curve(dv).filter(|c| !c.is_empty()) {
            Some(curve) => Ok(curve.integrate(t1, t2)),
            None => Ok(store.value(dv).as_f64().unwrap_or(0.0) * (t2 - t1)),
        }
    }

    pub fn get_derivative_at_time(
        &self,
        k: KnobHandle,
        time: Time,
        dim: DimIdx,
        view: ViewId,
    ) -> Result<f64> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        let store = read(&knob.store);
        Ok(store
            .curve(dv)
            .filter(|c| !c.is_empty())
            .map_or(0.0, |c| c.derivative(time)))
    }

    /// Select a choice entry by its label.
    pub fn set_choice_by_label(
        &self,
        k: KnobHandle,
        label: &str,
        view: ViewId,
        reason: ValueChangedReason,
    ) -> Result<ValueChangeOutcome> {
        let knob = self.knob(k)?;
        let index = match &read(&knob.meta).extra {
            KnobExtra::Choice { entries, .. } => entries.iter().position(|e| e == label),
            _ => None,
        };
        let index = index.ok_or_else(|| KnobError::UnknownChoice {
            knob: knob.name.clone(),
            label: label.to_string(),
        })?;
        self.set_value(k, TypedValue::Int(index as i64), 0, view, reason)
    }

    /// Label of the selected choice entry, if the index is in range.
    pub fn active_choice_label(&self, k: KnobHandle, view: ViewId) -> Result<Option<String>> {
        let index = self.get_value(k, 0, view)?.as_i64();
        let knob = self.knob(k)?;
        let meta = read(&knob.meta);
        Ok(match (&meta.extra, index) {
            (KnobExtra::Choice { entries, .. }, Some(i)) if i >= 0 => {
                entries.get(i as usize).cloned()
            }
            _ => None,
        })
    }

    /// Storage kind of the knob's values.
    pub fn value_kind(&self, k: KnobHandle) -> Result<ValueKind> {
        Ok(self.knob(k)?.kind.value_kind())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dial_api_core::KnobKind;

    use super::*;
    use crate::holder::BasicHolder;
    use crate::knob::KnobSpec;

    fn doc_with(spec: KnobSpec) -> (Document, Arc<BasicHolder>, KnobHandle) {
        let doc = Document::new();
        let hooks = Arc::new(BasicHolder::new());
        let node = doc.create_holder("Node1", hooks.clone()).unwrap();
        let k = doc.create_knob(node, spec).unwrap();
        (doc, hooks, k)
    }

    #[test]
    fn numeric_writes_are_coerced() {
        let (doc, _, k) = doc_with(KnobSpec::new("count", KnobKind::Int));
        doc.set_value(k, 2.6, 0, ViewId::MAIN, ValueChangedReason::UserEdited)
            .unwrap();
        assert_eq!(doc.get_value(k, 0, ViewId::MAIN).unwrap(), TypedValue::Int(3));
    }

    #[test]
    fn auto_key_at_holder_time() {
        let (doc, hooks, k) = doc_with(KnobSpec::new("size", KnobKind::Double).animated(true));
        hooks.set_time(7.0);
        let outcome = doc
            .set_value(k, 1.5, 0, ViewId::MAIN, ValueChangedReason::UserEdited)
            .unwrap();
        assert_eq!(outcome, ValueChangeOutcome::KeyframeAdded);
        let keys = doc.keyframes(k, 0, ViewId::MAIN).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].time, 7.0);
    }

    #[test]
    fn animation_disabled_rejects_keys() {
        let (doc, _, k) = doc_with(KnobSpec::new("size", KnobKind::Double));
        assert!(matches!(
            doc.set_value_at_time(k, 1.0, 2.0, 0, ViewId::MAIN, ValueChangedReason::UserEdited),
            Err(KnobError::AnimationDisabled(_))
        ));
    }

    #[test]
    fn paths_take_timed_writes_as_plain_values() {
        let (doc, _, k) = doc_with(KnobSpec::new("path", KnobKind::Path));
        let outcome = doc
            .set_value_at_time(k, 3.0, "/tmp", 0, ViewId::MAIN, ValueChangedReason::UserEdited)
            .unwrap();
        assert_eq!(outcome, ValueChangeOutcome::Modified);
        assert_eq!(doc.keyframe_count(k, 0, ViewId::MAIN).unwrap(), 0);
    }

    #[test]
    fn constant_channel_integrates_scalar() {
        let (doc, _, k) = doc_with(KnobSpec::new("gain", KnobKind::Double).default_value(2.0));
        let area = doc
            .get_integrate_from_time_to_time(k, 0.0, 5.0, 0, ViewId::MAIN)
            .unwrap();
        assert!((area - 10.0).abs() < 1e-9);
        assert_eq!(doc.get_derivative_at_time(k, 1.0, 0, ViewId::MAIN).unwrap(), 0.0);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic]
    fn string_into_number_is_an_invariant_violation() {
        let (doc, _, k) = doc_with(KnobSpec::new("size", KnobKind::Double));
        let _ = doc.set_value(k, "wide", 0, ViewId::MAIN, ValueChangedReason::UserEdited);
    }
}
