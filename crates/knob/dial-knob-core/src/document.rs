//! Document: owns every holder and knob and exposes the knob API.
//!
//! Holders and knobs live in generational arenas. A handle never keeps its entry alive;
//! once destroyed, lookups fail with `StaleHandle`. Each lookup clones the entry's `Arc`
//! and releases the arena lock right away, so no arena lock is held while values are
//! read, written or while holder hooks run.
//!
//! The API is split across modules by concern:
//! - this file: holders, knob creation/lookup, descriptive state
//! - `values`: reads, writes, keyframes, defaults
//! - `links`: master/slave links, expressions, knob destruction
//! - `change`: change brackets, multi-edit collection, notification delivery
//! - `serialization`: records, link restoration, project documents

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use dial_api_core::{DimIdx, HolderHandle, KnobHandle, KnobKind, KnobPath, Time, ViewId};
use dial_curve_core::StringInterpolator;

use crate::arena::Arena;
use crate::change::ChangeState;
use crate::config::Config;
use crate::error::{KnobError, Result};
use crate::expression::{ArithmeticEvaluator, ExpressionEvaluator};
use crate::holder::KnobHolder;
use crate::knob::{Knob, KnobExtra, KnobSpec};
use crate::sync::{lock, read, write};

pub(crate) struct HolderEntry {
    pub name: String,
    pub hooks: Arc<dyn KnobHolder>,
    pub knobs: Mutex<Vec<KnobHandle>>,
    pub change: Mutex<ChangeState>,
    pub loading: AtomicBool,
    pub messages: Mutex<Vec<String>>,
}

pub struct Document {
    pub(crate) config: Config,
    pub(crate) evaluator: Arc<dyn ExpressionEvaluator>,
    holders: RwLock<Arena<Arc<HolderEntry>>>,
    knobs: RwLock<Arena<Arc<Knob>>>,
    /// Serializes link mutations so the cycle check and the commit are atomic.
    pub(crate) link_lock: Mutex<()>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            evaluator: Arc::new(ArithmeticEvaluator),
            holders: RwLock::new(Arena::default()),
            knobs: RwLock::new(Arena::default()),
            link_lock: Mutex::new(()),
        }
    }

    /// Replace the expression evaluator (scripting bridge).
    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn knob(&self, h: KnobHandle) -> Result<Arc<Knob>> {
        read(&self.knobs)
            .get(h.index, h.generation)
            .cloned()
            .ok_or(KnobError::StaleHandle(h))
    }

    pub(crate) fn holder(&self, h: HolderHandle) -> Result<Arc<HolderEntry>> {
        read(&self.holders)
            .get(h.index, h.generation)
            .cloned()
            .ok_or(KnobError::StaleHolder(h))
    }

    // ---- holders -------------------------------------------------------------------------

    pub fn create_holder(
        &self,
        name: impl Into<String>,
        hooks: Arc<dyn KnobHolder>,
    ) -> Result<HolderHandle> {
        let name = name.into();
        let mut holders = write(&self.holders);
        if holders.iter().any(|(_, _, h)| h.name == name) {
            return Err(KnobError::DuplicateName {
                holder: String::from("document"),
                name,
            });
        }
        let (index, generation) = holders.insert(Arc::new(HolderEntry {
            name,
            hooks,
            knobs: Mutex::new(Vec::new()),
            change: Mutex::new(ChangeState::default()),
            loading: AtomicBool::new(false),
            messages: Mutex::new(Vec::new()),
        }));
        Ok(HolderHandle::new(index, generation))
    }

    /// Destroy every knob of the holder (unlinking them first), then the holder.
    pub fn destroy_holder(&self, h: HolderHandle) -> Result<()> {
        let entry = self.holder(h)?;
        let knobs = lock(&entry.knobs).clone();
        for k in knobs {
            if let Err(e) = self.destroy_knob(k) {
                log::debug!("destroy_holder({}): {e}", entry.name);
            }
        }
        write(&self.holders).remove(h.index, h.generation);
        Ok(())
    }

    pub fn holder_name(&self, h: HolderHandle) -> Result<String> {
        Ok(self.holder(h)?.name.clone())
    }

    pub fn find_holder(&self, name: &str) -> Option<HolderHandle> {
        read(&self.holders)
            .iter()
            .find(|(_, _, e)| e.name == name)
            .map(|(i, g, _)| HolderHandle::new(i, g))
    }

    pub fn holders(&self) -> Vec<HolderHandle> {
        read(&self.holders)
            .iter()
            .map(|(i, g, _)| HolderHandle::new(i, g))
            .collect()
    }

    /// Knobs of a holder in creation order.
    pub fn holder_knobs(&self, h: HolderHandle) -> Result<Vec<KnobHandle>> {
        Ok(lock(&self.holder(h)?.knobs).clone())
    }

    pub fn holder_time(&self, h: HolderHandle) -> Result<Time> {
        Ok(self.holder(h)?.hooks.current_time())
    }

    /// While set, edits on the holder's knobs never auto-key and are reported with
    /// `ProjectLoading` semantics.
    pub fn set_loading_project(&self, h: HolderHandle, loading: bool) -> Result<()> {
        self.holder(h)?.loading.store(loading, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_loading_project(&self, h: HolderHandle) -> Result<bool> {
        Ok(self.holder(h)?.loading.load(Ordering::SeqCst))
    }

    /// Record a user-visible message on the holder and forward it to its hooks.
    pub fn report_persistent_message(&self, h: HolderHandle, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        if let Ok(entry) = self.holder(h) {
            lock(&entry.messages).push(message.clone());
            entry.hooks.on_persistent_message(&message);
        }
    }

    pub fn persistent_messages(&self, h: HolderHandle) -> Result<Vec<String>> {
        Ok(lock(&self.holder(h)?.messages).clone())
    }

    pub fn clear_persistent_messages(&self, h: HolderHandle) -> Result<()> {
        lock(&self.holder(h)?.messages).clear();
        Ok(())
    }

    // ---- knobs ---------------------------------------------------------------------------

    pub fn create_knob(&self, holder: HolderHandle, spec: KnobSpec) -> Result<KnobHandle> {
        let entry = self.holder(holder)?;
        if self.find_knob(holder, &spec.name).is_some() {
            return Err(KnobError::DuplicateName {
                holder: entry.name.clone(),
                name: spec.name,
            });
        }
        let knob = Knob::new(holder, spec)?;
        let (index, generation) = write(&self.knobs).insert(Arc::new(knob));
        let handle = KnobHandle::new(index, generation);
        lock(&entry.knobs).push(handle);
        Ok(handle)
    }

    /// Remove the arena entry. Link cleanup happens in `destroy_knob`.
    pub(crate) fn release_knob(&self, k: KnobHandle) -> Option<Arc<Knob>> {
        let knob = write(&self.knobs).remove(k.index, k.generation)?;
        if let Ok(entry) = self.holder(knob.holder) {
            lock(&entry.knobs).retain(|h| *h != k);
        }
        Some(knob)
    }

    pub fn contains_knob(&self, k: KnobHandle) -> bool {
        self.knob(k).is_ok()
    }

    pub fn find_knob(&self, holder: HolderHandle, name: &str) -> Option<KnobHandle> {
        let entry = self.holder(holder).ok()?;
        let knobs = lock(&entry.knobs).clone();
        knobs
            .into_iter()
            .find(|k| self.knob(*k).map(|kn| kn.name == name).unwrap_or(false))
    }

    /// Resolve `Node.knob` style paths.
    pub fn find_knob_by_path(&self, path: &KnobPath) -> Option<KnobHandle> {
        let holder = self.find_holder(&path.node)?;
        self.find_knob(holder, &path.knob)
    }

    pub fn knob_path(&self, k: KnobHandle, dim: Option<DimIdx>) -> Result<KnobPath> {
        let knob = self.knob(k)?;
        let node = self.holder(knob.holder)?.name.clone();
        let mut path = KnobPath::new(node, knob.name.clone());
        path.dimension = dim;
        Ok(path)
    }

    pub fn knob_name(&self, k: KnobHandle) -> Result<String> {
        Ok(self.knob(k)?.name.clone())
    }

    pub fn knob_kind(&self, k: KnobHandle) -> Result<KnobKind> {
        Ok(self.knob(k)?.kind)
    }

    pub fn dimensions(&self, k: KnobHandle) -> Result<u32> {
        Ok(self.knob(k)?.dimensions)
    }

    pub fn knob_holder(&self, k: KnobHandle) -> Result<HolderHandle> {
        Ok(self.knob(k)?.holder)
    }

    pub fn knob_label(&self, k: KnobHandle) -> Result<String> {
        Ok(read(&self.knob(k)?.meta).label.clone())
    }

    pub fn knob_hint(&self, k: KnobHandle) -> Result<String> {
        Ok(read(&self.knob(k)?.meta).hint.clone())
    }

    pub fn views(&self, k: KnobHandle) -> Result<Vec<ViewId>> {
        Ok(self.knob(k)?.views())
    }

    /// Split `view` off the main view: it starts as a copy of the main channels.
    pub fn add_view(&self, k: KnobHandle, view: ViewId) -> Result<bool> {
        let knob = self.knob(k)?;
        {
            let mut meta = write(&knob.meta);
            if meta.views.contains(&view) {
                return Ok(false);
            }
            meta.views.push(view);
        }
        write(&knob.store).split_view(view, knob.dimensions);
        Ok(true)
    }

    /// Fold `view` back into the main view. The main view cannot be removed.
    pub fn remove_view(&self, k: KnobHandle, view: ViewId) -> Result<()> {
        if view == ViewId::MAIN {
            return Err(KnobError::UnknownView(view));
        }
        let knob = self.knob(k)?;
        {
            let mut meta = write(&knob.meta);
            let before = meta.views.len();
            meta.views.retain(|v| *v != view);
            if meta.views.len() == before {
                return Err(KnobError::UnknownView(view));
            }
        }
        write(&knob.store).drop_view(view);
        Ok(())
    }

    pub fn is_enabled(&self, k: KnobHandle, dim: DimIdx) -> Result<bool> {
        let knob = self.knob(k)?;
        knob.check_dim(dim)?;
        let enabled = read(&knob.meta).enabled[dim as usize];
        Ok(enabled)
    }

    pub fn set_enabled(&self, k: KnobHandle, dim: DimIdx, enabled: bool) -> Result<()> {
        let knob = self.knob(k)?;
        knob.check_dim(dim)?;
        write(&knob.meta).enabled[dim as usize] = enabled;
        Ok(())
    }

    pub fn is_secret(&self, k: KnobHandle) -> Result<bool> {
        Ok(read(&self.knob(k)?.meta).secret)
    }

    pub fn set_secret(&self, k: KnobHandle, secret: bool) -> Result<()> {
        write(&self.knob(k)?.meta).secret = secret;
        Ok(())
    }

    pub fn is_animation_enabled(&self, k: KnobHandle) -> Result<bool> {
        Ok(self.knob(k)?.animation_enabled())
    }

    /// Kinds that cannot animate ignore the request and stay disabled.
    pub fn set_animation_enabled(&self, k: KnobHandle, enabled: bool) -> Result<()> {
        let knob = self.knob(k)?;
        write(&knob.meta).animation_enabled = enabled && knob.kind.can_animate();
        Ok(())
    }

    pub fn is_persistent(&self, k: KnobHandle) -> Result<bool> {
        Ok(read(&self.knob(k)?.meta).persistent)
    }

    pub fn is_user_created(&self, k: KnobHandle) -> Result<bool> {
        Ok(read(&self.knob(k)?.meta).user_created)
    }

    pub fn extra(&self, k: KnobHandle) -> Result<KnobExtra> {
        Ok(read(&self.knob(k)?.meta).extra.clone())
    }

    pub fn set_extra(&self, k: KnobHandle, extra: KnobExtra) -> Result<()> {
        write(&self.knob(k)?.meta).extra = extra;
        Ok(())
    }

    /// Install the hook used to sample string animation on this knob.
    pub fn set_string_interpolator(
        &self,
        k: KnobHandle,
        hook: Arc<dyn StringInterpolator>,
    ) -> Result<()> {
        write(&self.knob(k)?.meta).string_hook = hook;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holder::BasicHolder;

    #[test]
    fn handles_go_stale_after_destroy() {
        let doc = Document::new();
        let node = doc
            .create_holder("Blur1", Arc::new(BasicHolder::new()))
            .unwrap();
        let k = doc
            .create_knob(node, KnobSpec::new("size", KnobKind::Double))
            .unwrap();
        assert_eq!(doc.find_knob(node, "size"), Some(k));
        doc.destroy_knob(k).unwrap();
        assert!(!doc.contains_knob(k));
        assert!(matches!(doc.knob_name(k), Err(KnobError::StaleHandle(_))));
        assert!(doc.holder_knobs(node).unwrap().is_empty());
    }

    #[test]
    fn names_are_unique_per_holder() {
        let doc = Document::new();
        let a = doc.create_holder("A", Arc::new(BasicHolder::new())).unwrap();
        let b = doc.create_holder("B", Arc::new(BasicHolder::new())).unwrap();
        doc.create_knob(a, KnobSpec::new("x", KnobKind::Int)).unwrap();
        doc.create_knob(b, KnobSpec::new("x", KnobKind::Int)).unwrap();
        assert!(matches!(
            doc.create_knob(a, KnobSpec::new("x", KnobKind::Int)),
            Err(KnobError::DuplicateName { .. })
        ));
        assert!(matches!(
            doc.create_holder("A", Arc::new(BasicHolder::new())),
            Err(KnobError::DuplicateName { .. })
        ));
    }

    #[test]
    fn zero_dimensions_rejected() {
        let doc = Document::new();
        let a = doc.create_holder("A", Arc::new(BasicHolder::new())).unwrap();
        assert!(matches!(
            doc.create_knob(a, KnobSpec::new("x", KnobKind::Int).dimensions(0)),
            Err(KnobError::NoDimensions)
        ));
    }

    #[test]
    fn main_view_cannot_be_removed() {
        let doc = Document::new();
        let a = doc.create_holder("A", Arc::new(BasicHolder::new())).unwrap();
        let k = doc.create_knob(a, KnobSpec::new("x", KnobKind::Int)).unwrap();
        assert!(doc.remove_view(k, ViewId::MAIN).is_err());
        assert!(doc.add_view(k, ViewId(1)).unwrap());
        assert!(!doc.add_view(k, ViewId(1)).unwrap());
        doc.remove_view(k, ViewId(1)).unwrap();
        assert_eq!(doc.views(k).unwrap(), vec![ViewId::MAIN]);
    }
}
