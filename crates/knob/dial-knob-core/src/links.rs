//! Master/slave links and expressions.
//!
//! A channel is either unbound, slaved to a channel of another knob, or driven by an
//! expression. Masters keep an explicit list of their slaves so a master edit can
//! refresh and notify every dependent channel.

use dial_api_core::coercion::coerce;
use dial_api_core::{DimIdx, DimView, KnobHandle, TypedValue, ValueKind, ViewId};
use hashbrown::{HashMap, HashSet};

use crate::document::Document;
use crate::error::{ExpressionError, KnobError, LinkError, Result};
use crate::expression::{ExpressionBinding, ExpressionLanguage};
use crate::knob::Knob;
use crate::sync::{lock, read, write};
use crate::value_store::{ChannelState, ValueChangedReason};

/// Channel of another knob that drives a slaved channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MasterLink {
    pub knob: KnobHandle,
    pub dim: DimIdx,
    pub view: ViewId,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Binding {
    #[default]
    Unbound,
    Slaved(MasterLink),
    Expression(ExpressionBinding),
}

/// Registration kept on the master side of a link.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SlaveLink {
    pub slave: KnobHandle,
    pub slave_dv: DimView,
    pub master_dv: DimView,
}

/// Link read from a record, resolved later by `restore_links`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum PendingLink {
    Master {
        dv: DimView,
        node: String,
        knob: String,
        master_dim: DimIdx,
        master_view: ViewId,
    },
    Expression {
        dv: DimView,
        binding: ExpressionBinding,
    },
}

impl PendingLink {
    pub fn channel(&self) -> DimView {
        match self {
            PendingLink::Master { dv, .. } | PendingLink::Expression { dv, .. } => *dv,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct LinkState {
    pub bindings: HashMap<DimView, Binding>,
    pub slaves: Vec<SlaveLink>,
    /// Last master value seen by each slaved channel.
    pub display_cache: HashMap<DimView, TypedValue>,
    pub pending: Vec<PendingLink>,
}

impl LinkState {
    pub fn master(&self, dv: DimView) -> Option<MasterLink> {
        match self.bindings.get(&dv) {
            Some(Binding::Slaved(m)) => Some(*m),
            _ => None,
        }
    }

    pub fn is_slaved(&self, dv: DimView) -> bool {
        self.master(dv).is_some()
    }
}

fn link_dim_error(e: KnobError, k: KnobHandle) -> LinkError {
    match e {
        KnobError::DimensionOutOfRange { dim, dimensions } => {
            LinkError::DimensionOutOfRange { dim, dimensions }
        }
        _ => LinkError::StaleHandle(k),
    }
}

impl Document {
    /// Overwrite `to` on `target` with the effective value of `from` on `source`, and
    /// with its keys when `with_animation` is set. Does not notify.
    pub(crate) fn copy_channel(
        &self,
        source: KnobHandle,
        from: DimView,
        target: KnobHandle,
        to: DimView,
        with_animation: bool,
    ) -> Result<()> {
        let src = self.knob(source)?;
        let dst = self.knob(target)?;
        let time = self.time_of(&src);
        let value = self.value_of(&src, from, time, true, 0)?;
        let kind = dst.kind.value_kind();
        let mut state = if with_animation {
            read(&src.store).channel(from)
        } else {
            ChannelState {
                value: value.clone(),
                curve: None,
                strings: None,
            }
        };
        state.value = coerce(&value, kind).unwrap_or_else(|| read(&dst.store).value(to));
        if kind == ValueKind::String {
            state.curve = None;
        } else {
            state.strings = None;
        }
        write(&dst.store).put_channel(to, state);
        Ok(())
    }

    /// Slave channel `(target_dim, target_view)` of `target` to a channel of `master`.
    ///
    /// On error nothing is modified.
    pub fn link_to(
        &self,
        target: KnobHandle,
        target_dim: DimIdx,
        target_view: ViewId,
        master: KnobHandle,
        master_dim: DimIdx,
        master_view: ViewId,
    ) -> std::result::Result<(), LinkError> {
        let t = self
            .knob(target)
            .map_err(|_| LinkError::StaleHandle(target))?;
        let m = self
            .knob(master)
            .map_err(|_| LinkError::StaleHandle(master))?;
        match (t.kind.category(), m.kind.category()) {
            (Some(a), Some(b)) if a == b => {}
            _ => {
                return Err(LinkError::TypeMismatch {
                    target: t.kind,
                    master: m.kind,
                })
            }
        }
        let tdv = t
            .resolve(target_dim, target_view)
            .map_err(|e| link_dim_error(e, target))?;
        let mdv = m
            .resolve(master_dim, master_view)
            .map_err(|e| link_dim_error(e, master))?;

        {
            let _serial = lock(&self.link_lock);
            if target == master || self.reaches(master, target) {
                return Err(LinkError::Cycle { target, master });
            }
            let link = MasterLink {
                knob: master,
                dim: mdv.dim,
                view: mdv.view,
            };
            let previous = lock(&t.links)
                .bindings
                .insert(tdv, Binding::Slaved(link));
            if let Some(Binding::Slaved(old)) = previous {
                self.unregister_slave(old.knob, target, tdv);
            }
            lock(&m.links).slaves.push(SlaveLink {
                slave: target,
                slave_dv: tdv,
                master_dv: mdv,
            });
        }
        log::debug!("linked {}.{tdv:?} to {}.{mdv:?}", t.name, m.name);

        self.refresh_slave(&t, target, tdv);
        Ok(())
    }

    /// Whether `to` is reachable from `from` by following master links.
    fn reaches(&self, from: KnobHandle, to: KnobHandle) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(k) = stack.pop() {
            if k == to {
                return true;
            }
            if !seen.insert(k) {
                continue;
            }
            let Ok(knob) = self.knob(k) else {
                continue;
            };
            let links = lock(&knob.links);
            stack.extend(links.bindings.values().filter_map(|b| match b {
                Binding::Slaved(m) => Some(m.knob),
                _ => None,
            }));
        }
        false
    }

    fn unregister_slave(&self, master: KnobHandle, slave: KnobHandle, slave_dv: DimView) {
        if let Ok(m) = self.knob(master) {
            lock(&m.links)
                .slaves
                .retain(|s| !(s.slave == slave && s.slave_dv == slave_dv));
        }
    }

    /// Re-read a slaved channel through its link, cache it and notify its holder.
    pub(crate) fn refresh_slave(&self, knob: &Knob, k: KnobHandle, dv: DimView) {
        let time = self.time_of(knob);
        match self.value_of(knob, dv, time, true, 0) {
            Ok(v) => {
                lock(&knob.links).display_cache.insert(dv, v);
            }
            Err(e) => log::debug!("refreshing {}: {e}", knob.name),
        }
        self.propagate(k, dv, ValueChangedReason::SlaveRefresh, time, 0);
    }

    /// Break the link of a slaved channel. With `copy_state` the channel keeps the
    /// master's current value and animation.
    pub fn unlink(&self, k: KnobHandle, dim: DimIdx, view: ViewId, copy_state: bool) -> Result<()> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        let removed = {
            let _serial = lock(&self.link_lock);
            let removed = {
                let mut links = lock(&knob.links);
                let m = links.master(dv);
                if m.is_some() {
                    links.bindings.remove(&dv);
                    links.display_cache.remove(&dv);
                }
                m
            };
            if let Some(m) = removed {
                self.unregister_slave(m.knob, k, dv);
            }
            removed
        };
        let Some(m) = removed else {
            return Ok(());
        };

        if copy_state && self.contains_knob(m.knob) {
            self.copy_channel(m.knob, DimView::new(m.dim, m.view), k, dv, true)?;
        }
        let time = self.time_of(&knob);
        self.propagate(k, dv, ValueChangedReason::PluginEdited, time, 0);
        Ok(())
    }

    pub fn master(&self, k: KnobHandle, dim: DimIdx, view: ViewId) -> Result<Option<MasterLink>> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        let master = lock(&knob.links).master(dv);
        Ok(master)
    }

    /// Channels slaved to `k`, in link order.
    pub fn slaves(&self, k: KnobHandle) -> Result<Vec<SlaveLink>> {
        Ok(lock(&self.knob(k)?.links).slaves.clone())
    }

    pub fn binding(&self, k: KnobHandle, dim: DimIdx, view: ViewId) -> Result<Binding> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        let binding = lock(&knob.links)
            .bindings
            .get(&dv)
            .cloned()
            .unwrap_or_default();
        Ok(binding)
    }

    /// Last value a slaved channel received from its master.
    pub fn cached_display_value(
        &self,
        k: KnobHandle,
        dim: DimIdx,
        view: ViewId,
    ) -> Result<Option<TypedValue>> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        let cached = lock(&knob.links).display_cache.get(&dv).cloned();
        Ok(cached)
    }

    /// Drive a channel with an expression, replacing any link.
    ///
    /// With `fail_if_invalid` an expression the evaluator rejects is refused; otherwise it
    /// is installed with its error recorded and a persistent message is raised.
    #[allow(clippy::too_many_arguments)]
    pub fn set_expression(
        &self,
        k: KnobHandle,
        dim: DimIdx,
        view: ViewId,
        text: &str,
        language: ExpressionLanguage,
        has_return_var: bool,
        fail_if_invalid: bool,
    ) -> std::result::Result<(), ExpressionError> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        let mut binding = ExpressionBinding::new(text, language, has_return_var);
        if let Err(reason) = self.evaluator.validate(&binding) {
            if fail_if_invalid {
                return Err(ExpressionError::Invalid {
                    text: text.to_string(),
                    reason,
                });
            }
            self.report_persistent_message(
                knob.holder,
                format!("{}: invalid expression '{text}': {reason}", knob.name),
            );
            binding.error = Some(reason);
        }
        self.install_binding(&knob, k, dv, Binding::Expression(binding));
        let time = self.time_of(&knob);
        self.propagate(k, dv, ValueChangedReason::PluginEdited, time, 0);
        Ok(())
    }

    /// Replace a channel binding, keeping master registrations consistent.
    pub(crate) fn install_binding(&self, knob: &Knob, k: KnobHandle, dv: DimView, binding: Binding) {
        let _serial = lock(&self.link_lock);
        let previous = {
            let mut links = lock(&knob.links);
            links.display_cache.remove(&dv);
            match binding {
                Binding::Unbound => links.bindings.remove(&dv),
                b => links.bindings.insert(dv, b),
            }
        };
        if let Some(Binding::Slaved(old)) = previous {
            self.unregister_slave(old.knob, k, dv);
        }
    }

    /// Remove the expression of a channel. Returns whether one was installed.
    pub fn clear_expression(&self, k: KnobHandle, dim: DimIdx, view: ViewId) -> Result<bool> {
        let knob = self.knob(k)?;
        let dv = knob.resolve(dim, view)?;
        let removed = {
            let _serial = lock(&self.link_lock);
            let mut links = lock(&knob.links);
            match links.bindings.get(&dv) {
                Some(Binding::Expression(_)) => links.bindings.remove(&dv).is_some(),
                _ => false,
            }
        };
        if removed {
            let time = self.time_of(&knob);
            self.propagate(k, dv, ValueChangedReason::PluginEdited, time, 0);
        }
        Ok(removed)
    }

    pub fn expression(
        &self,
        k: KnobHandle,
        dim: DimIdx,
        view: ViewId,
    ) -> Result<Option<ExpressionBinding>> {
        Ok(match self.binding(k, dim, view)? {
            Binding::Expression(b) => Some(b),
            _ => None,
        })
    }

    /// Text of an expression that reads `master`'s dimension, e.g. `Blur1.size.0`.
    /// Only scripting evaluators resolve such references.
    pub fn make_link_expression(&self, master: KnobHandle, dim: DimIdx) -> Result<String> {
        self.knob(master)?.check_dim(dim)?;
        Ok(self.knob_path(master, Some(dim))?.to_string())
    }

    /// Unlink the knob from its masters, hand its slaves their current state, then
    /// remove it from the document.
    pub fn destroy_knob(&self, k: KnobHandle) -> Result<()> {
        let knob = self.knob(k)?;
        {
            let _serial = lock(&self.link_lock);
            let masters: Vec<(DimView, MasterLink)> = {
                let mut links = lock(&knob.links);
                let masters = links
                    .bindings
                    .iter()
                    .filter_map(|(dv, b)| match b {
                        Binding::Slaved(m) => Some((*dv, *m)),
                        _ => None,
                    })
                    .collect();
                links.bindings.clear();
                masters
            };
            for (dv, m) in masters {
                self.unregister_slave(m.knob, k, dv);
            }
        }
        let slaves = lock(&knob.links).slaves.clone();
        for s in slaves {
            if let Err(e) = self.unlink(s.slave, s.slave_dv.dim, s.slave_dv.view, true) {
                log::debug!("destroying {}: unlinking slave {}: {e}", knob.name, s.slave);
            }
        }
        self.release_knob(k);
        log::debug!("destroyed knob {} ({k})", knob.name);
        Ok(())
    }
}
