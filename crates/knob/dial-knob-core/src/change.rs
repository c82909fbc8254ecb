//! Change brackets, multi-edit collection and notification delivery.
//!
//! Per holder state machine:
//!
//! ```text
//!   Off --multiple_edits(create_new)--> CollectingNewCommand --first edit--> Collecting
//!   Off --multiple_edits(!create_new)-> Collecting
//!   Collecting / CollectingNewCommand --finish / drop--> Off
//! ```
//!
//! Brackets nest; only the outermost `begin_changes`/`end_changes` reach the holder, and
//! notifications raised inside a bracket are queued (one per knob, dimension and view)
//! and delivered when the outermost guard drops.

use std::sync::atomic::Ordering;

use dial_api_core::{DimIdx, DimView, HolderHandle, KnobHandle, Time, ViewId};
use hashbrown::HashSet;
use indexmap::IndexMap;

use crate::document::{Document, HolderEntry};
use crate::error::Result;
use crate::holder::KnobChange;
use crate::links::SlaveLink;
use crate::sync::lock;
use crate::value_store::ValueChangedReason;
use crate::undo::{KnobEdit, MultipleKnobEditsCommand, UndoCommand};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum MultiEditState {
    #[default]
    Off,
    CollectingNewCommand,
    Collecting,
}

#[derive(Default)]
pub(crate) struct ChangeState {
    depth: u32,
    pending: IndexMap<(KnobHandle, DimIdx, ViewId), KnobChange>,
    significant: bool,
    multi: MultiEditState,
    multi_name: String,
    collected: Option<MultipleKnobEditsCommand>,
    /// Knobs whose notification is currently being delivered.
    notifying: HashSet<KnobHandle>,
}

/// Scope of a `begin_changes` bracket. Dropping it ends the bracket.
#[must_use = "the bracket ends as soon as the guard is dropped"]
pub struct ChangesGuard<'a> {
    doc: &'a Document,
    holder: HolderHandle,
}

impl Drop for ChangesGuard<'_> {
    fn drop(&mut self) {
        self.doc.end_changes(self.holder);
    }
}

/// Scope of a multi-edit collection: every edit made on the holder's knobs until
/// `finish` is recorded into one `MultipleKnobEditsCommand`.
#[must_use = "edits are only collected while the guard is alive"]
pub struct MultipleEdits<'a> {
    doc: &'a Document,
    holder: HolderHandle,
    /// False for a nested scope that joined an already collecting holder.
    owner: bool,
    closed: bool,
    _bracket: ChangesGuard<'a>,
}

impl MultipleEdits<'_> {
    /// Stop collecting and hand over the command, if any edit was recorded.
    /// Queued notifications are delivered when the guard goes away.
    pub fn finish(mut self) -> Option<MultipleKnobEditsCommand> {
        self.close()
    }

    fn close(&mut self) -> Option<MultipleKnobEditsCommand> {
        if self.closed || !self.owner {
            self.closed = true;
            return None;
        }
        self.closed = true;
        let entry = self.doc.holder(self.holder).ok()?;
        let mut st = lock(&entry.change);
        st.multi = MultiEditState::Off;
        st.collected.take()
    }
}

impl Drop for MultipleEdits<'_> {
    fn drop(&mut self) {
        if let Some(cmd) = self.close() {
            log::debug!("discarding unfinished multi-edit '{}'", cmd.name());
        }
    }
}

/// Removes a knob from the notifying set when its delivery ends, even on panic.
struct Delivering<'a> {
    entry: &'a HolderEntry,
    knob: KnobHandle,
}

impl Drop for Delivering<'_> {
    fn drop(&mut self) {
        lock(&self.entry.change).notifying.remove(&self.knob);
    }
}

impl Document {
    /// Open a change bracket on `holder`.
    pub fn begin_changes(&self, holder: HolderHandle) -> Result<ChangesGuard<'_>> {
        let entry = self.holder(holder)?;
        let outermost = {
            let mut st = lock(&entry.change);
            st.depth += 1;
            st.depth == 1
        };
        if outermost {
            entry.hooks.begin_changes();
        }
        Ok(ChangesGuard { doc: self, holder })
    }

    fn end_changes(&self, holder: HolderHandle) {
        // the holder may have been destroyed inside the bracket
        let Ok(entry) = self.holder(holder) else {
            return;
        };
        let (batch, significant) = {
            let mut st = lock(&entry.change);
            st.depth = st.depth.saturating_sub(1);
            if st.depth > 0 {
                return;
            }
            (
                std::mem::take(&mut st.pending),
                std::mem::take(&mut st.significant),
            )
        };
        for change in batch.values() {
            if self.contains_knob(change.knob) {
                self.deliver(&entry, change);
            }
        }
        entry.hooks.end_changes(significant);
    }

    pub fn is_in_bracket(&self, holder: HolderHandle) -> Result<bool> {
        Ok(lock(&self.holder(holder)?.change).depth > 0)
    }

    /// Start collecting edits on `holder` into a single undoable command.
    ///
    /// With `create_new` the collected command only merges into the previous one on the
    /// undo stack when both cover the same knobs. A nested call while collecting joins
    /// the outer collection.
    pub fn multiple_edits(
        &self,
        holder: HolderHandle,
        name: impl Into<String>,
        create_new: bool,
    ) -> Result<MultipleEdits<'_>> {
        let bracket = self.begin_changes(holder)?;
        let entry = self.holder(holder)?;
        let owner = {
            let mut st = lock(&entry.change);
            if st.multi == MultiEditState::Off {
                st.multi = if create_new {
                    MultiEditState::CollectingNewCommand
                } else {
                    MultiEditState::Collecting
                };
                st.multi_name = name.into();
                st.collected = None;
                true
            } else {
                false
            }
        };
        Ok(MultipleEdits {
            doc: self,
            holder,
            owner,
            closed: false,
            _bracket: bracket,
        })
    }

    pub fn multi_edit_state(&self, holder: HolderHandle) -> Result<MultiEditState> {
        Ok(lock(&self.holder(holder)?.change).multi)
    }

    /// Append an applied edit to the holder's collection, if one is open.
    pub(crate) fn record_edit(&self, holder: HolderHandle, knob: KnobHandle, edit: KnobEdit) {
        let Ok(entry) = self.holder(holder) else {
            return;
        };
        let mut st = lock(&entry.change);
        match st.multi {
            MultiEditState::Off => {}
            MultiEditState::CollectingNewCommand => {
                let mut cmd = MultipleKnobEditsCommand::new(
                    holder,
                    entry.name.clone(),
                    st.multi_name.clone(),
                    true,
                );
                cmd.push(knob, edit);
                st.collected = Some(cmd);
                st.multi = MultiEditState::Collecting;
            }
            MultiEditState::Collecting => {
                let name = st.multi_name.clone();
                st.collected
                    .get_or_insert_with(|| {
                        MultipleKnobEditsCommand::new(holder, entry.name.clone(), name, false)
                    })
                    .push(knob, edit);
            }
        }
    }

    /// Queue or deliver a change notification to the knob's holder.
    pub(crate) fn notify(&self, holder: HolderHandle, change: KnobChange) {
        let Ok(entry) = self.holder(holder) else {
            return;
        };
        {
            let mut st = lock(&entry.change);
            if st.depth > 0 {
                st.significant |= change.reason.is_significant();
                st.pending
                    .insert((change.knob, change.dim, change.view), change);
                return;
            }
            if st.notifying.contains(&change.knob) {
                return;
            }
        }
        self.deliver(&entry, &change);
    }

    /// Notify the knob's holder about a channel change, then refresh and notify every
    /// channel slaved to it, recursively.
    ///
    /// Holders loading a project are not notified unless the document is configured to.
    pub(crate) fn propagate(
        &self,
        k: KnobHandle,
        dv: DimView,
        reason: ValueChangedReason,
        time: Time,
        depth: u32,
    ) {
        if depth > self.config.max_link_depth {
            log::warn!("link chain deeper than {} at {k}", self.config.max_link_depth);
            return;
        }
        let Ok(knob) = self.knob(k) else {
            return;
        };
        let suppressed = self
            .holder(knob.holder)
            .map(|e| e.loading.load(Ordering::SeqCst) && !self.config.notify_on_project_load)
            .unwrap_or(true);
        if !suppressed {
            self.notify(
                knob.holder,
                KnobChange {
                    knob: k,
                    dim: dv.dim,
                    view: dv.view,
                    reason,
                    time,
                },
            );
        }
        let slaves: Vec<SlaveLink> = lock(&knob.links)
            .slaves
            .iter()
            .filter(|s| s.master_dv == dv)
            .copied()
            .collect();
        for s in slaves {
            let Ok(slave) = self.knob(s.slave) else {
                continue;
            };
            let slave_time = self.time_of(&slave);
            if let Ok(v) = self.value_of(&slave, s.slave_dv, slave_time, true, 0) {
                lock(&slave.links).display_cache.insert(s.slave_dv, v);
            }
            self.propagate(
                s.slave,
                s.slave_dv,
                ValueChangedReason::SlaveRefresh,
                slave_time,
                depth + 1,
            );
        }
    }

    fn deliver(&self, entry: &HolderEntry, change: &KnobChange) {
        if !lock(&entry.change).notifying.insert(change.knob) {
            return;
        }
        let _delivering = Delivering {
            entry,
            knob: change.knob,
        };
        entry.hooks.on_knob_value_changed(self, change);
    }
}
