use std::any::Any;

use dial_api_core::{DimIdx, DimView, HolderHandle, KnobHandle, Time, TypedValue, ViewId};
use hashbrown::HashSet;
use indexmap::IndexMap;

use super::UndoCommand;
use crate::document::Document;
use crate::error::KnobError;
use crate::value_store::{ValueChangeOutcome, ValueChangedReason};

/// One applied edit, as recorded while a holder collects multiple edits.
#[derive(Clone, Debug, PartialEq)]
pub struct KnobEdit {
    pub dim: DimIdx,
    pub view: ViewId,
    /// Scalar before the edit.
    pub old: TypedValue,
    /// Key value at `time` before the edit, if a key existed there.
    pub old_key: Option<TypedValue>,
    pub new: TypedValue,
    pub time: Time,
    pub set_keyframe: bool,
    /// The edit only keyed `time` and left the scalar untouched.
    pub keyframe_only: bool,
    pub outcome: ValueChangeOutcome,
    pub reason: ValueChangedReason,
}

impl KnobEdit {
    fn dv(&self) -> DimView {
        DimView::new(self.dim, self.view)
    }
}

/// Every edit made on a holder's knobs between `multiple_edits` and `finish`.
///
/// The edits are already applied when the command is handed over, so the first redo
/// does nothing.
#[derive(Debug)]
pub struct MultipleKnobEditsCommand {
    holder: HolderHandle,
    holder_name: String,
    name: String,
    edits: IndexMap<KnobHandle, Vec<KnobEdit>>,
    create_new: bool,
    first_redo_done: bool,
}

impl MultipleKnobEditsCommand {
    pub(crate) fn new(
        holder: HolderHandle,
        holder_name: String,
        name: String,
        create_new: bool,
    ) -> Self {
        Self {
            holder,
            holder_name,
            name,
            edits: IndexMap::new(),
            create_new,
            first_redo_done: false,
        }
    }

    pub(crate) fn push(&mut self, knob: KnobHandle, edit: KnobEdit) {
        self.edits.entry(knob).or_default().push(edit);
    }

    pub fn holder(&self) -> HolderHandle {
        self.holder
    }

    pub fn is_create_new(&self) -> bool {
        self.create_new
    }

    /// Edited knobs in first-edit order.
    pub fn knobs(&self) -> Vec<KnobHandle> {
        self.edits.keys().copied().collect()
    }

    pub fn edits(&self, knob: KnobHandle) -> &[KnobEdit] {
        self.edits.get(&knob).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edit_count(&self) -> usize {
        self.edits.values().map(Vec::len).sum()
    }

    fn same_knobs(&self, other: &Self) -> bool {
        self.edits.len() == other.edits.len()
            && other.edits.keys().all(|k| self.edits.contains_key(k))
    }

    fn report(&self, doc: &Document, action: &str, knob: KnobHandle, e: KnobError) {
        doc.report_persistent_message(
            self.holder,
            format!("{action} '{}' on {knob}: {e}", self.name()),
        );
    }
}

impl UndoCommand for MultipleKnobEditsCommand {
    fn name(&self) -> String {
        format!("{}: {}", self.holder_name, self.name)
    }

    fn undo(&mut self, doc: &Document) {
        let _bracket = doc.begin_changes(self.holder).ok();
        for (knob, edits) in self.edits.iter().rev() {
            let knob = *knob;
            for edit in edits.iter().rev() {
                let result = if edit.outcome == ValueChangeOutcome::KeyframeAdded {
                    doc.restore_key(knob, edit.dv(), edit.time, None, edit.reason)
                } else if edit.set_keyframe {
                    match &edit.old_key {
                        Some(old) => doc.restore_key(knob, edit.dv(), edit.time, Some(old), edit.reason),
                        None => Ok(()),
                    }
                } else {
                    Ok(())
                };
                if let Err(e) = result {
                    self.report(doc, "undo", knob, e);
                }
            }
            // the first edit of a channel holds its value before the whole batch
            let mut restored = HashSet::new();
            for edit in edits {
                if edit.keyframe_only || !restored.insert(edit.dv()) {
                    continue;
                }
                if let Err(e) = doc.restore_scalar(knob, edit.dv(), &edit.old, edit.reason) {
                    self.report(doc, "undo", knob, e);
                }
            }
        }
    }

    fn redo(&mut self, doc: &Document) {
        if !self.first_redo_done {
            self.first_redo_done = true;
            return;
        }
        let _bracket = doc.begin_changes(self.holder).ok();
        for (knob, edits) in &self.edits {
            for edit in edits {
                if let Err(e) = doc.replay_edit(*knob, edit) {
                    self.report(doc, "redo", *knob, e);
                }
            }
        }
    }

    fn merge_with(&mut self, newer: &dyn UndoCommand) -> bool {
        let Some(newer) = newer.as_any().downcast_ref::<MultipleKnobEditsCommand>() else {
            return false;
        };
        if newer.holder != self.holder {
            return false;
        }
        if newer.create_new && !self.same_knobs(newer) {
            return false;
        }
        for (knob, edits) in &newer.edits {
            self.edits
                .entry(*knob)
                .or_default()
                .extend(edits.iter().cloned());
        }
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
