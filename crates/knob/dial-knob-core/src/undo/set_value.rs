use std::any::Any;

use dial_api_core::{DimIdx, DimView, HolderHandle, KnobHandle, Time, TypedValue, ViewId};
use dial_curve_core::TIME_EPSILON;

use super::UndoCommand;
use crate::document::Document;
use crate::error::Result;
use crate::value_store::{ValueChangeOutcome, ValueChangedReason};

#[derive(Clone, Debug)]
struct ChannelEdit {
    dv: DimView,
    old: TypedValue,
    new: TypedValue,
    /// Keys created by redo; undo removes them.
    added_keys: Vec<Time>,
    /// Keys overwritten by redo, with the value they had before.
    modified_keys: Vec<(Time, TypedValue)>,
}

fn same_time(a: Time, b: Time) -> bool {
    (a - b).abs() < TIME_EPSILON
}

/// Value edit of one knob on one or more channels.
#[derive(Debug)]
pub struct SetValueCommand {
    knob: KnobHandle,
    knob_name: String,
    holder: HolderHandle,
    channels: Vec<ChannelEdit>,
    reason: ValueChangedReason,
    create_new: bool,
}

impl SetValueCommand {
    pub fn new(
        doc: &Document,
        knob: KnobHandle,
        dim: DimIdx,
        view: ViewId,
        value: impl Into<TypedValue>,
        create_new: bool,
    ) -> Result<Self> {
        Self::with_values(doc, knob, view, vec![(dim, value.into())], create_new)
    }

    /// One command covering several dimensions of the same view.
    pub fn with_values(
        doc: &Document,
        knob: KnobHandle,
        view: ViewId,
        values: Vec<(DimIdx, TypedValue)>,
        create_new: bool,
    ) -> Result<Self> {
        let holder = doc.knob_holder(knob)?;
        let knob_name = doc.knob_name(knob)?;
        let channels = values
            .into_iter()
            .map(|(dim, new)| {
                let dv = doc.resolve_channel(knob, dim, view)?;
                Ok(ChannelEdit {
                    dv,
                    old: doc.stored_value(knob, dv)?,
                    new,
                    added_keys: Vec::new(),
                    modified_keys: Vec::new(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            knob,
            knob_name,
            holder,
            channels,
            reason: ValueChangedReason::UserEdited,
            create_new,
        })
    }

    pub fn with_reason(mut self, reason: ValueChangedReason) -> Self {
        self.reason = reason;
        self
    }

    pub fn knob(&self) -> KnobHandle {
        self.knob
    }

    pub fn is_create_new(&self) -> bool {
        self.create_new
    }

    /// Times of the keys this command will remove on undo, per channel in edit order.
    pub fn added_keys(&self) -> Vec<(DimView, Vec<Time>)> {
        self.channels
            .iter()
            .map(|c| (c.dv, c.added_keys.clone()))
            .collect()
    }

    fn report(&self, doc: &Document, action: &str, e: impl std::fmt::Display) {
        doc.report_persistent_message(
            self.holder,
            format!("{action} '{}' on {}: {e}", self.name(), self.knob_name),
        );
    }
}

impl UndoCommand for SetValueCommand {
    fn name(&self) -> String {
        format!("Set {}", self.knob_name)
    }

    fn redo(&mut self, doc: &Document) {
        let time = doc.holder_time(self.holder).unwrap_or(0.0);
        let _bracket = doc.begin_changes(self.holder).ok();
        let knob = self.knob;
        let reason = self.reason;
        let mut failures = Vec::new();
        for ch in &mut self.channels {
            ch.added_keys.clear();
            ch.modified_keys.clear();
            let prior_key = doc.key_value(knob, ch.dv, time).ok().flatten();
            match doc.set_value(knob, ch.new.clone(), ch.dv.dim, ch.dv.view, reason) {
                Ok(ValueChangeOutcome::KeyframeAdded) => ch.added_keys.push(time),
                Ok(ValueChangeOutcome::KeyframeModified) => {
                    if let Some(v) = prior_key {
                        ch.modified_keys.push((time, v));
                    }
                }
                Ok(_) => {}
                Err(e) => failures.push(e),
            }
        }
        for e in failures {
            self.report(doc, "redo", e);
        }
    }

    fn undo(&mut self, doc: &Document) {
        let _bracket = doc.begin_changes(self.holder).ok();
        let mut failures = Vec::new();
        for ch in self.channels.iter().rev() {
            for t in &ch.added_keys {
                if let Err(e) = doc.restore_key(self.knob, ch.dv, *t, None, self.reason) {
                    failures.push(e);
                }
            }
            for (t, v) in ch.modified_keys.iter().rev() {
                if let Err(e) = doc.restore_key(self.knob, ch.dv, *t, Some(v), self.reason) {
                    failures.push(e);
                }
            }
            if let Err(e) = doc.restore_scalar(self.knob, ch.dv, &ch.old, self.reason) {
                failures.push(e);
            }
        }
        for e in failures {
            self.report(doc, "undo", e);
        }
    }

    fn merge_with(&mut self, newer: &dyn UndoCommand) -> bool {
        let Some(newer) = newer.as_any().downcast_ref::<SetValueCommand>() else {
            return false;
        };
        if newer.knob != self.knob
            || newer.create_new
            || newer.channels.len() != self.channels.len()
            || !newer
                .channels
                .iter()
                .all(|n| self.channels.iter().any(|c| c.dv == n.dv))
        {
            return false;
        }
        for theirs in &newer.channels {
            let Some(mine) = self.channels.iter_mut().find(|c| c.dv == theirs.dv) else {
                continue;
            };
            mine.new = theirs.new.clone();
            for t in &theirs.added_keys {
                if !mine.added_keys.iter().any(|m| same_time(*m, *t)) {
                    mine.added_keys.push(*t);
                }
            }
            for (t, v) in &theirs.modified_keys {
                let known = mine.added_keys.iter().any(|m| same_time(*m, *t))
                    || mine.modified_keys.iter().any(|(m, _)| same_time(*m, *t));
                if !known {
                    mine.modified_keys.push((*t, v.clone()));
                }
            }
        }
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
