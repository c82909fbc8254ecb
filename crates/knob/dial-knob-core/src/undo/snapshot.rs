//! Commands that undo by replaying full knob records.

use std::any::Any;

use dial_api_core::{DimIdx, KnobHandle, ViewId};

use super::UndoCommand;
use crate::document::Document;
use crate::error::{KnobError, LinkError, Result};
use crate::expression::ExpressionLanguage;
use crate::serialization::KnobRecord;
use crate::value_store::ValueChangedReason;

type Snapshot = Vec<(KnobHandle, KnobRecord)>;

fn capture(doc: &Document, knobs: &[KnobHandle]) -> Result<Snapshot> {
    knobs
        .iter()
        .map(|&k| Ok((k, doc.to_serialization(k)?)))
        .collect()
}

fn report(doc: &Document, k: KnobHandle, action: &str, name: &str, e: impl std::fmt::Display) {
    match doc.knob_holder(k) {
        Ok(h) => doc.report_persistent_message(h, format!("{action} '{name}': {e}")),
        Err(_) => log::warn!("{action} '{name}' on {k}: {e}"),
    }
}

/// Put every knob back into its recorded state, then re-create its links.
fn replay(doc: &Document, snapshot: &Snapshot, action: &str, name: &str) {
    for (k, record) in snapshot {
        let result = doc
            .knob(*k)
            .map_err(Into::into)
            .and_then(|knob| doc.load_record(&knob, *k, record, ValueChangedReason::UserEdited));
        if let Err(e) = result {
            report(doc, *k, action, name, e);
        }
    }
    let knobs: Vec<KnobHandle> = snapshot.iter().map(|(k, _)| *k).collect();
    if let Err(e) = doc.restore_links(&knobs) {
        log::warn!("{action} '{name}': {e}");
    }
}

/// Set or clear the expression of one channel.
#[derive(Debug)]
pub struct SetExpressionCommand {
    knob: KnobHandle,
    knob_name: String,
    dim: DimIdx,
    view: ViewId,
    /// `None` clears the expression.
    text: Option<String>,
    language: ExpressionLanguage,
    has_return_var: bool,
    before: Snapshot,
    after: Option<Snapshot>,
}

impl SetExpressionCommand {
    pub fn new(
        doc: &Document,
        knob: KnobHandle,
        dim: DimIdx,
        view: ViewId,
        text: Option<&str>,
        language: ExpressionLanguage,
        has_return_var: bool,
    ) -> Result<Self> {
        doc.resolve_channel(knob, dim, view)?;
        Ok(Self {
            knob,
            knob_name: doc.knob_name(knob)?,
            dim,
            view,
            text: text.map(str::to_string),
            language,
            has_return_var,
            before: capture(doc, &[knob])?,
            after: None,
        })
    }
}

impl UndoCommand for SetExpressionCommand {
    fn name(&self) -> String {
        match self.text {
            Some(_) => format!("Set expression on {}", self.knob_name),
            None => format!("Clear expression on {}", self.knob_name),
        }
    }

    fn redo(&mut self, doc: &Document) {
        if let Some(after) = &self.after {
            replay(doc, after, "redo", &self.name());
            return;
        }
        let result = match &self.text {
            Some(text) => doc
                .set_expression(
                    self.knob,
                    self.dim,
                    self.view,
                    text,
                    self.language,
                    self.has_return_var,
                    false,
                )
                .map_err(KnobError::from),
            None => doc.clear_expression(self.knob, self.dim, self.view).map(|_| ()),
        };
        if let Err(e) = result {
            report(doc, self.knob, "redo", &self.name(), e);
        }
        match capture(doc, &[self.knob]) {
            Ok(after) => self.after = Some(after),
            Err(e) => report(doc, self.knob, "redo", &self.name(), e),
        }
    }

    fn undo(&mut self, doc: &Document) {
        replay(doc, &self.before, "undo", &self.name());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PasteMode {
    /// Current value only; the target loses its keys.
    Value,
    /// Value and keys.
    Animation,
    /// Slave the target to the source.
    Link,
}

/// Paste one knob onto another, on one dimension pair or on every shared dimension.
#[derive(Debug)]
pub struct PasteClipboardCommand {
    target: KnobHandle,
    target_name: String,
    source: KnobHandle,
    mode: PasteMode,
    /// `(source dim, target dim)`; `None` pairs every common dimension.
    dims: Option<(DimIdx, DimIdx)>,
    view: ViewId,
    before: Snapshot,
    after: Option<Snapshot>,
}

impl PasteClipboardCommand {
    pub fn new(
        doc: &Document,
        target: KnobHandle,
        source: KnobHandle,
        mode: PasteMode,
        dims: Option<(DimIdx, DimIdx)>,
        view: ViewId,
    ) -> Result<Self> {
        let (tk, sk) = (doc.knob_kind(target)?, doc.knob_kind(source)?);
        match (tk.category(), sk.category()) {
            (Some(a), Some(b)) if a == b => {}
            _ => {
                return Err(LinkError::TypeMismatch {
                    target: tk,
                    master: sk,
                }
                .into())
            }
        }
        if let Some((from, to)) = dims {
            doc.resolve_channel(source, from, view)?;
            doc.resolve_channel(target, to, view)?;
        }
        Ok(Self {
            target,
            target_name: doc.knob_name(target)?,
            source,
            mode,
            dims,
            view,
            before: capture(doc, &[target])?,
            after: None,
        })
    }

    fn pairs(&self, doc: &Document) -> Result<Vec<(DimIdx, DimIdx)>> {
        if let Some(pair) = self.dims {
            return Ok(vec![pair]);
        }
        let shared = doc.dimensions(self.target)?.min(doc.dimensions(self.source)?);
        Ok((0..shared).map(|d| (d, d)).collect())
    }

    fn paste(&self, doc: &Document) -> Result<()> {
        let holder = doc.knob_holder(self.target)?;
        let _bracket = doc.begin_changes(holder)?;
        for (from, to) in self.pairs(doc)? {
            match self.mode {
                PasteMode::Link => {
                    doc.link_to(self.target, to, self.view, self.source, from, self.view)?;
                }
                mode => {
                    let from_dv = doc.resolve_channel(self.source, from, self.view)?;
                    let to_dv = doc.resolve_channel(self.target, to, self.view)?;
                    doc.unlink(self.target, to, self.view, false)?;
                    doc.clear_expression(self.target, to, self.view)?;
                    doc.copy_channel(
                        self.source,
                        from_dv,
                        self.target,
                        to_dv,
                        mode == PasteMode::Animation,
                    )?;
                    doc.notify_channel(self.target, to_dv, ValueChangedReason::UserEdited)?;
                }
            }
        }
        Ok(())
    }
}

impl UndoCommand for PasteClipboardCommand {
    fn name(&self) -> String {
        let what = match self.mode {
            PasteMode::Value => "value",
            PasteMode::Animation => "animation",
            PasteMode::Link => "link",
        };
        format!("Paste {what} on {}", self.target_name)
    }

    fn redo(&mut self, doc: &Document) {
        if let Some(after) = &self.after {
            replay(doc, after, "redo", &self.name());
            return;
        }
        if let Err(e) = self.paste(doc) {
            report(doc, self.target, "redo", &self.name(), e);
        }
        match capture(doc, &[self.target]) {
            Ok(after) => self.after = Some(after),
            Err(e) => report(doc, self.target, "redo", &self.name(), e),
        }
    }

    fn undo(&mut self, doc: &Document) {
        replay(doc, &self.before, "undo", &self.name());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Reset knobs to their defaults, on one dimension or all of them, every view.
#[derive(Debug)]
pub struct RestoreDefaultsCommand {
    knobs: Vec<KnobHandle>,
    dimension: Option<DimIdx>,
    before: Snapshot,
    after: Option<Snapshot>,
}

impl RestoreDefaultsCommand {
    pub fn new(doc: &Document, knobs: Vec<KnobHandle>, dimension: Option<DimIdx>) -> Result<Self> {
        if let Some(dim) = dimension {
            for &k in &knobs {
                doc.resolve_channel(k, dim, ViewId::MAIN)?;
            }
        }
        Ok(Self {
            before: capture(doc, &knobs)?,
            knobs,
            dimension,
            after: None,
        })
    }

    fn reset(&self, doc: &Document, k: KnobHandle) -> Result<()> {
        let dims = match self.dimension {
            Some(d) => vec![d],
            None => (0..doc.dimensions(k)?).collect(),
        };
        for view in doc.views(k)? {
            for &dim in &dims {
                doc.reset_to_default(k, dim, view)?;
            }
        }
        Ok(())
    }
}

impl UndoCommand for RestoreDefaultsCommand {
    fn name(&self) -> String {
        if self.knobs.len() == 1 {
            "Restore default value".to_string()
        } else {
            "Restore default values".to_string()
        }
    }

    fn redo(&mut self, doc: &Document) {
        if let Some(after) = &self.after {
            replay(doc, after, "redo", &self.name());
            return;
        }
        for &k in &self.knobs {
            if let Err(e) = self.reset(doc, k) {
                report(doc, k, "redo", &self.name(), e);
            }
        }
        let live: Vec<KnobHandle> = self
            .knobs
            .iter()
            .copied()
            .filter(|k| doc.contains_knob(*k))
            .collect();
        match capture(doc, &live) {
            Ok(after) => self.after = Some(after),
            Err(e) => log::warn!("redo '{}': {e}", self.name()),
        }
    }

    fn undo(&mut self, doc: &Document) {
        replay(doc, &self.before, "undo", &self.name());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
