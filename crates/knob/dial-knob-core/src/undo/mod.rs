//! Undoable knob edits.
//!
//! Commands act on a `Document` they do not own. Errors met while undoing or redoing
//! are reported as persistent messages on the affected holder and the command carries
//! on with its remaining work.

use std::any::Any;
use std::fmt;

use crate::document::Document;

mod multiple_edits;
mod set_value;
mod snapshot;

pub use multiple_edits::{KnobEdit, MultipleKnobEditsCommand};
pub use set_value::SetValueCommand;
pub use snapshot::{
    PasteClipboardCommand, PasteMode, RestoreDefaultsCommand, SetExpressionCommand,
};

pub trait UndoCommand: Send + fmt::Debug {
    /// Text shown in undo/redo menus.
    fn name(&self) -> String;

    fn undo(&mut self, doc: &Document);

    fn redo(&mut self, doc: &Document);

    /// Fold `newer` into this command. Returns false when the two cannot merge, in which
    /// case both are kept.
    fn merge_with(&mut self, _newer: &dyn UndoCommand) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}
