//! Undo history: a bounded stack of `UndoCommand`s with a redo side.

use uuid::Uuid;

use crate::document::Document;
use crate::undo::UndoCommand;

#[derive(Debug)]
struct Entry {
    id: Uuid,
    command: Box<dyn UndoCommand>,
}

/// Bounded undo/redo history.
///
/// `push` runs the command's `redo` before storing it, so commands that are applied
/// live while being collected treat their first `redo` as a no-op.
#[derive(Debug)]
pub struct UndoStack {
    undo: Vec<Entry>,
    redo: Vec<Entry>,
    limit: usize,
}

impl UndoStack {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// A stack sized by the document's `undo_limit`.
    pub fn for_document(doc: &Document) -> Self {
        Self::new(doc.config().undo_limit)
    }

    /// Apply `command` and record it. The top entry absorbs it when the two merge.
    ///
    /// Returns the id of the entry now holding the edit.
    pub fn push(&mut self, doc: &Document, mut command: Box<dyn UndoCommand>) -> Uuid {
        command.redo(doc);
        self.redo.clear();
        if let Some(top) = self.undo.last_mut() {
            if top.command.merge_with(command.as_ref()) {
                log::trace!("merged '{}' into '{}'", command.name(), top.command.name());
                return top.id;
            }
        }
        let id = Uuid::new_v4();
        self.undo.push(Entry { id, command });
        if self.undo.len() > self.limit {
            let dropped = self.undo.len() - self.limit;
            self.undo.drain(..dropped);
            log::debug!("undo history trimmed by {dropped}");
        }
        id
    }

    /// Undo the most recent entry. Returns false when there is nothing to undo.
    pub fn undo(&mut self, doc: &Document) -> bool {
        let Some(mut entry) = self.undo.pop() else {
            return false;
        };
        entry.command.undo(doc);
        self.redo.push(entry);
        true
    }

    pub fn redo(&mut self, doc: &Document) -> bool {
        let Some(mut entry) = self.redo.pop() else {
            return false;
        };
        entry.command.redo(doc);
        self.undo.push(entry);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_text(&self) -> Option<String> {
        self.undo.last().map(|e| e.command.name())
    }

    pub fn redo_text(&self) -> Option<String> {
        self.redo.last().map(|e| e.command.name())
    }

    /// The command the next `undo` would revert.
    pub fn top(&self) -> Option<&dyn UndoCommand> {
        self.undo.last().map(|e| e.command.as_ref())
    }

    pub fn top_id(&self) -> Option<Uuid> {
        self.undo.last().map(|e| e.id)
    }

    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Forget both sides of the history. Nothing is reverted.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
