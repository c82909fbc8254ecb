//! Dial knob core
//!
//! Typed, multi-dimensional, optionally animated parameters ("knobs") owned by holders
//! inside a `Document`. The crate covers value storage and animation, master/slave
//! links and expressions, batched change notification, undoable edits and versioned
//! project serialization. It has no UI or rendering dependency; holders are reached
//! only through the `KnobHolder` hooks.

mod arena;
mod change;
pub mod config;
mod document;
pub mod error;
pub mod expression;
pub mod history;
mod holder;
mod knob;
mod links;
pub mod serialization;
mod sync;
pub mod undo;
mod value_store;
mod values;

pub use change::{ChangesGuard, MultiEditState, MultipleEdits};
pub use config::{AutoKeyPolicy, Config};
pub use document::Document;
pub use error::{ExpressionError, KnobError, LinkError, Result, SerializationError};
pub use expression::{
    ArithmeticEvaluator, ExpressionBinding, ExpressionContext, ExpressionEvaluator,
    ExpressionLanguage,
};
pub use history::UndoStack;
pub use holder::{BasicHolder, KnobChange, KnobHolder};
pub use knob::{KnobExtra, KnobSpec};
pub use links::{Binding, MasterLink, SlaveLink};
pub use serialization::{
    KnobRecord, LoadIssue, LoadReport, MasterRecord, NodeRecord, ProjectDocument, ValueRecord,
    CURRENT_SCHEMA_VERSION,
};
pub use undo::{
    KnobEdit, MultipleKnobEditsCommand, PasteClipboardCommand, PasteMode,
    RestoreDefaultsCommand, SetExpressionCommand, SetValueCommand, UndoCommand,
};
pub use value_store::{ChannelState, ValueChangeOutcome, ValueChangedReason};

pub use dial_api_core::{
    DimIdx, DimView, HolderHandle, KnobHandle, KnobKind, KnobPath, Time, TypedValue, ValueKind, ViewId,
};
pub use dial_curve_core::{Curve, CurveError, Interpolation, KeyFrame, KeyWarp, StringKey};
