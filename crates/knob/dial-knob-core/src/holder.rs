//! Holder callbacks: the only way the core talks back to nodes and projects.

use std::sync::Mutex;

use dial_api_core::{DimIdx, KnobHandle, Time, ViewId};

use crate::document::Document;
use crate::value_store::ValueChangedReason;

/// One delivered change notification.
#[derive(Clone, Debug, PartialEq)]
pub struct KnobChange {
    pub knob: KnobHandle,
    pub dim: DimIdx,
    pub view: ViewId,
    pub reason: ValueChangedReason,
    pub time: Time,
}

/// Hooks implemented by whatever owns a set of knobs (an effect node, the project).
///
/// Every hook is invoked with no internal lock held, so implementations may call back
/// into the `Document`, including `set_value` on the knob being reported.
pub trait KnobHolder: Send + Sync {
    /// Outermost `begin_changes` bracket opened.
    fn begin_changes(&self) {}

    /// Outermost bracket closed after its batch was delivered.
    fn end_changes(&self, _significant: bool) {}

    fn on_knob_value_changed(&self, _doc: &Document, _change: &KnobChange) {}

    fn current_time(&self) -> Time {
        0.0
    }

    fn on_persistent_message(&self, _message: &str) {}
}

/// Holder with a settable current time and no reactions.
#[derive(Debug, Default)]
pub struct BasicHolder {
    time: Mutex<Time>,
}

impl BasicHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_time(time: Time) -> Self {
        Self {
            time: Mutex::new(time),
        }
    }

    pub fn set_time(&self, time: Time) {
        let mut guard = self.time.lock().unwrap_or_else(|e| e.into_inner());
        *guard = time;
    }
}

impl KnobHolder for BasicHolder {
    fn current_time(&self) -> Time {
        *self.time.lock().unwrap_or_else(|e| e.into_inner())
    }
}
