#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use dial_knob_core::{
    Document, HolderHandle, KnobChange, KnobHandle, KnobHolder, KnobSpec, Time,
};

/// Holder that records every hook call.
#[derive(Default)]
pub struct Recorder {
    pub time: Mutex<Time>,
    pub changes: Mutex<Vec<KnobChange>>,
    pub begins: Mutex<usize>,
    pub ends: Mutex<Vec<bool>>,
    pub messages: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn set_time(&self, t: Time) {
        *self.time.lock().unwrap() = t;
    }

    pub fn changes(&self) -> Vec<KnobChange> {
        self.changes.lock().unwrap().clone()
    }

    pub fn changes_for(&self, k: KnobHandle) -> usize {
        self.changes().iter().filter(|c| c.knob == k).count()
    }

    pub fn clear(&self) {
        self.changes.lock().unwrap().clear();
        *self.begins.lock().unwrap() = 0;
        self.ends.lock().unwrap().clear();
    }
}

impl KnobHolder for Recorder {
    fn begin_changes(&self) {
        *self.begins.lock().unwrap() += 1;
    }

    fn end_changes(&self, significant: bool) {
        self.ends.lock().unwrap().push(significant);
    }

    fn on_knob_value_changed(&self, _doc: &Document, change: &KnobChange) {
        self.changes.lock().unwrap().push(change.clone());
    }

    fn current_time(&self) -> Time {
        *self.time.lock().unwrap()
    }

    fn on_persistent_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

pub fn node(doc: &Document, name: &str) -> (HolderHandle, Arc<Recorder>) {
    let hooks = Arc::new(Recorder::default());
    let h = doc.create_holder(name, hooks.clone()).unwrap();
    (h, hooks)
}

pub fn knob(doc: &Document, h: HolderHandle, spec: KnobSpec) -> KnobHandle {
    doc.create_knob(h, spec).unwrap()
}
