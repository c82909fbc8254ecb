mod common;

use std::sync::{Arc, Mutex};

use common::{knob, node};
use dial_knob_core::{
    Config, Document, KnobChange, KnobHandle, KnobHolder, KnobKind, KnobSpec, MultiEditState,
    TypedValue, ValueChangedReason, ViewId,
};

const MAIN: ViewId = ViewId::MAIN;
const USER: ValueChangedReason = ValueChangedReason::UserEdited;

#[test]
fn bracket_delivers_one_notification_per_channel() {
    let doc = Document::new();
    let (h, hooks) = node(&doc, "Grade1");
    let gain = knob(&doc, h, KnobSpec::new("gain", KnobKind::Double).dimensions(3));
    let mix = knob(&doc, h, KnobSpec::new("mix", KnobKind::Double));

    {
        let _outer = doc.begin_changes(h).unwrap();
        {
            let _inner = doc.begin_changes(h).unwrap();
            for v in [1.0, 2.0, 3.0] {
                doc.set_value(gain, v, 0, MAIN, USER).unwrap();
            }
        }
        doc.set_value(gain, 1.0, 2, MAIN, USER).unwrap();
        doc.set_value(mix, 0.5, 0, MAIN, USER).unwrap();
        assert!(hooks.changes().is_empty());
        assert!(doc.is_in_bracket(h).unwrap());
    }

    assert!(!doc.is_in_bracket(h).unwrap());
    let changes = hooks.changes();
    let seen: Vec<(KnobHandle, u32)> = changes.iter().map(|c| (c.knob, c.dim)).collect();
    assert_eq!(seen, vec![(gain, 0), (gain, 2), (mix, 0)]);
    assert_eq!(*hooks.begins.lock().unwrap(), 1);
    assert_eq!(*hooks.ends.lock().unwrap(), vec![true]);
}

#[test]
fn time_only_batches_are_not_significant() {
    let doc = Document::new();
    let (h, hooks) = node(&doc, "Grade1");
    let gain = knob(&doc, h, KnobSpec::new("gain", KnobKind::Double));
    {
        let _bracket = doc.begin_changes(h).unwrap();
        doc.set_value(gain, 2.0, 0, MAIN, ValueChangedReason::TimeChanged)
            .unwrap();
    }
    assert_eq!(*hooks.ends.lock().unwrap(), vec![false]);
}

/// Holder that clamps `target` to 10 from inside its own change notification.
struct Clamp {
    target: Mutex<Option<KnobHandle>>,
    calls: Mutex<usize>,
}

impl KnobHolder for Clamp {
    fn on_knob_value_changed(&self, doc: &Document, change: &KnobChange) {
        *self.calls.lock().unwrap() += 1;
        if Some(change.knob) != *self.target.lock().unwrap() {
            return;
        }
        let v = doc.get_value(change.knob, change.dim, change.view).unwrap();
        if v.as_f64().unwrap() > 10.0 {
            doc.set_value(change.knob, 10.0, change.dim, change.view, ValueChangedReason::PluginEdited)
                .unwrap();
        }
    }
}

#[test]
fn holders_may_write_the_knob_they_are_told_about() {
    let doc = Document::new();
    let clamp = Arc::new(Clamp {
        target: Mutex::new(None),
        calls: Mutex::new(0),
    });
    let h = doc.create_holder("Clamp1", clamp.clone()).unwrap();
    let k = knob(&doc, h, KnobSpec::new("size", KnobKind::Double));
    *clamp.target.lock().unwrap() = Some(k);

    doc.set_value(k, 25.0, 0, MAIN, USER).unwrap();
    assert_eq!(doc.get_value(k, 0, MAIN).unwrap(), TypedValue::Double(10.0));
    // the nested write does not re-enter the handler
    assert_eq!(*clamp.calls.lock().unwrap(), 1);

    doc.set_value(k, 4.0, 0, MAIN, USER).unwrap();
    assert_eq!(*clamp.calls.lock().unwrap(), 2);
}

#[test]
fn loading_holders_are_not_notified_by_default() {
    let doc = Document::new();
    let (h, hooks) = node(&doc, "Read1");
    let gain = knob(&doc, h, KnobSpec::new("gain", KnobKind::Double).animated(true));
    doc.set_loading_project(h, true).unwrap();
    doc.set_value(gain, 3.0, 0, MAIN, USER).unwrap();
    doc.set_loading_project(h, false).unwrap();
    assert!(hooks.changes().is_empty());
    // no auto-key while loading
    assert_eq!(doc.keyframe_count(gain, 0, MAIN).unwrap(), 0);

    let verbose = Document::with_config(Config {
        notify_on_project_load: true,
        ..Config::default()
    });
    let (h, hooks) = node(&verbose, "Read1");
    let gain = knob(&verbose, h, KnobSpec::new("gain", KnobKind::Double));
    verbose.set_loading_project(h, true).unwrap();
    verbose.set_value(gain, 3.0, 0, MAIN, USER).unwrap();
    assert_eq!(hooks.changes_for(gain), 1);
}

#[test]
fn multi_edit_state_follows_the_guard() {
    let doc = Document::new();
    let (h, _) = node(&doc, "Grade1");
    let gain = knob(&doc, h, KnobSpec::new("gain", KnobKind::Double));
    assert_eq!(doc.multi_edit_state(h).unwrap(), MultiEditState::Off);

    let edits = doc.multiple_edits(h, "Drag gain", true).unwrap();
    assert_eq!(
        doc.multi_edit_state(h).unwrap(),
        MultiEditState::CollectingNewCommand
    );
    doc.set_value(gain, 1.0, 0, MAIN, USER).unwrap();
    assert_eq!(doc.multi_edit_state(h).unwrap(), MultiEditState::Collecting);
    {
        // a nested collection joins the outer one
        let nested = doc.multiple_edits(h, "inner", false).unwrap();
        doc.set_value(gain, 2.0, 0, MAIN, USER).unwrap();
        assert!(nested.finish().is_none());
    }
    let cmd = edits.finish().unwrap();
    assert_eq!(cmd.edit_count(), 2);
    assert_eq!(doc.multi_edit_state(h).unwrap(), MultiEditState::Off);
}

#[test]
fn dropped_collection_discards_the_command() {
    let doc = Document::new();
    let (h, _) = node(&doc, "Grade1");
    let gain = knob(&doc, h, KnobSpec::new("gain", KnobKind::Double));
    {
        let _edits = doc.multiple_edits(h, "Drag gain", false).unwrap();
        doc.set_value(gain, 1.0, 0, MAIN, USER).unwrap();
    }
    assert_eq!(doc.multi_edit_state(h).unwrap(), MultiEditState::Off);
    // the edit itself stays applied
    assert_eq!(doc.get_value(gain, 0, MAIN).unwrap(), TypedValue::Double(1.0));
}

#[test]
fn knob_destroyed_inside_a_bracket_is_skipped() {
    let doc = Document::new();
    let (h, hooks) = node(&doc, "Grade1");
    let gain = knob(&doc, h, KnobSpec::new("gain", KnobKind::Double));
    let mix = knob(&doc, h, KnobSpec::new("mix", KnobKind::Double));
    {
        let _bracket = doc.begin_changes(h).unwrap();
        doc.set_value(gain, 1.0, 0, MAIN, USER).unwrap();
        doc.set_value(mix, 1.0, 0, MAIN, USER).unwrap();
        doc.destroy_knob(gain).unwrap();
    }
    assert_eq!(hooks.changes_for(gain), 0);
    assert_eq!(hooks.changes_for(mix), 1);
}
