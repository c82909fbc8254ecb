mod common;

use common::{knob, node};
use dial_knob_core::{
    CurveError, Document, Interpolation, KeyWarp, KnobError, KnobKind, KnobSpec, TypedValue,
    ValueChangeOutcome, ValueChangedReason, ViewId,
};

const MAIN: ViewId = ViewId::MAIN;
const USER: ValueChangedReason = ValueChangedReason::UserEdited;

#[test]
fn scalar_held_before_first_key_and_survives_a_save() {
    let doc = Document::new();
    let (blur, _) = node(&doc, "Blur1");
    let size = knob(&doc, blur, KnobSpec::new("size", KnobKind::Double).default_value(0.0));

    doc.set_value(size, 2.5, 0, MAIN, USER).unwrap();
    assert_eq!(doc.get_value(size, 0, MAIN).unwrap(), TypedValue::Double(2.5));

    doc.set_animation_enabled(size, true).unwrap();
    let outcome = doc.set_value_at_time(size, 10.0, 4.0, 0, MAIN, USER).unwrap();
    assert_eq!(outcome, ValueChangeOutcome::KeyframeAdded);
    assert_eq!(doc.keyframe_count(size, 0, MAIN).unwrap(), 1);
    assert_eq!(doc.get_value_at_time(size, 5.0, 0, MAIN).unwrap(), TypedValue::Double(2.5));
    assert_eq!(doc.get_value_at_time(size, 10.0, 0, MAIN).unwrap(), TypedValue::Double(4.0));

    let record = doc.to_serialization(size).unwrap();
    let (other, _) = node(&doc, "Blur2");
    let copy = knob(&doc, other, KnobSpec::new("size", KnobKind::Double));
    doc.from_serialization(&record, copy).unwrap();

    let keys = doc.keyframes(copy, 0, MAIN).unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!((keys[0].time, keys[0].value), (10.0, 4.0));
    assert_eq!(doc.get_value_at_time(copy, 5.0, 0, MAIN).unwrap(), TypedValue::Double(2.5));
    assert!(doc.is_animation_enabled(copy).unwrap());
}

#[test]
fn out_of_range_dimension_is_an_error() {
    let doc = Document::new();
    let (h, _) = node(&doc, "Transform1");
    let translate = knob(&doc, h, KnobSpec::new("translate", KnobKind::Double).dimensions(2));
    assert!(matches!(
        doc.set_value(translate, 1.0, 2, MAIN, USER),
        Err(KnobError::DimensionOutOfRange { dim: 2, dimensions: 2 })
    ));
    assert!(matches!(
        doc.get_value(translate, 5, MAIN),
        Err(KnobError::DimensionOutOfRange { .. })
    ));
    // views the knob never split off read the main view
    doc.set_value(translate, 3.0, 1, MAIN, USER).unwrap();
    assert_eq!(doc.get_value(translate, 1, ViewId(3)).unwrap(), TypedValue::Double(3.0));
}

#[test]
fn reset_twice_equals_reset_once() {
    let doc = Document::new();
    let (h, hooks) = node(&doc, "Grade1");
    let gain = knob(
        &doc,
        h,
        KnobSpec::new("gain", KnobKind::Double).default_value(1.0).animated(true),
    );
    hooks.set_time(4.0);
    doc.set_value(gain, 3.0, 0, MAIN, USER).unwrap();
    doc.set_value_at_time(gain, 8.0, 6.0, 0, MAIN, USER).unwrap();

    doc.reset_to_default(gain, 0, MAIN).unwrap();
    let once = doc.to_serialization(gain).unwrap();
    doc.reset_to_default(gain, 0, MAIN).unwrap();
    let twice = doc.to_serialization(gain).unwrap();

    assert_eq!(once, twice);
    assert_eq!(doc.get_value(gain, 0, MAIN).unwrap(), TypedValue::Double(1.0));
    assert!(!doc.is_animated(gain, 0, MAIN).unwrap());
}

#[test]
fn reset_always_notifies() {
    let doc = Document::new();
    let (h, hooks) = node(&doc, "Grade1");
    let gain = knob(&doc, h, KnobSpec::new("gain", KnobKind::Double));
    doc.reset_to_default(gain, 0, MAIN).unwrap();
    doc.reset_to_default(gain, 0, MAIN).unwrap();
    assert_eq!(hooks.changes_for(gain), 2);
}

#[test]
fn unchanged_write_is_no_change_and_silent() {
    let doc = Document::new();
    let (h, hooks) = node(&doc, "Grade1");
    let gain = knob(&doc, h, KnobSpec::new("gain", KnobKind::Double).default_value(1.0));
    assert_eq!(
        doc.set_value(gain, 1.0, 0, MAIN, USER).unwrap(),
        ValueChangeOutcome::NoChange
    );
    assert_eq!(hooks.changes_for(gain), 0);
    assert_eq!(
        doc.set_value(gain, 2.0, 0, MAIN, USER).unwrap(),
        ValueChangeOutcome::Modified
    );
    assert_eq!(hooks.changes_for(gain), 1);
}

#[test]
fn keyframes_can_be_deleted_and_retimed() {
    let doc = Document::new();
    let (h, _) = node(&doc, "Blur1");
    let size = knob(&doc, h, KnobSpec::new("size", KnobKind::Double).animated(true));
    for (t, v) in [(0.0, 0.0), (10.0, 10.0), (20.0, 0.0)] {
        doc.set_value_at_time(size, t, v, 0, MAIN, USER).unwrap();
    }
    assert_eq!(
        doc.set_value_at_time(size, 10.0, 8.0, 0, MAIN, USER).unwrap(),
        ValueChangeOutcome::KeyframeModified
    );
    assert!(doc
        .set_interpolation_at_time(size, 0.0, Interpolation::Constant, 0, MAIN)
        .unwrap());
    assert_eq!(doc.get_value_at_time(size, 5.0, 0, MAIN).unwrap(), TypedValue::Double(0.0));

    assert!(doc.delete_value_at_time(size, 20.0, 0, MAIN, USER).unwrap());
    assert!(!doc.delete_value_at_time(size, 20.0, 0, MAIN, USER).unwrap());
    assert_eq!(doc.keyframe_count(size, 0, MAIN).unwrap(), 2);

    doc.move_value_at_time(size, 10.0, 15.0, 0, MAIN, USER).unwrap();
    assert_eq!(doc.get_value_at_time(size, 15.0, 0, MAIN).unwrap(), TypedValue::Double(8.0));
    assert!(matches!(
        doc.move_value_at_time(size, 0.0, 15.0, 0, MAIN, USER),
        Err(KnobError::Curve(CurveError::KeyCollision { .. }))
    ));
    assert!(matches!(
        doc.move_value_at_time(size, 10.0, 12.0, 0, MAIN, USER),
        Err(KnobError::Curve(CurveError::MissingKey { .. }))
    ));
    let times: Vec<f64> = doc.keyframes(size, 0, MAIN).unwrap().iter().map(|k| k.time).collect();
    assert_eq!(times, vec![0.0, 15.0]);

    let moved = doc
        .warp_values_at_time(size, &[0.0, 15.0], &KeyWarp::scale_time(2.0, 0.0), 0, MAIN, USER)
        .unwrap();
    assert_eq!(moved, vec![0.0, 30.0]);

    assert!(doc.remove_animation(size, 0, MAIN, USER).unwrap());
    assert!(!doc.is_animated(size, 0, MAIN).unwrap());
}

#[test]
fn string_knobs_animate_with_held_keys() {
    let doc = Document::new();
    let (h, _) = node(&doc, "Text1");
    let text = knob(&doc, h, KnobSpec::new("message", KnobKind::String).animated(true));
    doc.set_value(text, "fallback", 0, MAIN, USER).unwrap();
    doc.set_value_at_time(text, 5.0, "hello", 0, MAIN, USER).unwrap();
    doc.set_value_at_time(text, 10.0, "world", 0, MAIN, USER).unwrap();

    assert_eq!(doc.string_keys(text, 0, MAIN).unwrap().len(), 3);
    assert_eq!(
        doc.get_value_at_time(text, 7.0, 0, MAIN).unwrap(),
        TypedValue::String("hello".into())
    );
    assert_eq!(
        doc.get_value_at_time(text, 12.0, 0, MAIN).unwrap(),
        TypedValue::String("world".into())
    );
}

#[test]
fn disabled_animation_reads_the_scalar() {
    let doc = Document::new();
    let (h, hooks) = node(&doc, "Blur1");
    let size = knob(&doc, h, KnobSpec::new("size", KnobKind::Double).animated(true));
    hooks.set_time(0.0);
    doc.set_value_at_time(size, 0.0, 5.0, 0, MAIN, USER).unwrap();
    doc.set_animation_enabled(size, false).unwrap();

    assert_eq!(doc.get_value(size, 0, MAIN).unwrap(), TypedValue::Double(0.0));
    // explicit time reads still see the curve
    assert_eq!(doc.get_value_at_time(size, 0.0, 0, MAIN).unwrap(), TypedValue::Double(5.0));
}

#[test]
fn choice_selected_by_label() {
    let doc = Document::new();
    let (h, _) = node(&doc, "Reformat1");
    let filter = knob(
        &doc,
        h,
        KnobSpec::new("filter", KnobKind::Choice).choices(["impulse", "cubic", "lanczos"]),
    );
    doc.set_choice_by_label(filter, "lanczos", MAIN, USER).unwrap();
    assert_eq!(doc.get_value(filter, 0, MAIN).unwrap(), TypedValue::Int(2));
    assert_eq!(
        doc.active_choice_label(filter, MAIN).unwrap().as_deref(),
        Some("lanczos")
    );
    assert!(matches!(
        doc.set_choice_by_label(filter, "mitchell", MAIN, USER),
        Err(KnobError::UnknownChoice { .. })
    ));
}

#[test]
fn views_split_from_main() {
    let doc = Document::new();
    let (h, _) = node(&doc, "Transform1");
    let x = knob(&doc, h, KnobSpec::new("x", KnobKind::Double));
    doc.set_value(x, 1.0, 0, MAIN, USER).unwrap();
    doc.add_view(x, ViewId(1)).unwrap();
    assert_eq!(doc.get_value(x, 0, ViewId(1)).unwrap(), TypedValue::Double(1.0));

    doc.set_value(x, 2.0, 0, ViewId(1), USER).unwrap();
    assert_eq!(doc.get_value(x, 0, MAIN).unwrap(), TypedValue::Double(1.0));
    assert_eq!(doc.get_value(x, 0, ViewId(1)).unwrap(), TypedValue::Double(2.0));
}

#[test]
fn integral_of_linear_ramp() {
    let doc = Document::new();
    let (h, _) = node(&doc, "Blur1");
    let size = knob(&doc, h, KnobSpec::new("size", KnobKind::Double).animated(true));
    doc.set_value_at_time(size, 0.0, 0.0, 0, MAIN, USER).unwrap();
    doc.set_value_at_time(size, 10.0, 10.0, 0, MAIN, USER).unwrap();
    doc.set_interpolation_at_time(size, 0.0, Interpolation::Linear, 0, MAIN)
        .unwrap();
    doc.set_interpolation_at_time(size, 10.0, Interpolation::Linear, 0, MAIN)
        .unwrap();

    let area = doc
        .get_integrate_from_time_to_time(size, 0.0, 10.0, 0, MAIN)
        .unwrap();
    assert!((area - 50.0).abs() < 1e-6);
    let slope = doc.get_derivative_at_time(size, 5.0, 0, MAIN).unwrap();
    assert!((slope - 1.0).abs() < 1e-6);
}

#[test]
fn modifications_are_tracked_per_dimension() {
    let doc = Document::new();
    let (h, _) = node(&doc, "Transform1");
    let translate = knob(
        &doc,
        h,
        KnobSpec::new("translate", KnobKind::Double).dimensions(2).animated(true),
    );
    let (blur, _) = node(&doc, "Blur1");
    let size = knob(&doc, blur, KnobSpec::new("size", KnobKind::Double));
    assert!(!doc.has_modifications(translate, None).unwrap());

    doc.set_value(translate, 4.0, 1, MAIN, USER).unwrap();
    assert!(!doc.has_modifications(translate, Some(0)).unwrap());
    assert!(doc.has_modifications(translate, Some(1)).unwrap());
    assert!(doc.has_modifications(translate, None).unwrap());

    doc.reset_to_default(translate, 1, MAIN).unwrap();
    assert!(!doc.has_modifications(translate, None).unwrap());

    doc.set_value_at_time(translate, 3.0, 0.0, 0, MAIN, USER).unwrap();
    assert!(doc.has_modifications(translate, Some(0)).unwrap());
    doc.remove_animation(translate, 0, MAIN, USER).unwrap();

    doc.link_to(translate, 1, MAIN, size, 0, MAIN).unwrap();
    assert!(doc.has_modifications(translate, Some(1)).unwrap());
    assert!(!doc.has_modifications(size, None).unwrap());

    assert!(matches!(
        doc.has_modifications(translate, Some(2)),
        Err(KnobError::DimensionOutOfRange { .. })
    ));
}
