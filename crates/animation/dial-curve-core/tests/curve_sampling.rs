use dial_curve_core::{
    Curve, CurveError, HoldPrevious, Interpolation, KeyFrame, KeyframeOutcome, StringAnimation,
};
use serde_json::json;

fn mk_curve(keys: &[(f64, f64, Interpolation)]) -> Curve {
    let mut c = Curve::new();
    for (t, v, interp) in keys {
        c.add_keyframe(KeyFrame::new(*t, *v).with_interpolation(*interp));
    }
    c
}

#[test]
fn holds_end_values_outside_range() {
    let c = mk_curve(&[
        (10.0, 4.0, Interpolation::Linear),
        (20.0, 8.0, Interpolation::Linear),
    ]);
    assert_eq!(c.evaluate(-100.0), Some(4.0));
    assert_eq!(c.evaluate(10.0), Some(4.0));
    assert_eq!(c.evaluate(25.0), Some(8.0));
    assert!((c.evaluate(15.0).unwrap() - 6.0).abs() < 1e-9);
}

#[test]
fn empty_curve_has_no_value() {
    let c = Curve::new();
    assert_eq!(c.evaluate(0.0), None);
    assert_eq!(c.integrate(0.0, 10.0), 0.0);
    assert_eq!(c.derivative(3.0), 0.0);
}

#[test]
fn constant_key_holds_until_next_key() {
    let c = mk_curve(&[
        (0.0, 1.0, Interpolation::Constant),
        (10.0, 5.0, Interpolation::Linear),
    ]);
    assert_eq!(c.evaluate(9.99), Some(1.0));
    assert_eq!(c.evaluate(10.0), Some(5.0));
    assert!((c.integrate(0.0, 10.0) - 10.0).abs() < 1e-9);
}

#[test]
fn horizontal_keys_ease_in_and_out() {
    let c = mk_curve(&[
        (0.0, 0.0, Interpolation::Horizontal),
        (10.0, 10.0, Interpolation::Horizontal),
    ]);
    // symmetric ease: midpoint is exact, slope is zero at both ends
    assert!((c.evaluate(5.0).unwrap() - 5.0).abs() < 1e-9);
    assert!(c.evaluate(1.0).unwrap() < 1.0);
    assert!(c.derivative(0.0).abs() < 0.01);
}

#[test]
fn add_existing_time_replaces_value_and_keeps_interpolation() {
    let mut c = mk_curve(&[(10.0, 4.0, Interpolation::Constant)]);
    assert_eq!(
        c.add_keyframe(KeyFrame::new(10.0, 6.0)),
        KeyframeOutcome::Replaced
    );
    assert_eq!(c.len(), 1);
    let key = c.keyframe_at(10.0).unwrap();
    assert_eq!(key.value, 6.0);
    assert_eq!(key.interpolation, Interpolation::Constant);
    assert_eq!(
        c.add_keyframe(KeyFrame::new(5.0, 1.0)),
        KeyframeOutcome::Added
    );
    assert_eq!(c.first_time(), Some(5.0));
}

#[test]
fn remove_only_the_requested_key() {
    let mut c = mk_curve(&[
        (0.0, 0.0, Interpolation::Linear),
        (5.0, 1.0, Interpolation::Linear),
        (10.0, 2.0, Interpolation::Linear),
    ]);
    let removed = c.remove_keyframe_at(5.0).unwrap();
    assert_eq!(removed.value, 1.0);
    assert_eq!(c.len(), 2);
    assert!(c.remove_keyframe_at(5.0).is_none());
}

#[test]
fn derivative_of_linear_segment() {
    let c = mk_curve(&[
        (0.0, 0.0, Interpolation::Linear),
        (10.0, 20.0, Interpolation::Linear),
    ]);
    assert!((c.derivative(5.0) - 2.0).abs() < 1e-6);
}

#[test]
fn curve_json_uses_document_field_names() {
    let c = mk_curve(&[(10.0, 4.0, Interpolation::Linear)]);
    let v = serde_json::to_value(&c).unwrap();
    assert_eq!(
        v,
        json!({ "Keys": [ { "Time": 10.0, "Value": 4.0, "Interpolation": "Linear" } ] })
    );
}

#[test]
fn curve_json_rejects_duplicate_times() {
    let raw = json!({ "Keys": [ { "Time": 1.0, "Value": 0.0 }, { "Time": 1.0, "Value": 2.0 } ] });
    let err = serde_json::from_value::<Curve>(raw).unwrap_err();
    assert!(err.to_string().contains("two keyframes share time 1"));
    assert!(matches!(
        Curve::from_keys(vec![KeyFrame::new(1.0, f64::INFINITY)]),
        Err(CurveError::NonFinite { .. })
    ));
}

#[test]
fn string_animation_steps_and_defers_before_first_key() {
    let mut anim = StringAnimation::new();
    anim.set_key(10.0, "b.png");
    anim.set_key(0.0, "a.png");
    assert_eq!(anim.value_at(-1.0, &HoldPrevious), None);
    assert_eq!(anim.value_at(0.0, &HoldPrevious).as_deref(), Some("a.png"));
    assert_eq!(anim.value_at(9.5, &HoldPrevious).as_deref(), Some("a.png"));
    assert_eq!(anim.value_at(12.0, &HoldPrevious).as_deref(), Some("b.png"));
    anim.set_key(10.0, "");
    assert_eq!(anim.value_at(12.0, &HoldPrevious), None);
}

#[test]
fn validate_reports_stored_order() {
    let keys = vec![KeyFrame::new(5.0, 1.0), KeyFrame::new(2.0, 0.0)];
    assert_eq!(
        Curve::validate(&keys),
        Err(CurveError::Unsorted { time: 2.0 })
    );
    assert!(Curve::from_keys(keys).is_ok());
}
