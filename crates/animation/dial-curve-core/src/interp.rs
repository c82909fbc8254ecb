//! Interpolation helpers:
//! - lerp (linear blend)
//! - hermite (cubic Hermite segment from values and slopes)
//! - key tangents per interpolation mode

use crate::keyframe::{Interpolation, KeyFrame};

#[inline]
pub fn lerp(a: f64, b: f64, s: f64) -> f64 {
    a + (b - a) * s
}

/// Cubic Hermite interpolation on a segment of length `h`.
/// `s` is the normalized position in [0, 1]; `m0`/`m1` are slopes in value per time unit.
#[inline]
pub fn hermite(v0: f64, m0: f64, v1: f64, m1: f64, h: f64, s: f64) -> f64 {
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    h00 * v0 + h10 * h * m0 + h01 * v1 + h11 * h * m1
}

fn secant(a: &KeyFrame, b: &KeyFrame) -> f64 {
    let dt = b.time - a.time;
    if dt.abs() <= f64::EPSILON {
        0.0
    } else {
        (b.value - a.value) / dt
    }
}

/// Slope leaving key `i` towards `i + 1` (`outgoing`) or arriving from `i - 1`.
pub fn key_slope(keys: &[KeyFrame], i: usize, outgoing: bool) -> f64 {
    let key = &keys[i];
    let prev = i.checked_sub(1).map(|p| &keys[p]);
    let next = keys.get(i + 1);
    match key.interpolation {
        Interpolation::Constant | Interpolation::Horizontal => 0.0,
        Interpolation::Linear => match (outgoing, prev, next) {
            (true, _, Some(n)) => secant(key, n),
            (false, Some(p), _) => secant(p, key),
            _ => 0.0,
        },
        Interpolation::CatmullRom => match (prev, next) {
            (Some(p), Some(n)) => secant(p, n),
            (None, Some(n)) => secant(key, n),
            (Some(p), None) => secant(p, key),
            (None, None) => 0.0,
        },
        Interpolation::Smooth => match (prev, next) {
            (Some(p), Some(n)) => {
                let local_extremum = (key.value >= p.value && key.value >= n.value)
                    || (key.value <= p.value && key.value <= n.value);
                if local_extremum {
                    0.0
                } else {
                    secant(p, n)
                }
            }
            _ => 0.0,
        },
    }
}
