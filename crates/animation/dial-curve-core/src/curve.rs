//! Numeric keyframe curve.
//!
//! Model:
//! - Keys are kept sorted by time, at most one key per time (within `TIME_EPSILON`).
//! - A segment [Ki -> K(i+1)] is a cubic Hermite whose slopes come from the
//!   interpolation mode of each end key; a Constant left key holds its value.
//! - Outside the keyed range the nearest end key is held.

use dial_api_core::Time;
use serde::{Deserialize, Serialize};

use crate::error::CurveError;
use crate::interp::{hermite, key_slope};
use crate::keyframe::{Interpolation, KeyFrame, KeyframeOutcome, TIME_EPSILON};
use crate::warp::{warp_sorted, KeyWarp};

const FINITE_DIFF_EPS: f64 = 1e-3;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CurveRecord", into = "CurveRecord")]
pub struct Curve {
    keys: Vec<KeyFrame>,
}

/// On-disk shape of a curve: `{ "Keys": [ { "Time", "Value", "Interpolation" } ] }`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CurveRecord {
    #[serde(default)]
    pub keys: Vec<KeyFrame>,
}

impl TryFrom<CurveRecord> for Curve {
    type Error = CurveError;
    fn try_from(record: CurveRecord) -> Result<Self, Self::Error> {
        Curve::from_keys(record.keys)
    }
}

impl From<Curve> for CurveRecord {
    fn from(curve: Curve) -> Self {
        CurveRecord { keys: curve.keys }
    }
}

impl Curve {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a curve from keys in any order. Duplicate times and non-finite
    /// values are rejected.
    pub fn from_keys(mut keys: Vec<KeyFrame>) -> Result<Self, CurveError> {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self::validate(&keys)?;
        Ok(Self { keys })
    }

    /// Check keys as stored: finite, strictly increasing times, one key per time.
    pub fn validate(keys: &[KeyFrame]) -> Result<(), CurveError> {
        if let Some(bad) = keys
            .iter()
            .find(|k| !k.time.is_finite() || !k.value.is_finite())
        {
            return Err(CurveError::NonFinite { time: bad.time });
        }
        for pair in keys.windows(2) {
            let gap = pair[1].time - pair[0].time;
            if gap <= -TIME_EPSILON {
                return Err(CurveError::Unsorted { time: pair[1].time });
            }
            if gap < TIME_EPSILON {
                return Err(CurveError::DuplicateTime { time: pair[1].time });
            }
        }
        Ok(())
    }

    #[inline]
    pub fn keyframes(&self) -> &[KeyFrame] {
        &self.keys
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn first_time(&self) -> Option<Time> {
        self.keys.first().map(|k| k.time)
    }

    pub fn last_time(&self) -> Option<Time> {
        self.keys.last().map(|k| k.time)
    }

    fn index_of(&self, time: Time) -> Result<usize, usize> {
        let pos = self.keys.partition_point(|k| k.time < time - TIME_EPSILON);
        match self.keys.get(pos) {
            Some(k) if k.same_time(time) => Ok(pos),
            _ => Err(pos),
        }
    }

    pub fn keyframe_at(&self, time: Time) -> Option<&KeyFrame> {
        self.index_of(time).ok().map(|i| &self.keys[i])
    }

    /// Insert a key, replacing the value of an existing key at the same time.
    /// A replaced key keeps its interpolation.
    pub fn add_keyframe(&mut self, key: KeyFrame) -> KeyframeOutcome {
        match self.index_of(key.time) {
            Ok(i) => {
                self.keys[i].value = key.value;
                KeyframeOutcome::Replaced
            }
            Err(i) => {
                self.keys.insert(i, key);
                KeyframeOutcome::Added
            }
        }
    }

    pub fn remove_keyframe_at(&mut self, time: Time) -> Option<KeyFrame> {
        self.index_of(time).ok().map(|i| self.keys.remove(i))
    }

    pub fn set_interpolation_at(&mut self, time: Time, interpolation: Interpolation) -> bool {
        match self.index_of(time) {
            Ok(i) => {
                self.keys[i].interpolation = interpolation;
                true
            }
            Err(_) => false,
        }
    }

    /// Move the keys at `times` through `warp`. Returns the new times, in the order
    /// given. Fails without changes when a time has no key or two keys would meet.
    pub fn warp(&mut self, times: &[Time], warp: &KeyWarp) -> Result<Vec<Time>, CurveError> {
        let (keys, moved) = warp_sorted(
            &self.keys,
            times,
            |k| k.time,
            |k| KeyFrame {
                time: warp.time(k.time),
                value: warp.value(k.value),
                interpolation: k.interpolation,
            },
        )?;
        if let Some(bad) = keys.iter().find(|k| !k.value.is_finite()) {
            return Err(CurveError::NonFinite { time: bad.time });
        }
        self.keys = keys;
        Ok(moved)
    }

    /// Retime the key at `from` to `to`, keeping its value and interpolation.
    pub fn move_keyframe(&mut self, from: Time, to: Time) -> Result<(), CurveError> {
        self.warp(&[from], &KeyWarp::offset(to - from, 0.0)).map(|_| ())
    }

    /// Value of segment `i` (keys i and i+1) at `t`, without end-of-range handling.
    fn segment_value(&self, i: usize, t: Time) -> f64 {
        let left = &self.keys[i];
        let right = &self.keys[i + 1];
        if left.interpolation == Interpolation::Constant {
            return left.value;
        }
        let h = right.time - left.time;
        let s = ((t - left.time) / h).clamp(0.0, 1.0);
        let m0 = key_slope(&self.keys, i, true);
        let m1 = key_slope(&self.keys, i + 1, false);
        hermite(left.value, m0, right.value, m1, h, s)
    }

    /// Sample the curve. `None` when there are no keys.
    pub fn evaluate(&self, t: Time) -> Option<f64> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        if t <= first.time {
            return Some(first.value);
        }
        if t >= last.time {
            return Some(last.value);
        }
        if let Ok(i) = self.index_of(t) {
            return Some(self.keys[i].value);
        }
        let i = self.keys.partition_point(|k| k.time <= t) - 1;
        Some(self.segment_value(i, t))
    }

    /// Integral of the curve over [t1, t2]. Segments are cubic, so Simpson's rule is exact.
    pub fn integrate(&self, t1: Time, t2: Time) -> f64 {
        if t2 < t1 {
            return -self.integrate(t2, t1);
        }
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return 0.0;
        };
        let mut total = 0.0;
        if t1 < first.time {
            total += (t2.min(first.time) - t1) * first.value;
        }
        if t2 > last.time {
            total += (t2 - t1.max(last.time)) * last.value;
        }
        for i in 0..self.keys.len().saturating_sub(1) {
            let a = self.keys[i].time.max(t1);
            let b = self.keys[i + 1].time.min(t2);
            if b <= a {
                continue;
            }
            let m = 0.5 * (a + b);
            total += (b - a) / 6.0
                * (self.segment_value(i, a)
                    + 4.0 * self.segment_value(i, m)
                    + self.segment_value(i, b));
        }
        total
    }

    /// Time derivative at `t` by central difference. Zero for an empty curve.
    pub fn derivative(&self, t: Time) -> f64 {
        match (
            self.evaluate(t + FINITE_DIFF_EPS),
            self.evaluate(t - FINITE_DIFF_EPS),
        ) {
            (Some(fwd), Some(bwd)) => (fwd - bwd) / (2.0 * FINITE_DIFF_EPS),
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(keys: &[(f64, f64)]) -> Curve {
        Curve::from_keys(
            keys.iter()
                .map(|(t, v)| KeyFrame::new(*t, *v).with_interpolation(Interpolation::Linear))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn index_lookup_tolerates_epsilon() {
        let c = linear(&[(0.0, 1.0), (10.0, 2.0)]);
        assert!(c.keyframe_at(10.0 + 1e-9).is_some());
        assert!(c.keyframe_at(5.0).is_none());
    }

    #[test]
    fn from_keys_sorts_and_rejects_duplicates() {
        let c = Curve::from_keys(vec![KeyFrame::new(5.0, 1.0), KeyFrame::new(1.0, 0.0)]).unwrap();
        assert_eq!(c.first_time(), Some(1.0));
        let dup = Curve::from_keys(vec![KeyFrame::new(1.0, 1.0), KeyFrame::new(1.0, 2.0)]);
        assert!(matches!(dup, Err(CurveError::DuplicateTime { .. })));
    }

    #[test]
    fn moved_keys_keep_their_interpolation() {
        let mut c = linear(&[(0.0, 1.0), (10.0, 2.0), (20.0, 3.0)]);
        c.set_interpolation_at(10.0, Interpolation::Constant);
        c.move_keyframe(10.0, 15.0).unwrap();
        let k = c.keyframe_at(15.0).unwrap();
        assert_eq!((k.value, k.interpolation), (2.0, Interpolation::Constant));
        assert!(c.keyframe_at(10.0).is_none());
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn warps_refuse_to_overwrite_keys() {
        let mut c = linear(&[(0.0, 1.0), (10.0, 2.0), (20.0, 3.0)]);
        assert_eq!(
            c.move_keyframe(10.0, 20.0),
            Err(CurveError::KeyCollision { time: 20.0 })
        );
        assert_eq!(
            c.move_keyframe(5.0, 6.0),
            Err(CurveError::MissingKey { time: 5.0 })
        );
        assert_eq!(c, linear(&[(0.0, 1.0), (10.0, 2.0), (20.0, 3.0)]));

        // shifting every key together never collides with itself
        let moved = c.warp(&[0.0, 10.0, 20.0], &KeyWarp::offset(10.0, 0.5)).unwrap();
        assert_eq!(moved, vec![10.0, 20.0, 30.0]);
        assert_eq!(c.keyframe_at(30.0).map(|k| k.value), Some(3.5));
    }

    #[test]
    fn linear_integral_is_trapezoid() {
        let c = linear(&[(0.0, 0.0), (10.0, 10.0)]);
        assert!((c.integrate(0.0, 10.0) - 50.0).abs() < 1e-9);
        assert!((c.integrate(10.0, 0.0) + 50.0).abs() < 1e-9);
        // held after the last key
        assert!((c.integrate(10.0, 12.0) - 20.0).abs() < 1e-9);
    }
}
