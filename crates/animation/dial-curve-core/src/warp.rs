//! Moving keys in time (and numeric keys in value).
//!
//! A warp is all-or-nothing: every requested time must name an existing key, and no
//! warped key may land on another key. On error the keys are left as they were.

use dial_api_core::Time;
use serde::{Deserialize, Serialize};

use crate::error::CurveError;
use crate::keyframe::TIME_EPSILON;

/// Affine transform applied to selected keys: `t' = t * time_scale + time_offset`,
/// `v' = v * value_scale + value_offset`. String keys only use the time part.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyWarp {
    pub time_scale: f64,
    pub time_offset: f64,
    pub value_scale: f64,
    pub value_offset: f64,
}

impl Default for KeyWarp {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl KeyWarp {
    pub const IDENTITY: KeyWarp = KeyWarp {
        time_scale: 1.0,
        time_offset: 0.0,
        value_scale: 1.0,
        value_offset: 0.0,
    };

    /// Shift keys by `dt` in time and `dv` in value.
    pub fn offset(dt: f64, dv: f64) -> Self {
        Self {
            time_offset: dt,
            value_offset: dv,
            ..Self::IDENTITY
        }
    }

    /// Scale key times around `pivot`.
    pub fn scale_time(factor: f64, pivot: Time) -> Self {
        Self {
            time_scale: factor,
            time_offset: pivot - pivot * factor,
            ..Self::IDENTITY
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    #[inline]
    pub fn time(&self, t: Time) -> Time {
        t * self.time_scale + self.time_offset
    }

    #[inline]
    pub fn value(&self, v: f64) -> f64 {
        v * self.value_scale + self.value_offset
    }
}

/// Warp the keys at `times` out of `keys` (sorted by time).
///
/// Returns the new sorted key list and the warped times, in the order of `times`.
pub(crate) fn warp_sorted<K: Clone>(
    keys: &[K],
    times: &[Time],
    time_of: impl Fn(&K) -> Time,
    apply: impl Fn(&K) -> K,
) -> Result<(Vec<K>, Vec<Time>), CurveError> {
    let mut selected = vec![false; keys.len()];
    let mut warped = Vec::with_capacity(times.len());
    for &t in times {
        let pos = keys.partition_point(|k| time_of(k) < t - TIME_EPSILON);
        match keys.get(pos) {
            Some(k) if (time_of(k) - t).abs() < TIME_EPSILON && !selected[pos] => {
                selected[pos] = true;
                let moved = apply(k);
                if !time_of(&moved).is_finite() {
                    return Err(CurveError::NonFinite { time: t });
                }
                warped.push(moved);
            }
            _ => return Err(CurveError::MissingKey { time: t }),
        }
    }

    let new_times: Vec<Time> = warped.iter().map(&time_of).collect();
    let mut out: Vec<K> = keys
        .iter()
        .zip(&selected)
        .filter(|(_, sel)| !**sel)
        .map(|(k, _)| k.clone())
        .chain(warped)
        .collect();
    out.sort_by(|a, b| time_of(a).total_cmp(&time_of(b)));
    if let Some(pair) = out
        .windows(2)
        .find(|pair| time_of(&pair[1]) - time_of(&pair[0]) < TIME_EPSILON)
    {
        return Err(CurveError::KeyCollision {
            time: time_of(&pair[1]),
        });
    }
    Ok((out, new_times))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_keeps_the_pivot() {
        let w = KeyWarp::scale_time(2.0, 10.0);
        assert_eq!(w.time(10.0), 10.0);
        assert_eq!(w.time(15.0), 20.0);
        assert!(KeyWarp::default().is_identity());
    }

    #[test]
    fn repeated_times_are_missing_keys() {
        let keys = [1.0, 2.0];
        let res = warp_sorted(&keys, &[1.0, 1.0], |k| *k, |k| k + 5.0);
        assert_eq!(res, Err(CurveError::MissingKey { time: 1.0 }));
    }
}
