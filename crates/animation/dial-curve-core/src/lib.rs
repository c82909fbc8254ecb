//! dial-curve-core: keyframe curves (numeric) and string animation for knobs.

pub mod curve;
pub mod error;
pub mod interp;
pub mod keyframe;
pub mod strings;
pub mod warp;

pub use curve::{Curve, CurveRecord};
pub use error::CurveError;
pub use keyframe::{Interpolation, KeyFrame, KeyframeOutcome, TIME_EPSILON};
pub use strings::{HoldPrevious, StringAnimation, StringInterpolator, StringKey};
pub use warp::KeyWarp;
