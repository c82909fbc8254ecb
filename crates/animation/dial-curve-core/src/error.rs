use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CurveError {
    #[error("keyframe at time {time} has a non-finite time or value")]
    NonFinite { time: f64 },
    #[error("two keyframes share time {time}")]
    DuplicateTime { time: f64 },
    #[error("keyframe at time {time} is out of order")]
    Unsorted { time: f64 },
    #[error("no keyframe at time {time}")]
    MissingKey { time: f64 },
    #[error("a moved keyframe would land on the key at time {time}")]
    KeyCollision { time: f64 },
}
