//! Error taxonomy for knob operations.
//!
//! Everything here is recoverable: callers catch at the operation boundary and turn the
//! error into a persistent message on the holder. `KindMismatch` is the exception, it
//! signals a programming error and is asserted on in debug builds.

use dial_api_core::{DimIdx, HolderHandle, KnobHandle, KnobKind, ValueKind, ViewId};
use dial_curve_core::CurveError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KnobError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinkError {
    #[error("linking {target} to {master} would create a cycle")]
    Cycle {
        target: KnobHandle,
        master: KnobHandle,
    },
    #[error("cannot link a {target} knob to a {master} knob")]
    TypeMismatch { target: KnobKind, master: KnobKind },
    #[error("dimension {dim} is out of range ({dimensions} dimensions)")]
    DimensionOutOfRange { dim: DimIdx, dimensions: u32 },
    #[error("knob handle {0} is no longer valid")]
    StaleHandle(KnobHandle),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("invalid expression '{text}': {reason}")]
    Invalid { text: String, reason: String },
    #[error("expression evaluation failed: {reason}")]
    Evaluation { reason: String },
    #[error("dimension {dim} is out of range ({dimensions} dimensions)")]
    DimensionOutOfRange { dim: DimIdx, dimensions: u32 },
    #[error("knob handle {0} is no longer valid")]
    StaleHandle(KnobHandle),
}

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("knob '{knob}' is a {live} but the record says {recorded}")]
    TypeMismatch {
        knob: String,
        live: String,
        recorded: String,
    },
    #[error("knob '{knob}' is linked to '{node}.{master}' which does not exist")]
    DanglingMaster {
        knob: String,
        node: String,
        master: String,
    },
    #[error("malformed record for '{knob}': {reason}")]
    MalformedRecord { knob: String, reason: String },
    #[error("unsupported schema version {found} (this build reads up to {current})")]
    UnsupportedVersion { found: u32, current: u32 },
    #[error("knob handle {0} is no longer valid")]
    StaleHandle(KnobHandle),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl SerializationError {
    pub(crate) fn malformed(knob: &str, reason: impl Into<String>) -> Self {
        SerializationError::MalformedRecord {
            knob: knob.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether a project loader can skip the offending knob and carry on.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SerializationError::UnsupportedVersion { .. })
    }
}

#[derive(Debug, Error)]
pub enum KnobError {
    #[error("dimension {dim} is out of range ({dimensions} dimensions)")]
    DimensionOutOfRange { dim: DimIdx, dimensions: u32 },
    #[error("knob handle {0} is no longer valid")]
    StaleHandle(KnobHandle),
    #[error("holder handle {0} is no longer valid")]
    StaleHolder(HolderHandle),
    #[error("view {0:?} does not exist on this knob")]
    UnknownView(ViewId),
    #[error("value of kind {found} written to a {expected} knob")]
    KindMismatch {
        expected: ValueKind,
        found: ValueKind,
    },
    #[error("animation is disabled on knob '{0}'")]
    AnimationDisabled(String),
    #[error("'{name}' already exists in '{holder}'")]
    DuplicateName { holder: String, name: String },
    #[error("'{label}' is not an entry of choice knob '{knob}'")]
    UnknownChoice { knob: String, label: String },
    #[error("a knob needs at least one dimension")]
    NoDimensions,
    #[error(transparent)]
    Curve(#[from] CurveError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Expression(#[from] ExpressionError),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

impl KnobError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            KnobError::KindMismatch { .. } => false,
            KnobError::Serialization(e) => e.is_recoverable(),
            _ => true,
        }
    }
}

impl From<KnobError> for ExpressionError {
    fn from(e: KnobError) -> Self {
        match e {
            KnobError::DimensionOutOfRange { dim, dimensions } => {
                ExpressionError::DimensionOutOfRange { dim, dimensions }
            }
            KnobError::Expression(x) => x,
            KnobError::StaleHandle(h) => ExpressionError::StaleHandle(h),
            other => ExpressionError::Evaluation {
                reason: other.to_string(),
            },
        }
    }
}

impl From<KnobError> for SerializationError {
    fn from(e: KnobError) -> Self {
        match e {
            KnobError::Serialization(s) => s,
            KnobError::StaleHandle(h) => SerializationError::StaleHandle(h),
            other => SerializationError::MalformedRecord {
                knob: String::new(),
                reason: other.to_string(),
            },
        }
    }
}
