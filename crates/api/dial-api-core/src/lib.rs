//! dial-api-core: typed knob values, kinds and handles (core, host-agnostic)

pub mod coercion;
pub mod ids;
pub mod json;
pub mod kind;
pub mod knob_path;
pub mod value;

pub use ids::{DimIdx, DimView, HolderHandle, KnobHandle, Time, ViewId};
pub use kind::{KnobKind, ValueCategory};
pub use knob_path::KnobPath;
pub use value::{TypedValue, ValueKind};
