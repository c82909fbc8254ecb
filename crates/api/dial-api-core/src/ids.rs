//! Identifiers shared across the dial crates.
//!
//! Handles are generational arena indices: they never keep the referenced entry alive
//! and stop resolving once the entry is destroyed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Document time, in frames.
pub type Time = f64;

/// Index of one scalar channel of a knob.
pub type DimIdx = u32;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ViewId(pub u32);

impl ViewId {
    pub const MAIN: ViewId = ViewId(0);
}

impl Default for ViewId {
    fn default() -> Self {
        ViewId::MAIN
    }
}

/// (dimension, view) key used by all per-channel maps.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct DimView {
    pub dim: DimIdx,
    pub view: ViewId,
}

impl DimView {
    #[inline]
    pub fn new(dim: DimIdx, view: ViewId) -> Self {
        Self { dim, view }
    }

    #[inline]
    pub fn main(dim: DimIdx) -> Self {
        Self::new(dim, ViewId::MAIN)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct KnobHandle {
    pub index: u32,
    pub generation: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct HolderHandle {
    pub index: u32,
    pub generation: u32,
}

impl KnobHandle {
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl HolderHandle {
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for KnobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "knob#{}v{}", self.index, self.generation)
    }
}

impl fmt::Display for HolderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "holder#{}v{}", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_compare_by_generation() {
        let a = KnobHandle::new(3, 0);
        let b = KnobHandle::new(3, 1);
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "knob#3v0");
    }

    #[test]
    fn dim_view_orders_by_dim_first() {
        let mut keys = vec![
            DimView::new(1, ViewId(0)),
            DimView::new(0, ViewId(1)),
            DimView::main(0),
        ];
        keys.sort();
        assert_eq!(keys[0], DimView::main(0));
        assert_eq!(keys[2], DimView::new(1, ViewId::MAIN));
    }
}
