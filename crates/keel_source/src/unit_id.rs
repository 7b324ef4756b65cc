//! Opaque identifier for source units loaded into a [`SourceTree`](crate::SourceTree).

use serde::{Deserialize, Serialize};

/// Index of a source unit within one [`SourceTree`](crate::SourceTree).
///
/// Ids are only meaningful for the tree that produced them. Anything that
/// outlives a run (cached artifacts, diagnostics) refers to units by their
/// source-unit name instead.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct UnitId(u32);

impl UnitId {
    /// Creates a `UnitId` from a raw `u32` value.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw `u32` value of this `UnitId`.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Returns the id as a vector index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
