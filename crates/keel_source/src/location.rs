//! Source locations reported by the compiler and their resolved form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A byte range within a named source unit.
///
/// Locations refer to units by source-unit name rather than [`UnitId`](crate::UnitId)
/// so they stay valid inside cached artifacts across runs. `start` is inclusive
/// and `end` is exclusive.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Location {
    /// Source-unit name, e.g. `contracts/Token.sol`.
    pub source: String,
    /// Byte offset of the start of the range (inclusive).
    pub start: u32,
    /// Byte offset of the end of the range (exclusive).
    pub end: u32,
}

impl Location {
    /// Creates a location in the named source unit.
    pub fn new(source: impl Into<String>, start: u32, end: u32) -> Self {
        Self {
            source: source.into(),
            start,
            end,
        }
    }

    /// Returns the length of this range in bytes.
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Returns `true` if this range has zero length.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A location resolved to human-readable line/column coordinates.
///
/// All line and column values are 1-indexed for display to users.
/// Produced by [`SourceTree::resolve_location`](crate::SourceTree::resolve_location).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocation {
    /// The filesystem path of the source unit.
    pub file_path: PathBuf,
    /// The starting line number (1-indexed).
    pub start_line: u32,
    /// The starting column number (1-indexed).
    pub start_col: u32,
    /// The ending line number (1-indexed).
    pub end_line: u32,
    /// The ending column number (1-indexed).
    pub end_col: u32,
}

impl fmt::Display for ResolvedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.file_path.display(),
            self.start_line,
            self.start_col
        )
    }
}
