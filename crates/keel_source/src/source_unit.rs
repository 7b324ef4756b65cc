//! Source unit representation with line-start indexing for fast line/column lookup.

use crate::scan::{self, Declaration};
use crate::unit_id::UnitId;
use keel_common::ContentHash;
use std::path::PathBuf;
use std::time::SystemTime;

/// A source unit loaded into a [`SourceTree`](crate::SourceTree).
///
/// Stores the content along with its hash, scanned imports and declarations,
/// and precomputed line-start offsets for diagnostic rendering. Immutable once
/// loaded.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// The identifier of this unit within its tree.
    pub id: UnitId,
    /// Source-unit name as seen by the compiler (e.g. `contracts/Token.sol`).
    pub name: String,
    /// Filesystem path (or the name itself for in-memory units).
    pub path: PathBuf,
    /// The full text content.
    pub content: String,
    /// Last-modified time of the file, if it came from disk.
    pub modified: Option<SystemTime>,
    /// Hash of the content.
    pub content_hash: ContentHash,
    /// Raw import paths in source order.
    pub imports: Vec<String>,
    /// Contract-like declarations in source order.
    pub declarations: Vec<Declaration>,
    line_starts: Vec<u32>,
}

impl SourceUnit {
    /// Creates a unit, scanning the content and computing its hash.
    pub fn new(
        id: UnitId,
        name: impl Into<String>,
        path: PathBuf,
        content: String,
        modified: Option<SystemTime>,
    ) -> Self {
        let scanned = scan::scan(&content);
        let line_starts = compute_line_starts(&content);
        let content_hash = ContentHash::from_bytes(content.as_bytes());
        Self {
            id,
            name: name.into(),
            path,
            content,
            modified,
            content_hash,
            imports: scanned.imports,
            declarations: scanned.declarations,
            line_starts,
        }
    }

    /// Returns the names of the declared contracts in declaration order.
    pub fn declared_names(&self) -> impl Iterator<Item = &str> {
        self.declarations.iter().map(|d| d.name.as_str())
    }

    /// Converts a byte offset into 1-indexed (line, column) coordinates.
    ///
    /// Offsets past the end of the content clamp to the last line.
    pub fn line_col(&self, byte_offset: u32) -> (u32, u32) {
        let line_idx = match self.line_starts.binary_search(&byte_offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line = (line_idx as u32) + 1;
        let col = byte_offset - self.line_starts[line_idx] + 1;
        (line, col)
    }

    /// Returns the full line of text containing the given byte offset.
    pub fn line_text(&self, byte_offset: u32) -> &str {
        let mut offset = (byte_offset as usize).min(self.content.len());
        while !self.content.is_char_boundary(offset) {
            offset -= 1;
        }
        let start = self.content[..offset].rfind('\n').map_or(0, |pos| pos + 1);
        let end = self.content[offset..]
            .find('\n')
            .map_or(self.content.len(), |pos| offset + pos);
        &self.content[start..end]
    }
}

fn compute_line_starts(content: &str) -> Vec<u32> {
    let mut starts = vec![0u32];
    for (i, byte) in content.bytes().enumerate() {
        if byte == b'\n' {
            starts.push((i + 1) as u32);
        }
    }
    starts
}
