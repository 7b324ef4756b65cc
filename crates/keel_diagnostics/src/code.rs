//! Diagnostic codes with category prefixes for structured identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The pipeline area a diagnostic comes from, determining its prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Messages reported by the contract compiler, prefixed with `C`.
    Compiler,
    /// Contract size checks, prefixed with `S`.
    Size,
    /// Gas profiling, prefixed with `G`.
    Gas,
    /// Documentation extraction and rendering, prefixed with `D`.
    Docs,
    /// Artifact cache, prefixed with `K`.
    Cache,
    /// Source discovery and imports, prefixed with `F`.
    Source,
    /// Pipeline orchestration, prefixed with `P`.
    Pipeline,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Compiler => 'C',
            Category::Size => 'S',
            Category::Gas => 'G',
            Category::Docs => 'D',
            Category::Cache => 'K',
            Category::Source => 'F',
            Category::Pipeline => 'P',
        }
    }
}

/// A structured diagnostic code combining a category prefix and a numeric identifier.
///
/// Displayed as the category prefix followed by a zero-padded number of at
/// least three digits, e.g. `S001`, `K001`, `C2314`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a new diagnostic code.
    pub fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}
