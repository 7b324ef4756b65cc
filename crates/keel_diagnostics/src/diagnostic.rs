//! Structured diagnostic messages with severity, codes, locations, and notes.

use crate::code::DiagnosticCode;
use crate::severity::Severity;
use keel_source::Location;
use serde::{Deserialize, Serialize};

/// A structured diagnostic message.
///
/// Diagnostics are the single channel through which every stage reports
/// problems: compiler messages, cache corruption, size violations, gas notes
/// and doc rendering failures. Each diagnostic includes:
/// - A severity level and category-prefixed code
/// - A primary message and, when known, the source location it refers to
/// - Optional notes and help text
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The code identifying the type of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// The primary source location, if the diagnostic refers to source text.
    pub location: Option<Location>,
    /// Explanatory footnotes (e.g., "note: ...").
    pub notes: Vec<String>,
    /// Actionable suggestions (e.g., "help: ...").
    pub help: Vec<String>,
}

impl Diagnostic {
    /// Creates a diagnostic with the given severity, code, and message.
    pub fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            location: None,
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Creates a new error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Creates a new warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    /// Creates a new note diagnostic.
    pub fn note(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Note, code, message)
    }

    /// Attaches a primary source location.
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Adds a help message to this diagnostic.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }

    /// Returns `true` if this diagnostic has error severity.
    pub fn is_error(&self) -> bool {
        self.severity.is_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Category;

    #[test]
    fn create_error() {
        let code = DiagnosticCode::new(Category::Compiler, 2314);
        let diag = Diagnostic::error(code, "Expected ';' but got '}'");
        assert_eq!(diag.severity, Severity::Error);
        assert!(diag.is_error());
        assert!(diag.location.is_none());
        assert_eq!(format!("{}", diag.code), "C2314");
    }

    #[test]
    fn create_warning() {
        let code = DiagnosticCode::new(Category::Size, 1);
        let diag = Diagnostic::warning(code, "contract exceeds size limit");
        assert_eq!(diag.severity, Severity::Warning);
        assert!(!diag.is_error());
    }

    #[test]
    fn builder_methods() {
        let code = DiagnosticCode::new(Category::Compiler, 5667);
        let diag = Diagnostic::warning(code, "unused function parameter")
            .with_location(Location::new("contracts/Vault.sol", 10, 14))
            .with_note("parameter `amount` is never read")
            .with_help("remove or comment out the variable name");
        assert_eq!(diag.location.as_ref().unwrap().source, "contracts/Vault.sol");
        assert_eq!(diag.notes.len(), 1);
        assert_eq!(diag.help.len(), 1);
    }

    #[test]
    fn serde_roundtrip() {
        let diag = Diagnostic::note(DiagnosticCode::new(Category::Gas, 1), "no gas recorded")
            .with_location(Location::new("a.sol", 0, 3));
        let json = serde_json::to_string(&diag).unwrap();
        let back: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(diag, back);
    }
}
