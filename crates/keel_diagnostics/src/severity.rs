//! How serious a build diagnostic is.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a diagnostic. Only [`Error`](Severity::Error) can fail a build,
/// and only through the stage that reported it.
///
/// Declaration order is severity order, so `Note < Warning < Error`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Context that needs no action, such as an unmeasured gas call.
    Note,
    /// Reported but never fatal on its own.
    Warning,
    /// A compile error, or a stage result configured to fail the run.
    Error,
}

impl Severity {
    /// Returns `true` if this severity is [`Error`](Severity::Error).
    pub fn is_error(self) -> bool {
        self == Severity::Error
    }

    /// Maps a `solc` standard-JSON `severity` field. `info` and anything
    /// unrecognized become notes.
    pub fn from_solc(raw: &str) -> Self {
        match raw {
            "error" => Severity::Error,
            "warning" => Severity::Warning,
            _ => Severity::Note,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
