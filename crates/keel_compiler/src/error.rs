//! Error types for compilation and external tool invocation.

use std::fmt;
use std::sync::Arc;

use keel_cache::SharedFailure;
use keel_diagnostics::Diagnostic;

/// An external tool could not be run to completion.
///
/// Fatal for the compiler: the pipeline aborts on the first one.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    /// The executable could not be started.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        /// The executable.
        command: String,
        /// The underlying I/O error.
        source: Arc<std::io::Error>,
    },

    /// Communicating with the running process failed.
    #[error("I/O error while running `{command}`: {source}")]
    Io {
        /// The executable.
        command: String,
        /// The underlying I/O error.
        source: Arc<std::io::Error>,
    },

    /// The process ran longer than its timeout and was killed.
    #[error("`{command}` timed out after {secs}s")]
    Timeout {
        /// The executable.
        command: String,
        /// The timeout in seconds.
        secs: u64,
    },

    /// The run was cancelled and the process killed.
    #[error("`{command}` was cancelled")]
    Cancelled {
        /// The executable.
        command: String,
    },

    /// The process exited unsuccessfully without usable output.
    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        /// The executable.
        command: String,
        /// Exit status description.
        status: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// The process produced output that could not be understood.
    #[error("`{command}` produced invalid output: {reason}")]
    InvalidOutput {
        /// The executable.
        command: String,
        /// Description of the problem.
        reason: String,
    },

    /// The executable reports a different version than configured.
    #[error("`{command}` is version {found}, expected {expected}")]
    VersionMismatch {
        /// The executable.
        command: String,
        /// The configured version.
        expected: String,
        /// The version the executable reported.
        found: String,
    },
}

/// A unit failed to compile. Carries every diagnostic the compiler reported,
/// warnings included.
#[derive(Debug, Clone)]
pub struct CompileError {
    /// Source-unit name of the failed unit.
    pub source_name: String,
    /// All diagnostics reported for the unit.
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileError {
    /// Returns the number of error-severity diagnostics.
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed to compile with {} error(s)",
            self.source_name,
            self.error_count()
        )
    }
}

impl std::error::Error for CompileError {}

/// Why a compilation produced no artifact.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileFailure {
    /// The compiler rejected the unit. Non-fatal for the pipeline.
    #[error(transparent)]
    Diagnostics(#[from] CompileError),

    /// The compiler could not be run. Fatal for the pipeline.
    #[error(transparent)]
    Tool(ToolError),

    /// The build was cancelled before or during compilation.
    #[error("compilation cancelled")]
    Cancelled,
}

impl From<ToolError> for CompileFailure {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Cancelled { .. } => CompileFailure::Cancelled,
            other => CompileFailure::Tool(other),
        }
    }
}

/// Waiters on the same fingerprint share a leader's diagnostics and tool
/// failures. A cancellation is the leader's own, so a waiter compiles again.
impl SharedFailure for CompileFailure {
    fn is_transient(&self) -> bool {
        matches!(self, CompileFailure::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_diagnostics::{Category, DiagnosticCode};

    #[test]
    fn compile_error_counts_errors_only() {
        let code = DiagnosticCode::new(Category::Compiler, 0);
        let err = CompileError {
            source_name: "contracts/A.sol".to_string(),
            diagnostics: vec![
                Diagnostic::error(code, "bad"),
                Diagnostic::warning(code, "meh"),
                Diagnostic::error(code, "worse"),
            ],
        };
        assert_eq!(err.error_count(), 2);
        assert_eq!(
            err.to_string(),
            "contracts/A.sol failed to compile with 2 error(s)"
        );
    }

    #[test]
    fn cancelled_tool_maps_to_cancelled_failure() {
        let failure = CompileFailure::from(ToolError::Cancelled {
            command: "solc".to_string(),
        });
        assert!(matches!(failure, CompileFailure::Cancelled));
    }

    #[test]
    fn timeout_maps_to_tool_failure() {
        let failure = CompileFailure::from(ToolError::Timeout {
            command: "solc".to_string(),
            secs: 5,
        });
        assert!(matches!(failure, CompileFailure::Tool(_)));
        assert_eq!(failure.to_string(), "`solc` timed out after 5s");
    }

    #[test]
    fn only_cancellation_is_transient() {
        let diagnostics = CompileFailure::from(CompileError {
            source_name: "contracts/A.sol".to_string(),
            diagnostics: Vec::new(),
        });
        let spawn = CompileFailure::from(ToolError::Spawn {
            command: "solc".to_string(),
            source: Arc::new(std::io::Error::from(std::io::ErrorKind::NotFound)),
        });
        assert!(!diagnostics.is_transient());
        assert!(!spawn.clone().is_transient());
        assert!(CompileFailure::Cancelled.is_transient());
    }
}
