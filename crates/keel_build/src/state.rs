//! Pipeline states and failure causes.

use std::fmt;

use serde::Serialize;

/// A state of the build pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Configuration resolved, nothing started.
    Idle,
    /// Compiling source units.
    Compiling,
    /// Checking contract sizes.
    SizeChecking,
    /// Running gas scenarios.
    GasProfiling,
    /// Extracting and rendering documentation.
    DocExtracting,
    /// Every enabled stage completed.
    Done,
    /// A hard failure ended the build.
    Failed,
}

impl PipelineState {
    /// Returns `true` for [`Done`](Self::Done) and [`Failed`](Self::Failed).
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Compiling => "compiling",
            PipelineState::SizeChecking => "size checking",
            PipelineState::GasProfiling => "gas profiling",
            PipelineState::DocExtracting => "doc extracting",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why a build ended in [`PipelineState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureCause {
    /// The compiler could not be run. Remaining units were skipped.
    Tool {
        /// Tool error message.
        message: String,
    },
    /// Units failed to compile in strict mode.
    CompileErrors {
        /// Number of failed units.
        units: usize,
    },
    /// Contracts exceed the size ceiling and violations are errors.
    SizeViolation {
        /// Number of oversized contracts.
        contracts: usize,
    },
    /// Documentation failed while `docs.run_on_compile` is set.
    Docs {
        /// Number of contracts without documentation.
        contracts: usize,
    },
    /// Build outputs could not be written.
    Output {
        /// Error message.
        message: String,
    },
    /// The build was cancelled.
    Cancelled,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Tool { message } => write!(f, "compiler invocation failed: {message}"),
            FailureCause::CompileErrors { units } => {
                write!(f, "{units} unit(s) failed to compile in strict mode")
            }
            FailureCause::SizeViolation { contracts } => {
                write!(f, "{contracts} contract(s) exceed the size ceiling")
            }
            FailureCause::Docs { contracts } => {
                write!(f, "documentation failed for {contracts} contract(s)")
            }
            FailureCause::Output { message } => write!(f, "failed to write artifacts: {message}"),
            FailureCause::Cancelled => f.write_str("build cancelled"),
        }
    }
}
