//! Gas profiling errors.

use std::path::PathBuf;

use keel_compiler::ToolError;

/// Errors raised while loading scenarios or executing calls.
#[derive(Debug, thiserror::Error)]
pub enum GasError {
    /// The scenarios file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The scenarios file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The scenarios file is not valid TOML or has the wrong shape.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// The scenarios file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A scenario is well-formed TOML but unusable.
    #[error("invalid gas scenario `{name}`: {reason}")]
    InvalidScenario {
        /// Scenario name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The workload executor could not be run.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The workload executor produced output that could not be understood.
    #[error("gas executor produced invalid output: {0}")]
    InvalidOutput(String),

    /// Profiling was cancelled.
    #[error("gas profiling cancelled")]
    Cancelled,
}
