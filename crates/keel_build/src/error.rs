//! Errors that prevent a build from running at all.

use std::path::PathBuf;

use keel_cache::CacheError;
use keel_compiler::ToolError;
use keel_config::ConfigError;
use keel_source::SourceError;

/// A build could not be set up.
///
/// Problems inside a running build (compile errors, tool failures, size
/// violations, cancellation) end the build in
/// [`PipelineState::Failed`](crate::PipelineState::Failed) instead and are
/// reported through the [`BuildReport`](crate::BuildReport).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The source tree could not be loaded.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The compiler could not be run or is the wrong version.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The artifact cache could not be cleared.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A filesystem operation on build outputs failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The worker pool could not be created.
    #[error("failed to start worker pool: {0}")]
    ThreadPool(String),
}
