//! The pipeline orchestrator.
//!
//! A [`Pipeline`] turns a resolved [`KeelConfig`](keel_config::KeelConfig)
//! into an ordered run of stages over the project's source tree:
//!
//! ```text
//! Idle -> Compiling -> {SizeChecking, GasProfiling, DocExtracting} -> Done | Failed
//! ```
//!
//! Units compile in parallel on a rayon pool through the shared
//! [`ArtifactCache`](keel_cache::ArtifactCache); the enabled post-compile
//! stages then run concurrently over the successfully compiled artifacts.
//! Every outcome, failures included, ends up in a [`BuildReport`].

#![warn(missing_docs)]

pub mod error;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod state;

pub use error::PipelineError;
pub use output::{artifact_path, write_artifacts};
pub use pipeline::{clean, Pipeline, KEEL_VERSION};
pub use report::{BuildReport, BuildStats, DocSummary};
pub use state::{FailureCause, PipelineState};
