//! The aggregate result of a build.

use std::path::PathBuf;
use std::sync::Arc;

use keel_cache::{Artifact, Origin};
use keel_diagnostics::Diagnostic;
use keel_gas::GasReport;
use keel_sizer::SizeReport;
use keel_source::SourceTree;
use serde::Serialize;

use crate::state::{FailureCause, PipelineState};

/// Counters for the compile stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    /// Units submitted for compilation.
    pub units: usize,
    /// Units compiled by this build.
    pub compiled: usize,
    /// Units served from the in-memory tier.
    pub memory_hits: usize,
    /// Units served from the on-disk store.
    pub disk_hits: usize,
    /// Units compiled by a concurrent request and shared.
    pub coalesced: usize,
    /// Units that failed to compile.
    pub failed: usize,
    /// Units never started (abort or cancellation).
    pub skipped: usize,
}

impl BuildStats {
    /// Counts a successful unit by where its artifact came from.
    pub fn record(&mut self, origin: Origin) {
        match origin {
            Origin::Memory => self.memory_hits += 1,
            Origin::Disk => self.disk_hits += 1,
            Origin::Coalesced => self.coalesced += 1,
            Origin::Compiled => self.compiled += 1,
        }
    }

    /// Units served without compiling.
    pub fn cache_hits(&self) -> usize {
        self.memory_hits + self.disk_hits + self.coalesced
    }
}

/// What the doc stage produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocSummary {
    /// Documented contracts, in output order.
    pub contracts: Vec<String>,
    /// Files written.
    pub files: Vec<PathBuf>,
}

/// Everything a build produced, whether it succeeded or not.
#[derive(Debug, Default, Serialize)]
pub struct BuildReport {
    /// Every state entered, in order.
    pub states: Vec<PipelineState>,
    /// Successfully compiled artifacts, in compile order.
    #[serde(skip)]
    pub artifacts: Vec<Arc<Artifact>>,
    /// Sources that failed to compile.
    pub failed_units: Vec<String>,
    /// Artifact files written to the output directory.
    pub artifact_files: Vec<PathBuf>,
    /// Size stage result, when it ran.
    pub size: Option<SizeReport>,
    /// Gas stage result, when it ran.
    pub gas: Option<GasReport>,
    /// Doc stage result, when it ran.
    pub docs: Option<DocSummary>,
    /// Every diagnostic of the build, in the order stages reported them.
    pub diagnostics: Vec<Diagnostic>,
    /// Compile stage counters.
    pub stats: BuildStats,
    /// Set when the build failed.
    pub failure: Option<FailureCause>,
    /// The source tree the build ran over, for rendering locations.
    #[serde(skip)]
    pub tree: Option<SourceTree>,
}

impl BuildReport {
    /// The last state entered.
    pub fn final_state(&self) -> PipelineState {
        self.states.last().copied().unwrap_or(PipelineState::Idle)
    }

    /// Returns `true` if the build ended in [`PipelineState::Done`].
    pub fn is_success(&self) -> bool {
        self.final_state() == PipelineState::Done
    }

    /// Process exit code: `0` done, `2` failed on a size violation, `1` any
    /// other failure.
    pub fn exit_code(&self) -> i32 {
        match (&self.failure, self.final_state()) {
            (Some(FailureCause::SizeViolation { .. }), _) => 2,
            (_, PipelineState::Done) => 0,
            _ => 1,
        }
    }

    /// Names of all compiled contracts, in compile order.
    pub fn contract_names(&self) -> Vec<String> {
        self.artifacts
            .iter()
            .flat_map(|a| a.contract_names())
            .collect()
    }

    /// Number of error-severity diagnostics.
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    /// Number of warning-severity diagnostics.
    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == keel_diagnostics::Severity::Warning)
            .count()
    }

    pub(crate) fn enter(&mut self, state: PipelineState) {
        tracing::debug!(%state, "pipeline state");
        self.states.push(state);
    }

    /// Records the first failure cause; later causes are kept only as
    /// diagnostics.
    pub(crate) fn fail(&mut self, cause: FailureCause) {
        if self.failure.is_none() {
            self.failure = Some(cause);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        let mut report = BuildReport::default();
        report.enter(PipelineState::Idle);
        report.enter(PipelineState::Done);
        assert_eq!(report.exit_code(), 0);
        assert!(report.is_success());

        let mut report = BuildReport::default();
        report.fail(FailureCause::SizeViolation { contracts: 1 });
        report.enter(PipelineState::Failed);
        assert_eq!(report.exit_code(), 2);

        let mut report = BuildReport::default();
        report.fail(FailureCause::Cancelled);
        report.enter(PipelineState::Failed);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn first_failure_wins() {
        let mut report = BuildReport::default();
        report.fail(FailureCause::CompileErrors { units: 1 });
        report.fail(FailureCause::SizeViolation { contracts: 1 });
        assert_eq!(report.failure, Some(FailureCause::CompileErrors { units: 1 }));
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn stats_by_origin() {
        let mut stats = BuildStats::default();
        for origin in [Origin::Memory, Origin::Disk, Origin::Coalesced, Origin::Compiled] {
            stats.record(origin);
        }
        assert_eq!(stats.cache_hits(), 3);
        assert_eq!(stats.compiled, 1);
    }

    #[test]
    fn empty_report_is_idle() {
        let report = BuildReport::default();
        assert_eq!(report.final_state(), PipelineState::Idle);
        assert_eq!(report.exit_code(), 1);
    }
}
