//! Scenario test helpers for the keel build pipeline.
//!
//! Provides a deterministic, counting mock compiler, a gas executor with
//! fixed costs and an on-disk project fixture, so integration tests can drive
//! full builds without a real `solc`.

#![warn(missing_docs)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use keel_build::{BuildReport, Pipeline};
use keel_cache::{Artifact, CompiledContract};
use keel_common::{CancellationToken, CompilerSettings};
use keel_compiler::{CompileError, CompileFailure, CompileJob, Compiler};
use keel_config::{load_config, KeelConfig, CONFIG_FILE};
use keel_diagnostics::{Category, Diagnostic, DiagnosticCode};
use keel_gas::{GasCall, GasError, GasExecutor};
use keel_source::SourceUnit;
use tempfile::TempDir;

/// Marker line setting a contract's runtime size: `// @size Name 24000`.
pub const SIZE_MARKER: &str = "// @size";

/// Marker that makes a source fail to compile.
pub const ERROR_MARKER: &str = "// @error";

/// A compiler that derives bytecode from source text and settings.
///
/// Clones share one call log, so a test can keep a handle after boxing a
/// clone into a [`Pipeline`]. Output is a pure function of the job.
#[derive(Clone, Default)]
pub struct MockCompiler {
    log: Arc<Mutex<Vec<String>>>,
    delay: Duration,
}

impl MockCompiler {
    /// Creates a compiler that answers immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a compiler that sleeps for `delay` before each compilation.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Number of compilations performed so far.
    pub fn calls(&self) -> usize {
        self.lock().len()
    }

    /// Source-unit names compiled so far, in call order.
    pub fn compiled(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Forgets earlier calls.
    pub fn reset(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Compiler for MockCompiler {
    fn compile(
        &self,
        job: &CompileJob<'_>,
        cancel: &CancellationToken,
    ) -> Result<Artifact, CompileFailure> {
        if cancel.is_cancelled() {
            return Err(CompileFailure::Cancelled);
        }
        self.lock().push(job.target.name.clone());
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        mock_artifact(job.target, job.settings)
    }
}

/// Builds the artifact [`MockCompiler`] produces for `unit`.
pub fn mock_artifact(
    unit: &SourceUnit,
    settings: &CompilerSettings,
) -> Result<Artifact, CompileFailure> {
    if unit.content.contains(ERROR_MARKER) {
        return Err(CompileError {
            source_name: unit.name.clone(),
            diagnostics: vec![Diagnostic::error(
                DiagnosticCode::new(Category::Compiler, 2314),
                "Expected ';' but got '}'",
            )],
        }
        .into());
    }

    let sizes = declared_sizes(&unit.content);
    let seed = unit.content.bytes().fold(0u8, |acc, b| acc.wrapping_add(b));
    let contracts = unit
        .declared_names()
        .map(|name| {
            let size = sizes
                .get(name)
                .copied()
                .unwrap_or(32 + unit.content.len());
            let runtime = format!("{seed:02x}").repeat(size);
            let optimizer = if settings.optimizer_enabled { "01" } else { "00" };
            CompiledContract {
                name: name.to_string(),
                source: unit.name.clone(),
                abi: format!(r#"[{{"type":"function","name":"ping{name}"}}]"#),
                bytecode: format!("6080{runtime}{optimizer}{:08x}", settings.optimizer_runs),
                deployed_bytecode: runtime,
                devdoc: format!(r#"{{"title":"{name}","details":"Built by the mock."}}"#),
                userdoc: format!(r#"{{"notice":"{name} contract"}}"#),
            }
        })
        .collect();
    Ok(Artifact::new(unit.name.clone(), contracts))
}

fn declared_sizes(content: &str) -> HashMap<&str, usize> {
    content
        .lines()
        .filter_map(|line| line.trim().strip_prefix(SIZE_MARKER))
        .filter_map(|rest| {
            let mut parts = rest.split_whitespace();
            let name = parts.next()?;
            let size = parts.next()?.parse().ok()?;
            Some((name, size))
        })
        .collect()
}

/// A gas executor with a fixed cost per method name.
///
/// Unknown methods report no measurement.
#[derive(Debug, Clone, Default)]
pub struct FixedGas {
    costs: HashMap<String, u64>,
}

impl FixedGas {
    /// Creates an executor from `(method, gas)` pairs.
    pub fn new<'a>(costs: impl IntoIterator<Item = (&'a str, u64)>) -> Self {
        Self {
            costs: costs
                .into_iter()
                .map(|(m, g)| (m.to_string(), g))
                .collect(),
        }
    }
}

impl GasExecutor for FixedGas {
    fn execute(
        &self,
        call: &GasCall<'_>,
        cancel: &CancellationToken,
    ) -> Result<Option<u64>, GasError> {
        if cancel.is_cancelled() {
            return Err(GasError::Cancelled);
        }
        Ok(self.costs.get(&call.scenario.method).copied())
    }
}

/// A project on disk with a `keel.toml`, removed when dropped.
pub struct Project {
    dir: TempDir,
}

impl Project {
    /// Creates a project pinned to compiler 0.8.6 with default settings.
    pub fn new() -> Self {
        Self::with_config("")
    }

    /// Creates a project whose `keel.toml` has `extra` appended.
    pub fn with_config(extra: &str) -> Self {
        let project = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        project.set_config(extra);
        project
    }

    /// The project root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Joins `rel` onto the project root.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    /// Rewrites `keel.toml` with `extra` appended to the base settings.
    pub fn set_config(&self, extra: &str) {
        let text = format!("[project]\nname = \"conformance\"\n\n[compiler]\nversion = \"0.8.6\"\n{extra}");
        std::fs::write(self.path(CONFIG_FILE), text).unwrap();
    }

    /// Writes a file relative to the project root.
    pub fn write(&self, rel: &str, content: &str) -> &Self {
        let path = self.path(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
        self
    }

    /// Loads the project's configuration.
    pub fn config(&self) -> KeelConfig {
        load_config(self.root()).unwrap()
    }

    /// Creates a pipeline over this project driven by `compiler`.
    pub fn pipeline(&self, compiler: &MockCompiler) -> Pipeline {
        Pipeline::new(self.root(), self.config(), Box::new(compiler.clone()))
    }

    /// Runs one build with a fresh pipeline.
    pub fn build(&self, compiler: &MockCompiler) -> BuildReport {
        self.pipeline(compiler)
            .run(&CancellationToken::new())
            .unwrap()
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}
