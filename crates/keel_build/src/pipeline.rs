//! The build pipeline.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keel_cache::{
    fingerprint_tree, Artifact, ArtifactCache, CacheOutcome, EvictionPolicy, Fingerprint,
};
use keel_common::{CancellationToken, CompilerSettings};
use keel_compiler::{
    dependency_units, CompileError, CompileFailure, CompileJob, Compiler, SolcCompiler, ToolError,
};
use keel_config::{KeelConfig, SizeSeverity};
use keel_diagnostics::{Category, Diagnostic, DiagnosticCode, Severity};
use keel_docgen::{extract, write_docs, DocRenderer, MarkdownRenderer, TemplateRenderer};
use keel_gas::{load_scenarios, profile, CommandExecutor, GasError, GasExecutor, GasPrice, GasReport};
use keel_sizer::{check_all, SizeOptions, SizeReport};
use keel_source::{SourceTree, UnitId};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::error::PipelineError;
use crate::output::write_artifacts;
use crate::report::{BuildReport, DocSummary};
use crate::state::{FailureCause, PipelineState};

/// Version recorded in cache headers and manifests.
pub const KEEL_VERSION: &str = env!("CARGO_PKG_VERSION");

const TOOL_FAILED: DiagnosticCode = DiagnosticCode {
    category: Category::Pipeline,
    number: 1,
};
const CANCELLED: DiagnosticCode = DiagnosticCode {
    category: Category::Pipeline,
    number: 2,
};
const STRICT_FAILURE: DiagnosticCode = DiagnosticCode {
    category: Category::Pipeline,
    number: 3,
};
const OUTPUT_FAILED: DiagnosticCode = DiagnosticCode {
    category: Category::Pipeline,
    number: 4,
};
const UNRESOLVED_IMPORT: DiagnosticCode = DiagnosticCode {
    category: Category::Source,
    number: 1,
};
const GAS_UNAVAILABLE: DiagnosticCode = DiagnosticCode {
    category: Category::Gas,
    number: 2,
};
const CACHE_FLUSH_FAILED: DiagnosticCode = DiagnosticCode {
    category: Category::Cache,
    number: 3,
};

/// Result of one unit in the compile stage.
enum UnitOutcome {
    Built(CacheOutcome),
    Failed(CompileError),
    Tool(ToolError),
    Cancelled,
    Skipped,
}

/// Diagnostics and failure of one post-compile stage.
#[derive(Default)]
struct StageOutput {
    diagnostics: Vec<Diagnostic>,
    failure: Option<FailureCause>,
}

/// A configured build over one project.
///
/// The pipeline owns the artifact cache, so repeated [`run`](Self::run)s in
/// one process share the in-memory tier.
pub struct Pipeline {
    root: PathBuf,
    config: KeelConfig,
    settings: CompilerSettings,
    cache: ArtifactCache,
    compiler: Box<dyn Compiler>,
    gas_executor: Option<Box<dyn GasExecutor>>,
    doc_renderer: Option<Box<dyn DocRenderer>>,
}

impl Pipeline {
    /// Creates a pipeline for the project at `root` using `compiler`.
    ///
    /// The gas executor comes from `gas.executor` and the doc renderer from
    /// `docs.template` unless replaced with the `with_*` builders.
    pub fn new(root: impl Into<PathBuf>, config: KeelConfig, compiler: Box<dyn Compiler>) -> Self {
        let root = root.into();
        let settings = config.compiler_settings();
        let policy = EvictionPolicy {
            max_entries: config.cache.max_entries,
            max_age: config.cache.max_age(),
        };
        let cache = ArtifactCache::open(&root.join(&config.paths.cache), KEEL_VERSION, policy);
        let gas_executor = CommandExecutor::new(config.gas.executor.clone(), config.gas.timeout())
            .map(|e| Box::new(e) as Box<dyn GasExecutor>);

        Self {
            root,
            config,
            settings,
            cache,
            compiler,
            gas_executor,
            doc_renderer: None,
        }
    }

    /// Creates a pipeline driving the configured `solc` executable, after
    /// checking that it reports the configured version.
    pub fn with_solc(
        root: impl Into<PathBuf>,
        config: KeelConfig,
        cancel: &CancellationToken,
    ) -> Result<Self, PipelineError> {
        let solc = SolcCompiler::new(&config.compiler.command, config.compiler.timeout());
        solc.verify_version(&config.compiler.version, cancel)?;
        Ok(Self::new(root, config, Box::new(solc)))
    }

    /// Replaces the gas workload executor.
    pub fn with_gas_executor(mut self, executor: Box<dyn GasExecutor>) -> Self {
        self.gas_executor = Some(executor);
        self
    }

    /// Replaces the documentation renderer.
    pub fn with_doc_renderer(mut self, renderer: Box<dyn DocRenderer>) -> Self {
        self.doc_renderer = Some(renderer);
        self
    }

    /// The project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The resolved configuration.
    pub fn config(&self) -> &KeelConfig {
        &self.config
    }

    /// The compiler settings every artifact of this pipeline is built with.
    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    /// The artifact cache.
    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Runs one build.
    ///
    /// Returns `Err` only when the build cannot start (unreadable sources,
    /// no worker pool). Everything that goes wrong once the build is running
    /// is recorded in the report, which then ends in
    /// [`PipelineState::Failed`].
    pub fn run(&self, cancel: &CancellationToken) -> Result<BuildReport, PipelineError> {
        let mut report = BuildReport::default();
        report.enter(PipelineState::Idle);

        let paths = &self.config.paths;
        let tree = SourceTree::discover(&self.root, &paths.sources, &paths.libraries)?;
        for u in tree.unresolved_imports() {
            report.diagnostics.push(Diagnostic::note(
                UNRESOLVED_IMPORT,
                format!(
                    "import \"{}\" in {} was not found in the project or its library directories",
                    u.import,
                    tree.unit(u.from).name
                ),
            ));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.build.jobs)
            .thread_name(|i| format!("keel-worker-{i}"))
            .build()
            .map_err(|e| PipelineError::ThreadPool(e.to_string()))?;

        report.enter(PipelineState::Compiling);
        self.compile_stage(&tree, &pool, cancel, &mut report);
        report.tree = Some(tree);
        if report.failure.is_some() {
            return Ok(self.finish(report));
        }

        match write_artifacts(
            &self.root.join(&paths.artifacts),
            &report.artifacts,
            &self.settings,
        ) {
            Ok(files) => report.artifact_files = files,
            Err(err) => {
                report
                    .diagnostics
                    .push(Diagnostic::error(OUTPUT_FAILED, err.to_string()));
                report.fail(FailureCause::Output {
                    message: err.to_string(),
                });
                return Ok(self.finish(report));
            }
        }

        self.post_stages(&pool, cancel, &mut report);
        if cancel.is_cancelled() && report.failure.is_none() {
            report
                .diagnostics
                .push(Diagnostic::error(CANCELLED, "build cancelled"));
            report.fail(FailureCause::Cancelled);
        }
        Ok(self.finish(report))
    }

    fn compile_stage(
        &self,
        tree: &SourceTree,
        pool: &ThreadPool,
        cancel: &CancellationToken,
        report: &mut BuildReport,
    ) {
        let fps = fingerprint_tree(tree, &self.settings);
        let abort = AtomicBool::new(false);
        let outcomes: Vec<UnitOutcome> = pool.install(|| {
            tree.targets()
                .par_iter()
                .map(|&id| self.compile_unit(tree, id, fps[id.index()], &abort, cancel))
                .collect()
        });

        report.stats.units = outcomes.len();
        let mut tool_error = None;
        let mut cancelled = false;
        for (outcome, &id) in outcomes.into_iter().zip(tree.targets()) {
            match outcome {
                UnitOutcome::Built(built) => {
                    report.stats.record(built.origin);
                    report.diagnostics.extend(built.warnings);
                    report
                        .diagnostics
                        .extend(built.artifact.diagnostics.iter().cloned());
                    report.artifacts.push(built.artifact);
                }
                UnitOutcome::Failed(err) => {
                    report.stats.failed += 1;
                    report.failed_units.push(err.source_name.clone());
                    report.diagnostics.extend(err.diagnostics);
                }
                UnitOutcome::Tool(err) => {
                    report.stats.failed += 1;
                    report.failed_units.push(tree.unit(id).name.clone());
                    tool_error.get_or_insert(err);
                }
                UnitOutcome::Cancelled => {
                    cancelled = true;
                    report.stats.skipped += 1;
                }
                UnitOutcome::Skipped => report.stats.skipped += 1,
            }
        }

        let stats = report.stats;
        tracing::info!(
            units = stats.units,
            compiled = stats.compiled,
            cached = stats.cache_hits(),
            failed = stats.failed,
            skipped = stats.skipped,
            "compile stage finished"
        );

        if let Some(err) = tool_error {
            report.diagnostics.push(
                Diagnostic::error(TOOL_FAILED, err.to_string())
                    .with_note(format!("{} unit(s) were not compiled", stats.skipped)),
            );
            report.fail(FailureCause::Tool {
                message: err.to_string(),
            });
        } else if cancelled || cancel.is_cancelled() {
            report
                .diagnostics
                .push(Diagnostic::error(CANCELLED, "build cancelled"));
            report.fail(FailureCause::Cancelled);
        } else if self.config.build.strict && stats.failed > 0 {
            report.diagnostics.push(
                Diagnostic::error(
                    STRICT_FAILURE,
                    format!("{} unit(s) failed to compile", stats.failed),
                )
                .with_help("disable `build.strict` to continue past failing units"),
            );
            report.fail(FailureCause::CompileErrors {
                units: stats.failed,
            });
        }
    }

    fn compile_unit(
        &self,
        tree: &SourceTree,
        id: UnitId,
        fp: Fingerprint,
        abort: &AtomicBool,
        cancel: &CancellationToken,
    ) -> UnitOutcome {
        if abort.load(Ordering::SeqCst) || cancel.is_cancelled() {
            return UnitOutcome::Skipped;
        }
        let unit = tree.unit(id);
        let result = self.cache.get_or_compile(fp, || {
            let deps = dependency_units(tree, id);
            let job = CompileJob {
                target: unit,
                dependencies: &deps,
                settings: &self.settings,
            };
            self.compiler.compile(&job, cancel)
        });

        match result {
            Ok(outcome) => {
                tracing::debug!(source = %unit.name, %fp, origin = ?outcome.origin, "unit ready");
                UnitOutcome::Built(outcome)
            }
            Err(CompileFailure::Diagnostics(err)) => {
                tracing::debug!(source = %unit.name, errors = err.error_count(), "unit failed");
                UnitOutcome::Failed(err)
            }
            Err(CompileFailure::Tool(err)) => {
                abort.store(true, Ordering::SeqCst);
                tracing::error!(source = %unit.name, "compiler invocation failed: {err}");
                UnitOutcome::Tool(err)
            }
            Err(CompileFailure::Cancelled) => UnitOutcome::Cancelled,
        }
    }

    /// Runs the enabled post-compile stages concurrently. States are recorded
    /// in a fixed order before the stages start.
    fn post_stages(&self, pool: &ThreadPool, cancel: &CancellationToken, report: &mut BuildReport) {
        let size_enabled = self.config.size.enabled;
        let gas_enabled = self.config.gas.enabled;
        let docs_enabled = self.config.docs.is_enabled();

        for (enabled, state) in [
            (size_enabled, PipelineState::SizeChecking),
            (gas_enabled, PipelineState::GasProfiling),
            (docs_enabled, PipelineState::DocExtracting),
        ] {
            if enabled {
                report.enter(state);
            }
        }

        let artifacts = &report.artifacts;
        let mut size = None;
        let mut gas = None;
        let mut docs = None;
        pool.install(|| {
            rayon::scope(|s| {
                if size_enabled {
                    s.spawn(|_| size = Some(self.size_stage(artifacts)));
                }
                if gas_enabled {
                    s.spawn(|_| gas = Some(self.gas_stage(artifacts, cancel)));
                }
                if docs_enabled {
                    s.spawn(|_| docs = Some(self.docs_stage(artifacts)));
                }
            });
        });

        let mut outputs = Vec::new();
        if let Some((result, output)) = size {
            report.size = Some(result);
            outputs.push(output);
        }
        if let Some((result, output)) = gas {
            report.gas = result;
            outputs.push(output);
        }
        if let Some((result, output)) = docs {
            report.docs = Some(result);
            outputs.push(output);
        }
        for output in outputs {
            report.diagnostics.extend(output.diagnostics);
            if let Some(cause) = output.failure {
                report.fail(cause);
            }
        }
    }

    fn size_stage(&self, artifacts: &[Arc<Artifact>]) -> (SizeReport, StageOutput) {
        let config = &self.config.size;
        let options = SizeOptions {
            ceiling: config.ceiling_bytes,
            alpha_sort: config.alpha_sort,
            disambiguate_paths: config.disambiguate_paths,
        };
        let result = check_all(artifacts.iter().map(Arc::as_ref), &options);

        let severity = match config.severity {
            SizeSeverity::Error => Severity::Error,
            SizeSeverity::Warning => Severity::Warning,
        };
        let violations = result.violations().count();
        let output = StageOutput {
            diagnostics: result.diagnostics(severity),
            failure: (severity.is_error() && violations > 0).then_some(
                FailureCause::SizeViolation {
                    contracts: violations,
                },
            ),
        };
        (result, output)
    }

    fn gas_stage(
        &self,
        artifacts: &[Arc<Artifact>],
        cancel: &CancellationToken,
    ) -> (Option<GasReport>, StageOutput) {
        let mut output = StageOutput::default();
        let unavailable = |reason: String| {
            tracing::warn!("gas report skipped: {reason}");
            Diagnostic::warning(GAS_UNAVAILABLE, format!("gas report skipped: {reason}"))
        };

        let scenarios = match load_scenarios(&self.root.join(&self.config.gas.scenarios)) {
            Ok(scenarios) => scenarios,
            Err(err) => {
                output.diagnostics.push(unavailable(err.to_string()));
                return (None, output);
            }
        };
        let Some(executor) = self.gas_executor.as_deref() else {
            output
                .diagnostics
                .push(unavailable("no gas executor configured".to_string()));
            return (None, output);
        };

        let gas = &self.config.gas;
        let price = GasPrice {
            price_gwei: gas.price_gwei,
            token_price: gas.token_price,
            currency: gas.currency.clone(),
        };
        match profile(
            artifacts.iter().map(Arc::as_ref),
            &scenarios,
            executor,
            &price,
            cancel,
        ) {
            Ok(result) => {
                output.diagnostics.extend(result.notes.iter().cloned());
                (Some(result), output)
            }
            Err(GasError::Cancelled) => {
                output.failure = Some(FailureCause::Cancelled);
                (None, output)
            }
            Err(err) => {
                output.diagnostics.push(unavailable(err.to_string()));
                (None, output)
            }
        }
    }

    fn docs_stage(&self, artifacts: &[Arc<Artifact>]) -> (DocSummary, StageOutput) {
        let config = &self.config.docs;
        let set = extract(
            artifacts.iter().map(Arc::as_ref),
            &config.allow_list,
            config.alpha_sort,
        );
        let mut summary = DocSummary {
            contracts: set.names().into_iter().map(str::to_string).collect(),
            files: Vec::new(),
        };

        // Failures only fail the build when docs are part of every compile.
        let severity = if config.run_on_compile {
            Severity::Error
        } else {
            Severity::Warning
        };
        let mut output = StageOutput::default();
        let fail_all = |output: &mut StageOutput, message: String| {
            output.diagnostics.push(Diagnostic::new(
                severity,
                keel_docgen::RENDER_FAILED,
                format!("documentation not generated: {message}"),
            ));
            if config.run_on_compile && !set.is_empty() {
                output.failure = Some(FailureCause::Docs {
                    contracts: set.contracts.len(),
                });
            }
        };

        let loaded;
        let renderer: &dyn DocRenderer = match (&self.doc_renderer, &config.template) {
            (Some(renderer), _) => renderer.as_ref(),
            (None, Some(template)) => match TemplateRenderer::load(&self.root.join(template)) {
                Ok(r) => {
                    loaded = r;
                    &loaded
                }
                Err(err) => {
                    fail_all(&mut output, err.to_string());
                    return (summary, output);
                }
            },
            (None, None) => &MarkdownRenderer,
        };

        match write_docs(&set, renderer, &self.root.join(&self.config.paths.docs)) {
            Ok(written) => {
                summary.files = written.written;
                output
                    .diagnostics
                    .extend(written.failures.iter().map(|f| f.diagnostic(severity)));
                if config.run_on_compile && !written.failures.is_empty() {
                    output.failure = Some(FailureCause::Docs {
                        contracts: written.failures.len(),
                    });
                }
            }
            Err(err) => fail_all(&mut output, err.to_string()),
        }
        (summary, output)
    }

    fn finish(&self, mut report: BuildReport) -> BuildReport {
        match self.cache.flush() {
            Ok(evicted) if evicted > 0 => tracing::debug!(evicted, "expired cache entries evicted"),
            Ok(_) => {}
            Err(err) => {
                tracing::warn!("failed to persist cache manifest: {err}");
                report.diagnostics.push(Diagnostic::warning(
                    CACHE_FLUSH_FAILED,
                    format!("cache manifest not saved: {err}"),
                ));
            }
        }

        let state = if report.failure.is_some() {
            PipelineState::Failed
        } else {
            PipelineState::Done
        };
        report.enter(state);
        match &report.failure {
            Some(cause) => tracing::info!(%cause, "build failed"),
            None => tracing::info!(
                artifacts = report.artifacts.len(),
                warnings = report.warning_count(),
                "build finished"
            ),
        }
        report
    }
}

/// Removes the cache and artifacts directories of a project. Returns the
/// directories that existed and were removed.
pub fn clean(root: &Path, config: &KeelConfig) -> Result<Vec<PathBuf>, PipelineError> {
    let mut removed = Vec::new();

    let cache_dir = root.join(&config.paths.cache);
    if cache_dir.exists() {
        ArtifactCache::open(&cache_dir, KEEL_VERSION, EvictionPolicy::default()).clear()?;
        removed.push(cache_dir);
    }

    let artifacts_dir = root.join(&config.paths.artifacts);
    match std::fs::remove_dir_all(&artifacts_dir) {
        Ok(()) => removed.push(artifacts_dir),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(PipelineError::Io {
                path: artifacts_dir,
                source: e,
            })
        }
    }

    tracing::debug!(removed = removed.len(), "cleaned build outputs");
    Ok(removed)
}
