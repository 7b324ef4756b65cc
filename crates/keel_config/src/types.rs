//! Configuration types deserialized from `keel.toml`.
//!
//! Every section is optional and every key has a default except
//! `compiler.version`. Unknown keys are rejected so that typos surface as
//! configuration errors instead of silently falling back to defaults.

use keel_common::CompilerSettings;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// The top-level project configuration parsed from `keel.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeelConfig {
    /// Project metadata.
    pub project: ProjectMeta,
    /// Compiler version, optimizer and invocation settings.
    pub compiler: CompilerConfig,
    /// Directory layout.
    pub paths: PathsConfig,
    /// Contract size checking.
    pub size: SizeConfig,
    /// Gas reporting.
    pub gas: GasConfig,
    /// Documentation extraction.
    pub docs: DocsConfig,
    /// Pipeline execution.
    pub build: BuildConfig,
    /// Artifact cache eviction.
    pub cache: CacheConfig,
}

impl KeelConfig {
    /// Returns the compiler settings snapshot for a build.
    pub fn compiler_settings(&self) -> CompilerSettings {
        CompilerSettings {
            version: self.compiler.version.clone(),
            optimizer_enabled: self.compiler.optimizer.enabled,
            optimizer_runs: self.compiler.optimizer.runs,
            evm_version: self.compiler.evm_version.clone(),
        }
    }
}

/// Project metadata.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectMeta {
    /// The project name, used in status output only.
    pub name: String,
}

/// Compiler configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Exact compiler version (required), e.g. `0.8.6`.
    pub version: String,
    /// Compiler executable invoked in standard-JSON mode.
    pub command: String,
    /// Seconds a single compiler invocation may run before it is killed.
    pub timeout_secs: u64,
    /// Target EVM version passed to the compiler.
    pub evm_version: Option<String>,
    /// Optimizer settings.
    pub optimizer: OptimizerConfig,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            version: String::new(),
            command: "solc".to_string(),
            timeout_secs: 120,
            evm_version: None,
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl CompilerConfig {
    /// Returns the compiler timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Optimizer settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerConfig {
    /// Whether the optimizer runs.
    pub enabled: bool,
    /// Optimizer runs parameter.
    pub runs: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            runs: 200,
        }
    }
}

/// Directory layout, relative to the project root.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Directory scanned for contract sources.
    pub sources: PathBuf,
    /// Directory compiled artifacts are written to.
    pub artifacts: PathBuf,
    /// Directory holding the persistent artifact cache.
    pub cache: PathBuf,
    /// Directory rendered documentation is written to.
    pub docs: PathBuf,
    /// Directories searched for non-relative imports.
    pub libraries: Vec<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sources: PathBuf::from("contracts"),
            artifacts: PathBuf::from("artifacts"),
            cache: PathBuf::from("cache"),
            docs: PathBuf::from("docs"),
            libraries: vec![PathBuf::from("node_modules")],
        }
    }
}

/// How a contract exceeding the size ceiling affects the build.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SizeSeverity {
    /// Report the violation and keep going (default).
    #[default]
    Warning,
    /// Fail the build.
    Error,
}

/// Contract size checking.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizeConfig {
    /// Whether the size check runs.
    pub enabled: bool,
    /// Maximum deployed bytecode size in bytes.
    pub ceiling_bytes: u64,
    /// Severity of a violation.
    pub severity: SizeSeverity,
    /// Sort the size table alphabetically instead of compile order.
    pub alpha_sort: bool,
    /// Show contracts as `source:Name` instead of the bare name.
    pub disambiguate_paths: bool,
}

impl Default for SizeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ceiling_bytes: 24_576,
            severity: SizeSeverity::Warning,
            alpha_sort: false,
            disambiguate_paths: false,
        }
    }
}

/// Gas reporting.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GasConfig {
    /// Whether the gas report runs.
    pub enabled: bool,
    /// Currency the cost estimate is expressed in.
    pub currency: String,
    /// Gas price in gwei.
    pub price_gwei: f64,
    /// Price of one native token in `currency`. Costs are omitted when unset.
    pub token_price: Option<f64>,
    /// Scenario file listing the calls to profile.
    pub scenarios: PathBuf,
    /// Workload runner command line; the first element is the executable.
    pub executor: Vec<String>,
    /// Seconds a single workload invocation may run.
    pub timeout_secs: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            currency: "USD".to_string(),
            price_gwei: 100.0,
            token_price: None,
            scenarios: PathBuf::from("gas-scenarios.toml"),
            executor: Vec::new(),
            timeout_secs: 300,
        }
    }
}

impl GasConfig {
    /// Returns the workload timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Documentation extraction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocsConfig {
    /// Generate docs on every build; a render failure then fails the build.
    pub run_on_compile: bool,
    /// Exact names of the contracts to document.
    pub allow_list: Vec<String>,
    /// Template file; the built-in markdown layout is used when unset.
    pub template: Option<PathBuf>,
    /// Order documented contracts alphabetically instead of compile order.
    pub alpha_sort: bool,
    /// Command-line request to generate docs regardless of `run_on_compile`.
    #[serde(skip)]
    pub requested: Option<bool>,
}

impl DocsConfig {
    /// Returns `true` if the doc stage runs for this build.
    pub fn is_enabled(&self) -> bool {
        self.requested.unwrap_or(self.run_on_compile)
    }
}

/// Pipeline execution.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Fail the build when any unit fails to compile.
    pub strict: bool,
    /// Worker threads for compilation; 0 uses available parallelism.
    pub jobs: usize,
}

/// Artifact cache eviction. Unbounded when unset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum number of cached artifacts.
    pub max_entries: Option<usize>,
    /// Maximum age in seconds of an unused cached artifact.
    pub max_age_secs: Option<u64>,
}

impl CacheConfig {
    /// Returns the maximum age as a [`Duration`].
    pub fn max_age(&self) -> Option<Duration> {
        self.max_age_secs.map(Duration::from_secs)
    }
}
