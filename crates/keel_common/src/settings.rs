//! Compiler settings shared by every stage of a build.

use serde::{Deserialize, Serialize};

/// The compiler settings snapshot a build runs under.
///
/// Resolved once from configuration and shared by reference for the whole
/// run, so every artifact of a build comes from the same settings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompilerSettings {
    /// Exact compiler version, e.g. `0.8.6`.
    pub version: String,
    /// Whether the optimizer is enabled.
    pub optimizer_enabled: bool,
    /// Optimizer runs parameter.
    pub optimizer_runs: u32,
    /// Target EVM version, or `None` for the compiler default.
    pub evm_version: Option<String>,
}

impl CompilerSettings {
    /// Creates settings for the given version with the optimizer disabled.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            optimizer_enabled: false,
            optimizer_runs: 200,
            evm_version: None,
        }
    }

    /// Returns a copy with the optimizer enabled for the given runs.
    pub fn with_optimizer(mut self, runs: u32) -> Self {
        self.optimizer_enabled = true;
        self.optimizer_runs = runs;
        self
    }
}
