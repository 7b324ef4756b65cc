//! Command-line overrides applied on top of a loaded configuration.

use crate::error::ConfigError;
use crate::loader::validate_config;
use crate::types::KeelConfig;

/// Stage toggles and execution settings supplied on the command line.
///
/// `None` leaves the configured value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOverrides {
    /// Overrides `size.enabled`.
    pub size_check: Option<bool>,
    /// Overrides `gas.enabled`.
    pub gas_report: Option<bool>,
    /// Requests or suppresses doc generation.
    pub docs: Option<bool>,
    /// Forces strict mode on.
    pub strict: Option<bool>,
    /// Overrides `build.jobs`.
    pub jobs: Option<usize>,
}

impl BuildOverrides {
    /// Applies the overrides and re-validates the result.
    ///
    /// Enabling a stage on the command line is held to the same rules as
    /// enabling it in `keel.toml` (e.g. `--gas-report` needs `gas.executor`).
    pub fn apply(&self, mut config: KeelConfig) -> Result<KeelConfig, ConfigError> {
        if let Some(enabled) = self.size_check {
            config.size.enabled = enabled;
        }
        if let Some(enabled) = self.gas_report {
            config.gas.enabled = enabled;
        }
        if let Some(enabled) = self.docs {
            config.docs.requested = Some(enabled);
        }
        if let Some(strict) = self.strict {
            config.build.strict = strict;
        }
        if let Some(jobs) = self.jobs {
            config.build.jobs = jobs;
        }
        validate_config(&config)?;
        Ok(config)
    }
}
