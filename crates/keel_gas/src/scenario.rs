//! Loading call scenarios from TOML.
//!
//! ```toml
//! [[scenario]]
//! name = "deposit"
//! contract = "Vault"
//! method = "deposit(uint256)"
//! calldata = "0xb6b55f25..."
//! repeat = 3
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GasError;

/// One call to profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GasScenario {
    /// Unique scenario name.
    pub name: String,
    /// Name of the compiled contract to call.
    pub contract: String,
    /// Method signature or name; the report groups calls by it.
    pub method: String,
    /// Hex-encoded calldata passed through to the executor.
    #[serde(default)]
    pub calldata: Option<String>,
    /// How many times the call is executed.
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

fn default_repeat() -> u32 {
    1
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioFile {
    #[serde(default)]
    scenario: Vec<GasScenario>,
}

/// Reads and validates a scenarios file.
pub fn load_scenarios(path: &Path) -> Result<Vec<GasScenario>, GasError> {
    let text = std::fs::read_to_string(path).map_err(|e| GasError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_scenarios(&text, path)
}

/// Parses and validates scenarios from TOML text. `path` is only used in
/// error messages.
pub fn parse_scenarios(text: &str, path: &Path) -> Result<Vec<GasScenario>, GasError> {
    let file: ScenarioFile = toml::from_str(text).map_err(|e| GasError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut seen = HashSet::new();
    for s in &file.scenario {
        let invalid = |reason: &str| GasError::InvalidScenario {
            name: s.name.clone(),
            reason: reason.to_string(),
        };
        if s.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if !seen.insert(s.name.as_str()) {
            return Err(invalid("duplicate scenario name"));
        }
        if s.contract.trim().is_empty() {
            return Err(invalid("contract must not be empty"));
        }
        if s.method.trim().is_empty() {
            return Err(invalid("method must not be empty"));
        }
        if s.repeat == 0 {
            return Err(invalid("repeat must be at least 1"));
        }
    }
    Ok(file.scenario)
}
