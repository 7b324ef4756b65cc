//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::KeelConfig;
use std::path::{Component, Path, PathBuf};

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "keel.toml";

/// Loads and validates a `keel.toml` configuration from a project directory.
///
/// Reads `<project_dir>/keel.toml`, parses it, and validates required fields.
pub fn load_config(project_dir: &Path) -> Result<KeelConfig, ConfigError> {
    load_config_file(&project_dir.join(CONFIG_FILE))
}

/// Loads and validates a configuration from an explicit file path.
pub fn load_config_file(path: &Path) -> Result<KeelConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `keel.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<KeelConfig, ConfigError> {
    let config: KeelConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and values are consistent.
pub(crate) fn validate_config(config: &KeelConfig) -> Result<(), ConfigError> {
    let compiler = &config.compiler;
    if compiler.version.is_empty() {
        return Err(ConfigError::MissingField("compiler.version".to_string()));
    }
    if !is_exact_version(&compiler.version) {
        return Err(ConfigError::ValidationError(format!(
            "compiler.version '{}' is not an exact version (expected e.g. 0.8.6)",
            compiler.version
        )));
    }
    if compiler.command.is_empty() {
        return Err(ConfigError::ValidationError(
            "compiler.command must not be empty".to_string(),
        ));
    }
    if compiler.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "compiler.timeout_secs must be positive".to_string(),
        ));
    }
    if compiler.optimizer.enabled && compiler.optimizer.runs == 0 {
        return Err(ConfigError::ValidationError(
            "compiler.optimizer.runs must be positive when the optimizer is enabled".to_string(),
        ));
    }

    let paths = &config.paths;
    let mut inputs = vec![("paths.sources".to_string(), &paths.sources)];
    inputs.extend(
        paths
            .libraries
            .iter()
            .map(|lib| (format!("paths.libraries entry '{}'", lib.display()), lib)),
    );
    for (key, path) in [
        ("paths.artifacts", &paths.artifacts),
        ("paths.cache", &paths.cache),
        ("paths.docs", &paths.docs),
    ] {
        let dir = output_dir(key, path)?;
        for (input_key, input) in &inputs {
            // Inputs outside the root cannot overlap a root-relative output.
            let Some(input) = lexical_relative(input) else {
                continue;
            };
            if dir.starts_with(&input) || input.starts_with(&dir) {
                return Err(ConfigError::ValidationError(format!(
                    "{key} '{}' overlaps {input_key}",
                    path.display()
                )));
            }
        }
    }

    if config.size.ceiling_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "size.ceiling_bytes must be positive".to_string(),
        ));
    }

    let gas = &config.gas;
    if !gas.price_gwei.is_finite() || gas.price_gwei < 0.0 {
        return Err(ConfigError::ValidationError(
            "gas.price_gwei must be a non-negative number".to_string(),
        ));
    }
    if let Some(price) = gas.token_price {
        if !price.is_finite() || price < 0.0 {
            return Err(ConfigError::ValidationError(
                "gas.token_price must be a non-negative number".to_string(),
            ));
        }
    }
    if gas.enabled && gas.executor.is_empty() {
        return Err(ConfigError::MissingField("gas.executor".to_string()));
    }

    if config.docs.allow_list.iter().any(|name| name.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "docs.allow_list must not contain empty names".to_string(),
        ));
    }

    if config.cache.max_entries == Some(0) {
        return Err(ConfigError::ValidationError(
            "cache.max_entries must be positive".to_string(),
        ));
    }

    Ok(())
}

/// Checks that an output directory sits strictly below the project root.
///
/// Outputs are pruned and removed by `keel clean`, so absolute paths and `..`
/// components are refused outright.
fn output_dir(key: &str, path: &Path) -> Result<PathBuf, ConfigError> {
    let mut dir = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => dir.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ConfigError::ValidationError(format!(
                    "{key} '{}' must be a relative path without '..'",
                    path.display()
                )));
            }
        }
    }
    if dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "{key} must name a directory below the project root"
        )));
    }
    Ok(dir)
}

/// Resolves `.` and `..` in a root-relative path; `None` if it leaves the root.
fn lexical_relative(path: &Path) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.into_iter().collect())
}

/// Returns `true` for `MAJOR.MINOR.PATCH`, optionally followed by `+build`.
fn is_exact_version(version: &str) -> bool {
    let core = version.split('+').next().unwrap_or(version);
    let parts: Vec<&str> = core.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}
