//! Parsing and validation of `keel.toml` project configuration files.
//!
//! This crate reads the project configuration file and produces a strongly-typed
//! [`KeelConfig`] with every option defaulted, validated, and optionally
//! overridden from the command line through [`BuildOverrides`].

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod overrides;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILE};
pub use overrides::BuildOverrides;
pub use types::*;
