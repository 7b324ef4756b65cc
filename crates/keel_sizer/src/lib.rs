//! Contract size guard.
//!
//! Compares the deployed bytecode size of every compiled contract against a
//! configured ceiling (24576 bytes on mainnet). The check itself is a pure
//! comparison; the caller decides whether a violation is a warning or fails
//! the build.

#![warn(missing_docs)]

pub mod report;

pub use report::{check, check_all, SizeEntry, SizeOptions, SizeReport, SIZE_VIOLATION};
