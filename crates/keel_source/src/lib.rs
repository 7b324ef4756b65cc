//! Source tree management for contract sources.
//!
//! This crate discovers source units under the project's sources directory,
//! scans them for imports and contract declarations, resolves imports into a
//! dependency graph (including library directories), and maps compiler
//! locations back to human-readable line/column coordinates.

#![warn(missing_docs)]

pub mod error;
pub mod location;
pub mod scan;
pub mod source_unit;
pub mod tree;
pub mod unit_id;

pub use error::SourceError;
pub use location::{Location, ResolvedLocation};
pub use scan::{ContractKind, Declaration};
pub use source_unit::SourceUnit;
pub use tree::{resolve_import_name, SourceTree, UnresolvedImport};
pub use unit_id::UnitId;
