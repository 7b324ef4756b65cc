//! The compiler adapter: turns a source unit and its imports into an
//! [`Artifact`](keel_cache::Artifact) or a structured failure.
//!
//! The contract compiler is an external black box. [`SolcCompiler`] drives a
//! `solc`-compatible executable through its standard-JSON interface, using the
//! timeout- and cancellation-aware [`run_tool`] runner, and normalises every
//! compiler message into a [`Diagnostic`](keel_diagnostics::Diagnostic).

#![warn(missing_docs)]

pub mod compiler;
pub mod error;
pub mod job;
pub mod solc;
pub mod tool;

pub use compiler::Compiler;
pub use error::{CompileError, CompileFailure, ToolError};
pub use job::{dependency_units, CompileJob};
pub use solc::SolcCompiler;
pub use tool::{run_tool, ToolInvocation, ToolOutput};
