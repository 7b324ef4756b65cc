//! Shared foundational types used across the Keel build orchestrator.
//!
//! This crate provides content hashing, cooperative cancellation and the
//! compiler settings snapshot used by every other crate in the workspace.

#![warn(missing_docs)]

pub mod cancel;
pub mod hash;
pub mod settings;

pub use cancel::CancellationToken;
pub use hash::{ContentHash, ContentHasher};
pub use settings::CompilerSettings;
