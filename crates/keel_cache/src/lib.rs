//! Fingerprinting and artifact caching for incremental contract builds.
//!
//! A [`Fingerprint`] captures everything that determines a compilation result:
//! the unit's content, the compiler settings, and the fingerprints of its
//! imports. The [`ArtifactCache`] maps fingerprints to compiled [`Artifact`]s
//! in two tiers (an in-memory LRU and an on-disk store indexed by a JSON
//! manifest) and guarantees at most one in-flight compilation per
//! fingerprint.

#![warn(missing_docs)]

pub mod artifact;
pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod manifest;
pub mod store;

pub use artifact::{Artifact, CompiledContract};
pub use cache::{ArtifactCache, CacheOutcome, EvictionPolicy, Origin, SharedFailure};
pub use error::CacheError;
pub use fingerprint::{fingerprint, fingerprint_tree, Fingerprint};
pub use manifest::{CacheManifest, ManifestEntry};
pub use store::ArtifactStore;
