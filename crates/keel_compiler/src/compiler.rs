//! The compiler seam.

use keel_cache::Artifact;
use keel_common::CancellationToken;

use crate::error::CompileFailure;
use crate::job::CompileJob;

/// A contract compiler.
///
/// Implementations must be idempotent: compiling the same job twice yields
/// equal artifacts. They are shared across compile workers.
pub trait Compiler: Send + Sync {
    /// Compiles one job.
    ///
    /// Returns [`CompileFailure::Cancelled`] if `cancel` fires before or
    /// during compilation.
    fn compile(
        &self,
        job: &CompileJob<'_>,
        cancel: &CancellationToken,
    ) -> Result<Artifact, CompileFailure>;
}
