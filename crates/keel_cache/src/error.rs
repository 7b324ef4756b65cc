//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur during cache operations.
///
/// Cache reads are fail-safe: a stored artifact that fails validation is
/// reported through one of the corruption variants and treated as a miss by
/// [`ArtifactCache`](crate::ArtifactCache), never as a build failure.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An artifact file has an invalid or missing header.
    #[error("invalid artifact header in {path}: {reason}")]
    InvalidHeader {
        /// The artifact file path.
        path: PathBuf,
        /// Description of the header problem.
        reason: String,
    },

    /// The stored checksum does not match the computed checksum of the payload.
    #[error("checksum mismatch in {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The artifact file path.
        path: PathBuf,
        /// The expected checksum from the header.
        expected: String,
        /// The actual checksum computed from the payload.
        actual: String,
    },

    /// The artifact stored under a fingerprint records a different fingerprint.
    #[error("fingerprint mismatch in {path}: expected {expected}, got {actual}")]
    FingerprintMismatch {
        /// The artifact file path.
        path: PathBuf,
        /// The fingerprint the artifact was looked up by.
        expected: String,
        /// The fingerprint recorded in the header.
        actual: String,
    },

    /// The artifact format version does not match the current version.
    #[error("version mismatch in {path}: expected {expected}, got {actual}")]
    VersionMismatch {
        /// The artifact file path.
        path: PathBuf,
        /// The expected format version.
        expected: u32,
        /// The actual format version found in the file.
        actual: u32,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}

impl CacheError {
    /// Returns `true` if this error means a stored artifact is damaged, as
    /// opposed to merely written by an older format.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            CacheError::InvalidHeader { .. }
                | CacheError::ChecksumMismatch { .. }
                | CacheError::FingerprintMismatch { .. }
                | CacheError::Serialization { .. }
        )
    }
}
