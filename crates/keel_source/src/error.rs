//! Error types for source discovery and loading.

use std::path::PathBuf;

/// Errors raised while discovering or reading source units.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// A source file or directory could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The configured sources directory does not exist.
    #[error("sources directory {0} does not exist")]
    MissingSourcesDir(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = SourceError::Io {
            path: PathBuf::from("contracts/Token.sol"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        };
        let msg = err.to_string();
        assert!(msg.contains("failed to read"));
        assert!(msg.contains("Token.sol"));
    }

    #[test]
    fn missing_dir_display() {
        let err = SourceError::MissingSourcesDir(PathBuf::from("contracts"));
        assert_eq!(err.to_string(), "sources directory contracts does not exist");
    }
}
