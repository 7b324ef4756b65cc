//! Rendering errors.

use std::path::PathBuf;

/// A contract's documentation could not be produced.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Reading the template or writing the output failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The template uses a placeholder that does not exist.
    #[error("unknown template placeholder `{{{{{name}}}}}`")]
    UnknownPlaceholder {
        /// Placeholder name.
        name: String,
    },

    /// A `{{` without a matching `}}`.
    #[error("unterminated placeholder at byte {offset}")]
    Unterminated {
        /// Byte offset of the opening braces.
        offset: usize,
    },
}
