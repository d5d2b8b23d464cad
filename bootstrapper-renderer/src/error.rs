//! Error types for bootstrapper-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error returned by a [`crate::TemplateSink`].
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum RenderError {
    /// The first line starts with the directive prefix but carries no configuration.
    #[error("invalid template delimiter configuration")]
    InvalidDelimiter,

    #[error("cannot parse detected template delimiter configuration")]
    UnparsableDelimiter(#[source] serde_json::Error),

    /// Parse or execution failure. `message` already holds the source snippet
    /// and the formatted input.
    #[error("{message}")]
    Template { name: String, message: String },

    /// Zero policy output still contains unresolved fields.
    #[error("{message}")]
    NoValue {
        name: String,
        /// `(line, column)`: line is 1-based, column a 0-based byte offset.
        occurrences: Vec<(usize, usize)>,
        message: String,
    },

    #[error("failed to execute template {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: Box<RenderError>,
    },

    #[error("template io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk template directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to write {path}: {source}")]
    Sink {
        path: PathBuf,
        #[source]
        source: SinkError,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}
