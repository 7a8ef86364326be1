//! Tagger errors

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while converting filler files
#[derive(Debug, Error)]
pub enum TaggerError {
    /// Reading or writing a filler failed
    #[error("{path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed
    #[error("walking {path}: {source}")]
    Walk {
        /// Root of the traversal
        path: PathBuf,
        /// Underlying error
        #[source]
        source: walkdir::Error,
    },

    /// File is neither a YAML nor a JSON filler
    #[error("not a filler file: {0}")]
    NotAFiller(PathBuf),
}

impl TaggerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TaggerError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for tagger operations
pub type TaggerResult<T> = Result<T, TaggerError>;
