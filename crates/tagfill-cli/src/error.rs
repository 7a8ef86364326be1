//! CLI error types

use tagfill_filler::FillerError;
use tagfill_tagger::TaggerError;
use thiserror::Error;

/// CLI error type
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Some cases could not be filled
    #[error("{failed} of {total} cases failed")]
    FillFailed {
        /// Failed cases
        failed: usize,
        /// Attempted cases
        total: usize,
    },

    /// Filler error
    #[error("Filler error: {0}")]
    Filler(#[from] FillerError),

    /// Tagger error
    #[error("Tagger error: {0}")]
    Tagger(#[from] TaggerError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Directory traversal error
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}
