//! Cryptographic errors

use thiserror::Error;

/// Cryptographic operation error
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Secret key is zero or not below the curve order
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),
}
