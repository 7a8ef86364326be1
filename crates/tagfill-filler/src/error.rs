//! Error types for filler resolution

use tagfill_crypto::CryptoError;
use tagfill_primitives::{AddressError, HashError, ValueError};
use thiserror::Error;

/// Filler resolution error
///
/// Every variant is terminal for the document being processed.
#[derive(Error, Debug)]
pub enum FillerError {
    /// Tag referenced but absent from the tag table
    #[error("tag {0} not found in tags")]
    UnresolvedTag(String),

    /// Pre-state entries left over once the resolution budget is spent
    #[error("unresolved accounts after {passes} passes, probably a circular dependency: {unresolved:?}")]
    CircularDependency {
        /// Keys of the entries that never became ready
        unresolved: Vec<String>,
        /// Number of passes performed
        passes: usize,
    },

    /// A contract tag used by the document but never declared in `pre`
    #[error("contract dependency {0} not found in pre")]
    MissingContractDependency(String),

    /// Bracket syntax with a kind other than eoa/contract/coinbase
    #[error("unknown tag kind: {0}")]
    UnknownTagKind(String),

    /// A signing key was requested from a tag that resolved to a plain address
    #[error("tag {0} is not an EOA")]
    NotAnEoa(String),

    /// A tag name was resolved twice
    #[error("tag {0} is already resolved")]
    DuplicateTag(String),

    /// Two expected-result keys resolved to one address
    #[error("{key} resolves to {address}, which is already expected")]
    DuplicateAccount {
        /// Second key as written
        key: String,
        /// Shared address
        address: String,
    },

    /// No code dialect matched, or the computed body was not valid hex
    #[error("error parsing code: {0:?}")]
    CodeParse(String),

    /// `:abi` arguments do not fit the signature
    #[error("error encoding abi call {code:?}: {reason}")]
    Abi {
        /// Offending code string
        code: String,
        /// What went wrong
        reason: String,
    },

    /// External compiler failure
    #[error("{tool} failed: {message}")]
    ExternalTool {
        /// Tool name
        tool: String,
        /// Failure details (stderr or spawn error)
        message: String,
    },

    /// Malformed quantity
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Malformed address
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Malformed hash or key
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    /// Transaction section failed validation
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Fork name missing from the fork list
    #[error("unsupported fork: {0}")]
    UnsupportedFork(String),

    /// No expect section covers a transaction variant on a fork
    #[error("expectation not found for {0}")]
    MissingExpectation(String),

    /// Expect section is inconsistent
    #[error("invalid expect section: {0}")]
    InvalidExpect(String),

    /// Key derivation failure
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Document extension is neither JSON nor YAML
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<ValueError> for FillerError {
    fn from(e: ValueError) -> Self {
        FillerError::InvalidValue(e.to_string())
    }
}

impl From<AddressError> for FillerError {
    fn from(e: AddressError) -> Self {
        FillerError::InvalidAddress(e.to_string())
    }
}

impl From<HashError> for FillerError {
    fn from(e: HashError) -> Self {
        FillerError::InvalidHash(e.to_string())
    }
}

/// Filler result type
pub type FillerResult<T> = Result<T, FillerError>;
