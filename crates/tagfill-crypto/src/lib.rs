//! # tagfill-crypto
//!
//! Cryptographic primitives for tagfill.
//!
//! - Keccak-256 hashing and 4-byte function selectors
//! - secp256k1 secret key to address derivation

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hash;
mod key;

pub use error::CryptoError;
pub use hash::{function_selector, keccak256};
pub use key::secret_key_to_address;
