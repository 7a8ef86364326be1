//! secp256k1 secret key handling

use k256::ecdsa::SigningKey;
use tagfill_primitives::{Address, H256};

use crate::{keccak256, CryptoError};

/// Derive the account address controlled by a secret key
pub fn secret_key_to_address(secret_key: &H256) -> Result<Address, CryptoError> {
    let signing_key = SigningKey::from_slice(secret_key.as_bytes())
        .map_err(|e| CryptoError::InvalidSecretKey(e.to_string()))?;

    // Uncompressed point: 0x04 || x || y
    let encoded = signing_key.verifying_key().to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);

    let mut addr_bytes = [0u8; 20];
    addr_bytes.copy_from_slice(&hash.as_bytes()[12..]);
    Ok(Address::from_bytes(addr_bytes))
}
