//! Ethereum-compatible address type (20 bytes)

use std::fmt;
use std::str::FromStr;

use primitive_types::U256;
use thiserror::Error;

/// Address parsing error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// Invalid hex string
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    /// Invalid length
    #[error("invalid address length: expected 20 bytes, got {0}")]
    InvalidLength(usize),
    /// Integer does not fit in 160 bits
    #[error("value does not fit in an address: {0}")]
    Overflow(String),
}

/// Ethereum-compatible 20-byte address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

const fn precompile(index: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = index;
    Address(bytes)
}

/// Protocol precompile addresses `0x01..=0x11`.
pub const PRECOMPILES: [Address; 17] = [
    precompile(0x01),
    precompile(0x02),
    precompile(0x03),
    precompile(0x04),
    precompile(0x05),
    precompile(0x06),
    precompile(0x07),
    precompile(0x08),
    precompile(0x09),
    precompile(0x0a),
    precompile(0x0b),
    precompile(0x0c),
    precompile(0x0d),
    precompile(0x0e),
    precompile(0x0f),
    precompile(0x10),
    precompile(0x11),
];

impl Address {
    /// Size of address in bytes
    pub const LEN: usize = 20;

    /// Zero address (0x0000...0000)
    pub const ZERO: Address = Address([0u8; 20]);

    /// Create address from bytes
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    /// Create address from slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, AddressError> {
        if slice.len() != 20 {
            return Err(AddressError::InvalidLength(slice.len()));
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(slice);
        Ok(Address(bytes))
    }

    /// Parse address from hex string (with or without 0x prefix)
    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let s = strip_hex_prefix(s);
        let bytes = hex::decode(s).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Parse address from hex, left-padding with zeros when shorter than 20 bytes.
    ///
    /// Odd-length input gets a leading zero nibble, so `0x1` is the same
    /// address as `0x0000000000000000000000000000000000000001`.
    pub fn from_hex_padded(s: &str) -> Result<Self, AddressError> {
        let s = strip_hex_prefix(s.trim());
        let padded;
        let even = if s.len() % 2 == 1 {
            padded = format!("0{}", s);
            padded.as_str()
        } else {
            s
        };
        let bytes = hex::decode(even).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        if bytes.len() > Self::LEN {
            return Err(AddressError::InvalidLength(bytes.len()));
        }
        let mut result = [0u8; 20];
        result[Self::LEN - bytes.len()..].copy_from_slice(&bytes);
        Ok(Address(result))
    }

    /// Interpret the low 160 bits of an integer as an address.
    pub fn from_u256(value: U256) -> Result<Self, AddressError> {
        if value.bits() > 160 {
            return Err(AddressError::Overflow(format!("{:#x}", value)));
        }
        let mut word = [0u8; 32];
        value.to_big_endian(&mut word);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word[12..]);
        Ok(Address(bytes))
    }

    /// The address as a big-endian integer.
    pub fn to_u256(&self) -> U256 {
        U256::from_big_endian(&self.0)
    }

    /// Get as byte slice
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Check if this is the zero address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Check if this is one of the reserved precompile addresses
    pub fn is_precompile(&self) -> bool {
        PRECOMPILES.contains(self)
    }

    /// Convert to hex string with 0x prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Lowercase hex without prefix (the form legacy fillers use as keys)
    pub fn to_plain_hex(&self) -> String {
        hex::encode(self.0)
    }
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex_padded(s)
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    impl Serialize for Address {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&self.to_hex())
        }
    }

    impl<'de> Deserialize<'de> for Address {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            Address::from_hex_padded(&s).map_err(de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Parsing ====================

    #[test]
    fn test_address_from_hex() {
        let addr = Address::from_hex("0xa94f5374Fce5edBC8E2a8697C15331677e6EbF0B").unwrap();
        let addr2 = Address::from_hex("a94f5374fce5edbc8e2a8697c15331677e6ebf0b").unwrap();
        assert_eq!(addr, addr2);
        assert!(!addr.is_zero());
    }

    #[test]
    fn test_address_from_hex_rejects_short() {
        assert_eq!(
            Address::from_hex("0x1234"),
            Err(AddressError::InvalidLength(2))
        );
    }

    #[test]
    fn test_address_from_hex_padded_short() {
        let addr = Address::from_hex_padded("0x1000").unwrap();
        assert_eq!(addr.to_hex(), "0x0000000000000000000000000000000000001000");
    }

    #[test]
    fn test_address_from_hex_padded_odd_length() {
        let addr = Address::from_hex_padded("0x1").unwrap();
        assert_eq!(addr, PRECOMPILES[0]);
    }

    #[test]
    fn test_address_from_hex_padded_too_long() {
        let result = Address::from_hex_padded("0x0000000000000000000000000000000000000000ff");
        assert_eq!(result, Err(AddressError::InvalidLength(21)));
    }

    #[test]
    fn test_address_from_hex_padded_invalid() {
        assert!(matches!(
            Address::from_hex_padded("0xzz"),
            Err(AddressError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_address_from_str_trims() {
        let addr: Address = " 0x00000000000000000000000000000000000000aa ".parse().unwrap();
        assert_eq!(addr.as_bytes()[19], 0xaa);
    }

    // ==================== Integer conversion ====================

    #[test]
    fn test_address_u256_roundtrip() {
        let addr = Address::from_hex("0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b").unwrap();
        assert_eq!(Address::from_u256(addr.to_u256()).unwrap(), addr);
    }

    #[test]
    fn test_address_from_u256_overflow() {
        let too_big = U256::one() << 160;
        assert!(matches!(
            Address::from_u256(too_big),
            Err(AddressError::Overflow(_))
        ));
    }

    // ==================== Precompiles ====================

    #[test]
    fn test_precompile_range() {
        assert_eq!(PRECOMPILES.len(), 17);
        assert!(Address::from_hex_padded("0x01").unwrap().is_precompile());
        assert!(Address::from_hex_padded("0x11").unwrap().is_precompile());
        assert!(!Address::from_hex_padded("0x12").unwrap().is_precompile());
        assert!(!Address::ZERO.is_precompile());
    }

    // ==================== Formatting ====================

    #[test]
    fn test_address_display_lowercase() {
        let addr = Address::from_hex("0xA94F5374FCE5EDBC8E2A8697C15331677E6EBF0B").unwrap();
        assert_eq!(
            format!("{}", addr),
            "0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b"
        );
        assert_eq!(
            addr.to_plain_hex(),
            "a94f5374fce5edbc8e2a8697c15331677e6ebf0b"
        );
    }

    #[test]
    fn test_address_debug() {
        let debug = format!("{:?}", PRECOMPILES[1]);
        assert!(debug.contains("Address(0x0000000000000000000000000000000000000002)"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_address_serde_hex() {
        let addr = Address::from_hex_padded("0xcafe").unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x000000000000000000000000000000000000cafe\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
