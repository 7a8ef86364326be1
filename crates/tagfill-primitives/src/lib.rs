//! # tagfill-primitives
//!
//! Primitive types shared by the tagfill crates.
//!
//! - [`Address`]: 20-byte account identity, parsed with left padding
//! - [`H256`]: 32-byte word used for secret keys and storage keys
//! - [`parse_value`]: the quantity grammar accepted by filler documents
//! - [`PRECOMPILES`]: the reserved protocol addresses never subject to tagging

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod hash;
mod value;

pub use address::{Address, AddressError, PRECOMPILES};
pub use hash::{HashError, H256};
pub use value::{parse_value, ValueError, BIGINT_PREFIX};

// Re-export primitive-types for U256
pub use primitive_types::U256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_as_address() {
        let value = parse_value("0x1000").unwrap();
        let address = Address::from_u256(value).unwrap();
        assert_eq!(address.to_hex(), "0x0000000000000000000000000000000000001000");
        assert_eq!(address.to_u256(), U256::from(0x1000u64));
    }
}
