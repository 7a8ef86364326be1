//! Address shape heuristic for `:raw` payloads
//!
//! Raw bytecode often embeds numbers that merely look like addresses. Only
//! addresses that read as deliberate references are rewritten there.

/// Most distinct hex digits a "too simple" address may have
pub const MAX_SIMPLE_DISTINCT_DIGITS: usize = 3;

/// Fewest zero digits a "too simple" address must have
pub const MIN_SIMPLE_ZERO_DIGITS: usize = 35;

/// Shape of a 40-digit address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressShape {
    /// Mostly zeros with a couple of digits, e.g. `1000...0000`
    Mechanical,
    /// One digit repeated, e.g. `cccc...cccc`
    Placeholder,
    /// Anything else
    Ordinary,
}

impl AddressShape {
    /// Classify lowercase, unprefixed address hex
    pub fn of(address: &str) -> Self {
        let mut digits: Vec<char> = address.chars().collect();
        let zeros = digits.iter().filter(|c| **c == '0').count();
        digits.sort_unstable();
        digits.dedup();

        if digits.len() <= MAX_SIMPLE_DISTINCT_DIGITS && zeros >= MIN_SIMPLE_ZERO_DIGITS {
            AddressShape::Mechanical
        } else if digits.len() == 1 {
            AddressShape::Placeholder
        } else {
            AddressShape::Ordinary
        }
    }
}

/// Whether an address may be rewritten inside a `:raw` payload
pub fn replaceable_in_raw(address: &str) -> bool {
    address.len() == 40 && AddressShape::of(address) != AddressShape::Mechanical
}
