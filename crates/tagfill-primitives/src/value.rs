//! Quantity grammar used by filler documents

use primitive_types::U256;
use thiserror::Error;

/// Quantity parsing error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    /// Not a decimal or hexadecimal number
    #[error("invalid number: {0:?}")]
    Invalid(String),
    /// Does not fit in 256 bits
    #[error("number does not fit in 256 bits: {0:?}")]
    Overflow(String),
}

/// Prefix of the hexadecimal big integer string form
pub const BIGINT_PREFIX: &str = "0x:bigint ";

/// Parse a filler quantity.
///
/// - `""` and `"0x"` are zero
/// - `"0x:bigint <hex>"` is hexadecimal
/// - a `0x` prefix, or any hex letter anywhere, selects base 16
/// - everything else is base 10
///
/// Underscores are accepted as digit separators.
pub fn parse_value(text: &str) -> Result<U256, ValueError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "0x" {
        return Ok(U256::zero());
    }
    let cleaned: String = trimmed.chars().filter(|c| *c != '_').collect();

    if let Some(rest) = cleaned.strip_prefix(BIGINT_PREFIX) {
        return parse_hex(rest, text);
    }
    if let Some(rest) = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        return parse_hex(rest, text);
    }
    if cleaned
        .chars()
        .any(|c| matches!(c.to_ascii_lowercase(), 'a'..='f'))
    {
        return parse_hex(&cleaned, text);
    }
    parse_dec(&cleaned, text)
}

fn parse_hex(digits: &str, original: &str) -> Result<U256, ValueError> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValueError::Invalid(original.to_string()));
    }
    let significant = digits.trim_start_matches('0');
    if significant.len() > 64 {
        return Err(ValueError::Overflow(original.to_string()));
    }
    if significant.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_str_radix(significant, 16).map_err(|_| ValueError::Invalid(original.to_string()))
}

fn parse_dec(digits: &str, original: &str) -> Result<U256, ValueError> {
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValueError::Invalid(original.to_string()));
    }
    U256::from_dec_str(digits).map_err(|_| ValueError::Overflow(original.to_string()))
}
