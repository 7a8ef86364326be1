//! `:abi` call encoding
//!
//! `:abi transfer(address,uint256) 0x1000 5` becomes the 4-byte selector of
//! the signature followed by one 32-byte word per argument. Only static
//! types are supported, so the encoding is a plain concatenation of heads.

use primitive_types::U256;
use tagfill_crypto::function_selector;
use tagfill_primitives::Address;

use crate::error::{FillerError, FillerResult};

/// Parameter types understood by the `:abi` dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// `uint<N>`; bare `uint` is 256 bits
    Uint(usize),
    /// `bool`
    Bool,
    /// `address`
    Address,
}

/// Encoded argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Unsigned integer, already reduced to 256 bits
    Uint(U256),
    /// Boolean
    Bool(bool),
    /// Address
    Address(Address),
}

/// Integer literal in the `int(text, 0)` grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ParsedInt {
    negative: bool,
    /// Value modulo 2^256, two's complement when negative
    value: U256,
    nonzero: bool,
}

fn parse_int(token: &str) -> Option<ParsedInt> {
    let lowered = token.trim().to_ascii_lowercase();
    let (negative, body) = match lowered.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, lowered.strip_prefix('+').unwrap_or(&lowered)),
    };
    let (radix, digits) = if let Some(rest) = body.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = body.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = body.strip_prefix("0b") {
        (2, rest)
    } else {
        (10, body)
    };

    let digits: Vec<char> = digits.chars().filter(|c| *c != '_').collect();
    if digits.is_empty() {
        return None;
    }

    let mut value = U256::zero();
    let mut nonzero = false;
    for c in digits {
        let digit = c.to_digit(radix)?;
        nonzero |= digit != 0;
        value = value
            .overflowing_mul(U256::from(radix))
            .0
            .overflowing_add(U256::from(digit))
            .0;
    }
    if negative {
        value = (!value).overflowing_add(U256::one()).0;
    }

    Some(ParsedInt {
        negative,
        value,
        nonzero,
    })
}

/// Parse a parameter type name
pub fn parse_type(s: &str) -> Option<ParamType> {
    let s = s.trim();
    match s {
        "bool" => return Some(ParamType::Bool),
        "address" => return Some(ParamType::Address),
        _ => {}
    }

    let rest = s.strip_prefix("uint")?;
    let bits: usize = if rest.is_empty() { 256 } else { rest.parse().ok()? };
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return None;
    }
    Some(ParamType::Uint(bits))
}

/// Parse one argument for its declared type
fn parse_token(param_type: ParamType, text: &str) -> Result<Token, String> {
    let parsed = parse_int(text).ok_or_else(|| format!("invalid integer argument {:?}", text))?;
    match param_type {
        ParamType::Uint(bits) => {
            if bits < 256 && parsed.value.bits() > bits {
                return Err(format!("argument {} does not fit uint{}", text, bits));
            }
            Ok(Token::Uint(parsed.value))
        }
        ParamType::Bool => Ok(Token::Bool(!parsed.negative && parsed.nonzero)),
        ParamType::Address => {
            if parsed.negative {
                return Err(format!("negative address argument {}", text));
            }
            Address::from_u256(parsed.value)
                .map(Token::Address)
                .map_err(|e| e.to_string())
        }
    }
}

fn encode_u256(value: &U256) -> [u8; 32] {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    buf
}

fn encode_token(token: &Token) -> [u8; 32] {
    match token {
        Token::Uint(value) => encode_u256(value),
        Token::Bool(value) => encode_u256(&U256::from(u8::from(*value))),
        Token::Address(address) => {
            let mut buf = [0u8; 32];
            buf[12..].copy_from_slice(address.as_bytes());
            buf
        }
    }
}

/// Parameter types of a signature such as `foo(uint256,bool)`
fn signature_types(signature: &str) -> Vec<&str> {
    let name_end = signature
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(signature.len());
    signature[name_end..]
        .trim()
        .trim_matches(|c| c == '(' || c == ')')
        .split(',')
        .map(str::trim)
        .collect()
}

/// Encode the text following the `:abi` marker
///
/// `code` is the full code string, used for error reports.
pub fn encode_call(call: &str, code: &str) -> FillerResult<Vec<u8>> {
    let abi_error = |reason: String| FillerError::Abi {
        code: code.to_string(),
        reason,
    };

    let mut tokens = call.split_whitespace();
    let signature = tokens
        .next()
        .ok_or_else(|| abi_error("missing function signature".to_string()))?;
    let arguments: Vec<&str> = tokens.collect();

    let mut output = function_selector(signature).to_vec();
    if arguments.is_empty() {
        return Ok(output);
    }

    let types = signature_types(signature);
    if types.len() != arguments.len() {
        return Err(abi_error(format!(
            "signature declares {} parameters but {} arguments were given",
            types.len(),
            arguments.len()
        )));
    }

    for (type_name, argument) in types.iter().zip(arguments) {
        let param_type = parse_type(type_name)
            .ok_or_else(|| abi_error(format!("unsupported parameter type {:?}", type_name)))?;
        let token = parse_token(param_type, argument).map_err(&abi_error)?;
        output.extend_from_slice(&encode_token(&token));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(n: u64) -> Vec<u8> {
        encode_u256(&U256::from(n)).to_vec()
    }

    #[test]
    fn test_bare_selector() {
        let out = encode_call("foo()", ":abi foo()").unwrap();
        assert_eq!(out, function_selector("foo()").to_vec());
    }

    #[test]
    fn test_single_uint() {
        let out = encode_call(" foo(uint256) 5", ":abi foo(uint256) 5").unwrap();
        let mut expected = function_selector("foo(uint256)").to_vec();
        expected.extend(word(5));
        assert_eq!(out, expected);
    }

    #[test]
    fn test_uint_and_bool() {
        let out = encode_call("f(uint,bool,bool) 0x10 1 0", "").unwrap();
        assert_eq!(out.len(), 4 + 3 * 32);
        assert_eq!(&out[4..36], &word(16)[..]);
        assert_eq!(&out[36..68], &word(1)[..]);
        assert_eq!(&out[68..100], &word(0)[..]);
    }

    #[test]
    fn test_negative_uint_wraps() {
        let out = encode_call("f(uint) -1", "").unwrap();
        assert_eq!(&out[4..], &[0xffu8; 32][..]);
    }

    #[test]
    fn test_oversized_uint_is_truncated() {
        // 2^256 + 7
        let big = "0x10000000000000000000000000000000000000000000000000000000000000007";
        let out = encode_call(&format!("f(uint) {}", big), "").unwrap();
        assert_eq!(&out[4..], &word(7)[..]);
    }

    #[test]
    fn test_bool_negative_is_false() {
        let out = encode_call("f(bool) -5", "").unwrap();
        assert_eq!(&out[4..], &word(0)[..]);
    }

    #[test]
    fn test_address_argument() {
        let out = encode_call("f(address) 0x1000", "").unwrap();
        assert_eq!(&out[4..], &word(0x1000)[..]);
    }

    #[test]
    fn test_argument_count_mismatch() {
        let err = encode_call("f(uint256) 1 2", ":abi f(uint256) 1 2").unwrap_err();
        match err {
            FillerError::Abi { code, .. } => assert_eq!(code, ":abi f(uint256) 1 2"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_type() {
        assert!(matches!(
            encode_call("f(string) 1", ""),
            Err(FillerError::Abi { .. })
        ));
    }

    #[test]
    fn test_uint8_overflow() {
        assert!(encode_call("f(uint8) 256", "").is_err());
        assert!(encode_call("f(uint8) 255", "").is_ok());
    }

    #[test]
    fn test_parse_int_radixes() {
        assert_eq!(parse_int("0b101").unwrap().value, U256::from(5));
        assert_eq!(parse_int("0o17").unwrap().value, U256::from(15));
        assert_eq!(parse_int("1_000").unwrap().value, U256::from(1000));
        assert!(parse_int("0xzz").is_none());
        assert!(parse_int("").is_none());
    }
}
