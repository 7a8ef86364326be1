//! Symbolic code compilation
//!
//! A code string is compiled after its tags have been substituted. Dialects
//! are tried in a fixed order:
//!
//! 1. native integer (legacy, decoded as big-endian hex nibbles)
//! 2. empty string
//! 3. `:raw 0x<hex>`
//! 4. `:yul [evm-version [optimize]]` followed by YUL source
//! 5. `:abi <signature> [args...]`
//! 6. plain `0x<hex>`
//! 7. LLL source starting with `{` or `(asm`
//!
//! A leading `:label NAME` only names the code; it is not part of it.

pub mod abi;
pub mod tools;
pub mod yul;

use std::io::Write;

use primitive_types::U256;
use serde::{Deserialize, Deserializer};
use tracing::trace;

use crate::error::{FillerError, FillerResult};
use crate::table::TagTable;
use crate::tag::{contained_dependencies, substitute_tags, Dependencies};
use crate::types::Scalar;

pub use tools::{CompilerTools, NoTools, SystemTools, YulOptions};

const RAW_MARKER: &str = ":raw 0x";
const YUL_MARKER: &str = ":yul";
const ABI_MARKER: &str = ":abi";
const LABEL_MARKER: &str = ":label";

/// Code as written in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeSource {
    /// Native integer
    Number(U256),
    /// Code string in one of the dialects
    Text(String),
}

/// Uncompiled code with its tag dependencies and optional label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicCode {
    source: CodeSource,
    label: Option<String>,
    dependencies: Dependencies,
}

impl SymbolicCode {
    /// Parse a code string
    pub fn parse(text: impl Into<String>) -> FillerResult<Self> {
        let text = text.into();
        Ok(Self {
            label: parse_label(&text),
            dependencies: contained_dependencies(&text)?,
            source: CodeSource::Text(text),
        })
    }

    /// Code given as a native integer
    pub fn from_number(value: U256) -> Self {
        Self {
            source: CodeSource::Number(value),
            label: None,
            dependencies: Dependencies::new(),
        }
    }

    /// Source as written
    pub fn source(&self) -> &CodeSource {
        &self.source
    }

    /// Name given with `:label`
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Tags this code refers to
    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    /// Compile to bytecode
    ///
    /// `tags` must resolve every dependency. External tools are only invoked
    /// for `:yul` and LLL sources.
    pub fn compile(&self, tags: &TagTable, tools: &dyn CompilerTools) -> FillerResult<Vec<u8>> {
        let raw = match &self.source {
            CodeSource::Number(value) => return Ok(number_to_bytes(value)),
            CodeSource::Text(text) => text,
        };
        if raw.is_empty() {
            return Ok(Vec::new());
        }

        let text = substitute_tags(raw, tags)?;
        let body = if let Some(index) = text.find(RAW_MARKER) {
            text[index + RAW_MARKER.len()..].to_string()
        } else if let Some(index) = text.find(YUL_MARKER) {
            yul::compile(&text, index + YUL_MARKER.len(), tools)?
        } else if let Some(index) = text.find(ABI_MARKER) {
            return abi::encode_call(&text[index + ABI_MARKER.len()..], raw);
        } else {
            let source = strip_label(&text);
            if let Some(hex) = source.strip_prefix("0x") {
                hex.to_lowercase()
            } else if source.starts_with('{') || source.starts_with("(asm") {
                compile_lll(source, tools)?
            } else {
                return Err(FillerError::CodeParse(raw.clone()));
            }
        };

        trace!(code = %raw, body = %body, "Compiled code");
        decode_body(&body, raw)
    }
}

impl<'de> Deserialize<'de> for SymbolicCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Scalar::deserialize(deserializer)? {
            Scalar::Int(value) => Ok(SymbolicCode::from_number(value)),
            Scalar::Str(text) => SymbolicCode::parse(text).map_err(serde::de::Error::custom),
        }
    }
}

/// Label following `:label`, up to the next whitespace
pub fn parse_label(text: &str) -> Option<String> {
    let index = text.find(LABEL_MARKER)?;
    let rest = text[index + LABEL_MARKER.len()..].trim_start();
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

/// Text with a leading `:label NAME` removed, left trimmed
fn strip_label(text: &str) -> &str {
    let text = text.trim_start();
    match text.strip_prefix(LABEL_MARKER) {
        Some(rest) => {
            let rest = rest.trim_start();
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            rest[end..].trim_start()
        }
        None => text,
    }
}

fn number_to_bytes(value: &U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    let leading = buf.iter().take_while(|b| **b == 0).count().min(31);
    buf[leading..].to_vec()
}

fn compile_lll(source: &str, tools: &dyn CompilerTools) -> FillerResult<String> {
    let mut file = tempfile::Builder::new()
        .prefix("tagfill")
        .suffix(".lll")
        .tempfile()?;
    file.write_all(source.as_bytes())?;
    file.flush()?;
    let output = tools.compile_lll(file.path())?;
    let output = output.trim();
    Ok(output.strip_prefix("0x").unwrap_or(output).to_string())
}

/// Decode a hex body, dropping whitespace and the `0x` prefixes that
/// substituted addresses carry
fn decode_body(body: &str, original: &str) -> FillerResult<Vec<u8>> {
    let mut cleaned = String::with_capacity(body.len());
    let mut chars = body.chars().filter(|c| !c.is_whitespace()).peekable();
    while let Some(c) = chars.next() {
        if c == '0' && matches!(chars.peek(), Some('x') | Some('X')) {
            chars.next();
            continue;
        }
        cleaned.push(c);
    }
    hex::decode(cleaned).map_err(|_| FillerError::CodeParse(original.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Identity;
    use std::cell::RefCell;
    use std::path::Path;
    use tagfill_crypto::function_selector;
    use tagfill_primitives::Address;

    /// Records invocations and returns canned output
    #[derive(Default)]
    struct FakeTools {
        yul_calls: RefCell<Vec<(String, YulOptions)>>,
        lll_calls: RefCell<Vec<String>>,
    }

    impl CompilerTools for FakeTools {
        fn compile_yul(&self, source: &Path, options: &YulOptions) -> FillerResult<String> {
            let content = std::fs::read_to_string(source)?;
            self.yul_calls.borrow_mut().push((content, options.clone()));
            Ok("0x600160005500".to_string())
        }

        fn compile_lll(&self, source: &Path) -> FillerResult<String> {
            let content = std::fs::read_to_string(source)?;
            self.lll_calls.borrow_mut().push(content);
            Ok("6002\n600055\n".to_string())
        }
    }

    fn compile(code: &str) -> FillerResult<Vec<u8>> {
        SymbolicCode::parse(code)?.compile(&TagTable::new(), &NoTools)
    }

    // ==================== Hex dialects ====================

    #[test]
    fn test_raw() {
        assert_eq!(compile(":raw 0x1234").unwrap(), vec![0x12, 0x34]);
    }

    #[test]
    fn test_plain_hex_matches_raw() {
        assert_eq!(compile("0x1234").unwrap(), compile(":raw 0x1234").unwrap());
        assert_eq!(compile("0xABcd").unwrap(), vec![0xab, 0xcd]);
    }

    #[test]
    fn test_empty() {
        assert!(compile("").unwrap().is_empty());
        assert!(compile("0x").unwrap().is_empty());
    }

    #[test]
    fn test_raw_ignores_whitespace() {
        assert_eq!(compile(":raw 0x60 01\n60 00").unwrap(), vec![0x60, 0x01, 0x60, 0x00]);
    }

    #[test]
    fn test_label_before_raw() {
        let code = SymbolicCode::parse(":label data1 :raw 0x01").unwrap();
        assert_eq!(code.label(), Some("data1"));
        assert_eq!(code.compile(&TagTable::new(), &NoTools).unwrap(), vec![0x01]);
    }

    #[test]
    fn test_label_before_plain_hex() {
        assert_eq!(compile(":label x 0x0102").unwrap(), vec![0x01, 0x02]);
    }

    #[test]
    fn test_number() {
        let code = SymbolicCode::from_number(U256::from(0x123));
        assert_eq!(code.compile(&TagTable::new(), &NoTools).unwrap(), vec![0x01, 0x23]);
        let zero = SymbolicCode::from_number(U256::zero());
        assert_eq!(zero.compile(&TagTable::new(), &NoTools).unwrap(), vec![0x00]);
    }

    #[test]
    fn test_bad_hex_cites_original() {
        match compile(":raw 0xzz") {
            Err(FillerError::CodeParse(code)) => assert_eq!(code, ":raw 0xzz"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unrecognized() {
        assert!(matches!(compile("hello"), Err(FillerError::CodeParse(_))));
    }

    #[test]
    fn test_tag_substitution_before_dispatch() {
        let mut tags = TagTable::new();
        tags.insert(
            "target",
            Identity::Address(Address::from_hex_padded("0x1000").unwrap()),
        )
        .unwrap();
        let code = SymbolicCode::parse(":abi f(address) <contract:target:0x01>").unwrap();
        assert!(code.dependencies().contains_key("target"));
        let out = code.compile(&tags, &NoTools).unwrap();
        assert_eq!(&out[..4], &function_selector("f(address)"));
        assert_eq!(out[4 + 30], 0x10);
    }

    #[test]
    fn test_tag_inside_raw_body() {
        let mut tags = TagTable::new();
        tags.insert(
            "0xcccccccccccccccccccccccccccccccccccccccc",
            Identity::Address(Address::from_hex_padded("0x1000").unwrap()),
        )
        .unwrap();
        let code =
            SymbolicCode::parse(":raw 0x73 <eoa:0xcccccccccccccccccccccccccccccccccccccccc> 31").unwrap();
        let out = code.compile(&tags, &NoTools).unwrap();
        let mut expected = vec![0x73];
        expected.extend_from_slice(Address::from_hex_padded("0x1000").unwrap().as_bytes());
        expected.push(0x31);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_tag_glued_into_plain_hex() {
        let mut tags = TagTable::new();
        tags.insert("callee", Identity::Address(Address::from_hex_padded("0xc0de").unwrap()))
            .unwrap();
        let code = SymbolicCode::parse("0x73<contract:callee:0x1000>3100").unwrap();
        let out = code.compile(&tags, &NoTools).unwrap();
        assert_eq!(out.len(), 1 + 20 + 2);
        assert_eq!(&out[19..21], &[0xc0, 0xde]);
        assert_eq!(&out[21..], &[0x31, 0x00]);
    }

    #[test]
    fn test_raw_body_is_tag_only() {
        let mut tags = TagTable::new();
        tags.insert("callee", Identity::Address(Address::from_hex_padded("0xc0de").unwrap()))
            .unwrap();
        let code = SymbolicCode::parse(":raw <contract:callee:0x1000>").unwrap();
        assert_eq!(code.compile(&tags, &NoTools).unwrap().len(), 20);
    }

    #[test]
    fn test_missing_tag() {
        let code = SymbolicCode::parse("{ (CALL 0 <contract:ghost:0x01> 0 0 0 0 0) }").unwrap();
        assert!(matches!(
            code.compile(&TagTable::new(), &NoTools),
            Err(FillerError::UnresolvedTag(_))
        ));
    }

    // ==================== ABI ====================

    #[test]
    fn test_abi_uint256() {
        let out = compile(":abi foo(uint256) 5").unwrap();
        let mut expected = function_selector("foo(uint256)").to_vec();
        let mut word = [0u8; 32];
        word[31] = 5;
        expected.extend_from_slice(&word);
        assert_eq!(out, expected);
    }

    // ==================== External tools ====================

    #[test]
    fn test_yul_uses_tools() {
        let tools = FakeTools::default();
        let code = SymbolicCode::parse(":yul berlin\n{ sstore(0, 1) }").unwrap();
        let out = code.compile(&TagTable::new(), &tools).unwrap();
        assert_eq!(out, vec![0x60, 0x01, 0x60, 0x00, 0x55, 0x00]);

        let calls = tools.yul_calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "\n{ sstore(0, 1) }");
        assert_eq!(calls[0].1.evm_version.as_deref(), Some("berlin"));
    }

    #[test]
    fn test_yul_native_tokens_prefix_source() {
        let tools = FakeTools::default();
        let code = SymbolicCode::parse(":yul object \"C\" { code { } }").unwrap();
        code.compile(&TagTable::new(), &tools).unwrap();
        assert_eq!(tools.yul_calls.borrow()[0].0, "object \"C\" { code { } }");
    }

    #[test]
    fn test_lll_uses_tools() {
        let tools = FakeTools::default();
        let code = SymbolicCode::parse("{ [[0]] 2 }").unwrap();
        let out = code.compile(&TagTable::new(), &tools).unwrap();
        assert_eq!(out, vec![0x60, 0x02, 0x60, 0x00, 0x55]);
        assert_eq!(tools.lll_calls.borrow()[0], "{ [[0]] 2 }");
    }

    #[test]
    fn test_asm_form_uses_tools() {
        let tools = FakeTools::default();
        let code = SymbolicCode::parse("(asm 1 0 SSTORE)").unwrap();
        assert!(code.compile(&TagTable::new(), &tools).is_ok());
    }

    #[test]
    fn test_tool_failure_propagates() {
        let code = SymbolicCode::parse("{ [[0]] 1 }").unwrap();
        assert!(matches!(
            code.compile(&TagTable::new(), &NoTools),
            Err(FillerError::ExternalTool { .. })
        ));
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let code: SymbolicCode = serde_yaml::from_str("':raw 0x00'").unwrap();
        assert_eq!(code.source(), &CodeSource::Text(":raw 0x00".to_string()));
        let code: SymbolicCode = serde_yaml::from_str("0x6001").unwrap();
        assert_eq!(code.source(), &CodeSource::Number(U256::from(0x6001)));
    }
}
