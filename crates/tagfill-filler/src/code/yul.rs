//! `:yul` header scanning and compilation

use std::io::Write;

use super::tools::{CompilerTools, YulOptions};
use crate::error::FillerResult;

/// Header tokens passed through to the compiler as part of the source
const NATIVE_TOKENS: [&str; 2] = ["object", "\"C\""];

/// Parsed `:yul` header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YulHeader {
    /// Positional options
    pub options: YulOptions,
    /// Native tokens, each followed by a space, to prepend to the source
    pub native: String,
    /// Byte offset where the source begins
    pub source_start: usize,
}

/// Scan the options following a `:yul` marker ending at `option_start`
///
/// Tokens are space separated and end at the first newline or `{`. With no
/// options (the remainder starts with `{`), the source begins right after
/// the marker.
pub fn scan_header(text: &str, option_start: usize) -> YulHeader {
    let rest = &text[option_start..];
    if rest.trim_start().starts_with('{') {
        return YulHeader {
            source_start: option_start,
            ..YulHeader::default()
        };
    }

    // The character right after the marker is the separator.
    let scan_start = option_start + rest.chars().next().map_or(0, char::len_utf8);
    let scanned = &text[scan_start..];
    let scan_len = scanned
        .find(|c: char| c == '\n' || c == '{')
        .unwrap_or(scanned.len());

    let mut header = YulHeader {
        source_start: scan_start + scan_len,
        ..YulHeader::default()
    };
    let mut positional = Vec::new();
    for token in scanned[..scan_len].split(' ').filter(|t| !t.is_empty()) {
        if NATIVE_TOKENS.contains(&token) {
            header.native.push_str(token);
            header.native.push(' ');
        } else {
            positional.push(token.to_string());
        }
    }

    let mut positional = positional.into_iter();
    header.options.evm_version = positional.next();
    header.options.optimize = positional.next();
    header
}

/// Compile the YUL code following a marker ending at `option_start`
///
/// Returns the hex body without a `0x` prefix.
pub fn compile(text: &str, option_start: usize, tools: &dyn CompilerTools) -> FillerResult<String> {
    let header = scan_header(text, option_start);

    let mut file = tempfile::Builder::new()
        .prefix("tagfill")
        .suffix(".yul")
        .tempfile()?;
    file.write_all(header.native.as_bytes())?;
    file.write_all(text[header.source_start..].as_bytes())?;
    file.flush()?;

    let output = tools.compile_yul(file.path(), &header.options)?;
    let output = output.trim();
    Ok(output.strip_prefix("0x").unwrap_or(output).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: &str = ":yul";

    fn header(text: &str) -> YulHeader {
        let start = text.find(MARKER).unwrap() + MARKER.len();
        scan_header(text, start)
    }

    #[test]
    fn test_no_options() {
        let text = ":yul { sstore(0, 1) }";
        let h = header(text);
        assert_eq!(h.options, YulOptions::default());
        assert!(h.native.is_empty());
        assert_eq!(&text[h.source_start..], " { sstore(0, 1) }");
    }

    #[test]
    fn test_fork_and_optimize() {
        let text = ":yul berlin true\n{ sstore(0, 1) }";
        let h = header(text);
        assert_eq!(h.options.evm_version.as_deref(), Some("berlin"));
        assert_eq!(h.options.optimize.as_deref(), Some("true"));
        assert_eq!(&text[h.source_start..], "\n{ sstore(0, 1) }");
    }

    #[test]
    fn test_native_tokens() {
        let text = ":yul object \"C\" { code { } }";
        let h = header(text);
        assert_eq!(h.native, "object \"C\" ");
        assert_eq!(h.options.evm_version, None);
        assert_eq!(&text[h.source_start..], "{ code { } }");
    }

    #[test]
    fn test_mixed_tokens() {
        let text = ":yul london object \"C\" {";
        let h = header(text);
        assert_eq!(h.options.evm_version.as_deref(), Some("london"));
        assert_eq!(h.native, "object \"C\" ");
    }

    #[test]
    fn test_extra_spaces_are_skipped() {
        let h = header(":yul  shanghai   false\n{}");
        assert_eq!(h.options.evm_version.as_deref(), Some("shanghai"));
        assert_eq!(h.options.optimize.as_deref(), Some("false"));
    }
}
