//! First pass: find the addresses a filler declares
//!
//! Both collectors work line by line and only track which top-level section
//! they are in, so they tolerate documents a strict parser would reject.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use tagfill_primitives::Address;

/// Code values that count as "no code"
const EMPTY_CODE: [&str; 5] = ["\"\"", "''", "0x", "'0x'", "\"0x\""];

/// Addresses found in one document
///
/// All addresses are lowercase hex without prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collected {
    /// Addresses to tag, in first-seen order
    pub addresses: Vec<String>,
    /// Pre-state addresses with non-empty code
    pub with_code: BTreeSet<String>,
    /// Block proposer from the environment
    pub coinbase: Option<String>,
    /// Transaction recipient
    pub target: Option<String>,
}

impl Collected {
    fn record(&mut self, address: &str) {
        if !self.addresses.iter().any(|a| a == address) {
            self.addresses.push(address.to_string());
        }
    }

    fn record_coinbase(&mut self, address: String, convert_coinbase: bool) {
        if convert_coinbase {
            self.record(&address);
        }
        self.coinbase = Some(address);
    }

    fn record_target(&mut self, address: String) {
        self.record(&address);
        self.target = Some(address);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Pre,
    Env,
    Transaction,
    Other,
}

/// Lowercase, unquoted, unprefixed
pub fn normalize_address(text: &str) -> String {
    let text = text.trim().trim_matches(|c| c == '"' || c == '\'');
    let text = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    text.to_lowercase()
}

fn is_precompile(address: &str) -> bool {
    Address::from_hex_padded(address).map_or(false, |a| a.is_precompile())
}

/// First 40-digit hex run in `value`, unless it is a precompile
fn embedded_address(value: &str) -> Option<String> {
    let found = address_run_re().find(value)?;
    let address = normalize_address(found.as_str());
    (!is_precompile(&address)).then_some(address)
}

static_regex!(address_run_re, r"[a-fA-F0-9]{40}");

static_regex!(yaml_section_re, r"^(pre|env|transaction):\s*$");
static_regex!(yaml_top_level_re, r"^\w+:");
static_regex!(yaml_code_re, r"^\s*code:\s*");
static_regex!(yaml_key_re, r"^\s*\w+:");
static_regex!(
    yaml_address_key_re,
    r#"^\s*["']?(?:0x)?([a-fA-F0-9]{40})["']?:\s*$"#
);
static_regex!(
    yaml_tagged_key_re,
    r#"^\s*["']?<(?:contract|eoa)(?::[^:]+)?:0x([a-fA-F0-9]{40})>["']?:\s*$"#
);
static_regex!(yaml_coinbase_re, r"^\s*currentCoinbase\s*:\s*(.+)$");
static_regex!(yaml_to_re, r"^\s*to:\s*(.+)$");

/// Collect from YAML lines
pub fn collect_yaml(lines: &[&str], convert_coinbase: bool) -> Collected {
    let mut collected = Collected::default();
    let mut section = Section::Other;
    let mut current: Option<String> = None;
    let mut in_code = false;

    for line in lines {
        let stripped = line.trim();

        if let Some(caps) = yaml_section_re().captures(stripped) {
            section = match &caps[1] {
                "pre" => Section::Pre,
                "env" => Section::Env,
                _ => Section::Transaction,
            };
        } else if yaml_top_level_re().is_match(stripped) && !line.starts_with(' ') {
            section = Section::Other;
        }

        if yaml_code_re().is_match(line) {
            in_code = true;
        } else if yaml_key_re().is_match(line) && current.is_some() {
            in_code = false;
        }

        match section {
            Section::Pre => {
                if let Some(caps) = yaml_address_key_re().captures(line) {
                    let address = normalize_address(&caps[1]);
                    if !is_precompile(&address) {
                        collected.record(&address);
                        current = Some(address);
                    }
                    continue;
                }
                if let Some(caps) = yaml_tagged_key_re().captures(line) {
                    let address = normalize_address(&caps[1]);
                    if !is_precompile(&address) {
                        collected.record(&address);
                        current = Some(address);
                    }
                }

                if let (Some(address), true) = (&current, in_code) {
                    let has_code = match line.split_once(':') {
                        Some((_, content)) => {
                            let content = content.trim();
                            !content.is_empty() && !EMPTY_CODE.contains(&content)
                        }
                        None => line.contains('|') || line.contains('>'),
                    };
                    if has_code {
                        collected.with_code.insert(address.clone());
                    }
                }
            }
            Section::Env => {
                if let Some(caps) = yaml_coinbase_re().captures(line) {
                    if let Some(address) = embedded_address(&caps[1]) {
                        collected.record_coinbase(address, convert_coinbase);
                    }
                }
            }
            Section::Transaction => {
                if let Some(caps) = yaml_to_re().captures(line) {
                    if let Some(address) = embedded_address(&caps[1]) {
                        collected.record_target(address);
                    }
                }
            }
            Section::Other => {}
        }
    }
    collected
}

static_regex!(
    json_address_key_re,
    r#""(?:0x)?([a-fA-F0-9]{40})"\s*:\s*\{"#
);
static_regex!(
    json_tagged_key_re,
    r#""<(?:contract|eoa)(?::[^:]+)?:0x([a-fA-F0-9]{40})>"\s*:\s*\{"#
);
static_regex!(json_code_re, r#""code"\s*:\s*"([^"]+)""#);
static_regex!(json_value_re, r#":\s*"[^"]*([a-fA-F0-9]{40})[^"]*""#);

fn json_value_address(line: &str) -> Option<String> {
    let caps = json_value_re().captures(line)?;
    let address = normalize_address(&caps[1]);
    (!is_precompile(&address)).then_some(address)
}

/// Collect from JSON lines
///
/// Sections are tracked through brace depth: anything back at the top two
/// levels ends the current section.
pub fn collect_json(lines: &[&str], convert_coinbase: bool) -> Collected {
    let mut collected = Collected::default();
    let mut section = Section::Other;
    let mut current: Option<String> = None;
    let mut in_code = false;
    let mut depth: i64 = 0;

    for line in lines {
        let stripped = line.trim();
        let names_section =
            line.contains("\"pre\"") || line.contains("\"env\"") || line.contains("\"transaction\"");

        if line.contains(':') {
            if line.contains("\"pre\"") {
                section = Section::Pre;
            } else if line.contains("\"env\"") {
                section = Section::Env;
            } else if line.contains("\"transaction\"") {
                section = Section::Transaction;
            }
        }

        depth += line.matches('{').count() as i64 - line.matches('}').count() as i64;
        if depth <= 1 && !names_section {
            section = Section::Other;
        }

        if line.contains("\"code\"") && line.contains(':') {
            in_code = true;
        } else if in_code && line.contains('"') && line.contains(':') {
            in_code = false;
        }

        if section == Section::Pre && !in_code {
            if let Some(caps) = json_address_key_re().captures(line) {
                let address = normalize_address(&caps[1]);
                if !is_precompile(&address) {
                    collected.record(&address);
                    current = Some(address);
                }
                continue;
            }
            if let Some(caps) = json_tagged_key_re().captures(line) {
                let address = normalize_address(&caps[1]);
                if !is_precompile(&address) {
                    collected.record(&address);
                    current = Some(address);
                }
            }
        }

        if let (Some(address), true) = (&current, in_code) {
            let placeholder = matches!(
                stripped,
                "\"code\": \"\"," | "\"code\": \"0x\"," | "\"code\": null,"
            );
            if line.contains("\":") && !placeholder {
                if let Some(caps) = json_code_re().captures(line) {
                    if &caps[1] != "0x" {
                        collected.with_code.insert(address.clone());
                    }
                }
            }
        }

        match section {
            Section::Env if line.contains("\"currentCoinbase\"") => {
                if let Some(address) = json_value_address(line) {
                    collected.record_coinbase(address, convert_coinbase);
                }
            }
            Section::Transaction if line.contains("\"to\"") => {
                if let Some(address) = json_value_address(line) {
                    collected.record_target(address);
                }
            }
            _ => {}
        }
    }
    collected
}
