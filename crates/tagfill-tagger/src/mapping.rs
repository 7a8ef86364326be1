//! Tag assignment and the rewriting pass

use crate::collect::Collected;
use crate::entropy::replaceable_in_raw;

/// Signing key of the conventional legacy sender
pub const KNOWN_SECRET_KEY: &str =
    "45a915e4d060149eb4365960e6a7a45f334393093061116b197e3240065ff2d8";

/// Address derived from [`KNOWN_SECRET_KEY`]
pub const KNOWN_SENDER_ADDRESS: &str = "a94f5374fce5edbc8e2a8697c15331677e6ebf0b";

/// Conversion switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaggerOptions {
    /// Also tag the block proposer
    pub convert_coinbase: bool,
    /// Report planned mappings without writing
    pub dry_run: bool,
}

/// Tag assigned to one address
#[derive(Debug, Clone, PartialEq, Eq)]
struct Rewrite {
    address: String,
    tag: String,
}

impl Rewrite {
    fn apply(&self, line: &str) -> String {
        if line.contains('"') {
            let line = splice_matches(line, &self.address, |line, start, end| {
                let open = quote_before(line, start)?;
                let close = line[end..].starts_with('"').then_some(end + 1)?;
                line[close..]
                    .trim_start()
                    .starts_with(':')
                    .then(|| (open, close, format!("\"{}\"", self.tag)))
            });
            splice_matches(&line, &self.address, |line, start, end| {
                let open = quote_before(line, start)?;
                let close = line[end..].starts_with('"').then_some(end + 1)?;
                let colon = line[..open].trim_end();
                colon
                    .ends_with(':')
                    .then(|| (colon.len() - 1, close, format!(": \"{}\"", self.tag)))
            })
        } else {
            let line = splice_matches(line, &self.address, |line, start, end| {
                let prefix = start.checked_sub(2)?;
                if !line.get(prefix..start)?.eq_ignore_ascii_case("0x") {
                    return None;
                }
                // already inside a tag
                if line[..prefix].ends_with(':') && line[end..].starts_with('>') {
                    return None;
                }
                Some((prefix, end, self.tag.clone()))
            });
            let inside_tag = format!(":0x{}>", self.address);
            if line.to_ascii_lowercase().contains(&inside_tag) {
                return line;
            }
            splice_matches(&line, &self.address, |line, start, end| {
                let before = line[..start].chars().next_back();
                let after = line[end..].chars().next();
                let hex = |c: Option<char>| c.map_or(false, |c| c.is_ascii_hexdigit());
                (!hex(before) && !hex(after)).then(|| (start, end, self.tag.clone()))
            })
        }
    }
}

/// Start of the opening quote before `"ADDR` or `"0xADDR`
fn quote_before(line: &str, start: usize) -> Option<usize> {
    let head = &line[..start];
    if head.ends_with('"') {
        return Some(start - 1);
    }
    let prefix = start.checked_sub(3)?;
    let quoted = line.get(prefix..start)?;
    (quoted.starts_with('"') && quoted[1..].eq_ignore_ascii_case("0x")).then_some(prefix)
}

/// Replace case-insensitive occurrences of `needle`
///
/// For each occurrence at `start..end`, `splice` may return a wider span
/// and its replacement. Overlapping spans are skipped.
fn splice_matches<F>(line: &str, needle: &str, mut splice: F) -> String
where
    F: FnMut(&str, usize, usize) -> Option<(usize, usize, String)>,
{
    let lower = line.to_ascii_lowercase();
    let mut out = String::with_capacity(line.len());
    let mut last = 0;
    for (start, _) in lower.match_indices(needle) {
        let end = start + needle.len();
        if let Some((from, to, replacement)) = splice(line, start, end) {
            if from < last {
                continue;
            }
            out.push_str(&line[last..from]);
            out.push_str(&replacement);
            last = to;
        }
    }
    out.push_str(&line[last..]);
    out
}

/// Address → tag assignments for one document
#[derive(Debug, Clone)]
pub struct AddressMapping {
    rewrites: Vec<Rewrite>,
}

impl AddressMapping {
    /// Assign a tag to every collected address
    ///
    /// The block proposer is left out unless `convert_coinbase` is set.
    pub fn build(collected: &Collected, options: &TaggerOptions) -> Self {
        let mut rewrites = Vec::with_capacity(collected.addresses.len());
        for address in &collected.addresses {
            let is_coinbase = collected.coinbase.as_deref() == Some(address.as_str());
            if is_coinbase && !options.convert_coinbase {
                continue;
            }

            let has_code = collected.with_code.contains(address);
            let tag = if address == KNOWN_SENDER_ADDRESS {
                format!("<eoa:sender:0x{}>", address)
            } else if is_coinbase {
                format!("<eoa:coinbase:0x{}>", address)
            } else if collected.target.as_deref() == Some(address.as_str()) && has_code {
                format!("<contract:target:0x{}>", address)
            } else if has_code {
                format!("<contract:0x{}>", address)
            } else {
                format!("<eoa:0x{}>", address)
            };
            rewrites.push(Rewrite {
                address: address.clone(),
                tag,
            });
        }
        AddressMapping { rewrites }
    }

    /// Whether nothing would be rewritten
    pub fn is_empty(&self) -> bool {
        self.rewrites.is_empty()
    }

    /// Number of tagged addresses
    pub fn len(&self) -> usize {
        self.rewrites.len()
    }

    /// Tag assigned to an address
    pub fn tag_for(&self, address: &str) -> Option<&str> {
        self.rewrites
            .iter()
            .find(|r| r.address == address)
            .map(|r| r.tag.as_str())
    }

    /// `(address, tag)` pairs sorted by address
    pub fn sorted(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .rewrites
            .iter()
            .map(|r| (r.address.clone(), r.tag.clone()))
            .collect();
        pairs.sort();
        pairs
    }

    /// Rewrite one line (without its line ending)
    pub fn convert_line(&self, line: &str) -> String {
        if let Some(converted) = convert_secret_key(line) {
            return converted;
        }

        let is_raw = line.contains(":raw");
        let mut line = line.to_string();
        for rewrite in &self.rewrites {
            if is_raw && !replaceable_in_raw(&rewrite.address) {
                continue;
            }
            line = rewrite.apply(&line);
        }
        line
    }

    /// Rewrite a whole document, keeping line endings
    pub fn convert_text(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for line in text.split_inclusive('\n') {
            let content = line.trim_end_matches(['\n', '\r']);
            out.push_str(&self.convert_line(content));
            out.push_str(&line[content.len()..]);
        }
        out
    }
}

/// Swap the known signing key for the sender tag, keeping the quote style
fn convert_secret_key(line: &str) -> Option<String> {
    let lower = line.to_ascii_lowercase();
    if !line.contains("secretKey") || !lower.contains(KNOWN_SECRET_KEY) {
        return None;
    }
    if lower.contains(&format!(":0x{}>", KNOWN_SECRET_KEY)) {
        return Some(line.to_string());
    }

    let tag = format!("<eoa:sender:0x{}>", KNOWN_SECRET_KEY);
    let patterns = [
        (format!("\"{}\"", KNOWN_SECRET_KEY), format!("\"{}\"", tag)),
        (format!("'{}'", KNOWN_SECRET_KEY), format!("'{}'", tag)),
        (format!("\"0x{}\"", KNOWN_SECRET_KEY), format!("\"{}\"", tag)),
        (format!("'0x{}'", KNOWN_SECRET_KEY), format!("'{}'", tag)),
        (format!("0x{}", KNOWN_SECRET_KEY), format!("\"{}\"", tag)),
        (KNOWN_SECRET_KEY.to_string(), format!("\"{}\"", tag)),
    ];

    let (pattern, replacement) = patterns
        .iter()
        .find(|(pattern, _)| lower.contains(pattern.as_str()))?;
    Some(splice_matches(line, pattern, |_, start, end| {
        Some((start, end, replacement.clone()))
    }))
}
