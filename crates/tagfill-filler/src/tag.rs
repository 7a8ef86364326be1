//! Bracket tag grammar
//!
//! A tag stands in for an address that is only known once the pre-state has
//! been allocated:
//!
//! - `<contract:target:0x0000000000000000000000000000000000001000>`
//! - `<eoa:sender:0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b>`
//! - `<eoa:0x1000000000000000000000000000000000000000>` (the name is the address text)
//!
//! The trailing address is only a hint for readers of the document; the
//! resolved value always comes from a [`TagTable`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use regex::{NoExpand, Regex};
use tagfill_primitives::Address;

use crate::error::{FillerError, FillerResult};
use crate::table::TagTable;

/// Tag names referenced by a piece of the document, with the kind they were written with
pub type Dependencies = BTreeMap<String, TagKind>;

/// Kind prefix of a bracket tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagKind {
    /// Deployed contract
    Contract,
    /// Externally owned account
    Eoa,
    /// Block proposer, resolved like an EOA
    Coinbase,
}

impl TagKind {
    /// Parse the kind prefix
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "contract" => Some(TagKind::Contract),
            "eoa" => Some(TagKind::Eoa),
            "coinbase" => Some(TagKind::Coinbase),
            _ => None,
        }
    }

    /// Prefix as written in documents
    pub fn as_str(&self) -> &'static str {
        match self {
            TagKind::Contract => "contract",
            TagKind::Eoa => "eoa",
            TagKind::Coinbase => "coinbase",
        }
    }

    /// Whether an undeclared tag of this kind may be conjured as an empty account
    pub fn is_eoa(&self) -> bool {
        match self {
            TagKind::Contract => false,
            TagKind::Eoa | TagKind::Coinbase => true,
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed bracket tag
///
/// Equality, ordering and hashing only look at `(kind, name)`.
#[derive(Debug, Clone)]
pub struct Tag {
    kind: TagKind,
    name: String,
    hint: Option<String>,
}

fn three_part_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^<(\w+):([^:]+):(.+)>$").expect("valid regex"))
}

fn two_part_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^<(\w+):(.+)>$").expect("valid regex"))
}

// The address suffix is limited to hex digits so that two tags on one line
// are never merged into a single match.
fn embedded_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"<(\w+):(\w+)(?::0x[0-9a-fA-F]*)?>").expect("valid regex")
    })
}

impl Tag {
    /// Create a tag without an address hint
    pub fn new(kind: TagKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            hint: None,
        }
    }

    /// Create a tag carrying an address hint
    pub fn with_hint(kind: TagKind, name: impl Into<String>, hint: Address) -> Self {
        Self {
            kind,
            name: name.into(),
            hint: Some(hint.to_hex()),
        }
    }

    /// Parse `<kind:name:0xADDR>` or `<kind:0xADDR>`
    pub fn parse(text: &str) -> FillerResult<Self> {
        let text = text.trim();
        let (prefix, name, hint) = if let Some(caps) = three_part_pattern().captures(text) {
            (caps[1].to_string(), caps[2].to_string(), Some(caps[3].to_string()))
        } else if let Some(caps) = two_part_pattern().captures(text) {
            let name = caps[2].to_string();
            let hint = name.starts_with("0x").then(|| name.clone());
            (caps[1].to_string(), name, hint)
        } else {
            return Err(FillerError::UnknownTagKind(text.to_string()));
        };

        let kind =
            TagKind::from_prefix(&prefix).ok_or_else(|| FillerError::UnknownTagKind(text.to_string()))?;
        Ok(Self { kind, name, hint })
    }

    /// Whether the text looks like bracket syntax at all
    pub fn is_bracketed(text: &str) -> bool {
        let text = text.trim();
        text.starts_with('<') && text.ends_with('>')
    }

    /// Tag kind
    pub fn kind(&self) -> TagKind {
        self.kind
    }

    /// Tag name (the key into the tag table)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Trailing address text, if written
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Resolve to the address registered under this tag's name
    pub fn resolve(&self, tags: &TagTable) -> FillerResult<Address> {
        tags.resolve_address(&self.name)
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.name == other.name
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.name.hash(state);
    }
}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.kind, &self.name).cmp(&(other.kind, &other.name))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hint {
            Some(hint) if *hint == self.name => write!(f, "<{}:{}>", self.kind, hint),
            Some(hint) => write!(f, "<{}:{}:{}>", self.kind, self.name, hint),
            None => write!(f, "<{}:{}>", self.kind, self.name),
        }
    }
}

/// Either a literal address or a tag standing in for one
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressOrTag {
    /// Literal address
    Address(Address),
    /// Symbolic address
    Tag(Tag),
}

impl AddressOrTag {
    /// Parse bracket syntax, falling back to a left-padded literal address
    pub fn parse(text: &str) -> FillerResult<Self> {
        if Tag::is_bracketed(text) {
            Tag::parse(text).map(AddressOrTag::Tag)
        } else {
            Ok(AddressOrTag::Address(Address::from_hex_padded(text)?))
        }
    }

    /// The tag, if symbolic
    pub fn as_tag(&self) -> Option<&Tag> {
        match self {
            AddressOrTag::Tag(tag) => Some(tag),
            AddressOrTag::Address(_) => None,
        }
    }

    /// Resolve to a concrete address
    pub fn resolve(&self, tags: &TagTable) -> FillerResult<Address> {
        match self {
            AddressOrTag::Address(address) => Ok(*address),
            AddressOrTag::Tag(tag) => tag.resolve(tags),
        }
    }

    /// Key used in logs and error reports
    pub fn describe(&self) -> String {
        match self {
            AddressOrTag::Address(address) => address.to_hex(),
            AddressOrTag::Tag(tag) => tag.to_string(),
        }
    }
}

/// Names of all tags embedded in arbitrary text, whatever their kind
pub fn contained_tags(text: &str) -> BTreeSet<String> {
    embedded_pattern()
        .captures_iter(text)
        .map(|caps| caps[2].to_string())
        .collect()
}

/// Tags embedded in text together with their kinds
pub fn contained_dependencies(text: &str) -> FillerResult<Dependencies> {
    let mut deps = Dependencies::new();
    for caps in embedded_pattern().captures_iter(text) {
        let kind = TagKind::from_prefix(&caps[1])
            .ok_or_else(|| FillerError::UnknownTagKind(caps[0].to_string()))?;
        deps.insert(caps[2].to_string(), kind);
    }
    Ok(deps)
}

/// Replace every embedded tag with the `0x`-prefixed hex of its resolved address
///
/// Hex dialects drop the prefix again when decoding, see [`crate::code`].
pub fn substitute_tags(text: &str, tags: &TagTable) -> FillerResult<String> {
    let mut output = text.to_string();
    for name in contained_tags(text) {
        let address = tags.resolve_address(&name)?;
        let pattern = Regex::new(&format!(
            r"<\w+:{}(?::0x[0-9a-fA-F]*)?>",
            regex::escape(&name)
        ))
        .map_err(|e| FillerError::CodeParse(e.to_string()))?;
        output = pattern
            .replace_all(&output, NoExpand(&address.to_hex()))
            .into_owned();
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Identity;

    fn table(entries: &[(&str, &str)]) -> TagTable {
        let mut tags = TagTable::new();
        for (name, address) in entries {
            tags.insert(*name, Identity::Address(Address::from_hex_padded(address).unwrap()))
                .unwrap();
        }
        tags
    }

    // ==================== Parsing ====================

    #[test]
    fn test_parse_three_part() {
        let tag = Tag::parse("<contract:target:0x0000000000000000000000000000000000001000>").unwrap();
        assert_eq!(tag.kind(), TagKind::Contract);
        assert_eq!(tag.name(), "target");
        assert_eq!(tag.hint(), Some("0x0000000000000000000000000000000000001000"));
    }

    #[test]
    fn test_parse_two_part_uses_address_as_name() {
        let tag = Tag::parse("<eoa:0x1000000000000000000000000000000000000000>").unwrap();
        assert_eq!(tag.kind(), TagKind::Eoa);
        assert_eq!(tag.name(), "0x1000000000000000000000000000000000000000");
    }

    #[test]
    fn test_parse_coinbase() {
        let tag = Tag::parse("<coinbase:0x2adc25665018aa1fe0e6bc666dac8fc2697ff9ba>").unwrap();
        assert_eq!(tag.kind(), TagKind::Coinbase);
        assert!(tag.kind().is_eoa());
    }

    #[test]
    fn test_parse_unknown_kind() {
        assert!(matches!(
            Tag::parse("<wallet:alice:0x00>"),
            Err(FillerError::UnknownTagKind(_))
        ));
    }

    #[test]
    fn test_display_roundtrip() {
        for text in [
            "<contract:target:0x0000000000000000000000000000000000001000>",
            "<eoa:0x1000000000000000000000000000000000000000>",
            "<eoa:sender>",
        ] {
            assert_eq!(Tag::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_equality_ignores_hint() {
        let a = Tag::parse("<contract:target:0x01>").unwrap();
        let b = Tag::parse("<contract:target:0x02>").unwrap();
        let c = Tag::parse("<eoa:target:0x01>").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_address_or_tag_literal_is_padded() {
        let parsed = AddressOrTag::parse("0x1000").unwrap();
        assert_eq!(
            parsed,
            AddressOrTag::Address(Address::from_hex("0x0000000000000000000000000000000000001000").unwrap())
        );
    }

    // ==================== Scanning ====================

    #[test]
    fn test_contained_tags_finds_all() {
        let code = ":raw 0x600060006000600073<contract:callee:0x1000>5af1 <eoa:sender:0xa94f>";
        let names = contained_tags(code);
        assert_eq!(names.len(), 2);
        assert!(names.contains("callee"));
        assert!(names.contains("sender"));
    }

    #[test]
    fn test_contained_dependencies_kinds() {
        let deps = contained_dependencies("{ (CALL 0 <contract:a:0x01> 0 0 0 0 0) <eoa:b:0x02> }").unwrap();
        assert_eq!(deps.get("a"), Some(&TagKind::Contract));
        assert_eq!(deps.get("b"), Some(&TagKind::Eoa));
    }

    #[test]
    fn test_contained_dependencies_unknown_kind() {
        assert!(matches!(
            contained_dependencies(":raw 0x<thing:a:0x01>"),
            Err(FillerError::UnknownTagKind(_))
        ));
    }

    // ==================== Substitution ====================

    #[test]
    fn test_substitute_tags() {
        let tags = table(&[("callee", "0xc0de")]);
        let out = substitute_tags("{ (CALL 0 <contract:callee:0x1000> 0 0 0 0 0) }", &tags).unwrap();
        assert_eq!(
            out,
            "{ (CALL 0 0x000000000000000000000000000000000000c0de 0 0 0 0 0) }"
        );
    }

    #[test]
    fn test_substitute_adjacent_tags() {
        let tags = table(&[("a", "0x0a"), ("b", "0x0b")]);
        let out = substitute_tags("<contract:a:0x01><contract:b:0x02>", &tags).unwrap();
        assert_eq!(
            out,
            "0x000000000000000000000000000000000000000a0x000000000000000000000000000000000000000b"
        );
    }

    #[test]
    fn test_substitute_missing_tag() {
        let tags = TagTable::new();
        match substitute_tags("<contract:ghost:0x01>", &tags) {
            Err(FillerError::UnresolvedTag(name)) => assert_eq!(name, "ghost"),
            other => panic!("expected UnresolvedTag, got {:?}", other),
        }
    }
}
