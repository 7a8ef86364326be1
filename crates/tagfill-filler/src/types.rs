//! Field types accepted by filler documents
//!
//! Filler values arrive either as native YAML/JSON integers or as strings in
//! the quantity grammar of [`parse_value`], and most address-like fields may
//! also carry a bracket tag instead of a literal.

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::OnceLock;

use primitive_types::U256;
use regex::Regex;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use tagfill_primitives::{parse_value, Address, BIGINT_PREFIX, H256};

use crate::error::{FillerError, FillerResult};
use crate::table::{Eoa, TagTable};
use crate::tag::{AddressOrTag, Dependencies, Tag, TagKind};

/// Raw scalar as it appears in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    /// Native non-negative integer
    Int(U256),
    /// String in any of the document grammars
    Str(String),
}

const JSON_NUMBER_TOKEN: &str = "$serde_json::private::Number";

/// Decimal digits of a native integer too wide for the parser's own types
fn wide_integer(digits: &str) -> Result<U256, String> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("number {} is not a non-negative integer", digits));
    }
    U256::from_dec_str(digits).map_err(|_| format!("number {} does not fit in 256 bits", digits))
}

struct ScalarVisitor;

impl<'de> Visitor<'de> for ScalarVisitor {
    type Value = Scalar;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an integer or a string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Scalar, E> {
        Ok(Scalar::Int(U256::from(v)))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<Scalar, E> {
        Ok(Scalar::Int(U256::from(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Scalar, E> {
        u64::try_from(v)
            .map(|v| Scalar::Int(U256::from(v)))
            .map_err(|_| E::custom(format!("negative value: {}", v)))
    }

    fn visit_i128<E: de::Error>(self, v: i128) -> Result<Scalar, E> {
        u128::try_from(v)
            .map(|v| Scalar::Int(U256::from(v)))
            .map_err(|_| E::custom(format!("negative value: {}", v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Scalar, E> {
        Err(E::custom(format!("number {} is not an integer", v)))
    }

    // With `arbitrary_precision`, serde_json hands numbers beyond 64 bits
    // over as a one-entry map holding the literal digits.
    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Scalar, A::Error> {
        match map.next_key::<String>()?.as_deref() {
            Some(JSON_NUMBER_TOKEN) => {
                let digits: String = map.next_value()?;
                wide_integer(&digits).map(Scalar::Int).map_err(de::Error::custom)
            }
            _ => Err(de::Error::invalid_type(de::Unexpected::Map, &self)),
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Scalar, E> {
        if v.starts_with(BIGINT_PREFIX) {
            return parse_value(v).map(Scalar::Int).map_err(E::custom);
        }
        Ok(Scalar::Str(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Scalar, E> {
        if v.starts_with(BIGINT_PREFIX) {
            return self.visit_str(&v);
        }
        Ok(Scalar::Str(v))
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ScalarVisitor)
    }
}

/// Deserialize through [`Scalar`] and a fallible conversion
fn from_scalar<'de, D, T, F>(deserializer: D, convert: F) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    F: FnOnce(Scalar) -> FillerResult<T>,
{
    let scalar = Scalar::deserialize(deserializer)?;
    convert(scalar).map_err(de::Error::custom)
}

// =============================================================================
// Wide YAML integers
// =============================================================================

// serde_yaml reads plain integers past 128 bits as floats, so their digits
// have to be rescued from the text before parsing.
fn wide_digits_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[0-9]{39,}").expect("valid regex"))
}

/// Rewrite plain YAML integers too wide for 128 bits into the
/// `0x:bigint <hex>` string form, which reads back as the same integer.
///
/// Quoted strings, comments and block scalars (`|`, `>`) are left alone.
pub fn quote_wide_integers(text: &str) -> Cow<'_, str> {
    if !wide_digits_pattern().is_match(text) {
        return Cow::Borrowed(text);
    }

    let mut output = String::with_capacity(text.len() + 64);
    let mut block_indent: Option<usize> = None;
    for line in text.split_inclusive('\n') {
        let indent = line.len() - line.trim_start_matches(' ').len();
        if let Some(parent) = block_indent {
            if line.trim().is_empty() || indent > parent {
                output.push_str(line);
                continue;
            }
            block_indent = None;
        }
        output.push_str(&quote_line(line));
        if opens_block_scalar(line) {
            block_indent = Some(indent);
        }
    }
    Cow::Owned(output)
}

fn quote_line(line: &str) -> Cow<'_, str> {
    let mut output = String::new();
    let mut copied = 0;
    for found in wide_digits_pattern().find_iter(line) {
        if !is_plain_scalar(&line[..found.start()], &line[found.end()..]) {
            continue;
        }
        let Ok(value) = U256::from_dec_str(found.as_str()) else {
            continue;
        };
        output.push_str(&line[copied..found.start()]);
        output.push_str(&format!("'{}{:x}'", BIGINT_PREFIX, value));
        copied = found.end();
    }
    if copied == 0 {
        return Cow::Borrowed(line);
    }
    output.push_str(&line[copied..]);
    Cow::Owned(output)
}

/// Whether a digit run between `before` and `after` is a whole plain scalar
fn is_plain_scalar(before: &str, after: &str) -> bool {
    let in_quotes = before.matches('\'').count() % 2 == 1 || before.matches('"').count() % 2 == 1;
    let in_comment = before.trim_start().starts_with('#') || before.contains(" #");
    if in_quotes || in_comment {
        return false;
    }

    let trimmed = before.trim_end();
    let spaced = trimmed.len() < before.len();
    let opens = match trimmed.chars().last() {
        None => true,
        Some(':') | Some('-') => spaced,
        Some('[') | Some(',') | Some('{') => true,
        Some(_) => false,
    };

    let rest = after.trim_start();
    let closes = rest.is_empty()
        || rest.starts_with([',', ']', '}'])
        || (rest.starts_with('#') && rest.len() < after.len())
        || rest
            .strip_prefix(':')
            .is_some_and(|r| r.is_empty() || r.starts_with(char::is_whitespace));
    opens && closes
}

fn opens_block_scalar(line: &str) -> bool {
    let body = line.trim_end();
    let Some(token) = body.split_whitespace().last() else {
        return false;
    };
    token.len() < body.trim_start().len()
        && token.starts_with(['|', '>'])
        && token[1..].chars().all(|c| matches!(c, '+' | '-' | '0'..='9'))
}

// =============================================================================
// Quantities
// =============================================================================

/// Plain quantity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Value(pub U256);

impl Value {
    fn from_scalar(scalar: Scalar) -> FillerResult<Self> {
        match scalar {
            Scalar::Int(v) => Ok(Value(v)),
            Scalar::Str(s) => Ok(Value(parse_value(&s)?)),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        from_scalar(deserializer, Value::from_scalar)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value(U256::from(v))
    }
}

/// Quantity, or a tag standing for the numeric value of an address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValueOrTag {
    /// Literal quantity
    Value(U256),
    /// Address tag
    Tag(Tag),
}

impl ValueOrTag {
    fn from_scalar(scalar: Scalar) -> FillerResult<Self> {
        match scalar {
            Scalar::Int(v) => Ok(ValueOrTag::Value(v)),
            Scalar::Str(s) if Tag::is_bracketed(&s) => Tag::parse(&s).map(ValueOrTag::Tag),
            Scalar::Str(s) => Ok(ValueOrTag::Value(parse_value(&s)?)),
        }
    }

    /// Record the tag this value depends on, if any
    pub fn collect_dependencies(&self, deps: &mut Dependencies) {
        if let ValueOrTag::Tag(tag) = self {
            deps.insert(tag.name().to_string(), tag.kind());
        }
    }

    /// Concrete quantity; tags become their address as a number
    pub fn resolve(&self, tags: &TagTable) -> FillerResult<U256> {
        match self {
            ValueOrTag::Value(v) => Ok(*v),
            ValueOrTag::Tag(tag) => Ok(tag.resolve(tags)?.to_u256()),
        }
    }
}

impl<'de> Deserialize<'de> for ValueOrTag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        from_scalar(deserializer, ValueOrTag::from_scalar)
    }
}

/// Expected storage value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageValue {
    /// `ANY`: the slot may hold anything
    Any,
    /// Exact value
    Value(ValueOrTag),
}

impl<'de> Deserialize<'de> for StorageValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        from_scalar(deserializer, |scalar| match scalar {
            Scalar::Str(s) if s.trim() == "ANY" => Ok(StorageValue::Any),
            other => ValueOrTag::from_scalar(other).map(StorageValue::Value),
        })
    }
}

// =============================================================================
// Addresses and keys
// =============================================================================

impl AddressOrTag {
    fn from_scalar(scalar: Scalar) -> FillerResult<Self> {
        match scalar {
            Scalar::Int(v) => Ok(AddressOrTag::Address(Address::from_u256(v)?)),
            Scalar::Str(s) => AddressOrTag::parse(&s),
        }
    }

    /// Record the tag this address depends on, if any
    pub fn collect_dependencies(&self, deps: &mut Dependencies) {
        if let AddressOrTag::Tag(tag) = self {
            deps.insert(tag.name().to_string(), tag.kind());
        }
    }
}

impl<'de> Deserialize<'de> for AddressOrTag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        from_scalar(deserializer, AddressOrTag::from_scalar)
    }
}

/// Literal address, left padded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralAddress(pub Address);

impl<'de> Deserialize<'de> for LiteralAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        from_scalar(deserializer, |scalar| match scalar {
            Scalar::Int(v) => Ok(LiteralAddress(Address::from_u256(v)?)),
            Scalar::Str(s) => Ok(LiteralAddress(Address::from_hex_padded(&s)?)),
        })
    }
}

/// Secret key, or a tag naming the funded account that owns one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOrTag {
    /// Literal 32-byte key
    Key(H256),
    /// EOA tag
    Tag(Tag),
}

impl KeyOrTag {
    fn from_scalar(scalar: Scalar) -> FillerResult<Self> {
        match scalar {
            Scalar::Int(v) => Ok(KeyOrTag::Key(H256::from_u256(v))),
            Scalar::Str(s) if Tag::is_bracketed(&s) => {
                let tag = Tag::parse(&s)?;
                if tag.kind() == TagKind::Contract {
                    return Err(FillerError::NotAnEoa(tag.name().to_string()));
                }
                Ok(KeyOrTag::Tag(tag))
            }
            Scalar::Str(s) => Ok(KeyOrTag::Key(H256::from_hex_padded(&s)?)),
        }
    }

    /// Record the tag this key depends on, if any
    pub fn collect_dependencies(&self, deps: &mut Dependencies) {
        if let KeyOrTag::Tag(tag) = self {
            deps.insert(tag.name().to_string(), tag.kind());
        }
    }

    /// Signing identity
    ///
    /// A literal key is turned into its account; a tag must name an EOA.
    pub fn resolve(&self, tags: &TagTable) -> FillerResult<Eoa> {
        match self {
            KeyOrTag::Key(key) => Ok(Eoa {
                address: tagfill_crypto::secret_key_to_address(key)?,
                key: *key,
            }),
            KeyOrTag::Tag(tag) => tags.resolve_eoa(tag.name()),
        }
    }
}

impl<'de> Deserialize<'de> for KeyOrTag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        from_scalar(deserializer, KeyOrTag::from_scalar)
    }
}

/// Storage key or access-list key, left padded to 32 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Word(pub H256);

impl<'de> Deserialize<'de> for Word {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        from_scalar(deserializer, |scalar| match scalar {
            Scalar::Int(v) => Ok(Word(H256::from_u256(v))),
            Scalar::Str(s) => Ok(Word(H256::from_hex_padded(&s)?)),
        })
    }
}

// =============================================================================
// Ordered maps
// =============================================================================

/// Mapping that keeps document order
///
/// Pre-state resolution visits entries in the order they were written, so
/// sections keyed by address or tag are read into this instead of a hash map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedMap<K, V>(pub Vec<(K, V)>);

impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        OrderedMap(Vec::new())
    }
}

impl<K, V> OrderedMap<K, V> {
    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in document order
    pub fn iter(&self) -> impl Iterator<Item = &(K, V)> {
        self.0.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for OrderedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        OrderedMap(iter.into_iter().collect())
    }
}

struct OrderedMapVisitor<K, V>(PhantomData<(K, V)>);

impl<'de, K, V> Visitor<'de> for OrderedMapVisitor<K, V>
where
    K: Deserialize<'de> + PartialEq + fmt::Debug,
    V: Deserialize<'de>,
{
    type Value = OrderedMap<K, V>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries: Vec<(K, V)> = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<K, V>()? {
            if entries.iter().any(|(k, _)| *k == key) {
                return Err(de::Error::custom(format!("duplicate key: {:?}", key)));
            }
            entries.push((key, value));
        }
        Ok(OrderedMap(entries))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(OrderedMap(Vec::new()))
    }
}

impl<'de, K, V> Deserialize<'de> for OrderedMap<K, V>
where
    K: Deserialize<'de> + PartialEq + fmt::Debug,
    V: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}
