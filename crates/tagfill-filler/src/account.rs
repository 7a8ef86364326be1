//! Account declarations in `pre` and in expected results

use std::collections::BTreeMap;

use primitive_types::U256;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::alloc::AccountProperties;
use crate::code::{CompilerTools, SymbolicCode};
use crate::error::FillerResult;
use crate::table::TagTable;
use crate::tag::Dependencies;
use crate::types::{OrderedMap, StorageValue, Value, ValueOrTag};

/// Account as declared in the pre-state
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountDeclaration {
    /// Balance (funding amount for EOA tags)
    #[serde(default)]
    pub balance: Option<Value>,
    /// Symbolic code
    #[serde(default)]
    pub code: Option<SymbolicCode>,
    /// Nonce
    #[serde(default)]
    pub nonce: Option<Value>,
    /// Storage; keys and values may be tags
    #[serde(default)]
    pub storage: Option<OrderedMap<ValueOrTag, ValueOrTag>>,
}

impl AccountDeclaration {
    /// Tags referenced by code and storage
    pub fn dependencies(&self) -> Dependencies {
        let mut deps = Dependencies::new();
        if let Some(storage) = &self.storage {
            for (key, value) in storage.iter() {
                key.collect_dependencies(&mut deps);
                value.collect_dependencies(&mut deps);
            }
        }
        if let Some(code) = &self.code {
            deps.extend(code.dependencies().iter().map(|(k, v)| (k.clone(), *v)));
        }
        deps
    }

    /// Resolve every field against the tag table
    ///
    /// Code is only set when it compiles to something non-empty, storage
    /// only when it has slots.
    pub fn resolve(&self, tags: &TagTable, tools: &dyn CompilerTools) -> FillerResult<AccountProperties> {
        let mut props = AccountProperties {
            balance: self.balance.map(|v| v.0),
            nonce: self.nonce.map(|v| v.0),
            ..AccountProperties::default()
        };

        if let Some(code) = &self.code {
            let compiled = code.compile(tags, tools)?;
            if !compiled.is_empty() {
                props.code = Some(compiled);
            }
        }

        if let Some(storage) = &self.storage {
            let mut slots = BTreeMap::new();
            for (key, value) in storage.iter() {
                slots.insert(key.resolve(tags)?, value.resolve(tags)?);
            }
            if !slots.is_empty() {
                props.storage = Some(slots);
            }
        }

        Ok(props)
    }
}

// =============================================================================
// Expected results
// =============================================================================

/// Account as declared in an `expect` result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedAccount {
    /// `null` or `shouldnotexist`: the account must be absent
    Absent,
    /// Fields to check
    Present(ExpectedFields),
}

/// Checked fields of an expected account
///
/// Keys other than the checked fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExpectedFields {
    /// Balance
    #[serde(default)]
    pub balance: Option<Value>,
    /// Code
    #[serde(default)]
    pub code: Option<SymbolicCode>,
    /// Nonce
    #[serde(default)]
    pub nonce: Option<Value>,
    /// Storage; values may be `ANY`
    #[serde(default)]
    pub storage: Option<OrderedMap<ValueOrTag, StorageValue>>,
    #[serde(default, rename = "shouldnotexist", deserialize_with = "field_present")]
    should_not_exist: bool,
}

fn field_present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    IgnoredAny::deserialize(deserializer)?;
    Ok(true)
}

impl<'de> Deserialize<'de> for ExpectedAccount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<ExpectedFields>::deserialize(deserializer)? {
            None => ExpectedAccount::Absent,
            Some(fields) if fields.should_not_exist => ExpectedAccount::Absent,
            Some(fields) => ExpectedAccount::Present(fields),
        })
    }
}

impl ExpectedAccount {
    /// Tags referenced by code and storage
    pub fn dependencies(&self) -> Dependencies {
        let mut deps = Dependencies::new();
        let fields = match self {
            ExpectedAccount::Absent => return deps,
            ExpectedAccount::Present(fields) => fields,
        };
        if let Some(storage) = &fields.storage {
            for (key, value) in storage.iter() {
                key.collect_dependencies(&mut deps);
                if let StorageValue::Value(value) = value {
                    value.collect_dependencies(&mut deps);
                }
            }
        }
        if let Some(code) = &fields.code {
            deps.extend(code.dependencies().iter().map(|(k, v)| (k.clone(), *v)));
        }
        deps
    }

    /// Resolve against a complete tag table
    pub fn resolve(&self, tags: &TagTable, tools: &dyn CompilerTools) -> FillerResult<PostAccount> {
        let fields = match self {
            ExpectedAccount::Absent => return Ok(PostAccount::Absent),
            ExpectedAccount::Present(fields) => fields,
        };

        let storage = match &fields.storage {
            Some(storage) => {
                let mut slots = BTreeMap::new();
                for (key, value) in storage.iter() {
                    let expectation = match value {
                        StorageValue::Any => StorageExpectation::Any,
                        StorageValue::Value(value) => StorageExpectation::Exact(value.resolve(tags)?),
                    };
                    slots.insert(key.resolve(tags)?, expectation);
                }
                Some(slots)
            }
            None => None,
        };

        let code = match &fields.code {
            Some(code) => Some(code.compile(tags, tools)?),
            None => None,
        };

        Ok(PostAccount::Present(ExpectedState {
            balance: fields.balance.map(|v| v.0),
            nonce: fields.nonce.map(|v| v.0),
            code,
            storage,
        }))
    }
}

/// Expected storage slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageExpectation {
    /// Slot must hold this value
    Exact(U256),
    /// Any value is accepted
    Any,
}

impl Serialize for StorageExpectation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StorageExpectation::Exact(value) => value.serialize(serializer),
            StorageExpectation::Any => serializer.serialize_str("ANY"),
        }
    }
}

/// Resolved expectations for one account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpectedState {
    /// Expected balance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<U256>,
    /// Expected nonce
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<U256>,
    /// Expected code
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_code"
    )]
    pub code: Option<Vec<u8>>,
    /// Expected storage; slots not listed are not checked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<BTreeMap<U256, StorageExpectation>>,
}

fn serialize_optional_code<S: Serializer>(
    code: &Option<Vec<u8>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match code {
        Some(code) => serializer.serialize_str(&format!("0x{}", hex::encode(code))),
        None => serializer.serialize_none(),
    }
}

/// Resolved post-state entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PostAccount {
    /// Must not exist after execution
    Absent,
    /// Must match the expectations
    Present(ExpectedState),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::NoTools;
    use crate::table::Identity;
    use crate::tag::TagKind;
    use tagfill_primitives::Address;

    fn tags() -> TagTable {
        let mut tags = TagTable::new();
        tags.insert(
            "target",
            Identity::Address(Address::from_hex_padded("0x1000").unwrap()),
        )
        .unwrap();
        tags
    }

    #[test]
    fn test_declaration_dependencies() {
        let yaml = r#"
balance: 100
code: '{ (CALL 0 <contract:callee:0x01> 0 0 0 0 0) }'
storage:
  0x01: <eoa:sender:0x02>
"#;
        let decl: AccountDeclaration = serde_yaml::from_str(yaml).unwrap();
        let deps = decl.dependencies();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps.get("callee"), Some(&TagKind::Contract));
        assert_eq!(deps.get("sender"), Some(&TagKind::Eoa));
    }

    #[test]
    fn test_declaration_rejects_unknown_field() {
        assert!(serde_yaml::from_str::<AccountDeclaration>("balance: 1\nfoo: 2\n").is_err());
    }

    #[test]
    fn test_declaration_resolve() {
        let yaml = r#"
balance: '0x10'
code: ':raw 0x6000'
nonce: 1
storage:
  0x00: <contract:target:0x01>
  0x01: 0
"#;
        let decl: AccountDeclaration = serde_yaml::from_str(yaml).unwrap();
        let props = decl.resolve(&tags(), &NoTools).unwrap();
        assert_eq!(props.balance, Some(U256::from(16)));
        assert_eq!(props.nonce, Some(U256::one()));
        assert_eq!(props.code, Some(vec![0x60, 0x00]));
        let storage = props.storage.unwrap();
        assert_eq!(storage[&U256::zero()], U256::from(0x1000));
        assert_eq!(storage[&U256::one()], U256::zero());
    }

    #[test]
    fn test_empty_code_and_storage_are_omitted() {
        let decl: AccountDeclaration = serde_yaml::from_str("code: ''\nstorage: {}\n").unwrap();
        let props = decl.resolve(&TagTable::new(), &NoTools).unwrap();
        assert!(props.is_empty());
    }

    #[test]
    fn test_expected_null_and_shouldnotexist() {
        let absent: ExpectedAccount = serde_yaml::from_str("null").unwrap();
        assert_eq!(absent, ExpectedAccount::Absent);
        let absent: ExpectedAccount = serde_yaml::from_str("shouldnotexist: 1").unwrap();
        assert_eq!(absent, ExpectedAccount::Absent);
        assert_eq!(
            absent.resolve(&TagTable::new(), &NoTools).unwrap(),
            PostAccount::Absent
        );
    }

    #[test]
    fn test_expected_ignores_extra_keys() {
        let yaml = "comment: checked by the second transaction\nnonce: 1\n";
        let expected: ExpectedAccount = serde_yaml::from_str(yaml).unwrap();
        match expected {
            ExpectedAccount::Present(fields) => assert!(fields.nonce.is_some()),
            ExpectedAccount::Absent => panic!("expected present account"),
        }
    }

    #[test]
    fn test_expected_resolve_with_any() {
        let yaml = r#"
storage:
  0x00: ANY
  <contract:target:0x01>: 1
"#;
        let expected: ExpectedAccount = serde_yaml::from_str(yaml).unwrap();
        assert!(expected.dependencies().contains_key("target"));
        let post = expected.resolve(&tags(), &NoTools).unwrap();
        let PostAccount::Present(state) = post else {
            panic!("expected present account");
        };
        let storage = state.storage.unwrap();
        assert_eq!(storage[&U256::zero()], StorageExpectation::Any);
        assert_eq!(
            storage[&U256::from(0x1000)],
            StorageExpectation::Exact(U256::one())
        );
    }

    #[test]
    fn test_expected_unknown_tag() {
        let expected: ExpectedAccount =
            serde_yaml::from_str("storage:\n  0x00: <contract:ghost:0x01>\n").unwrap();
        assert!(expected.resolve(&TagTable::new(), &NoTools).is_err());
    }

    #[test]
    fn test_post_account_serialization() {
        let state = ExpectedState {
            balance: Some(U256::from(1)),
            storage: Some(BTreeMap::from([(U256::zero(), StorageExpectation::Any)])),
            ..ExpectedState::default()
        };
        let json = serde_json::to_value(PostAccount::Present(state)).unwrap();
        assert_eq!(json["balance"], "0x1");
        assert_eq!(json["storage"]["0x0"], "ANY");
        assert!(json.get("code").is_none());
        assert!(serde_json::to_value(PostAccount::Absent).unwrap().is_null());
    }
}
