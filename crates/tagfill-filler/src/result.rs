//! Expected post-state resolution
//!
//! Unlike the pre-state, nothing is allocated here: every tag must already
//! be in the table built for the pre-state.

use std::collections::BTreeMap;

use serde::Deserialize;
use tagfill_primitives::Address;

use crate::account::{ExpectedAccount, PostAccount};
use crate::code::CompilerTools;
use crate::error::{FillerError, FillerResult};
use crate::table::TagTable;
use crate::tag::{AddressOrTag, Dependencies};
use crate::types::OrderedMap;

/// Concrete expected post-state
pub type PostState = BTreeMap<Address, PostAccount>;

/// `result` of an expect section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ResultSection(OrderedMap<AddressOrTag, ExpectedAccount>);

impl ResultSection {
    /// Build from entries in order
    pub fn new(entries: Vec<(AddressOrTag, ExpectedAccount)>) -> Self {
        ResultSection(OrderedMap(entries))
    }

    /// Entries in document order
    pub fn entries(&self) -> &[(AddressOrTag, ExpectedAccount)] {
        &self.0 .0
    }

    /// Tags used as keys or inside expected accounts
    pub fn dependencies(&self) -> Dependencies {
        let mut deps = Dependencies::new();
        for (key, account) in self.entries() {
            key.collect_dependencies(&mut deps);
            deps.extend(account.dependencies());
        }
        deps
    }

    /// Resolve every entry
    ///
    /// Two keys landing on the same address are an error.
    pub fn resolve(&self, tags: &TagTable, tools: &dyn CompilerTools) -> FillerResult<PostState> {
        let mut post = PostState::new();
        for (key, account) in self.entries() {
            let address = key.resolve(tags)?;
            if post.contains_key(&address) {
                return Err(FillerError::DuplicateAccount {
                    key: key.describe(),
                    address: address.to_hex(),
                });
            }
            post.insert(address, account.resolve(tags, tools)?);
        }
        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::StorageExpectation;
    use crate::code::NoTools;
    use crate::table::Identity;
    use crate::tag::TagKind;
    use primitive_types::U256;

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
    fn test_dependencies_include_keys() {
        let result: ResultSection = serde_yaml::from_str(
            "<contract:target:0x01>:\n  storage:\n    0x00: <eoa:sender:0x02>\n",
        )
        .unwrap();
        let deps = result.dependencies();
        assert_eq!(deps.get("target"), Some(&TagKind::Contract));
        assert_eq!(deps.get("sender"), Some(&TagKind::Eoa));
    }

    #[test]
    fn test_resolve() {
        let yaml = r#"
<contract:target:0x01>:
  storage:
    0x00: 1
    0x01: ANY
0x00000000000000000000000000000000000000aa: null
"#;
        let result: ResultSection = serde_yaml::from_str(yaml).unwrap();
        let post = result.resolve(&tags(), &NoTools).unwrap();
        assert_eq!(post.len(), 2);

        let target = Address::from_hex_padded("0x1000").unwrap();
        let PostAccount::Present(state) = &post[&target] else {
            panic!("target should be present");
        };
        let storage = state.storage.as_ref().unwrap();
        assert_eq!(storage[&U256::zero()], StorageExpectation::Exact(U256::one()));
        assert_eq!(storage[&U256::one()], StorageExpectation::Any);

        let gone = Address::from_hex_padded("0xaa").unwrap();
        assert_eq!(post[&gone], PostAccount::Absent);
    }

    #[test]
    fn test_unknown_tag_key() {
        let result: ResultSection =
            serde_yaml::from_str("<contract:ghost:0x01>:\n  balance: 1\n").unwrap();
        assert!(matches!(
            result.resolve(&tags(), &NoTools),
            Err(FillerError::UnresolvedTag(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_literal_and_tag_on_same_address() {
        let yaml = r#"
0x0000000000000000000000000000000000001000:
  balance: 1
<contract:target:0x01>:
  nonce: 1
"#;
        let result: ResultSection = serde_yaml::from_str(yaml).unwrap();
        let err = result.resolve(&tags(), &NoTools).unwrap_err();
        assert!(matches!(
            err,
            FillerError::DuplicateAccount { key, address }
                if key == "<contract:target:0x01>"
                    && address == "0x0000000000000000000000000000000000001000"
        ));
    }
}
