//! Tag table: name to concrete identity

use std::collections::BTreeMap;

use serde::Serialize;
use tagfill_primitives::{Address, H256};

use crate::error::{FillerError, FillerResult};

/// Funded externally owned account with its signing key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Eoa {
    /// Account address
    pub address: Address,
    /// Secret key
    pub key: H256,
}

/// Concrete value a tag resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Identity {
    /// Plain address (deployed contract, literal pre-state key)
    Address(Address),
    /// Account that can also sign
    Eoa(Eoa),
}

impl Identity {
    /// Address regardless of variant
    pub fn address(&self) -> Address {
        match self {
            Identity::Address(address) => *address,
            Identity::Eoa(eoa) => eoa.address,
        }
    }
}

/// Resolved tags for one document
///
/// Write-once: a name, once inserted, keeps its identity for the rest of
/// the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TagTable {
    entries: BTreeMap<String, Identity>,
}

impl TagTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an identity under a name
    pub fn insert(&mut self, name: impl Into<String>, identity: Identity) -> FillerResult<()> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(FillerError::DuplicateTag(name));
        }
        self.entries.insert(name, identity);
        Ok(())
    }

    /// Whether a name has been resolved
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Look up an identity
    pub fn get(&self, name: &str) -> Option<&Identity> {
        self.entries.get(name)
    }

    /// Address registered under a name
    pub fn resolve_address(&self, name: &str) -> FillerResult<Address> {
        self.entries
            .get(name)
            .map(Identity::address)
            .ok_or_else(|| FillerError::UnresolvedTag(name.to_string()))
    }

    /// Signing identity registered under a name
    pub fn resolve_eoa(&self, name: &str) -> FillerResult<Eoa> {
        match self.entries.get(name) {
            Some(Identity::Eoa(eoa)) => Ok(*eoa),
            Some(Identity::Address(_)) => Err(FillerError::NotAnEoa(name.to_string())),
            None => Err(FillerError::UnresolvedTag(name.to_string())),
        }
    }

    /// Number of resolved names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been resolved yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Identity)> {
        self.entries.iter()
    }
}
