//! Block environment section

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use tagfill_primitives::{Address, H256};

use crate::error::FillerResult;
use crate::table::TagTable;
use crate::tag::{AddressOrTag, Dependencies};
use crate::types::{Value, Word};

/// `env` as written in the document
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSection {
    /// Block proposer; may be a tag
    pub current_coinbase: AddressOrTag,
    /// Difficulty (pre-merge)
    #[serde(default)]
    pub current_difficulty: Option<Value>,
    /// Block gas limit
    pub current_gas_limit: Value,
    /// Block number
    pub current_number: Value,
    /// Block timestamp
    pub current_timestamp: Value,
    /// Base fee (London and later)
    #[serde(default)]
    pub current_base_fee: Option<Value>,
    /// Prevrandao (Paris and later)
    #[serde(default)]
    pub current_random: Option<Word>,
    /// Excess blob gas (Cancun and later)
    #[serde(default)]
    pub current_excess_blob_gas: Option<Value>,
    /// Parent hash
    #[serde(default)]
    pub previous_hash: Option<Word>,
}

/// Concrete block environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Block proposer
    pub coinbase: Address,
    /// Difficulty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<U256>,
    /// Gas limit
    pub gas_limit: U256,
    /// Number
    pub number: U256,
    /// Timestamp
    pub timestamp: U256,
    /// Base fee
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_fee: Option<U256>,
    /// Prevrandao
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random: Option<H256>,
    /// Excess blob gas
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excess_blob_gas: Option<U256>,
    /// Parent hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<H256>,
}

impl EnvironmentSection {
    /// The coinbase tag, if any
    pub fn dependencies(&self) -> Dependencies {
        let mut deps = Dependencies::new();
        self.current_coinbase.collect_dependencies(&mut deps);
        deps
    }

    /// Resolve the coinbase and copy the rest
    pub fn resolve(&self, tags: &TagTable) -> FillerResult<Environment> {
        Ok(Environment {
            coinbase: self.current_coinbase.resolve(tags)?,
            difficulty: self.current_difficulty.map(|v| v.0),
            gas_limit: self.current_gas_limit.0,
            number: self.current_number.0,
            timestamp: self.current_timestamp.0,
            base_fee: self.current_base_fee.map(|v| v.0),
            random: self.current_random.map(|w| w.0),
            excess_blob_gas: self.current_excess_blob_gas.map(|v| v.0),
            previous_hash: self.previous_hash.map(|w| w.0),
        })
    }
}
