//! Transaction section
//!
//! One section describes a family of transactions: `data`, `gasLimit` and
//! `value` are lists, and a concrete transaction picks one entry of each by
//! index.

use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tagfill_primitives::{Address, H256};

use crate::code::{CompilerTools, SymbolicCode};
use crate::error::{FillerError, FillerResult};
use crate::table::TagTable;
use crate::tag::{AddressOrTag, Dependencies};
use crate::types::{KeyOrTag, Scalar, Value, Word};

/// Access-list entry as written
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListEntry {
    /// Accessed account; may be a tag
    pub address: AddressOrTag,
    /// Accessed slots
    #[serde(default)]
    pub storage_keys: Vec<Word>,
}

/// One `data` entry: code, optionally with an access list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEntry {
    /// Calldata (or initcode for creation)
    pub data: SymbolicCode,
    /// Access list
    pub access_list: Option<Vec<AccessListEntry>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DataWithAccessList {
    data: SymbolicCode,
    #[serde(default)]
    access_list: Option<Vec<AccessListEntry>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDataEntry {
    Full(DataWithAccessList),
    Code(SymbolicCode),
}

impl<'de> Deserialize<'de> for DataEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawDataEntry::deserialize(deserializer)? {
            RawDataEntry::Full(full) => DataEntry {
                data: full.data,
                access_list: full.access_list,
            },
            RawDataEntry::Code(data) => DataEntry {
                data,
                access_list: None,
            },
        })
    }
}

fn deserialize_to<'de, D>(deserializer: D) -> Result<Option<AddressOrTag>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Scalar::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(Scalar::Int(v)) => Address::from_u256(v)
            .map(|a| Some(AddressOrTag::Address(a)))
            .map_err(serde::de::Error::custom),
        Some(Scalar::Str(s)) => AddressOrTag::parse(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// `transaction` as written in the document
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GeneralTransaction {
    /// Calldata variants
    pub data: Vec<DataEntry>,
    /// Gas limit variants
    pub gas_limit: Vec<Value>,
    /// Legacy gas price
    #[serde(default)]
    pub gas_price: Option<Value>,
    /// Nonce
    #[serde(default)]
    pub nonce: Option<Value>,
    /// Recipient; absent or `""` creates a contract
    #[serde(default, deserialize_with = "deserialize_to")]
    pub to: Option<AddressOrTag>,
    /// Value variants
    pub value: Vec<Value>,
    /// Signing key or sender tag
    pub secret_key: KeyOrTag,
    /// EIP-1559 fee cap
    #[serde(default)]
    pub max_fee_per_gas: Option<Value>,
    /// EIP-1559 tip cap
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<Value>,
    /// EIP-4844 blob fee cap
    #[serde(default)]
    pub max_fee_per_blob_gas: Option<Value>,
    /// EIP-4844 blob hashes
    #[serde(default)]
    pub blob_versioned_hashes: Option<Vec<Word>>,
}

/// Resolved access-list entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListItem {
    /// Accessed account
    pub address: Address,
    /// Accessed slots
    pub storage_keys: Vec<H256>,
}

fn serialize_bytes<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
}

/// Concrete transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Recipient, `None` for creation
    pub to: Option<Address>,
    /// Sender address
    pub sender: Address,
    /// Sender key
    pub secret_key: H256,
    /// Calldata
    #[serde(serialize_with = "serialize_bytes")]
    pub data: Vec<u8>,
    /// Label of the selected data entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_label: Option<String>,
    /// Access list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_list: Option<Vec<AccessListItem>>,
    /// Gas limit
    pub gas_limit: U256,
    /// Value
    pub value: U256,
    /// Nonce
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<U256>,
    /// Legacy gas price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    /// EIP-1559 fee cap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    /// EIP-1559 tip cap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
    /// EIP-4844 blob fee cap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_blob_gas: Option<U256>,
    /// EIP-4844 blob hashes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_versioned_hashes: Option<Vec<H256>>,
    /// Exception the transaction is expected to raise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expect_exception: Option<String>,
}

fn value_of(v: &Option<Value>) -> Option<U256> {
    v.map(|v| v.0)
}

impl GeneralTransaction {
    /// Check the fee fields
    pub fn validate(&self) -> FillerResult<()> {
        if self.gas_price.is_none()
            && (self.max_fee_per_gas.is_none() || self.max_priority_fee_per_gas.is_none())
        {
            return Err(FillerError::InvalidTransaction(
                "if `gasPrice` is not set, `maxFeePerGas` and `maxPriorityFeePerGas` must be set"
                    .to_string(),
            ));
        }
        if self.data.is_empty() || self.gas_limit.is_empty() || self.value.is_empty() {
            return Err(FillerError::InvalidTransaction(
                "`data`, `gasLimit` and `value` need at least one entry each".to_string(),
            ));
        }
        Ok(())
    }

    /// Tags referenced by the recipient, key, data and access lists
    pub fn dependencies(&self) -> Dependencies {
        let mut deps = Dependencies::new();
        if let Some(to) = &self.to {
            to.collect_dependencies(&mut deps);
        }
        self.secret_key.collect_dependencies(&mut deps);
        for entry in &self.data {
            deps.extend(entry.data.dependencies().iter().map(|(k, v)| (k.clone(), *v)));
            for item in entry.access_list.iter().flatten() {
                item.address.collect_dependencies(&mut deps);
            }
        }
        deps
    }

    /// Label of a data entry, if it has one
    pub fn data_label(&self, d: usize) -> Option<&str> {
        self.data.get(d).and_then(|entry| entry.data.label())
    }

    /// Build the transaction for data index `d`, gas index `g`, value index `v`
    pub fn resolve(
        &self,
        tags: &TagTable,
        (d, g, v): (usize, usize, usize),
        exception: Option<String>,
        tools: &dyn CompilerTools,
    ) -> FillerResult<Transaction> {
        let out_of_range = |field: &str, index: usize| {
            FillerError::InvalidTransaction(format!("{} index {} out of range", field, index))
        };
        let entry = self.data.get(d).ok_or_else(|| out_of_range("data", d))?;
        let gas_limit = self.gas_limit.get(g).ok_or_else(|| out_of_range("gas", g))?;
        let value = self.value.get(v).ok_or_else(|| out_of_range("value", v))?;

        let to = match &self.to {
            Some(to) => Some(to.resolve(tags)?),
            None => None,
        };
        let sender = self.secret_key.resolve(tags)?;

        let access_list = match &entry.access_list {
            Some(list) => Some(
                list.iter()
                    .map(|item| -> FillerResult<AccessListItem> {
                        Ok(AccessListItem {
                            address: item.address.resolve(tags)?,
                            storage_keys: item.storage_keys.iter().map(|w| w.0).collect(),
                        })
                    })
                    .collect::<FillerResult<Vec<_>>>()?,
            ),
            None => None,
        };

        Ok(Transaction {
            to,
            sender: sender.address,
            secret_key: sender.key,
            data: entry.data.compile(tags, tools)?,
            data_label: entry.data.label().map(str::to_string),
            access_list,
            gas_limit: gas_limit.0,
            value: value.0,
            nonce: value_of(&self.nonce),
            gas_price: value_of(&self.gas_price),
            max_fee_per_gas: value_of(&self.max_fee_per_gas),
            max_priority_fee_per_gas: value_of(&self.max_priority_fee_per_gas),
            max_fee_per_blob_gas: value_of(&self.max_fee_per_blob_gas),
            blob_versioned_hashes: self
                .blob_versioned_hashes
                .as_ref()
                .map(|hashes| hashes.iter().map(|w| w.0).collect()),
            expect_exception: exception,
        })
    }
}
