//! Pre-state allocation
//!
//! [`Allocator`] is the collaborator the pre-state resolver materializes
//! accounts through. [`Alloc`] is the in-memory implementation: contracts
//! get sequential addresses, EOAs get sequential secret keys.

use std::collections::BTreeMap;

use primitive_types::U256;
use serde::{Serialize, Serializer};
use tagfill_crypto::secret_key_to_address;
use tagfill_primitives::{Address, H256};
use tracing::debug;

use crate::error::FillerResult;
use crate::table::Eoa;

/// Concrete account state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Account {
    /// Balance in wei
    pub balance: U256,
    /// Nonce
    pub nonce: U256,
    /// Runtime code
    #[serde(serialize_with = "serialize_code")]
    pub code: Vec<u8>,
    /// Storage slots
    pub storage: BTreeMap<U256, U256>,
}

fn serialize_code<S: Serializer>(code: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("0x{}", hex::encode(code)))
}

impl Account {
    /// Account with nothing set
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the account is empty (no balance, nonce or code)
    pub fn is_empty(&self) -> bool {
        self.balance.is_zero() && self.nonce.is_zero() && self.code.is_empty()
    }

    /// Whether the account has code
    pub fn has_code(&self) -> bool {
        !self.code.is_empty()
    }

    /// Overwrite every field present in `props`
    pub fn apply(&mut self, props: AccountProperties) {
        if let Some(balance) = props.balance {
            self.balance = balance;
        }
        if let Some(nonce) = props.nonce {
            self.nonce = nonce;
        }
        if let Some(code) = props.code {
            self.code = code;
        }
        if let Some(storage) = props.storage {
            self.storage = storage;
        }
    }
}

/// Resolved account fields, each optional
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountProperties {
    /// Balance (initial funding for EOAs)
    pub balance: Option<U256>,
    /// Nonce
    pub nonce: Option<U256>,
    /// Compiled code, only set when non-empty
    pub code: Option<Vec<u8>>,
    /// Storage, only set when non-empty
    pub storage: Option<BTreeMap<U256, U256>>,
}

impl AccountProperties {
    /// Whether no field is set
    pub fn is_empty(&self) -> bool {
        self.balance.is_none() && self.nonce.is_none() && self.code.is_none() && self.storage.is_none()
    }
}

/// Creates the accounts of a pre-state
pub trait Allocator {
    /// Deploy a contract at a fresh address
    fn deploy_contract(&mut self, props: AccountProperties, label: &str) -> FillerResult<Address>;

    /// Create an EOA with a fresh key, funded with `amount`
    fn fund_eoa(&mut self, amount: U256, props: AccountProperties, label: &str) -> FillerResult<Eoa>;

    /// Set the balance of a known address, creating the account if needed
    fn fund_address(&mut self, address: Address, amount: U256) -> FillerResult<()>;

    /// Mutable access to an existing account
    fn account_mut(&mut self, address: &Address) -> Option<&mut Account>;
}

/// Address and key sequence configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocConfig {
    /// First contract address
    pub contract_start: U256,
    /// Distance between consecutive contract addresses
    pub contract_step: U256,
    /// First EOA secret key
    pub first_key: U256,
    /// Nonce of deployed contracts when none is declared
    pub contract_nonce: U256,
}

impl Default for AllocConfig {
    fn default() -> Self {
        Self {
            contract_start: U256::from(0x1000),
            contract_step: U256::from(0x100),
            first_key: U256::one(),
            contract_nonce: U256::one(),
        }
    }
}

/// In-memory allocator
///
/// Deterministic: the same sequence of calls always yields the same
/// addresses and keys.
#[derive(Debug, Clone, Serialize)]
pub struct Alloc {
    #[serde(flatten)]
    accounts: BTreeMap<Address, Account>,
    #[serde(skip)]
    labels: BTreeMap<Address, String>,
    #[serde(skip)]
    config: AllocConfig,
    #[serde(skip)]
    next_contract: U256,
    #[serde(skip)]
    next_key: U256,
}

impl Alloc {
    /// Create an allocator with the default sequences
    pub fn new() -> Self {
        Self::with_config(AllocConfig::default())
    }

    /// Create an allocator with custom sequences
    pub fn with_config(config: AllocConfig) -> Self {
        Self {
            accounts: BTreeMap::new(),
            labels: BTreeMap::new(),
            next_contract: config.contract_start,
            next_key: config.first_key,
            config,
        }
    }

    /// All allocated accounts
    pub fn accounts(&self) -> &BTreeMap<Address, Account> {
        &self.accounts
    }

    /// Consume into the account map
    pub fn into_accounts(self) -> BTreeMap<Address, Account> {
        self.accounts
    }

    /// Account at an address
    pub fn get(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Label an address was allocated under
    pub fn label(&self, address: &Address) -> Option<&str> {
        self.labels.get(address).map(String::as_str)
    }

    fn next_contract_address(&mut self) -> FillerResult<Address> {
        loop {
            let address = Address::from_u256(self.next_contract)?;
            self.next_contract = self.next_contract.overflowing_add(self.config.contract_step).0;
            if !self.accounts.contains_key(&address) {
                return Ok(address);
            }
        }
    }

    fn next_eoa(&mut self) -> FillerResult<Eoa> {
        loop {
            let key = H256::from_u256(self.next_key);
            self.next_key = self.next_key.overflowing_add(U256::one()).0;
            let address = secret_key_to_address(&key)?;
            if !self.accounts.contains_key(&address) {
                return Ok(Eoa { address, key });
            }
        }
    }
}

impl Default for Alloc {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for Alloc {
    fn deploy_contract(&mut self, props: AccountProperties, label: &str) -> FillerResult<Address> {
        let address = self.next_contract_address()?;
        let mut account = Account {
            nonce: self.config.contract_nonce,
            ..Account::default()
        };
        account.apply(props);
        debug!(%address, label, code_len = account.code.len(), "Deployed contract");

        self.accounts.insert(address, account);
        self.labels.insert(address, label.to_string());
        Ok(address)
    }

    fn fund_eoa(&mut self, amount: U256, props: AccountProperties, label: &str) -> FillerResult<Eoa> {
        let eoa = self.next_eoa()?;
        let mut account = Account {
            balance: amount,
            ..Account::default()
        };
        account.apply(props);
        debug!(address = %eoa.address, label, %amount, "Funded EOA");

        // An empty EOA only exists as a key; it is not part of the pre-state.
        if !account.is_empty() || !account.storage.is_empty() {
            self.accounts.insert(eoa.address, account);
        }
        self.labels.insert(eoa.address, label.to_string());
        Ok(eoa)
    }

    fn fund_address(&mut self, address: Address, amount: U256) -> FillerResult<()> {
        self.accounts.entry(address).or_default().balance = amount;
        Ok(())
    }

    fn account_mut(&mut self, address: &Address) -> Option<&mut Account> {
        self.accounts.get_mut(address)
    }
}
