//! Pre-state resolution
//!
//! Entries are resolved by bounded fixed-point iteration: every pass visits
//! the entries still pending, in document order, and materializes those
//! whose tag dependencies are already in the table. With `N` entries, an
//! acyclic document settles within `N` passes; anything left after that is
//! a dependency cycle.

use std::collections::BTreeSet;

use primitive_types::U256;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::account::AccountDeclaration;
use crate::alloc::{AccountProperties, Allocator};
use crate::code::CompilerTools;
use crate::error::{FillerError, FillerResult};
use crate::table::{Identity, TagTable};
use crate::tag::{AddressOrTag, Dependencies, Tag, TagKind};
use crate::types::OrderedMap;

/// `pre` section: accounts keyed by literal address or tag
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PreState(OrderedMap<AddressOrTag, AccountDeclaration>);

/// Whether a pending entry can be materialized in the current pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    /// Waits on a tag not resolved yet
    Blocked,
    /// Every dependency is available
    Ready,
    /// Contract tag whose only dependency is itself
    SelfReferencing,
}

impl PreState {
    /// Build from entries in order
    pub fn new(entries: Vec<(AddressOrTag, AccountDeclaration)>) -> Self {
        PreState(OrderedMap(entries))
    }

    /// Entries in document order
    pub fn entries(&self) -> &[(AddressOrTag, AccountDeclaration)] {
        &self.0 .0
    }

    /// Number of declared accounts
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is declared
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Names this section declares: tag names and literal addresses as hex
    fn declared_names(&self) -> BTreeSet<String> {
        self.entries()
            .iter()
            .map(|(key, _)| match key {
                AddressOrTag::Address(address) => address.to_hex(),
                AddressOrTag::Tag(tag) => tag.name().to_string(),
            })
            .collect()
    }

    /// Resolve every entry through `alloc` and return the tag table
    ///
    /// `external` lists tags used outside the pre-state (transaction,
    /// environment, expectations). Undeclared EOA-like tags, wherever they
    /// are referenced, become empty zero-funded EOAs; an undeclared contract
    /// tag is an error.
    pub fn resolve<A: Allocator + ?Sized>(
        &self,
        alloc: &mut A,
        external: &Dependencies,
        tools: &dyn CompilerTools,
    ) -> FillerResult<TagTable> {
        let declared = self.declared_names();
        let budget = self.len();
        let mut tags = TagTable::new();
        let mut pending: Vec<&(AddressOrTag, AccountDeclaration)> = self.entries().iter().collect();
        let mut passes = 0;

        while !pending.is_empty() && passes < budget {
            passes += 1;
            let mut blocked = Vec::new();
            for entry in pending {
                let (key, declaration) = entry;
                let deps = declaration.dependencies();
                match readiness(key, &deps, &declared, &tags)? {
                    Readiness::Blocked => blocked.push(entry),
                    Readiness::Ready => {
                        materialize_implicit(&deps, &declared, alloc, &mut tags)?;
                        materialize(key, declaration, alloc, &mut tags, tools)?;
                    }
                    Readiness::SelfReferencing => {
                        materialize_self_referencing(key, declaration, alloc, &mut tags, tools)?;
                    }
                }
            }
            trace!(pass = passes, blocked = blocked.len(), "Pre-state pass");
            pending = blocked;
        }

        if !pending.is_empty() {
            return Err(FillerError::CircularDependency {
                unresolved: pending.iter().map(|(key, _)| key.describe()).collect(),
                passes,
            });
        }

        for (name, kind) in external {
            if tags.contains(name) {
                continue;
            }
            if !kind.is_eoa() {
                return Err(FillerError::MissingContractDependency(name.clone()));
            }
            fund_empty_eoa(name, alloc, &mut tags)?;
        }

        debug!(accounts = budget, tags = tags.len(), passes, "Resolved pre-state");
        Ok(tags)
    }
}

fn readiness(
    key: &AddressOrTag,
    deps: &Dependencies,
    declared: &BTreeSet<String>,
    tags: &TagTable,
) -> FillerResult<Readiness> {
    if let AddressOrTag::Tag(tag) = key {
        if tag.kind() == TagKind::Contract && deps.len() == 1 && deps.contains_key(tag.name()) {
            return Ok(Readiness::SelfReferencing);
        }
    }

    for (name, kind) in deps {
        if tags.contains(name) {
            continue;
        }
        if declared.contains(name) {
            return Ok(Readiness::Blocked);
        }
        if !kind.is_eoa() {
            return Err(FillerError::MissingContractDependency(name.clone()));
        }
    }
    Ok(Readiness::Ready)
}

/// Fund the undeclared EOA-like dependencies of an entry about to resolve
fn materialize_implicit<A: Allocator + ?Sized>(
    deps: &Dependencies,
    declared: &BTreeSet<String>,
    alloc: &mut A,
    tags: &mut TagTable,
) -> FillerResult<()> {
    for (name, kind) in deps {
        if !tags.contains(name) && !declared.contains(name) && kind.is_eoa() {
            fund_empty_eoa(name, alloc, tags)?;
        }
    }
    Ok(())
}

fn fund_empty_eoa<A: Allocator + ?Sized>(
    name: &str,
    alloc: &mut A,
    tags: &mut TagTable,
) -> FillerResult<()> {
    let eoa = alloc.fund_eoa(U256::zero(), AccountProperties::default(), name)?;
    debug!(tag = name, address = %eoa.address, "Implicit empty EOA");
    tags.insert(name, Identity::Eoa(eoa))
}

fn materialize<A: Allocator + ?Sized>(
    key: &AddressOrTag,
    declaration: &AccountDeclaration,
    alloc: &mut A,
    tags: &mut TagTable,
    tools: &dyn CompilerTools,
) -> FillerResult<()> {
    let mut props = declaration.resolve(tags, tools)?;
    match key {
        AddressOrTag::Tag(tag) => materialize_tag(tag, props, alloc, tags),
        AddressOrTag::Address(address) => {
            let balance = props.balance.take().unwrap_or_default();
            alloc.fund_address(*address, balance)?;
            if let Some(account) = alloc.account_mut(address) {
                account.apply(props);
            }
            debug!(%address, "Literal pre-state account");
            tags.insert(address.to_hex(), Identity::Address(*address))
        }
    }
}

fn materialize_tag<A: Allocator + ?Sized>(
    tag: &Tag,
    mut props: AccountProperties,
    alloc: &mut A,
    tags: &mut TagTable,
) -> FillerResult<()> {
    match tag.kind() {
        TagKind::Contract => {
            let address = alloc.deploy_contract(props, tag.name())?;
            debug!(tag = tag.name(), %address, "Contract tag");
            tags.insert(tag.name(), Identity::Address(address))
        }
        TagKind::Eoa | TagKind::Coinbase => {
            let amount = props.balance.take().unwrap_or_default();
            let eoa = alloc.fund_eoa(amount, props, tag.name())?;
            debug!(tag = tag.name(), address = %eoa.address, "EOA tag");
            tags.insert(tag.name(), Identity::Eoa(eoa))
        }
    }
}

/// Deploy empty first so the code can embed its own address, then patch
fn materialize_self_referencing<A: Allocator + ?Sized>(
    key: &AddressOrTag,
    declaration: &AccountDeclaration,
    alloc: &mut A,
    tags: &mut TagTable,
    tools: &dyn CompilerTools,
) -> FillerResult<()> {
    let Some(tag) = key.as_tag() else {
        return materialize(key, declaration, alloc, tags, tools);
    };

    let address = alloc.deploy_contract(AccountProperties::default(), tag.name())?;
    tags.insert(tag.name(), Identity::Address(address))?;

    let props = declaration.resolve(tags, tools)?;
    if let Some(account) = alloc.account_mut(&address) {
        account.apply(props);
    }
    debug!(tag = tag.name(), %address, "Self-referencing contract tag");
    Ok(())
}
