//! Labels addresses found in decoded call arguments.
use std::collections::HashMap;

use anyhow::Result;
use futures::{stream, StreamExt, TryStreamExt};
use log::debug;
use web3::types::Address;

use crate::{
    client::GovernanceClient,
    data::AddressAnnotation,
    parsing::{as_checksummed, parse_address},
    types::MAX_IN_FLIGHT,
};

/// Registry identifiers of the core contracts proposals usually target.
pub const CORE_CONTRACTS: &[&str] = &[
    "Accounts",
    "Attestations",
    "BlockchainParameters",
    "DoubleSigningSlasher",
    "DowntimeSlasher",
    "Election",
    "EpochRewards",
    "Escrow",
    "Exchange",
    "ExchangeBRL",
    "ExchangeEUR",
    "FeeCurrencyWhitelist",
    "Freezer",
    "GasPriceMinimum",
    "GoldToken",
    "Governance",
    "GovernanceSlasher",
    "LockedGold",
    "Random",
    "Registry",
    "Reserve",
    "SortedOracles",
    "StableToken",
    "StableTokenBRL",
    "StableTokenEUR",
    "Validators",
];

/// Core contract addresses and their registry names.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct KnownContracts {
    names: HashMap<Address, String>,
}

impl KnownContracts {
    /// Resolves every core contract through the registry. Unregistered names are skipped.
    pub async fn fetch(client: &dyn GovernanceClient) -> Result<Self> {
        let found: Vec<(&str, Address)> = stream::iter(CORE_CONTRACTS.iter().copied())
            .map(|name| async move {
                let address = client.registry_address(name).await?;
                Ok::<_, anyhow::Error>((name, address))
            })
            .buffered(MAX_IN_FLIGHT)
            .try_collect()
            .await?;
        let mut known = KnownContracts::default();
        for (name, address) in found {
            if address.is_zero() {
                debug!("{} is not registered", name);
                continue;
            }
            known.insert(address, name);
        }
        Ok(known)
    }
    pub fn insert(&mut self, address: Address, name: &str) {
        self.names.insert(address, name.to_owned());
    }
    pub fn name_of(&self, address: &Address) -> Option<&str> {
        self.names.get(address).map(String::as_str)
    }
}

/// Resolves addresses to contract or account names.
pub struct Annotator<'a> {
    known: &'a KnownContracts,
    client: &'a dyn GovernanceClient,
}

impl<'a> Annotator<'a> {
    pub fn new(known: &'a KnownContracts, client: &'a dyn GovernanceClient) -> Self {
        Annotator { known, client }
    }
    /// Annotates a string token. Anything not shaped like a raw address comes back unchanged.
    pub async fn annotate(&self, token: &str) -> Result<AddressAnnotation> {
        match parse_address(token) {
            Some(address) => self.annotate_address(address).await,
            None => Ok(AddressAnnotation::Raw(token.to_owned())),
        }
    }
    /// Known contracts first, then the accounts registry.
    async fn annotate_address(&self, address: Address) -> Result<AddressAnnotation> {
        let checksummed = as_checksummed(&address);
        if let Some(name) = self.known.name_of(&address) {
            return Ok(AddressAnnotation::Contract {
                name: name.to_owned(),
                address: checksummed,
            });
        }
        if self.client.is_account(address).await? {
            let name = self.client.account_name(address).await?;
            return Ok(AddressAnnotation::Account {
                name,
                address: checksummed,
            });
        }
        Ok(AddressAnnotation::Raw(checksummed))
    }
}
