//! Contract ABIs shipped with the binary.
use std::collections::HashMap;

use anyhow::Result;
use web3::ethabi::{Contract, Function};

use crate::annotate::CORE_CONTRACTS;

pub const GOVERNANCE: &[u8] = include_bytes!("../abi/Governance.json");
pub const REGISTRY: &[u8] = include_bytes!("../abi/Registry.json");
pub const LOCKED_GOLD: &[u8] = include_bytes!("../abi/LockedGold.json");
pub const ACCOUNTS: &[u8] = include_bytes!("../abi/Accounts.json");
pub const PROXY: &[u8] = include_bytes!("../abi/Proxy.json");
pub const GOLD_TOKEN: &[u8] = include_bytes!("../abi/GoldToken.json");
pub const STABLE_TOKEN: &[u8] = include_bytes!("../abi/StableToken.json");
pub const ELECTION: &[u8] = include_bytes!("../abi/Election.json");
pub const VALIDATORS: &[u8] = include_bytes!("../abi/Validators.json");
pub const RESERVE: &[u8] = include_bytes!("../abi/Reserve.json");
pub const SORTED_ORACLES: &[u8] = include_bytes!("../abi/SortedOracles.json");
pub const EPOCH_REWARDS: &[u8] = include_bytes!("../abi/EpochRewards.json");
pub const EXCHANGE: &[u8] = include_bytes!("../abi/Exchange.json");
pub const BLOCKCHAIN_PARAMETERS: &[u8] = include_bytes!("../abi/BlockchainParameters.json");
pub const GAS_PRICE_MINIMUM: &[u8] = include_bytes!("../abi/GasPriceMinimum.json");
pub const FEE_CURRENCY_WHITELIST: &[u8] = include_bytes!("../abi/FeeCurrencyWhitelist.json");
pub const ATTESTATIONS: &[u8] = include_bytes!("../abi/Attestations.json");
pub const RANDOM: &[u8] = include_bytes!("../abi/Random.json");
pub const ESCROW: &[u8] = include_bytes!("../abi/Escrow.json");
pub const FREEZER: &[u8] = include_bytes!("../abi/Freezer.json");
pub const DOUBLE_SIGNING_SLASHER: &[u8] = include_bytes!("../abi/DoubleSigningSlasher.json");
pub const DOWNTIME_SLASHER: &[u8] = include_bytes!("../abi/DowntimeSlasher.json");
pub const GOVERNANCE_SLASHER: &[u8] = include_bytes!("../abi/GovernanceSlasher.json");

/// Embedded ABI for a core contract registry identifier.
///
/// Currency variants share the ABI of the base contract.
pub fn embedded(name: &str) -> Option<&'static [u8]> {
    let abi = match name {
        "Accounts" => ACCOUNTS,
        "Attestations" => ATTESTATIONS,
        "BlockchainParameters" => BLOCKCHAIN_PARAMETERS,
        "DoubleSigningSlasher" => DOUBLE_SIGNING_SLASHER,
        "DowntimeSlasher" => DOWNTIME_SLASHER,
        "Election" => ELECTION,
        "EpochRewards" => EPOCH_REWARDS,
        "Escrow" => ESCROW,
        "Exchange" | "ExchangeEUR" | "ExchangeBRL" => EXCHANGE,
        "FeeCurrencyWhitelist" => FEE_CURRENCY_WHITELIST,
        "Freezer" => FREEZER,
        "GasPriceMinimum" => GAS_PRICE_MINIMUM,
        "GoldToken" => GOLD_TOKEN,
        "Governance" => GOVERNANCE,
        "GovernanceSlasher" => GOVERNANCE_SLASHER,
        "LockedGold" => LOCKED_GOLD,
        "Random" => RANDOM,
        "Registry" => REGISTRY,
        "Reserve" => RESERVE,
        "SortedOracles" => SORTED_ORACLES,
        "StableToken" | "StableTokenEUR" | "StableTokenBRL" => STABLE_TOKEN,
        "Validators" => VALIDATORS,
        _ => return None,
    };
    Some(abi)
}

/// Finds the function a 4 byte selector dispatches to.
pub fn function_by_selector(abi: &Contract, selector: [u8; 4]) -> Option<&Function> {
    abi.functions().find(|f| f.short_signature() == selector)
}

/// ABIs available for decoding, keyed by registry name.
#[derive(Debug, Clone)]
pub struct AbiTable {
    by_name: HashMap<String, Contract>,
    proxy: Contract,
}

impl AbiTable {
    /// Loads the embedded ABI of every core contract.
    pub fn embedded() -> Result<Self> {
        let mut by_name = HashMap::new();
        for name in CORE_CONTRACTS {
            if let Some(json) = embedded(name) {
                by_name.insert((*name).to_owned(), Contract::load(json)?);
            }
        }
        Ok(AbiTable {
            by_name,
            proxy: Contract::load(PROXY)?,
        })
    }
    pub fn get(&self, name: &str) -> Option<&Contract> {
        self.by_name.get(name)
    }
    /// Functions every upgradeable core contract exposes through its proxy.
    pub fn proxy(&self) -> &Contract {
        &self.proxy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_abis_load() {
        let table = AbiTable::embedded().unwrap();
        let governance = table.get("Governance").unwrap();
        assert!(governance.event("ProposalExecuted").is_ok());
        assert!(table.get("Unknown").is_none());

        let set_impl = table.proxy().function("_setImplementation").unwrap();
        let found = function_by_selector(table.proxy(), set_impl.short_signature()).unwrap();
        assert_eq!(found.name, "_setImplementation");
    }

    #[test]
    fn every_core_contract_has_an_abi() {
        let table = AbiTable::embedded().unwrap();
        for name in CORE_CONTRACTS {
            assert!(table.get(name).is_some(), "{} has no embedded ABI", name);
        }
    }

    #[test]
    fn common_proposal_targets_resolve() {
        let table = AbiTable::embedded().unwrap();
        // Selectors of calls found in past governance proposals.
        let cases = [
            ("SortedOracles", "ebc1d6bb", "setReportExpiry"),
            ("EpochRewards", "5918bb58", "setTargetVotingYieldParameters"),
            ("StableTokenEUR", "222836ad", "setInflationParameters"),
            ("Governance", "5c759394", "setBaselineUpdateFactor"),
            ("GoldToken", "a9059cbb", "transfer"),
        ];
        for (contract, selector, function) in cases {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&hex::decode(selector).unwrap());
            let found = function_by_selector(table.get(contract).unwrap(), bytes).unwrap();
            assert_eq!(found.name, function);
        }
    }
}
