use std::{fmt::Display, str::FromStr};

use anyhow::{anyhow, Result};
use web3::types::{Address, U256};

/// Celo mainnet public RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "https://forno.celo.org";
/// Block explorer used to build address and transaction links.
pub const DEFAULT_EXPLORER_URL: &str = "https://explorer.celo.org/mainnet";
/// Fixed address of the core contract registry.
pub const REGISTRY_ADDRESS: &str = "0x000000000000000000000000000000000000ce10";

/// Upper bound on simultaneous in-flight node calls during a fan-out.
pub const MAX_IN_FLIGHT: usize = 4;

/// Selected mode of operation. APIs are used as temporary stop-gaps.
///
/// Available APIs: Sourcify.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    #[default]
    AvoidApis,
    UseApis,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// RPC URL of the node.
    pub rpc_url: String,
    /// Explorer base URL, without a trailing slash.
    pub explorer_url: String,
    /// Address of the core contract registry.
    pub registry: Address,
    /// Whether external ABI sources may be consulted.
    pub mode: Mode,
}

impl Config {
    pub fn new(rpc_url: &str, explorer_url: &str, registry: &str, mode: Mode) -> Result<Self> {
        Ok(Config {
            rpc_url: rpc_url.to_owned(),
            explorer_url: explorer_url.trim_end_matches('/').to_owned(),
            registry: Address::from_str(registry.trim_start_matches("0x"))
                .map_err(|e| anyhow!("Invalid registry address {}: {}", registry, e))?,
            mode,
        })
    }
    /// Link to an address page on the explorer.
    pub fn address_url(&self, address: &str) -> String {
        format!("{}/address/{}", self.explorer_url, address)
    }
    /// Link to a transaction page on the explorer.
    pub fn tx_url(&self, hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url, hash)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rpc_url: DEFAULT_RPC_URL.to_owned(),
            explorer_url: DEFAULT_EXPLORER_URL.to_owned(),
            registry: Address::from_low_u64_be(0xce10),
            mode: Mode::default(),
        }
    }
}

/// A resource may have been looked up before. This stores the result of that attempt.
#[derive(Debug, Default, Clone, PartialEq)]
pub enum VisitNote {
    #[default]
    NotVisited,
    PriorSuccess,
    PriorFailure,
}

/// Lifecycle phase of a proposal as reported by the governance contract.
///
/// The contract encodes these as 1 to 5. Zero means there is no live record
/// (never proposed, or executed and deleted) and is represented as `None`
/// by [`Stage::from_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Queued,
    Approval,
    Referendum,
    Execution,
    Expiration,
}

impl Stage {
    pub fn from_raw(value: U256) -> Result<Option<Self>> {
        if value > U256::from(5u8) {
            return Err(anyhow!("Unknown proposal stage {}", value));
        }
        let stage = match value.low_u64() {
            0 => None,
            1 => Some(Stage::Queued),
            2 => Some(Stage::Approval),
            3 => Some(Stage::Referendum),
            4 => Some(Stage::Execution),
            _ => Some(Stage::Expiration),
        };
        Ok(stage)
    }
    /// Voting figures are only meaningful once the referendum has opened.
    pub fn has_votes(&self) -> bool {
        matches!(self, Stage::Referendum | Stage::Execution)
    }
    pub fn is_dequeued(&self) -> bool {
        !matches!(self, Stage::Queued)
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Queued => "Queued",
            Stage::Approval => "Approval",
            Stage::Referendum => "Referendum",
            Stage::Execution => "Execution",
            Stage::Expiration => "Expiration",
        };
        write!(f, "{}", name)
    }
}

/// Governance events the viewer reads from the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernanceEvent {
    ProposalQueued,
    ProposalExecuted,
}

impl GovernanceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GovernanceEvent::ProposalQueued => "ProposalQueued",
            GovernanceEvent::ProposalExecuted => "ProposalExecuted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_from_raw() {
        assert_eq!(Stage::from_raw(U256::zero()).unwrap(), None);
        assert_eq!(Stage::from_raw(U256::from(3)).unwrap(), Some(Stage::Referendum));
        assert_eq!(Stage::from_raw(U256::from(5)).unwrap(), Some(Stage::Expiration));
        assert!(Stage::from_raw(U256::from(6)).is_err());
    }

    #[test]
    fn config_links() {
        let config = Config::new(
            DEFAULT_RPC_URL,
            "https://explorer.example/",
            REGISTRY_ADDRESS,
            Mode::AvoidApis,
        )
        .unwrap();
        assert_eq!(config.registry, Address::from_low_u64_be(0xce10));
        assert_eq!(
            config.tx_url("0xabc"),
            "https://explorer.example/tx/0xabc"
        );
    }
}
