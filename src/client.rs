use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::debug;
use web3::{
    contract::{tokens::Detokenize, tokens::Tokenize, Contract, Options},
    ethabi::{RawLog, Token},
    transports::Http,
    types::{Address, BlockId, BlockNumber, Bytes, FilterBuilder, Log, H256, U256},
    Web3,
};

use crate::{
    abi,
    data::{
        GovernanceLog, ParticipationParameters, ProposalRecord, RawTransaction, StageDurations,
        VoteTally,
    },
    types::{Config, GovernanceEvent, Stage},
};

/// Read access to the governance system of a chain.
#[async_trait]
pub trait GovernanceClient: Send + Sync {
    async fn proposal(&self, id: U256) -> Result<ProposalRecord>;
    async fn proposal_transaction(&self, id: U256, index: u64) -> Result<RawTransaction>;
    /// `None` when the contract holds no record for the id.
    async fn proposal_stage(&self, id: U256) -> Result<Option<Stage>>;
    async fn stage_durations(&self) -> Result<StageDurations>;
    /// Seconds a queued proposal may wait to be dequeued.
    async fn queue_expiry(&self) -> Result<u64>;
    async fn vote_totals(&self, id: U256) -> Result<VoteTally>;
    async fn is_approved(&self, id: U256) -> Result<bool>;
    async fn is_passing(&self, id: U256) -> Result<bool>;
    async fn participation(&self) -> Result<ParticipationParameters>;
    /// Yes fraction required to call `selector` on `destination`.
    async fn constitution(&self, destination: Address, selector: [u8; 4]) -> Result<U256>;
    /// Queued ids paired with their upvotes.
    async fn queue(&self) -> Result<Vec<(U256, U256)>>;
    /// Dequeued slots. Empty slots read as zero.
    async fn dequeue(&self) -> Result<Vec<U256>>;
    async fn is_queued_expired(&self, id: U256) -> Result<bool>;
    async fn is_dequeued_expired(&self, id: U256) -> Result<bool>;
    async fn total_locked(&self) -> Result<U256>;
    async fn is_account(&self, address: Address) -> Result<bool>;
    async fn account_name(&self, address: Address) -> Result<String>;
    /// Registry lookup. The zero address means unregistered.
    async fn registry_address(&self, name: &str) -> Result<Address>;
    /// Implementation behind a proxy, if `proxy` is one.
    async fn implementation(&self, proxy: Address) -> Result<Option<Address>>;
    async fn chain_id(&self) -> Result<u64>;
    /// Timestamp of the latest block, the chain's notion of now.
    async fn latest_timestamp(&self) -> Result<u64>;
    /// Governance events of one kind from `from_block` onwards, in emission order.
    async fn events(&self, event: GovernanceEvent, from_block: u64) -> Result<Vec<GovernanceLog>>;
}

/// `GovernanceClient` over JSON-RPC.
pub struct Web3Governance {
    web3: Web3<Http>,
    registry: Contract<Http>,
    governance: Contract<Http>,
    locked_gold: Contract<Http>,
    accounts: Contract<Http>,
}

impl Web3Governance {
    /// Connects to the node and binds the core contracts found in the registry.
    pub async fn connect(config: &Config) -> Result<Self> {
        let transport = Http::new(&config.rpc_url)?;
        let web3 = Web3::new(transport);
        let registry = Contract::from_json(web3.eth(), config.registry, abi::REGISTRY)?;
        let governance = bind(&web3, &registry, "Governance", abi::GOVERNANCE).await?;
        let locked_gold = bind(&web3, &registry, "LockedGold", abi::LOCKED_GOLD).await?;
        let accounts = bind(&web3, &registry, "Accounts", abi::ACCOUNTS).await?;
        Ok(Web3Governance {
            web3,
            registry,
            governance,
            locked_gold,
            accounts,
        })
    }
}

/// Resolves a core contract through the registry and binds it to an ABI.
async fn bind(
    web3: &Web3<Http>,
    registry: &Contract<Http>,
    name: &str,
    json: &[u8],
) -> Result<Contract<Http>> {
    let address: Address = call(registry, "getAddressForString", (name.to_owned(),)).await?;
    if address.is_zero() {
        return Err(anyhow!("{} is not in the registry", name));
    }
    debug!("Bound {} at {:?}", name, address);
    Ok(Contract::from_json(web3.eth(), address, json)?)
}

/// Calls a view function at the latest block.
async fn call<R: Detokenize, P: Tokenize>(
    contract: &Contract<Http>,
    function: &str,
    params: P,
) -> Result<R> {
    let result = contract
        .query(
            function,
            params,
            None::<Address>,
            Options::default(),
            None::<BlockId>,
        )
        .await
        .map_err(|e| anyhow!("{} call failed: {}", function, e))?;
    Ok(result)
}

fn block_of(log: &Log) -> u64 {
    log.block_number.map(|b| b.as_u64()).unwrap_or_default()
}

#[async_trait]
impl GovernanceClient for Web3Governance {
    async fn proposal(&self, id: U256) -> Result<ProposalRecord> {
        let (proposer, deposit, timestamp, transaction_count, description_url): (
            Address,
            U256,
            U256,
            U256,
            String,
        ) = call(&self.governance, "getProposal", (id,)).await?;
        Ok(ProposalRecord {
            proposer,
            deposit,
            timestamp: timestamp.low_u64(),
            transaction_count: transaction_count.low_u64(),
            description_url,
        })
    }
    async fn proposal_transaction(&self, id: U256, index: u64) -> Result<RawTransaction> {
        let (value, destination, data): (U256, Address, Bytes) = call(
            &self.governance,
            "getProposalTransaction",
            (id, U256::from(index)),
        )
        .await?;
        Ok(RawTransaction {
            value,
            destination,
            data: data.0,
        })
    }
    async fn proposal_stage(&self, id: U256) -> Result<Option<Stage>> {
        let raw: U256 = call(&self.governance, "getProposalStage", (id,)).await?;
        Stage::from_raw(raw)
    }
    async fn stage_durations(&self) -> Result<StageDurations> {
        let (approval, referendum, execution): (U256, U256, U256) =
            call(&self.governance, "stageDurations", ()).await?;
        Ok(StageDurations {
            approval: approval.low_u64(),
            referendum: referendum.low_u64(),
            execution: execution.low_u64(),
        })
    }
    async fn queue_expiry(&self) -> Result<u64> {
        let expiry: U256 = call(&self.governance, "queueExpiry", ()).await?;
        Ok(expiry.low_u64())
    }
    async fn vote_totals(&self, id: U256) -> Result<VoteTally> {
        let (yes, no, abstain): (U256, U256, U256) =
            call(&self.governance, "getVoteTotals", (id,)).await?;
        Ok(VoteTally { yes, no, abstain })
    }
    async fn is_approved(&self, id: U256) -> Result<bool> {
        call(&self.governance, "isApproved", (id,)).await
    }
    async fn is_passing(&self, id: U256) -> Result<bool> {
        call(&self.governance, "isProposalPassing", (id,)).await
    }
    async fn participation(&self) -> Result<ParticipationParameters> {
        // Only the current baseline feeds the vote summary.
        let (baseline, _floor, _update_factor, _quorum_factor): (U256, U256, U256, U256) =
            call(&self.governance, "getParticipationParameters", ()).await?;
        Ok(ParticipationParameters { baseline })
    }
    async fn constitution(&self, destination: Address, selector: [u8; 4]) -> Result<U256> {
        call(
            &self.governance,
            "getConstitution",
            (Token::Address(destination), Token::FixedBytes(selector.to_vec())),
        )
        .await
    }
    async fn queue(&self) -> Result<Vec<(U256, U256)>> {
        let (ids, upvotes): (Vec<U256>, Vec<U256>) =
            call(&self.governance, "getQueue", ()).await?;
        if ids.len() != upvotes.len() {
            return Err(anyhow!(
                "Queue has {} ids but {} upvote entries",
                ids.len(),
                upvotes.len()
            ));
        }
        Ok(ids.into_iter().zip(upvotes).collect())
    }
    async fn dequeue(&self) -> Result<Vec<U256>> {
        call(&self.governance, "getDequeue", ()).await
    }
    async fn is_queued_expired(&self, id: U256) -> Result<bool> {
        call(&self.governance, "isQueuedProposalExpired", (id,)).await
    }
    async fn is_dequeued_expired(&self, id: U256) -> Result<bool> {
        call(&self.governance, "isDequeuedProposalExpired", (id,)).await
    }
    async fn total_locked(&self) -> Result<U256> {
        call(&self.locked_gold, "getTotalLockedGold", ()).await
    }
    async fn is_account(&self, address: Address) -> Result<bool> {
        call(&self.accounts, "isAccount", (address,)).await
    }
    async fn account_name(&self, address: Address) -> Result<String> {
        call(&self.accounts, "getName", (address,)).await
    }
    async fn registry_address(&self, name: &str) -> Result<Address> {
        call(&self.registry, "getAddressForString", (name.to_owned(),)).await
    }
    async fn implementation(&self, proxy: Address) -> Result<Option<Address>> {
        let contract = Contract::from_json(self.web3.eth(), proxy, abi::PROXY)?;
        // Plain contracts revert or return garbage here.
        match call::<Address, _>(&contract, "_getImplementation", ()).await {
            Ok(a) if !a.is_zero() => Ok(Some(a)),
            Ok(_) => Ok(None),
            Err(e) => {
                debug!("No implementation behind {:?} ({})", proxy, e);
                Ok(None)
            }
        }
    }
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.web3.eth().chain_id().await?.low_u64())
    }
    async fn latest_timestamp(&self) -> Result<u64> {
        let block = self
            .web3
            .eth()
            .block(BlockId::Number(BlockNumber::Latest))
            .await?
            .ok_or_else(|| anyhow!("Node returned no latest block."))?;
        Ok(block.timestamp.low_u64())
    }
    async fn events(&self, event: GovernanceEvent, from_block: u64) -> Result<Vec<GovernanceLog>> {
        let abi_event = self.governance.abi().event(event.name())?;
        let filter = FilterBuilder::default()
            .address(vec![self.governance.address()])
            .topics(Some(vec![abi_event.signature()]), None, None, None)
            .from_block(BlockNumber::Number(from_block.into()))
            .to_block(BlockNumber::Latest)
            .build();
        // eth_getLogs
        let logs = self.web3.eth().logs(filter).await?;
        debug!("{} {} logs from block {}", logs.len(), event.name(), from_block);

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            let parsed = abi_event.parse_log(RawLog {
                topics: log.topics.clone(),
                data: log.data.0.clone(),
            })?;
            let mut proposal_id = None;
            let mut proposer = None;
            for param in parsed.params {
                match (param.name.as_str(), param.value) {
                    ("proposalId", Token::Uint(id)) => proposal_id = Some(id),
                    ("proposer", Token::Address(a)) => proposer = Some(a),
                    _ => {}
                }
            }
            let proposal_id = proposal_id
                .ok_or_else(|| anyhow!("{} log without a proposal id", event.name()))?;
            events.push(GovernanceLog {
                event,
                proposal_id,
                proposer,
                block: block_of(&log),
                log_index: log.log_index.map(|i| i.low_u64()).unwrap_or_default(),
                transaction_hash: log.transaction_hash.unwrap_or_else(H256::zero),
            });
        }
        Ok(events)
    }
}

#[cfg(test)]
pub mod mock {
    //! In-memory chain for tests.
    use std::{
        collections::{HashMap, HashSet},
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use super::*;

    /// Counts calls in progress and remembers the most seen at once.
    #[derive(Debug, Default, Clone)]
    pub struct InFlight {
        current: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl InFlight {
        pub fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
        async fn around(&self, delay_ms: Option<u64>) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some(ms) = delay_ms {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[derive(Debug, Default, Clone)]
    pub struct MockGovernance {
        pub proposals: HashMap<U256, ProposalRecord>,
        pub transactions: HashMap<U256, Vec<RawTransaction>>,
        pub stages: HashMap<U256, Stage>,
        pub durations: StageDurations,
        pub queue_expiry: u64,
        pub votes: HashMap<U256, VoteTally>,
        pub approved: HashSet<U256>,
        pub passing: HashSet<U256>,
        pub participation: ParticipationParameters,
        pub constitutions: HashMap<[u8; 4], U256>,
        pub default_constitution: U256,
        pub queue: Vec<(U256, U256)>,
        pub dequeue: Vec<U256>,
        /// Ids the contract's expiry predicates report as expired.
        pub expired: HashSet<U256>,
        pub total_locked: U256,
        pub accounts: HashMap<Address, String>,
        pub registry: HashMap<String, Address>,
        pub logs: Vec<GovernanceLog>,
        pub now: u64,
        /// Milliseconds `proposal_transaction` takes, by transaction index.
        pub transaction_delays: HashMap<u64, u64>,
        /// Milliseconds `is_account` takes, by address.
        pub account_delays: HashMap<Address, u64>,
        pub in_flight: InFlight,
    }

    #[async_trait]
    impl GovernanceClient for MockGovernance {
        async fn proposal(&self, id: U256) -> Result<ProposalRecord> {
            Ok(self.proposals.get(&id).cloned().unwrap_or_default())
        }
        async fn proposal_transaction(&self, id: U256, index: u64) -> Result<RawTransaction> {
            self.in_flight
                .around(self.transaction_delays.get(&index).copied())
                .await;
            self.transactions
                .get(&id)
                .and_then(|txs| txs.get(index as usize))
                .cloned()
                .ok_or_else(|| anyhow!("execution reverted"))
        }
        async fn proposal_stage(&self, id: U256) -> Result<Option<Stage>> {
            Ok(self.stages.get(&id).copied())
        }
        async fn stage_durations(&self) -> Result<StageDurations> {
            Ok(self.durations)
        }
        async fn queue_expiry(&self) -> Result<u64> {
            Ok(self.queue_expiry)
        }
        async fn vote_totals(&self, id: U256) -> Result<VoteTally> {
            Ok(self.votes.get(&id).copied().unwrap_or_default())
        }
        async fn is_approved(&self, id: U256) -> Result<bool> {
            Ok(self.approved.contains(&id))
        }
        async fn is_passing(&self, id: U256) -> Result<bool> {
            Ok(self.passing.contains(&id))
        }
        async fn participation(&self) -> Result<ParticipationParameters> {
            Ok(self.participation)
        }
        async fn constitution(&self, _destination: Address, selector: [u8; 4]) -> Result<U256> {
            Ok(self
                .constitutions
                .get(&selector)
                .copied()
                .unwrap_or(self.default_constitution))
        }
        async fn queue(&self) -> Result<Vec<(U256, U256)>> {
            Ok(self.queue.clone())
        }
        async fn dequeue(&self) -> Result<Vec<U256>> {
            Ok(self.dequeue.clone())
        }
        async fn is_queued_expired(&self, id: U256) -> Result<bool> {
            Ok(self.expired.contains(&id))
        }
        async fn is_dequeued_expired(&self, id: U256) -> Result<bool> {
            Ok(self.expired.contains(&id))
        }
        async fn total_locked(&self) -> Result<U256> {
            Ok(self.total_locked)
        }
        async fn is_account(&self, address: Address) -> Result<bool> {
            self.in_flight
                .around(self.account_delays.get(&address).copied())
                .await;
            Ok(self.accounts.contains_key(&address))
        }
        async fn account_name(&self, address: Address) -> Result<String> {
            Ok(self.accounts.get(&address).cloned().unwrap_or_default())
        }
        async fn registry_address(&self, name: &str) -> Result<Address> {
            Ok(self.registry.get(name).copied().unwrap_or_else(Address::zero))
        }
        async fn implementation(&self, _proxy: Address) -> Result<Option<Address>> {
            Ok(None)
        }
        async fn chain_id(&self) -> Result<u64> {
            Ok(42220)
        }
        async fn latest_timestamp(&self) -> Result<u64> {
            Ok(self.now)
        }
        async fn events(
            &self,
            event: GovernanceEvent,
            from_block: u64,
        ) -> Result<Vec<GovernanceLog>> {
            Ok(self
                .logs
                .iter()
                .filter(|l| l.event == event && l.block >= from_block)
                .cloned()
                .collect())
        }
    }
}
