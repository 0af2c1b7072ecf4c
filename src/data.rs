use web3::types::{Address, H256, U256};

use crate::types::{GovernanceEvent, Stage};

/// A proposal as stored by the governance contract.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProposalRecord {
    pub proposer: Address,
    /// Locked deposit, 10^18 scaled.
    pub deposit: U256,
    /// Unix seconds. Set at proposal time and reset when dequeued.
    pub timestamp: u64,
    pub transaction_count: u64,
    pub description_url: String,
}

/// One call of a proposal, still ABI encoded.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    pub value: U256,
    pub destination: Address,
    pub data: Vec<u8>,
}

impl RawTransaction {
    /// Function selector, zeroes for a bare value transfer.
    pub fn selector(&self) -> [u8; 4] {
        let mut selector = [0u8; 4];
        if self.data.len() >= 4 {
            selector.copy_from_slice(&self.data[..4]);
        }
        selector
    }
}

/// A resolved label for an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressAnnotation {
    /// A core contract registered under `name`.
    Contract { name: String, address: String },
    /// A registered account with a display name.
    Account { name: String, address: String },
    /// Left as it was found.
    Raw(String),
}

/// Name of a decoded parameter. Unnamed ABI inputs fall back to their position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamName {
    Named(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    Integer(U256),
    Address(AddressAnnotation),
    /// Arrays and tuples, in encoding order.
    List(Vec<ParamValue>),
}

/// A decoded proposal transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Registry name of the target, or its address when unknown.
    pub contract: String,
    pub function: String,
    pub params: Vec<(ParamName, ParamValue)>,
    /// Attached value, 10^18 scaled.
    pub value: U256,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VoteTally {
    pub yes: U256,
    pub no: U256,
    pub abstain: U256,
}

impl VoteTally {
    pub fn total(&self) -> U256 {
        self.yes
            .saturating_add(self.no)
            .saturating_add(self.abstain)
    }
}

/// Seconds each dequeued stage lasts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StageDurations {
    pub approval: u64,
    pub referendum: u64,
    pub execution: u64,
}

/// Quorum settings used by the vote summary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParticipationParameters {
    /// Minimum participation, a fixed point fraction of locked stake.
    pub baseline: U256,
}

/// Stage boundaries in unix seconds.
///
/// Queued proposals only have `proposed` and `expires` (the queue expiry).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timeline {
    pub proposed: u64,
    /// Start of the referendum, the end of approval.
    pub referendum: Option<u64>,
    /// Start of the execution window, the end of the referendum.
    pub execution: Option<u64>,
    pub expires: u64,
}

/// Vote figures for a proposal in referendum or execution.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VoteSummary {
    pub tally: VoteTally,
    /// Total lockable stake, 10^18 scaled.
    pub total_locked: U256,
    /// Minimum participation fraction.
    pub baseline: U256,
    /// Yes fraction required by the proposal's calls.
    pub threshold: U256,
    /// Further Yes votes required, 10^18 scaled.
    pub yes_needed: U256,
}

/// Everything shown for a live proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalReport {
    pub id: U256,
    pub proposer_url: String,
    pub description_url: String,
    pub deposit: U256,
    pub stage: Stage,
    pub timeline: Timeline,
    pub approved: bool,
    pub passing: bool,
    pub votes: Option<VoteSummary>,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Executed,
    Expired,
}

/// What is left to say about a proposal past its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProposal {
    pub id: U256,
    pub proposer_url: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Live(ProposalReport),
    Resolved(ResolvedProposal),
}

/// A proposal in the voting stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DequeuedEntry {
    pub id: U256,
    /// Stage after the expiry override.
    pub stage: Option<Stage>,
    pub expired: bool,
}

/// A proposal waiting to be dequeued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedEntry {
    pub id: U256,
    pub upvotes: U256,
    pub expired: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ActiveProposals {
    pub dequeued: Vec<DequeuedEntry>,
    pub queued: Vec<QueuedEntry>,
}

/// A past execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedEntry {
    pub id: U256,
    pub block: u64,
    /// Explorer link to the executing transaction.
    pub transaction_url: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExecutionHistory {
    pub executed: Vec<ExecutedEntry>,
}

/// A governance event as read from the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernanceLog {
    pub event: GovernanceEvent,
    pub proposal_id: U256,
    /// Only carried by `ProposalQueued`.
    pub proposer: Option<Address>,
    pub block: u64,
    pub log_index: u64,
    pub transaction_hash: H256,
}
