//! Assembles the report for a single proposal.
use std::cmp::max;

use anyhow::Result;
use futures::{stream, StreamExt, TryStreamExt};
use log::{debug, info};
use web3::types::U256;

use crate::{
    abi::AbiTable,
    annotate::KnownContracts,
    cache::Cache,
    client::GovernanceClient,
    data::{
        ProposalReport, RawTransaction, Report, StageDurations, Timeline, VoteSummary, VoteTally,
    },
    decode::{prefetch_abis, Decoder},
    error::ReportError,
    parsing::{apply_fraction, as_checksummed},
    types::{Config, Stage, MAX_IN_FLIGHT},
};

/// Reads governance state and turns it into reports.
pub struct Aggregator {
    pub(crate) client: Box<dyn GovernanceClient>,
    pub(crate) config: Config,
    abis: AbiTable,
    cache: Cache,
}

impl Aggregator {
    pub fn new(client: Box<dyn GovernanceClient>, config: Config) -> Result<Self> {
        Ok(Aggregator {
            client,
            config,
            abis: AbiTable::embedded()?,
            cache: Cache::default(),
        })
    }

    /// Full report for a live proposal, or its outcome once it is past expiration.
    pub async fn report(&mut self, id: U256) -> Result<Report> {
        let client = self.client.as_ref();
        let stage = match client.proposal_stage(id).await? {
            Some(Stage::Expiration) | None => {
                debug!("Proposal {} has no live record", id);
                return Ok(Report::Resolved(self.resolve(id).await?));
            }
            Some(stage) => stage,
        };

        let record = client.proposal(id).await?;
        let durations = client.stage_durations().await?;
        let queue_expiry = client.queue_expiry().await?;
        let timeline = timeline(stage, record.timestamp, &durations, queue_expiry);

        // The stage field lags behind expiry, so it is checked independently.
        let now = client.latest_timestamp().await?;
        if contract_says_expired(client, id, stage).await? || now >= timeline.expires {
            info!("Proposal {} reports stage {} but has expired", id, stage);
            return Ok(Report::Resolved(self.resolve(id).await?));
        }

        let raw = fetch_transactions(client, id, record.transaction_count).await?;
        let known = KnownContracts::fetch(client).await?;
        prefetch_abis(
            &raw,
            &self.abis,
            &known,
            &mut self.cache,
            &self.config.mode,
            client,
        )
        .await;
        let transactions = Decoder::new(&self.abis, &self.cache, &known, client)
            .decode_all(&raw)
            .await?;
        if transactions.len() as u64 != record.transaction_count {
            return Err(ReportError::TransactionCount {
                id,
                expected: record.transaction_count,
                decoded: transactions.len(),
            }
            .into());
        }

        let approved = client.is_approved(id).await?;
        // Nothing can pass before the referendum opens.
        let passing = stage.has_votes() && client.is_passing(id).await?;
        let votes = if stage.has_votes() {
            Some(vote_summary(client, id, &raw).await?)
        } else {
            None
        };

        Ok(Report::Live(ProposalReport {
            id,
            proposer_url: self.config.address_url(&as_checksummed(&record.proposer)),
            description_url: record.description_url,
            deposit: record.deposit,
            stage,
            timeline,
            approved,
            passing,
            votes,
            transactions,
        }))
    }
}

/// Stage boundaries counted forward from the proposal timestamp.
///
/// Additions saturate, so boundaries never decrease.
pub fn timeline(
    stage: Stage,
    proposed: u64,
    durations: &StageDurations,
    queue_expiry: u64,
) -> Timeline {
    if !stage.is_dequeued() {
        return Timeline {
            proposed,
            referendum: None,
            execution: None,
            expires: proposed.saturating_add(queue_expiry),
        };
    }
    let referendum = proposed.saturating_add(durations.approval);
    let execution = referendum.saturating_add(durations.referendum);
    Timeline {
        proposed,
        referendum: Some(referendum),
        execution: Some(execution),
        expires: execution.saturating_add(durations.execution),
    }
}

/// Asks the governance contract whether the proposal has expired in its current list.
pub(crate) async fn contract_says_expired(
    client: &dyn GovernanceClient,
    id: U256,
    stage: Stage,
) -> Result<bool> {
    if stage.is_dequeued() {
        client.is_dequeued_expired(id).await
    } else {
        client.is_queued_expired(id).await
    }
}

async fn fetch_transactions(
    client: &dyn GovernanceClient,
    id: U256,
    count: u64,
) -> Result<Vec<RawTransaction>> {
    stream::iter(0..count)
        .map(|index| client.proposal_transaction(id, index))
        .buffered(MAX_IN_FLIGHT)
        .try_collect()
        .await
}

/// The strictest threshold among the proposal's calls applies.
async fn constitution_threshold(
    client: &dyn GovernanceClient,
    raw: &[RawTransaction],
) -> Result<U256> {
    let thresholds: Vec<U256> = stream::iter(raw)
        .map(|tx| client.constitution(tx.destination, tx.selector()))
        .buffered(MAX_IN_FLIGHT)
        .try_collect()
        .await?;
    Ok(thresholds.into_iter().max().unwrap_or_default())
}

async fn vote_summary(
    client: &dyn GovernanceClient,
    id: U256,
    raw: &[RawTransaction],
) -> Result<VoteSummary> {
    let tally = client.vote_totals(id).await?;
    let participation = client.participation().await?;
    let total_locked = client.total_locked().await?;
    let threshold = constitution_threshold(client, raw).await?;
    Ok(summarise_votes(
        tally,
        total_locked,
        participation.baseline,
        threshold,
    ))
}

/// Works out how many more Yes votes the proposal needs.
///
/// The required Yes share applies to whichever is larger: the votes cast, or
/// the baseline share of all locked stake.
pub fn summarise_votes(
    tally: VoteTally,
    total_locked: U256,
    baseline: U256,
    threshold: U256,
) -> VoteSummary {
    let quorum = apply_fraction(total_locked, baseline);
    let required = apply_fraction(max(tally.total(), quorum), threshold);
    VoteSummary {
        tally,
        total_locked,
        baseline,
        threshold,
        yes_needed: required.saturating_sub(tally.yes),
    }
}
