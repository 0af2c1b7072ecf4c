use anyhow::Result;
use futures::{stream, StreamExt, TryStreamExt};
use log::debug;
use web3::types::U256;

use crate::{
    data::{
        ActiveProposals, DequeuedEntry, ExecutedEntry, ExecutionHistory, Outcome, QueuedEntry,
        ResolvedProposal,
    },
    error::ReportError,
    parsing::{as_checksummed, h256_to_string},
    proposal::Aggregator,
    types::{GovernanceEvent, Stage, MAX_IN_FLIGHT},
};

/// Logs are scanned from genesis.
const FIRST_BLOCK: u64 = 0;

impl Aggregator {
    /// Proposals currently in the voting stages, then those waiting in the queue.
    ///
    /// Each entry carries the contract's own expiry verdict, which wins over the stage field.
    pub async fn list_active(&self) -> Result<ActiveProposals> {
        let client = self.client.as_ref();

        let slots = client.dequeue().await?;
        let dequeued = stream::iter(slots.into_iter().filter(|id| !id.is_zero()))
            .map(|id| async move {
                let stage = client.proposal_stage(id).await?;
                let expired = client.is_dequeued_expired(id).await?;
                Ok::<_, anyhow::Error>(DequeuedEntry {
                    id,
                    stage: if expired { Some(Stage::Expiration) } else { stage },
                    expired,
                })
            })
            .buffered(MAX_IN_FLIGHT)
            .try_collect()
            .await?;

        let queue = client.queue().await?;
        let queued = stream::iter(queue)
            .map(|(id, upvotes)| async move {
                let expired = client.is_queued_expired(id).await?;
                Ok::<_, anyhow::Error>(QueuedEntry {
                    id,
                    upvotes,
                    expired,
                })
            })
            .buffered(MAX_IN_FLIGHT)
            .try_collect()
            .await?;

        Ok(ActiveProposals { dequeued, queued })
    }

    /// Every executed proposal, oldest first.
    pub async fn list_executed(&self) -> Result<ExecutionHistory> {
        let mut logs = self
            .client
            .events(GovernanceEvent::ProposalExecuted, FIRST_BLOCK)
            .await?;
        // Stable, so emission order holds where the node leaves positions out.
        logs.sort_by_key(|l| (l.block, l.log_index));
        let executed = logs
            .into_iter()
            .map(|l| ExecutedEntry {
                id: l.proposal_id,
                block: l.block,
                transaction_url: self.config.tx_url(&h256_to_string(&l.transaction_hash)),
            })
            .collect();
        Ok(ExecutionHistory { executed })
    }

    /// Outcome of a proposal past its lifetime, from the event log.
    pub(crate) async fn resolve(&self, id: U256) -> Result<ResolvedProposal> {
        let queued = self
            .client
            .events(GovernanceEvent::ProposalQueued, FIRST_BLOCK)
            .await?
            .into_iter()
            .find(|l| l.proposal_id == id)
            .ok_or(ReportError::NotFound(id))?;
        debug!("Proposal {} was queued in block {}", id, queued.block);

        let executed = self
            .client
            .events(GovernanceEvent::ProposalExecuted, queued.block)
            .await?
            .iter()
            .any(|l| l.proposal_id == id);

        Ok(ResolvedProposal {
            id,
            proposer_url: match queued.proposer {
                Some(p) => self.config.address_url(&as_checksummed(&p)),
                None => String::from("unknown"),
            },
            outcome: if executed {
                Outcome::Executed
            } else {
                Outcome::Expired
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{client::mock::MockGovernance, data::GovernanceLog, types::Config};
    use web3::types::H256;

    fn executed(id: u64, block: u64, log_index: u64) -> GovernanceLog {
        GovernanceLog {
            event: GovernanceEvent::ProposalExecuted,
            proposal_id: U256::from(id),
            proposer: None,
            block,
            log_index,
            transaction_hash: H256::from_low_u64_be(id),
        }
    }

    fn aggregator(client: MockGovernance) -> Aggregator {
        Aggregator::new(Box::new(client), Config::default()).unwrap()
    }

    #[tokio::test]
    async fn executed_history_by_block() {
        let mut client = MockGovernance::default();
        client.logs = vec![executed(1, 100, 0), executed(2, 100, 4), executed(3, 250, 1)];
        let history = aggregator(client).list_executed().await.unwrap();

        let blocks: Vec<u64> = history.executed.iter().map(|e| e.block).collect();
        assert!(blocks.windows(2).all(|w| w[0] <= w[1]));
        let ids: Vec<U256> = history.executed.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![U256::from(1u8), U256::from(2u8), U256::from(3u8)]);
        assert!(history.executed[2]
            .transaction_url
            .ends_with("/tx/0x0000000000000000000000000000000000000000000000000000000000000003"));
    }

    #[tokio::test]
    async fn active_lists_skip_empty_slots() {
        let mut client = MockGovernance::default();
        client.dequeue = vec![U256::from(4u8), U256::zero(), U256::from(5u8)];
        client.stages.insert(U256::from(4u8), Stage::Referendum);
        client.stages.insert(U256::from(5u8), Stage::Execution);
        client.queue = vec![(U256::from(7u8), U256::from(30u8)), (U256::from(8u8), U256::zero())];
        client.expired.insert(U256::from(5u8));
        client.expired.insert(U256::from(8u8));

        let active = aggregator(client).list_active().await.unwrap();
        assert_eq!(active.dequeued.len(), 2);
        assert_eq!(active.dequeued[0].stage, Some(Stage::Referendum));
        assert!(!active.dequeued[0].expired);
        // The raw stage says Execution, the expiry check wins.
        assert_eq!(active.dequeued[1].stage, Some(Stage::Expiration));
        assert!(active.dequeued[1].expired);

        assert_eq!(active.queued.len(), 2);
        assert_eq!(active.queued[0].upvotes, U256::from(30u8));
        assert!(active.queued[1].expired);
    }

    #[tokio::test]
    async fn execution_before_queue_block_is_ignored() {
        let mut client = MockGovernance::default();
        client.logs = vec![
            executed(9, 5, 0),
            GovernanceLog {
                event: GovernanceEvent::ProposalQueued,
                proposal_id: U256::from(9u8),
                proposer: None,
                block: 50,
                log_index: 0,
                transaction_hash: H256::zero(),
            },
        ];
        let resolved = aggregator(client).resolve(U256::from(9u8)).await.unwrap();
        assert_eq!(resolved.outcome, Outcome::Expired);
        assert_eq!(resolved.proposer_url, "unknown");
    }
}
