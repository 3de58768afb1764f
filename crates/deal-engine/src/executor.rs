//! Deal Executor: store a fresh payload under one ask and wait it out
//!
//! For each ask the executor:
//! 1. Generates a random payload of the network's max piece size
//! 2. Submits it for a fixed storage duration
//! 3. Polls the deal until `Complete`, a terminal failure, the optional
//!    timeout, or cancellation

use crate::error::DealError;
use crate::policy::LoopPolicy;
use deal_maker_node_interface::{Ask, DealRef, DealState, NodeControl, Payload};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Result of a deal that reached `Complete`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealOutcome {
    pub deal: DealRef,
    pub state: DealState,
    pub payload_len: u64,
    pub polls: u32,
    pub waited: Duration,
}

pub struct DealExecutor {
    node: Arc<dyn NodeControl>,

    /// Piece size from protocol parameters, fixed for the process lifetime
    max_piece_size: u64,

    duration: u64,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl DealExecutor {
    pub fn new(node: Arc<dyn NodeControl>, max_piece_size: u64, policy: &LoopPolicy) -> Self {
        Self {
            node,
            max_piece_size,
            duration: policy.deal_duration,
            poll_interval: policy.deal_poll_interval(),
            timeout: policy.deal_timeout(),
        }
    }

    pub fn max_piece_size(&self) -> u64 {
        self.max_piece_size
    }

    /// Run one deal to completion
    ///
    /// No retries: any failure abandons this ask for the current round.
    pub async fn execute(
        &self,
        ask: &Ask,
        cancel: &CancellationToken,
    ) -> Result<DealOutcome, DealError> {
        let payload = Payload::random(self.max_piece_size);
        let payload_len = payload.len();

        info!(
            "📦 Proposing {} bytes to {} (ask {}, {} blocks)",
            payload_len, ask.miner, ask.id, self.duration
        );

        let deal = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(DealError::Cancelled { stage: format!("submission of {}", ask) });
            }
            stored = self.node.store(ask, payload, self.duration) => {
                stored.map_err(|source| DealError::Submit { ask: ask.to_string(), source })?
            }
        };

        info!("   Deal proposed: {}", deal);

        let (state, polls, waited) = self.wait_for_complete(&deal, cancel).await?;

        Ok(DealOutcome {
            deal,
            state,
            payload_len,
            polls,
            waited,
        })
    }

    async fn wait_for_complete(
        &self,
        deal: &DealRef,
        cancel: &CancellationToken,
    ) -> Result<(DealState, u32, Duration), DealError> {
        let started = Instant::now();
        let mut polls = 0u32;

        loop {
            let status = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(DealError::Cancelled { stage: format!("wait on deal {}", deal) });
                }
                status = self.node.query_deal(deal) => {
                    status.map_err(|source| DealError::Query { deal: deal.clone(), source })?
                }
            };
            polls += 1;

            debug!("Deal {} is {}", deal, status.state);

            if status.state.is_success() {
                return Ok((status.state, polls, started.elapsed()));
            }

            if status.state.is_terminal() {
                return Err(DealError::Terminal {
                    deal: deal.clone(),
                    state: status.state,
                    message: status.message,
                });
            }

            if let Some(timeout) = self.timeout {
                if started.elapsed() >= timeout {
                    return Err(DealError::Timeout {
                        deal: deal.clone(),
                        waited: started.elapsed(),
                        last: status.state,
                    });
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(DealError::Cancelled { stage: format!("wait on deal {}", deal) });
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}
