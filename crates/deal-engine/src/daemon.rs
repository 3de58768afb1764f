//! Deal Loop: poll, select, execute, repeat
//!
//! This module implements the foreground loop that keeps proposing deals to
//! every allowlisted provider until it is cancelled.

use crate::error::{panic_message, DealError, EngineError};
use crate::executor::DealExecutor;
use crate::metrics::{LoopReport, RoundStats, RoundStatsBuilder};
use crate::policy::LoopPolicy;
use crate::selector::{Allowlist, AskSelector, Consideration, SelectedAsks};
use crate::source::AskSource;
use deal_maker_node_interface::{NodeControl, ProtocolParams};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How a single round ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// At least one ask was selected and every selected ask was attempted
    Executed(RoundStats),

    /// Nothing qualified; the caller backs off for the idle interval
    Idle(RoundStats),

    /// The ask listing could not be opened
    SourceUnavailable,

    /// Cancellation was observed mid-round
    Cancelled,
}

/// The deal loop
///
/// Alternates between two phases until cancelled:
/// - **Polling:** open an ask stream and reduce it to one ask per provider
/// - **Executing:** run a deal for each selected ask, one at a time
pub struct DealLoop {
    source: AskSource,
    allowlist: Allowlist,
    executor: DealExecutor,
    policy: LoopPolicy,
}

impl DealLoop {
    /// Build a loop from protocol parameters fetched by the caller
    pub fn new(
        node: Arc<dyn NodeControl>,
        allowlist: Allowlist,
        params: &ProtocolParams,
        policy: LoopPolicy,
    ) -> Result<Self, EngineError> {
        policy.validate().map_err(EngineError::InvalidPolicy)?;

        let max_piece_size = params
            .max_piece_size()
            .ok_or(EngineError::NoSupportedSector)?;

        if allowlist.is_empty() {
            warn!("Allowlist is empty: every round will be idle");
        }

        Ok(Self {
            source: AskSource::new(node.clone()),
            executor: DealExecutor::new(node, max_piece_size, &policy),
            allowlist,
            policy,
        })
    }

    /// Fetch protocol parameters once, then build the loop
    pub async fn bootstrap(
        node: Arc<dyn NodeControl>,
        allowlist: Allowlist,
        policy: LoopPolicy,
    ) -> Result<Self, EngineError> {
        let params = node
            .protocol_params()
            .await
            .map_err(EngineError::ProtocolParams)?;

        Self::new(node, allowlist, &params, policy)
    }

    pub fn policy(&self) -> &LoopPolicy {
        &self.policy
    }

    /// Main loop: runs until `cancel` fires
    ///
    /// A panic inside a round is caught at the round boundary, logged, and
    /// the loop moves on to the next round.
    pub async fn run(self, cancel: CancellationToken) -> LoopReport {
        info!(
            "🤝 Deal loop active | Providers: {} | Piece size: {} bytes | Duration: {} blocks | Idle interval: {}s",
            self.allowlist.len(),
            self.executor.max_piece_size(),
            self.policy.deal_duration,
            self.policy.idle_interval_s
        );

        let mut report = LoopReport::default();

        while !cancel.is_cancelled() {
            report.rounds += 1;

            let outcome = AssertUnwindSafe(self.run_round(&cancel))
                .catch_unwind()
                .await;

            match outcome {
                Ok(RoundOutcome::Executed(stats)) => {
                    info!("📊 {}", stats.summary());
                    report.absorb(&stats);
                }
                Ok(RoundOutcome::Idle(stats)) => {
                    report.idle_rounds += 1;
                    info!(
                        "💤 No allowlisted asks ({} seen), sleeping {}s",
                        stats.asks_seen, self.policy.idle_interval_s
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.policy.idle_interval()) => {}
                    }
                }
                Ok(RoundOutcome::SourceUnavailable) => {
                    report.source_failures += 1;
                    // Re-poll straight away, but let other tasks (the signal listener) run
                    tokio::task::yield_now().await;
                }
                Ok(RoundOutcome::Cancelled) => break,
                Err(panic) => {
                    report.faulted_rounds += 1;
                    error!(
                        "💥 Round {} faulted: {}",
                        report.rounds,
                        panic_message(panic.as_ref())
                    );
                }
            }
        }

        info!("🛑 Deal loop stopped | {}", report.summary());
        report
    }

    /// Execute a single poll/select/execute round
    ///
    /// Note: Public for integration testing
    pub async fn run_round(&self, cancel: &CancellationToken) -> RoundOutcome {
        let mut stats = RoundStatsBuilder::new();

        let selected = match self.poll(cancel, &mut stats).await {
            Some(selected) => selected,
            None if cancel.is_cancelled() => return RoundOutcome::Cancelled,
            None => return RoundOutcome::SourceUnavailable,
        };

        if selected.is_empty() {
            return RoundOutcome::Idle(stats.finish());
        }

        for (provider, ask) in &selected {
            stats.record_deal_attempt();

            let attempt = AssertUnwindSafe(self.executor.execute(ask, cancel))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(DealError::Panicked {
                        ask: ask.to_string(),
                        message: panic_message(panic.as_ref()),
                    })
                });

            match attempt {
                Ok(outcome) => {
                    stats.record_deal_success();
                    info!(
                        "✅ Deal {} with {} complete after {} polls ({:?})",
                        outcome.deal, provider, outcome.polls, outcome.waited
                    );
                }
                Err(e) if e.is_cancelled() => {
                    info!("Round interrupted: {}", e);
                    return RoundOutcome::Cancelled;
                }
                Err(e) => {
                    stats.record_deal_failure();
                    error!("❌ Deal with {} failed: {}", provider, e);
                }
            }
        }

        RoundOutcome::Executed(stats.finish())
    }

    /// Polling phase: drain one ask stream through the selector
    ///
    /// Returns `None` when the source is unavailable or cancellation fired.
    async fn poll(
        &self,
        cancel: &CancellationToken,
        stats: &mut RoundStatsBuilder,
    ) -> Option<SelectedAsks> {
        debug!("🔭 Polling asks...");

        let mut asks = tokio::select! {
            _ = cancel.cancelled() => return None,
            fetched = self.source.fetch() => match fetched {
                Ok(asks) => asks,
                Err(e) => {
                    error!("Failed to list asks: {}", e);
                    return None;
                }
            }
        };

        let mut selector = AskSelector::new(&self.allowlist);

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return None,
                next = asks.next() => next,
            };
            let Some(ask) = next else { break };

            stats.record_ask();
            let label = ask.to_string();
            match selector.consider(ask) {
                Consideration::NotAllowed => {
                    stats.record_not_allowed();
                    debug!("Ignoring {}: provider not allowlisted", label);
                }
                Consideration::Superseded { kept } => {
                    stats.record_superseded();
                    debug!("Ignoring {}: keeping ask {}", label, kept);
                }
                Consideration::Replaced { previous } => {
                    stats.record_superseded();
                    debug!("Selected {} over ask {}", label, previous);
                }
                Consideration::Recorded => debug!("Selected {}", label),
            }
        }

        stats.record_decode_errors(asks.decode_errors());

        let selected = selector.finish();
        stats.record_selected(selected.len());
        Some(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deal_maker_node_interface::{Ask, MockNode, ProviderId};

    fn deal_loop(node: &MockNode, providers: &[&str]) -> DealLoop {
        DealLoop::new(
            Arc::new(node.clone()),
            Allowlist::new(providers.iter().copied()),
            &ProtocolParams::with_max_piece_size(1016),
            LoopPolicy::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let node = MockNode::new(1016);
        let policy = LoopPolicy {
            idle_interval_s: 0,
            ..Default::default()
        };

        let result = DealLoop::new(
            Arc::new(node),
            Allowlist::new(["P1"]),
            &ProtocolParams::with_max_piece_size(1016),
            policy,
        );
        assert!(matches!(result, Err(EngineError::InvalidPolicy(_))));
    }

    #[test]
    fn test_params_without_sectors_rejected() {
        let node = MockNode::new(1016);
        let params = ProtocolParams {
            supported_sectors: Vec::new(),
            ..ProtocolParams::with_max_piece_size(0)
        };

        let result = DealLoop::new(
            Arc::new(node),
            Allowlist::new(["P1"]),
            &params,
            LoopPolicy::default(),
        );
        assert!(matches!(result, Err(EngineError::NoSupportedSector)));
    }

    #[tokio::test]
    async fn test_bootstrap_fails_without_params() {
        let node = MockNode::new(1016);
        node.clear_protocol_params();

        let result =
            DealLoop::bootstrap(Arc::new(node), Allowlist::new(["P1"]), LoopPolicy::default())
                .await;
        assert!(matches!(result, Err(EngineError::ProtocolParams(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_round_is_idle() {
        let node = MockNode::new(1016);
        node.push_asks(vec![]);
        let dl = deal_loop(&node, &["P1"]);

        let outcome = dl.run_round(&CancellationToken::new()).await;

        assert!(matches!(outcome, RoundOutcome::Idle(_)));
        assert!(node.stored().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_strangers_is_idle() {
        let node = MockNode::new(1016);
        node.push_asks(vec![Ask::new("P3", 1), Ask::new("P4", 2)]);
        let dl = deal_loop(&node, &["P1"]);

        match dl.run_round(&CancellationToken::new()).await {
            RoundOutcome::Idle(stats) => {
                assert_eq!(stats.asks_seen, 2);
                assert_eq!(stats.not_allowed, 2);
                assert_eq!(stats.deals_attempted, 0);
            }
            other => panic!("expected idle round, got {:?}", other),
        }
        assert!(node.stored().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_executes_selected_asks() {
        let node = MockNode::new(1016);
        node.push_asks(vec![
            Ask::new("P1", 5),
            Ask::new("P1", 3),
            Ask::new("P3", 1),
            Ask::new("P2", 9),
        ]);
        let dl = deal_loop(&node, &["P1", "P2"]);

        let stats = match dl.run_round(&CancellationToken::new()).await {
            RoundOutcome::Executed(stats) => stats,
            other => panic!("expected executed round, got {:?}", other),
        };

        assert_eq!(stats.asks_seen, 4);
        assert_eq!(stats.not_allowed, 1);
        assert_eq!(stats.superseded, 1);
        assert_eq!(stats.selected, 2);
        assert_eq!(stats.deals_completed, 2);

        let stored: Vec<(ProviderId, u64)> = node
            .stored()
            .into_iter()
            .map(|d| (d.ask.miner, d.ask.id))
            .collect();
        assert_eq!(
            stored,
            vec![(ProviderId::from("P1"), 3), (ProviderId::from("P2"), 9)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_source() {
        let node = MockNode::new(1016);
        node.push_unavailable("daemon not running");
        let dl = deal_loop(&node, &["P1"]);

        let outcome = dl.run_round(&CancellationToken::new()).await;
        assert_eq!(outcome, RoundOutcome::SourceUnavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_round() {
        let node = MockNode::new(1016);
        node.push_asks(vec![Ask::new("P1", 1)]);
        let dl = deal_loop(&node, &["P1"]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = dl.run(cancel).await;

        assert_eq!(report.rounds, 0);
        assert_eq!(node.list_calls(), 0);
    }
}
