//! Deal loop behaviour against a scripted node
//!
//! Scenarios:
//! 1. Duplicate and foreign asks reduce to one deal per allowlisted provider
//! 2. An empty market puts the loop to sleep for the idle interval
//! 3. A failing or panicking provider does not stop the rest of the round
//! 4. A round that panics is counted and the next round still runs
//! 5. Cancellation stops the loop at the next suspension point

use deal_maker_engine::{Allowlist, DealLoop, LoopPolicy, RoundOutcome};
use deal_maker_node_interface::{Ask, DealState, MockNode, ProviderId};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const PIECE: u64 = 1016;

async fn bootstrap(node: &MockNode, providers: &[&str]) -> anyhow::Result<DealLoop> {
    let deal_loop = DealLoop::bootstrap(
        Arc::new(node.clone()),
        Allowlist::new(providers.iter().copied()),
        LoopPolicy::default(),
    )
    .await?;
    Ok(deal_loop)
}

#[tokio::test(start_paused = true)]
async fn test_one_deal_per_allowlisted_provider() -> anyhow::Result<()> {
    let node = MockNode::new(PIECE);
    node.push_asks(vec![
        Ask::new("P1", 5),
        Ask::new("P1", 3),
        Ask::new("P3", 1),
        Ask::new("P2", 9),
    ]);
    let deal_loop = bootstrap(&node, &["P1", "P2"]).await?;

    let outcome = deal_loop.run_round(&CancellationToken::new()).await;
    assert!(matches!(outcome, RoundOutcome::Executed(_)));

    let stored = node.stored();
    assert_eq!(stored.len(), 2);
    for deal in &stored {
        assert_eq!(deal.payload.len() as u64, PIECE);
        assert_eq!(deal.duration, 256);
    }
    assert_eq!(stored[0].ask, Ask::new("P1", 3));
    assert_eq!(stored[1].ask, Ask::new("P2", 9));
    assert_ne!(stored[0].payload, stored[1].payload);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_empty_market_sleeps_then_repolls() -> anyhow::Result<()> {
    let node = MockNode::new(PIECE);
    // No scripted polls: every listing is empty
    let deal_loop = bootstrap(&node, &["P1"]).await?;
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(deal_loop.run(cancel.clone()));

    // Polls at t=0s, 60s and 120s; the fourth would be at 180s
    tokio::time::sleep(Duration::from_secs(150)).await;
    cancel.cancel();
    let report = handle.await?;

    assert_eq!(node.list_calls(), 3);
    assert_eq!(report.idle_rounds, 3);
    assert!(node.stored().is_empty());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failed_submission_is_isolated() -> anyhow::Result<()> {
    let node = MockNode::new(PIECE);
    node.push_asks(vec![Ask::new("P1", 1), Ask::new("P2", 1), Ask::new("P3", 1)]);
    node.fail_store_for("P1");
    node.final_state_for("P2", DealState::Failed);
    let deal_loop = bootstrap(&node, &["P1", "P2", "P3"]).await?;

    let stats = match deal_loop.run_round(&CancellationToken::new()).await {
        RoundOutcome::Executed(stats) => stats,
        other => panic!("expected executed round, got {:?}", other),
    };

    assert_eq!(stats.deals_attempted, 3);
    assert_eq!(stats.deals_failed, 2);
    assert_eq!(stats.deals_completed, 1);
    assert_eq!(
        node.stored_providers(),
        vec![ProviderId::from("P2"), ProviderId::from("P3")]
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_panicking_provider_is_isolated() -> anyhow::Result<()> {
    let node = MockNode::new(PIECE);
    node.push_asks(vec![Ask::new("P1", 1), Ask::new("P2", 1)]);
    node.panic_store_for("P1");
    let deal_loop = bootstrap(&node, &["P1", "P2"]).await?;

    let stats = match deal_loop.run_round(&CancellationToken::new()).await {
        RoundOutcome::Executed(stats) => stats,
        other => panic!("expected executed round, got {:?}", other),
    };

    assert_eq!(stats.deals_failed, 1);
    assert_eq!(stats.deals_completed, 1);
    assert_eq!(node.stored_providers(), vec![ProviderId::from("P2")]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_loop_survives_source_outage() -> anyhow::Result<()> {
    let node = MockNode::new(PIECE);
    node.push_unavailable("connection refused");
    node.push_unavailable("connection refused");
    node.push_asks(vec![Ask::new("P1", 2)]);
    let deal_loop = bootstrap(&node, &["P1"]).await?;
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(deal_loop.run(cancel.clone()));

    // Two failed polls, one executed round (20s of deal polling), then idle
    tokio::time::sleep(Duration::from_secs(30)).await;
    cancel.cancel();
    let report = handle.await?;

    assert_eq!(report.source_failures, 2);
    assert_eq!(report.deals_completed, 1);
    assert_eq!(node.stored_providers(), vec![ProviderId::from("P1")]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_panicking_round_is_contained() -> anyhow::Result<()> {
    let node = MockNode::new(PIECE);
    node.push_panic();
    node.push_asks(vec![Ask::new("P1", 1)]);
    let deal_loop = bootstrap(&node, &["P1"]).await?;
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(deal_loop.run(cancel.clone()));

    // Faulted poll, executed round, then an idle poll
    tokio::time::sleep(Duration::from_secs(30)).await;
    cancel.cancel();
    let report = handle.await?;

    assert_eq!(report.faulted_rounds, 1);
    assert_eq!(report.deals_completed, 1);
    assert_eq!(node.list_calls(), 3);
    assert_eq!(node.stored_providers(), vec![ProviderId::from("P1")]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_deal_wait() -> anyhow::Result<()> {
    let node = MockNode::new(PIECE);
    node.push_asks(vec![Ask::new("P1", 1), Ask::new("P2", 1)]);
    // P1 never completes
    node.final_state_for("P1", DealState::Started);
    let deal_loop = bootstrap(&node, &["P1", "P2"]).await?;
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(deal_loop.run(cancel.clone()));

    tokio::time::sleep(Duration::from_secs(600)).await;
    cancel.cancel();
    let report = handle.await?;

    assert_eq!(report.rounds, 1);
    assert_eq!(report.deals_completed, 0);
    // P2 was never reached: deals run one at a time
    assert_eq!(node.stored_providers(), vec![ProviderId::from("P1")]);

    Ok(())
}
