//! In-memory node for testing
//!
//! `MockNode` scripts what the node answers, poll by poll, and records what
//! the engine asked of it, so the control loop can be exercised without a
//! real daemon.

use crate::{
    Ask, AskDecodeError, AskStream, DealRef, DealState, DealStatus, NodeControl, NodeError,
    Payload, ProtocolParams, ProviderId, Result,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// What a single `list_asks` call answers
#[derive(Debug, Clone)]
enum MockPoll {
    /// Raw newline-delimited records, decoded like the real node output
    Lines(Vec<String>),
    /// The listing cannot be opened
    Unavailable(String),
    /// The call panics
    Panic,
}

/// A deal the mock accepted
#[derive(Debug, Clone)]
pub struct StoredDeal {
    pub deal: DealRef,
    pub ask: Ask,
    pub payload: Vec<u8>,
    pub duration: u64,
}

#[derive(Debug, Default)]
struct MockState {
    params: Option<ProtocolParams>,
    polls: VecDeque<MockPoll>,
    list_calls: usize,
    store_failures: HashSet<ProviderId>,
    store_panics: HashSet<ProviderId>,
    final_states: HashMap<ProviderId, DealState>,
    deals: HashMap<DealRef, VecDeque<DealState>>,
    stored: Vec<StoredDeal>,
    queries: usize,
}

/// Scripted node implementation for tests
///
/// # Example
///
/// ```rust
/// use deal_maker_node_interface::{Ask, MockNode, NodeControl};
///
/// # async fn example() {
/// let node = MockNode::new(1016);
/// node.push_asks(vec![Ask::new("t2a", 1)]);
///
/// let params = node.protocol_params().await.unwrap();
/// assert_eq!(params.max_piece_size(), Some(1016));
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockNode {
    state: Arc<Mutex<MockState>>,
}

impl MockNode {
    /// Create a node advertising a single sector with the given max piece size
    pub fn new(max_piece_size: u64) -> Self {
        let node = Self::default();
        node.state().params = Some(ProtocolParams::with_max_piece_size(max_piece_size));
        node
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue the asks answered by the next `list_asks` call
    pub fn push_asks(&self, asks: Vec<Ask>) {
        let lines = asks
            .iter()
            .map(|ask| serde_json::to_string(ask).unwrap_or_default())
            .collect();
        self.push_lines(lines);
    }

    /// Queue raw stream records for the next `list_asks` call
    pub fn push_lines(&self, lines: Vec<String>) {
        self.state().polls.push_back(MockPoll::Lines(lines));
    }

    /// Make the next `list_asks` call fail before any decoding
    pub fn push_unavailable(&self, reason: &str) {
        self.state()
            .polls
            .push_back(MockPoll::Unavailable(reason.to_string()));
    }

    /// Make the next `list_asks` call panic
    pub fn push_panic(&self) {
        self.state().polls.push_back(MockPoll::Panic);
    }

    /// Reject storage submissions for `provider` with a transport error
    pub fn fail_store_for(&self, provider: impl Into<ProviderId>) {
        self.state().store_failures.insert(provider.into());
    }

    /// Panic inside `store` for `provider`
    pub fn panic_store_for(&self, provider: impl Into<ProviderId>) {
        self.state().store_panics.insert(provider.into());
    }

    /// Terminal state reached by deals with `provider` (default: `Complete`)
    pub fn final_state_for(&self, provider: impl Into<ProviderId>, state: DealState) {
        self.state().final_states.insert(provider.into(), state);
    }

    /// Drop the protocol parameters so `protocol_params` fails
    pub fn clear_protocol_params(&self) {
        self.state().params = None;
    }

    pub fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    pub fn queries(&self) -> usize {
        self.state().queries
    }

    pub fn stored(&self) -> Vec<StoredDeal> {
        self.state().stored.clone()
    }

    /// Providers that received a successful submission, in submission order
    pub fn stored_providers(&self) -> Vec<ProviderId> {
        self.state()
            .stored
            .iter()
            .map(|d| d.ask.miner.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl NodeControl for MockNode {
    async fn protocol_params(&self) -> Result<ProtocolParams> {
        self.state()
            .params
            .clone()
            .ok_or_else(|| NodeError::Unavailable("protocol parameters not set".to_string()))
    }

    async fn list_asks(&self) -> Result<AskStream> {
        let poll = {
            let mut state = self.state();
            state.list_calls += 1;
            state.polls.pop_front()
        };

        match poll {
            Some(MockPoll::Unavailable(reason)) => Err(NodeError::Unavailable(reason)),
            Some(MockPoll::Panic) => panic!("mock node panicked while listing asks"),
            Some(MockPoll::Lines(lines)) => {
                let decoded = lines
                    .into_iter()
                    .map(|line| AskDecodeError::decode_line(&line))
                    .collect::<Vec<_>>();
                Ok(Box::pin(futures::stream::iter(decoded)))
            }
            None => Ok(Box::pin(futures::stream::empty())),
        }
    }

    async fn store(&self, ask: &Ask, payload: Payload, duration: u64) -> Result<DealRef> {
        let (fails, panics) = {
            let state = self.state();
            (
                state.store_failures.contains(&ask.miner),
                state.store_panics.contains(&ask.miner),
            )
        };

        if panics {
            panic!("mock node panicked while storing {}", ask);
        }
        if fails {
            return Err(NodeError::Other(format!(
                "transport error: connection reset while proposing to {}",
                ask.miner
            )));
        }

        let payload = payload.into_bytes()?;
        let mut state = self.state();
        let deal = DealRef::new(format!("mock-proposal-{}", state.stored.len()));
        let final_state = state
            .final_states
            .get(&ask.miner)
            .copied()
            .unwrap_or(DealState::Complete);

        state.deals.insert(
            deal.clone(),
            VecDeque::from(vec![DealState::Accepted, DealState::Staged, final_state]),
        );
        state.stored.push(StoredDeal {
            deal: deal.clone(),
            ask: ask.clone(),
            payload,
            duration,
        });

        Ok(deal)
    }

    async fn query_deal(&self, deal: &DealRef) -> Result<DealStatus> {
        let mut state = self.state();
        state.queries += 1;

        let states = state
            .deals
            .get_mut(deal)
            .ok_or_else(|| NodeError::Other(format!("unknown deal {}", deal)))?;

        let current = if states.len() > 1 {
            states.pop_front()
        } else {
            states.front().copied()
        };

        current
            .map(DealStatus::new)
            .ok_or_else(|| NodeError::Other(format!("deal {} has no state", deal)))
    }
}
