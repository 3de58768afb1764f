//! Deal Maker Node Interface: Storage Market Abstraction
//!
//! This crate defines the `NodeControl` trait, the narrow surface through which
//! the deal engine talks to the node under test:
//!
//! 1. **Discovery**: protocol parameters and the stream of standing asks
//! 2. **Submission**: store a payload under a chosen ask
//! 3. **Observation**: query a deal's lifecycle state
//!
//! Bootstrapping the node (init, daemon, funding) is not part of the trait;
//! it belongs to the concrete process-backed implementation.
//!
//! # Example
//!
//! ```rust,no_run
//! use deal_maker_node_interface::{NodeControl, NodeError};
//! use futures::StreamExt;
//!
//! async fn count_asks<N: NodeControl>(node: &N) -> Result<usize, NodeError> {
//!     let mut asks = node.list_asks().await?;
//!     let mut n = 0;
//!     while let Some(ask) = asks.next().await {
//!         if ask.is_ok() {
//!             n += 1;
//!         }
//!     }
//!     Ok(n)
//! }
//! ```

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

pub mod market;
pub mod mock;
pub mod payload;

pub use market::{Ask, AskRecord, DealRef, DealState, DealStatus, ProtocolParams, ProviderId, SectorInfo};
pub use mock::MockNode;
pub use payload::Payload;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("failed to decode output of `{command}`: {source}")]
    Decode {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("node unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, NodeError>;

/// Failure to decode a single element of the ask stream
///
/// These never end the stream; the consumer skips the element.
#[derive(Error, Debug)]
pub enum AskDecodeError {
    #[error("malformed ask record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("node reported ask {id} from {miner} as failed: {message}")]
    Reported {
        miner: ProviderId,
        id: u64,
        message: String,
    },

    #[error("ask stream read error: {0}")]
    Read(#[from] std::io::Error),
}

impl AskDecodeError {
    /// Decode one line of the node's newline-delimited ask listing
    pub fn decode_line(line: &str) -> std::result::Result<Ask, AskDecodeError> {
        let record: AskRecord = serde_json::from_str(line)?;
        match record.error {
            Some(message) if !message.is_empty() => Err(AskDecodeError::Reported {
                miner: record.ask.miner,
                id: record.ask.id,
                message,
            }),
            _ => Ok(record.ask),
        }
    }
}

/// Lazy, finite, single-use stream of decoded asks
pub type AskStream = BoxStream<'static, std::result::Result<Ask, AskDecodeError>>;

/// The node under test, as seen by the deal engine
///
/// Implementations must be `Send + Sync + 'static` so a single handle can be
/// shared as `Arc<dyn NodeControl>`.
#[async_trait]
pub trait NodeControl: Send + Sync + 'static {
    /// Currently active protocol parameters
    async fn protocol_params(&self) -> Result<ProtocolParams>;

    /// Open one decode stream over the standing asks
    ///
    /// # Errors
    ///
    /// Fails only when the listing cannot be opened at all. Per-element decode
    /// problems are yielded inside the stream.
    async fn list_asks(&self) -> Result<AskStream>;

    /// Submit `payload` for storage under `ask` for `duration` blocks
    async fn store(&self, ask: &Ask, payload: Payload, duration: u64) -> Result<DealRef>;

    /// Current lifecycle state of a proposed deal
    async fn query_deal(&self, deal: &DealRef) -> Result<DealStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_line_accepts_clean_record() {
        let ask = AskDecodeError::decode_line(r#"{"Miner":"t2a","ID":1,"Error":""}"#).unwrap();
        assert_eq!(ask, Ask::new("t2a", 1));
    }

    #[test]
    fn test_decode_line_surfaces_reported_error() {
        let err = AskDecodeError::decode_line(r#"{"Miner":"t2a","ID":4,"Error":"boom"}"#)
            .unwrap_err();
        assert!(matches!(err, AskDecodeError::Reported { id: 4, .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_decode_line_rejects_garbage() {
        let err = AskDecodeError::decode_line("{not json").unwrap_err();
        assert!(matches!(err, AskDecodeError::Malformed(_)));
    }
}
