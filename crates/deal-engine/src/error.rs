//! Error types for the deal engine

use deal_maker_node_interface::{DealRef, DealState, NodeError};
use std::time::Duration;
use thiserror::Error;

/// The ask listing could not be opened; the whole round is abandoned
#[derive(Error, Debug)]
#[error("ask source unavailable: {0}")]
pub struct SourceUnavailable(#[source] pub NodeError);

/// Failure of a single deal attempt; only that ask is abandoned
#[derive(Error, Debug)]
pub enum DealError {
    #[error("failed to submit payload for {ask}: {source}")]
    Submit {
        ask: String,
        #[source]
        source: NodeError,
    },

    #[error("failed to query deal {deal}: {source}")]
    Query {
        deal: DealRef,
        #[source]
        source: NodeError,
    },

    #[error("deal {deal} ended in state {state}: {message}")]
    Terminal {
        deal: DealRef,
        state: DealState,
        message: String,
    },

    #[error("deal {deal} not complete after {waited:?} (last state {last})")]
    Timeout {
        deal: DealRef,
        waited: Duration,
        last: DealState,
    },

    #[error("cancelled during {stage}")]
    Cancelled { stage: String },

    #[error("panic while executing {ask}: {message}")]
    Panicked { ask: String, message: String },
}

impl DealError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DealError::Cancelled { .. })
    }
}

/// Startup failures of the engine itself
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid loop policy: {0}")]
    InvalidPolicy(String),

    #[error("failed to fetch protocol parameters: {0}")]
    ProtocolParams(#[source] NodeError),

    #[error("protocol parameters advertise no supported sector")]
    NoSupportedSector,
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_extraction() {
        let caught = std::panic::catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "boom 7");

        let caught = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "static");
    }

    #[test]
    fn test_deal_error_display() {
        let err = DealError::Terminal {
            deal: DealRef::new("bafy1"),
            state: DealState::Rejected,
            message: "price too low".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "deal bafy1 ended in state rejected: price too low"
        );
        assert!(!err.is_cancelled());
    }
}
