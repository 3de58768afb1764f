//! Ask Source: one decode stream per poll

use crate::error::SourceUnavailable;
use deal_maker_node_interface::{Ask, AskStream, NodeControl};
use futures::stream::{Fuse, StreamExt};
use std::sync::Arc;
use tracing::warn;

/// Fetches the standing asks from the node
#[derive(Clone)]
pub struct AskSource {
    node: Arc<dyn NodeControl>,
}

impl AskSource {
    pub fn new(node: Arc<dyn NodeControl>) -> Self {
        Self { node }
    }

    /// Open a fresh stream of asks
    ///
    /// Fails with [`SourceUnavailable`] only when the listing cannot be opened.
    pub async fn fetch(&self) -> Result<Asks, SourceUnavailable> {
        let inner = self.node.list_asks().await.map_err(SourceUnavailable)?;
        Ok(Asks {
            inner: inner.fuse(),
            decode_errors: 0,
        })
    }
}

/// Lazy, finite and single-use sequence of asks
///
/// Undecodable elements are logged and skipped; only end of stream stops it.
pub struct Asks {
    inner: Fuse<AskStream>,
    decode_errors: usize,
}

impl Asks {
    /// Next well-formed ask, or `None` at end of stream
    pub async fn next(&mut self) -> Option<Ask> {
        while let Some(item) = self.inner.next().await {
            match item {
                Ok(ask) => return Some(ask),
                Err(e) => {
                    self.decode_errors += 1;
                    warn!("Skipping undecodable ask: {}", e);
                }
            }
        }
        None
    }

    /// Number of elements skipped so far
    pub fn decode_errors(&self) -> usize {
        self.decode_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deal_maker_node_interface::MockNode;

    #[tokio::test]
    async fn test_malformed_elements_are_skipped() {
        let node = MockNode::new(64);
        node.push_lines(vec![
            r#"{"Miner":"t2a","ID":1}"#.to_string(),
            "{garbage".to_string(),
            r#"{"Miner":"t2b","ID":2,"Error":"lookup failed"}"#.to_string(),
            r#"{"Miner":"t2c","ID":3}"#.to_string(),
        ]);

        let source = AskSource::new(Arc::new(node));
        let mut asks = source.fetch().await.unwrap();

        assert_eq!(asks.next().await, Some(Ask::new("t2a", 1)));
        assert_eq!(asks.next().await, Some(Ask::new("t2c", 3)));
        assert_eq!(asks.next().await, None);
        assert_eq!(asks.decode_errors(), 2);

        // Exhausted streams stay exhausted
        assert_eq!(asks.next().await, None);
    }

    #[tokio::test]
    async fn test_unavailable_listing() {
        let node = MockNode::new(64);
        node.push_unavailable("connection refused");

        let source = AskSource::new(Arc::new(node));
        let err = source.fetch().await.err().unwrap();

        assert!(err.to_string().contains("connection refused"));
    }
}
