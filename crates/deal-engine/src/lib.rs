//! Deal Engine: Ask Discovery and Deal Negotiation
//!
//! The engine keeps a single client identity busy making storage deals with a
//! fixed set of providers. It never optimizes price, never cancels a deal and
//! keeps no state between rounds beyond the allowlist and protocol parameters.
//!
//! # Architecture: The Round
//!
//! ```text
//! ┌─────────────┐
//! │  Source     │──> Decode the node's standing asks (skip bad records)
//! └──────┬──────┘
//!        │
//!        v
//! ┌─────────────┐
//! │  Select     │──> Allowlisted providers only, lowest ask id per provider
//! └──────┬──────┘
//!        │  nothing selected ──> sleep idle interval
//!        v
//! ┌─────────────┐
//! │  Execute    │──> Random payload, propose, wait for Complete (per ask)
//! └──────┬──────┘
//!        │
//!        └────> Next round
//! ```
//!
//! # Example
//!
//! ```no_run
//! use deal_maker_engine::{Allowlist, DealLoop, LoopPolicy};
//! use deal_maker_node_interface::MockNode;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let node = Arc::new(MockNode::new(1016));
//! let allowlist = Allowlist::new(["t2provider"]);
//!
//! let deal_loop = DealLoop::bootstrap(node, allowlist, LoopPolicy::default()).await?;
//!
//! let cancel = CancellationToken::new();
//! let report = deal_loop.run(cancel.child_token()).await;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod daemon;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod policy;
pub mod selector;
pub mod source;

pub use daemon::{DealLoop, RoundOutcome};
pub use error::{DealError, EngineError, SourceUnavailable};
pub use executor::{DealExecutor, DealOutcome};
pub use metrics::{LoopReport, RoundStats};
pub use policy::LoopPolicy;
pub use selector::{select, Allowlist, AskSelector, Consideration, SelectedAsks};
pub use source::{AskSource, Asks};
