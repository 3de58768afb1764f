/*!
 * Deal Maker - keep a storage client busy making deals
 *
 * Bootstraps a `go-filecoin` node against a devnet, funds its wallet from
 * the faucet and then runs the deal loop against a fixed set of providers
 * until interrupted:
 * - Binary and working directory resolution
 * - Devnet environment (genesis, faucet, node repos)
 * - Process-backed node control over the `go-filecoin` CLI
 * - Structured logging and TOML-tunable loop policy
 *
 * Author: Shane Wall <shaneawall@gmail.com>
 */

pub mod binary;
pub mod config;
pub mod environment;
pub mod error;
pub mod logging;
pub mod node;
pub mod shutdown;
pub mod workdir;

// Re-export commonly used types
pub use config::{DealerConfig, LogLevel, Network, Settings};
pub use environment::Devnet;
pub use error::{DealerError, Result};
pub use node::ProcessNode;
pub use workdir::Workdir;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
