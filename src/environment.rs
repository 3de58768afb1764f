/*!
 * Devnet environment: genesis, faucet and the nodes created against it
 */

use crate::config::Network;
use crate::error::{DealerError, Result};
use crate::node::ProcessNode;
use crate::workdir::Workdir;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const DEVNET_DOMAIN: &str = "kittyhawk.wtf";

/// Faucet reply header carrying the funding message
const MESSAGE_CID_HEADER: &str = "Message-Cid";

/// A devnet plus the local nodes joined to it
pub struct Devnet {
    network: Network,
    workdir: Workdir,
    binary: PathBuf,
    http: reqwest::Client,
    processes: Vec<Arc<ProcessNode>>,
}

impl Devnet {
    pub fn new(network: Network, workdir: Workdir, binary: PathBuf) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("deal-maker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DealerError::Environment(format!("http client: {}", e)))?;

        Ok(Self {
            network,
            workdir,
            binary,
            http,
            processes: Vec::new(),
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Genesis block the devnet was started from
    pub fn genesis_car(&self) -> String {
        genesis_car(self.network)
    }

    pub fn faucet_url(&self) -> String {
        faucet_url(self.network)
    }

    /// New node with its own repo under the workdir
    pub fn new_process(&mut self) -> Arc<ProcessNode> {
        let repo = self
            .workdir
            .path()
            .join(format!("node-{}", self.processes.len()));
        let node = Arc::new(ProcessNode::new(&self.binary, repo));
        self.processes.push(node.clone());
        node
    }

    /// Tap the faucet for the node's default wallet and wait for the message
    pub async fn get_funds(&self, node: &ProcessNode) -> Result<()> {
        let address = node.default_address().await.map_err(DealerError::Bootstrap)?;
        info!(%address, faucet = %self.faucet_url(), "Requesting funds");

        let resp = self
            .http
            .post(self.faucet_url())
            .form(&[("target", address.as_str())])
            .send()
            .await
            .map_err(|e| DealerError::Funding(format!("faucet request: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DealerError::Funding(format!(
                "faucet returned {}: {}",
                status,
                body.trim()
            )));
        }

        let cid = message_cid(resp.headers())?;
        info!(%cid, "Waiting for funding message");
        node.wait_for_message(&cid)
            .await
            .map_err(|e| DealerError::Funding(format!("message wait {}: {}", cid, e)))?;

        info!(%address, "Wallet funded");
        Ok(())
    }

    /// Stop every node and remove the repos they used
    pub async fn teardown(self) {
        for node in &self.processes {
            if let Err(e) = node.stop().await {
                warn!(repo = %node.repo_dir().display(), error = %e, "Failed to stop node");
            }
            if let Workdir::Provided(_) = self.workdir {
                if node.repo_dir().exists() {
                    if let Err(e) = tokio::fs::remove_dir_all(node.repo_dir()).await {
                        warn!(repo = %node.repo_dir().display(), error = %e, "Failed to remove repo");
                    }
                }
            }
        }
        info!(workdir = %self.workdir.path().display(), "Environment torn down");
        // Temporary workdirs are removed on drop
    }
}

pub fn genesis_car(network: Network) -> String {
    format!("http://genesis.{}.{}/genesis.car", network, DEVNET_DOMAIN)
}

pub fn faucet_url(network: Network) -> String {
    format!("http://faucet.{}.{}/tap", network, DEVNET_DOMAIN)
}

fn message_cid(headers: &reqwest::header::HeaderMap) -> Result<String> {
    let value = headers
        .get(MESSAGE_CID_HEADER)
        .ok_or_else(|| DealerError::Funding("faucet reply has no Message-Cid header".to_string()))?;
    let cid = value
        .to_str()
        .map_err(|e| DealerError::Funding(format!("bad Message-Cid header: {}", e)))?
        .trim();
    if cid.is_empty() {
        return Err(DealerError::Funding("empty Message-Cid header".to_string()));
    }
    Ok(cid.to_string())
}
