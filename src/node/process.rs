//! `go-filecoin` driven through its command line
//!
//! Every call runs the binary against one repo directory. The daemon is the
//! only long-lived child; everything else is a short command whose JSON output
//! is decoded on exit.

use super::wire::{CidLink, IdResponse, ProposalResponse};
use crate::config::Network;
use async_trait::async_trait;
use deal_maker_node_interface::{
    Ask, AskDecodeError, AskStream, DealRef, DealStatus, NodeControl, NodeError, Payload,
    ProtocolParams, Result,
};
use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Node log settings passed to every child: info level, plain text
const NODE_ENV: [(&str, &str); 2] = [("GO_FILECOIN_LOG_LEVEL", "4"), ("GO_FILECOIN_LOG_JSON", "0")];

const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A node backed by a `go-filecoin` repo on local disk
#[derive(Debug)]
pub struct ProcessNode {
    binary: PathBuf,
    repo_dir: PathBuf,
    daemon: Mutex<Option<Child>>,
}

impl ProcessNode {
    pub fn new(binary: impl Into<PathBuf>, repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            repo_dir: repo_dir.into(),
            daemon: Mutex::new(None),
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    /// Base command for `args`, bound to this node's repo
    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .arg(format!("--repodir={}", self.repo_dir.display()))
            .envs(NODE_ENV)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    fn describe(args: &[&str]) -> String {
        format!("go-filecoin {}", args.join(" "))
    }

    /// Run a command to completion, failing on nonzero exit
    async fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
        let command = Self::describe(args);
        debug!(%command, "Running node command");

        let output = self
            .command(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| NodeError::Spawn {
                command: command.clone(),
                source,
            })?;

        check_output(command, output)
    }

    /// Run a command with `--enc=json` and decode its stdout
    async fn run_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T> {
        let mut args = args.to_vec();
        args.push("--enc=json");
        let stdout = self.run(&args).await?;

        serde_json::from_slice(&stdout).map_err(|source| NodeError::Decode {
            command: Self::describe(&args),
            source,
        })
    }

    /// Create the repo for a devnet
    pub async fn init(&self, network: Network, genesis_file: &str) -> Result<()> {
        let devnet = format!("--devnet-{}", network);
        let genesis = format!("--genesisfile={}", genesis_file);

        info!(repo = %self.repo_dir.display(), %network, "Initializing node");
        self.run(&["init", &devnet, &genesis]).await?;
        Ok(())
    }

    /// Spawn the daemon and wait until it answers `id`
    pub async fn start_daemon(&self, timeout: Duration) -> Result<()> {
        let mut daemon = self.daemon.lock().await;
        if daemon.is_some() {
            return Err(NodeError::Other("daemon already running".to_string()));
        }

        let log_path = self.repo_dir.join("daemon.log");
        let log = std::fs::File::create(&log_path)?;
        let child = self
            .command(&["daemon"])
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log))
            .spawn()
            .map_err(|source| NodeError::Spawn {
                command: "go-filecoin daemon".to_string(),
                source,
            })?;
        info!(pid = ?child.id(), log = %log_path.display(), "Daemon spawned");
        *daemon = Some(child);

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let exited = match daemon.as_mut() {
                Some(child) => child.try_wait()?,
                None => None,
            };
            if let Some(status) = exited {
                *daemon = None;
                return Err(NodeError::CommandFailed {
                    command: "go-filecoin daemon".to_string(),
                    status: status.to_string(),
                    stderr: format!("see {}", log_path.display()),
                });
            }

            match self.run_json::<IdResponse>(&["id"]).await {
                Ok(id) => {
                    info!(peer = %id.id, "Daemon ready");
                    return Ok(());
                }
                Err(e) => debug!(error = %e, "Daemon not ready yet"),
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(NodeError::Unavailable(format!(
                    "daemon did not answer within {:?}",
                    timeout
                )));
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Wallet address the node signs with
    pub async fn default_address(&self) -> Result<String> {
        self.run_json(&["config", "wallet.defaultAddress"]).await
    }

    /// Block until the message is mined
    pub async fn wait_for_message(&self, cid: &str) -> Result<()> {
        self.run(&["message", "wait", cid]).await?;
        Ok(())
    }

    /// Kill the daemon if it is running
    pub async fn stop(&self) -> Result<()> {
        if let Some(mut child) = self.daemon.lock().await.take() {
            child.start_kill()?;
            let status = child.wait().await?;
            info!(%status, repo = %self.repo_dir.display(), "Daemon stopped");
        }
        Ok(())
    }

    /// `client import`, streaming the payload through stdin
    async fn import(&self, payload: Payload) -> Result<String> {
        let args = ["client", "import", "--enc=json"];
        let command = Self::describe(&args);

        let mut child = self
            .command(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| NodeError::Spawn {
                command: command.clone(),
                source,
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| NodeError::Other("import stdin unavailable".to_string()))?;
        let feed = async move {
            let written = payload.write_to(&mut stdin).await;
            drop(stdin);
            written
        };

        let (written, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        // A short write surfaces as the command's own failure
        if let Err(e) = written {
            if output.status.success() {
                return Err(NodeError::Io(e));
            }
        }

        let stdout = check_output(command.clone(), output)?;
        let link: CidLink = serde_json::from_slice(&stdout)
            .map_err(|source| NodeError::Decode { command, source })?;
        Ok(link.cid)
    }
}

fn check_output(command: String, output: Output) -> Result<Vec<u8>> {
    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(NodeError::CommandFailed {
            command,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

const LIST_ASKS: [&str; 3] = ["client", "list-asks", "--enc=json"];

/// Running `client list-asks` whose stdout is consumed line by line
struct AskListing {
    lines: Lines<BufReader<ChildStdout>>,
    child: Option<Child>,
    stderr: Option<JoinHandle<String>>,
    /// First record, read ahead by `open`
    pending: Option<std::result::Result<Ask, AskDecodeError>>,
}

impl AskListing {
    /// Read up to the first record
    ///
    /// A listing that ends before producing anything and exits nonzero never
    /// reached the node, so it fails here instead of becoming a stream.
    async fn open(mut self) -> Result<Self> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    self.pending = Some(AskDecodeError::decode_line(&line));
                    return Ok(self);
                }
                Ok(None) => {
                    return match self.reap().await {
                        Some(err) => Err(err),
                        None => Ok(self),
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    self.pending = Some(Err(AskDecodeError::Read(e)));
                    return Ok(self);
                }
                Err(e) => {
                    if let Some(mut child) = self.child.take() {
                        let _ = child.start_kill();
                    }
                    return Err(NodeError::Io(e));
                }
            }
        }
    }

    async fn next(&mut self) -> Option<std::result::Result<Ask, AskDecodeError>> {
        if let Some(item) = self.pending.take() {
            return Some(item);
        }
        self.child.as_ref()?;
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Some(AskDecodeError::decode_line(&line)),
                // Records were already yielded: a failed exit is the last element
                Ok(None) => {
                    return self.reap().await.map(|err| {
                        Err(AskDecodeError::Read(std::io::Error::other(err.to_string())))
                    })
                }
                // Invalid UTF-8 only spoils the current line
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    return Some(Err(AskDecodeError::Read(e)))
                }
                Err(e) => {
                    if let Some(mut child) = self.child.take() {
                        let _ = child.start_kill();
                    }
                    return Some(Err(AskDecodeError::Read(e)));
                }
            }
        }
    }

    /// Reap the child, returning its failure if it exited nonzero
    async fn reap(&mut self) -> Option<NodeError> {
        let mut child = self.child.take()?;
        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => return Some(NodeError::Io(e)),
        };
        if status.success() {
            return None;
        }

        let stderr = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        Some(NodeError::CommandFailed {
            command: ProcessNode::describe(&LIST_ASKS),
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        })
    }
}

#[async_trait]
impl NodeControl for ProcessNode {
    async fn protocol_params(&self) -> Result<ProtocolParams> {
        self.run_json(&["protocol"]).await
    }

    async fn list_asks(&self) -> Result<AskStream> {
        let mut child = self
            .command(&LIST_ASKS)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| NodeError::Spawn {
                command: Self::describe(&LIST_ASKS),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| NodeError::Unavailable("list-asks stdout unavailable".to_string()))?;
        let stderr = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf).await;
                buf
            })
        });

        let listing = AskListing {
            lines: BufReader::new(stdout).lines(),
            child: Some(child),
            stderr,
            pending: None,
        }
        .open()
        .await?;

        Ok(stream::unfold(listing, |mut listing| async move {
            listing.next().await.map(|item| (item, listing))
        })
        .boxed())
    }

    async fn store(&self, ask: &Ask, payload: Payload, duration: u64) -> Result<DealRef> {
        let size = payload.len();
        let data_cid = self.import(payload).await?;
        debug!(cid = %data_cid, size, "Payload imported");

        let ask_id = ask.id.to_string();
        let duration = duration.to_string();
        let response: ProposalResponse = self
            .run_json(&[
                "client",
                "propose-storage-deal",
                ask.miner.as_str(),
                &data_cid,
                &ask_id,
                &duration,
            ])
            .await?;

        if response.state.is_terminal() && !response.state.is_success() {
            return Err(NodeError::Other(format!(
                "proposal {}: {}",
                response.state, response.message
            )));
        }
        Ok(response.deal_ref())
    }

    async fn query_deal(&self, deal: &DealRef) -> Result<DealStatus> {
        self.run_json(&["client", "query-storage-deal", deal.as_str()])
            .await
    }
}
