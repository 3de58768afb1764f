/*!
 * Configuration types for Deal Maker
 */

use crate::error::{DealerError, Result};
use deal_maker_engine::{Allowlist, LoopPolicy};
use deal_maker_node_interface::ProviderId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Devnets the tool knows how to bootstrap against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Nightly,
    Staging,
    #[default]
    User,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Nightly => "nightly",
            Network::Staging => "staging",
            Network::User => "user",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = DealerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nightly" => Ok(Network::Nightly),
            "staging" => Ok(Network::Staging),
            "user" => Ok(Network::User),
            other => Err(DealerError::Config(format!(
                "unknown network '{}' (expected nightly, staging or user)",
                other
            ))),
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Tunables loadable from a TOML file (`--config`)
///
/// ```toml
/// daemon_start_timeout_s = 120
///
/// [policy]
/// idle_interval_s = 30
/// deal_timeout_s = 7200
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Deal loop pacing and deal terms
    #[serde(default)]
    pub policy: LoopPolicy,

    /// How long to wait for a freshly spawned daemon to answer
    #[serde(default = "default_daemon_start_timeout")]
    pub daemon_start_timeout_s: u64,
}

fn default_daemon_start_timeout() -> u64 {
    60
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            policy: LoopPolicy::default(),
            daemon_start_timeout_s: default_daemon_start_timeout(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DealerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let settings: Settings = toml::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.policy.validate().map_err(DealerError::Config)?;
        if self.daemon_start_timeout_s == 0 {
            return Err(DealerError::Config(
                "daemon_start_timeout_s must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Process-wide configuration, built once at startup and never mutated
#[derive(Debug, Clone)]
pub struct DealerConfig {
    pub network: Network,

    /// Requested working directory (`None` = fresh temp dir)
    pub workdir: Option<PathBuf>,

    /// Resolved node binary
    pub binary: PathBuf,

    /// Providers the client deals with
    pub providers: Vec<ProviderId>,

    pub settings: Settings,

    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    pub verbose: bool,
}

impl DealerConfig {
    pub fn allowlist(&self) -> Allowlist {
        Allowlist::new(self.providers.iter().cloned())
    }

    pub fn daemon_start_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.daemon_start_timeout_s)
    }
}

impl Default for DealerConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            workdir: None,
            binary: PathBuf::from(crate::binary::BINARY_NAME),
            providers: Vec::new(),
            settings: Settings::default(),
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_network_parsing() {
        assert_eq!("user".parse::<Network>().unwrap(), Network::User);
        assert_eq!("nightly".parse::<Network>().unwrap(), Network::Nightly);
        assert_eq!(Network::Staging.to_string(), "staging");
        assert!("mainnet".parse::<Network>().is_err());
    }

    #[test]
    fn test_settings_from_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "daemon_start_timeout_s = 5\n\n[policy]\nidle_interval_s = 30\ndeal_duration = 512"
        )
        .unwrap();

        let settings = Settings::load(file.path()).unwrap();

        assert_eq!(settings.daemon_start_timeout_s, 5);
        assert_eq!(settings.policy.idle_interval_s, 30);
        assert_eq!(settings.policy.deal_duration, 512);
        assert_eq!(settings.policy.deal_poll_interval_s, 10);
    }

    #[test]
    fn test_settings_rejects_invalid_policy() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[policy]\nidle_interval_s = 0").unwrap();

        let err = Settings::load(file.path()).unwrap_err();
        assert!(matches!(err, DealerError::Config(_)));
    }

    #[test]
    fn test_settings_rejects_unparseable_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "policy = [[").unwrap();

        assert!(Settings::load(file.path()).is_err());
    }

    #[test]
    fn test_allowlist_from_config() {
        let config = DealerConfig {
            providers: vec![ProviderId::from("t2a"), ProviderId::from("t2b")],
            ..Default::default()
        };

        let allowlist = config.allowlist();
        assert_eq!(allowlist.len(), 2);
        assert!(allowlist.contains(&ProviderId::from("t2a")));
        assert!(!allowlist.contains(&ProviderId::from("t2c")));
        assert_eq!(config.daemon_start_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
        assert_eq!(LogLevel::Debug.to_tracing_level(), tracing::Level::DEBUG);
    }
}
