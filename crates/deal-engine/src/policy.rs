//! Loop Policy
//!
//! Tunables for the deal loop: pacing, deal terms and wait limits.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Deal loop operational policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopPolicy {
    /// Sleep between polls when no allowlisted ask is available
    ///
    /// Fixed interval, no growth and no jitter.
    ///
    /// **Default:** 60
    pub idle_interval_s: u64,

    /// Storage duration requested for every deal, in blocks
    ///
    /// Never derived from the ask.
    ///
    /// **Default:** 256
    pub deal_duration: u64,

    /// Delay between two deal state queries
    ///
    /// **Default:** 10
    pub deal_poll_interval_s: u64,

    /// Give up waiting on a deal after this many seconds
    ///
    /// `None` waits until the deal is terminal or the loop is cancelled.
    ///
    /// **Default:** None
    pub deal_timeout_s: Option<u64>,
}

impl Default for LoopPolicy {
    fn default() -> Self {
        Self {
            idle_interval_s: 60,
            deal_duration: 256,
            deal_poll_interval_s: 10,
            deal_timeout_s: None,
        }
    }
}

impl LoopPolicy {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_secs(self.idle_interval_s)
    }

    pub fn deal_poll_interval(&self) -> Duration {
        Duration::from_secs(self.deal_poll_interval_s)
    }

    pub fn deal_timeout(&self) -> Option<Duration> {
        self.deal_timeout_s.map(Duration::from_secs)
    }

    /// Validate the policy configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.idle_interval_s == 0 {
            return Err("idle_interval_s must be greater than 0".to_string());
        }

        if self.deal_duration == 0 {
            return Err("deal_duration must be at least 1 block".to_string());
        }

        if self.deal_poll_interval_s == 0 {
            return Err("deal_poll_interval_s must be greater than 0".to_string());
        }

        if self.deal_timeout_s == Some(0) {
            return Err("deal_timeout_s must be greater than 0 when set".to_string());
        }

        Ok(())
    }
}
