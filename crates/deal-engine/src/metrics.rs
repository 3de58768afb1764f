//! Round Metrics
//!
//! Tracks what happened during one poll/execute round and across the
//! lifetime of the loop.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Statistics from a single round
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStats {
    /// Asks decoded from the stream
    pub asks_seen: usize,

    /// Stream elements that failed to decode and were skipped
    pub decode_errors: usize,

    /// Asks from providers outside the allowlist
    pub not_allowed: usize,

    /// Asks dropped in favour of a lower id from the same provider
    pub superseded: usize,

    /// Asks chosen for execution (at most one per provider)
    pub selected: usize,

    pub deals_attempted: usize,
    pub deals_completed: usize,
    pub deals_failed: usize,

    /// Time taken to complete the round
    pub duration: Option<Duration>,
}

impl RoundStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share of attempted deals that completed (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.deals_attempted == 0 {
            1.0
        } else {
            self.deals_completed as f64 / self.deals_attempted as f64
        }
    }

    /// Format a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Round: {} asks ({} undecodable, {} not allowlisted, {} superseded) | {} selected | Deals: {}/{} complete ({:.1}%) | {} failed",
            self.asks_seen,
            self.decode_errors,
            self.not_allowed,
            self.superseded,
            self.selected,
            self.deals_completed,
            self.deals_attempted,
            self.success_rate() * 100.0,
            self.deals_failed,
        )
    }
}

/// Accumulates stats while a round is in progress
#[derive(Debug, Clone)]
pub struct RoundStatsBuilder {
    stats: RoundStats,
    start_time: Instant,
}

impl RoundStatsBuilder {
    pub fn new() -> Self {
        Self {
            stats: RoundStats::new(),
            start_time: Instant::now(),
        }
    }

    pub fn record_ask(&mut self) {
        self.stats.asks_seen += 1;
    }

    pub fn record_decode_errors(&mut self, n: usize) {
        self.stats.decode_errors += n;
    }

    pub fn record_not_allowed(&mut self) {
        self.stats.not_allowed += 1;
    }

    pub fn record_superseded(&mut self) {
        self.stats.superseded += 1;
    }

    pub fn record_selected(&mut self, n: usize) {
        self.stats.selected = n;
    }

    pub fn record_deal_attempt(&mut self) {
        self.stats.deals_attempted += 1;
    }

    pub fn record_deal_success(&mut self) {
        self.stats.deals_completed += 1;
    }

    pub fn record_deal_failure(&mut self) {
        self.stats.deals_failed += 1;
    }

    /// Finalize and return the stats
    pub fn finish(mut self) -> RoundStats {
        self.stats.duration = Some(self.start_time.elapsed());
        self.stats
    }

    pub fn stats(&self) -> &RoundStats {
        &self.stats
    }
}

impl Default for RoundStatsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Totals over the lifetime of a loop run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopReport {
    pub rounds: usize,
    pub idle_rounds: usize,
    pub source_failures: usize,
    pub faulted_rounds: usize,
    pub deals_completed: usize,
    pub deals_failed: usize,
}

impl LoopReport {
    pub fn absorb(&mut self, stats: &RoundStats) {
        self.deals_completed += stats.deals_completed;
        self.deals_failed += stats.deals_failed;
    }

    pub fn summary(&self) -> String {
        format!(
            "{} rounds ({} idle, {} source failures, {} faulted) | {} deals complete | {} deals failed",
            self.rounds,
            self.idle_rounds,
            self.source_failures,
            self.faulted_rounds,
            self.deals_completed,
            self.deals_failed
        )
    }
}
