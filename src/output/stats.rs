//! Run tally
//!
//! The tally is a plain value folded by the orchestrator, one outcome per
//! target. It never lives in shared mutable state.

use crate::scanner::TargetOutcome;
use std::fmt;

/// Success and failure counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    /// Targets whose document was saved, with or without a snapshot
    pub success: u64,

    /// Targets whose fetch or document write failed
    pub failure: u64,
}

impl Tally {
    /// Counts one target's outcome
    pub fn record(&mut self, outcome: &TargetOutcome) {
        if outcome.is_success() {
            self.success += 1;
        } else {
            self.failure += 1;
        }
    }

    /// Number of targets counted so far
    pub fn total(&self) -> u64 {
        self.success + self.failure
    }

    /// Percentage of targets with a saved document
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            (self.success as f64 / self.total() as f64) * 100.0
        }
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OK={} ERR={}", self.success, self.failure)
    }
}
