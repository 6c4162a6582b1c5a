//! Per-outcome message and byte counters.

use crate::outcome::{Outcome, OutcomeKind};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};

/// Count and byte total for one outcome kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counter {
    /// Messages.
    pub messages: u64,
    /// Bytes.
    pub bytes: u64,
}

impl Counter {
    fn add(&mut self, size: usize) {
        self.messages += 1;
        self.bytes += u64::try_from(size).unwrap_or(u64::MAX);
    }
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Delivered.
    pub sent: Counter,
    /// Discarded.
    pub dropped: Counter,
    /// Delivery failed.
    pub failed: Counter,
    /// Unparsable.
    pub rejected: Counter,
}

impl StatsSnapshot {
    /// Counter for one kind.
    #[must_use]
    pub const fn get(&self, kind: OutcomeKind) -> Counter {
        match kind {
            OutcomeKind::Sent => self.sent,
            OutcomeKind::Dropped => self.dropped,
            OutcomeKind::Failed => self.failed,
            OutcomeKind::Rejected => self.rejected,
        }
    }

    /// Messages across all kinds.
    #[must_use]
    pub const fn total_messages(&self) -> u64 {
        self.sent.messages + self.dropped.messages + self.failed.messages + self.rejected.messages
    }
}

/// Monotonic counters, updated and read under one lock.
#[derive(Debug, Default)]
pub struct Stats {
    inner: Mutex<StatsSnapshot>,
}

impl Stats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumps count and bytes for the outcome's kind.
    pub fn record(&self, outcome: Outcome) {
        let mut stats = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let counter = match outcome.kind {
            OutcomeKind::Sent => &mut stats.sent,
            OutcomeKind::Dropped => &mut stats.dropped,
            OutcomeKind::Failed => &mut stats.failed,
            OutcomeKind::Rejected => &mut stats.rejected,
        };
        counter.add(outcome.size);
    }

    /// Consistent copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
