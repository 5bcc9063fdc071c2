//! Connection state and statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepting submissions.
    Open,
    /// Closed by the caller.
    Closed,
    /// Stopped by a fatal engine failure.
    Failed,
}

impl ConnectionState {
    /// Returns true if submissions are accepted.
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

/// Statistics about a connection or a pool of connections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Requests the engine accepted.
    pub submitted: u64,
    /// Requests the engine refused.
    pub rejected: u64,
    /// Completions delivered to a pending operation.
    pub completions: u64,
    /// Completions whose id was not pending.
    pub orphaned: u64,
    /// Polls that reported nothing.
    pub idle_polls: u64,
    /// Operations pending when the snapshot was taken.
    pub pending: u64,
}

impl ConnectionStats {
    /// Adds `other` into `self`.
    pub fn merge(&mut self, other: &ConnectionStats) {
        self.submitted += other.submitted;
        self.rejected += other.rejected;
        self.completions += other.completions;
        self.orphaned += other.orphaned;
        self.idle_polls += other.idle_polls;
        self.pending += other.pending;
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) submitted: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) completions: AtomicU64,
    pub(crate) orphaned: AtomicU64,
    pub(crate) idle_polls: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, pending: usize) -> ConnectionStats {
        ConnectionStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            completions: self.completions.load(Ordering::Relaxed),
            orphaned: self.orphaned.load(Ordering::Relaxed),
            idle_polls: self.idle_polls.load(Ordering::Relaxed),
            pending: pending as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_checks() {
        assert!(ConnectionState::Open.is_open());
        assert!(!ConnectionState::Closed.is_open());
        assert!(!ConnectionState::Failed.is_open());
    }

    #[test]
    fn stats_merge() {
        let counters = StatsCounters::default();
        StatsCounters::bump(&counters.submitted);
        StatsCounters::bump(&counters.submitted);
        StatsCounters::bump(&counters.completions);

        let mut total = counters.snapshot(1);
        total.merge(&counters.snapshot(0));
        assert_eq!(total.submitted, 4);
        assert_eq!(total.completions, 2);
        assert_eq!(total.pending, 1);
    }
}
