//! Relay counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free counters shared across the pipeline workers.
#[derive(Debug, Default)]
pub struct RelayStats {
    chunks_played: AtomicU64,
    groups_skipped: AtomicU64,
    errors: AtomicU64,
}

impl RelayStats {
    pub fn record_played(&self) {
        self.chunks_played.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.groups_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            chunks_played: self.chunks_played.load(Ordering::Relaxed),
            groups_skipped: self.groups_skipped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub chunks_played: u64,
    pub groups_skipped: u64,
    pub errors: u64,
}
