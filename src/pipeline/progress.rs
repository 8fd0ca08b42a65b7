//! Lock-free progress counters, safe to poll from any thread.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotone counters shared by the pipeline stages.
#[derive(Debug, Default)]
pub struct Progress {
    instances_read: AtomicU64,
    signatures_produced: AtomicU64,
    instances_committed: AtomicU64,
    files_done: AtomicU64,
    chunks_committed: AtomicU64,
}

/// Plain copy of [`Progress`] at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub instances_read: u64,
    pub signatures_produced: u64,
    pub instances_committed: u64,
    pub files_done: u64,
    pub chunks_committed: u64,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            instances_read: self.instances_read.load(Ordering::Relaxed),
            signatures_produced: self.signatures_produced.load(Ordering::Relaxed),
            instances_committed: self.instances_committed.load(Ordering::Relaxed),
            files_done: self.files_done.load(Ordering::Relaxed),
            chunks_committed: self.chunks_committed.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn add_read(&self, n: u64) {
        self.instances_read.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_signed(&self, n: u64) {
        self.signatures_produced.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_committed(&self, n: u64) {
        self.instances_committed.fetch_add(n, Ordering::Relaxed);
        self.chunks_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// `total` is the running count of one source; never moves backwards.
    pub(crate) fn record_files_done(&self, base: u64, total: u64) {
        self.files_done.fetch_max(base + total, Ordering::Relaxed);
    }
}

impl ProgressSnapshot {
    /// Counter deltas since `earlier`.
    pub fn since(&self, earlier: &ProgressSnapshot) -> ProgressSnapshot {
        ProgressSnapshot {
            instances_read: self.instances_read - earlier.instances_read,
            signatures_produced: self.signatures_produced - earlier.signatures_produced,
            instances_committed: self.instances_committed - earlier.instances_committed,
            files_done: self.files_done - earlier.files_done,
            chunks_committed: self.chunks_committed - earlier.chunks_committed,
        }
    }

    /// Every instance read has been committed.
    pub fn is_settled(&self) -> bool {
        self.instances_read == self.instances_committed
    }
}
