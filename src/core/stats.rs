use std::sync::atomic::{AtomicU64, Ordering};
use serde::{Serialize, Deserialize};

/// Live counters shared between the coordinator handle and its event loop
#[derive(Debug, Default)]
pub struct CoordinatorCounters {
    pub queries_started: AtomicU64,
    pub queries_completed: AtomicU64,
    pub queries_queued: AtomicU64,
    pub tasks_dispatched: AtomicU64,
    pub tasks_backlogged: AtomicU64,
    pub stale_responses: AtomicU64,
    pub queries_failed: AtomicU64,
}

impl CoordinatorCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CoordinatorStats {
        CoordinatorStats {
            queries_started: self.queries_started.load(Ordering::Relaxed),
            queries_completed: self.queries_completed.load(Ordering::Relaxed),
            queries_queued: self.queries_queued.load(Ordering::Relaxed),
            tasks_dispatched: self.tasks_dispatched.load(Ordering::Relaxed),
            tasks_backlogged: self.tasks_backlogged.load(Ordering::Relaxed),
            stale_responses: self.stale_responses.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the coordinator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorStats {
    pub queries_started: u64,
    pub queries_completed: u64,
    // Searches that had to wait behind an in-flight query
    pub queries_queued: u64,
    pub tasks_dispatched: u64,
    pub tasks_backlogged: u64,
    pub stale_responses: u64,
    pub queries_failed: u64,
}

impl CoordinatorStats {
    pub fn queries_in_flight(&self) -> u64 {
        self.queries_started.saturating_sub(self.queries_completed)
    }
}
