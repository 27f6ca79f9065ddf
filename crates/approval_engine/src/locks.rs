//! Per-merge-request serialization.
//!
//! Resets and approval grants on the same merge request must not interleave:
//! a grant landing between "load approvals" and "delete approvals" would
//! otherwise be lost or deleted by a plan that never saw it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::MergeRequestId;

#[cfg(test)]
#[path = "locks_tests.rs"]
mod tests;

/// Async mutexes keyed by merge request.
///
/// Share one instance (behind an `Arc`) between every component that mutates
/// approvals.
#[derive(Debug, Default)]
pub struct MergeRequestLocks {
    locks: Mutex<HashMap<MergeRequestId, Arc<AsyncMutex<()>>>>,
}

impl MergeRequestLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to a merge request.
    pub async fn lock(&self, merge_request: MergeRequestId) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Drop entries nobody holds or waits on.
            locks.retain(|id, lock| *id == merge_request || Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(merge_request).or_default())
        };
        mutex.lock_owned().await
    }

    /// Number of merge requests with a live lock entry.
    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .map(|locks| locks.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}
