//! Short-lived exclusive locks keyed by payment id
//!
//! The contract mirrors a redis `SET NX EX`: best-effort, fail-closed —
//! when the service cannot answer, `acquire` returns `false` and the
//! event is declined rather than risking a double credit. Locks expire on
//! their own; a crashed handler never blocks retries for longer than the
//! TTL.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::fmt;

/// Distributed lock service boundary
pub trait LockService: Send + Sync {
    /// Try to take the lock; `false` when held or unavailable.
    fn acquire(&self, key: &str, ttl_seconds: u64) -> bool;

    /// Release the lock early (failure paths only).
    fn release(&self, key: &str);
}

/// In-process TTL lock table for tests and single-node deployments
#[derive(Default)]
pub struct InMemoryLockService {
    held: DashMap<String, DateTime<Utc>>,
}

impl fmt::Debug for InMemoryLockService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryLockService")
            .field("held", &self.held.len())
            .finish()
    }
}

impl InMemoryLockService {
    /// Empty lock table.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockService for InMemoryLockService {
    fn acquire(&self, key: &str, ttl_seconds: u64) -> bool {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(ttl_seconds as i64);

        let mut acquired = false;
        let mut entry = self.held.entry(key.to_string()).or_insert_with(|| {
            acquired = true;
            expires_at
        });
        if !acquired && *entry < now {
            // previous holder's TTL lapsed
            *entry = expires_at;
            acquired = true;
        }
        acquired
    }

    fn release(&self, key: &str) {
        self.held.remove(key);
    }
}
