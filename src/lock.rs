//! KeyedLock (C3)
//!
//! Per-auction mutual exclusion registry with timeout and bounded retry
//! (§4.2, §5). The lock is advisory: only components that cooperatively
//! call `with_lock` honor it. A crashed holder cannot leak the lock forever
//! because every acquisition carries its own expiry.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock busy for key {0}")]
    Busy(String),
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LockStats {
    pub acquired: u64,
    pub busy: u64,
    pub expired_reclaimed: u64,
}

struct LockEntry {
    expires_at: Instant,
}

/// Registry of per-key advisory locks.
pub struct KeyedLock {
    entries: Mutex<HashMap<String, LockEntry>>,
    stats: Mutex<LockStats>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            stats: Mutex::new(LockStats::default()),
        }
    }

    fn try_acquire(&self, key: &str, timeout: Duration) -> bool {
        let mut entries = self.entries.lock();
        let now = Instant::now();

        if let Some(entry) = entries.get(key) {
            if entry.expires_at > now {
                return false;
            }
            debug!(key, "reclaiming expired lock");
            self.stats.lock().expired_reclaimed += 1;
        }

        entries.insert(
            key.to_string(),
            LockEntry {
                expires_at: now + timeout,
            },
        );
        true
    }

    fn release(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    pub fn is_locked(&self, key: &str) -> bool {
        let entries = self.entries.lock();
        entries
            .get(key)
            .map(|e| e.expires_at > Instant::now())
            .unwrap_or(false)
    }

    pub fn stats(&self) -> LockStats {
        *self.stats.lock()
    }

    /// Acquire the lock for `key`, run `f`, release, with bounded linear
    /// backoff on contention (§4.2, §5: default timeout 500ms, max retries
    /// 3, retry delay 100ms escalating linearly).
    pub async fn with_lock<F, Fut, T>(
        &self,
        key: &str,
        timeout: Duration,
        max_retries: u32,
        retry_delay: Duration,
        f: F,
    ) -> Result<T, LockError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut attempt = 0u32;
        loop {
            if self.try_acquire(key, timeout) {
                self.stats.lock().acquired += 1;
                let result = f().await;
                self.release(key);
                return Ok(result);
            }

            attempt += 1;
            if attempt > max_retries {
                self.stats.lock().busy += 1;
                warn!(key, attempt, "lock busy after max retries");
                return Err(LockError::Busy(key.to_string()));
            }

            tokio::time::sleep(retry_delay * attempt).await;
        }
    }

    /// Drop any entries past their expiry. Intended to be driven by a
    /// periodic sweeper task so a crashed holder's lock is reclaimable even
    /// without a new contender triggering `try_acquire`.
    pub fn sweep_expired(&self) {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            self.stats.lock().expired_reclaimed += removed as u64;
        }
    }

    /// Spawn the periodic sweeper as its own task.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.sweep_expired();
            }
        })
    }
}

impl Default for KeyedLock {
    fn default() -> Self {
        Self::new()
    }
}
