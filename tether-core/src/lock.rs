//! Keyed mutual exclusion
//!
//! A [`KeyedLockManager`] hands out one async mutex per key (a parent-object
//! id). Holders of the same key are serialized; distinct keys never contend.
//!
//! Entries are created on first use and never evicted, so the table grows with
//! the number of distinct parent objects touched during the process lifetime.
//!
//! There is no acquisition timeout. A holder that never finishes its critical
//! section (a hung network call, for instance) blocks every other caller of
//! the same key indefinitely.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-key locks
///
/// Owned by the provider runtime and shared (via `Arc`) with every
/// orchestrator that mutates remote parent objects.
#[derive(Debug, Default)]
pub struct KeyedLockManager {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other holder has `key`, then take it
    ///
    /// The lock is released when the returned guard is dropped, which covers
    /// early returns and `?` propagation inside the critical section.
    pub async fn acquire(&self, key: &str) -> KeyedLockGuard {
        // Clone the Arc out so the shard lock is not held across the await.
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        log::debug!("waiting for lock on {}", key);
        let guard = mutex.lock_owned().await;
        log::debug!("acquired lock on {}", key);

        KeyedLockGuard {
            key: key.to_string(),
            _guard: guard,
        }
    }

    /// Number of distinct keys seen so far
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held lock for one key; dropping it releases the key
#[derive(Debug)]
pub struct KeyedLockGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl KeyedLockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyedLockGuard {
    fn drop(&mut self) {
        log::debug!("released lock on {}", self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = KeyedLockManager::new();

        let guard = locks.acquire("app1").await;
        assert_eq!(guard.key(), "app1");

        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire("app1")).await;
        assert!(second.is_err(), "second acquire should block while held");

        drop(guard);
        let third = tokio::time::timeout(Duration::from_millis(500), locks.acquire("app1")).await;
        assert!(third.is_ok(), "acquire should succeed after release");
    }

    #[tokio::test]
    async fn distinct_keys_do_not_contend() {
        let locks = KeyedLockManager::new();

        let _a = locks.acquire("app1").await;
        let b = tokio::time::timeout(Duration::from_millis(500), locks.acquire("app2")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn entries_are_not_evicted() {
        let locks = KeyedLockManager::new();
        assert!(locks.is_empty());

        drop(locks.acquire("app1").await);
        drop(locks.acquire("app1").await);
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn critical_sections_never_overlap() {
        let locks = Arc::new(KeyedLockManager::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("shared").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn released_on_early_return() {
        async fn failing(locks: &KeyedLockManager) -> Result<(), String> {
            let _guard = locks.acquire("app1").await;
            Err::<(), _>("remote failure".to_string())?;
            Ok(())
        }

        let locks = KeyedLockManager::new();
        assert!(failing(&locks).await.is_err());

        let again = tokio::time::timeout(Duration::from_millis(500), locks.acquire("app1")).await;
        assert!(again.is_ok());
    }
}
