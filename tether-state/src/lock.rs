//! State lock record
//!
//! `apply`, `destroy` and `import` write a [`LockInfo`] next to the state
//! file before touching it. A record whose lease has run out was left by a
//! run that died halfway; the next run may take it over instead of failing
//! until someone force-unlocks.
//!
//! This lock keeps two Tether processes apart. Writes to one remote object
//! from inside a single process are serialized by
//! `tether_core::lock::KeyedLockManager`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lease of a fresh lock, in seconds (15 minutes)
pub const DEFAULT_LOCK_TIMEOUT_SECS: i64 = 900;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockInfo {
    pub id: String,
    /// Command holding the lock ("apply", "destroy", "import")
    pub operation: String,
    /// username@hostname
    pub who: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl LockInfo {
    pub fn new(operation: impl Into<String>) -> Self {
        Self::with_timeout(operation, DEFAULT_LOCK_TIMEOUT_SECS)
    }

    /// A lock whose lease lasts `timeout_secs`; negative values yield an
    /// already expired record
    pub fn with_timeout(operation: impl Into<String>, timeout_secs: i64) -> Self {
        Self::issued_at(operation, Utc::now(), Duration::seconds(timeout_secs))
    }

    fn issued_at(operation: impl Into<String>, now: DateTime<Utc>, lease: Duration) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation: operation.into(),
            who: lock_owner(),
            created: now,
            expires: now + lease,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires
    }

    /// e.g. `apply by alice@ci-3 (lock 6f1c…), expires 2024-05-01T10:15:00Z`
    pub fn describe(&self) -> String {
        format!(
            "{} by {} (lock {}), expires {}",
            self.operation,
            self.who,
            self.id,
            self.expires.to_rfc3339()
        )
    }
}

/// What was found in a lock file that blocked a fresh lock
#[derive(Debug)]
pub enum ExistingLock {
    /// Another run holds a live lease
    Held(LockInfo),
    /// The lease ran out; its owner is presumed dead
    Expired(LockInfo),
    /// The file is there but is not a lock record
    Unreadable(String),
    /// The file disappeared before it could be read
    Gone,
}

impl ExistingLock {
    /// Classify the result of reading a lock file at `now`
    pub fn inspect(found: Result<Option<LockInfo>, String>, now: DateTime<Utc>) -> Self {
        match found {
            Ok(Some(lock)) if lock.is_expired_at(now) => Self::Expired(lock),
            Ok(Some(lock)) => Self::Held(lock),
            Ok(None) => Self::Gone,
            Err(reason) => Self::Unreadable(reason),
        }
    }

    /// Only a live lease keeps the next run out
    pub fn can_take_over(&self) -> bool {
        !matches!(self, Self::Held(_))
    }
}

fn lock_owner() -> String {
    let username = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    format!("{}@{}", username, hostname)
}
