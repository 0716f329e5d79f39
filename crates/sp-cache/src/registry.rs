//! Issued request id registry.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::error::{CacheError, CacheResult};

/// Ids of requests the local party sent.
///
/// Registering an id that is already live is a replay signal and must fail
/// rather than overwrite.
pub trait IssuedRequestRegistry: Send + Sync {
    /// Records `id` as issued at `issued_at`.
    fn register(&self, id: &str, issued_at: DateTime<Utc>) -> CacheResult<()>;

    /// Returns true if `id` was issued and has not expired at `now`.
    fn contains(&self, id: &str, now: DateTime<Utc>) -> bool;

    /// Removes `id` so it cannot be answered twice.
    fn consume(&self, id: &str, now: DateTime<Utc>) -> CacheResult<()>;

    /// Drops expired ids, returning how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> usize;
}

/// Process-local registry.
pub struct InMemoryRequestRegistry {
    ttl: Duration,
    issued: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryRequestRegistry {
    /// Creates a registry whose ids expire `ttl` after issue.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            issued: Mutex::new(HashMap::new()),
        }
    }

    fn is_live(&self, issued_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now < issued_at + self.ttl
    }

    /// Number of tracked ids, expired ones included until purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.issued.lock().len()
    }

    /// Returns true if no ids are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issued.lock().is_empty()
    }
}

impl IssuedRequestRegistry for InMemoryRequestRegistry {
    fn register(&self, id: &str, issued_at: DateTime<Utc>) -> CacheResult<()> {
        let mut issued = self.issued.lock();
        if let Some(existing) = issued.get(id) {
            if self.is_live(*existing, issued_at) {
                tracing::warn!(request_id = id, "duplicate request id registration");
                return Err(CacheError::Duplicate(id.to_string()));
            }
        }
        issued.insert(id.to_string(), issued_at);
        Ok(())
    }

    fn contains(&self, id: &str, now: DateTime<Utc>) -> bool {
        self.issued
            .lock()
            .get(id)
            .is_some_and(|issued_at| self.is_live(*issued_at, now))
    }

    fn consume(&self, id: &str, now: DateTime<Utc>) -> CacheResult<()> {
        match self.issued.lock().remove(id) {
            Some(issued_at) if self.is_live(issued_at, now) => Ok(()),
            _ => Err(CacheError::NotFound(id.to_string())),
        }
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut issued = self.issued.lock();
        let before = issued.len();
        issued.retain(|_, issued_at| now < *issued_at + self.ttl);
        before - issued.len()
    }
}
