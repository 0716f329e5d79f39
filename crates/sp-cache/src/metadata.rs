//! Remote metadata cache.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

struct Entry<T> {
    value: Arc<T>,
    fetched_at: DateTime<Utc>,
}

/// Metadata keyed by entity id.
///
/// Readers get an `Arc` snapshot. A refresh swaps the `Arc` stored under the
/// key; readers holding the previous snapshot keep seeing it unchanged.
/// Fetching fresh documents is the caller's job: [`stale_entity_ids`]
/// reports what is due.
///
/// [`stale_entity_ids`]: Self::stale_entity_ids
pub struct MetadataCache<T> {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry<T>>>,
}

impl<T> MetadataCache<T> {
    /// Creates an empty cache whose entries go stale after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the configured TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stores `value` fetched at `fetched_at`, returning the snapshot it replaced.
    pub fn replace_at(
        &self,
        entity_id: impl Into<String>,
        value: T,
        fetched_at: DateTime<Utc>,
    ) -> Option<Arc<T>> {
        let entity_id = entity_id.into();
        tracing::debug!(entity_id = %entity_id, "replacing cached metadata");
        self.entries
            .write()
            .insert(
                entity_id,
                Entry {
                    value: Arc::new(value),
                    fetched_at,
                },
            )
            .map(|old| old.value)
    }

    /// Stores `value` as fetched now.
    pub fn replace(&self, entity_id: impl Into<String>, value: T) -> Option<Arc<T>> {
        self.replace_at(entity_id, value, Utc::now())
    }

    /// Returns the current snapshot, stale or not.
    #[must_use]
    pub fn get(&self, entity_id: &str) -> Option<Arc<T>> {
        self.entries
            .read()
            .get(entity_id)
            .map(|entry| Arc::clone(&entry.value))
    }

    /// Returns the snapshot only if it is still within its TTL at `now`.
    #[must_use]
    pub fn get_fresh(&self, entity_id: &str, now: DateTime<Utc>) -> Option<Arc<T>> {
        self.entries
            .read()
            .get(entity_id)
            .filter(|entry| now < entry.fetched_at + self.ttl)
            .map(|entry| Arc::clone(&entry.value))
    }

    /// Lists entity ids whose entries have reached their TTL at `now`.
    #[must_use]
    pub fn stale_entity_ids(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(_, entry)| now >= entry.fetched_at + self.ttl)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Drops an entry.
    pub fn remove(&self, entity_id: &str) -> Option<Arc<T>> {
        self.entries.write().remove(entity_id).map(|entry| entry.value)
    }

    /// Number of cached entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
