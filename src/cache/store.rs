//! Fragment storage.
//!
//! The store is a port so deployments can swap the in-memory LRU for a
//! shared backend. Entries carry their tags and expiry; expired entries are
//! never served.

use std::collections::{BTreeSet, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use super::config::CacheConfig;
use super::keys::FragmentKey;
use super::lock::{rw_read, rw_write};
use super::registry::TagRegistry;
use super::tags::{Annotation, Tag};

const SOURCE: &str = "cache::store";
const METRIC_EVICT: &str = "catalog_fragment_cache_evict_total";
const METRIC_INVALIDATED: &str = "catalog_fragment_cache_invalidated_total";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub content: String,
    pub tags: BTreeSet<Tag>,
    pub expires_at: Option<OffsetDateTime>,
}

impl CacheEntry {
    pub fn new(content: impl Into<String>, annotation: &Annotation) -> Self {
        Self {
            content: content.into(),
            tags: annotation.tags().clone(),
            expires_at: annotation.expires_at(),
        }
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("fragment store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait FragmentStore: Send + Sync {
    /// Content of a live entry, or `None` when absent or expired.
    async fn get(&self, key: &FragmentKey) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: FragmentKey, entry: CacheEntry) -> Result<(), StoreError>;

    /// Drop every entry carrying any of `tags`; returns how many went.
    async fn invalidate_tags(&self, tags: &BTreeSet<Tag>) -> Result<usize, StoreError>;

    async fn clear(&self) -> Result<usize, StoreError>;
}

/// Bounded in-process store.
///
/// Lock order is `entries` before the registry's maps.
pub struct MemoryFragmentStore {
    entries: RwLock<LruCache<FragmentKey, CacheEntry>>,
    registry: TagRegistry,
}

impl MemoryFragmentStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
            registry: TagRegistry::new(),
        }
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &FragmentKey) -> bool {
        rw_read(&self.entries, SOURCE, "contains").contains(key)
    }

    /// Entry as stored, without touching recency or expiry.
    pub fn peek(&self, key: &FragmentKey) -> Option<CacheEntry> {
        rw_read(&self.entries, SOURCE, "peek").peek(key).cloned()
    }

    fn get_at(&self, key: &FragmentKey, now: OffsetDateTime) -> Option<String> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let entry = entries.get(key)?;
        if !entry.is_expired_at(now) {
            return Some(entry.content.clone());
        }

        entries.pop(key);
        self.registry.unregister(key);
        debug!(cache = "fragment", key = %key, "dropped expired fragment");
        None
    }

    fn remove_keys(&self, keys: HashSet<FragmentKey>) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "remove_keys");
        let mut removed = 0;
        for key in keys {
            if entries.pop(&key).is_some() {
                removed += 1;
            }
            self.registry.unregister(&key);
        }
        removed
    }
}

#[async_trait]
impl FragmentStore for MemoryFragmentStore {
    async fn get(&self, key: &FragmentKey) -> Result<Option<String>, StoreError> {
        Ok(self.get_at(key, OffsetDateTime::now_utc()))
    }

    async fn set(&self, key: FragmentKey, entry: CacheEntry) -> Result<(), StoreError> {
        let tags = entry.tags.clone();
        let mut entries = rw_write(&self.entries, SOURCE, "set");

        let evicted = entries.push(key.clone(), entry);
        if let Some((evicted_key, _)) = evicted
            && evicted_key != key
        {
            self.registry.unregister(&evicted_key);
            counter!(METRIC_EVICT).increment(1);
            debug!(cache = "fragment", key = %evicted_key, "evicted fragment");
        }

        self.registry.register(key, tags);
        Ok(())
    }

    async fn invalidate_tags(&self, tags: &BTreeSet<Tag>) -> Result<usize, StoreError> {
        let mut affected = HashSet::new();
        for tag in tags {
            affected.extend(self.registry.unregister_tag(tag));
        }

        let removed = self.remove_keys(affected);
        counter!(METRIC_INVALIDATED).increment(removed as u64);
        Ok(removed)
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        let mut entries = rw_write(&self.entries, SOURCE, "clear");
        let removed = entries.len();
        entries.clear();
        self.registry.clear();
        counter!(METRIC_INVALIDATED).increment(removed as u64);
        Ok(removed)
    }
}
