//! Fragment cache configuration.

use std::num::NonZeroUsize;

use serde::Deserialize;

use super::tags::TagMode;

const DEFAULT_CAPACITY: usize = 500;
const DEFAULT_CONSUME_BATCH_LIMIT: usize = 100;
const DEFAULT_EVENT_QUEUE_LIMIT: usize = 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve and store fragments through the cache.
    pub enabled: bool,
    /// Maximum fragments held by the in-memory store.
    pub capacity: usize,
    /// Tag every entity individually instead of only its domain.
    pub tag_all: bool,
    /// Maximum invalidation events handled per consumption batch.
    pub consume_batch_limit: usize,
    /// Pending invalidation events kept before the oldest are dropped.
    pub event_queue_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            tag_all: true,
            consume_batch_limit: DEFAULT_CONSUME_BATCH_LIMIT,
            event_queue_limit: DEFAULT_EVENT_QUEUE_LIMIT,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity,
            tag_all: settings.tag_all,
            ..Self::default()
        }
    }
}

impl CacheConfig {
    /// Returns the store capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn tag_mode(&self) -> TagMode {
        if self.tag_all {
            TagMode::PerEntity
        } else {
            TagMode::Aggregate
        }
    }

    /// Returns the event queue limit, never below one.
    pub fn event_queue_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.event_queue_limit).unwrap_or(NonZeroUsize::MIN)
    }
}
