//! Cache consumer for executing invalidation plans.
//!
//! Drains events from the queue and drops the affected fragments.

use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::config::CacheConfig;
use super::events::EventQueue;
use super::planner::InvalidationPlan;
use super::store::FragmentStore;

const METRIC_CACHE_CONSUME_MS: &str = "catalog_fragment_cache_consume_ms";

pub struct InvalidationConsumer {
    config: CacheConfig,
    queue: Arc<EventQueue>,
    store: Arc<dyn FragmentStore>,
}

impl InvalidationConsumer {
    pub fn new(config: CacheConfig, queue: Arc<EventQueue>, store: Arc<dyn FragmentStore>) -> Self {
        Self {
            config,
            queue,
            store,
        }
    }

    /// Consume one batch of pending events.
    ///
    /// Returns the number of fragments removed. Store failures are logged and
    /// count as nothing removed.
    #[instrument(skip(self))]
    pub async fn consume(&self) -> usize {
        let consume_started_at = Instant::now();
        let events = self.queue.drain(self.config.consume_batch_limit);
        if events.is_empty() {
            return 0;
        }

        let event_ids: Vec<Uuid> = events.iter().map(|event| event.id).collect();
        let plan = InvalidationPlan::from_events(events, self.config.tag_mode());

        info!(
            event_ids = ?event_ids,
            plan = %plan,
            "Cache consumption starting"
        );

        let result = if plan.flush {
            self.store.clear().await
        } else if plan.invalidate_tags.is_empty() {
            Ok(0)
        } else {
            self.store.invalidate_tags(&plan.invalidate_tags).await
        };

        let invalidated = match result {
            Ok(count) => count,
            Err(err) => {
                warn!(error = %err, plan = %plan, "Cache invalidation failed");
                0
            }
        };

        info!(
            event_count = plan.event_count,
            invalidated, "Cache consumption complete"
        );

        histogram!(
            METRIC_CACHE_CONSUME_MS,
            "mode" => if plan.flush { "flush" } else { "tags" }
        )
        .record(consume_started_at.elapsed().as_secs_f64() * 1000.0);

        invalidated
    }

    /// Consume until the queue is empty; returns the total removed.
    pub async fn consume_all(&self) -> usize {
        let mut total = 0;
        while !self.queue.is_empty() {
            total += self.consume().await;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::cache::events::EventKind;
    use crate::cache::keys::{FragmentKey, Section};
    use crate::cache::store::{CacheEntry, MemoryFragmentStore};
    use crate::cache::tags::{Annotation, Tag};

    fn key(uid: &str) -> FragmentKey {
        FragmentKey::new(Section::Body, uid, &BTreeMap::new(), "catalog.product", &())
    }

    fn tagged(tags: &[Tag]) -> CacheEntry {
        let mut annotation = Annotation::new();
        for tag in tags {
            annotation.add_tag(tag.clone());
        }
        CacheEntry::new("<ul/>", &annotation)
    }

    async fn setup() -> (Arc<EventQueue>, Arc<MemoryFragmentStore>, InvalidationConsumer, Uuid) {
        let config = CacheConfig::default();
        let queue = Arc::new(EventQueue::new());
        let store = Arc::new(MemoryFragmentStore::new(&config));
        let product_id = Uuid::new_v4();

        store
            .set(key("a"), tagged(&[Tag::product(product_id), Tag::category("product")]))
            .await
            .expect("set a");
        store
            .set(key("b"), tagged(&[Tag::category("product")]))
            .await
            .expect("set b");

        let consumer = InvalidationConsumer::new(config, queue.clone(), store.clone());
        (queue, store, consumer, product_id)
    }

    #[tokio::test]
    async fn saved_product_drops_its_fragments() {
        let (queue, store, consumer, product_id) = setup().await;

        queue.publish(EventKind::ProductSaved { product_id });
        assert_eq!(consumer.consume().await, 1);

        assert!(!store.contains(&key("a")));
        assert!(store.contains(&key("b")));
    }

    #[tokio::test]
    async fn created_product_drops_category_fragments() {
        let (queue, store, consumer, _) = setup().await;

        queue.publish(EventKind::ProductCreated);
        assert_eq!(consumer.consume().await, 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn flush_clears_store() {
        let (queue, store, consumer, _) = setup().await;

        queue.publish(EventKind::CatalogFlushed);
        assert_eq!(consumer.consume_all().await, 2);
        assert!(store.is_empty());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn empty_queue_is_noop() {
        let (_, store, consumer, _) = setup().await;
        assert_eq!(consumer.consume().await, 0);
        assert_eq!(store.len(), 2);
    }
}
