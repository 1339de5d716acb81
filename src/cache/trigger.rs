//! Cache trigger service.
//!
//! Publishes catalog change events and optionally consumes them right away.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::config::CacheConfig;
use super::consumer::InvalidationConsumer;
use super::events::{EventKind, EventQueue};

pub struct CacheTrigger {
    config: CacheConfig,
    queue: Arc<EventQueue>,
    consumer: Arc<InvalidationConsumer>,
}

impl CacheTrigger {
    pub fn new(
        config: CacheConfig,
        queue: Arc<EventQueue>,
        consumer: Arc<InvalidationConsumer>,
    ) -> Self {
        Self {
            config,
            queue,
            consumer,
        }
    }

    /// Publish an event; with `consume_now` the pending batch is consumed
    /// before returning. Returns the number of fragments removed.
    pub async fn trigger(&self, kind: EventKind, consume_now: bool) -> usize {
        if !self.config.enabled {
            debug!(event_kind = ?kind, "Cache trigger skipped: cache disabled");
            return 0;
        }

        self.queue.publish(kind);

        if consume_now {
            self.consumer.consume_all().await
        } else {
            0
        }
    }

    pub async fn product_saved(&self, product_id: Uuid) -> usize {
        self.trigger(EventKind::ProductSaved { product_id }, true)
            .await
    }

    pub async fn product_created(&self) -> usize {
        self.trigger(EventKind::ProductCreated, true).await
    }

    pub async fn product_deleted(&self, product_id: Uuid) -> usize {
        self.trigger(EventKind::ProductDeleted { product_id }, true)
            .await
    }

    pub async fn flush(&self) -> usize {
        self.trigger(EventKind::CatalogFlushed, true).await
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }
}
