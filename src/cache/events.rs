//! Cache event system.
//!
//! Catalog changes are published as events and consumed in batches by the
//! invalidation consumer.

use std::collections::{BTreeSet, VecDeque};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, gauge};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::products::PRODUCT_DOMAIN;

use super::config::CacheConfig;
use super::lock::mutex_lock;
use super::tags::{Tag, TagMode};

const SOURCE: &str = "cache::events";
const METRIC_QUEUE_LEN: &str = "catalog_fragment_event_queue_len";
const METRIC_DROPPED: &str = "catalog_fragment_event_dropped_total";

/// Monotonic sequence number of an event within this process.
pub type Epoch = u64;

#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier for idempotency (UUIDv4).
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Catalog changes that invalidate cached fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// An existing product was updated.
    ProductSaved { product_id: Uuid },
    /// A product was added; lists by category may now include it.
    ProductCreated,
    ProductDeleted { product_id: Uuid },
    /// Drop every cached fragment.
    CatalogFlushed,
}

impl EventKind {
    /// Tags whose fragments this change makes stale. Empty for a flush.
    pub fn tags(&self) -> BTreeSet<Tag> {
        match self {
            EventKind::ProductSaved { product_id } => BTreeSet::from([Tag::product(*product_id)]),
            EventKind::ProductCreated => BTreeSet::from([Tag::category(PRODUCT_DOMAIN)]),
            EventKind::ProductDeleted { product_id } => BTreeSet::from([
                Tag::product(*product_id),
                Tag::category(PRODUCT_DOMAIN),
            ]),
            EventKind::CatalogFlushed => BTreeSet::new(),
        }
    }

    /// Tags to drop when fragments were tagged under `mode`. Aggregate
    /// fragments only carry domain tags, so entity changes widen to the domain.
    pub fn tags_for(&self, mode: TagMode) -> BTreeSet<Tag> {
        match (mode, self) {
            (
                TagMode::Aggregate,
                EventKind::ProductSaved { .. } | EventKind::ProductDeleted { .. },
            ) => BTreeSet::from([Tag::category(PRODUCT_DOMAIN)]),
            _ => self.tags(),
        }
    }

    pub fn is_flush(&self) -> bool {
        matches!(self, EventKind::CatalogFlushed)
    }
}

/// Bounded in-memory event queue; the oldest events are dropped on overflow.
pub struct EventQueue {
    queue: Mutex<VecDeque<CacheEvent>>,
    epoch_counter: AtomicU64,
    limit: NonZeroUsize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::new_with_limit(CacheConfig::default().event_queue_limit_non_zero())
    }

    pub fn new_with_limit(limit: NonZeroUsize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
            limit,
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn publish(&self, kind: EventKind) {
        let epoch = self.next_epoch();
        let event = CacheEvent::new(kind.clone(), epoch);

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = ?kind,
            "Cache event enqueued"
        );

        let mut queue = mutex_lock(&self.queue, SOURCE, "publish");
        while queue.len() >= self.limit.get() {
            if let Some(dropped) = queue.pop_front() {
                counter!(METRIC_DROPPED).increment(1);
                warn!(
                    event_id = %dropped.id,
                    event_epoch = dropped.epoch,
                    "Cache event queue full, dropped oldest event"
                );
            }
        }
        queue.push_back(event);
        gauge!(METRIC_QUEUE_LEN).set(queue.len() as f64);
    }

    /// Drain up to `limit` events in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<CacheEvent> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        let events = queue.drain(..count).collect();
        gauge!(METRIC_QUEUE_LEN).set(queue.len() as f64);
        events
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        mutex_lock(&self.queue, SOURCE, "clear").clear();
        gauge!(METRIC_QUEUE_LEN).set(0.0);
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    #[test]
    fn epoch_monotonicity() {
        let queue = EventQueue::new();

        let e1 = queue.next_epoch();
        let e2 = queue.next_epoch();
        assert!(e1 < e2);
    }

    #[test]
    fn default_queue_uses_configured_limit() {
        let queue = EventQueue::new();
        let limit = CacheConfig::default().event_queue_limit;
        for _ in 0..=limit {
            queue.publish(EventKind::ProductCreated);
        }
        assert_eq!(queue.len(), limit);
    }

    #[test]
    fn publish_and_drain_fifo() {
        let queue = EventQueue::new();
        let id = Uuid::new_v4();

        queue.publish(EventKind::ProductCreated);
        queue.publish(EventKind::ProductSaved { product_id: id });
        queue.publish(EventKind::CatalogFlushed);
        assert_eq!(queue.len(), 3);

        let events = queue.drain(2);
        assert_eq!(events.len(), 2);
        assert_eq!(queue.len(), 1);
        assert_eq!(events[0].kind, EventKind::ProductCreated);
        assert_eq!(events[1].kind, EventKind::ProductSaved { product_id: id });
    }

    #[test]
    fn overflow_drops_oldest() {
        let queue = EventQueue::new_with_limit(NonZeroUsize::MIN);

        queue.publish(EventKind::ProductCreated);
        queue.publish(EventKind::CatalogFlushed);

        let events = queue.drain(10);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::CatalogFlushed);
    }

    #[test]
    fn event_tags() {
        let id = Uuid::new_v4();

        assert_eq!(
            EventKind::ProductSaved { product_id: id }.tags(),
            BTreeSet::from([Tag::product(id)])
        );
        assert_eq!(
            EventKind::ProductDeleted { product_id: id }.tags(),
            BTreeSet::from([Tag::product(id), Tag::category("product")])
        );
        assert_eq!(
            EventKind::ProductCreated.tags(),
            BTreeSet::from([Tag::category("product")])
        );
        assert!(EventKind::CatalogFlushed.tags().is_empty());
        assert!(EventKind::CatalogFlushed.is_flush());
    }

    #[test]
    fn event_queue_recovers_from_poisoned_lock() {
        let queue = EventQueue::new();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = queue.queue.lock().expect("queue lock should be acquired");
            panic!("poison queue lock");
        }));

        queue.publish(EventKind::ProductCreated);
        assert_eq!(queue.len(), 1);
    }
}
