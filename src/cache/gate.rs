//! Get-or-compose-render-store around one cacheable fragment.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, instrument, warn};

use crate::application::error::FragmentFault;

use super::keys::FragmentKey;
use super::store::{CacheEntry, FragmentStore};
use super::tags::Annotation;

const METRIC_HIT: &str = "catalog_fragment_cache_hit_total";
const METRIC_MISS: &str = "catalog_fragment_cache_miss_total";
const METRIC_STORE: &str = "catalog_fragment_cache_store_total";
const METRIC_DEGRADED: &str = "catalog_fragment_cache_degraded_total";

/// Freshly rendered content plus what it depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub content: String,
    pub annotation: Annotation,
}

impl Rendered {
    pub fn new(content: impl Into<String>, annotation: Annotation) -> Self {
        Self {
            content: content.into(),
            annotation,
        }
    }
}

/// A cacheable unit of output driven by [`CacheGate::render`].
#[async_trait]
pub trait Fragment: Send {
    /// Compose view state and render it.
    async fn compose(&mut self) -> Result<Rendered, FragmentFault>;

    /// Output for a failed composition, built from partial state.
    fn degrade(&mut self, fault: FragmentFault) -> String;

    /// Per-request adjustments applied to cached content before it is served.
    fn modify(&mut self, cached: String) -> String {
        cached
    }

    /// Whether output may be read from or written to the shared store.
    /// Checked before the lookup and again before storing.
    fn cacheable(&self) -> bool {
        true
    }
}

/// Which path produced a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Hit(String),
    Stored(String),
    /// Rendered without consulting the store, or the store refused the entry.
    Bypassed(String),
    Degraded(String),
}

impl GateOutcome {
    pub fn content(&self) -> &str {
        match self {
            GateOutcome::Hit(content)
            | GateOutcome::Stored(content)
            | GateOutcome::Bypassed(content)
            | GateOutcome::Degraded(content) => content,
        }
    }

    pub fn into_content(self) -> String {
        match self {
            GateOutcome::Hit(content)
            | GateOutcome::Stored(content)
            | GateOutcome::Bypassed(content)
            | GateOutcome::Degraded(content) => content,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GateOutcome::Hit(_) => "hit",
            GateOutcome::Stored(_) => "stored",
            GateOutcome::Bypassed(_) => "bypassed",
            GateOutcome::Degraded(_) => "degraded",
        }
    }
}

#[derive(Clone)]
pub struct CacheGate {
    store: Arc<dyn FragmentStore>,
    enabled: bool,
}

impl CacheGate {
    pub fn new(store: Arc<dyn FragmentStore>, enabled: bool) -> Self {
        Self { store, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Serve `key` from the store, or compose, render and store it.
    ///
    /// Never fails: store errors count as a miss or an unstored render, and
    /// composition faults yield the fragment's degraded output with nothing
    /// written to the store. Fragments that are not cacheable bypass it.
    #[instrument(skip_all, fields(cache = "fragment", section = %key.section(), uid = key.uid()))]
    pub async fn render<F>(&self, key: &FragmentKey, fragment: &mut F) -> GateOutcome
    where
        F: Fragment + ?Sized,
    {
        if self.enabled && fragment.cacheable() {
            match self.store.get(key).await {
                Ok(Some(cached)) => {
                    counter!(METRIC_HIT).increment(1);
                    debug!(outcome = "hit", "fragment served from cache");
                    return GateOutcome::Hit(fragment.modify(cached));
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(outcome = "miss", error = %err, "fragment lookup failed");
                }
            }
            counter!(METRIC_MISS).increment(1);
        }

        let rendered = match fragment.compose().await {
            Ok(rendered) => rendered,
            Err(fault) => {
                counter!(METRIC_DEGRADED).increment(1);
                debug!(outcome = "degraded", fault = ?fault.kind(), "fragment degraded");
                return GateOutcome::Degraded(fragment.degrade(fault));
            }
        };

        if !self.enabled {
            debug!(outcome = "bypassed", "fragment cache disabled");
            return GateOutcome::Bypassed(rendered.content);
        }
        if !fragment.cacheable() {
            debug!(outcome = "bypassed", "fragment carries request state");
            return GateOutcome::Bypassed(rendered.content);
        }

        let entry = CacheEntry::new(rendered.content.clone(), &rendered.annotation);
        match self.store.set(key.clone(), entry).await {
            Ok(()) => {
                counter!(METRIC_STORE).increment(1);
                debug!(
                    outcome = "stored",
                    tags = rendered.annotation.tags().len(),
                    "fragment stored"
                );
                GateOutcome::Stored(rendered.content)
            }
            Err(err) => {
                warn!(outcome = "bypassed", error = %err, "fragment store failed");
                GateOutcome::Bypassed(rendered.content)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;
    use crate::application::error::ClientError;
    use crate::cache::config::CacheConfig;
    use crate::cache::keys::Section;
    use crate::cache::store::{MemoryFragmentStore, StoreError};
    use crate::cache::tags::Tag;

    struct Counting {
        composed: usize,
        fail: bool,
        private: bool,
    }

    impl Counting {
        fn new() -> Self {
            Self {
                composed: 0,
                fail: false,
                private: false,
            }
        }
    }

    #[async_trait]
    impl Fragment for Counting {
        async fn compose(&mut self) -> Result<Rendered, FragmentFault> {
            self.composed += 1;
            if self.fail {
                return Err(ClientError::Rejected("bad input".to_string()).into());
            }
            let mut annotation = Annotation::new();
            annotation.add_tag(Tag::new("product"));
            Ok(Rendered::new(format!("render #{}", self.composed), annotation))
        }

        fn degrade(&mut self, fault: FragmentFault) -> String {
            format!("error: {}", fault.user_message())
        }

        fn modify(&mut self, cached: String) -> String {
            format!("{cached} (modified)")
        }

        fn cacheable(&self) -> bool {
            !self.private
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl FragmentStore for BrokenStore {
        async fn get(&self, _key: &FragmentKey) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }

        async fn set(&self, _key: FragmentKey, _entry: CacheEntry) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }

        async fn invalidate_tags(&self, _tags: &BTreeSet<Tag>) -> Result<usize, StoreError> {
            Ok(0)
        }

        async fn clear(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    fn key() -> FragmentKey {
        FragmentKey::new(Section::Body, "p1", &BTreeMap::new(), "catalog.product", &())
    }

    #[tokio::test]
    async fn miss_stores_then_hit_is_modified() {
        let store = Arc::new(MemoryFragmentStore::new(&CacheConfig::default()));
        let gate = CacheGate::new(store.clone(), true);
        let mut fragment = Counting::new();

        let first = gate.render(&key(), &mut fragment).await;
        assert_eq!(first, GateOutcome::Stored("render #1".to_string()));

        let second = gate.render(&key(), &mut fragment).await;
        assert_eq!(second, GateOutcome::Hit("render #1 (modified)".to_string()));
        assert_eq!(fragment.composed, 1);
    }

    #[tokio::test]
    async fn fault_degrades_without_storing() {
        let store = Arc::new(MemoryFragmentStore::new(&CacheConfig::default()));
        let gate = CacheGate::new(store.clone(), true);
        let mut fragment = Counting {
            fail: true,
            ..Counting::new()
        };

        let outcome = gate.render(&key(), &mut fragment).await;
        assert_eq!(outcome, GateOutcome::Degraded("error: bad input".to_string()));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn disabled_gate_always_composes() {
        let store = Arc::new(MemoryFragmentStore::new(&CacheConfig::default()));
        let gate = CacheGate::new(store.clone(), false);
        let mut fragment = Counting::new();

        gate.render(&key(), &mut fragment).await;
        let outcome = gate.render(&key(), &mut fragment).await;

        assert_eq!(outcome.label(), "bypassed");
        assert_eq!(fragment.composed, 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn store_failures_never_fail_the_render() {
        let gate = CacheGate::new(Arc::new(BrokenStore), true);
        let mut fragment = Counting::new();

        let outcome = gate.render(&key(), &mut fragment).await;
        assert_eq!(outcome, GateOutcome::Bypassed("render #1".to_string()));
    }

    #[tokio::test]
    async fn uncacheable_fragment_skips_lookup_and_store() {
        let store = Arc::new(MemoryFragmentStore::new(&CacheConfig::default()));
        let gate = CacheGate::new(store.clone(), true);

        let mut shared = Counting::new();
        gate.render(&key(), &mut shared).await;

        let mut private = Counting {
            private: true,
            ..Counting::new()
        };
        let outcome = gate.render(&key(), &mut private).await;
        assert_eq!(outcome, GateOutcome::Bypassed("render #1".to_string()));
        assert_eq!(private.composed, 1);
        assert_eq!(store.len(), 1);

        let mut later = Counting::new();
        let outcome = gate.render(&key(), &mut later).await;
        assert_eq!(outcome, GateOutcome::Hit("render #1 (modified)".to_string()));
    }
}
