//! Wiring of the widget, its ports and the invalidation pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::application::catalog_product::{
    CatalogProductWidget, ProductListConfig, RequestScope, WidgetPorts,
};
use crate::application::i18n::{Translator, Untranslated};
use crate::application::search::ProductSearch;
use crate::application::widgets::WidgetRegistry;
use crate::cache::{
    CacheConfig, CacheTrigger, EventQueue, FragmentStore, InvalidationConsumer,
    MemoryFragmentStore,
};
use crate::config::Settings;
use crate::presentation::views::AskamaRenderer;

use super::catalog_file::JsonCatalog;
use super::error::InfraError;
use super::http::HttpState;
use super::translations::TomlTranslations;

/// Everything a request needs, shared across handlers.
#[derive(Clone)]
pub struct FragmentRuntime {
    pub widget: Arc<CatalogProductWidget>,
    pub trigger: Arc<CacheTrigger>,
    pub store: Arc<MemoryFragmentStore>,
    pub locale: String,
}

impl FragmentRuntime {
    /// Load the catalog and translations named by `settings` and wire them up.
    pub async fn from_settings(settings: &Settings) -> Result<Self, InfraError> {
        let catalog = JsonCatalog::load(&settings.source.catalog_file).await?;

        let translator: Arc<dyn Translator> = match settings.i18n.translations.as_deref() {
            Some(path) => Arc::new(TomlTranslations::load(path).await?),
            None => Arc::new(Untranslated),
        };

        Ok(Self::assemble(
            settings,
            Arc::new(catalog),
            translator,
            WidgetRegistry::new(),
        ))
    }

    pub fn assemble(
        settings: &Settings,
        search: Arc<dyn ProductSearch>,
        translator: Arc<dyn Translator>,
        widgets: WidgetRegistry,
    ) -> Self {
        let cache = CacheConfig::from(&settings.cache);
        let config = ProductListConfig::from(&settings.catalog);
        Self::with_config(config, cache, &settings.i18n.locale, search, translator, widgets)
    }

    pub fn with_config(
        config: ProductListConfig,
        cache: CacheConfig,
        locale: &str,
        search: Arc<dyn ProductSearch>,
        translator: Arc<dyn Translator>,
        widgets: WidgetRegistry,
    ) -> Self {
        let store = Arc::new(MemoryFragmentStore::new(&cache));
        let shared_store: Arc<dyn FragmentStore> = store.clone();

        let queue = Arc::new(EventQueue::new_with_limit(cache.event_queue_limit_non_zero()));
        let consumer = Arc::new(InvalidationConsumer::new(
            cache.clone(),
            queue.clone(),
            shared_store.clone(),
        ));
        let trigger = Arc::new(CacheTrigger::new(cache.clone(), queue, consumer));

        info!(
            codes = config.codes.len(),
            cache_enabled = cache.enabled,
            capacity = cache.capacity,
            tag_all = cache.tag_all,
            "catalog product widget ready"
        );

        let widget = CatalogProductWidget::new(
            config,
            &cache,
            WidgetPorts {
                search,
                store: shared_store,
                renderer: Arc::new(AskamaRenderer),
                translator,
                widgets,
            },
        );

        Self {
            widget: Arc::new(widget),
            trigger,
            store,
            locale: locale.to_string(),
        }
    }

    /// Fresh request scope with its own CSRF token.
    pub fn scope(&self, uid: impl Into<String>, params: BTreeMap<String, String>) -> RequestScope {
        RequestScope::new(
            uid,
            self.locale.as_str(),
            Uuid::new_v4().simple().to_string(),
            params,
        )
    }

    pub fn http_state(&self) -> HttpState {
        HttpState {
            runtime: self.clone(),
        }
    }
}
