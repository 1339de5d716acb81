//! The catalog product list widget.
//!
//! Shows a fixed, configured list of products. Body and header are cached
//! fragments; faults during composition end up in the view's error list.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, instrument};
use url::Url;

use crate::application::composer::ResultComposer;
use crate::application::error::{FragmentFault, error_chain};
use crate::application::i18n::Translator;
use crate::application::search::ProductSearch;
use crate::application::stock::StockUrlBuilder;
use crate::application::widgets::{SubWidget, WidgetRegistry};
use crate::cache::{
    Annotation, CacheConfig, CacheGate, Fragment, FragmentKey, FragmentStore, GateOutcome,
    Rendered, Section, TagAnnotator,
};
use crate::config::CatalogSettings;
use crate::presentation::sections::{CSRF_SECTION, replace_section};
use crate::presentation::views::{ProductListView, TemplateRenderer, render_fallback_body};

/// Configuration namespace of this widget; part of every fragment key.
pub const CONFIG_KEY: &str = "catalog/product";
/// Category tag added to every fragment of this widget.
pub const PRODUCT_CATEGORY: &str = "product";

/// Effective widget configuration; hashed into the fragment key.
#[derive(Debug, Clone, Serialize)]
pub struct ProductListConfig {
    /// Data domains hydrated onto each product.
    pub domains: Vec<String>,
    /// Product codes to show, in display order.
    pub codes: Vec<String>,
    pub stock_enabled: bool,
    /// Also load the variants of selection products for add-to-basket forms.
    pub basket_add: bool,
    pub subparts: Vec<String>,
    pub template_body: String,
    pub template_header: String,
    pub stock_url: Url,
}

impl From<&CatalogSettings> for ProductListConfig {
    fn from(settings: &CatalogSettings) -> Self {
        let product = &settings.product;
        Self {
            domains: product
                .domains
                .clone()
                .unwrap_or_else(|| settings.domains.clone()),
            codes: product.codes.clone(),
            stock_enabled: product.stock_enabled,
            basket_add: product.basket_add,
            subparts: product.subparts.clone(),
            template_body: product.template_body.clone(),
            template_header: product.template_header.clone(),
            stock_url: settings.stock_url.clone(),
        }
    }
}

/// Per-request state: the view being built and what composition touched.
#[derive(Debug, Clone)]
pub struct RequestScope {
    pub uid: String,
    pub locale: String,
    pub params: BTreeMap<String, String>,
    pub view: ProductListView,
    composed: Option<Annotation>,
}

impl RequestScope {
    pub fn new(
        uid: impl Into<String>,
        locale: impl Into<String>,
        csrf_token: impl Into<String>,
        params: BTreeMap<String, String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            locale: locale.into(),
            params,
            view: ProductListView {
                csrf_token: csrf_token.into(),
                ..ProductListView::default()
            },
            composed: None,
        }
    }

    pub fn is_composed(&self) -> bool {
        self.composed.is_some()
    }
}

/// Collaborators of the widget.
#[derive(Clone)]
pub struct WidgetPorts {
    pub search: Arc<dyn ProductSearch>,
    pub store: Arc<dyn FragmentStore>,
    pub renderer: Arc<dyn TemplateRenderer>,
    pub translator: Arc<dyn Translator>,
    pub widgets: WidgetRegistry,
}

pub struct CatalogProductWidget {
    config: ProductListConfig,
    composer: ResultComposer,
    gate: CacheGate,
    annotator: TagAnnotator,
    stock: StockUrlBuilder,
    renderer: Arc<dyn TemplateRenderer>,
    translator: Arc<dyn Translator>,
    widgets: WidgetRegistry,
}

impl CatalogProductWidget {
    pub fn new(config: ProductListConfig, cache: &CacheConfig, ports: WidgetPorts) -> Self {
        Self {
            stock: StockUrlBuilder::new(config.stock_url.clone()),
            config,
            composer: ResultComposer::new(ports.search),
            gate: CacheGate::new(ports.store, cache.enabled),
            annotator: TagAnnotator::new(cache.tag_mode()),
            renderer: ports.renderer,
            translator: ports.translator,
            widgets: ports.widgets,
        }
    }

    pub fn config(&self) -> &ProductListConfig {
        &self.config
    }

    /// Cache key of `section` for this request.
    ///
    /// The locale is hashed in with the configuration since error messages
    /// and labels are rendered translated.
    pub fn key(&self, section: Section, scope: &RequestScope) -> FragmentKey {
        FragmentKey::new(
            section,
            scope.uid.as_str(),
            &scope.params,
            CONFIG_KEY,
            &(&self.config, scope.locale.as_str()),
        )
    }

    #[instrument(skip_all, fields(uid = %scope.uid))]
    pub async fn body(&self, scope: &mut RequestScope) -> GateOutcome {
        let key = self.key(Section::Body, scope);
        let mut fragment = BodyFragment {
            widget: self,
            scope,
        };
        self.gate.render(&key, &mut fragment).await
    }

    #[instrument(skip_all, fields(uid = %scope.uid))]
    pub async fn header(&self, scope: &mut RequestScope) -> GateOutcome {
        let key = self.key(Section::Header, scope);
        let mut fragment = HeaderFragment {
            widget: self,
            scope,
        };
        self.gate.render(&key, &mut fragment).await
    }

    /// Let the sub-widgets handle request input. Faults go to the error list.
    #[instrument(skip_all, fields(uid = %scope.uid))]
    pub async fn process(&self, scope: &mut RequestScope) {
        let widgets = match self.subwidgets() {
            Ok(widgets) => widgets,
            Err(fault) => {
                self.record_fault(scope, &fault);
                return;
            }
        };

        for widget in widgets {
            if let Err(fault) = widget.process(&mut scope.view).await {
                self.record_fault(scope, &fault);
                return;
            }
        }
    }

    /// Compose the view once per request; later calls reuse the annotation.
    pub async fn ensure_composed(&self, scope: &mut RequestScope) -> Result<Annotation, FragmentFault> {
        if let Some(annotation) = &scope.composed {
            return Ok(annotation.clone());
        }

        let annotation = self.add_data(&mut scope.view).await?;
        scope.composed = Some(annotation.clone());
        Ok(annotation)
    }

    /// Load the configured products into `view` and collect their tags.
    pub async fn add_data(&self, view: &mut ProductListView) -> Result<Annotation, FragmentFault> {
        let composed = self
            .composer
            .compose(&self.config.codes, &self.config.domains, self.config.basket_add)
            .await?;

        let mut annotation = Annotation::new();
        self.annotator
            .annotate(&mut annotation, composed.touched(), &[PRODUCT_CATEGORY]);

        if self.config.stock_enabled && !composed.is_empty() {
            view.stock_url = Some(self.stock.build(composed.touched()).to_string());
        }

        debug!(
            products = composed.products.len(),
            items = composed.items.len(),
            tags = annotation.tags().len(),
            "catalog product data added"
        );

        view.basket_add = self.config.basket_add;
        view.product_total = composed.products.len();
        view.products = composed.products;
        view.items = composed.items;
        Ok(annotation)
    }

    fn subwidgets(&self) -> Result<Vec<Arc<dyn SubWidget>>, FragmentFault> {
        Ok(self.widgets.resolve(&self.config.subparts)?)
    }

    fn record_fault(&self, scope: &mut RequestScope, fault: &FragmentFault) {
        scope
            .view
            .errors
            .record(fault, self.translator.as_ref(), &scope.locale);
    }
}

struct BodyFragment<'w, 's> {
    widget: &'w CatalogProductWidget,
    scope: &'s mut RequestScope,
}

#[async_trait]
impl<'w, 's> Fragment for BodyFragment<'w, 's> {
    async fn compose(&mut self) -> Result<Rendered, FragmentFault> {
        let widget = self.widget;
        let annotation = widget.ensure_composed(self.scope).await?;

        let mut list_body = String::new();
        for child in widget.subwidgets()? {
            list_body.push_str(&child.body(&self.scope.uid, &self.scope.view).await?);
        }
        self.scope.view.list_body = list_body;

        let content = widget
            .renderer
            .render(&widget.config.template_body, &self.scope.view)?;
        Ok(Rendered::new(content, annotation))
    }

    fn degrade(&mut self, fault: FragmentFault) -> String {
        let widget = self.widget;
        widget.record_fault(self.scope, &fault);

        match widget
            .renderer
            .render(&widget.config.template_body, &self.scope.view)
        {
            Ok(content) => content,
            Err(err) => {
                widget.record_fault(self.scope, &err.into());
                render_fallback_body(&self.scope.view).unwrap_or_else(|err| {
                    error!(chain = ?error_chain(&err), "fallback body failed to render");
                    String::new()
                })
            }
        }
    }

    fn modify(&mut self, cached: String) -> String {
        replace_section(&cached, &self.scope.view.csrf_field(), CSRF_SECTION)
    }

    /// A body showing this request's errors is never shared.
    fn cacheable(&self) -> bool {
        self.scope.view.errors.is_empty()
    }
}

struct HeaderFragment<'w, 's> {
    widget: &'w CatalogProductWidget,
    scope: &'s mut RequestScope,
}

#[async_trait]
impl<'w, 's> Fragment for HeaderFragment<'w, 's> {
    async fn compose(&mut self) -> Result<Rendered, FragmentFault> {
        let widget = self.widget;
        let annotation = widget.ensure_composed(self.scope).await?;

        let mut list_header = String::new();
        for child in widget.subwidgets()? {
            list_header.push_str(&child.header(&self.scope.uid, &self.scope.view).await?);
        }
        self.scope.view.list_header = list_header;

        let content = widget
            .renderer
            .render(&widget.config.template_header, &self.scope.view)?;
        Ok(Rendered::new(content, annotation))
    }

    /// Header faults are only logged; the page renders without the header.
    fn degrade(&mut self, fault: FragmentFault) -> String {
        error!(
            uid = %self.scope.uid,
            fault = %fault,
            chain = ?error_chain(&fault),
            "catalog product header failed"
        );
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use uuid::Uuid;

    use super::*;
    use crate::application::error::{ClientError, ControllerError};
    use crate::application::i18n::Untranslated;
    use crate::application::search::ProductQuery;
    use crate::cache::MemoryFragmentStore;
    use crate::domain::error::DomainError;
    use crate::domain::products::{ProductKind, ProductRecord, ProductReference};
    use crate::presentation::views::{AskamaRenderer, BODY_TEMPLATE, HEADER_TEMPLATE};

    enum Failure {
        None,
        Controller,
        Domain,
    }

    struct StubSearch {
        products: Vec<ProductRecord>,
        calls: AtomicUsize,
        failure: Mutex<Failure>,
    }

    impl StubSearch {
        fn new(products: Vec<ProductRecord>) -> Arc<Self> {
            Arc::new(Self {
                products,
                calls: AtomicUsize::new(0),
                failure: Mutex::new(Failure::None),
            })
        }

        fn fail_with(&self, failure: Failure) {
            *self.failure.lock().expect("failure lock") = failure;
        }
    }

    #[async_trait]
    impl ProductSearch for StubSearch {
        async fn search(&self, query: &ProductQuery) -> Result<Vec<ProductRecord>, ControllerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match *self.failure.lock().expect("failure lock") {
                Failure::None => {}
                Failure::Controller => {
                    return Err(ControllerError::Rejected("Search rejected".to_string()));
                }
                Failure::Domain => return Err(DomainError::storage("index offline").into()),
            }
            Ok(self
                .products
                .iter()
                .filter(|product| query.matches(product))
                .cloned()
                .collect())
        }
    }

    struct Banner;

    #[async_trait]
    impl SubWidget for Banner {
        fn name(&self) -> &str {
            "banner"
        }

        async fn body(&self, uid: &str, view: &ProductListView) -> Result<String, FragmentFault> {
            Ok(format!("<p class=\"banner\">{uid}:{}</p>", view.product_total))
        }

        async fn header(&self, _uid: &str, _view: &ProductListView) -> Result<String, FragmentFault> {
            Ok("<meta name=\"banner\" />".to_string())
        }

        async fn process(&self, view: &mut ProductListView) -> Result<(), FragmentFault> {
            if view.csrf_token.is_empty() {
                return Err(ClientError::Rejected("Missing token".to_string()).into());
            }
            Ok(())
        }
    }

    fn product(code: &str) -> ProductRecord {
        ProductRecord::new(Uuid::new_v4(), code, ProductKind::Default).with_label(code)
    }

    fn config(codes: &[&str]) -> ProductListConfig {
        ProductListConfig {
            domains: vec!["text".to_string()],
            codes: codes.iter().map(|code| code.to_string()).collect(),
            stock_enabled: true,
            basket_add: false,
            subparts: Vec::new(),
            template_body: BODY_TEMPLATE.to_string(),
            template_header: HEADER_TEMPLATE.to_string(),
            stock_url: Url::parse("http://shop.test/catalog/stock").expect("stock url"),
        }
    }

    fn widget(
        config: ProductListConfig,
        search: Arc<StubSearch>,
    ) -> (CatalogProductWidget, Arc<MemoryFragmentStore>) {
        let cache = CacheConfig::default();
        let store = Arc::new(MemoryFragmentStore::new(&cache));
        let ports = WidgetPorts {
            search,
            store: store.clone(),
            renderer: Arc::new(AskamaRenderer),
            translator: Arc::new(Untranslated),
            widgets: WidgetRegistry::new().with(Arc::new(Banner)),
        };
        (CatalogProductWidget::new(config, &cache, ports), store)
    }

    fn scope(token: &str) -> RequestScope {
        RequestScope::new("p1", "en", token, BTreeMap::new())
    }

    #[tokio::test]
    async fn body_is_composed_once_and_served_from_cache() {
        let search = StubSearch::new(vec![product("a"), product("b")]);
        let (widget, store) = widget(config(&["b", "a"]), search.clone());

        let first = widget.body(&mut scope("t1")).await;
        assert_eq!(first.label(), "stored");

        let second = widget.body(&mut scope("t2")).await;
        assert_eq!(second.label(), "hit");
        assert_eq!(search.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len(), 1);

        assert!(second.content().contains("value=\"t2\""));
        assert!(!second.content().contains("value=\"t1\""));
    }

    #[tokio::test]
    async fn header_and_body_share_one_composition() {
        let search = StubSearch::new(vec![product("a")]);
        let (widget, _) = widget(config(&["a"]), search.clone());
        let mut scope = scope("t1");

        widget.header(&mut scope).await;
        widget.body(&mut scope).await;

        assert!(scope.is_composed());
        assert_eq!(search.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stock_url_only_with_products_and_flag() {
        let search = StubSearch::new(vec![product("a")]);
        let (with_stock, _) = widget(config(&["a"]), search.clone());
        let mut scope_a = scope("t");
        with_stock.ensure_composed(&mut scope_a).await.expect("compose");
        assert!(scope_a.view.stock_url.is_some());

        let mut disabled = config(&["a"]);
        disabled.stock_enabled = false;
        let (without_stock, _) = widget(disabled, search.clone());
        let mut scope_b = scope("t");
        without_stock.ensure_composed(&mut scope_b).await.expect("compose");
        assert!(scope_b.view.stock_url.is_none());

        let (no_products, _) = widget(config(&["missing"]), search);
        let mut scope_c = scope("t");
        no_products.ensure_composed(&mut scope_c).await.expect("compose");
        assert!(scope_c.view.stock_url.is_none());
    }

    #[tokio::test]
    async fn annotation_tags_products_variants_and_category() {
        let variant = product("shirt-s");
        let shirt = ProductRecord::new(Uuid::new_v4(), "shirt", ProductKind::Select)
            .with_reference(ProductReference::variant(variant.clone()));
        let search = StubSearch::new(vec![shirt.clone()]);
        let mut config = config(&["shirt"]);
        config.basket_add = true;
        let (widget, _) = widget(config, search);

        let mut scope = scope("t");
        let annotation = widget.ensure_composed(&mut scope).await.expect("compose");

        let tags: Vec<_> = annotation.tags().iter().map(|tag| tag.to_string()).collect();
        assert!(tags.contains(&"product".to_string()));
        assert!(tags.contains(&format!("product-{}", shirt.id)));
        assert!(tags.contains(&format!("product-{}", variant.id)));
        assert_eq!(scope.view.items.len(), 1);
    }

    #[tokio::test]
    async fn controller_and_domain_faults_degrade_without_caching() {
        for failure in [Failure::Controller, Failure::Domain] {
            let search = StubSearch::new(vec![product("a")]);
            search.fail_with(failure);
            let (widget, store) = widget(config(&["a"]), search);

            let outcome = widget.body(&mut scope("t")).await;
            assert_eq!(outcome.label(), "degraded");
            assert!(outcome.content().contains("error-list"));
            assert!(store.is_empty());
        }
    }

    #[tokio::test]
    async fn unknown_subpart_is_a_client_fault() {
        let search = StubSearch::new(vec![product("a")]);
        let mut config = config(&["a"]);
        config.subparts = vec!["missing".to_string()];
        let (widget, store) = widget(config, search);

        let mut scope = scope("t");
        let outcome = widget.body(&mut scope).await;

        assert_eq!(outcome.label(), "degraded");
        let content = outcome.content();
        assert!(
            content.contains("Sub-widget &#34;missing&#34;")
                || content.contains("Sub-widget &quot;missing&quot;")
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unknown_template_is_unclassified_and_hidden() {
        let search = StubSearch::new(vec![product("a")]);
        let mut config = config(&["a"]);
        config.template_body = "catalog/product/body-custom".to_string();
        let (widget, store) = widget(config, search);

        let mut scope = scope("t");
        let outcome = widget.body(&mut scope).await;

        assert_eq!(outcome.label(), "degraded");
        assert!(!outcome.content().is_empty());
        assert!(outcome.content().contains("A non-recoverable error occurred"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn header_faults_render_nothing() {
        let search = StubSearch::new(vec![product("a")]);
        search.fail_with(Failure::Controller);
        let (widget, store) = widget(config(&["a"]), search);

        let mut scope = scope("t");
        let outcome = widget.header(&mut scope).await;
        assert_eq!(outcome, GateOutcome::Degraded(String::new()));
        assert!(scope.view.errors.is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn subwidget_output_is_concatenated() {
        let search = StubSearch::new(vec![product("a")]);
        let mut config = config(&["a"]);
        config.subparts = vec!["banner".to_string(), "banner".to_string()];
        let (widget, _) = widget(config, search);

        let mut scope = scope("t");
        let body = widget.body(&mut scope).await;
        assert_eq!(body.content().matches("<p class=\"banner\">p1:1</p>").count(), 2);

        let header = widget.header(&mut scope).await;
        assert_eq!(header.content().matches("<meta name=\"banner\" />").count(), 2);
    }

    #[tokio::test]
    async fn process_faults_are_recorded() {
        let search = StubSearch::new(Vec::new());
        let mut config = config(&[]);
        config.subparts = vec!["banner".to_string()];
        let (widget, _) = widget(config, search);

        let mut scope = scope("");
        widget.process(&mut scope).await;
        assert_eq!(scope.view.errors.messages(), ["Missing token".to_string()]);
    }

    #[tokio::test]
    async fn process_errors_stay_with_their_request() {
        let search = StubSearch::new(vec![product("a")]);
        let mut config = config(&["a"]);
        config.subparts = vec!["banner".to_string()];
        let (widget, store) = widget(config, search);

        let mut rejected = scope("");
        widget.process(&mut rejected).await;
        let first = widget.body(&mut rejected).await;
        assert_eq!(first.label(), "bypassed");
        assert!(first.content().contains("Missing token"));
        assert!(store.is_empty());

        let mut clean = scope("t2");
        widget.process(&mut clean).await;
        let second = widget.body(&mut clean).await;
        assert_eq!(second.label(), "stored");
        assert!(!second.content().contains("Missing token"));

        let mut cached_before = scope("");
        widget.process(&mut cached_before).await;
        let third = widget.body(&mut cached_before).await;
        assert_eq!(third.label(), "bypassed");
        assert!(third.content().contains("Missing token"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn key_depends_on_params_and_locale() {
        let search = StubSearch::new(Vec::new());
        let (widget, _) = widget(config(&["a"]), search);

        let base = scope("t");
        let mut other_params = scope("t");
        other_params
            .params
            .insert("f_catid".to_string(), "1".to_string());
        let other_locale = RequestScope::new("p1", "de", "t", BTreeMap::new());

        let key = widget.key(Section::Body, &base);
        assert_eq!(key, widget.key(Section::Body, &scope("other-token")));
        assert_ne!(key, widget.key(Section::Body, &other_params));
        assert_ne!(key, widget.key(Section::Body, &other_locale));
        assert_ne!(key, widget.key(Section::Header, &base));
    }
}
