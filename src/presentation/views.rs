use askama::{Error as AskamaError, Template};
use thiserror::Error;

use crate::application::faults::ErrorList;
use crate::domain::products::ProductRecord;

use super::sections;

/// Default template id of the product list body.
pub const BODY_TEMPLATE: &str = "catalog/product/body-standard";
/// Default template id of the product list header.
pub const HEADER_TEMPLATE: &str = "catalog/product/header-standard";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template `{0}` is not registered")]
    UnknownTemplate(String),
    #[error("template `{template}` failed to render")]
    Template {
        template: String,
        #[source]
        source: AskamaError,
    },
}

/// State shared by the product list templates for one request.
#[derive(Debug, Clone, Default)]
pub struct ProductListView {
    /// Concatenated body output of the sub-widgets.
    pub list_body: String,
    /// Concatenated header output of the sub-widgets.
    pub list_header: String,
    pub products: Vec<ProductRecord>,
    pub product_total: usize,
    /// Variants of selection products.
    pub items: Vec<ProductRecord>,
    pub stock_url: Option<String>,
    pub basket_add: bool,
    pub csrf_token: String,
    pub errors: ErrorList,
}

impl ProductListView {
    pub fn has_stock_url(&self) -> bool {
        self.stock_url.is_some()
    }

    pub fn stock_url_str(&self) -> &str {
        self.stock_url.as_deref().unwrap_or_default()
    }

    pub fn csrf_field(&self) -> String {
        sections::csrf_field(&self.csrf_token)
    }

    pub fn csrf_section(&self) -> &'static str {
        sections::CSRF_SECTION
    }

    pub fn variant_count(&self, product: &ProductRecord) -> usize {
        self.items
            .iter()
            .filter(|item| product.references.iter().any(|reference| reference.product.id == item.id))
            .count()
    }
}

#[derive(Template)]
#[template(path = "catalog/product/body-standard.html")]
pub struct BodyTemplate<'a> {
    pub view: &'a ProductListView,
}

#[derive(Template)]
#[template(path = "catalog/product/header-standard.html")]
pub struct HeaderTemplate<'a> {
    pub view: &'a ProductListView,
}

/// Minimal body used when the configured body template itself fails.
#[derive(Template)]
#[template(path = "catalog/product/body-fallback.html")]
pub struct FallbackBodyTemplate<'a> {
    pub view: &'a ProductListView,
}

/// Renders a view through a template chosen by id.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, view: &ProductListView) -> Result<String, RenderError>;
}

/// Renderer backed by the compiled askama templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct AskamaRenderer;

impl TemplateRenderer for AskamaRenderer {
    fn render(&self, template: &str, view: &ProductListView) -> Result<String, RenderError> {
        let rendered = match template {
            BODY_TEMPLATE => BodyTemplate { view }.render(),
            HEADER_TEMPLATE => HeaderTemplate { view }.render(),
            other => return Err(RenderError::UnknownTemplate(other.to_string())),
        };

        rendered.map_err(|source| RenderError::Template {
            template: template.to_string(),
            source,
        })
    }
}

pub fn render_fallback_body(view: &ProductListView) -> Result<String, RenderError> {
    FallbackBodyTemplate { view }
        .render()
        .map_err(|source| RenderError::Template {
            template: "catalog/product/body-fallback".to_string(),
            source,
        })
}
