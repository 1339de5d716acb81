//! Product records as returned by the catalog search.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Domain name under which products reference other products.
pub const PRODUCT_DOMAIN: &str = "product";
/// List type used for the variants of a selection product.
pub const DEFAULT_LIST_TYPE: &str = "default";

/// Type discriminator of a product record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    #[default]
    Default,
    /// A selection product whose variants are referenced products.
    Select,
    Bundle,
    #[serde(other)]
    Other,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Default => "default",
            ProductKind::Select => "select",
            ProductKind::Bundle => "bundle",
            ProductKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: Uuid,
    pub code: String,
    #[serde(default, rename = "type")]
    pub kind: ProductKind,
    #[serde(default)]
    pub label: String,
    /// End of the product's visibility; cached output must not outlive it.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub references: Vec<ProductReference>,
}

/// Link from a product to another item, e.g. the variants of a selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductReference {
    #[serde(default = "default_reference_domain")]
    pub domain: String,
    #[serde(default = "default_list_type")]
    pub list_type: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_at: Option<OffsetDateTime>,
    pub product: ProductRecord,
}

fn default_reference_domain() -> String {
    PRODUCT_DOMAIN.to_string()
}

fn default_list_type() -> String {
    DEFAULT_LIST_TYPE.to_string()
}

impl ProductRecord {
    pub fn new(id: Uuid, code: impl Into<String>, kind: ProductKind) -> Self {
        Self {
            id,
            code: code.into(),
            kind,
            label: String::new(),
            end_at: None,
            references: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_end_at(mut self, end_at: OffsetDateTime) -> Self {
        self.end_at = Some(end_at);
        self
    }

    pub fn with_reference(mut self, reference: ProductReference) -> Self {
        self.references.push(reference);
        self
    }

    pub fn is_selection(&self) -> bool {
        self.kind == ProductKind::Select
    }

    /// Referenced products in `domain` linked via `list_type` whose own type is `kind`.
    pub fn referenced_products<'a>(
        &'a self,
        domain: &'a str,
        list_type: &'a str,
        kind: ProductKind,
    ) -> impl Iterator<Item = &'a ProductRecord> + 'a {
        self.references
            .iter()
            .filter(move |reference| reference.domain == domain && reference.list_type == list_type)
            .map(|reference| &reference.product)
            .filter(move |product| product.kind == kind)
    }

    /// Drop references into domains that were not requested for hydration.
    pub fn retain_domains(&mut self, domains: &[String]) {
        self.references
            .retain(|reference| domains.iter().any(|domain| *domain == reference.domain));
    }
}

impl ProductReference {
    pub fn variant(product: ProductRecord) -> Self {
        Self {
            domain: default_reference_domain(),
            list_type: default_list_type(),
            end_at: None,
            product,
        }
    }
}
