//! Ordered composition of search results.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::application::error::FragmentFault;
use crate::application::search::{ProductQuery, ProductSearch};
use crate::domain::products::{DEFAULT_LIST_TYPE, PRODUCT_DOMAIN, ProductKind, ProductRecord};

/// Products shown by the list plus the variants pulled out of selections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposedProducts {
    pub products: Vec<ProductRecord>,
    pub items: Vec<ProductRecord>,
}

impl ComposedProducts {
    /// Every record that went into the fragment, list products first.
    pub fn touched(&self) -> impl Iterator<Item = &ProductRecord> {
        self.products.iter().chain(self.items.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[derive(Clone)]
pub struct ResultComposer {
    search: Arc<dyn ProductSearch>,
}

impl ResultComposer {
    pub fn new(search: Arc<dyn ProductSearch>) -> Self {
        Self { search }
    }

    #[instrument(skip_all, fields(codes = codes.len(), expand_selections = expand_selections))]
    pub async fn compose(
        &self,
        codes: &[String],
        domains: &[String],
        expand_selections: bool,
    ) -> Result<ComposedProducts, FragmentFault> {
        if codes.is_empty() {
            debug!("no product codes configured, skipping search");
            return Ok(ComposedProducts::default());
        }

        let query = ProductQuery::by_codes(codes, domains);
        let found = self.search.search(&query).await?;
        let products = order_by_codes(found, codes);

        let items = if expand_selections {
            selection_variants(&products)
        } else {
            Vec::new()
        };

        debug!(
            products = products.len(),
            items = items.len(),
            "composed product list"
        );

        Ok(ComposedProducts { products, items })
    }
}

/// Sort products by the position of their code in `codes`.
///
/// The sort is stable. Codes listed twice keep their first position, and
/// products whose code is not listed trail in the order the search returned them.
pub fn order_by_codes(mut products: Vec<ProductRecord>, codes: &[String]) -> Vec<ProductRecord> {
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(codes.len());
    for (index, code) in codes.iter().enumerate() {
        positions.entry(code.as_str()).or_insert(index);
    }

    let unmatched = products
        .iter()
        .filter(|product| !positions.contains_key(product.code.as_str()))
        .count();
    if unmatched > 0 {
        warn!(
            unmatched,
            "search returned products outside the requested codes, ordering them last"
        );
    }

    products.sort_by_key(|product| {
        positions
            .get(product.code.as_str())
            .copied()
            .unwrap_or(usize::MAX)
    });
    products
}

/// Default variants referenced by selection products, first occurrence wins.
pub fn selection_variants(products: &[ProductRecord]) -> Vec<ProductRecord> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for product in products.iter().filter(|product| product.is_selection()) {
        for variant in
            product.referenced_products(PRODUCT_DOMAIN, DEFAULT_LIST_TYPE, ProductKind::Default)
        {
            if seen.insert(variant.id) {
                items.push(variant.clone());
            }
        }
    }

    items
}
