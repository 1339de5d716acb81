//! Stock level URL for the products shown by a fragment.

use url::Url;

use crate::domain::products::ProductRecord;

/// Query parameter carrying the product codes.
pub const STOCK_CODE_PARAM: &str = "s_prodcode[]";

#[derive(Debug, Clone)]
pub struct StockUrlBuilder {
    base: Url,
}

impl StockUrlBuilder {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    /// URL listing every product code once, sorted.
    pub fn build<'a, I>(&self, products: I) -> Url
    where
        I: IntoIterator<Item = &'a ProductRecord>,
    {
        let mut codes: Vec<&str> = products.into_iter().map(|product| product.code.as_str()).collect();
        codes.sort_unstable();
        codes.dedup();

        let mut url = self.base.clone();
        {
            let mut query = url.query_pairs_mut();
            for code in codes {
                query.append_pair(STOCK_CODE_PARAM, code);
            }
        }
        url
    }
}
