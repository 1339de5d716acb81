//! Product catalog loaded from a JSON file.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::application::error::ControllerError;
use crate::application::search::{ProductQuery, ProductSearch};
use crate::domain::products::ProductRecord;

use super::error::InfraError;

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    products: Vec<ProductRecord>,
}

/// In-memory product search over a catalog document.
#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    products: Vec<ProductRecord>,
}

impl JsonCatalog {
    pub fn new(products: Vec<ProductRecord>) -> Self {
        Self { products }
    }

    /// Parse a catalog document of the form `{"products": [...]}`.
    pub fn from_json(path: &Path, json: &str) -> Result<Self, InfraError> {
        let document: CatalogDocument =
            serde_json::from_str(json).map_err(|err| InfraError::catalog(path, err))?;
        Ok(Self::new(document.products))
    }

    #[instrument(fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, InfraError> {
        let json = tokio::fs::read_to_string(path).await?;
        let catalog = Self::from_json(path, &json)?;
        info!(products = catalog.len(), "product catalog loaded");
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn products(&self) -> &[ProductRecord] {
        &self.products
    }
}

#[async_trait]
impl ProductSearch for JsonCatalog {
    async fn search(&self, query: &ProductQuery) -> Result<Vec<ProductRecord>, ControllerError> {
        if query.codes.iter().any(|code| code.trim().is_empty()) {
            return Err(ControllerError::Search(
                "product codes must not be blank".to_string(),
            ));
        }

        let found = self
            .products
            .iter()
            .filter(|product| query.matches(product))
            .skip(query.offset)
            .take(query.limit)
            .map(|product| {
                let mut product = product.clone();
                product.retain_domains(&query.domains);
                product
            })
            .collect();
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const DOCUMENT: &str = r#"{
        "products": [
            {"id": "00000000-0000-0000-0000-000000000001", "code": "a", "label": "Apple"},
            {"id": "00000000-0000-0000-0000-000000000002", "code": "b", "type": "select",
             "references": [
                {"list_type": "default", "product":
                    {"id": "00000000-0000-0000-0000-000000000003", "code": "b-red"}},
                {"domain": "media", "product":
                    {"id": "00000000-0000-0000-0000-000000000004", "code": "b-image"}}
             ]},
            {"id": "00000000-0000-0000-0000-000000000005", "code": "c",
             "end_at": "2030-01-01T00:00:00Z"}
        ]
    }"#;

    fn catalog() -> JsonCatalog {
        JsonCatalog::from_json(Path::new("catalog.json"), DOCUMENT).expect("catalog parses")
    }

    #[tokio::test]
    async fn filters_by_code_and_bounds_the_slice() {
        let catalog = catalog();
        let query = ProductQuery {
            codes: vec!["c".to_string(), "a".to_string(), "b".to_string()],
            offset: 1,
            limit: 1,
            domains: vec![],
        };

        let found = catalog.search(&query).await.expect("search");
        let codes: Vec<_> = found.iter().map(|product| product.code.as_str()).collect();
        assert_eq!(codes, vec!["b"]);
    }

    #[tokio::test]
    async fn blank_codes_are_a_search_failure() {
        let query = ProductQuery::by_codes(&["a".to_string(), " ".to_string()], &[]);

        let err = catalog().search(&query).await.expect_err("blank code");
        assert!(matches!(err, ControllerError::Search(_)));
    }

    #[tokio::test]
    async fn drops_references_outside_requested_domains() {
        let catalog = catalog();
        let query = ProductQuery::by_codes(&["b".to_string()], &["product".to_string()]);

        let found = catalog.search(&query).await.expect("search");
        assert_eq!(found.len(), 1);
        let codes: Vec<_> = found[0]
            .references
            .iter()
            .map(|reference| reference.product.code.as_str())
            .collect();
        assert_eq!(codes, vec!["b-red"]);
    }

    #[test]
    fn parses_kinds_and_end_dates() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 3);
        assert!(catalog.products()[1].is_selection());
        assert!(catalog.products()[2].end_at.is_some());
    }

    #[test]
    fn malformed_documents_name_the_file() {
        let err = JsonCatalog::from_json(Path::new("broken.json"), "{").expect_err("invalid json");
        assert!(matches!(err, InfraError::Catalog { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[tokio::test]
    async fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(DOCUMENT.as_bytes()).expect("write catalog");

        let catalog = JsonCatalog::load(file.path()).await.expect("load");
        assert_eq!(catalog.len(), 3);
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let err = JsonCatalog::load(Path::new("/definitely/missing/catalog.json"))
            .await
            .expect_err("missing file");
        assert!(matches!(err, InfraError::Io(_)));
    }
}
