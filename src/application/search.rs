//! Product search port consumed by the result composer.

use async_trait::async_trait;

use crate::application::error::ControllerError;
use crate::domain::products::ProductRecord;

/// Equality filter over product codes with a slice bound and the data
/// domains to hydrate onto each result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    pub codes: Vec<String>,
    pub offset: usize,
    pub limit: usize,
    pub domains: Vec<String>,
}

impl ProductQuery {
    /// Query for exactly the given codes; the slice never exceeds `codes.len()`.
    pub fn by_codes(codes: &[String], domains: &[String]) -> Self {
        Self {
            codes: codes.to_vec(),
            offset: 0,
            limit: codes.len(),
            domains: domains.to_vec(),
        }
    }

    pub fn matches(&self, product: &ProductRecord) -> bool {
        self.codes.iter().any(|code| *code == product.code)
    }
}

#[async_trait]
pub trait ProductSearch: Send + Sync {
    async fn search(&self, query: &ProductQuery) -> Result<Vec<ProductRecord>, ControllerError>;
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::domain::products::ProductKind;

    #[test]
    fn slice_bound_follows_code_count() {
        let codes = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let query = ProductQuery::by_codes(&codes, &["text".to_string()]);

        assert_eq!(query.offset, 0);
        assert_eq!(query.limit, 3);
        assert_eq!(query.domains, vec!["text".to_string()]);
    }

    #[test]
    fn matches_on_code_equality() {
        let query = ProductQuery::by_codes(&["a".to_string()], &[]);
        assert!(query.matches(&ProductRecord::new(Uuid::nil(), "a", ProductKind::Default)));
        assert!(!query.matches(&ProductRecord::new(Uuid::nil(), "ab", ProductKind::Default)));
    }
}
