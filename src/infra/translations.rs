//! Translation catalogs read from a TOML file.
//!
//! The file maps locale to catalog to message:
//!
//! ```toml
//! [de.client]
//! "A non-recoverable error occurred" = "Ein nicht behebbarer Fehler ist aufgetreten"
//! ```
//!
//! A locale like `de_CH` falls back to `de` before the message is returned
//! untranslated.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, instrument};

use crate::application::i18n::Translator;

use super::error::InfraError;

type Catalog = HashMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct TomlTranslations {
    locales: HashMap<String, HashMap<String, Catalog>>,
}

impl TomlTranslations {
    pub fn from_toml(path: &Path, source: &str) -> Result<Self, InfraError> {
        let locales = toml::from_str(source).map_err(|err| InfraError::translations(path, err))?;
        Ok(Self { locales })
    }

    #[instrument(fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, InfraError> {
        let source = tokio::fs::read_to_string(path).await?;
        let translations = Self::from_toml(path, &source)?;
        debug!(locales = translations.locales.len(), "translations loaded");
        Ok(translations)
    }

    fn lookup(&self, locale: &str, catalog: &str, message: &str) -> Option<&str> {
        self.locales
            .get(locale)
            .and_then(|catalogs| catalogs.get(catalog))
            .and_then(|messages| messages.get(message))
            .map(String::as_str)
    }
}

impl Translator for TomlTranslations {
    fn translate(&self, locale: &str, catalog: &str, message: &str) -> String {
        let language = locale.split(['_', '-']).next().unwrap_or(locale);

        self.lookup(locale, catalog, message)
            .or_else(|| self.lookup(language, catalog, message))
            .unwrap_or(message)
            .to_string()
    }
}
