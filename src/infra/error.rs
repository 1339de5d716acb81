use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read product catalog `{path}`: {source}")]
    Catalog {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read translations `{path}`: {source}")]
    Translations {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

impl InfraError {
    pub fn catalog(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Catalog {
            path: path.into(),
            source,
        }
    }

    pub fn translations(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::Translations {
            path: path.into(),
            source,
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
