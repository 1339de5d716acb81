//! Fragment cache keys.
//!
//! A fragment is identified by its section, the widget instance uid, the
//! request parameters it depends on and the configuration it was rendered
//! with. Parameters and configuration are folded into a SHA-256 fingerprint.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Part of the page a fragment is inserted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Body,
    Header,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Body => "body",
            Section::Header => "header",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown fragment section `{0}`")]
pub struct UnknownSection(pub String);

impl FromStr for Section {
    type Err = UnknownSection;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "body" => Ok(Section::Body),
            "header" => Ok(Section::Header),
            other => Err(UnknownSection(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FragmentKey {
    section: Section,
    uid: String,
    config_key: String,
    fingerprint: String,
}

impl FragmentKey {
    pub fn new<C: Serialize>(
        section: Section,
        uid: impl Into<String>,
        params: &BTreeMap<String, String>,
        config_key: impl Into<String>,
        config: &C,
    ) -> Self {
        Self {
            section,
            uid: uid.into(),
            config_key: config_key.into(),
            fingerprint: fingerprint(params, config),
        }
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn config_key(&self) -> &str {
        &self.config_key
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.config_key, self.section, self.uid, self.fingerprint
        )
    }
}

/// Hash request parameters and configuration into a hex digest.
///
/// Values that fail to serialize contribute nothing, so the digest stays
/// deterministic for a given input.
pub fn fingerprint<P: Serialize, C: Serialize>(params: &P, config: &C) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(params).unwrap_or_default());
    hasher.update([0u8]);
    hasher.update(serde_json::to_vec(config).unwrap_or_default());
    hex::encode(hasher.finalize())
}
