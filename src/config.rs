//! Translator configuration

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::dialect::Dialect;
use crate::error::SqlportResult;

/// Words ignored by fuzzy search unless nothing else is left.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "of", "on",
    "or", "the", "to", "with",
];

/// Main translator configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Target dialect
    pub dialect: Dialect,

    /// Alias prefix of the binary projections added for unicode columns
    pub national_marker: String,

    /// Cast target of those projections
    pub binary_type: String,

    /// ORDER BY used by ROW_NUMBER() when the statement has none
    pub fallback_order: String,

    /// Fuzzy-search stop words (lowercase)
    pub stop_words: Vec<String>,

    /// Path to a schema file (optional)
    pub schema_path: Option<PathBuf>,

    /// Database URL for the national-column metadata query (optional)
    pub database_url: Option<String>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            national_marker: "__bin_".to_string(),
            binary_type: "VARBINARY(MAX)".to_string(),
            fallback_order: "(SELECT NULL)".to_string(),
            stop_words: DEFAULT_STOP_WORDS.iter().map(|w| w.to_string()).collect(),
            schema_path: None,
            database_url: None,
        }
    }
}

impl TranslatorConfig {
    /// Create a new configuration builder
    pub fn builder() -> TranslatorConfigBuilder {
        TranslatorConfigBuilder::default()
    }

    /// Parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> SqlportResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded config from {} (dialect {})", path.display(), config.dialect);
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> SqlportResult<Self> {
        let mut config: TranslatorConfig = toml::from_str(content)?;
        for word in &mut config.stop_words {
            *word = word.to_lowercase();
        }
        Ok(config)
    }

    /// Candidate config files in lookup order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("sqlport.toml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".sqlport").join("config.toml"));
        }
        paths
    }

    /// Load the first config file found, or the defaults when there is none.
    pub fn discover() -> SqlportResult<Self> {
        match Self::search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn is_stop_word(&self, word: &str) -> bool {
        let lower = word.to_lowercase();
        self.stop_words.iter().any(|w| *w == lower)
    }
}

/// Builder for TranslatorConfig
#[derive(Debug, Default)]
pub struct TranslatorConfigBuilder {
    config: TranslatorConfig,
}

impl TranslatorConfigBuilder {
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.config.dialect = dialect;
        self
    }

    pub fn national_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.national_marker = marker.into();
        self
    }

    pub fn binary_type(mut self, binary_type: impl Into<String>) -> Self {
        self.config.binary_type = binary_type.into();
        self
    }

    pub fn fallback_order(mut self, order: impl Into<String>) -> Self {
        self.config.fallback_order = order.into();
        self
    }

    /// Replace the stop-word list.
    pub fn stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.stop_words = words.into_iter().map(|w| w.as_ref().to_lowercase()).collect();
        self
    }

    pub fn schema(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.schema_path = Some(path.into());
        self
    }

    pub fn database(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> TranslatorConfig {
        self.config
    }
}
