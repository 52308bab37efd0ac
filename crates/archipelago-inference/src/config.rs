//! Connection settings for the advisory services.
//!
//! The binary builds these from its environment; this crate never reads
//! environment variables itself.

use std::time::Duration;

use archipelago_core::defaults;
use archipelago_core::{Error, Result};

/// Settings for the OpenAI-compatible tag suggester.
#[derive(Debug, Clone)]
pub struct SuggesterConfig {
    /// Base URL of the API, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Bearer token; local endpoints usually need none.
    pub api_key: Option<String>,
    pub model: String,
    /// Number of tags generated when the caller does not ask for a count.
    pub default_count: usize,
    pub timeout: Duration,
}

impl SuggesterConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            model: defaults::SUGGESTER_MODEL.to_string(),
            default_count: defaults::SUGGESTED_TAG_COUNT,
            timeout: Duration::from_secs(defaults::SUGGESTER_TIMEOUT_SECS),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_default_count(mut self, count: usize) -> Self {
        self.default_count = count;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("Suggester URL cannot be empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(Error::Config("Suggester model cannot be empty".to_string()));
        }
        if self.default_count == 0 || self.default_count > defaults::SUGGESTED_TAG_COUNT_MAX {
            return Err(Error::Config(format!(
                "Default tag count must be between 1 and {}",
                defaults::SUGGESTED_TAG_COUNT_MAX
            )));
        }
        Ok(())
    }
}

/// Settings for the Qdrant tag graph and the Triton inferer feeding it.
#[derive(Debug, Clone)]
pub struct TagGraphConfig {
    pub qdrant_url: String,
    pub collection: String,
    pub inferer_url: String,
    pub inferer_model: String,
    pub timeout: Duration,
}

impl TagGraphConfig {
    pub fn new(qdrant_url: impl Into<String>, inferer_url: impl Into<String>) -> Self {
        Self {
            qdrant_url: qdrant_url.into(),
            collection: defaults::TAG_GRAPH_COLLECTION.to_string(),
            inferer_url: inferer_url.into(),
            inferer_model: defaults::INFERER_MODEL.to_string(),
            timeout: Duration::from_secs(defaults::TAG_GRAPH_TIMEOUT_SECS),
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_inferer_model(mut self, model: impl Into<String>) -> Self {
        self.inferer_model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("Qdrant URL", &self.qdrant_url),
            ("Qdrant collection", &self.collection),
            ("Inferer URL", &self.inferer_url),
            ("Inferer model", &self.inferer_model),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} cannot be empty", name)));
            }
        }
        Ok(())
    }
}
