//! Configuration for the generative and embedding model clients.
//!
//! Both clients are built through siumai, so the provider names here are the
//! siumai providers the engine knows how to construct.

use serde::{Deserialize, Serialize};

use crate::{LecternError, Result};

/// Providers the engine can build clients for.
pub const SUPPORTED_PROVIDERS: &[&str] = &["openai", "anthropic", "ollama"];

/// Configuration for the generative model.
///
/// # Examples
///
/// ```rust
/// use lectern_core::config::LlmConfig;
///
/// let config = LlmConfig::new("openai", "gpt-4o-mini")
///     .with_api_key("sk-test")
///     .with_temperature(0.2);
/// assert!(config.validate().is_ok());
///
/// let local = LlmConfig::new("ollama", "llama3.1").with_base_url("http://localhost:11434");
/// assert!(!local.requires_api_key());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    /// Provider name ("openai", "anthropic", "ollama").
    pub provider: String,

    /// Model name or identifier.
    pub model: String,

    /// API key; falls back to `<PROVIDER>_API_KEY` when unset.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Custom base URL.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Temperature for generation (0.0 to 2.0).
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::new("openai", "gpt-4o-mini")
    }
}

impl LlmConfig {
    /// Create a new LLM configuration.
    pub fn new<S1: Into<String>, S2: Into<String>>(provider: S1, model: S2) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            api_key: None,
            base_url: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Get the effective temperature (with default).
    #[must_use]
    pub fn effective_temperature(&self) -> f32 {
        self.temperature.unwrap_or(0.3)
    }

    /// Get the effective max tokens (with default).
    #[must_use]
    pub fn effective_max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(1500)
    }

    /// API key from the config or the provider's environment variable.
    #[must_use]
    pub fn effective_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(provider_key_var(&self.provider)).ok())
    }

    /// Check if API key is required.
    #[must_use]
    pub fn requires_api_key(&self) -> bool {
        self.provider != "ollama"
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validate_provider(&self.provider)?;
        if self.model.trim().is_empty() {
            return Err(LecternError::configuration("LLM model cannot be empty"));
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(LecternError::configuration(format!(
                    "LLM temperature must be between 0.0 and 2.0, got {temperature}"
                )));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(LecternError::configuration(
                "LLM max_tokens must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Configuration for the query embedding model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedderConfig {
    /// Provider name.
    pub provider: String,

    /// Model name. Must match the model used at ingestion.
    pub model: String,

    /// API key; falls back to `<PROVIDER>_API_KEY` when unset.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Custom base URL.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Output dimension.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Longest question accepted before truncation, in characters.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

fn default_dimension() -> usize {
    768
}

fn default_max_input_chars() -> usize {
    8000
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self::new("openai", "text-embedding-3-small")
    }
}

impl EmbedderConfig {
    /// Create a new embedder configuration.
    pub fn new<S1: Into<String>, S2: Into<String>>(provider: S1, model: S2) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            api_key: None,
            base_url: None,
            dimension: default_dimension(),
            max_input_chars: default_max_input_chars(),
        }
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the output dimension.
    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// API key from the config or the provider's environment variable.
    #[must_use]
    pub fn effective_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(provider_key_var(&self.provider)).ok())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validate_provider(&self.provider)?;
        if self.model.trim().is_empty() {
            return Err(LecternError::configuration("Embedder model cannot be empty"));
        }
        if self.dimension == 0 {
            return Err(LecternError::configuration(
                "Embedding dimension must be greater than 0",
            ));
        }
        if self.max_input_chars == 0 {
            return Err(LecternError::configuration(
                "Embedder max_input_chars must be greater than 0",
            ));
        }
        Ok(())
    }
}

fn provider_key_var(provider: &str) -> String {
    format!("{}_API_KEY", provider.to_ascii_uppercase())
}

fn validate_provider(provider: &str) -> Result<()> {
    if SUPPORTED_PROVIDERS.contains(&provider) {
        Ok(())
    } else {
        Err(LecternError::configuration(format!(
            "Unsupported provider '{provider}', expected one of {SUPPORTED_PROVIDERS:?}"
        )))
    }
}
