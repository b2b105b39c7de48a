//! Construction of siumai-backed language models from configuration.

use lectern_core::{
    LecternError, Result,
    config::{AskConfig, LlmConfig},
    traits::LanguageModel,
};
use siumai::prelude::*;
use std::sync::Arc;
use tracing::info;

use crate::generator::SiumaiLanguageModel;

/// Output cap for the classification client.
const CLASSIFIER_MAX_TOKENS: u32 = 256;

/// Default Ollama endpoint.
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// The two model clients the engine uses.
///
/// Classification and synthesis need different sampling settings, and siumai
/// fixes those per client, so each gets its own.
#[derive(Debug, Clone)]
pub struct ModelClients {
    /// Deterministic client for intent classification.
    pub classifier: Arc<dyn LanguageModel>,
    /// Client for grounded answer generation.
    pub synthesizer: Arc<dyn LanguageModel>,
}

/// Builds [`LanguageModel`]s through siumai.
///
/// # Examples
///
/// ```rust,no_run
/// use lectern_query::factory::SiumaiModelFactory;
/// use lectern_core::config::LlmConfig;
///
/// # async fn example() -> lectern_core::Result<()> {
/// let config = LlmConfig::new("ollama", "llama3.1");
/// let model = SiumaiModelFactory::new().create_model(&config).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct SiumaiModelFactory;

impl SiumaiModelFactory {
    /// Create a new factory.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Check that `config` can be turned into a client.
    pub fn validate_config(&self, config: &LlmConfig) -> Result<()> {
        config.validate()?;
        if config.requires_api_key() && config.effective_api_key().is_none() {
            return Err(LecternError::configuration(format!(
                "API key is required for provider: {}",
                config.provider
            )));
        }
        Ok(())
    }

    /// Build one model client.
    pub async fn create_model(&self, config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
        self.validate_config(config)?;
        let client = self.create_siumai_client(config).await?;
        info!(provider = %config.provider, model = %config.model, "Created language model client");
        Ok(Arc::new(SiumaiLanguageModel::new(client, config.model.clone())))
    }

    /// Build the classifier and synthesizer clients for `config`.
    pub async fn create_clients(&self, config: &AskConfig) -> Result<ModelClients> {
        let classifier_config = config
            .llm
            .clone()
            .with_temperature(0.0)
            .with_max_tokens(CLASSIFIER_MAX_TOKENS);
        let synthesizer_config = config
            .llm
            .clone()
            .with_temperature(config.llm.temperature.unwrap_or(config.synthesis.temperature))
            .with_max_tokens(config.llm.max_tokens.unwrap_or(config.synthesis.max_tokens));

        Ok(ModelClients {
            classifier: self.create_model(&classifier_config).await?,
            synthesizer: self.create_model(&synthesizer_config).await?,
        })
    }

    async fn create_siumai_client(&self, config: &LlmConfig) -> Result<Siumai> {
        let api_key = config.effective_api_key();
        let mut builder = match config.provider.as_str() {
            "openai" => {
                let mut builder = Siumai::builder().openai();
                if let Some(api_key) = &api_key {
                    builder = builder.api_key(api_key);
                }
                if let Some(base_url) = &config.base_url {
                    builder = builder.base_url(base_url);
                }
                builder.model(&config.model)
            }
            "anthropic" => {
                let mut builder = Siumai::builder().anthropic();
                if let Some(api_key) = &api_key {
                    builder = builder.api_key(api_key);
                }
                if let Some(base_url) = &config.base_url {
                    builder = builder.base_url(base_url);
                }
                builder.model(&config.model)
            }
            "ollama" => Siumai::builder()
                .ollama()
                .base_url(config.base_url.as_deref().unwrap_or(OLLAMA_BASE_URL))
                .model(&config.model),
            other => {
                return Err(LecternError::configuration(format!(
                    "Unsupported LLM provider: {other}"
                )));
            }
        };

        builder = builder
            .temperature(config.effective_temperature())
            .max_tokens(config.effective_max_tokens());

        builder.build().await.map_err(|e| {
            LecternError::configuration(format!("Failed to create siumai client: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_requires_key_for_hosted_providers() {
        let factory = SiumaiModelFactory::new();
        assert!(
            factory
                .validate_config(&LlmConfig::new("openai", "gpt-4o-mini").with_api_key("k"))
                .is_ok()
        );
        assert!(
            factory
                .validate_config(&LlmConfig::new("ollama", "llama3.1"))
                .is_ok()
        );
        assert!(
            factory
                .validate_config(&LlmConfig::new("cohere", "command"))
                .is_err()
        );
    }
}
