//! Hosted embedding models through siumai.

use async_trait::async_trait;
use lectern_core::{LecternError, Result, config::EmbedderConfig, traits::Embedder};
use siumai::{
    LlmError,
    providers::openai::{OpenAiConfig, OpenAiEmbeddings},
    traits::EmbeddingCapability,
};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const MAX_RETRIES: u32 = 2;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Embedder backed by an OpenAI-compatible embeddings endpoint.
///
/// The configured model must be the one used at ingestion time. Vectors of
/// the wrong dimension are rejected rather than silently compared.
pub struct ApiEmbedder {
    config: EmbedderConfig,
    client: Box<dyn EmbeddingCapability + Send + Sync>,
}

impl std::fmt::Debug for ApiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiEmbedder")
            .field("provider", &self.config.provider)
            .field("model", &self.config.model)
            .field("dimension", &self.config.dimension)
            .finish_non_exhaustive()
    }
}

impl ApiEmbedder {
    /// Create an embedder from configuration.
    pub fn from_config(config: EmbedderConfig) -> Result<Self> {
        config.validate()?;
        if !matches!(config.provider.to_lowercase().as_str(), "openai" | "ollama") {
            return Err(LecternError::configuration(format!(
                "Embedding provider '{}' is not supported",
                config.provider
            )));
        }
        let api_key = config.effective_api_key().unwrap_or_default();
        if api_key.is_empty() && config.provider.eq_ignore_ascii_case("openai") {
            return Err(LecternError::configuration(
                "An API key is required for OpenAI embeddings",
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LecternError::configuration(format!("Failed to create HTTP client: {e}")))?;

        let mut openai_config = OpenAiConfig::new(&api_key).with_model(&config.model);
        if let Some(base_url) = &config.base_url {
            openai_config = openai_config.with_base_url(base_url);
        } else if config.provider.eq_ignore_ascii_case("ollama") {
            openai_config = openai_config.with_base_url("http://localhost:11434/v1");
        }

        info!(
            provider = %config.provider,
            model = %config.model,
            dimension = config.dimension,
            "Created ApiEmbedder"
        );
        Ok(Self {
            client: Box::new(OpenAiEmbeddings::new(openai_config, http_client)),
            config,
        })
    }

    async fn request(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0;
        loop {
            match self.client.embed(texts.clone()).await {
                Ok(response) => {
                    debug!(count = response.embeddings.len(), attempt, "Embeddings received");
                    return Ok(response.embeddings);
                }
                Err(e) => {
                    let error = classify(&e);
                    if attempt >= MAX_RETRIES || !error.is_retryable() {
                        return Err(error);
                    }
                    let delay = Duration::from_millis(500 * 2_u64.pow(attempt));
                    warn!(attempt, ?delay, error = %e, "Embedding request failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() == self.config.dimension {
            Ok(())
        } else {
            Err(LecternError::embedding(format!(
                "Model '{}' returned {} dimensions, expected {}",
                self.config.model,
                embedding.len(),
                self.config.dimension
            )))
        }
    }
}

/// Timeouts, connection failures, 5xx and 429 responses are retried; anything
/// else (bad key, unknown model, malformed input) fails on the first attempt.
fn classify(error: &LlmError) -> LecternError {
    match error {
        LlmError::TimeoutError(_) => LecternError::timeout(format!("embedding request: {error}")),
        e if e.is_retryable() => LecternError::unavailable("embeddings", e.to_string()),
        e => LecternError::embedding(e.to_string()),
    }
}

#[async_trait]
impl Embedder for ApiEmbedder {
    #[instrument(skip(self, text), fields(model = %self.config.model, chars = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self
            .request(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LecternError::embedding("Empty embedding response"))?;
        self.check_dimension(&embedding)?;
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: Vec<&str>) -> Result<Vec<Vec<f32>>> {
        let expected = texts.len();
        let embeddings = self
            .request(texts.into_iter().map(str::to_string).collect())
            .await?;
        if embeddings.len() != expected {
            return Err(LecternError::embedding(format!(
                "Expected {expected} embeddings, received {}",
                embeddings.len()
            )));
        }
        for embedding in &embeddings {
            self.check_dimension(embedding)?;
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn max_input_chars(&self) -> Option<usize> {
        Some(self.config.max_input_chars)
    }

    async fn health_check(&self) -> Result<()> {
        self.embed("health check").await.map(|_| ())
    }
}
