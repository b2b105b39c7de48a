//! Language model backed by the siumai client.

use async_trait::async_trait;
use futures::StreamExt;
use lectern_core::{
    LecternError, Result,
    traits::{CompletionRequest, LanguageModel, TextStream},
};
use siumai::prelude::*;
use tracing::{debug, instrument, warn};

/// A [`LanguageModel`] over any siumai provider.
///
/// Sampling settings (temperature, output cap) are fixed when the client is
/// built; see [`crate::factory`]. Per-request overrides are not forwarded.
///
/// # Examples
///
/// ```rust,no_run
/// use lectern_query::generator::SiumaiLanguageModel;
/// use siumai::prelude::*;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Siumai::builder()
///     .openai()
///     .api_key("your-api-key")
///     .model("gpt-4o-mini")
///     .build()
///     .await?;
/// let model = SiumaiLanguageModel::new(client, "gpt-4o-mini");
/// # Ok(())
/// # }
/// ```
pub struct SiumaiLanguageModel {
    client: Siumai,
    model: String,
}

impl std::fmt::Debug for SiumaiLanguageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiumaiLanguageModel")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl SiumaiLanguageModel {
    /// Wrap a built client.
    pub fn new<S: Into<String>>(client: Siumai, model: S) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    fn messages(request: &CompletionRequest) -> Vec<ChatMessage> {
        if request.temperature.is_some() || request.max_tokens.is_some() {
            debug!("Request sampling overrides are fixed by the client configuration");
        }
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage::system(system).build());
        }
        messages.push(ChatMessage::user(&request.prompt).build());
        messages
    }
}

#[async_trait]
impl LanguageModel for SiumaiLanguageModel {
    #[instrument(skip(self, request), fields(model = %self.model, prompt_chars = request.prompt.len()))]
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let response = self
            .client
            .chat(Self::messages(&request))
            .await
            .map_err(|e| model_error("Generation failed", &e))?;

        let text = response.content.all_text();
        debug!(chars = text.len(), "Model replied");
        Ok(text)
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn complete_stream(&self, request: CompletionRequest) -> Result<TextStream> {
        let stream = self
            .client
            .chat_stream(Self::messages(&request), None)
            .await
            .map_err(|e| {
                let error = model_error("Failed to start streaming", &e);
                warn!(retryable = error.is_retryable(), "Streaming failed to start: {e}");
                error
            })?;

        // StreamEnd repeats the full text, so only deltas are forwarded.
        let deltas = stream.filter_map(|event| async move {
            match event {
                Ok(siumai::types::ChatStreamEvent::ContentDelta { delta, .. }) => Some(Ok(delta)),
                Ok(_) => None,
                Err(e) => Some(Err(model_error("Stream error", &e))),
            }
        });
        Ok(Box::pin(deltas))
    }

    fn name(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<()> {
        self.client
            .chat(vec![ChatMessage::user("Hello").build()])
            .await
            .map_err(|e| model_error("Health check failed", &e))?;
        Ok(())
    }
}

/// Provider timeouts keep their own variant so callers can tell them apart
/// from a model that answered with an error.
fn model_error(context: &str, error: &LlmError) -> LecternError {
    match error {
        LlmError::TimeoutError(_) => LecternError::timeout(format!("{context}: {error}")),
        e => LecternError::llm(format!("{context}: {e}")),
    }
}
