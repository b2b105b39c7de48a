//! Generative model trait.
//!
//! The engine talks to a language model in two places: the classifier's
//! structured call and the synthesizer's grounded generation. Both go through
//! [`LanguageModel`], so tests can substitute a scripted implementation.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::Result;

/// Stream of generated text increments.
///
/// Dropping the stream stops consumption; implementations backed by a network
/// call should abort the request when that happens.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A single completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// System instruction.
    pub system: Option<String>,
    /// User prompt.
    pub prompt: String,
    /// Sampling temperature override.
    pub temperature: Option<f32>,
    /// Output token cap override.
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// A request with only a user prompt.
    pub fn new<S: Into<String>>(prompt: S) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the system instruction.
    #[must_use]
    pub fn with_system<S: Into<String>>(mut self, system: S) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the output token cap.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A chat-completion capable model.
#[async_trait]
pub trait LanguageModel: Send + Sync + std::fmt::Debug {
    /// Run the request to completion and return the full text.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Run the request and stream text increments as they arrive.
    async fn complete_stream(&self, request: CompletionRequest) -> Result<TextStream>;

    /// Human-readable model name.
    fn name(&self) -> &str;

    /// Check if the model endpoint is reachable.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
