//! Grounded answer generation.
//!
//! The citation list is always computed from the assembled context, never
//! read back from model output. An empty context short-circuits to the fixed
//! "no relevant documents" answer without a model call.

use futures::{StreamExt, stream};
use lectern_core::{
    LecternError, Result,
    config::SynthesisConfig,
    traits::{CompletionRequest, LanguageModel, TextStream},
    types::{
        Answer, AnswerEvent, AnswerStream, ArticleReference, AssembledContext, NO_RELEVANT_DOCUMENTS,
    },
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::prompts::{ANSWER_SYSTEM_PROMPT, answer_prompt};

/// Calls the language model with the question and assembled context.
#[derive(Debug, Clone)]
pub struct AnswerSynthesizer {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
    temperature: f32,
    max_tokens: u32,
}

impl AnswerSynthesizer {
    /// Create a synthesizer with default settings.
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self::from_config(model, &SynthesisConfig::default())
    }

    /// Create a synthesizer from configuration.
    pub fn from_config(model: Arc<dyn LanguageModel>, config: &SynthesisConfig) -> Self {
        Self {
            model,
            timeout: config.timeout(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Set the generation timeout.
    ///
    /// For streaming this bounds the wait for the stream to open and the
    /// wait between consecutive chunks.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The model in use.
    pub fn model(&self) -> &Arc<dyn LanguageModel> {
        &self.model
    }

    fn request(&self, question: &str, context: &AssembledContext) -> CompletionRequest {
        CompletionRequest::new(answer_prompt(question, &context.render()))
            .with_system(ANSWER_SYSTEM_PROMPT)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }

    /// Generate a complete answer.
    #[instrument(skip(self, question, context), fields(model = self.model.name(), passages = context.len()))]
    pub async fn synthesize(&self, question: &str, context: &AssembledContext) -> Result<Answer> {
        if context.is_empty() {
            info!("Empty context, answering without generation");
            return Ok(Answer::no_relevant_documents());
        }

        let request = self.request(question, context);
        let text = tokio::time::timeout(self.timeout, self.model.complete(request))
            .await
            .map_err(|_| {
                warn!(timeout_secs = self.timeout.as_secs(), "Answer generation timed out");
                LecternError::timeout("answer generation")
            })??;

        let text = text.trim();
        if text.is_empty() {
            return Err(LecternError::llm("Model returned an empty answer"));
        }
        debug!(chars = text.len(), "Answer generated");
        Ok(Answer::new(text, context.references()))
    }

    /// Generate an answer as a stream of deltas ending in one citations event.
    ///
    /// Dropping the returned stream drops the model stream with it.
    #[instrument(skip(self, question, context), fields(model = self.model.name(), passages = context.len()))]
    pub async fn synthesize_stream(
        &self,
        question: &str,
        context: &AssembledContext,
    ) -> Result<AnswerStream> {
        if context.is_empty() {
            info!("Empty context, streaming the fixed answer");
            return Ok(fixed_stream(NO_RELEVANT_DOCUMENTS.to_string(), Vec::new()));
        }

        let request = self.request(question, context);
        let chunks = tokio::time::timeout(self.timeout, self.model.complete_stream(request))
            .await
            .map_err(|_| LecternError::timeout("answer generation"))??;

        Ok(citing_stream(chunks, context.references(), self.timeout))
    }
}

/// A delta followed by citations.
pub fn fixed_stream(text: String, references: Vec<ArticleReference>) -> AnswerStream {
    Box::pin(stream::iter([
        Ok(AnswerEvent::Delta(text)),
        Ok(AnswerEvent::Citations(references)),
    ]))
}

enum StreamState {
    Generating {
        chunks: TextStream,
        references: Vec<ArticleReference>,
    },
    Finished,
}

/// Forward model chunks as deltas, then emit the citations once the model
/// stream ends. The first error or idle timeout ends the stream.
fn citing_stream(
    chunks: TextStream,
    references: Vec<ArticleReference>,
    idle: Duration,
) -> AnswerStream {
    let chunks: TextStream = Box::pin(
        tokio_stream::StreamExt::timeout(chunks, idle).map(|chunk| {
            chunk.unwrap_or_else(|_| Err(LecternError::timeout("answer streaming")))
        }),
    );
    let state = StreamState::Generating { chunks, references };

    Box::pin(stream::unfold(state, |state| async move {
        let StreamState::Generating {
            mut chunks,
            references,
        } = state
        else {
            return None;
        };

        match chunks.next().await {
            Some(Ok(delta)) => Some((
                Ok(AnswerEvent::Delta(delta)),
                StreamState::Generating { chunks, references },
            )),
            Some(Err(err)) => {
                warn!(error = %err, "Answer stream failed");
                Some((Err(err), StreamState::Finished))
            }
            None => {
                debug!(references = references.len(), "Answer stream complete");
                Some((Ok(AnswerEvent::Citations(references)), StreamState::Finished))
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLanguageModel;
    use futures::TryStreamExt;
    use lectern_core::types::ContextPassage;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn context(ids: &[u128]) -> AssembledContext {
        let mut context = AssembledContext::empty(1000);
        for (rank, id) in ids.iter().enumerate() {
            context.passages.push(ContextPassage {
                article_id: Uuid::from_u128(*id),
                title: format!("Article {id}"),
                text: format!("Passage from article {id}."),
                rank,
                tokens: 6,
                truncated: false,
            });
            context.token_count += 6;
        }
        context
    }

    #[tokio::test]
    async fn test_empty_context_makes_no_model_call() {
        let model = Arc::new(ScriptedLanguageModel::new(vec!["should not be used"]));
        let synthesizer = AnswerSynthesizer::new(model.clone());

        let answer = synthesizer
            .synthesize("q", &AssembledContext::empty(100))
            .await
            .unwrap();
        assert!(answer.is_no_relevant_documents());
        assert!(answer.references.is_empty());
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_references_come_from_context_not_model() {
        let model = Arc::new(ScriptedLanguageModel::new(vec![
            "According to Article 99, the answer is 42.",
        ]));
        let synthesizer = AnswerSynthesizer::new(model.clone());

        let answer = synthesizer.synthesize("q", &context(&[1, 2, 1])).await.unwrap();
        let ids: Vec<_> = answer.references.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![Uuid::from_u128(1), Uuid::from_u128(2)]);

        let request = &model.requests()[0];
        assert!(request.prompt.contains("### Article 1"));
        assert_eq!(request.system.as_deref(), Some(ANSWER_SYSTEM_PROMPT));
    }

    #[tokio::test]
    async fn test_model_failure_is_generation_failure() {
        let synthesizer =
            AnswerSynthesizer::new(Arc::new(ScriptedLanguageModel::failing("rate limited")));
        let err = synthesizer.synthesize("q", &context(&[1])).await.unwrap_err();
        assert_eq!(err.kind(), lectern_core::FailureKind::GenerationFailed);
    }

    #[tokio::test]
    async fn test_timeout() {
        let model = ScriptedLanguageModel::new(vec!["late"]).with_delay(Duration::from_millis(200));
        let synthesizer =
            AnswerSynthesizer::new(Arc::new(model)).with_timeout(Duration::from_millis(10));
        let err = synthesizer.synthesize("q", &context(&[1])).await.unwrap_err();
        assert!(matches!(err, LecternError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_stream_ends_with_citations() {
        let model = ScriptedLanguageModel::new(vec!["Grounded answer."]).with_chunk_chars(5);
        let synthesizer = AnswerSynthesizer::new(Arc::new(model));

        let events: Vec<AnswerEvent> = synthesizer
            .synthesize_stream("q", &context(&[3]))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        let (last, deltas) = events.split_last().unwrap();
        let text: String = deltas
            .iter()
            .map(|e| match e {
                AnswerEvent::Delta(d) => d.as_str(),
                AnswerEvent::Citations(_) => panic!("citations before the end"),
            })
            .collect();
        assert_eq!(text, "Grounded answer.");
        assert_eq!(
            last,
            &AnswerEvent::Citations(vec![ArticleReference {
                id: Uuid::from_u128(3),
                title: "Article 3".into(),
            }])
        );
    }

    #[tokio::test]
    async fn test_empty_context_stream() {
        let model = Arc::new(ScriptedLanguageModel::new(vec!["unused"]));
        let synthesizer = AnswerSynthesizer::new(model.clone());
        let events: Vec<AnswerEvent> = synthesizer
            .synthesize_stream("q", &AssembledContext::empty(10))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(
            events,
            vec![
                AnswerEvent::Delta(NO_RELEVANT_DOCUMENTS.to_string()),
                AnswerEvent::Citations(Vec::new()),
            ]
        );
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_error_ends_without_citations() {
        let model = ScriptedLanguageModel::new(vec!["partial answer here"])
            .with_chunk_chars(4)
            .with_stream_failure_after(2);
        let synthesizer = AnswerSynthesizer::new(Arc::new(model));
        let mut stream = synthesizer.synthesize_stream("q", &context(&[1])).await.unwrap();

        let mut deltas = 0;
        let mut failed = false;
        while let Some(event) = stream.next().await {
            match event {
                Ok(AnswerEvent::Delta(_)) => deltas += 1,
                Ok(AnswerEvent::Citations(_)) => panic!("citations after a failure"),
                Err(_) => failed = true,
            }
        }
        assert_eq!(deltas, 2);
        assert!(failed);
    }

    #[tokio::test]
    async fn test_stalled_stream_times_out() {
        let model = ScriptedLanguageModel::new(vec!["slow"])
            .with_chunk_delay(Duration::from_millis(200));
        let synthesizer =
            AnswerSynthesizer::new(Arc::new(model)).with_timeout(Duration::from_millis(20));
        let mut stream = synthesizer.synthesize_stream("q", &context(&[1])).await.unwrap();
        assert!(matches!(
            stream.next().await,
            Some(Err(LecternError::Timeout { .. }))
        ));
        assert!(stream.next().await.is_none());
    }
}
