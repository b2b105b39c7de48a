//! The query router: one fork between content answering and metadata
//! execution.
//!
//! ```text
//! RECEIVED -> CLASSIFYING -> RETRIEVING -> ASSEMBLING -> SYNTHESIZING -> DONE
//!                         \-> EXECUTING_METADATA ---------------------> DONE
//! ```
//!
//! No stage is revisited. Errors are returned to the caller rather than
//! represented as a stage.

use futures::{StreamExt, stream};
use lectern_core::{
    LecternError, Result,
    config::{AskConfig, ClassifierStrategy},
    traits::{
        Embedder, Interaction, InteractionLog, LanguageModel, LexicalIndex, LibraryCatalog,
        TokenCounter, VectorIndex, Vocabulary,
    },
    types::{
        Answer, AnswerEvent, AnswerStream, ArticleReference, MetadataResult, Query, QueryIntent,
        QueryKind,
    },
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use strum::Display;
use tracing::{debug, info, instrument, warn};

use crate::{
    assembler::ContextAssembler,
    classifier::{Classification, LlmQueryClassifier, QueryClassifier, RuleBasedClassifier},
    metadata::{MetadataExecutor, render},
    retriever::HybridRetriever,
    synthesizer::{AnswerSynthesizer, fixed_stream},
};

/// Pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    /// The question was accepted.
    Received,
    /// The intent is being decided.
    Classifying,
    /// Hybrid search is running.
    Retrieving,
    /// Candidates are being fitted into the context budget.
    Assembling,
    /// The model is generating the answer.
    Synthesizing,
    /// A metadata operation is running.
    ExecutingMetadata,
    /// Finished.
    Done,
}

impl Stage {
    /// Whether `self` may directly follow `previous`.
    pub fn follows(self, previous: Stage) -> bool {
        matches!(
            (previous, self),
            (Stage::Received, Stage::Classifying)
                | (Stage::Classifying, Stage::Retrieving | Stage::ExecutingMetadata)
                | (Stage::Retrieving, Stage::Assembling)
                | (Stage::Assembling, Stage::Synthesizing)
                | (Stage::Synthesizing | Stage::ExecutingMetadata, Stage::Done)
        )
    }
}

/// Stages visited by one request.
#[derive(Debug, Clone)]
struct StageTrace {
    stages: Vec<Stage>,
}

impl StageTrace {
    fn new() -> Self {
        Self {
            stages: vec![Stage::Received],
        }
    }

    fn advance(&mut self, next: Stage) -> Result<()> {
        let current = self.current();
        if !next.follows(current) {
            return Err(LecternError::internal(format!(
                "Invalid stage transition {current} -> {next}"
            )));
        }
        debug!(from = %current, to = %next, "Stage transition");
        self.stages.push(next);
        Ok(())
    }

    fn current(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Received)
    }
}

/// Wire payload of a synchronous answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerPayload {
    /// Answer text.
    pub answer: String,
    /// Cited articles.
    pub articles: Vec<ArticleReference>,
}

/// Result of [`QueryRouter::ask`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskResponse {
    /// The answer and its citations.
    pub answer: Answer,
    /// Route taken.
    pub route: QueryKind,
    /// Structured result for metadata answers.
    pub metadata: Option<MetadataResult>,
    /// Why classification fell back to content, if it did.
    pub fallback: Option<String>,
    /// Indexes that failed while the other carried the query.
    pub failed_indexes: Vec<String>,
    /// Stages visited, in order.
    pub stages: Vec<Stage>,
}

impl AskResponse {
    /// The `{answer, articles}` payload.
    pub fn payload(&self) -> AnswerPayload {
        AnswerPayload {
            answer: self.answer.text.clone(),
            articles: self.answer.references.clone(),
        }
    }
}

/// Result of [`QueryRouter::ask_stream`]: the route header, then the events.
pub struct AskStream {
    /// Route taken.
    pub route: QueryKind,
    /// Why classification fell back to content, if it did.
    pub fallback: Option<String>,
    /// Deltas followed by exactly one citations event, or an error.
    pub events: AnswerStream,
}

impl std::fmt::Debug for AskStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AskStream")
            .field("route", &self.route)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

/// Top-level entry point for "ask your library".
///
/// # Examples
///
/// ```rust,no_run
/// use lectern_query::{QueryRouter, testing::*};
/// use lectern_core::{config::AskConfig, types::Query, traits::LibraryCatalog};
/// use std::sync::Arc;
/// use uuid::Uuid;
///
/// # async fn example(catalog: Arc<dyn LibraryCatalog>) -> lectern_core::Result<()> {
/// let router = QueryRouter::builder()
///     .lexical(Arc::new(StaticLexicalIndex::default()))
///     .vector(Arc::new(StaticVectorIndex::default()))
///     .embedder(Arc::new(StaticEmbedder::new(8)))
///     .catalog(catalog)
///     .model(Arc::new(ScriptedLanguageModel::new(vec![r#"{"kind": "CONTENT"}"#])))
///     .build()?;
///
/// let response = router.ask(&Query::new(Uuid::new_v4(), "What is BM25?")).await?;
/// println!("{}", response.answer.text);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct QueryRouter {
    classifier: Arc<dyn QueryClassifier>,
    retriever: HybridRetriever,
    assembler: ContextAssembler,
    synthesizer: AnswerSynthesizer,
    executor: MetadataExecutor,
    audit: Option<Arc<dyn InteractionLog>>,
    top_k: usize,
}

impl QueryRouter {
    /// Create a builder.
    pub fn builder() -> QueryRouterBuilder {
        QueryRouterBuilder::new()
    }

    /// The classifier in use.
    pub fn classifier(&self) -> &Arc<dyn QueryClassifier> {
        &self.classifier
    }

    /// Answer one question.
    #[instrument(skip(self, query), fields(owner = %query.owner_id, classifier = self.classifier.name()))]
    pub async fn ask(&self, query: &Query) -> Result<AskResponse> {
        let started = Instant::now();
        let mut route = QueryKind::Content;
        let outcome = self.answer(query, &mut route).await;

        match &outcome {
            Ok(response) => {
                info!(route = %response.route, references = response.answer.references.len(), "Question answered");
                self.record(Interaction {
                    answer: response.answer.text.clone(),
                    reference_ids: response.answer.references.iter().map(|r| r.id).collect(),
                    ..pending_interaction(query, response.route)
                }, started)
                .await;
            }
            Err(err) => {
                warn!(kind = ?err.kind(), error = %err, "Question failed");
                self.record(Interaction {
                    answer: err.user_message().to_string(),
                    failed: true,
                    ..pending_interaction(query, route)
                }, started)
                .await;
            }
        }
        outcome
    }

    async fn answer(&self, query: &Query, route: &mut QueryKind) -> Result<AskResponse> {
        validate_question(query)?;
        let mut trace = StageTrace::new();

        trace.advance(Stage::Classifying)?;
        let classification = self.classify(query).await;
        let fallback = classification.fallback.as_ref().map(ToString::to_string);
        *route = classification.intent.kind();

        match classification.intent {
            QueryIntent::Metadata(request) => {
                trace.advance(Stage::ExecutingMetadata)?;
                let result = self.executor.execute(query.owner_id, &request).await?;
                let answer = Answer::new(render(&result), result.references());
                trace.advance(Stage::Done)?;
                Ok(AskResponse {
                    answer,
                    route: QueryKind::Metadata,
                    metadata: Some(result),
                    fallback,
                    failed_indexes: Vec::new(),
                    stages: trace.stages,
                })
            }
            QueryIntent::Content => {
                trace.advance(Stage::Retrieving)?;
                let outcome = self.retriever.retrieve(query, self.top_k).await?;

                trace.advance(Stage::Assembling)?;
                let context = self.assembler.assemble(&outcome.candidates);

                trace.advance(Stage::Synthesizing)?;
                let answer = self.synthesizer.synthesize(&query.text, &context).await?;
                trace.advance(Stage::Done)?;
                Ok(AskResponse {
                    answer,
                    route: QueryKind::Content,
                    metadata: None,
                    fallback,
                    failed_indexes: outcome.failed_indexes,
                    stages: trace.stages,
                })
            }
        }
    }

    /// Answer one question as a stream.
    ///
    /// Classification, retrieval and assembly finish before this returns; the
    /// events then carry the generated text and end with the citations. The
    /// interaction is recorded when the stream ends; abandoned streams are not
    /// recorded.
    #[instrument(skip(self, query), fields(owner = %query.owner_id, classifier = self.classifier.name()))]
    pub async fn ask_stream(&self, query: &Query) -> Result<AskStream> {
        let started = Instant::now();
        validate_question(query)?;
        let mut trace = StageTrace::new();

        trace.advance(Stage::Classifying)?;
        let classification = self.classify(query).await;
        let fallback = classification.fallback.as_ref().map(ToString::to_string);

        let (route, events) = match classification.intent {
            QueryIntent::Metadata(request) => {
                trace.advance(Stage::ExecutingMetadata)?;
                let result = self.executor.execute(query.owner_id, &request).await?;
                (
                    QueryKind::Metadata,
                    fixed_stream(render(&result), result.references()),
                )
            }
            QueryIntent::Content => {
                trace.advance(Stage::Retrieving)?;
                let outcome = self.retriever.retrieve(query, self.top_k).await?;
                trace.advance(Stage::Assembling)?;
                let context = self.assembler.assemble(&outcome.candidates);
                trace.advance(Stage::Synthesizing)?;
                (
                    QueryKind::Content,
                    self.synthesizer.synthesize_stream(&query.text, &context).await?,
                )
            }
        };
        info!(%route, "Streaming answer");

        let events = match &self.audit {
            Some(log) => audited(events, log.clone(), pending_interaction(query, route), started),
            None => events,
        };
        Ok(AskStream {
            route,
            fallback,
            events,
        })
    }

    async fn classify(&self, query: &Query) -> Classification {
        let vocabulary = match self.executor.catalog().vocabulary(query.owner_id).await {
            Ok(vocabulary) => vocabulary,
            Err(err) => {
                warn!(error = %err, "Vocabulary unavailable, classifying without it");
                Vocabulary::default()
            }
        };
        self.classifier.classify(query, &vocabulary).await
    }

    async fn record(&self, mut interaction: Interaction, started: Instant) {
        let Some(log) = &self.audit else {
            return;
        };
        interaction.elapsed_ms = elapsed_ms(started);
        if let Err(err) = log.record(&interaction).await {
            warn!(error = %err, "Failed to record interaction");
        }
    }
}

fn validate_question(query: &Query) -> Result<()> {
    if query.text.trim().is_empty() {
        return Err(LecternError::validation("Question cannot be empty"));
    }
    Ok(())
}

fn pending_interaction(query: &Query, route: QueryKind) -> Interaction {
    Interaction {
        owner_id: query.owner_id,
        session_id: query.session_id.clone(),
        question: query.text.clone(),
        route,
        answer: String::new(),
        reference_ids: Vec::new(),
        failed: false,
        issued_at: query.issued_at,
        elapsed_ms: 0,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// In-flight audit record for one streamed answer.
#[derive(Debug)]
struct StreamAudit {
    interaction: Interaction,
    recorded: bool,
}

impl StreamAudit {
    /// Claim the record for writing, once.
    fn take(&mut self, started: Instant) -> Option<Interaction> {
        if self.recorded {
            return None;
        }
        self.recorded = true;
        let mut interaction = self.interaction.clone();
        interaction.elapsed_ms = elapsed_ms(started);
        Some(interaction)
    }
}

async fn write_audit(log: &dyn InteractionLog, interaction: Option<Interaction>) {
    if let Some(interaction) = interaction {
        if let Err(err) = log.record(&interaction).await {
            warn!(error = %err, "Failed to record interaction");
        }
    }
}

/// Accumulate the streamed answer and record it when the terminal event
/// (citations or an error) is emitted, before the consumer receives it.
///
/// A consumer that stops reading right after the citations still leaves an
/// audit entry. A stream dropped before its terminal event is not recorded.
fn audited(
    events: AnswerStream,
    log: Arc<dyn InteractionLog>,
    interaction: Interaction,
    started: Instant,
) -> AnswerStream {
    let state = Arc::new(Mutex::new(StreamAudit {
        interaction,
        recorded: false,
    }));

    let sink = state.clone();
    let sink_log = log.clone();
    let events = events.then(move |event| {
        let state = sink.clone();
        let log = sink_log.clone();
        async move {
            let finished = {
                let mut audit = state.lock().unwrap_or_else(PoisonError::into_inner);
                let terminal = match &event {
                    Ok(AnswerEvent::Delta(delta)) => {
                        audit.interaction.answer.push_str(delta);
                        false
                    }
                    Ok(AnswerEvent::Citations(references)) => {
                        audit.interaction.reference_ids = references.iter().map(|r| r.id).collect();
                        true
                    }
                    Err(err) => {
                        audit.interaction.failed = true;
                        audit.interaction.answer = err.user_message().to_string();
                        true
                    }
                };
                if terminal { audit.take(started) } else { None }
            };
            write_audit(log.as_ref(), finished).await;
            event
        }
    });

    // Streams that end without a terminal event are recorded at the end.
    let finish = stream::once(async move {
        let pending = state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take(started);
        write_audit(log.as_ref(), pending).await;
    })
    .filter_map(|()| async { None });

    Box::pin(events.chain(finish))
}

/// Builder for [`QueryRouter`].
#[derive(Debug, Default)]
pub struct QueryRouterBuilder {
    lexical: Option<Arc<dyn LexicalIndex>>,
    vector: Option<Arc<dyn VectorIndex>>,
    embedder: Option<Arc<dyn Embedder>>,
    catalog: Option<Arc<dyn LibraryCatalog>>,
    model: Option<Arc<dyn LanguageModel>>,
    classifier_model: Option<Arc<dyn LanguageModel>>,
    classifier: Option<Arc<dyn QueryClassifier>>,
    token_counter: Option<Arc<dyn TokenCounter>>,
    audit: Option<Arc<dyn InteractionLog>>,
    config: Option<AskConfig>,
}

impl QueryRouterBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lexical index.
    #[must_use]
    pub fn lexical(mut self, lexical: Arc<dyn LexicalIndex>) -> Self {
        self.lexical = Some(lexical);
        self
    }

    /// Set the vector index.
    #[must_use]
    pub fn vector(mut self, vector: Arc<dyn VectorIndex>) -> Self {
        self.vector = Some(vector);
        self
    }

    /// Set the query embedder.
    #[must_use]
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the metadata catalog.
    #[must_use]
    pub fn catalog(mut self, catalog: Arc<dyn LibraryCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Set the answer model. It also classifies unless a classifier model or
    /// classifier is given.
    #[must_use]
    pub fn model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Set a separate model for classification.
    #[must_use]
    pub fn classifier_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.classifier_model = Some(model);
        self
    }

    /// Use a specific classifier, overriding the configured strategy.
    #[must_use]
    pub fn classifier(mut self, classifier: Arc<dyn QueryClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Set the token counter for the context budget.
    #[must_use]
    pub fn token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.token_counter = Some(counter);
        self
    }

    /// Record finished interactions to `log`.
    #[must_use]
    pub fn audit(mut self, log: Arc<dyn InteractionLog>) -> Self {
        self.audit = Some(log);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn config(mut self, config: AskConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the router.
    pub fn build(self) -> Result<QueryRouter> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let lexical = self
            .lexical
            .ok_or_else(|| LecternError::configuration("Lexical index is required"))?;
        let vector = self
            .vector
            .ok_or_else(|| LecternError::configuration("Vector index is required"))?;
        let embedder = self
            .embedder
            .ok_or_else(|| LecternError::configuration("Embedder is required"))?;
        let catalog = self
            .catalog
            .ok_or_else(|| LecternError::configuration("Library catalog is required"))?;
        let model = self
            .model
            .ok_or_else(|| LecternError::configuration("Language model is required"))?;

        let classifier = match self.classifier {
            Some(classifier) => classifier,
            None => match config.classifier.strategy {
                ClassifierStrategy::Rules => Arc::new(
                    RuleBasedClassifier::new()
                        .with_strict_vocabulary(config.classifier.strict_vocabulary),
                ) as Arc<dyn QueryClassifier>,
                ClassifierStrategy::Llm => Arc::new(LlmQueryClassifier::from_config(
                    self.classifier_model.unwrap_or_else(|| model.clone()),
                    &config.classifier,
                )),
            },
        };

        let max_query_chars = embedder
            .max_input_chars()
            .map_or(config.embedder.max_input_chars, |limit| {
                limit.min(config.embedder.max_input_chars)
            });
        let retriever = HybridRetriever::new(lexical, vector, embedder)
            .with_config(&config.retrieval)
            .with_max_query_chars(max_query_chars);
        let mut assembler = ContextAssembler::from_config(&config.context);
        if let Some(counter) = self.token_counter {
            assembler = assembler.with_counter(counter);
        }

        debug!(
            classifier = classifier.name(),
            top_k = config.retrieval.top_k,
            budget = assembler.budget(),
            "Built query router"
        );

        Ok(QueryRouter {
            classifier,
            retriever,
            assembler,
            synthesizer: AnswerSynthesizer::from_config(model, &config.synthesis),
            executor: MetadataExecutor::new(catalog),
            audit: self.audit,
            top_k: config.retrieval.top_k,
        })
    }
}
