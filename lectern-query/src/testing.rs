//! Test doubles for the collaborator traits.
//!
//! These are deterministic, need no network access, and record how they were
//! called so tests can assert on side effects such as "no generation call was
//! made".

use async_trait::async_trait;
use futures::{StreamExt, stream};
use lectern_core::{
    LecternError, Result,
    traits::{CompletionRequest, Embedder, LanguageModel, LexicalIndex, TextStream, VectorIndex},
    types::{Query, SearchHit},
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Characters per streamed chunk.
const DEFAULT_CHUNK_CHARS: usize = 8;

/// A language model that replays canned replies in order.
///
/// The last reply repeats once the script runs out.
#[derive(Debug)]
pub struct ScriptedLanguageModel {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    failure: Option<String>,
    delay: Option<Duration>,
    chunk_delay: Option<Duration>,
    chunk_chars: usize,
    fail_stream_after: Option<usize>,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLanguageModel {
    /// A model answering with `replies`, one per call.
    pub fn new<S: Into<String>>(replies: Vec<S>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            last: Mutex::new(None),
            failure: None,
            delay: None,
            chunk_delay: None,
            chunk_chars: DEFAULT_CHUNK_CHARS,
            fail_stream_after: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A model whose every call fails with `message`.
    pub fn failing<S: Into<String>>(message: S) -> Self {
        let mut model = Self::new(Vec::<String>::new());
        model.failure = Some(message.into());
        model
    }

    /// Wait `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Wait `delay` before each streamed chunk.
    #[must_use]
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Stream replies in chunks of `chars` characters.
    #[must_use]
    pub fn with_chunk_chars(mut self, chars: usize) -> Self {
        self.chunk_chars = chars.max(1);
        self
    }

    /// Fail a stream after it has produced `chunks` chunks.
    #[must_use]
    pub fn with_stream_failure_after(mut self, chunks: usize) -> Self {
        self.fail_stream_after = Some(chunks);
        self
    }

    /// Number of completion calls made so far, streaming included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn next_reply(&self, request: CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(LecternError::llm(message.clone()));
        }

        let next = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        match next {
            Some(reply) => {
                *last = Some(reply.clone());
                Ok(reply)
            }
            None => last
                .clone()
                .ok_or_else(|| LecternError::llm("scripted model has no replies")),
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedLanguageModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.next_reply(request).await
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<TextStream> {
        let reply = self.next_reply(request).await?;
        let chars: Vec<char> = reply.chars().collect();
        let mut chunks: Vec<Result<String>> = chars
            .chunks(self.chunk_chars)
            .map(|chunk| Ok(chunk.iter().collect()))
            .collect();
        if let Some(after) = self.fail_stream_after {
            chunks.truncate(after);
            chunks.push(Err(LecternError::llm("stream interrupted")));
        }

        let chunk_delay = self.chunk_delay;
        let stream = stream::iter(chunks).then(move |chunk| async move {
            if let Some(delay) = chunk_delay {
                tokio::time::sleep(delay).await;
            }
            chunk
        });
        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A lexical index returning fixed hits.
#[derive(Debug, Default)]
pub struct StaticLexicalIndex {
    hits: Vec<SearchHit>,
    calls: AtomicUsize,
}

impl StaticLexicalIndex {
    /// An index returning `hits` (best first) for every query.
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of searches run.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LexicalIndex for StaticLexicalIndex {
    async fn lexical_search(&self, _query: &Query, limit: usize) -> Result<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.hits.iter().take(limit).cloned().collect())
    }
}

/// A vector index returning fixed hits.
#[derive(Debug, Default)]
pub struct StaticVectorIndex {
    hits: Vec<SearchHit>,
    calls: AtomicUsize,
}

impl StaticVectorIndex {
    /// An index returning `hits` (best first) for every query.
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of searches run.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for StaticVectorIndex {
    async fn vector_search(
        &self,
        _query: &Query,
        _embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.hits.iter().take(limit).cloned().collect())
    }
}

/// A lexical index that is always down.
#[derive(Debug, Clone)]
pub struct FailingLexicalIndex {
    message: String,
}

impl FailingLexicalIndex {
    /// Fail every search with `message`.
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl LexicalIndex for FailingLexicalIndex {
    async fn lexical_search(&self, _query: &Query, _limit: usize) -> Result<Vec<SearchHit>> {
        Err(LecternError::search(self.name(), self.message.clone()))
    }
}

/// A vector index that is always down.
#[derive(Debug, Clone)]
pub struct FailingVectorIndex {
    message: String,
}

impl FailingVectorIndex {
    /// Fail every search with `message`.
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl VectorIndex for FailingVectorIndex {
    async fn vector_search(
        &self,
        _query: &Query,
        _embedding: &[f32],
        _limit: usize,
    ) -> Result<Vec<SearchHit>> {
        Err(LecternError::search(self.name(), self.message.clone()))
    }
}

/// An embedder returning the same vector for every text.
#[derive(Debug)]
pub struct StaticEmbedder {
    vector: Vec<f32>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl StaticEmbedder {
    /// Embed everything as a unit vector of `dimension` entries.
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        #[allow(clippy::cast_precision_loss)]
        let value = 1.0 / (dimension as f32).sqrt();
        Self::with_vector(vec![value; dimension])
    }

    /// Embed everything as `vector`.
    pub fn with_vector(vector: Vec<f32>) -> Self {
        Self {
            vector,
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// An embedder whose every call fails with `message`.
    pub fn failing<S: Into<String>>(dimension: usize, message: S) -> Self {
        let mut embedder = Self::new(dimension);
        embedder.failure = Some(message.into());
        embedder
    }

    /// Number of embedding calls made.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for StaticEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(LecternError::embedding(message.clone())),
            None => Ok(self.vector.clone()),
        }
    }

    fn dimension(&self) -> usize {
        self.vector.len()
    }

    fn model_name(&self) -> &str {
        "static"
    }
}
