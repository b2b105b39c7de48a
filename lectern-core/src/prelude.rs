//! Prelude module for convenient imports.
//!
//! # Examples
//!
//! ```rust
//! use lectern_core::prelude::*;
//! use uuid::Uuid;
//!
//! let query = Query::new(Uuid::new_v4(), "How many articles are tagged rust?");
//! let weights = FusionWeights::default();
//! assert!(weights.validate().is_ok());
//! ```

// Re-export core error types
pub use crate::error::{FailureKind, LecternError, Result};

// Re-export all data types
pub use crate::types::{
    Answer, AnswerEvent, AnswerStream, Article, ArticleFilter, ArticleReference, ArticleSummary,
    AssembledContext, Category, CategoryNode, ContextPassage, Dimension, LibraryStats,
    MetadataOperation, MetadataRequest, MetadataResult, ParamValue, ParamValues,
    ProcessingStatus, Query, QueryIntent, QueryKind, RetrievalCandidate, SearchHit, SourceType,
};

// Re-export collaborator traits
pub use crate::traits::{
    ApproximateTokenCounter, CompletionRequest, Embedder, Interaction, InteractionLog,
    LanguageModel, LexicalIndex, LibraryCatalog, TextStream, TokenCounter, VectorIndex,
    Vocabulary,
};

// Re-export configuration
pub use crate::config::{
    AskConfig, ClassifierConfig, ClassifierStrategy, ContextConfig, EmbedderConfig,
    FusionWeights, LlmConfig, RetrievalConfig, SynthesisConfig,
};
