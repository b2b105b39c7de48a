//! # Lectern Core
//!
//! Core traits, types, and interfaces for Lectern, an engine that answers
//! questions about a personal document library.
//!
//! A question is either answered from article *content* (hybrid retrieval
//! plus grounded generation) or from library *metadata* (counts, listings).
//! This crate holds what both paths share:
//!
//! - **Data structures**: queries, intents, retrieval candidates, assembled
//!   context, answers and metadata results
//! - **Collaborator traits**: `Embedder`, `LanguageModel`, `LexicalIndex`,
//!   `VectorIndex`, `LibraryCatalog`, `TokenCounter`, `InteractionLog`
//! - **Configuration**: serde structures loaded from JSON or TOML
//! - **Error handling**: one error enum with a user-facing failure taxonomy
//!
//! ## Quick Start
//!
//! ```rust
//! use lectern_core::prelude::*;
//! use uuid::Uuid;
//!
//! let owner = Uuid::new_v4();
//! let article = Article::new(owner, "Attention Is All You Need")
//!     .with_tag("machine-learning")
//!     .with_source_type(SourceType::Arxiv);
//! assert!(ArticleFilter::tag("Machine-Learning").matches(&article));
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used types and traits
pub mod prelude;

// Core modules
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key types at crate root for convenience
pub use error::{FailureKind, LecternError, Result};
pub use types::{
    Answer, AnswerEvent, AnswerStream, Article, ArticleReference, AssembledContext,
    MetadataOperation, MetadataRequest, MetadataResult, Query, QueryIntent, QueryKind,
    RetrievalCandidate, SearchHit,
};
