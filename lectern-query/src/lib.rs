//! Query routing and grounded answering for Lectern.
//!
//! A question enters through [`QueryRouter`], which classifies it and then
//! either runs one metadata operation against the library catalog or
//! retrieves, assembles and answers from article content:
//!
//! ```text
//! Query -> Classifier -+-> HybridRetriever -> ContextAssembler -> AnswerSynthesizer
//!                      \-> MetadataExecutor -> render
//! ```
//!
//! All model and store clients are passed in explicitly as trait objects, so
//! the whole pipeline runs against the doubles in [`testing`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lectern_query::prelude::*;
//! use lectern_core::types::Query;
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! # async fn example(router: QueryRouter) -> lectern_core::Result<()> {
//! let query = Query::new(Uuid::new_v4(), "How many articles do I have tagged rust?");
//! let response = router.ask(&query).await?;
//! println!("{} ({:?})", response.answer.text, response.route);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assembler;
pub mod audit;
pub mod classifier;
pub mod factory;
pub mod fusion;
pub mod generator;
pub mod metadata;
pub mod prompts;
pub mod retriever;
pub mod router;
pub mod synthesizer;
pub mod testing;

pub use assembler::ContextAssembler;
pub use classifier::{Classification, FallbackReason, LlmQueryClassifier, QueryClassifier, RuleBasedClassifier};
pub use fusion::ScoreFusion;
pub use metadata::MetadataExecutor;
pub use retriever::{HybridRetriever, RetrievalOutcome, ScoreFloors};
pub use router::{AnswerPayload, AskResponse, AskStream, QueryRouter, QueryRouterBuilder, Stage};
pub use synthesizer::AnswerSynthesizer;

/// Re-export commonly used types and traits.
pub mod prelude {
    pub use crate::assembler::ContextAssembler;
    pub use crate::audit::{MemoryInteractionLog, TracingInteractionLog};
    pub use crate::classifier::{
        Classification, FallbackReason, LlmQueryClassifier, QueryClassifier, RuleBasedClassifier,
    };
    pub use crate::factory::{ModelClients, SiumaiModelFactory};
    pub use crate::fusion::ScoreFusion;
    pub use crate::generator::SiumaiLanguageModel;
    pub use crate::metadata::{MetadataExecutor, render};
    pub use crate::retriever::{HybridRetriever, RetrievalOutcome, ScoreFloors};
    pub use crate::router::{AnswerPayload, AskResponse, AskStream, QueryRouter, QueryRouterBuilder, Stage};
    pub use crate::synthesizer::AnswerSynthesizer;

    pub use lectern_core::prelude::*;
}
