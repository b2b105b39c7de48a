//! # Lectern
//!
//! Answers questions about a personal document library. Each question is
//! routed either to a structured metadata operation ("how many articles are
//! tagged rust?") or to hybrid retrieval followed by a grounded, cited answer
//! ("what did the transformer paper conclude?").
//!
//! ## Quick Start
//!
//! ```rust
//! use lectern::prelude::*;
//! use lectern::query::testing::ScriptedLanguageModel;
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! # tokio_test::block_on(async {
//! let owner = Uuid::new_v4();
//! let library = Arc::new(InMemoryLibrary::new());
//! library
//!     .add_article(Article::new(owner, "Ownership").with_tag("rust"))
//!     .await;
//!
//! let mut config = AskConfig::default();
//! config.classifier.strategy = ClassifierStrategy::Rules;
//!
//! let router = QueryRouter::builder()
//!     .lexical(library.clone())
//!     .vector(library.clone())
//!     .catalog(library)
//!     .embedder(Arc::new(HashingEmbedder::new(64).unwrap()))
//!     .model(Arc::new(ScriptedLanguageModel::new(vec!["unused"])))
//!     .config(config)
//!     .build()
//!     .unwrap();
//!
//! let response = router
//!     .ask(&Query::new(owner, "How many articles are tagged rust?"))
//!     .await
//!     .unwrap();
//! assert_eq!(response.answer.text, "You have 1 article tagged \"rust\".");
//! # });
//! ```
//!
//! ## Architecture
//!
//! - **lectern-core**: types, collaborator traits, configuration and errors
//! - **lectern-query**: classifier, hybrid retriever, context assembler,
//!   synthesizer, metadata executor and router
//! - **lectern-integrations**: library backends and embedders

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::sync::Arc;

use lectern_core::{
    Result,
    config::AskConfig,
    traits::{Embedder, LexicalIndex, LibraryCatalog, VectorIndex, default_token_counter},
};
use lectern_query::{QueryRouter, factory::SiumaiModelFactory};
use tracing::info;

// Re-export all public APIs from sub-crates
pub use lectern_core as core;
pub use lectern_integrations as integrations;
pub use lectern_query as query;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use lectern_query::prelude::*;

    pub use lectern_integrations::{HashingEmbedder, InMemoryLibrary, LibrarySnapshot};

    #[cfg(feature = "api")]
    pub use lectern_integrations::ApiEmbedder;

    #[cfg(feature = "postgres")]
    pub use lectern_integrations::PgLibrary;

    pub use crate::build_router;
}

/// Version information for Lectern.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build a router over one library backend, creating the generative-model
/// clients from `config.llm`.
///
/// `library` serves as lexical index, vector index and catalog. The
/// embedder must be the one the library's article embeddings came from.
/// Context budgets are counted with [`default_token_counter`], which is the
/// `cl100k_base` BPE when the `tiktoken` feature is enabled.
pub async fn build_router<L>(
    config: AskConfig,
    library: Arc<L>,
    embedder: Arc<dyn Embedder>,
) -> Result<QueryRouter>
where
    L: LexicalIndex + VectorIndex + LibraryCatalog + 'static,
{
    let clients = SiumaiModelFactory::new().create_clients(&config).await?;
    let token_counter = default_token_counter()?;
    info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        strategy = %config.classifier.strategy,
        tokenizer = token_counter.name(),
        "Building Lectern router"
    );

    QueryRouter::builder()
        .lexical(library.clone())
        .vector(library.clone())
        .catalog(library)
        .embedder(embedder)
        .model(clients.synthesizer)
        .classifier_model(clients.classifier)
        .token_counter(token_counter)
        .config(config)
        .build()
}
