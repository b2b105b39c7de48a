//! Ask questions about a small demo library.
//!
//! Runs offline with the rule-based classifier and a scripted model unless
//! `OPENAI_API_KEY` is set, in which case answers come from the configured
//! OpenAI model. Pass a question as the first argument, or run the built-in
//! set.
//!
//! ```sh
//! RUST_LOG=lectern=debug cargo run --example ask_library -- "How many articles are tagged rust?"
//! ```

use anyhow::Result;
use futures::StreamExt;
use lectern::prelude::*;
use lectern::query::testing::ScriptedLanguageModel;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEMO_QUESTIONS: &[&str] = &[
    "How many articles do I have tagged rust?",
    "What categories do I have?",
    "What does the article about ownership say about borrowing?",
    "What do my notes say about volcano eruptions?",
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let owner = Uuid::new_v4();
    let embedder = Arc::new(HashingEmbedder::new(256)?);
    let library = Arc::new(demo_library(owner, &embedder).await);
    info!(articles = library.len().await, "Demo library ready");

    let router = if std::env::var("OPENAI_API_KEY").is_ok() {
        build_router(AskConfig::default(), library, embedder).await?
    } else {
        let mut config = AskConfig::default();
        config.classifier.strategy = ClassifierStrategy::Rules;
        QueryRouter::builder()
            .lexical(library.clone())
            .vector(library.clone())
            .catalog(library)
            .embedder(embedder)
            .model(Arc::new(ScriptedLanguageModel::new(vec![
                "Borrowing lets code use a value without taking ownership of it [1].",
            ])))
            .token_counter(lectern::core::traits::default_token_counter()?)
            .config(config)
            .build()?
    };

    let questions: Vec<String> = match std::env::args().nth(1) {
        Some(question) => vec![question],
        None => DEMO_QUESTIONS.iter().map(ToString::to_string).collect(),
    };

    for question in questions {
        println!("\n> {question}");
        let stream = router.ask_stream(&Query::new(owner, question)).await?;
        let mut events = stream.events;
        while let Some(event) = events.next().await {
            match event? {
                AnswerEvent::Delta(text) => print!("{text}"),
                AnswerEvent::Citations(references) => {
                    println!();
                    for (i, reference) in references.iter().enumerate() {
                        println!("  [{}] {}", i + 1, reference.title);
                    }
                }
            }
        }
    }
    Ok(())
}

async fn demo_library(owner: Uuid, embedder: &HashingEmbedder) -> InMemoryLibrary {
    let library = InMemoryLibrary::new();
    library.add_category(owner, Category::root("Programming")).await;
    library
        .add_category(owner, Category::child("Rust", "Programming"))
        .await;
    library.add_category(owner, Category::root("Cooking")).await;

    let articles = [
        (
            "Understanding ownership",
            "Every value has one owner. Borrowing hands out references without moving the value.",
            "Rust",
            "rust",
        ),
        (
            "Fearless concurrency",
            "Send and Sync mark which types may cross thread boundaries.",
            "Rust",
            "rust",
        ),
        (
            "Pagination patterns for APIs",
            "Cursor pagination keeps pages stable while rows are inserted.",
            "Programming",
            "api-design",
        ),
    ];
    for (title, body, category, tag) in articles {
        library
            .add_article(
                Article::new(owner, title)
                    .with_body(body)
                    .with_category(category)
                    .with_tag(tag)
                    .with_embedding(embedder.embed_text(&format!("{title}\n{body}"))),
            )
            .await;
    }
    library
}
