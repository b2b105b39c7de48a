//! Full pipeline over a library loaded from a JSON snapshot.

use futures::StreamExt;
use lectern::prelude::*;
use lectern::query::{audit::MemoryInteractionLog, testing::ScriptedLanguageModel};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use uuid::Uuid;

async fn saved_library(owner: Uuid, embedder: &HashingEmbedder) -> (tempfile::TempDir, std::path::PathBuf) {
    let library = InMemoryLibrary::new();
    library.add_category(owner, Category::root("Research")).await;
    for (title, summary, tag, read) in [
        ("Attention Is All You Need", "Transformers replace recurrence with attention.", "machine-learning", true),
        ("Scaling laws", "Loss falls predictably with compute.", "machine-learning", false),
        ("Knife skills", "Keep the blade sharp and the board steady.", "cooking", false),
    ] {
        library
            .add_article(
                Article::new(owner, title)
                    .with_summary(summary)
                    .with_source_type(SourceType::Arxiv)
                    .with_category("Research")
                    .with_tag(tag)
                    .with_read(read)
                    .with_embedding(embedder.embed_text(&format!("{title} {summary}"))),
            )
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("library.json");
    library.save(&path).await.unwrap();
    (dir, path)
}

fn router(
    library: Arc<InMemoryLibrary>,
    embedder: HashingEmbedder,
    model: Arc<ScriptedLanguageModel>,
    audit: Arc<MemoryInteractionLog>,
) -> QueryRouter {
    let mut config = AskConfig::default();
    config.classifier.strategy = ClassifierStrategy::Rules;
    QueryRouter::builder()
        .lexical(library.clone())
        .vector(library.clone())
        .catalog(library)
        .embedder(Arc::new(embedder))
        .model(model)
        .audit(audit)
        .config(config)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_metadata_and_content_from_saved_library() {
    let owner = Uuid::new_v4();
    let embedder = HashingEmbedder::new(256).unwrap();
    let (_dir, path) = saved_library(owner, &embedder).await;
    let library = Arc::new(InMemoryLibrary::load(&path).await.unwrap());

    let model = Arc::new(ScriptedLanguageModel::new(vec![
        "Attention replaces recurrence [1].",
    ]));
    let audit = Arc::new(MemoryInteractionLog::new());
    let router = router(library, embedder, model.clone(), audit.clone());

    let count = router
        .ask(&Query::new(owner, "How many articles do I have tagged machine-learning?"))
        .await
        .unwrap();
    assert_eq!(count.route, QueryKind::Metadata);
    assert_eq!(count.answer.text, "You have 2 articles tagged \"machine-learning\".");

    let unread = router
        .ask(&Query::new(owner, "Show my unread articles"))
        .await
        .unwrap();
    assert_eq!(unread.route, QueryKind::Metadata);
    assert_eq!(unread.answer.references.len(), 2);

    let content = router
        .ask(&Query::new(owner, "What does the paper about attention say about recurrence?"))
        .await
        .unwrap();
    assert_eq!(content.route, QueryKind::Content);
    assert_eq!(content.answer.references[0].title, "Attention Is All You Need");
    assert_eq!(model.call_count(), 1);

    let routes: Vec<QueryKind> = audit.entries().iter().map(|e| e.route).collect();
    assert_eq!(routes, vec![QueryKind::Metadata, QueryKind::Metadata, QueryKind::Content]);
}

#[tokio::test]
async fn test_absent_topic_gets_fixed_answer_end_to_end() {
    let owner = Uuid::new_v4();
    let embedder = HashingEmbedder::new(256).unwrap();
    let (_dir, path) = saved_library(owner, &embedder).await;
    let library = Arc::new(InMemoryLibrary::load(&path).await.unwrap());

    let model = Arc::new(ScriptedLanguageModel::new(vec!["unused"]));
    let audit = Arc::new(MemoryInteractionLog::new());
    let router = router(library, embedder, model.clone(), audit.clone());

    let query = Query::new(owner, "What is the history of the Roman empire?");
    let response = router.ask(&query).await.unwrap();
    assert_eq!(response.route, QueryKind::Content);
    assert!(response.answer.is_no_relevant_documents());
    assert!(response.answer.references.is_empty());

    let stream = router.ask_stream(&query).await.unwrap();
    let events: Vec<AnswerEvent> = stream
        .events
        .map(|event| event.unwrap())
        .collect()
        .await;
    assert!(matches!(events.last(), Some(AnswerEvent::Citations(refs)) if refs.is_empty()));

    assert_eq!(model.call_count(), 0);
    let entries = audit.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.reference_ids.is_empty() && !e.failed));
}

#[tokio::test]
async fn test_streaming_failure_ends_without_citations() {
    let owner = Uuid::new_v4();
    let embedder = HashingEmbedder::new(256).unwrap();
    let (_dir, path) = saved_library(owner, &embedder).await;
    let library = Arc::new(InMemoryLibrary::load(&path).await.unwrap());

    let model = Arc::new(
        ScriptedLanguageModel::new(vec!["Attention replaces recurrence entirely."])
            .with_chunk_chars(4)
            .with_stream_failure_after(2),
    );
    let audit = Arc::new(MemoryInteractionLog::new());
    let router = router(library, embedder, model, audit.clone());

    let stream = router
        .ask_stream(&Query::new(owner, "What does the paper about attention say about recurrence?"))
        .await
        .unwrap();
    let events: Vec<Result<AnswerEvent>> = stream.events.collect().await;

    assert!(events.last().unwrap().is_err());
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, Ok(AnswerEvent::Citations(_))))
    );
    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].failed);
}
