//! End-to-end routing scenarios over the in-memory library.

use futures::StreamExt;
use lectern_core::{
    FailureKind,
    config::{AskConfig, ClassifierStrategy},
    traits::{Embedder, LexicalIndex, LibraryCatalog, VectorIndex},
    types::{AnswerEvent, Article, Category, MetadataResult, QueryKind, Query},
};
use lectern_integrations::InMemoryLibrary;
use lectern_query::{
    QueryRouter,
    audit::MemoryInteractionLog,
    testing::{FailingLexicalIndex, FailingVectorIndex, ScriptedLanguageModel, StaticEmbedder},
};
use std::sync::Arc;
use uuid::Uuid;

const TRANSFORMER_QUESTION: &str = "What did the article about transformer architectures conclude?";
const ANSWER: &str = "The article concludes that attention alone is enough for translation [1].";

struct Fixture {
    owner: Uuid,
    library: Arc<InMemoryLibrary>,
    transformer_id: Uuid,
}

async fn fixture() -> Fixture {
    let owner = Uuid::new_v4();
    let library = Arc::new(InMemoryLibrary::new());
    library.add_category(owner, Category::root("Cooking")).await;

    for i in 0..7 {
        library
            .add_article(
                Article::new(owner, format!("ML note {i}"))
                    .with_body("gradient descent walkthrough")
                    .with_tag("machine-learning")
                    .with_embedding(vec![0.0, 1.0, 0.0]),
            )
            .await;
    }
    let transformer = Article::new(owner, "Transformer architectures")
        .with_summary("The paper concludes attention alone suffices for translation.")
        .with_embedding(vec![1.0, 0.0, 0.0]);
    let transformer_id = transformer.id;
    library.add_article(transformer).await;

    Fixture {
        owner,
        library,
        transformer_id,
    }
}

fn config(strategy: ClassifierStrategy, strict: bool) -> AskConfig {
    let mut config = AskConfig::default();
    config.classifier.strategy = strategy;
    config.classifier.strict_vocabulary = strict;
    config
}

struct Wiring {
    lexical: Arc<dyn LexicalIndex>,
    vector: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    catalog: Arc<dyn LibraryCatalog>,
}

fn wiring(fixture: &Fixture, query_vector: Vec<f32>) -> Wiring {
    Wiring {
        lexical: fixture.library.clone(),
        vector: fixture.library.clone(),
        embedder: Arc::new(StaticEmbedder::with_vector(query_vector)),
        catalog: fixture.library.clone(),
    }
}

fn router(
    wiring: Wiring,
    model: Arc<ScriptedLanguageModel>,
    config: AskConfig,
    audit: Option<Arc<MemoryInteractionLog>>,
) -> QueryRouter {
    let mut builder = QueryRouter::builder()
        .lexical(wiring.lexical)
        .vector(wiring.vector)
        .embedder(wiring.embedder)
        .catalog(wiring.catalog)
        .model(model)
        .config(config);
    if let Some(audit) = audit {
        builder = builder.audit(audit);
    }
    builder.build().unwrap()
}

#[tokio::test]
async fn test_metadata_count_makes_no_generation_call() {
    let fixture = fixture().await;
    let model = Arc::new(ScriptedLanguageModel::new(vec!["unused"]));
    let classifier_model = Arc::new(ScriptedLanguageModel::new(vec![
        r#"{"kind": "METADATA", "operation": "COUNT_BY_CATEGORY", "params": {"tag": "machine-learning"}}"#,
    ]));

    let router = QueryRouter::builder()
        .lexical(fixture.library.clone())
        .vector(fixture.library.clone())
        .embedder(Arc::new(StaticEmbedder::with_vector(vec![1.0, 0.0, 0.0])))
        .catalog(fixture.library.clone())
        .model(model.clone())
        .classifier_model(classifier_model.clone())
        .config(config(ClassifierStrategy::Llm, true))
        .build()
        .unwrap();

    let query = Query::new(
        fixture.owner,
        "How many articles do I have tagged machine-learning?",
    );
    let response = router.ask(&query).await.unwrap();

    assert_eq!(response.route, QueryKind::Metadata);
    assert!(matches!(
        response.metadata,
        Some(MetadataResult::Count { count: 7, .. })
    ));
    assert!(response.answer.text.contains('7'));
    assert!(response.answer.references.is_empty());
    assert_eq!(classifier_model.call_count(), 1);
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_rule_classifier_answers_count_offline() {
    let fixture = fixture().await;
    let model = Arc::new(ScriptedLanguageModel::new(vec!["unused"]));
    let router = router(
        wiring(&fixture, vec![1.0, 0.0, 0.0]),
        model.clone(),
        config(ClassifierStrategy::Rules, true),
        None,
    );

    let query = Query::new(
        fixture.owner,
        "How many articles do I have tagged machine-learning?",
    );
    let response = router.ask(&query).await.unwrap();
    assert_eq!(
        response.answer.text,
        "You have 7 articles tagged \"machine-learning\"."
    );
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_content_answer_cites_the_single_match() {
    let fixture = fixture().await;
    let model = Arc::new(ScriptedLanguageModel::new(vec![ANSWER]));
    let router = router(
        wiring(&fixture, vec![1.0, 0.0, 0.0]),
        model.clone(),
        config(ClassifierStrategy::Rules, true),
        None,
    );

    let response = router
        .ask(&Query::new(fixture.owner, TRANSFORMER_QUESTION))
        .await
        .unwrap();

    assert_eq!(response.route, QueryKind::Content);
    assert_eq!(response.answer.text, ANSWER);
    let ids: Vec<Uuid> = response.answer.references.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![fixture.transformer_id]);
    assert!(response.failed_indexes.is_empty());
    assert_eq!(model.call_count(), 1);

    let payload = response.payload();
    assert_eq!(payload.articles[0].title, "Transformer architectures");
}

#[tokio::test]
async fn test_absent_topic_returns_fixed_answer_without_generation() {
    let fixture = fixture().await;
    let model = Arc::new(ScriptedLanguageModel::new(vec!["unused"]));
    // Weakly similar to every article, below the default vector floor.
    let router = router(
        wiring(&fixture, vec![0.1, 0.1, 1.0]),
        model.clone(),
        config(ClassifierStrategy::Rules, true),
        None,
    );

    // Shares only stop words ("what", "is", "the", "of") with the library.
    let response = router
        .ask(&Query::new(
            fixture.owner,
            "What is the history of the Roman empire?",
        ))
        .await
        .unwrap();

    assert_eq!(response.route, QueryKind::Content);
    assert!(response.answer.is_no_relevant_documents());
    assert!(response.answer.references.is_empty());
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_orthogonal_query_vector_retrieves_nothing() {
    let fixture = fixture().await;
    let model = Arc::new(ScriptedLanguageModel::new(vec!["unused"]));
    let router = router(
        wiring(&fixture, vec![0.0, 0.0, 1.0]),
        model.clone(),
        config(ClassifierStrategy::Rules, true),
        None,
    );

    let response = router
        .ask(&Query::new(
            fixture.owner,
            "What do my notes say about volcano eruptions?",
        ))
        .await
        .unwrap();

    assert!(response.answer.is_no_relevant_documents());
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_classifier_failure_falls_back_to_content() {
    let fixture = fixture().await;
    let model = Arc::new(ScriptedLanguageModel::new(vec![ANSWER]));
    let router = QueryRouter::builder()
        .lexical(fixture.library.clone())
        .vector(fixture.library.clone())
        .embedder(Arc::new(StaticEmbedder::with_vector(vec![1.0, 0.0, 0.0])))
        .catalog(fixture.library.clone())
        .model(model.clone())
        .classifier_model(Arc::new(ScriptedLanguageModel::failing("provider down")))
        .config(config(ClassifierStrategy::Llm, true))
        .build()
        .unwrap();

    let response = router
        .ask(&Query::new(fixture.owner, TRANSFORMER_QUESTION))
        .await
        .unwrap();
    assert_eq!(response.route, QueryKind::Content);
    assert!(response.fallback.is_some());
    assert_eq!(response.answer.references.len(), 1);
}

#[tokio::test]
async fn test_unknown_tag_from_model_falls_back_to_content() {
    let fixture = fixture().await;
    let model = Arc::new(ScriptedLanguageModel::new(vec![ANSWER]));
    let router = QueryRouter::builder()
        .lexical(fixture.library.clone())
        .vector(fixture.library.clone())
        .embedder(Arc::new(StaticEmbedder::with_vector(vec![1.0, 0.0, 0.0])))
        .catalog(fixture.library.clone())
        .model(model.clone())
        .classifier_model(Arc::new(ScriptedLanguageModel::new(vec![
            r#"{"kind": "METADATA", "operation": "COUNT_BY_TAG", "params": {"tag": "quantum"}}"#,
        ])))
        .config(config(ClassifierStrategy::Llm, true))
        .build()
        .unwrap();

    let response = router
        .ask(&Query::new(fixture.owner, TRANSFORMER_QUESTION))
        .await
        .unwrap();
    assert_eq!(response.route, QueryKind::Content);
    assert!(response.fallback.is_some());
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn test_one_index_down_degrades_gracefully() {
    let fixture = fixture().await;
    let model = Arc::new(ScriptedLanguageModel::new(vec![ANSWER]));
    let mut parts = wiring(&fixture, vec![1.0, 0.0, 0.0]);
    parts.lexical = Arc::new(FailingLexicalIndex::new("connection refused"));
    let router = router(
        parts,
        model.clone(),
        config(ClassifierStrategy::Rules, true),
        None,
    );

    let response = router
        .ask(&Query::new(fixture.owner, TRANSFORMER_QUESTION))
        .await
        .unwrap();
    assert_eq!(response.failed_indexes.len(), 1);
    assert_eq!(response.answer.references[0].id, fixture.transformer_id);
}

#[tokio::test]
async fn test_both_indexes_down_is_search_unavailable() {
    let fixture = fixture().await;
    let model = Arc::new(ScriptedLanguageModel::new(vec![ANSWER]));
    let audit = Arc::new(MemoryInteractionLog::new());
    let mut parts = wiring(&fixture, vec![1.0, 0.0, 0.0]);
    parts.lexical = Arc::new(FailingLexicalIndex::new("connection refused"));
    parts.vector = Arc::new(FailingVectorIndex::new("timeout"));
    let router = router(
        parts,
        model.clone(),
        config(ClassifierStrategy::Rules, true),
        Some(audit.clone()),
    );

    let err = router
        .ask(&Query::new(fixture.owner, TRANSFORMER_QUESTION))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::SearchUnavailable);
    assert_eq!(model.call_count(), 0);

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].failed);
    assert_eq!(entries[0].answer, FailureKind::SearchUnavailable.user_message());
}

#[tokio::test]
async fn test_empty_category_differs_from_unknown_category() {
    let fixture = fixture().await;
    let model = Arc::new(ScriptedLanguageModel::new(vec!["unused"]));
    let router = router(
        wiring(&fixture, vec![1.0, 0.0, 0.0]),
        model.clone(),
        config(ClassifierStrategy::Rules, false),
        None,
    );

    let empty = router
        .ask(&Query::new(
            fixture.owner,
            "How many articles are in the Cooking category?",
        ))
        .await
        .unwrap();
    assert!(matches!(
        empty.metadata,
        Some(MetadataResult::Count { count: 0, .. })
    ));

    let unknown = router
        .ask(&Query::new(
            fixture.owner,
            "How many articles are in the Gardening category?",
        ))
        .await
        .unwrap();
    assert!(matches!(
        unknown.metadata,
        Some(MetadataResult::NotFound { .. })
    ));
    assert_ne!(empty.answer.text, unknown.answer.text);
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_empty_question_is_rejected() {
    let fixture = fixture().await;
    let model = Arc::new(ScriptedLanguageModel::new(vec!["unused"]));
    let router = router(
        wiring(&fixture, vec![1.0, 0.0, 0.0]),
        model,
        config(ClassifierStrategy::Rules, true),
        None,
    );
    let err = router
        .ask(&Query::new(fixture.owner, "   "))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::InvalidRequest);
}

#[tokio::test]
async fn test_streamed_answer_ends_with_citations_and_is_audited() {
    let fixture = fixture().await;
    let model = Arc::new(ScriptedLanguageModel::new(vec![ANSWER]).with_chunk_chars(5));
    let audit = Arc::new(MemoryInteractionLog::new());
    let router = router(
        wiring(&fixture, vec![1.0, 0.0, 0.0]),
        model,
        config(ClassifierStrategy::Rules, true),
        Some(audit.clone()),
    );

    let stream = router
        .ask_stream(&Query::new(fixture.owner, TRANSFORMER_QUESTION))
        .await
        .unwrap();
    assert_eq!(stream.route, QueryKind::Content);

    let events: Vec<AnswerEvent> = stream
        .events
        .map(|event| event.unwrap())
        .collect()
        .await;

    let (last, deltas) = events.split_last().unwrap();
    let text: String = deltas
        .iter()
        .map(|event| match event {
            AnswerEvent::Delta(delta) => delta.as_str(),
            AnswerEvent::Citations(_) => panic!("citations before the end"),
        })
        .collect();
    assert_eq!(text, ANSWER);
    match last {
        AnswerEvent::Citations(references) => {
            assert_eq!(references.len(), 1);
            assert_eq!(references[0].id, fixture.transformer_id);
        }
        AnswerEvent::Delta(_) => panic!("stream must end with citations"),
    }

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].answer, ANSWER);
    assert_eq!(entries[0].reference_ids, vec![fixture.transformer_id]);
}

#[tokio::test]
async fn test_streamed_metadata_is_one_delta_then_citations() {
    let fixture = fixture().await;
    let model = Arc::new(ScriptedLanguageModel::new(vec!["unused"]));
    let router = router(
        wiring(&fixture, vec![1.0, 0.0, 0.0]),
        model.clone(),
        config(ClassifierStrategy::Rules, true),
        None,
    );

    let stream = router
        .ask_stream(&Query::new(
            fixture.owner,
            "How many articles do I have tagged machine-learning?",
        ))
        .await
        .unwrap();
    assert_eq!(stream.route, QueryKind::Metadata);

    let events: Vec<AnswerEvent> = stream.events.map(|e| e.unwrap()).collect().await;
    assert_eq!(
        events,
        vec![
            AnswerEvent::Delta("You have 7 articles tagged \"machine-learning\".".into()),
            AnswerEvent::Citations(Vec::new()),
        ]
    );
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_stream_dropped_after_citations_is_still_audited() {
    let fixture = fixture().await;
    let model = Arc::new(ScriptedLanguageModel::new(vec![ANSWER]).with_chunk_chars(5));
    let audit = Arc::new(MemoryInteractionLog::new());
    let router = router(
        wiring(&fixture, vec![1.0, 0.0, 0.0]),
        model,
        config(ClassifierStrategy::Rules, true),
        Some(audit.clone()),
    );

    let mut stream = router
        .ask_stream(&Query::new(fixture.owner, TRANSFORMER_QUESTION))
        .await
        .unwrap();
    while let Some(event) = stream.events.next().await {
        if matches!(event.unwrap(), AnswerEvent::Citations(_)) {
            break;
        }
    }
    drop(stream);

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].answer, ANSWER);
    assert_eq!(entries[0].reference_ids, vec![fixture.transformer_id]);
}
