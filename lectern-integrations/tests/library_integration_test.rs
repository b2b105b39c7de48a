//! Integration tests for the in-memory library and offline embedder.

use lectern_core::{
    traits::{Embedder, LexicalIndex, LibraryCatalog, VectorIndex},
    types::{Article, ArticleFilter, Dimension, ProcessingStatus, Query, SourceType},
};
use lectern_integrations::{HashingEmbedder, InMemoryLibrary, LibrarySnapshot};
use pretty_assertions::assert_eq;
use uuid::Uuid;

const SNAPSHOT: &str = r#"{
    "categories": [
        { "owner_id": "0b8f6c1e-2d3a-4b5c-8d9e-1f2a3b4c5d6e", "name": "Research" },
        { "owner_id": "0b8f6c1e-2d3a-4b5c-8d9e-1f2a3b4c5d6e", "name": "NLP", "parent": "Research" }
    ],
    "articles": [
        {
            "id": "6f1c1d5e-8a44-4e3b-9d2c-0d8f5b6a7c11",
            "owner_id": "0b8f6c1e-2d3a-4b5c-8d9e-1f2a3b4c5d6e",
            "title": "Attention Is All You Need",
            "summary": "Introduces the transformer, built entirely on attention.",
            "source_type": "arxiv",
            "categories": ["NLP"],
            "tags": ["machine-learning"],
            "created_at": "2024-05-01T12:00:00Z"
        },
        {
            "id": "7a2d2e6f-9b55-4f4c-8e3d-1e9f6c7b8d22",
            "owner_id": "0b8f6c1e-2d3a-4b5c-8d9e-1f2a3b4c5d6e",
            "title": "Sourdough at home",
            "body": "Starter, flour, water and patience.",
            "source_type": "url",
            "original_url": "https://bread.example.com/sourdough",
            "status": "failed",
            "created_at": "2024-06-01T08:30:00Z"
        }
    ]
}"#;

fn owner() -> Uuid {
    Uuid::parse_str("0b8f6c1e-2d3a-4b5c-8d9e-1f2a3b4c5d6e").unwrap()
}

#[tokio::test]
async fn test_snapshot_json_drives_catalog() {
    let snapshot: LibrarySnapshot = serde_json::from_str(SNAPSHOT).unwrap();
    let library = InMemoryLibrary::from_snapshot(snapshot);

    let vocabulary = library.vocabulary(owner()).await.unwrap();
    assert_eq!(vocabulary.categories.len(), 2);
    assert_eq!(vocabulary.resolve_tag("machine learning"), Some("machine-learning"));

    // The failed article is not counted but shows up in the status breakdown.
    assert_eq!(
        library
            .count_articles(owner(), &ArticleFilter::all())
            .await
            .unwrap(),
        1
    );
    let stats = library.library_stats(owner()).await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.by_status.get("failed"), Some(&1));

    let tree = library.category_tree(owner()).await.unwrap();
    assert_eq!(tree[0].name, "Research");
    assert_eq!(tree[0].children[0].count, 1);
}

#[tokio::test]
async fn test_hashing_embeddings_support_vector_search() {
    let embedder = HashingEmbedder::new(256).unwrap();
    let library = InMemoryLibrary::new();
    let owner = Uuid::new_v4();

    let texts = [
        ("Transformers", "attention layers in transformer models"),
        ("Bread", "flour water salt and a sourdough starter"),
        ("Rust", "ownership borrowing and lifetimes in rust"),
    ];
    let mut ids = Vec::new();
    for (title, body) in texts {
        let article = Article::new(owner, title)
            .with_body(body)
            .with_embedding(embedder.embed(body).await.unwrap());
        ids.push(article.id);
        library.add_article(article).await;
    }

    let question = "how does attention work in transformer models";
    let query = Query::new(owner, question);
    let vector = embedder.embed(question).await.unwrap();

    let semantic = library.vector_search(&query, &vector, 3).await.unwrap();
    assert_eq!(semantic[0].article_id, ids[0]);

    let lexical = library.lexical_search(&query, 3).await.unwrap();
    assert_eq!(lexical[0].article_id, ids[0]);
    assert!(lexical.iter().all(|hit| hit.article_id != ids[1]));
}

#[tokio::test]
async fn test_grouping_and_filtering_agree() {
    let library = InMemoryLibrary::new();
    let owner = Uuid::new_v4();
    for source_type in [SourceType::Pdf, SourceType::Pdf, SourceType::Video] {
        library
            .add_article(Article::new(owner, "doc").with_source_type(source_type))
            .await;
    }
    library
        .add_article(
            Article::new(owner, "queued")
                .with_source_type(SourceType::Pdf)
                .with_status(ProcessingStatus::Pending),
        )
        .await;

    let groups = library
        .group_counts(owner, Dimension::SourceType)
        .await
        .unwrap();
    assert_eq!(groups, vec![("pdf".to_string(), 2), ("video".to_string(), 1)]);

    let filter = ArticleFilter {
        source_type: Some(SourceType::Pdf),
        ..ArticleFilter::default()
    };
    assert_eq!(library.count_articles(owner, &filter).await.unwrap(), 2);
}
