//! Integration tests for configuration loading.

use lectern_core::config::{AskConfig, ClassifierStrategy, FusionWeights};
use lectern_core::{FailureKind, LecternError};
use tempfile::TempDir;
use tokio::fs;

#[tokio::test]
async fn test_load_json_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("ask.json");

    let config = serde_json::json!({
        "llm": {
            "provider": "anthropic",
            "model": "claude-3-5-haiku-latest",
            "api_key": "${LECTERN_IT_UNSET_KEY:sk-from-default}"
        },
        "retrieval": {
            "top_k": 8,
            "fusion": { "lexical": 0.3, "vector": 0.7 }
        },
        "context": { "max_tokens": 3000 }
    });
    fs::write(&path, serde_json::to_string_pretty(&config).unwrap())
        .await
        .unwrap();

    let loaded = AskConfig::from_file(&path).await.unwrap();
    assert_eq!(loaded.llm.provider, "anthropic");
    assert_eq!(loaded.llm.api_key.as_deref(), Some("sk-from-default"));
    assert_eq!(loaded.retrieval.top_k, 8);
    assert_eq!(loaded.retrieval.fusion, FusionWeights::new(0.3, 0.7));
    assert_eq!(loaded.context.max_tokens, 3000);
    assert_eq!(loaded.context.excerpt_chars, 2000);
}

#[tokio::test]
async fn test_load_toml_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("ask.toml");

    let content = r#"
[llm]
provider = "ollama"
model = "llama3.1"
base_url = "http://localhost:11434"

[classifier]
strategy = "rules"
strict_vocabulary = false

[synthesis]
timeout_secs = 20
"#;
    fs::write(&path, content).await.unwrap();

    let loaded = AskConfig::from_file(&path).await.unwrap();
    assert_eq!(loaded.llm.provider, "ollama");
    assert!(!loaded.llm.requires_api_key());
    assert_eq!(loaded.classifier.strategy, ClassifierStrategy::Rules);
    assert!(!loaded.classifier.strict_vocabulary);
    assert_eq!(loaded.synthesis.timeout_secs, 20);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("ask.toml");
    fs::write(&path, "[retrieval]\ntop_k = 50\n").await.unwrap();

    let err = AskConfig::from_file(&path).await.unwrap_err();
    assert!(matches!(err, LecternError::Configuration { .. }));
    assert_eq!(err.kind(), FailureKind::InvalidRequest);
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = AskConfig::from_file(temp_dir.path().join("absent.json"))
        .await
        .unwrap_err();
    assert!(matches!(err, LecternError::Io(_)));
}

#[test]
fn test_json_round_trip_preserves_settings() {
    let mut config = AskConfig::default();
    config.retrieval.top_k = 4;
    config.classifier.strategy = ClassifierStrategy::Rules;

    let json = config.to_json_pretty().unwrap();
    let parsed = AskConfig::from_json_str(&json).unwrap();
    assert_eq!(parsed, config);
}
