//! Generative-model classifier with schema-validated JSON output.

use async_trait::async_trait;
use lectern_core::{
    config::ClassifierConfig,
    traits::{CompletionRequest, LanguageModel, Vocabulary},
    types::{MetadataOperation, ParamValue, ParamValues, Query},
};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::{Classification, FallbackReason, QueryClassifier, resolve_request};
use crate::prompts::{CLASSIFIER_SYSTEM_PROMPT, classification_prompt};

/// Output cap for the classification call.
const CLASSIFIER_MAX_TOKENS: u32 = 256;

/// The structured reply the model is asked for.
#[derive(Debug, Deserialize)]
struct ClassifierReply {
    kind: String,
    #[serde(default)]
    operation: Option<String>,
    #[serde(default)]
    params: Option<serde_json::Map<String, Value>>,
}

/// Classifies with one bounded model call.
///
/// # Examples
///
/// ```rust,no_run
/// use lectern_query::classifier::{LlmQueryClassifier, QueryClassifier};
/// use lectern_query::testing::ScriptedLanguageModel;
/// use lectern_core::{traits::Vocabulary, types::Query};
/// use std::sync::Arc;
/// use uuid::Uuid;
///
/// # async fn example() {
/// let model = Arc::new(ScriptedLanguageModel::new(vec![r#"{"kind": "CONTENT"}"#]));
/// let classifier = LlmQueryClassifier::new(model);
/// let query = Query::new(Uuid::new_v4(), "What does my saved RFC say about retries?");
/// let result = classifier.classify(&query, &Vocabulary::default()).await;
/// assert!(!result.is_fallback());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LlmQueryClassifier {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
    strict_vocabulary: bool,
}

impl LlmQueryClassifier {
    /// Create a classifier with default settings.
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self::from_config(model, &ClassifierConfig::default())
    }

    /// Create a classifier from configuration.
    pub fn from_config(model: Arc<dyn LanguageModel>, config: &ClassifierConfig) -> Self {
        Self {
            model,
            timeout: config.timeout(),
            strict_vocabulary: config.strict_vocabulary,
        }
    }

    /// Set the call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set whether unknown names fall back to content.
    #[must_use]
    pub fn with_strict_vocabulary(mut self, strict: bool) -> Self {
        self.strict_vocabulary = strict;
        self
    }

    fn interpret(&self, reply: &str, vocabulary: &Vocabulary) -> Classification {
        let reply = match parse_reply(reply) {
            Ok(reply) => reply,
            Err(reason) => return Classification::fallback(reason),
        };

        if reply.kind.eq_ignore_ascii_case("content") {
            return Classification::content();
        }
        if !reply.kind.eq_ignore_ascii_case("metadata") {
            return Classification::fallback(FallbackReason::MalformedOutput(format!(
                "unexpected kind '{}'",
                reply.kind
            )));
        }

        let Some(name) = reply.operation else {
            return Classification::fallback(FallbackReason::MalformedOutput(
                "METADATA reply without operation".to_string(),
            ));
        };
        let Ok(operation) = MetadataOperation::from_str(name.trim()) else {
            return Classification::fallback(FallbackReason::UnknownOperation(name));
        };

        let params = match convert_params(reply.params.unwrap_or_default()) {
            Ok(params) => params,
            Err(reason) => return Classification::fallback(reason),
        };
        resolve_request(operation, &params, vocabulary, self.strict_vocabulary)
    }
}

#[async_trait]
impl QueryClassifier for LlmQueryClassifier {
    #[instrument(skip(self, query, vocabulary), fields(model = self.model.name()))]
    async fn classify(&self, query: &Query, vocabulary: &Vocabulary) -> Classification {
        let request = CompletionRequest::new(classification_prompt(&query.text, vocabulary))
            .with_system(CLASSIFIER_SYSTEM_PROMPT)
            .with_temperature(0.0)
            .with_max_tokens(CLASSIFIER_MAX_TOKENS);

        let classification = match tokio::time::timeout(self.timeout, self.model.complete(request))
            .await
        {
            Err(_) => Classification::fallback(FallbackReason::Timeout),
            Ok(Err(err)) => Classification::fallback(FallbackReason::ModelError(err.to_string())),
            Ok(Ok(reply)) => {
                debug!(reply = %reply, "Classifier replied");
                self.interpret(&reply, vocabulary)
            }
        };

        match &classification.fallback {
            Some(reason) => warn!(%reason, "Classification fell back to content retrieval"),
            None => info!(kind = %classification.intent.kind(), "Query classified"),
        }
        classification
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

/// Pull the JSON object out of a reply that may wrap it in prose or a code
/// fence, then deserialize it.
fn parse_reply(reply: &str) -> Result<ClassifierReply, FallbackReason> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(FallbackReason::MalformedOutput(
            "no JSON object in reply".to_string(),
        ));
    };
    if end < start {
        return Err(FallbackReason::MalformedOutput(
            "no JSON object in reply".to_string(),
        ));
    }
    serde_json::from_str(&reply[start..=end])
        .map_err(|e| FallbackReason::MalformedOutput(e.to_string()))
}

/// Map JSON scalars onto parameter values. Nested values are rejected and
/// nulls are dropped.
fn convert_params(raw: serde_json::Map<String, Value>) -> Result<ParamValues, FallbackReason> {
    let mut params = ParamValues::new();
    for (name, value) in raw {
        let value = match value {
            Value::Null => continue,
            Value::Bool(b) => ParamValue::Bool(b),
            Value::String(s) => ParamValue::Text(s),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ParamValue::Integer(i),
                None => {
                    return Err(FallbackReason::InvalidParameters(format!(
                        "'{name}' must be an integer, got {n}"
                    )));
                }
            },
            Value::Array(_) | Value::Object(_) => {
                return Err(FallbackReason::InvalidParameters(format!(
                    "'{name}' must be a scalar"
                )));
            }
        };
        params.insert(name, value);
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLanguageModel;
    use lectern_core::types::{Category, QueryIntent};
    use test_case::test_case;
    use uuid::Uuid;

    fn vocabulary() -> Vocabulary {
        Vocabulary {
            categories: vec![Category::root("Research")],
            tags: vec!["machine-learning".into()],
            colors: vec!["Blue".into()],
        }
    }

    async fn classify_reply(reply: &str) -> Classification {
        let model = Arc::new(ScriptedLanguageModel::new(vec![reply]));
        let classifier = LlmQueryClassifier::new(model);
        classifier
            .classify(&Query::new(Uuid::new_v4(), "question"), &vocabulary())
            .await
    }

    #[tokio::test]
    async fn test_metadata_reply_resolves() {
        let result = classify_reply(
            r#"{"kind": "METADATA", "operation": "COUNT_BY_CATEGORY", "params": {"tag": "machine-learning"}}"#,
        )
        .await;
        let request = result.intent.metadata().unwrap();
        assert_eq!(request.operation, MetadataOperation::CountByCategory);
        assert_eq!(request.params.text("tag"), Some("machine-learning"));
    }

    #[tokio::test]
    async fn test_reply_in_code_fence() {
        let result = classify_reply(
            "Sure!\n```json\n{\"kind\": \"METADATA\", \"operation\": \"total_count\"}\n```",
        )
        .await;
        assert_eq!(
            result.intent.metadata().unwrap().operation,
            MetadataOperation::TotalCount
        );
    }

    #[test_case("I think this is about content." ; "no json")]
    #[test_case(r#"{"kind": "METADATA"}"# ; "missing operation")]
    #[test_case(r#"{"kind": "MAYBE"}"# ; "bad kind")]
    #[test_case(r#"{"operation": "TOTAL_COUNT"}"# ; "missing kind")]
    #[test_case(r#"{"kind": "METADATA", "operation": "DROP_ALL"}"# ; "unknown operation")]
    #[test_case(r#"{"kind": "METADATA", "operation": "RECENT_ARTICLES", "params": {"limit": 2.5}}"# ; "float param")]
    #[test_case(r#"{"kind": "METADATA", "operation": "TOTAL_COUNT", "params": {"tag": "x"}}"# ; "undeclared param")]
    #[test_case(r#"{"kind": "METADATA", "operation": "COUNT_BY_CATEGORY", "params": {"category": "Cooking"}}"# ; "unknown category")]
    #[test_case(r#"{"kind": "METADATA", "operation": "LIST_BY_FILTER", "params": {"tag": ["a", "b"]}}"# ; "array param")]
    fn test_bad_replies_fall_back_to_content(reply: &str) {
        let result = tokio_test::block_on(classify_reply(reply));
        assert_eq!(result.intent, QueryIntent::Content);
        assert!(result.is_fallback(), "expected fallback for {reply}");
    }

    #[tokio::test]
    async fn test_model_error_falls_back() {
        let model = Arc::new(ScriptedLanguageModel::failing("provider down"));
        let classifier = LlmQueryClassifier::new(model);
        let result = classifier
            .classify(&Query::new(Uuid::new_v4(), "q"), &vocabulary())
            .await;
        assert!(matches!(result.fallback, Some(FallbackReason::ModelError(_))));
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let model = Arc::new(
            ScriptedLanguageModel::new(vec![r#"{"kind": "CONTENT"}"#])
                .with_delay(Duration::from_millis(200)),
        );
        let classifier = LlmQueryClassifier::new(model).with_timeout(Duration::from_millis(10));
        let result = classifier
            .classify(&Query::new(Uuid::new_v4(), "q"), &vocabulary())
            .await;
        assert_eq!(result.fallback, Some(FallbackReason::Timeout));
    }
}
