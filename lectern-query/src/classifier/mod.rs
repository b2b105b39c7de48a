//! Query intent classification.
//!
//! Classification never fails. Anything that prevents a clean metadata
//! resolution (a model error, a timeout, malformed output, an unknown
//! operation, invalid or unresolvable parameters) produces
//! [`QueryIntent::Content`] together with the reason, because retrieval
//! degrades to "no relevant documents" while a metadata operation with bad
//! parameters could report a wrong number.

pub mod llm;
pub mod rules;

use async_trait::async_trait;
use lectern_core::{
    traits::Vocabulary,
    types::{MetadataOperation, MetadataRequest, ParamValues, Query, QueryIntent},
};
use std::fmt;

use crate::metadata::{EntityKind, operation_spec};

pub use llm::LlmQueryClassifier;
pub use rules::RuleBasedClassifier;

/// Why a classification fell back to content retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The model call failed.
    ModelError(String),
    /// The model call exceeded its timeout.
    Timeout,
    /// The output was not a schema-conforming JSON object.
    MalformedOutput(String),
    /// The output named an operation outside the closed set.
    UnknownOperation(String),
    /// Parameters did not satisfy the operation's schema.
    InvalidParameters(String),
    /// A named category, tag or color is not in the owner's library.
    UnresolvedEntity {
        /// Entity type.
        entity: EntityKind,
        /// Name as given.
        name: String,
    },
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelError(message) => write!(f, "model error: {message}"),
            Self::Timeout => f.write_str("classification timed out"),
            Self::MalformedOutput(message) => write!(f, "malformed output: {message}"),
            Self::UnknownOperation(name) => write!(f, "unknown operation '{name}'"),
            Self::InvalidParameters(message) => write!(f, "invalid parameters: {message}"),
            Self::UnresolvedEntity { entity, name } => write!(f, "unknown {entity} '{name}'"),
        }
    }
}

/// Outcome of classifying one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Resolved intent.
    pub intent: QueryIntent,
    /// Set when the intent is a fallback to content retrieval.
    pub fallback: Option<FallbackReason>,
}

impl Classification {
    /// A deliberate content classification.
    pub fn content() -> Self {
        Self {
            intent: QueryIntent::Content,
            fallback: None,
        }
    }

    /// A metadata classification.
    pub fn metadata(request: MetadataRequest) -> Self {
        Self {
            intent: QueryIntent::Metadata(request),
            fallback: None,
        }
    }

    /// Content retrieval chosen because of `reason`.
    pub fn fallback(reason: FallbackReason) -> Self {
        Self {
            intent: QueryIntent::Content,
            fallback: Some(reason),
        }
    }

    /// Whether this is a fallback.
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Decides between content retrieval and a metadata operation.
#[async_trait]
pub trait QueryClassifier: Send + Sync + std::fmt::Debug {
    /// Classify `query` given the owner's vocabulary.
    async fn classify(&self, query: &Query, vocabulary: &Vocabulary) -> Classification;

    /// Classifier name for logs.
    fn name(&self) -> &'static str;
}

/// Validate a proposed operation against its schema and the vocabulary.
///
/// With `strict_vocabulary` off, unresolvable names pass through so the
/// executor can report them as not found.
pub fn resolve_request(
    operation: MetadataOperation,
    params: &ParamValues,
    vocabulary: &Vocabulary,
    strict_vocabulary: bool,
) -> Classification {
    let Some(spec) = operation_spec(operation) else {
        return Classification::fallback(FallbackReason::UnknownOperation(operation.to_string()));
    };
    let params = match spec.validate(params) {
        Ok(params) => params,
        Err(err) => {
            return Classification::fallback(FallbackReason::InvalidParameters(format!(
                "{operation}: {err}"
            )));
        }
    };
    match spec.resolve_entities(&params, vocabulary) {
        Ok(resolved) => Classification::metadata(MetadataRequest::with_params(operation, resolved)),
        Err((entity, name)) if strict_vocabulary => {
            Classification::fallback(FallbackReason::UnresolvedEntity { entity, name })
        }
        Err(_) => Classification::metadata(MetadataRequest::with_params(operation, params)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::types::Category;

    fn vocabulary() -> Vocabulary {
        Vocabulary {
            categories: vec![Category::root("Research")],
            tags: vec!["machine-learning".into()],
            colors: Vec::new(),
        }
    }

    #[test]
    fn test_resolve_request_canonicalizes() {
        let result = resolve_request(
            MetadataOperation::CountByCategory,
            &ParamValues::new().with_text("tag", "Machine-Learning"),
            &vocabulary(),
            true,
        );
        let request = result.intent.metadata().unwrap();
        assert_eq!(request.params.text("tag"), Some("machine-learning"));
        assert!(!result.is_fallback());
    }

    #[test]
    fn test_strict_vocabulary_falls_back() {
        let params = ParamValues::new().with_text("category", "Cooking");
        let strict = resolve_request(
            MetadataOperation::CountByCategory,
            &params,
            &vocabulary(),
            true,
        );
        assert_eq!(strict.intent, QueryIntent::Content);
        assert!(matches!(
            strict.fallback,
            Some(FallbackReason::UnresolvedEntity { entity: EntityKind::Category, .. })
        ));

        let lenient = resolve_request(
            MetadataOperation::CountByCategory,
            &params,
            &vocabulary(),
            false,
        );
        assert_eq!(
            lenient.intent.metadata().unwrap().params.text("category"),
            Some("Cooking")
        );
    }

    #[test]
    fn test_invalid_parameters_fall_back() {
        let result = resolve_request(
            MetadataOperation::RecentArticles,
            &ParamValues::new().with_text("limit", "lots"),
            &vocabulary(),
            true,
        );
        assert!(matches!(
            result.fallback,
            Some(FallbackReason::InvalidParameters(_))
        ));
    }
}
