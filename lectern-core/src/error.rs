//! Error types for the Lectern engine.
//!
//! Every failure that can leave the engine is a [`LecternError`]. Callers that
//! render errors to end users should go through [`LecternError::kind`] and
//! [`LecternError::user_message`] rather than formatting the error itself.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error type for Lectern.
///
/// Conditions that the answering pipeline recovers from locally (a classifier
/// falling back to content retrieval, one search index failing, an empty
/// retrieval, a metadata lookup naming an unknown entity) never surface as
/// errors.
#[derive(Error, Debug)]
pub enum LecternError {
    /// I/O related errors (file reading, network operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML configuration parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Embedding generation errors
    #[error("Embedding error: {message}")]
    Embedding {
        /// Detailed error message
        message: String,
    },

    /// A single search index failed
    #[error("Search error in {index}: {message}")]
    Search {
        /// Name of the failing index
        index: String,
        /// Detailed error message
        message: String,
    },

    /// Every search index failed for this query
    #[error("Search unavailable: {message}")]
    SearchUnavailable {
        /// Combined failure description
        message: String,
    },

    /// Generative model errors
    #[error("LLM error: {message}")]
    Llm {
        /// Detailed error message
        message: String,
    },

    /// Structured store errors
    #[error("Storage error: {message}")]
    Storage {
        /// Detailed error message
        message: String,
    },

    /// Configuration validation errors
    #[error("Configuration error: {message}")]
    Configuration {
        /// Detailed error message
        message: String,
    },

    /// Input validation errors
    #[error("Validation error: {message}")]
    Validation {
        /// Detailed error message
        message: String,
    },

    /// Resource not found errors
    #[error("Not found: {resource}")]
    NotFound {
        /// Name of the missing resource
        resource: String,
    },

    /// A remote service failed in a way that may succeed on retry
    #[error("{service} unavailable: {message}")]
    Unavailable {
        /// Name of the failing service
        service: String,
        /// Detailed error message
        message: String,
    },

    /// Operation timeout errors
    #[error("Timeout: {operation}")]
    Timeout {
        /// Name of the operation that timed out
        operation: String,
    },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Detailed error message
        message: String,
    },

    /// Generic errors from external dependencies
    #[error("External error: {source}")]
    External {
        /// The underlying error
        #[source]
        source: anyhow::Error,
    },
}

/// User-facing failure categories.
///
/// The UI layer switches on this to pick a message; two failures with the same
/// kind are indistinguishable to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Both search indexes failed.
    SearchUnavailable,
    /// The generative model errored or timed out while answering.
    GenerationFailed,
    /// The request or configuration was rejected before any work was done.
    InvalidRequest,
    /// Anything else.
    Internal,
}

impl FailureKind {
    /// Message suitable for showing to an end user.
    #[must_use]
    pub fn user_message(self) -> &'static str {
        match self {
            Self::SearchUnavailable => "Search is temporarily unavailable. Please try again shortly.",
            Self::GenerationFailed => "The answer could not be generated right now.",
            Self::InvalidRequest => "The question could not be processed.",
            Self::Internal => "Something went wrong while answering.",
        }
    }
}

impl LecternError {
    /// Create a new embedding error with a message.
    pub fn embedding<S: Into<String>>(message: S) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a new search error for the named index.
    pub fn search<I: Into<String>, S: Into<String>>(index: I, message: S) -> Self {
        Self::Search {
            index: index.into(),
            message: message.into(),
        }
    }

    /// Create a new search-unavailable error.
    pub fn search_unavailable<S: Into<String>>(message: S) -> Self {
        Self::SearchUnavailable {
            message: message.into(),
        }
    }

    /// Create a new LLM error with a message.
    pub fn llm<S: Into<String>>(message: S) -> Self {
        Self::Llm {
            message: message.into(),
        }
    }

    /// Create a new storage error with a message.
    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a new configuration error with a message.
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new validation error with a message.
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new not found error with a resource name.
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a new unavailable error for the named service.
    pub fn unavailable<S: Into<String>, M: Into<String>>(service: S, message: M) -> Self {
        Self::Unavailable {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error with an operation name.
    pub fn timeout<S: Into<String>>(operation: S) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Create a new internal error with a message.
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a new external error from any error that implements `Into<anyhow::Error>`.
    pub fn external<E: Into<anyhow::Error>>(error: E) -> Self {
        Self::External {
            source: error.into(),
        }
    }

    /// Check if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Unavailable { .. }
                | Self::SearchUnavailable { .. }
                | Self::Io(_)
        )
    }

    /// The user-facing category of this error.
    ///
    /// Errors reaching the caller from the answering path are either a total
    /// search outage or a generation problem; timeouts only occur around model
    /// calls.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::SearchUnavailable { .. } => FailureKind::SearchUnavailable,
            Self::Llm { .. } | Self::Timeout { .. } => FailureKind::GenerationFailed,
            Self::Validation { .. } | Self::Configuration { .. } => FailureKind::InvalidRequest,
            _ => FailureKind::Internal,
        }
    }

    /// Message suitable for showing to an end user.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }
}

/// Result type alias for convenience.
pub type Result<T, E = LecternError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = LecternError::embedding("model unreachable");
        assert!(matches!(err, LecternError::Embedding { .. }));
        assert_eq!(err.to_string(), "Embedding error: model unreachable");

        let err = LecternError::search("bm25", "index closed");
        assert_eq!(err.to_string(), "Search error in bm25: index closed");
    }

    #[test]
    fn test_error_kinds_are_distinct() {
        assert_eq!(
            LecternError::search_unavailable("both down").kind(),
            FailureKind::SearchUnavailable
        );
        assert_eq!(LecternError::llm("500").kind(), FailureKind::GenerationFailed);
        assert_eq!(
            LecternError::timeout("synthesis").kind(),
            FailureKind::GenerationFailed
        );
        assert_eq!(
            LecternError::validation("empty question").kind(),
            FailureKind::InvalidRequest
        );
        assert_eq!(LecternError::storage("gone").kind(), FailureKind::Internal);
    }

    #[test]
    fn test_user_message_hides_details() {
        let err = LecternError::llm("upstream returned HTTP 503 with body ...");
        assert!(!err.user_message().contains("503"));
        assert_eq!(
            err.user_message(),
            "The answer could not be generated right now."
        );
    }

    #[test]
    fn test_error_retryable() {
        assert!(LecternError::timeout("network").is_retryable());
        assert!(LecternError::search_unavailable("x").is_retryable());
        assert!(LecternError::unavailable("embeddings", "HTTP 503").is_retryable());
        assert!(!LecternError::embedding("HTTP 401").is_retryable());
        assert!(!LecternError::validation("invalid input").is_retryable());
    }

    #[test]
    fn test_missing_handler_is_not_found() {
        let err = LecternError::not_found("metadata handler for list_tags");
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), FailureKind::Internal);
        assert_eq!(err.to_string(), "Not found: metadata handler for list_tags");
    }

    #[test]
    fn test_failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::SearchUnavailable).unwrap();
        assert_eq!(json, "\"search_unavailable\"");
    }
}
