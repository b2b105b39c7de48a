//! Top-level engine configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use strum::{Display, EnumString};

use super::{
    EmbedderConfig, LlmConfig,
    loader::{self, ConfigFormat},
};
use crate::{LecternError, Result};

/// Hard ceiling on `top_k`.
pub const MAX_TOP_K: usize = 20;

/// Relative weights applied to normalized lexical and vector scores.
///
/// The fused score of a candidate is
/// `lexical * norm(lexical_score) + vector * norm(vector_score)`, where a
/// missing score contributes zero and `norm` is min-max normalization over the
/// list the score came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    /// Weight of the lexical signal.
    pub lexical: f32,
    /// Weight of the vector signal.
    pub vector: f32,
}

impl FusionWeights {
    /// Default lexical weight.
    pub const DEFAULT_LEXICAL: f32 = 0.4;
    /// Default vector weight.
    pub const DEFAULT_VECTOR: f32 = 0.6;

    /// Create weights.
    pub const fn new(lexical: f32, vector: f32) -> Self {
        Self { lexical, vector }
    }

    /// Validate the weights.
    pub fn validate(&self) -> Result<()> {
        let ok = |w: f32| w.is_finite() && w >= 0.0;
        if !ok(self.lexical) || !ok(self.vector) {
            return Err(LecternError::configuration(
                "Fusion weights must be finite and non-negative",
            ));
        }
        if self.lexical + self.vector <= 0.0 {
            return Err(LecternError::configuration(
                "At least one fusion weight must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LEXICAL, Self::DEFAULT_VECTOR)
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates returned after fusion, at most [`MAX_TOP_K`].
    pub top_k: usize,
    /// Hits requested from each index before fusion.
    pub candidate_pool: usize,
    /// Fusion weights.
    pub fusion: FusionWeights,
    /// Lexical hits must score strictly above this before fusion.
    pub min_lexical_score: f32,
    /// Vector hits must have a cosine similarity strictly above this before
    /// fusion.
    pub min_vector_score: f32,
}

impl RetrievalConfig {
    /// Default vector similarity floor.
    pub const DEFAULT_MIN_VECTOR_SCORE: f32 = 0.2;
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            candidate_pool: 10,
            fusion: FusionWeights::default(),
            min_lexical_score: 0.0,
            min_vector_score: Self::DEFAULT_MIN_VECTOR_SCORE,
        }
    }
}

/// Context assembly settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Token budget for the passages sent to the model.
    pub max_tokens: usize,
    /// Longest excerpt kept per article before budgeting, in characters.
    pub excerpt_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: 6000,
            excerpt_chars: 2000,
        }
    }
}

/// How questions are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClassifierStrategy {
    /// Structured generative-model call.
    #[default]
    Llm,
    /// Deterministic phrase rules, no model call.
    Rules,
}

/// Classifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Strategy.
    pub strategy: ClassifierStrategy,
    /// Timeout for the classification call, in seconds.
    pub timeout_secs: u64,
    /// Fall back to content retrieval when a named category, tag or color is
    /// not in the owner's library.
    pub strict_vocabulary: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            strategy: ClassifierStrategy::Llm,
            timeout_secs: 15,
            strict_vocabulary: true,
        }
    }
}

impl ClassifierConfig {
    /// Timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Answer synthesis settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Timeout for the whole generation, in seconds. For streams this bounds
    /// the gap between consecutive chunks.
    pub timeout_secs: u64,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token cap.
    pub max_tokens: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            temperature: 0.3,
            max_tokens: 1500,
        }
    }
}

impl SynthesisConfig {
    /// Timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Complete engine configuration.
///
/// # Examples
///
/// ```rust
/// use lectern_core::config::AskConfig;
///
/// let config = AskConfig::from_toml_str(r#"
/// [retrieval]
/// top_k = 5
///
/// [retrieval.fusion]
/// lexical = 0.5
/// vector = 0.5
/// "#).unwrap();
/// assert_eq!(config.retrieval.top_k, 5);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AskConfig {
    /// Generative model.
    pub llm: LlmConfig,
    /// Embedding model.
    pub embedder: EmbedderConfig,
    /// Retrieval.
    pub retrieval: RetrievalConfig,
    /// Context assembly.
    pub context: ContextConfig,
    /// Classification.
    pub classifier: ClassifierConfig,
    /// Synthesis.
    pub synthesis: SynthesisConfig,
}

impl AskConfig {
    /// Load from a `.json` or `.toml` file, substituting `${VAR}` references.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let content = tokio::fs::read_to_string(path).await?;
        let config = match format {
            ConfigFormat::Json => Self::from_json_str(&content)?,
            ConfigFormat::Toml => Self::from_toml_str(&content)?,
        };
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse JSON, substituting `${VAR}` references, and validate.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let content = loader::substitute_env_variables(content);
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML, substituting `${VAR}` references, and validate.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let content = loader::substitute_env_variables(content);
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize as pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.llm.validate()?;
        self.embedder.validate()?;
        self.retrieval.fusion.validate()?;

        if self.retrieval.top_k == 0 || self.retrieval.top_k > MAX_TOP_K {
            return Err(LecternError::configuration(format!(
                "retrieval.top_k must be between 1 and {MAX_TOP_K}, got {}",
                self.retrieval.top_k
            )));
        }
        if self.retrieval.candidate_pool == 0 {
            return Err(LecternError::configuration(
                "retrieval.candidate_pool must be greater than 0",
            ));
        }
        let floor = &self.retrieval;
        if !floor.min_lexical_score.is_finite() || floor.min_lexical_score < 0.0 {
            return Err(LecternError::configuration(
                "retrieval.min_lexical_score must be finite and non-negative",
            ));
        }
        if !(0.0..1.0).contains(&floor.min_vector_score) {
            return Err(LecternError::configuration(format!(
                "retrieval.min_vector_score must be in [0, 1), got {}",
                floor.min_vector_score
            )));
        }
        if self.context.max_tokens == 0 {
            return Err(LecternError::configuration(
                "context.max_tokens must be greater than 0",
            ));
        }
        if self.context.excerpt_chars == 0 {
            return Err(LecternError::configuration(
                "context.excerpt_chars must be greater than 0",
            ));
        }
        if self.classifier.timeout_secs == 0 || self.synthesis.timeout_secs == 0 {
            return Err(LecternError::configuration(
                "Model call timeouts must be greater than 0 seconds",
            ));
        }
        Ok(())
    }
}
