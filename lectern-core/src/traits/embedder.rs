//! Embedding generation trait.
//!
//! Query embeddings must come from the same model and version that produced
//! the document embeddings at ingestion time, otherwise vector scores are
//! meaningless. [`Embedder::model_name`] exists so deployments can check this.

use async_trait::async_trait;

use crate::Result;

/// Maps text to a fixed-dimension dense vector.
///
/// # Examples
///
/// ```rust,no_run
/// use lectern_core::traits::Embedder;
/// use lectern_core::Result;
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct ConstantEmbedder {
///     dimension: usize,
/// }
///
/// #[async_trait]
/// impl Embedder for ConstantEmbedder {
///     async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
///         Ok(vec![0.1; self.dimension])
///     }
///
///     fn dimension(&self) -> usize {
///         self.dimension
///     }
///
///     fn model_name(&self) -> &str {
///         "constant"
///     }
/// }
/// ```
#[async_trait]
pub trait Embedder: Send + Sync + std::fmt::Debug {
    /// Generate the embedding for a single text.
    ///
    /// The returned vector has exactly [`dimension`](Self::dimension) entries.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for several texts, in input order.
    async fn embed_batch(&self, texts: Vec<&str>) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Dimension of produced vectors.
    fn dimension(&self) -> usize;

    /// Model identifier, used for logging and compatibility checks.
    fn model_name(&self) -> &str;

    /// Longest input (in characters) the model accepts, if bounded.
    fn max_input_chars(&self) -> Option<usize> {
        None
    }

    /// Check if the embedder is ready.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
