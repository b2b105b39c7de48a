//! Feature-hashing embedder.

use async_trait::async_trait;
use lectern_core::{LecternError, Result, traits::Embedder};
use sha2::{Digest, Sha256};

use crate::memory::bm25::tokenize;

/// Deterministic embedder that hashes terms into a fixed number of buckets.
///
/// Each term is hashed with SHA-256; the first eight bytes pick the bucket
/// and the ninth picks the sign. Terms come from the BM25 tokenizer, so
/// stop words carry no weight. The result is L2-normalized, so cosine
/// similarity between two texts grows with their shared vocabulary.
///
/// # Examples
///
/// ```rust
/// use lectern_integrations::HashingEmbedder;
/// use lectern_core::traits::Embedder;
///
/// # tokio_test::block_on(async {
/// let embedder = HashingEmbedder::new(64).unwrap();
/// let a = embedder.embed("rust ownership").await.unwrap();
/// let b = embedder.embed("rust ownership").await.unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 64);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    max_input_chars: Option<usize>,
}

impl HashingEmbedder {
    /// Create an embedder producing `dimension`-sized vectors.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(LecternError::configuration(
                "Embedding dimension must be greater than 0",
            ));
        }
        Ok(Self {
            dimension,
            max_input_chars: None,
        })
    }

    /// Declare an input length limit.
    #[must_use]
    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = Some(max_input_chars);
        self
    }

    /// Embed synchronously.
    #[allow(clippy::cast_possible_truncation)]
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for term in tokenize(text) {
            let digest = Sha256::digest(term.as_bytes());
            let mut bucket = [0_u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "feature-hashing-sha256"
    }

    fn max_input_chars(&self) -> Option<usize> {
        self.max_input_chars
    }
}
