//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, plus pure helper functions for vector serialization and
//! similarity computation.
//!
//! Concrete provider implementations (OpenAI, Ollama, hashing) live in the
//! `docctx` app crate.

use async_trait::async_trait;

use crate::error::Result;

/// Trait for embedding providers.
///
/// Implementations are created by the application and shared with the
/// [`Indexer`](crate::indexer::Indexer) and [`Retriever`](crate::retriever::Retriever).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Platform identifier (e.g. `"openai"`).
    fn platform(&self) -> &str;
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| crate::Error::Network("Empty embedding response".to_string()))
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use docctx_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors, vectors of
/// different lengths, or zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
