//! Embedding provider trait for turning text into dense vectors.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that encodes text into fixed-dimension dense vectors.
///
/// The provider is an external collaborator: the engine only relies on
/// [`embed`](EmbeddingProvider::embed) producing vectors of the length
/// reported by [`dimensions`](EmbeddingProvider::dimensions). The dimension
/// must be known up front so the vector index can be constructed before the
/// first insert.
///
/// # Example
///
/// ```rust,ignore
/// use densearch::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let vector = provider.embed("hello world").await?;
/// assert_eq!(vector.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Encode a single text into an embedding vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Encode a batch of texts.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially; providers with native batching should override it.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// The dimensionality of vectors produced by this provider.
    fn dimensions(&self) -> usize;

    /// A short human-readable name for error reporting.
    fn name(&self) -> &str {
        "embedding"
    }
}
