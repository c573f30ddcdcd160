//! Batched embedding client.
//!
//! [`EmbeddingClient`] owns the batching/timeout/index-reassembly logic
//! that's common to any provider; [`EmbeddingProvider`] is the seam a
//! concrete transport (OpenAI-compatible HTTP, a test double, …) plugs
//! into.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{EmbedError, EmbedResult};

/// The largest number of texts sent to a provider in one request.
pub const MAX_BATCH_SIZE: usize = 256;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A provider capable of turning text into fixed-dimension vectors.
///
/// Implementors receive already-batched, already-non-empty text; all
/// stripping, empty-input handling and batching is done by
/// [`EmbeddingClient`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// The model identifier this provider embeds with.
    fn model(&self) -> &str;

    /// The fixed vector width this provider produces.
    fn dimensions(&self) -> usize;

    /// Embed one batch (at most [`MAX_BATCH_SIZE`] entries), in order.
    async fn embed_batch(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>>;
}

/// Wraps a provider with batching, per-request timeout, and re-assembly
/// of the original (including blank-text) index order.
pub struct EmbeddingClient<P: EmbeddingProvider> {
    provider: P,
    timeout: Duration,
}

impl<P: EmbeddingProvider> EmbeddingClient<P> {
    /// Wrap `provider`, using [`DEFAULT_TIMEOUT`] per batch request.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self { provider, timeout: DEFAULT_TIMEOUT }
    }

    /// Wrap `provider` with a custom per-batch timeout.
    #[must_use]
    pub fn with_timeout(provider: P, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// The model identifier in use.
    #[must_use]
    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// The fixed vector width this client produces.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Embed every text in `texts`, in order.
    ///
    /// Empty input returns an empty matrix. Blank texts (empty after
    /// trimming) map to an all-zero row without ever reaching the
    /// provider. Non-blank texts are split into batches of at most
    /// [`MAX_BATCH_SIZE`] and sent to the provider with a per-request
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::Timeout`] if a batch exceeds the configured
    /// timeout, or propagates the provider's own error otherwise.
    pub async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut valid_indices = Vec::new();
        let mut valid_texts = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                valid_indices.push(i);
                valid_texts.push(trimmed.to_string());
            }
        }

        let zero_row = || vec![0.0_f32; self.dimensions()];
        if valid_texts.is_empty() {
            return Ok(texts.iter().map(|_| zero_row()).collect());
        }

        let mut valid_vectors = Vec::with_capacity(valid_texts.len());
        for batch in valid_texts.chunks(MAX_BATCH_SIZE) {
            let vectors = tokio::time::timeout(self.timeout, self.provider.embed_batch(batch))
                .await
                .map_err(|_| EmbedError::Timeout(self.timeout))??;
            valid_vectors.extend(vectors);
        }

        if valid_indices.len() == texts.len() {
            return Ok(valid_vectors);
        }

        let mut result: Vec<Vec<f32>> = texts.iter().map(|_| zero_row()).collect();
        for (valid_pos, original_idx) in valid_indices.into_iter().enumerate() {
            result[original_idx] = valid_vectors[valid_pos].clone();
        }
        Ok(result)
    }

    /// Embed a single piece of text, returning its row directly.
    ///
    /// # Errors
    ///
    /// See [`Self::embed`].
    pub async fn embed_single(&self, text: &str) -> EmbedResult<Vec<f32>> {
        let mut matrix = self.embed(std::slice::from_ref(&text.to_string())).await?;
        Ok(matrix.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubProvider {
        dimensions: usize,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EmbeddingProvider for StubProvider {
        fn model(&self) -> &str {
            "stub"
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        async fn embed_batch(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32; self.dimensions]).collect())
        }
    }

    #[tokio::test]
    async fn empty_input_returns_empty_matrix() {
        let client = EmbeddingClient::new(StubProvider { dimensions: 4, calls: Arc::new(AtomicUsize::new(0)) });
        assert!(client.embed(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_text_maps_to_zero_row_without_calling_provider() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = EmbeddingClient::new(StubProvider { dimensions: 3, calls: calls.clone() });
        let result = client.embed(&["   ".to_string()]).await.unwrap();
        assert_eq!(result, vec![vec![0.0, 0.0, 0.0]]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn mixed_blank_and_real_text_preserves_order() {
        let client = EmbeddingClient::new(StubProvider { dimensions: 1, calls: Arc::new(AtomicUsize::new(0)) });
        let result = client.embed(&["ab".to_string(), "".to_string(), "abcd".to_string()]).await.unwrap();
        assert_eq!(result, vec![vec![2.0], vec![0.0], vec![4.0]]);
    }

    #[tokio::test]
    async fn large_input_is_split_into_multiple_batches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = EmbeddingClient::new(StubProvider { dimensions: 1, calls: calls.clone() });
        let texts: Vec<String> = (0..(MAX_BATCH_SIZE + 10)).map(|i| format!("text{i}")).collect();
        client.embed(&texts).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn embed_single_returns_first_row() {
        let client = EmbeddingClient::new(StubProvider { dimensions: 1, calls: Arc::new(AtomicUsize::new(0)) });
        assert_eq!(client.embed_single("abc").await.unwrap(), vec![3.0]);
    }
}
