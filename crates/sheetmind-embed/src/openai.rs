//! `OpenAI`-compatible embedding provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::EmbeddingProvider;
use crate::error::{EmbedError, EmbedResult};

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/embeddings";

/// Default embedding model and dimensionality, matching the provider's
/// current recommended small model.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Default vector width for [`DEFAULT_MODEL`].
pub const DEFAULT_DIMENSIONS: usize = 1536;

/// Embeds text via an `OpenAI`-compatible `/embeddings` endpoint.
pub struct OpenAiEmbeddingProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbeddingProvider {
    /// Build a provider for the official `OpenAI` API.
    #[must_use]
    pub fn openai(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_OPENAI_URL.to_string(),
            api_key: Some(api_key.to_string()),
            model: DEFAULT_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
        }
    }

    /// Build a provider against a custom `OpenAI`-compatible endpoint.
    #[must_use]
    pub fn custom(base_url: &str, api_key: Option<&str>, model: &str, dimensions: usize) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
            api_key: api_key.map(ToString::to_string),
            model: model.to_string(),
            dimensions,
        }
    }

    /// Override the model name.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the vector width requested from the provider.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(EmbedError::ApiKeyNotConfigured { provider: "openai".to_string() });
        };

        debug!(model = %self.model, batch_size = texts.len(), "embedding batch");

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(api_key)
            .json(&serde_json::json!({
                "input": texts,
                "model": self.model,
                "dimensions": self.dimensions,
            }))
            .send()
            .await
            .map_err(|e| EmbedError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, batch_size = texts.len(), model = %self.model, "embedding API error");
            return Err(EmbedError::InvalidResponse(format!("HTTP {status}: {body}")));
        }

        let parsed: OpenAiEmbeddingResponse =
            response.json().await.map_err(|e| EmbedError::InvalidResponse(e.to_string()))?;
        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingDatum {
    embedding: Vec<f32>,
}

impl std::fmt::Debug for OpenAiEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddingProvider")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_constructor_sets_defaults() {
        let provider = OpenAiEmbeddingProvider::openai("sk-test");
        assert_eq!(provider.model(), DEFAULT_MODEL);
        assert_eq!(provider.dimensions(), DEFAULT_DIMENSIONS);
        assert!(provider.api_key.is_some());
    }

    #[tokio::test]
    async fn missing_api_key_rejects_before_any_request() {
        let provider = OpenAiEmbeddingProvider::custom("http://localhost:1/embeddings", None, "m", 4);
        let err = provider.embed_batch(&["hi".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbedError::ApiKeyNotConfigured { .. }));
    }
}
