//! Text embedding for similarity queries

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::SearchError;

/// Embedding vector
pub type Embedding = Vec<f32>;

/// Trait for text embedding services
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for text
    async fn embed(&self, text: &str) -> Result<Embedding, SearchError>;
}

/// OpenAI embeddings client
pub struct OpenAIEmbedder {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIEmbedder {
    pub fn new(api_key: String, base_url: &str, model: &str, timeout: Duration) -> Result<Self, SearchError> {
        debug!(%model, "OpenAIEmbedder::new: called");
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, SearchError> {
        debug!(model = %self.model, text_len = text.len(), "OpenAIEmbedder::embed: called");
        let response = self
            .http
            .post(format!("{}/v1/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": self.model,
                "input": text,
                "encoding_format": "float",
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError { status, message });
        }

        let body: EmbeddingResponse = response.json().await?;
        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| SearchError::Embedding("No embedding returned".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Embedding,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_response_parses() {
        let body: EmbeddingResponse = serde_json::from_value(serde_json::json!({
            "object": "list",
            "data": [{"object": "embedding", "index": 0, "embedding": [0.25, -0.5]}],
            "model": "text-embedding-3-small"
        }))
        .unwrap();
        assert_eq!(body.data[0].embedding, vec![0.25, -0.5]);
    }
}
