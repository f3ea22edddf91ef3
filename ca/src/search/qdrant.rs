//! Qdrant-backed similarity search

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{Embedder, OpenAIEmbedder, SearchError, SimilarItems, SimilaritySearch};
use crate::config::{LlmConfig, SearchConfig};

/// Similarity search over a Qdrant collection of past challenges
pub struct QdrantSearch {
    http: Client,
    embedder: Arc<dyn Embedder>,
    endpoint: String,
    collection: String,
    api_key: Option<String>,
    limit: usize,
}

impl QdrantSearch {
    pub fn new(embedder: Arc<dyn Embedder>, config: &SearchConfig, api_key: Option<String>) -> Result<Self, SearchError> {
        debug!(endpoint = %config.endpoint, collection = %config.collection, limit = config.limit, "QdrantSearch::new: called");
        if config.limit == 0 {
            return Err(SearchError::Config("search limit must be at least 1".to_string()));
        }
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            embedder,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            api_key,
            limit: config.limit,
        })
    }

    /// Build the search from configuration, embedding with the LLM provider's credentials
    pub fn from_config(search: &SearchConfig, llm: &LlmConfig) -> Result<Self, SearchError> {
        let openai_key = llm.get_api_key().map_err(|e| SearchError::Config(e.to_string()))?;
        let embedder = OpenAIEmbedder::new(
            openai_key,
            &llm.base_url,
            &search.embedding_model,
            Duration::from_millis(llm.timeout_ms),
        )?;
        let qdrant_key = std::env::var(&search.api_key_env).ok();
        Self::new(Arc::new(embedder), search, qdrant_key)
    }

    fn query_body(&self, vector: &[f32]) -> Value {
        serde_json::json!({
            "query": vector,
            "limit": self.limit,
            "with_payload": true,
        })
    }
}

#[async_trait]
impl SimilaritySearch for QdrantSearch {
    async fn search(&self, query: &str) -> Result<SimilarItems, SearchError> {
        debug!(query_len = query.len(), "QdrantSearch::search: called");
        let vector = self.embedder.embed(query).await?;

        let url = format!("{}/collections/{}/points/query", self.endpoint, self.collection);
        let mut request = self.http.post(url).json(&self.query_body(&vector));
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError { status, message });
        }

        let body: QueryResponse = response.json().await?;
        let hits: Vec<Map<String, Value>> = body
            .result
            .points
            .into_iter()
            .map(|point| {
                let payload = point.payload.unwrap_or_default();
                let id = payload_text(&payload, "id").unwrap_or("No id found");
                let name = payload_text(&payload, "name").unwrap_or("No name provided");
                info!(%id, %name, score = point.score, "Fetched similar challenge");
                payload
            })
            .collect();

        Ok(SimilarItems::from_hits(hits))
    }
}

fn payload_text<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    result: QueryResult,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    points: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    score: f32,
    payload: Option<Map<String, Value>>,
}
