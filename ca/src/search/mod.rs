//! Similarity Search Service
//!
//! Embeds a free-text query and returns the nearest stored reference
//! documents (past challenges). Results are opaque JSON mappings used only
//! as prompt context.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

mod embedder;
mod qdrant;

pub use embedder::{Embedder, Embedding, OpenAIEmbedder};
pub use qdrant::QdrantSearch;

/// Sentinel text returned when the search yields no documents
pub const NOT_FOUND_SENTINEL: &str = "No similar challenges found.";

/// Errors from the Similarity Search Service
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Search API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Search configuration error: {0}")]
    Config(String),
}

/// Result of a similarity search
///
/// Either the retrieved documents in rank order, or an explanatory text
/// when nothing was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SimilarItems {
    Found(Vec<Map<String, Value>>),
    NotFound(String),
}

impl SimilarItems {
    /// Build from a hit list, using the sentinel when empty
    pub fn from_hits(hits: Vec<Map<String, Value>>) -> Self {
        if hits.is_empty() {
            SimilarItems::NotFound(NOT_FOUND_SENTINEL.to_string())
        } else {
            SimilarItems::Found(hits)
        }
    }

    /// Number of documents retrieved
    pub fn len(&self) -> usize {
        match self {
            SimilarItems::Found(items) => items.len(),
            SimilarItems::NotFound(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render for inclusion in a prompt
    pub fn to_prompt_text(&self) -> Result<String, serde_json::Error> {
        match self {
            SimilarItems::Found(items) => serde_json::to_string_pretty(items),
            SimilarItems::NotFound(text) => Ok(text.clone()),
        }
    }
}

impl Default for SimilarItems {
    fn default() -> Self {
        SimilarItems::Found(Vec::new())
    }
}

/// Similarity search collaborator
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Return the top-K documents nearest to `query`
    async fn search(&self, query: &str) -> Result<SimilarItems, SearchError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Search double that returns a fixed result and records queries
    pub struct MockSearch {
        result: SimilarItems,
        queries: Mutex<Vec<String>>,
    }

    impl MockSearch {
        pub fn new(result: SimilarItems) -> Self {
            Self {
                result,
                queries: Mutex::new(Vec::new()),
            }
        }

        pub fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SimilaritySearch for MockSearch {
        async fn search(&self, query: &str) -> Result<SimilarItems, SearchError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.result.clone())
        }
    }
}
