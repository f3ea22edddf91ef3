//! Similar past challenge retrieval

use tracing::{debug, info};

use crate::session::{Channel, Outbound};
use crate::workflow::{Collaborators, DEFAULT_CHALLENGE_TYPE, WorkflowError, WorkflowState};

/// Retrieve reference documents for the scope description
pub async fn similarity_search(
    collaborators: &Collaborators,
    state: &mut WorkflowState,
    channel: &dyn Channel,
) -> Result<(), WorkflowError> {
    debug!("similarity_search: called");
    channel
        .emit(Outbound::debug("Searching similar past challenges..."))
        .await?;

    let query = state
        .scope
        .as_ref()
        .map(|s| s.description.trim())
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_CHALLENGE_TYPE)
        .to_string();

    state.similar_items = collaborators.search.search(&query).await?;
    info!(found = state.similar_items.len(), "similarity_search: done");

    channel
        .emit(Outbound::debug(format!(
            "Found {} similar challenges based on scope description.",
            state.similar_items.len()
        )))
        .await?;
    channel
        .emit(Outbound::debug("Generating challenge specification..."))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::search::SimilarItems;
    use crate::search::mock::MockSearch;
    use crate::session::channel::mock::ScriptedChannel;
    use crate::workflow::Scope;
    use crate::workflow::testing::collaborators;
    use serde_json::{Map, json};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_queries_with_scope_description() {
        let doc: Map<String, serde_json::Value> =
            serde_json::from_value(json!({"id": "c-7", "name": "Campus Eats", "score": 0.91})).unwrap();
        let search = Arc::new(MockSearch::new(SimilarItems::from_hits(vec![doc])));
        let c = collaborators(Arc::new(MockLlmClient::new(vec![])), search.clone());
        let channel = ScriptedChannel::new(vec![]);
        let mut state = WorkflowState {
            scope: Some(Scope {
                description: "Student food ordering app".to_string(),
                challenge_type: "development".to_string(),
            }),
            ..WorkflowState::default()
        };

        similarity_search(&c, &mut state, &channel).await.unwrap();

        assert_eq!(search.queries(), vec!["Student food ordering app"]);
        assert_eq!(state.similar_items.len(), 1);
        assert!(channel.emitted().iter().all(|m| m.is_debug()));
    }

    #[tokio::test]
    async fn test_missing_description_uses_placeholder_and_keeps_sentinel() {
        let search = Arc::new(MockSearch::new(SimilarItems::from_hits(vec![])));
        let c = collaborators(Arc::new(MockLlmClient::new(vec![])), search.clone());
        let mut state = WorkflowState {
            scope: Some(Scope {
                description: String::new(),
                challenge_type: "qa".to_string(),
            }),
            ..WorkflowState::default()
        };

        similarity_search(&c, &mut state, &ScriptedChannel::new(vec![])).await.unwrap();

        assert_eq!(search.queries(), vec![DEFAULT_CHALLENGE_TYPE]);
        assert!(matches!(state.similar_items, SimilarItems::NotFound(_)));
    }
}
