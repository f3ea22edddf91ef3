//! Workflow - five-stage state machine from goal to specification
//!
//! ```text
//! ScopeDiscussion ──(scope set)──▶ SchemaSelection ──▶ SimilaritySearch ──▶ SpecGeneration
//!    ▲      │                                                                 ▲      │
//!    └──────┘ (scope empty)                              (spec not committed) └──────┘
//!                                                                                    │
//!                                                          (spec committed)          ▼
//!                                              End ◀──(complete)── SpecDiscussion ◀──┘
//! ```
//!
//! Each stage mutates the run's [`WorkflowState`] in place. The engine picks
//! the next stage from [`Stage::next`] after every stage returns.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::llm::{CompletionRequest, LlmClient, LlmError, Message, StopReason};
use crate::prompts::{PromptError, PromptLoader};
use crate::schema::{SchemaError, SchemaProvider};
use crate::search::{SearchError, SimilaritySearch};
use crate::session::ChannelError;

mod engine;
mod reply;
mod stage;
pub mod stages;
mod state;

pub use engine::WorkflowEngine;
pub use reply::{PARSE_FAILURE_MESSAGE, ParsedReply, ScopeReply, SpecReply};
pub use stage::{Stage, Transition};
pub use state::{DEFAULT_CHALLENGE_TYPE, ReasoningEntry, Scope, Suggestion, SuggestionStatus, WorkflowState};

/// Errors that abort a workflow run
///
/// Malformed model output is not here: stages recover from it locally.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Completion Service call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Similarity search failed: {0}")]
    Search(#[from] SearchError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("Failed to serialise prompt context: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stage {stage} did not finish within {limit} turns")]
    TurnLimitExceeded { stage: Stage, limit: u32 },
}

/// Rate-limit waits per completion before the error aborts the run
const MAX_RATE_LIMIT_WAITS: u32 = 3;

/// Tunables the stages read
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    /// None = unlimited
    pub max_spec_changes: Option<u32>,
    /// None = unbounded self-loops
    pub max_stage_turns: Option<u32>,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            max_tokens: 4096,
            max_spec_changes: None,
            max_stage_turns: None,
        }
    }
}

impl WorkflowSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            max_spec_changes: config.workflow.max_spec_changes,
            max_stage_turns: config.workflow.max_stage_turns,
        }
    }
}

/// Shared service handles, built once per process and reused by every stage
#[derive(Clone)]
pub struct Collaborators {
    pub llm: Arc<dyn LlmClient>,
    pub search: Arc<dyn SimilaritySearch>,
    pub schemas: Arc<dyn SchemaProvider>,
    pub prompts: Arc<PromptLoader>,
    pub settings: WorkflowSettings,
}

impl Collaborators {
    /// One JSON-mode completion over `transcript`; returns the raw reply text
    ///
    /// A rate-limited call waits the advertised `retry_after` and is retried,
    /// up to `MAX_RATE_LIMIT_WAITS` times.
    pub(crate) async fn complete(&self, system_prompt: String, transcript: &[Message]) -> Result<String, LlmError> {
        let request = CompletionRequest::json(system_prompt, transcript.to_vec())
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);

        let mut waits = 0;
        loop {
            match self.llm.complete(request.clone()).await {
                Ok(response) => {
                    debug!(
                        input_tokens = response.usage.input_tokens,
                        output_tokens = response.usage.output_tokens,
                        "Collaborators::complete: usage"
                    );
                    if response.stop_reason == StopReason::MaxTokens {
                        warn!(max_tokens = self.settings.max_tokens, "Collaborators::complete: reply truncated at token limit");
                    }
                    return Ok(response.text_or_empty().to_string());
                }
                Err(LlmError::RateLimited { retry_after }) if waits < MAX_RATE_LIMIT_WAITS => {
                    waits += 1;
                    warn!(?retry_after, waits, "Rate limited, sleeping for {:?}", retry_after);
                    tokio::time::sleep(retry_after).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{collaborators, no_hits};
    use super::*;
    use crate::llm::CompletionResponse;
    use crate::llm::client::mock::MockLlmClient;
    use crate::session::channel::mock::ScriptedChannel;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Rate-limits the first `limited` calls, then answers every stage with a completing reply
    struct RateLimitedModel {
        limited: usize,
        calls: AtomicUsize,
    }

    impl RateLimitedModel {
        fn new(limited: usize) -> Self {
            Self {
                limited,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmClient for RateLimitedModel {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.limited {
                return Err(LlmError::RateLimited {
                    retry_after: Duration::from_millis(10),
                });
            }
            let reply = if request.system_prompt.contains("\"work_scope\"") {
                r#"{"message": "ok", "completed": true, "work_scope": {"description": "Ordering app", "type": "qa"}}"#
            } else if request.system_prompt.contains("Similar past challenges") {
                r#"{"message": "Here", "completed": true, "specification": {"title": "Campus Eats"}}"#
            } else {
                r#"{"message": "Bye", "completed": true}"#
            };
            Ok(CompletionResponse::text(reply))
        }
    }

    fn with_llm(llm: Arc<dyn LlmClient>) -> Collaborators {
        let mut c = collaborators(Arc::new(MockLlmClient::new(vec![])), no_hits());
        c.llm = llm;
        c
    }

    #[tokio::test]
    async fn test_rate_limited_run_still_finishes() {
        let model = Arc::new(RateLimitedModel::new(1));
        let c = with_llm(model.clone());
        let channel = ScriptedChannel::new(vec![]);

        let state = WorkflowEngine::new(&c)
            .run(WorkflowState::new(None, "Food app"), &channel)
            .await
            .unwrap();

        assert!(state.is_complete);
        assert_eq!(state.committed_spec["title"], "Campus Eats");
        // one rejected call plus one per completing stage
        assert_eq!(model.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_persistent_rate_limit_aborts() {
        let model = Arc::new(RateLimitedModel::new(usize::MAX));
        let c = with_llm(model.clone());

        let err = c.complete("sys".to_string(), &[Message::user("hi")]).await.unwrap_err();

        assert!(matches!(err, LlmError::RateLimited { .. }));
        assert_eq!(model.calls.load(Ordering::SeqCst), MAX_RATE_LIMIT_WAITS as usize + 1);
    }

    #[tokio::test]
    async fn test_truncated_reply_is_still_returned() {
        struct Truncating;

        #[async_trait]
        impl LlmClient for Truncating {
            async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
                let mut response = CompletionResponse::text(r#"{"message": "cut"#);
                response.stop_reason = StopReason::MaxTokens;
                Ok(response)
            }
        }

        let c = with_llm(Arc::new(Truncating));
        let raw = c.complete("sys".to_string(), &[]).await.unwrap();
        assert_eq!(raw, r#"{"message": "cut"#);
    }
}
