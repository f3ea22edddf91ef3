//! Workflow engine - drives a state through the stages until done

use tracing::{debug, info};

use super::stages::run_stage;
use super::{Collaborators, Stage, Transition, WorkflowError, WorkflowState};
use crate::session::Channel;

/// Runs one session's workflow to completion
pub struct WorkflowEngine<'a> {
    collaborators: &'a Collaborators,
}

impl<'a> WorkflowEngine<'a> {
    pub fn new(collaborators: &'a Collaborators) -> Self {
        Self { collaborators }
    }

    /// Run from the initial stage until the discussion stage completes
    ///
    /// Stage errors abort the run and are returned as-is. With
    /// `max_stage_turns` set, a stage looping on itself more than that many
    /// times fails with `TurnLimitExceeded`.
    pub async fn run(&self, mut state: WorkflowState, channel: &dyn Channel) -> Result<WorkflowState, WorkflowError> {
        debug!(session_id = ?state.session_id, "WorkflowEngine::run: called");
        if state.is_complete {
            info!("WorkflowEngine::run: state already complete");
            return Ok(state);
        }

        let limit = self.collaborators.settings.max_stage_turns;
        let mut stage = Stage::INITIAL;
        let mut turns: u32 = 0;

        loop {
            turns += 1;
            debug!(%stage, turns, "WorkflowEngine::run: running stage");
            run_stage(stage, self.collaborators, &mut state, channel).await?;

            match stage.next(&state) {
                Transition::End => {
                    info!(session_id = ?state.session_id, "WorkflowEngine::run: workflow finished");
                    return Ok(state);
                }
                Transition::Next(next) if next == stage => {
                    if let Some(limit) = limit
                        && turns >= limit
                    {
                        return Err(WorkflowError::TurnLimitExceeded { stage, limit });
                    }
                }
                Transition::Next(next) => {
                    info!(from = %stage, to = %next, "WorkflowEngine::run: stage transition");
                    stage = next;
                    turns = 0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CompletionRequest;
    use crate::llm::client::mock::MockLlmClient;
    use crate::schema::entry_type;
    use crate::session::channel::mock::ScriptedChannel;
    use crate::workflow::WorkflowSettings;
    use crate::workflow::stages::run_stage;
    use crate::workflow::testing::{collaborators, no_hits};
    use std::sync::Arc;

    /// Answers by stage, recognised from the system prompt
    fn scripted_model(
        scope_turns: usize,
        generation_turns: usize,
        discussion_turns: usize,
    ) -> impl Fn(&CompletionRequest) -> String + Send + Sync + 'static {
        move |req: &CompletionRequest| {
            let assistant_turns = req
                .messages
                .iter()
                .filter(|m| m.role == crate::llm::Role::Assistant)
                .count();
            if req.system_prompt.contains("\"work_scope\"") {
                if assistant_turns + 1 < scope_turns {
                    r#"{"message": "Tell me more", "completed": false, "suggestions": []}"#.to_string()
                } else {
                    r#"{"message": "ok", "completed": true,
                        "work_scope": {"description": "Ordering mockups", "type": "design"},
                        "suggestions": [{"item": "Mockups first", "status": "accepted", "reason": "Cheaper"}]}"#
                        .to_string()
                }
            } else if req.system_prompt.contains("Similar past challenges") {
                if assistant_turns + 1 < generation_turns {
                    r#"{"message": "Budget?", "completed": false}"#.to_string()
                } else {
                    r#"{"message": "Here it is", "completed": true,
                        "specification": {"title": "Campus Eats"},
                        "reasoning_trace": [{"field": "title", "confidence": 0.9, "reason": "scope"}]}"#
                        .to_string()
                }
            } else if assistant_turns + 1 < discussion_turns {
                r#"{"message": "Any changes?", "completed": false}"#.to_string()
            } else {
                r#"{"message": "Bye", "completed": true}"#.to_string()
            }
        }
    }

    #[tokio::test]
    async fn test_full_run_reaches_end() {
        let llm = Arc::new(MockLlmClient::with_handler(scripted_model(2, 2, 2)));
        let c = collaborators(llm.clone(), no_hits());
        let channel = ScriptedChannel::new(vec![]);

        let state = WorkflowEngine::new(&c)
            .run(WorkflowState::new(Some("s".to_string()), "Food app"), &channel)
            .await
            .unwrap();

        assert!(state.is_complete);
        assert_eq!(state.committed_spec["title"], "Campus Eats");
        assert_eq!(entry_type(&state.schema), Some("design"));
        assert_eq!(state.suggestion_log.len(), 1);
        // goal, reply, fallback human answer, completing reply
        assert_eq!(state.scope_conversation.len(), 4);
        assert_eq!(state.draft_conversation.len(), 3);
        // generation follow-up, discussion question, answer, completing reply
        assert_eq!(state.review_conversation.len(), 4);
        assert_eq!(llm.call_count(), 6);
    }

    #[tokio::test]
    async fn test_turn_limit() {
        let llm = Arc::new(MockLlmClient::with_handler(scripted_model(100, 1, 1)));
        let mut c = collaborators(llm.clone(), no_hits());
        c.settings = WorkflowSettings {
            max_stage_turns: Some(3),
            ..WorkflowSettings::default()
        };

        let err = WorkflowEngine::new(&c)
            .run(WorkflowState::new(None, "goal"), &ScriptedChannel::new(vec![]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::TurnLimitExceeded {
                stage: Stage::ScopeDiscussion,
                limit: 3
            }
        ));
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_upstream_failure_aborts_run() {
        // Two replies, then the mock errors like a dead upstream
        let llm = Arc::new(MockLlmClient::new(vec![
            r#"{"message": "Tell me more", "completed": false}"#,
            r#"{"message": "And?", "completed": false}"#,
        ]));
        let c = collaborators(llm, no_hits());

        let result = WorkflowEngine::new(&c)
            .run(WorkflowState::new(None, "goal"), &ScriptedChannel::new(vec![]))
            .await;

        assert!(matches!(result, Err(WorkflowError::Llm(_))));
    }

    #[tokio::test]
    async fn test_conversations_never_shrink() {
        let llm = Arc::new(MockLlmClient::with_handler(scripted_model(3, 3, 3)));
        let c = collaborators(llm, no_hits());
        let channel = ScriptedChannel::new(vec!["a", "", "b"]);
        let mut state = WorkflowState::new(None, "goal");
        let mut stage = Stage::INITIAL;
        let mut last = state.conversation_lengths();

        for _ in 0..20 {
            run_stage(stage, &c, &mut state, &channel).await.unwrap();
            let now = state.conversation_lengths();
            assert!(now.0 >= last.0 && now.1 >= last.1 && now.2 >= last.2);
            last = now;
            match stage.next(&state) {
                Transition::Next(next) => stage = next,
                Transition::End => break,
            }
        }
        assert!(state.is_complete);
    }

    #[tokio::test]
    async fn test_completed_state_is_stable() {
        let llm = Arc::new(MockLlmClient::with_handler(scripted_model(1, 1, 1)));
        let c = collaborators(llm.clone(), no_hits());
        let channel = ScriptedChannel::new(vec![]);
        let state = WorkflowEngine::new(&c)
            .run(WorkflowState::new(None, "goal"), &channel)
            .await
            .unwrap();
        let calls = llm.call_count();

        let mut after = state.clone();
        for stage in [
            Stage::ScopeDiscussion,
            Stage::SchemaSelection,
            Stage::SimilaritySearch,
            Stage::SpecGeneration,
            Stage::SpecDiscussion,
        ] {
            run_stage(stage, &c, &mut after, &channel).await.unwrap();
        }
        let rerun = WorkflowEngine::new(&c).run(after.clone(), &channel).await.unwrap();

        assert_eq!(after, state);
        assert_eq!(rerun, state);
        assert_eq!(llm.call_count(), calls);
    }
}
