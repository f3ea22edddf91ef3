//! Scope discussion

use tracing::{debug, info, warn};

use super::{converse, pretty};
use crate::llm::Message;
use crate::prompts::Template;
use crate::session::{Channel, Outbound};
use crate::workflow::reply::fallback_record;
use crate::workflow::{Collaborators, PARSE_FAILURE_MESSAGE, ParsedReply, ScopeReply, WorkflowError, WorkflowState};

/// Human reply used when the human answers with nothing
pub const SCOPE_FALLBACK_REPLY: &str = "No, that's all for now.";

pub const SCOPE_COMPLETE_MESSAGE: &str = "Excellent! We have decided the scope of the challenge. Here's the summary:";

/// One exchange of the scope conversation
///
/// Either fills `scope` (completion with a non-empty work scope), or appends
/// the human's next reply to the scope transcript.
pub async fn scope_discussion(
    collaborators: &Collaborators,
    state: &mut WorkflowState,
    channel: &dyn Channel,
) -> Result<(), WorkflowError> {
    debug!(turns = state.scope_conversation.len(), "scope_discussion: called");
    let system_prompt = collaborators.prompts.render(Template::Scope, &serde_json::json!({}))?;
    let raw = collaborators.complete(system_prompt, &state.scope_conversation).await?;

    let message = match ParsedReply::<ScopeReply>::parse(&raw) {
        ParsedReply::Parsed(reply) => {
            state.scope_conversation.push(Message::assistant(raw));
            if let Some(suggestions) = reply.suggestions {
                state.suggestion_log = suggestions;
            }

            if reply.completed {
                match reply.work_scope.filter(|s| !s.is_empty()) {
                    Some(scope) => {
                        info!(challenge_type = %scope.type_or_default(), "scope_discussion: scope agreed");
                        channel.emit(Outbound::message(SCOPE_COMPLETE_MESSAGE)).await?;
                        channel.emit(Outbound::message(pretty(&scope)?)).await?;
                        state.scope = Some(scope);
                        return Ok(());
                    }
                    None => warn!("scope_discussion: completed without a work scope, continuing"),
                }
            }
            reply.message.unwrap_or_default()
        }
        ParsedReply::ParseFailed { raw, error } => {
            warn!(%error, raw_len = raw.len(), "scope_discussion: unparseable reply");
            state.scope_conversation.push(Message::assistant(fallback_record()));
            PARSE_FAILURE_MESSAGE.to_string()
        }
    };

    let answer = converse(channel, &message, SCOPE_FALLBACK_REPLY).await?;
    state.scope_conversation.push(Message::user(answer));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use crate::llm::client::mock::MockLlmClient;
    use crate::session::channel::mock::ScriptedChannel;
    use crate::workflow::testing::{collaborators, no_hits};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_incomplete_reply_asks_human() {
        let llm = Arc::new(MockLlmClient::new(vec![
            r#"{"message": "Is this for iOS or Android?", "completed": false, "suggestions": []}"#,
        ]));
        let c = collaborators(llm.clone(), no_hits());
        let channel = ScriptedChannel::new(vec!["Both"]);
        let mut state = WorkflowState::new(None, "Food delivery app for students");

        scope_discussion(&c, &mut state, &channel).await.unwrap();

        assert!(state.scope.is_none());
        assert_eq!(state.scope_conversation.len(), 3);
        assert_eq!(state.scope_conversation[1].role, Role::Assistant);
        assert_eq!(state.scope_conversation[2], Message::user("Both"));
        assert_eq!(channel.messages(), vec!["Is this for iOS or Android?"]);

        // The model saw the seeded goal
        assert_eq!(llm.requests()[0].messages, vec![Message::user("Food delivery app for students")]);
        assert!(llm.requests()[0].json_output);
    }

    #[tokio::test]
    async fn test_completion_sets_scope_and_suggestions() {
        let llm = Arc::new(MockLlmClient::new(vec![
            r#"{"message": "Great", "completed": true,
                "work_scope": {"description": "Ordering flow mockups", "type": "design"},
                "suggestions": [{"item": "Mockups first", "status": "accepted", "reason": "Cheaper"}]}"#,
        ]));
        let c = collaborators(llm, no_hits());
        let channel = ScriptedChannel::new(vec![]);
        let mut state = WorkflowState::new(None, "goal");

        scope_discussion(&c, &mut state, &channel).await.unwrap();

        let scope = state.scope.as_ref().unwrap();
        assert_eq!(scope.challenge_type, "design");
        assert_eq!(state.suggestion_log.len(), 1);
        assert_eq!(state.scope_conversation.len(), 2);
        assert_eq!(channel.ask_count(), 0);
        assert_eq!(channel.messages()[0], SCOPE_COMPLETE_MESSAGE);
    }

    #[tokio::test]
    async fn test_completed_without_work_scope_keeps_talking() {
        let llm = Arc::new(MockLlmClient::new(vec![r#"{"message": "All set", "completed": true}"#]));
        let c = collaborators(llm, no_hits());
        let channel = ScriptedChannel::new(vec![]);
        let mut state = WorkflowState::new(None, "goal");

        scope_discussion(&c, &mut state, &channel).await.unwrap();

        assert!(!state.has_scope());
        assert_eq!(state.scope_conversation.last().unwrap(), &Message::user(SCOPE_FALLBACK_REPLY));
    }

    #[tokio::test]
    async fn test_unparseable_reply_falls_back() {
        let llm = Arc::new(MockLlmClient::new(vec!["Sure, let's talk about your app!"]));
        let c = collaborators(llm, no_hits());
        let channel = ScriptedChannel::new(vec!["ok"]);
        let mut state = WorkflowState::new(None, "goal");

        scope_discussion(&c, &mut state, &channel).await.unwrap();

        assert!(state.scope.is_none());
        assert!(!state.is_complete);
        assert!(state.scope_conversation[1].content.contains("\"completed\":false"));
        assert_eq!(channel.messages(), vec![PARSE_FAILURE_MESSAGE]);
    }
}
