//! Specification review

use tracing::{debug, info, warn};

use super::{converse, pretty};
use crate::llm::Message;
use crate::prompts::{DiscussionContext, Template};
use crate::session::{Channel, Outbound};
use crate::workflow::reply::fallback_record;
use crate::workflow::{Collaborators, PARSE_FAILURE_MESSAGE, ParsedReply, SpecReply, WorkflowError, WorkflowState};

use super::generation::SPEC_FALLBACK_REPLY;

const UNLIMITED: &str = "unlimited";

/// One exchange of the review conversation
///
/// Proposed changes land in `pending_spec` and are promoted when the model
/// signals completion. Completion without a change keeps the committed spec.
pub async fn spec_discussion(
    collaborators: &Collaborators,
    state: &mut WorkflowState,
    channel: &dyn Channel,
) -> Result<(), WorkflowError> {
    debug!(turns = state.review_conversation.len(), changes = state.spec_changes, "spec_discussion: called");
    let limit = collaborators.settings.max_spec_changes;
    let context = DiscussionContext {
        specification: pretty(state.working_spec())?,
        reasoning_trace: pretty(&state.reasoning_trace)?,
        max_changes: limit.map(|n| n.to_string()).unwrap_or_else(|| UNLIMITED.to_string()),
        changes_made: state.spec_changes,
    };
    let system_prompt = collaborators.prompts.render(Template::Discussion, &context)?;
    let raw = collaborators.complete(system_prompt, &state.review_conversation).await?;

    let message = match ParsedReply::<SpecReply>::parse(&raw) {
        ParsedReply::Parsed(reply) => {
            state.review_conversation.push(Message::assistant(raw));

            let within_limit = limit.is_none_or(|max| state.spec_changes < max);
            if !reply.specification.is_empty() && within_limit {
                state.pending_spec = reply.specification;
                state.spec_changes += 1;
                channel.emit(Outbound::message("Specification updated:")).await?;
                channel.emit(Outbound::message(pretty(&state.pending_spec)?)).await?;

                if !reply.reasoning_trace.is_empty() {
                    state.reasoning_trace = reply.reasoning_trace;
                    channel.emit(Outbound::debug("Reasoning trace updated:")).await?;
                    channel.emit(Outbound::debug(pretty(&state.reasoning_trace)?)).await?;
                }
            } else if !reply.specification.is_empty() {
                warn!(changes = state.spec_changes, "spec_discussion: change limit reached, ignoring update");
            }

            if reply.completed {
                state.promote_pending();
                state.is_complete = true;
                info!(changes = state.spec_changes, "spec_discussion: workflow complete");
                return Ok(());
            }
            reply.message.unwrap_or_default()
        }
        ParsedReply::ParseFailed { raw, error } => {
            warn!(%error, raw_len = raw.len(), "spec_discussion: unparseable reply");
            state.review_conversation.push(Message::assistant(fallback_record()));
            PARSE_FAILURE_MESSAGE.to_string()
        }
    };

    let answer = converse(channel, &message, SPEC_FALLBACK_REPLY).await?;
    state.review_conversation.push(Message::user(answer));
    Ok(())
}
