//! Specification generation

use tracing::{debug, info, warn};

use super::{converse, pretty};
use crate::llm::Message;
use crate::prompts::{GenerationContext, Template};
use crate::session::{Channel, Outbound};
use crate::workflow::reply::fallback_record;
use crate::workflow::{Collaborators, PARSE_FAILURE_MESSAGE, ParsedReply, SpecReply, WorkflowError, WorkflowState};

/// Human reply used when the human answers with nothing
pub const SPEC_FALLBACK_REPLY: &str = "I'm not sure, can you suggest something?";

pub const SPEC_GENERATED_MESSAGE: &str =
    "Excellent! We have generated the challenge specification. Here's the formatted specification:";

const NO_SCOPE_DESCRIPTION: &str = "No scope provided";

/// One exchange of the generation conversation
///
/// A non-empty specification in the reply becomes the draft. Completion
/// promotes the latest non-empty draft to `committed_spec`; the human's
/// follow-up then opens the review transcript instead of the draft one.
pub async fn spec_generation(
    collaborators: &Collaborators,
    state: &mut WorkflowState,
    channel: &dyn Channel,
) -> Result<(), WorkflowError> {
    debug!(turns = state.draft_conversation.len(), "spec_generation: called");
    let scope = state.scope.clone().unwrap_or_default();
    let context = GenerationContext {
        challenge_type: scope.type_or_default().to_string(),
        scope: if scope.description.trim().is_empty() {
            NO_SCOPE_DESCRIPTION.to_string()
        } else {
            scope.description.clone()
        },
        schema: pretty(&state.schema)?,
        similar_challenges: state.similar_items.to_prompt_text()?,
    };
    let system_prompt = collaborators.prompts.render(Template::Generation, &context)?;
    let raw = collaborators.complete(system_prompt, &state.draft_conversation).await?;

    let mut committed = false;
    let message = match ParsedReply::<SpecReply>::parse(&raw) {
        ParsedReply::Parsed(reply) => {
            state.draft_conversation.push(Message::assistant(raw));
            if !reply.specification.is_empty() {
                state.draft_spec = reply.specification;
            }
            if !reply.reasoning_trace.is_empty() {
                state.reasoning_trace = reply.reasoning_trace;
            }

            if reply.completed && !state.draft_spec.is_empty() {
                info!(fields = state.draft_spec.len(), "spec_generation: specification committed");
                state.committed_spec = state.draft_spec.clone();
                committed = true;

                channel.emit(Outbound::message(SPEC_GENERATED_MESSAGE)).await?;
                channel.emit(Outbound::message(pretty(&state.committed_spec)?)).await?;
                channel.emit(Outbound::debug("Reasoning trace:")).await?;
                channel.emit(Outbound::debug(pretty(&state.reasoning_trace)?)).await?;
            } else if reply.completed {
                warn!("spec_generation: completed without a specification, continuing");
            }
            reply.message.unwrap_or_default()
        }
        ParsedReply::ParseFailed { raw, error } => {
            warn!(%error, raw_len = raw.len(), "spec_generation: unparseable reply");
            state.draft_conversation.push(Message::assistant(fallback_record()));
            PARSE_FAILURE_MESSAGE.to_string()
        }
    };

    let answer = converse(channel, &message, SPEC_FALLBACK_REPLY).await?;
    if committed {
        state.review_conversation.push(Message::user(answer));
    } else {
        state.draft_conversation.push(Message::user(answer));
    }
    Ok(())
}
