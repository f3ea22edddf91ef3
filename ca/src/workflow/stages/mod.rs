//! Stage functions
//!
//! Every stage takes the shared collaborators, the run's state and the
//! session channel, and updates the state in place.

use serde::Serialize;
use tracing::debug;

use super::{Collaborators, Stage, WorkflowError, WorkflowState};
use crate::session::{Channel, ChannelError, Outbound, REPLY_PROMPT};

mod discussion;
mod generation;
mod schema;
mod scope;
mod similarity;

pub use discussion::spec_discussion;
pub use generation::spec_generation;
pub use schema::schema_selection;
pub use scope::scope_discussion;
pub use similarity::similarity_search;

/// Run one stage
///
/// A completed state is left untouched.
pub async fn run_stage(
    stage: Stage,
    collaborators: &Collaborators,
    state: &mut WorkflowState,
    channel: &dyn Channel,
) -> Result<(), WorkflowError> {
    debug!(%stage, "run_stage: called");
    if state.is_complete {
        debug!(%stage, "run_stage: workflow already complete, skipping");
        return Ok(());
    }

    match stage {
        Stage::ScopeDiscussion => scope_discussion(collaborators, state, channel).await,
        Stage::SchemaSelection => schema_selection(collaborators, state, channel).await,
        Stage::SimilaritySearch => similarity_search(collaborators, state, channel).await,
        Stage::SpecGeneration => spec_generation(collaborators, state, channel).await,
        Stage::SpecDiscussion => spec_discussion(collaborators, state, channel).await,
    }
}

/// Show the assistant's message and wait for the human, substituting `fallback` for an empty reply
async fn converse(channel: &dyn Channel, message: &str, fallback: &str) -> Result<String, ChannelError> {
    if !message.trim().is_empty() {
        channel.emit(Outbound::message(message)).await?;
    }
    let reply = channel.ask(REPLY_PROMPT).await?;
    if reply.is_empty() {
        debug!(%fallback, "converse: empty reply, using fallback");
        Ok(fallback.to_string())
    } else {
        Ok(reply)
    }
}

fn pretty<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}
