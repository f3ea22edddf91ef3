//! Schema selection

use tracing::debug;

use super::pretty;
use crate::schema::select_schema;
use crate::session::{Channel, Outbound};
use crate::workflow::{Collaborators, DEFAULT_CHALLENGE_TYPE, WorkflowError, WorkflowState};

/// Pick the specification template for the scope's challenge type
pub async fn schema_selection(
    collaborators: &Collaborators,
    state: &mut WorkflowState,
    channel: &dyn Channel,
) -> Result<(), WorkflowError> {
    let challenge_type = state
        .scope
        .as_ref()
        .map(|s| s.type_or_default().to_string())
        .unwrap_or_else(|| DEFAULT_CHALLENGE_TYPE.to_string());
    debug!(%challenge_type, "schema_selection: called");

    channel
        .emit(Outbound::message(format!(
            "Finding specification schema for challenge type: {}...",
            challenge_type
        )))
        .await?;

    let catalog = collaborators.schemas.load()?;
    state.schema = select_schema(&catalog, &challenge_type)?;

    channel
        .emit(Outbound::message(format!(
            "Selected schema:\n```json\n{}\n```",
            pretty(&state.schema)?
        )))
        .await?;
    Ok(())
}
