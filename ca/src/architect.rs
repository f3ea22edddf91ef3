//! Challenge Architect - one end-to-end run from goal to specification

use std::path::Path;
use std::sync::Arc;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Config;
use crate::llm::create_client;
use crate::prompts::PromptLoader;
use crate::schema::catalog_provider;
use crate::search::QdrantSearch;
use crate::session::{Channel, Outbound};
use crate::workflow::{Collaborators, ReasoningEntry, WorkflowEngine, WorkflowError, WorkflowSettings, WorkflowState};

/// Goal used when the human does not type one
pub const DEFAULT_GOAL: &str = "I want to build a food delivery app for students";

const WELCOME: &str = "## Welcome to the AI Challenge Spec Generator!
Please describe your goal for the challenge.
Examples:
- 'I want to build a food delivery app for students'
- 'Create a marketplace for freelance designers'
- 'Build an AI model to predict stock prices'
- 'Design a mobile game for kids'";

const GOAL_PROMPT: &str = "Your challenge description: ";

const COMPLETED_BANNER: &str = "## CHALLENGE SPECIFICATION GENERATION IS COMPLETED!";

/// Final result of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeOutcome {
    pub specification: Map<String, Value>,
    pub reasoning_trace: Vec<ReasoningEntry>,
}

/// Owns the shared collaborators and runs sessions against them
#[derive(Clone)]
pub struct ChallengeArchitect {
    collaborators: Collaborators,
}

impl ChallengeArchitect {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    /// Build the production collaborators from configuration
    ///
    /// Prompt overrides are looked up under `root`.
    pub fn from_config(config: &Config, root: &Path) -> Result<Self> {
        debug!(root = %root.display(), "ChallengeArchitect::from_config: called");
        let llm = create_client(&config.llm).context("Failed to create Completion Service client")?;
        let search = QdrantSearch::from_config(&config.search, &config.llm)
            .context("Failed to create Similarity Search client")?;

        let schemas = catalog_provider(config.workflow.schema_file.as_deref());

        Ok(Self::new(Collaborators {
            llm,
            search: Arc::new(search),
            schemas,
            prompts: Arc::new(PromptLoader::new(root)),
            settings: WorkflowSettings::from_config(config),
        }))
    }

    /// Greet, collect the goal, run the workflow and present the result
    pub async fn process_challenge(
        &self,
        session_id: Option<String>,
        channel: &dyn Channel,
    ) -> Result<ChallengeOutcome, WorkflowError> {
        debug!(?session_id, "process_challenge: called");
        channel.emit(Outbound::message(WELCOME)).await?;

        let mut goal = channel.ask(GOAL_PROMPT).await?;
        if goal.is_empty() {
            goal = DEFAULT_GOAL.to_string();
            channel
                .emit(Outbound::debug(format!("Using default prompt: {}", goal)))
                .await?;
        }

        let state = WorkflowState::new(session_id, goal);
        let state = WorkflowEngine::new(&self.collaborators).run(state, channel).await?;

        channel.emit(Outbound::message(COMPLETED_BANNER)).await?;
        emit_section(channel, "Generated Challenge Specification", &state.committed_spec, false).await?;
        emit_section(channel, "Scope Suggestions Log", &state.suggestion_log, true).await?;
        emit_section(channel, "Specification Reasoning Trace", &state.reasoning_trace, true).await?;

        Ok(ChallengeOutcome {
            specification: state.committed_spec,
            reasoning_trace: state.reasoning_trace,
        })
    }
}

async fn emit_section<T: Serialize + Sync>(
    channel: &dyn Channel,
    title: &str,
    content: &T,
    debug_only: bool,
) -> Result<(), WorkflowError> {
    let body = serde_json::to_string_pretty(content)?;
    let (title, body) = if debug_only {
        (Outbound::debug(title), Outbound::debug(body))
    } else {
        (Outbound::message(title), Outbound::message(body))
    };
    channel.emit(title).await?;
    channel.emit(body).await?;
    Ok(())
}
