//! Workflow state threaded through one session's run

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::llm::Message;
use crate::search::SimilarItems;

/// Challenge type assumed when the scope does not name one
pub const DEFAULT_CHALLENGE_TYPE: &str = "development";

/// Agreed scope of work for the challenge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scope {
    pub description: String,

    /// One of development, design, datascience, qa
    #[serde(rename = "type")]
    pub challenge_type: String,
}

impl Scope {
    pub fn is_empty(&self) -> bool {
        self.description.trim().is_empty() && self.challenge_type.trim().is_empty()
    }

    /// Challenge type, or the default when unset
    pub fn type_or_default(&self) -> &str {
        match self.challenge_type.trim() {
            "" => DEFAULT_CHALLENGE_TYPE,
            t => t,
        }
    }
}

/// Status of a scoping suggestion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

/// A suggestion made during scope discussion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Suggestion {
    pub item: String,
    pub status: SuggestionStatus,
    pub reason: String,
}

/// How one specification field was derived
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningEntry {
    pub field: String,

    /// 0.0 to 1.0; models sometimes send it as a string or out of range
    #[serde(deserialize_with = "confidence_score")]
    pub confidence: f64,

    pub reason: String,
}

/// Accept a number or numeric string, clamped to [0, 1]
fn confidence_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    let score: f64 = match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n,
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom)?,
    };
    if !score.is_finite() {
        warn!(score, "confidence_score: not a finite number, using 0");
        return Ok(0.0);
    }
    if !(0.0..=1.0).contains(&score) {
        warn!(score, "confidence_score: out of range, clamping");
    }
    Ok(score.clamp(0.0, 1.0))
}

/// Full mutable record for one workflow run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowState {
    /// Owning session; absent in single-session mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    pub scope_conversation: Vec<Message>,
    pub draft_conversation: Vec<Message>,
    pub review_conversation: Vec<Message>,

    /// Set once the scope stage completes
    pub scope: Option<Scope>,

    pub schema: Map<String, Value>,
    pub similar_items: SimilarItems,

    /// Latest specification proposed during generation
    pub draft_spec: Map<String, Value>,
    /// Specification promoted by generation, or by discussion at completion
    pub committed_spec: Map<String, Value>,
    /// Change proposed during discussion, promoted when discussion completes
    pub pending_spec: Map<String, Value>,

    pub suggestion_log: Vec<Suggestion>,
    pub reasoning_trace: Vec<ReasoningEntry>,

    /// Specification updates accepted during discussion
    pub spec_changes: u32,

    pub is_complete: bool,
}

impl WorkflowState {
    /// Fresh state seeded with the human's goal as the first scope message
    pub fn new(session_id: Option<String>, goal: impl Into<String>) -> Self {
        Self {
            session_id,
            scope_conversation: vec![Message::user(goal)],
            ..Self::default()
        }
    }

    pub fn has_scope(&self) -> bool {
        self.scope.as_ref().is_some_and(|s| !s.is_empty())
    }

    pub fn has_committed_spec(&self) -> bool {
        !self.committed_spec.is_empty()
    }

    /// The specification under discussion: pending change if any, else committed
    pub fn working_spec(&self) -> &Map<String, Value> {
        if self.pending_spec.is_empty() {
            &self.committed_spec
        } else {
            &self.pending_spec
        }
    }

    /// Move a pending change into the committed specification
    ///
    /// An empty pending change leaves the committed specification alone.
    pub fn promote_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending_spec);
        if !pending.is_empty() {
            self.committed_spec = pending;
        }
    }

    /// Lengths of the three transcripts (scope, draft, review)
    pub fn conversation_lengths(&self) -> (usize, usize, usize) {
        (
            self.scope_conversation.len(),
            self.draft_conversation.len(),
            self.review_conversation.len(),
        )
    }
}
