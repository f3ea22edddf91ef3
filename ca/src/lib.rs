//! Challenge Architect - conversational challenge specification pipeline
//!
//! Guides a human from a vague business goal to a structured challenge
//! specification through a fixed sequence of conversational stages, each
//! backed by a Completion Service call.
//!
//! # Modules
//!
//! - [`workflow`] - Stage state machine, workflow state and stage logic
//! - [`architect`] - One end-to-end run: greeting, goal, workflow, result
//! - [`session`] - Console and queue channels, multi-session registry
//! - [`server`] - WebSocket transport and JSON API
//! - [`recommend`] - Standalone field recommenders
//! - [`llm`] - Completion Service client
//! - [`search`] - Similarity Search Service client
//! - [`schema`] - Specification template catalog
//! - [`prompts`] - Prompt templates
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod architect;
pub mod cli;
pub mod config;
pub mod llm;
pub mod prompts;
pub mod recommend;
pub mod schema;
pub mod search;
pub mod server;
pub mod session;
pub mod workflow;

// Re-export commonly used types
pub use architect::{ChallengeArchitect, ChallengeOutcome};
pub use config::{Config, LlmConfig};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError};
pub use recommend::{RecommendationKind, Recommender};
pub use session::{Channel, ConsoleChannel, SessionRegistry};
pub use workflow::{Stage, WorkflowEngine, WorkflowError, WorkflowState};
