//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files for the workflow stages
//! and the recommenders.
//!
//! Template loading chain:
//! 1. `.challenge-architect/prompts/{name}.pmt` (user override)
//! 2. Embedded fallback in code
//!
//! Templates use Handlebars syntax for variable substitution.

pub mod embedded;
mod loader;

pub use loader::{
    ConflictContext, DiscussionContext, GenerationContext, ProblemContext, PromptError, PromptLoader, Template,
    TypedProblemContext,
};
