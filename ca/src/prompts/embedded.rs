//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

pub const SCOPE: &str = include_str!("../../prompts/scope.pmt");
pub const GENERATION: &str = include_str!("../../prompts/generation.pmt");
pub const DISCUSSION: &str = include_str!("../../prompts/discussion.pmt");

pub const CHALLENGE_TYPE: &str = include_str!("../../prompts/challenge_type.pmt");
pub const AUDIENCE: &str = include_str!("../../prompts/audience.pmt");
pub const EVALUATION: &str = include_str!("../../prompts/evaluation.pmt");
pub const PRIZE: &str = include_str!("../../prompts/prize.pmt");
pub const TIMELINE: &str = include_str!("../../prompts/timeline.pmt");
pub const IMPACT: &str = include_str!("../../prompts/impact.pmt");
pub const CONFLICTS: &str = include_str!("../../prompts/conflicts.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    let content = match name {
        "scope" => SCOPE,
        "generation" => GENERATION,
        "discussion" => DISCUSSION,
        "challenge_type" => CHALLENGE_TYPE,
        "audience" => AUDIENCE,
        "evaluation" => EVALUATION,
        "prize" => PRIZE,
        "timeline" => TIMELINE,
        "impact" => IMPACT,
        "conflicts" => CONFLICTS,
        _ => {
            debug!("get_embedded: no match found");
            return None;
        }
    };
    Some(content)
}
