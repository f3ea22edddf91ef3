//! Prompt Loader
//!
//! Loads prompt templates from files or falls back to embedded defaults.

use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::embedded;

/// Directory, relative to the working directory, checked for overrides
const USER_PROMPT_DIR: &str = ".challenge-architect/prompts";

/// Every template the application renders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Scope,
    Generation,
    Discussion,
    ChallengeType,
    Audience,
    Evaluation,
    Prize,
    Timeline,
    Impact,
    Conflicts,
}

impl Template {
    /// File stem of the template (`{name}.pmt`)
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scope => "scope",
            Self::Generation => "generation",
            Self::Discussion => "discussion",
            Self::ChallengeType => "challenge_type",
            Self::Audience => "audience",
            Self::Evaluation => "evaluation",
            Self::Prize => "prize",
            Self::Timeline => "timeline",
            Self::Impact => "impact",
            Self::Conflicts => "conflicts",
        }
    }
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Errors from loading or rendering a template
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt template not found: {0}")]
    NotFound(String),

    #[error("Failed to read prompt {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render template {name}: {message}")]
    Render { name: String, message: String },
}

/// Context for the specification generation stage
#[derive(Debug, Clone, Serialize)]
pub struct GenerationContext {
    pub challenge_type: String,
    pub scope: String,
    /// Selected schema, pretty-printed JSON
    pub schema: String,
    /// Similar past challenges, pretty-printed JSON or the not-found sentinel
    pub similar_challenges: String,
}

/// Context for the specification discussion stage
#[derive(Debug, Clone, Serialize)]
pub struct DiscussionContext {
    pub specification: String,
    pub reasoning_trace: String,
    /// Either a number or "unlimited"
    pub max_changes: String,
    pub changes_made: u32,
}

/// Context for the challenge type recommender
#[derive(Debug, Clone, Serialize)]
pub struct ProblemContext {
    pub problem_description: String,
}

/// Context for recommenders that also know the chosen challenge type
#[derive(Debug, Clone, Serialize)]
pub struct TypedProblemContext {
    pub problem_statement: String,
    pub challenge_type: String,
}

/// Context for the conflict detector
#[derive(Debug, Clone, Serialize)]
pub struct ConflictContext {
    /// Everything the sponsor entered, pretty-printed JSON
    pub challenge_data: String,
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `.challenge-architect/prompts/`)
    user_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that checks `{root}/.challenge-architect/prompts/` first
    pub fn new(root: impl AsRef<Path>) -> Self {
        let user_dir = root.as_ref().join(USER_PROMPT_DIR);
        debug!(user_dir = %user_dir.display(), "PromptLoader::new: called");
        Self {
            hbs: Self::engine(),
            user_dir: if user_dir.exists() { Some(user_dir) } else { None },
        }
    }

    /// Create a loader that only uses embedded prompts (for testing)
    pub fn embedded_only() -> Self {
        Self {
            hbs: Self::engine(),
            user_dir: None,
        }
    }

    // Prompts are plain text; HTML escaping would mangle the embedded JSON
    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name
    ///
    /// Checks in order:
    /// 1. User override: `.challenge-architect/prompts/{name}.pmt`
    /// 2. Embedded fallback
    fn load_template(&self, name: &str) -> Result<String, PromptError> {
        debug!(%name, "load_template: called");
        if let Some(ref user_dir) = self.user_dir {
            let path = user_dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!("Loading prompt from user override: {:?}", path);
                return std::fs::read_to_string(&path).map_err(|source| PromptError::Io { path, source });
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!("Using embedded prompt: {}", name);
            return Ok(content.to_string());
        }

        Err(PromptError::NotFound(name.to_string()))
    }

    /// Render a template with the given context
    pub fn render<C: Serialize>(&self, template: Template, context: &C) -> Result<String, PromptError> {
        debug!(%template, "render: called");
        let source = self.load_template(template.name())?;
        self.hbs
            .render_template(&source, context)
            .map_err(|e| PromptError::Render {
                name: template.name().to_string(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn generation_context() -> GenerationContext {
        GenerationContext {
            challenge_type: "design".to_string(),
            scope: "Mockups for a student food delivery app".to_string(),
            schema: r#"{"title": "string"}"#.to_string(),
            similar_challenges: "No similar challenges found.".to_string(),
        }
    }

    #[test]
    fn test_render_generation_substitutes_fields() {
        let loader = PromptLoader::embedded_only();
        let prompt = loader.render(Template::Generation, &generation_context()).unwrap();

        assert!(prompt.contains("Mockups for a student food delivery app"));
        assert!(prompt.contains("No similar challenges found."));
        assert!(!prompt.contains("{{scope}}"));
    }

    #[test]
    fn test_render_does_not_escape_json() {
        let loader = PromptLoader::embedded_only();
        let prompt = loader.render(Template::Generation, &generation_context()).unwrap();
        assert!(prompt.contains(r#"{"title": "string"}"#));
        assert!(!prompt.contains("&quot;"));
    }

    #[test]
    fn test_render_discussion_limits() {
        let loader = PromptLoader::embedded_only();
        let ctx = DiscussionContext {
            specification: "{}".to_string(),
            reasoning_trace: "[]".to_string(),
            max_changes: "unlimited".to_string(),
            changes_made: 2,
        };
        let prompt = loader.render(Template::Discussion, &ctx).unwrap();
        assert!(prompt.contains("at most unlimited changes (2 made so far)"));
    }

    #[test]
    fn test_user_override_wins() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(USER_PROMPT_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("impact.pmt"), "Custom impact for {{challenge_type}}").unwrap();

        let loader = PromptLoader::new(temp.path());
        let ctx = TypedProblemContext {
            problem_statement: "x".to_string(),
            challenge_type: "rtp".to_string(),
        };
        assert_eq!(loader.render(Template::Impact, &ctx).unwrap(), "Custom impact for rtp");

        // Templates without an override still come from the binary
        let scope = loader.render(Template::Scope, &serde_json::json!({})).unwrap();
        assert!(scope.contains("work_scope"));
    }

    #[test]
    fn test_prompt_loader_unknown_template() {
        let loader = PromptLoader::embedded_only();
        assert!(matches!(
            loader.load_template("nonexistent-template"),
            Err(PromptError::NotFound(_))
        ));
    }
}
