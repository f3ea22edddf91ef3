//! Standalone recommenders
//!
//! Single-shot helpers that suggest challenge settings from a problem
//! statement. None of them fail: any error is logged and an empty or
//! placeholder value is returned instead.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::llm::{CompletionRequest, LlmClient, LlmError, Message, create_client};
use crate::prompts::{ConflictContext, ProblemContext, PromptError, PromptLoader, Template, TypedProblemContext};

pub const IMPACT_FALLBACK: &str = "Could not generate an impact preview at this time.";
pub const CONFLICT_FALLBACK_WARNING: &str = "Could not perform AI validation at this time due to an error.";

const JSON_ASSISTANT: &str = "You are a helpful assistant that outputs JSON.";
const CONFLICT_ASSISTANT: &str = "You are an expert challenge designer and helpful assistant that outputs JSON.";
const IMPACT_ASSISTANT: &str = "You are a concise copywriter for innovation challenges.";

const CHALLENGE_TYPE_TEMPERATURE: f32 = 0.5;
const CONFLICT_TEMPERATURE: f32 = 0.5;
const IMPACT_TEMPERATURE: f32 = 0.6;
const IMPACT_MAX_TOKENS: u32 = 150;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// What to recommend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationKind {
    ChallengeTypes,
    Audience,
    Evaluation,
    Prize,
    Timeline,
    Impact,
}

impl RecommendationKind {
    pub const ALL: [RecommendationKind; 6] = [
        Self::ChallengeTypes,
        Self::Audience,
        Self::Evaluation,
        Self::Prize,
        Self::Timeline,
        Self::Impact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChallengeTypes => "challenge-types",
            Self::Audience => "audience",
            Self::Evaluation => "evaluation",
            Self::Prize => "prize",
            Self::Timeline => "timeline",
            Self::Impact => "impact",
        }
    }
}

impl fmt::Display for RecommendationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RecommendationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|k| k.as_str()).collect();
                format!("Unknown recommendation kind '{}'. Expected one of: {}", s, known.join(", "))
            })
    }
}

/// Total challenge length in days for a challenge type
pub fn total_days(challenge_type: &str) -> Option<i64> {
    match challenge_type {
        "ideation" => Some(14),
        "theoretical" => Some(28),
        "rtp" => Some(42),
        "erfp" => Some(35),
        "prodigy" => Some(21),
        _ => None,
    }
}

/// Assign concrete dates to a timeline recommendation
///
/// The challenge starts the day after `today`. With a known total length
/// and at least two milestones, milestones are spread evenly from start to
/// end. `endDate` is the last milestone's date, or start plus the total.
pub fn apply_timeline_schedule(recommendation: &mut Map<String, Value>, challenge_type: &str, today: NaiveDate) {
    debug!(%challenge_type, %today, "apply_timeline_schedule: called");
    let start = today + Duration::days(1);
    let total = total_days(challenge_type).unwrap_or(0);
    recommendation.insert("startDate".to_string(), Value::from(start.format(DATE_FORMAT).to_string()));

    let mut last_date = None;
    if let Some(Value::Array(milestones)) = recommendation.get_mut("milestones") {
        if total > 0 && milestones.len() > 1 {
            let step = total as f64 / (milestones.len() - 1) as f64;
            for (i, milestone) in milestones.iter_mut().enumerate() {
                let date = start + Duration::days((i as f64 * step) as i64);
                if let Value::Object(m) = milestone {
                    m.insert("date".to_string(), Value::from(date.format(DATE_FORMAT).to_string()));
                }
            }
        }
        last_date = milestones
            .last()
            .and_then(|m| m.get("date"))
            .and_then(Value::as_str)
            .map(String::from);
    }

    let end = last_date.unwrap_or_else(|| (start + Duration::days(total)).format(DATE_FORMAT).to_string());
    recommendation.insert("endDate".to_string(), Value::from(end));
}

#[derive(Debug, Error)]
enum RecommendError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("Invalid JSON from model: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Model reply is not a JSON object")]
    NotObject,

    #[error("Model reply was empty")]
    Empty,
}

/// Recommendation collaborators sharing one Completion Service client
pub struct Recommender {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    temperature: f32,
}

impl Recommender {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>, temperature: f32) -> Self {
        Self {
            llm,
            prompts,
            temperature,
        }
    }

    /// Recommender on the configured recommender model
    pub fn from_config(config: &Config, root: &Path) -> Result<Self, LlmError> {
        debug!(model = %config.recommender.model, "Recommender::from_config: called");
        let llm_config = config
            .llm
            .with_model(&config.recommender.model, config.recommender.temperature);
        Ok(Self::new(
            create_client(&llm_config)?,
            Arc::new(PromptLoader::new(root)),
            config.recommender.temperature,
        ))
    }

    async fn ask_json<C: Serialize + Sync>(
        &self,
        template: Template,
        context: &C,
        system: &str,
        temperature: f32,
    ) -> Result<Map<String, Value>, RecommendError> {
        let prompt = self.prompts.render(template, context)?;
        let request =
            CompletionRequest::json(system, vec![Message::user(prompt)]).with_temperature(temperature);
        let response = self.llm.complete(request).await?;
        match serde_json::from_str::<Value>(response.text_or_empty())? {
            Value::Object(map) => Ok(map),
            _ => Err(RecommendError::NotObject),
        }
    }

    async fn typed_map(&self, template: Template, problem: &str, challenge_type: &str) -> Map<String, Value> {
        let context = TypedProblemContext {
            problem_statement: problem.to_string(),
            challenge_type: challenge_type.to_string(),
        };
        match self.ask_json(template, &context, JSON_ASSISTANT, self.temperature).await {
            Ok(map) => map,
            Err(e) => {
                warn!(%template, error = %e, "recommendation failed, returning empty result");
                Map::new()
            }
        }
    }

    /// Ranked challenge type suggestions; empty on any failure
    pub async fn challenge_types(&self, problem: &str) -> Vec<Value> {
        debug!("challenge_types: called");
        let context = ProblemContext {
            problem_description: problem.to_string(),
        };
        match self
            .ask_json(Template::ChallengeType, &context, JSON_ASSISTANT, CHALLENGE_TYPE_TEMPERATURE)
            .await
        {
            Ok(mut map) => match map.remove("recommendations") {
                Some(Value::Array(list)) => list,
                other => {
                    warn!(?other, "challenge_types: model did not return a list");
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(error = %e, "challenge_types: recommendation failed");
                Vec::new()
            }
        }
    }

    pub async fn audience(&self, problem: &str, challenge_type: &str) -> Map<String, Value> {
        debug!(%challenge_type, "audience: called");
        self.typed_map(Template::Audience, problem, challenge_type).await
    }

    pub async fn evaluation(&self, problem: &str, challenge_type: &str) -> Map<String, Value> {
        debug!(%challenge_type, "evaluation: called");
        self.typed_map(Template::Evaluation, problem, challenge_type).await
    }

    pub async fn prize(&self, problem: &str, challenge_type: &str) -> Map<String, Value> {
        debug!(%challenge_type, "prize: called");
        self.typed_map(Template::Prize, problem, challenge_type).await
    }

    /// Milestones with dates starting tomorrow; empty on any failure
    pub async fn timeline(&self, problem: &str, challenge_type: &str, today: NaiveDate) -> Map<String, Value> {
        debug!(%challenge_type, "timeline: called");
        let mut recommendation = self.typed_map(Template::Timeline, problem, challenge_type).await;
        if !recommendation.is_empty() {
            apply_timeline_schedule(&mut recommendation, challenge_type, today);
        }
        recommendation
    }

    /// Two or three sentences of plain text
    pub async fn impact_preview(&self, problem: &str, challenge_type: &str) -> String {
        debug!(%challenge_type, "impact_preview: called");
        let result: Result<String, RecommendError> = async {
            let context = TypedProblemContext {
                problem_statement: problem.to_string(),
                challenge_type: challenge_type.to_string(),
            };
            let prompt = self.prompts.render(Template::Impact, &context)?;
            let mut request = CompletionRequest::json(IMPACT_ASSISTANT, vec![Message::user(prompt)])
                .with_temperature(IMPACT_TEMPERATURE)
                .with_max_tokens(IMPACT_MAX_TOKENS);
            request.json_output = false;
            let response = self.llm.complete(request).await?;
            match response.text_or_empty().trim() {
                "" => Err(RecommendError::Empty),
                text => Ok(text.to_string()),
            }
        }
        .await;

        result.unwrap_or_else(|e| {
            warn!(error = %e, "impact_preview: failed, using placeholder");
            IMPACT_FALLBACK.to_string()
        })
    }

    /// Inconsistencies across everything entered for a challenge
    pub async fn detect_conflicts(&self, challenge_data: &Value) -> Map<String, Value> {
        debug!("detect_conflicts: called");
        let result = match serde_json::to_string_pretty(challenge_data) {
            Ok(summary) => {
                let context = ConflictContext {
                    challenge_data: summary,
                };
                self.ask_json(Template::Conflicts, &context, CONFLICT_ASSISTANT, CONFLICT_TEMPERATURE)
                    .await
            }
            Err(e) => Err(e.into()),
        };

        result.unwrap_or_else(|e| {
            warn!(error = %e, "detect_conflicts: failed, returning fallback warning");
            let mut map = Map::new();
            map.insert("warnings".to_string(), Value::from(vec![CONFLICT_FALLBACK_WARNING]));
            map
        })
    }

    /// Dispatch by kind, for the CLI and the HTTP API
    pub async fn recommend(
        &self,
        kind: RecommendationKind,
        problem: &str,
        challenge_type: &str,
        today: NaiveDate,
    ) -> Value {
        match kind {
            RecommendationKind::ChallengeTypes => Value::Array(self.challenge_types(problem).await),
            RecommendationKind::Audience => Value::Object(self.audience(problem, challenge_type).await),
            RecommendationKind::Evaluation => Value::Object(self.evaluation(problem, challenge_type).await),
            RecommendationKind::Prize => Value::Object(self.prize(problem, challenge_type).await),
            RecommendationKind::Timeline => Value::Object(self.timeline(problem, challenge_type, today).await),
            RecommendationKind::Impact => Value::String(self.impact_preview(problem, challenge_type).await),
        }
    }
}
