//! Parsing of structured model replies
//!
//! A reply either parses into the stage's record, or is reported as
//! `ParseFailed` and the stage carries on as "not complete".

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::{ReasoningEntry, Scope, Suggestion};

/// Shown to the human when a reply could not be understood
pub const PARSE_FAILURE_MESSAGE: &str = "I'm having a little trouble processing that. Could you try rephrasing?";

/// Outcome of parsing a model reply
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply<T> {
    Parsed(T),
    ParseFailed { raw: String, error: String },
}

impl<T: DeserializeOwned> ParsedReply<T> {
    /// Parse a reply that must be a JSON object
    pub fn parse(raw: &str) -> Self {
        let failed = |error: String| ParsedReply::ParseFailed {
            raw: raw.to_string(),
            error,
        };

        match serde_json::from_str::<Value>(raw) {
            Ok(object @ Value::Object(_)) => match serde_json::from_value::<T>(object) {
                Ok(reply) => ParsedReply::Parsed(reply),
                Err(e) => failed(e.to_string()),
            },
            Ok(_) => failed("reply is not a JSON object".to_string()),
            Err(e) => failed(e.to_string()),
        }
    }
}

/// Transcript entry recorded in place of an unparseable reply
pub fn fallback_record() -> String {
    serde_json::json!({ "completed": false, "message": PARSE_FAILURE_MESSAGE }).to_string()
}

/// Scope discussion reply
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScopeReply {
    #[serde(deserialize_with = "lenient")]
    pub message: Option<String>,

    #[serde(deserialize_with = "lenient")]
    pub completed: bool,

    #[serde(deserialize_with = "lenient")]
    pub work_scope: Option<Scope>,

    #[serde(deserialize_with = "lenient")]
    pub suggestions: Option<Vec<Suggestion>>,
}

/// Specification generation or discussion reply
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SpecReply {
    #[serde(deserialize_with = "lenient")]
    pub message: Option<String>,

    #[serde(deserialize_with = "lenient")]
    pub completed: bool,

    /// Empty when the reply carried no (or an unusable) specification
    #[serde(deserialize_with = "lenient")]
    pub specification: Map<String, Value>,

    #[serde(deserialize_with = "lenient")]
    pub reasoning_trace: Vec<ReasoningEntry>,
}

/// Deserialize a field, falling back to its default when the value has the wrong shape
///
/// A model that sends `"specification": ""` or a malformed suggestion list
/// should lose that field, not the whole reply.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(T::default());
    }
    match serde_json::from_value(value) {
        Ok(v) => Ok(v),
        Err(e) => {
            warn!(error = %e, "lenient: ignoring malformed reply field");
            Ok(T::default())
        }
    }
}
