//! OpenAI Chat Completions client

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, Message, StopReason, TokenUsage};
use crate::config::LlmConfig;

/// Retries after the first attempt for transient failures
const MAX_RETRIES: u32 = 3;

const INITIAL_BACKOFF_MS: u64 = 1000;

/// Fallback wait when a 429 carries no usable `retry-after`
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Model families that take `max_completion_tokens` and reject `temperature`
const REASONING_MODEL_PREFIXES: [&str; 3] = ["gpt-5", "o1", "o3"];

/// Completion Service client for OpenAI-compatible endpoints
pub struct OpenAIClient {
    model: String,
    api_key: String,
    endpoint: String,
    http: Client,
    timeout: Duration,
    max_tokens: u32,
}

impl OpenAIClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "OpenAIClient::from_config: called");
        let api_key = config
            .get_api_key()
            .map_err(|e| LlmError::MissingApiKey(e.to_string()))?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            endpoint: format!("{}/v1/chat/completions", config.base_url.trim_end_matches('/')),
            http,
            timeout,
            max_tokens: config.max_tokens,
        })
    }

    fn is_reasoning_model(&self) -> bool {
        REASONING_MODEL_PREFIXES.iter().any(|p| self.model.starts_with(p))
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        debug!(model = %self.model, json_output = request.json_output, "request_body: called");
        let mut messages = vec![json!({ "role": "system", "content": request.system_prompt })];
        messages.extend(request.messages.iter().map(wire_message));

        let max_tokens = request.max_tokens.min(self.max_tokens);
        let mut body = json!({ "model": self.model, "messages": messages });
        if self.is_reasoning_model() {
            body["max_completion_tokens"] = json!(max_tokens);
        } else {
            body["max_tokens"] = json!(max_tokens);
            body["temperature"] = json!(request.temperature);
        }
        if request.json_output {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }

    /// One HTTP round trip, with failures classified into `LlmError`
    async fn send(&self, body: &Value) -> Result<CompletionResponse, LlmError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { LlmError::Timeout(self.timeout) } else { LlmError::Network(e) })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: ChatResponse = response.json().await?;
        into_completion(api_response)
    }
}

fn wire_message(message: &Message) -> Value {
    json!({ "role": message.role.as_str(), "content": message.content })
}

fn into_completion(api_response: ChatResponse) -> Result<CompletionResponse, LlmError> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("Response contained no choices".to_string()))?;

    let usage = api_response
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(CompletionResponse {
        content: choice.message.content,
        stop_reason: StopReason::from_openai(choice.finish_reason.as_deref()),
        usage,
    })
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(model = %self.model, message_count = request.messages.len(), "OpenAIClient::complete: called");
        let body = self.request_body(&request);

        let mut attempt = 0;
        loop {
            match self.send(&body).await {
                Err(e) if e.is_transient() && attempt < MAX_RETRIES => {
                    let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt);
                    attempt += 1;
                    warn!(attempt, backoff_ms = backoff, error = %e, "OpenAIClient::complete: transient failure, retrying");
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                result => return result,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
