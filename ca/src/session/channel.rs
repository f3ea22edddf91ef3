//! Input/Output channels
//!
//! A channel is how a workflow run talks to its human: emit a message, or
//! ask a question and wait for the reply.

use async_trait::async_trait;
use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

/// Prompt shown when the workflow waits for a reply
pub const REPLY_PROMPT: &str = "You: ";

/// Kind of outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboundKind {
    /// Conversation text meant for the human
    Message,
    /// Progress notes, reasoning traces, suggestion logs
    Debug,
}

/// A message from the workflow to the human
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outbound {
    pub kind: OutboundKind,
    pub content: String,
}

impl Outbound {
    pub fn message(content: impl Into<String>) -> Self {
        Self {
            kind: OutboundKind::Message,
            content: content.into(),
        }
    }

    pub fn debug(content: impl Into<String>) -> Self {
        Self {
            kind: OutboundKind::Debug,
            content: content.into(),
        }
    }

    pub fn is_debug(&self) -> bool {
        self.kind == OutboundKind::Debug
    }
}

/// Channel failures
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel closed")]
    Closed,

    #[error("Input interrupted")]
    Interrupted,

    #[error("Channel I/O error: {0}")]
    Io(String),
}

/// Per-session conversation channel
#[async_trait]
pub trait Channel: Send + Sync {
    /// Deliver a message to the human
    async fn emit(&self, message: Outbound) -> Result<(), ChannelError>;

    /// Show `prompt` and wait for the human's reply (trimmed, possibly empty)
    ///
    /// There is no timeout: a silent human blocks the caller indefinitely.
    async fn ask(&self, prompt: &str) -> Result<String, ChannelError>;
}

/// Single-session terminal channel
pub struct ConsoleChannel {
    show_debug: bool,
    preset: Mutex<Option<String>>,
}

impl ConsoleChannel {
    pub fn new(show_debug: bool) -> Self {
        debug!(%show_debug, "ConsoleChannel::new: called");
        Self {
            show_debug,
            preset: Mutex::new(None),
        }
    }

    /// Answer the first question with `reply` instead of reading the terminal
    pub fn with_first_reply(mut self, reply: Option<String>) -> Self {
        self.preset = Mutex::new(reply);
        self
    }

    fn take_preset(&self) -> Option<String> {
        self.preset.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

#[async_trait]
impl Channel for ConsoleChannel {
    async fn emit(&self, message: Outbound) -> Result<(), ChannelError> {
        match message.kind {
            OutboundKind::Message => println!("{}", message.content),
            OutboundKind::Debug if self.show_debug => println!("{}", message.content.dimmed()),
            OutboundKind::Debug => {}
        }
        Ok(())
    }

    async fn ask(&self, prompt: &str) -> Result<String, ChannelError> {
        debug!("ConsoleChannel::ask: called");
        if let Some(reply) = self.take_preset() {
            println!("\n{}{}", prompt.bright_green(), reply);
            return Ok(reply.trim().to_string());
        }

        let prompt = format!("\n{}", prompt.bright_green());

        // rustyline blocks the thread; keep it off the runtime workers
        let line = tokio::task::spawn_blocking(move || -> Result<String, ChannelError> {
            let mut rl = DefaultEditor::new().map_err(|e| ChannelError::Io(format!("Failed to initialize readline: {}", e)))?;
            match rl.readline(&prompt) {
                Ok(line) => Ok(line),
                Err(ReadlineError::Interrupted) => Err(ChannelError::Interrupted),
                Err(ReadlineError::Eof) => Ok(String::new()),
                Err(err) => Err(ChannelError::Io(err.to_string())),
            }
        })
        .await
        .map_err(|e| ChannelError::Io(e.to_string()))??;

        Ok(line.trim().to_string())
    }
}
