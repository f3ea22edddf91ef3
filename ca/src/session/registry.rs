//! Session registry
//!
//! Maps session ids to their runtime state. The first reference to an id
//! creates the session and spawns its workflow run as an isolated task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info};

use super::{ChannelError, Outbound, OutboundKind, QueueChannel};
use crate::architect::ChallengeArchitect;
use crate::llm::Role;

/// Lifecycle of a session's workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
}

/// Outbound frame routed to a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFrame {
    pub session_id: String,
    pub kind: OutboundKind,
    pub content: String,
}

/// One line of a session transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub kind: OutboundKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Registry listing row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub messages: usize,
    pub connected: bool,
}

struct Connection {
    generation: u64,
    tx: mpsc::UnboundedSender<SessionFrame>,
}

/// Runtime state of one session: input queue, transcript, connection
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    input_tx: mpsc::UnboundedSender<String>,
    input_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    // Lock order: history before connection
    history: Mutex<Vec<HistoryEntry>>,
    connection: Mutex<Option<Connection>>,
    status: Mutex<SessionStatus>,
    next_generation: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            id: id.into(),
            created_at: Utc::now(),
            input_tx,
            input_rx: tokio::sync::Mutex::new(input_rx),
            history: Mutex::new(Vec::new()),
            connection: Mutex::new(None),
            status: Mutex::new(SessionStatus::Running),
            next_generation: AtomicU64::new(1),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> SessionStatus {
        *lock(&self.status)
    }

    fn set_status(&self, status: SessionStatus) {
        *lock(&self.status) = status;
    }

    /// Queue a human message for the workflow
    pub fn deliver(&self, text: &str) {
        debug!(session_id = %self.id, "Session::deliver: called");
        lock(&self.history).push(HistoryEntry {
            role: Role::User,
            kind: OutboundKind::Message,
            content: text.trim().to_string(),
            timestamp: Utc::now(),
        });
        // The receiver lives as long as the session
        let _ = self.input_tx.send(text.to_string());
    }

    /// Wait for the next human message
    pub async fn next_input(&self) -> Result<String, ChannelError> {
        self.input_rx.lock().await.recv().await.ok_or(ChannelError::Closed)
    }

    /// Record an outbound message and forward it to the attached connection
    ///
    /// Without a connection the message is only recorded; it is replayed on
    /// the next attach.
    pub fn publish(&self, message: Outbound) {
        let mut history = lock(&self.history);
        history.push(HistoryEntry {
            role: Role::Assistant,
            kind: message.kind,
            content: message.content.clone(),
            timestamp: Utc::now(),
        });

        let mut connection = lock(&self.connection);
        if let Some(conn) = connection.as_ref() {
            let frame = self.frame(message);
            if conn.tx.send(frame).is_err() {
                debug!(session_id = %self.id, generation = conn.generation, "Session::publish: connection gone");
                *connection = None;
            }
        }
    }

    /// Attach a new connection, replacing any previous one
    ///
    /// Returns the connection's generation and a receiver that starts with
    /// the replayed outbound transcript.
    pub fn attach(&self) -> (u64, mpsc::UnboundedReceiver<SessionFrame>) {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();

        let history = lock(&self.history);
        let mut connection = lock(&self.connection);
        for entry in history.iter().filter(|e| e.role == Role::Assistant) {
            let _ = tx.send(SessionFrame {
                session_id: self.id.clone(),
                kind: entry.kind,
                content: entry.content.clone(),
            });
        }
        if connection.replace(Connection { generation, tx }).is_some() {
            info!(session_id = %self.id, generation, "Session::attach: replaced previous connection");
        }
        (generation, rx)
    }

    /// Detach `generation`; a newer connection stays attached
    pub fn detach(&self, generation: u64) {
        let mut connection = lock(&self.connection);
        if connection.as_ref().is_some_and(|c| c.generation == generation) {
            debug!(session_id = %self.id, generation, "Session::detach: detached");
            *connection = None;
        }
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.connection).is_some()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        lock(&self.history).clone()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            status: self.status(),
            created_at: self.created_at,
            messages: lock(&self.history).len(),
            connected: self.is_connected(),
        }
    }

    fn frame(&self, message: Outbound) -> SessionFrame {
        SessionFrame {
            session_id: self.id.clone(),
            kind: message.kind,
            content: message.content,
        }
    }
}

/// All live sessions of the server
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    architect: ChallengeArchitect,
}

impl SessionRegistry {
    pub fn new(architect: ChallengeArchitect) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            architect,
        }
    }

    /// Existing session for `id`, or a new one with its workflow started
    pub async fn get_or_create(&self, id: &str) -> Arc<Session> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return session.clone();
        }

        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(id) {
            return session.clone();
        }
        info!(session_id = %id, "SessionRegistry::get_or_create: new session");
        let session = Session::new(id);
        sessions.insert(id.to_string(), session.clone());
        drop(sessions);

        self.spawn_run(session.clone());
        session
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<_> = self.sessions.read().await.values().map(|s| s.summary()).collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        summaries
    }

    /// Run the session's workflow in its own task
    ///
    /// The run is spawned inside a supervisor so that an error or panic is
    /// logged and reported to this session only.
    fn spawn_run(&self, session: Arc<Session>) {
        let architect = self.architect.clone();
        tokio::spawn(async move {
            let run_session = session.clone();
            let run = tokio::spawn(async move {
                let channel = QueueChannel::new(run_session.clone());
                architect
                    .process_challenge(Some(run_session.id().to_string()), &channel)
                    .await
            });

            match run.await {
                Ok(Ok(outcome)) => {
                    info!(session_id = %session.id(), fields = outcome.specification.len(), "session run completed");
                    session.set_status(SessionStatus::Completed);
                }
                Ok(Err(e)) => {
                    error!(session_id = %session.id(), error = %e, "session run failed");
                    session.publish(Outbound::message(format!("Error: {}", e)));
                    session.set_status(SessionStatus::Failed);
                }
                Err(e) => {
                    error!(session_id = %session.id(), error = %e, "session run panicked");
                    session.publish(Outbound::message("Error: the session stopped unexpectedly."));
                    session.set_status(SessionStatus::Failed);
                }
            }
        });
    }
}
