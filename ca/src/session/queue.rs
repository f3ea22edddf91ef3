//! Queue-backed channel for server sessions

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Channel, ChannelError, Outbound, Session};

/// Channel bound to one registry session
///
/// Replies come from the session's input queue; output goes to the
/// session's transcript and its attached connection, if any.
pub struct QueueChannel {
    session: Arc<Session>,
}

impl QueueChannel {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Channel for QueueChannel {
    async fn emit(&self, message: Outbound) -> Result<(), ChannelError> {
        self.session.publish(message);
        Ok(())
    }

    async fn ask(&self, _prompt: &str) -> Result<String, ChannelError> {
        debug!(session_id = %self.session.id(), "QueueChannel::ask: waiting for input");
        let reply = self.session.next_input().await?;
        Ok(reply.trim().to_string())
    }
}
