//! Sessions - per-human channels and the multi-session registry

pub mod channel;
mod queue;
mod registry;

pub use channel::{Channel, ChannelError, ConsoleChannel, Outbound, OutboundKind, REPLY_PROMPT};
pub use queue::QueueChannel;
pub use registry::{HistoryEntry, Session, SessionFrame, SessionRegistry, SessionStatus, SessionSummary};
