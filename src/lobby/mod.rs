//! Lobby - chat join parsing and the pending-join queue

pub mod chat;
pub mod queue;

pub use chat::{parse_join, ChatEvent};
pub use queue::{JoinQueue, JoinRejected, PendingJoin};
