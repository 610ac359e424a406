mod conversation;
mod registry;
mod scheduler;
mod session;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub use conversation::{is_submittable, reduce, ChatEvent, Conversation, Effect, Transition};
pub use registry::ConversationRegistry;
pub use scheduler::{CancelToken, ReplyScheduler, ScheduledReply, DEFAULT_REPLY_DELAY};
pub use session::ChatSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Submission {
    Accepted,
    /// Blank after trimming; nothing was appended or scheduled.
    Rejected,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat session is closed")]
    Closed,

    #[error("conversation {0} not found")]
    NotFound(Uuid),

    #[error("conversation limit of {limit} reached")]
    CapacityReached { limit: usize },
}
