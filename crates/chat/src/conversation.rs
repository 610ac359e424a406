use rihla_core::Message;
use serde::{Deserialize, Serialize};

/// Append-only message list, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_welcome(welcome: &str) -> Self {
        Self {
            messages: vec![Message::assistant(welcome)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Submitted(String),
    Replied(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ScheduleReply { input: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub conversation: Conversation,
    pub effect: Option<Effect>,
}

pub fn is_submittable(text: &str) -> bool {
    !text.trim().is_empty()
}

pub fn reduce(mut conversation: Conversation, event: ChatEvent) -> Transition {
    match event {
        ChatEvent::Submitted(text) if is_submittable(&text) => {
            conversation.messages.push(Message::user(text.clone()));
            Transition {
                conversation,
                effect: Some(Effect::ScheduleReply { input: text }),
            }
        }
        ChatEvent::Submitted(_) => Transition {
            conversation,
            effect: None,
        },
        ChatEvent::Replied(text) => {
            conversation.messages.push(Message::assistant(text));
            Transition {
                conversation,
                effect: None,
            }
        }
    }
}
