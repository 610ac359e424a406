use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rihla_core::Message;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::conversation::{reduce, ChatEvent, Conversation, Effect};
use crate::scheduler::{ReplyScheduler, ScheduledReply};
use crate::{ChatError, Submission};

#[derive(Debug)]
struct Entry {
    conversation: Conversation,
    scheduled: Vec<ScheduledReply>,
    last_active: Instant,
}

/// In-memory conversations keyed by id, for surfaces that serve many chat views at once.
#[derive(Debug, Clone)]
pub struct ConversationRegistry {
    inner: Arc<RwLock<HashMap<Uuid, Entry>>>,
    scheduler: ReplyScheduler,
    max_conversations: usize,
    idle_timeout: Duration,
}

impl ConversationRegistry {
    /// Conversations untouched for `idle_timeout` are dropped before new ones are created.
    pub fn new(scheduler: ReplyScheduler, max_conversations: usize, idle_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            scheduler,
            max_conversations,
            idle_timeout,
        }
    }

    pub fn scheduler(&self) -> &ReplyScheduler {
        &self.scheduler
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn create(&self) -> Result<(Uuid, Vec<Message>), ChatError> {
        let mut guard = self.inner.write();
        self.evict_idle_locked(&mut guard);
        if guard.len() >= self.max_conversations {
            return Err(ChatError::CapacityReached {
                limit: self.max_conversations,
            });
        }

        let id = Uuid::new_v4();
        let conversation = Conversation::with_welcome(self.scheduler.interpreter().welcome());
        let messages = conversation.messages().to_vec();
        guard.insert(
            id,
            Entry {
                conversation,
                scheduled: Vec::new(),
                last_active: Instant::now(),
            },
        );

        debug!(conversation_id = %id, "conversation created");
        Ok((id, messages))
    }

    pub fn messages(&self, id: Uuid) -> Result<Vec<Message>, ChatError> {
        let mut guard = self.inner.write();
        let entry = guard.get_mut(&id).ok_or(ChatError::NotFound(id))?;
        entry.last_active = Instant::now();
        Ok(entry.conversation.messages().to_vec())
    }

    /// Appends the user message now; the reply lands after the scheduler's delay.
    pub fn submit(&self, id: Uuid, text: &str) -> Result<(Submission, Vec<Message>), ChatError> {
        let mut guard = self.inner.write();
        let entry = guard.get_mut(&id).ok_or(ChatError::NotFound(id))?;
        entry.last_active = Instant::now();

        let transition = reduce(
            std::mem::take(&mut entry.conversation),
            ChatEvent::Submitted(text.to_string()),
        );
        entry.conversation = transition.conversation;

        let submission = match transition.effect {
            Some(Effect::ScheduleReply { input }) => {
                let registry = self.clone();
                let scheduled = self
                    .scheduler
                    .schedule(input, move |reply| registry.deliver(id, reply));
                entry.scheduled.retain(|reply| !reply.is_finished());
                entry.scheduled.push(scheduled);
                Submission::Accepted
            }
            None => {
                self.scheduler.metrics().inc_rejected_submission();
                Submission::Rejected
            }
        };

        Ok((submission, entry.conversation.messages().to_vec()))
    }

    /// Discards a conversation and cancels its pending replies.
    pub fn remove(&self, id: Uuid) -> Result<usize, ChatError> {
        let entry = self
            .inner
            .write()
            .remove(&id)
            .ok_or(ChatError::NotFound(id))?;

        let cancelled = cancel_all(entry.scheduled);
        self.scheduler.metrics().add_cancelled_replies(cancelled);
        debug!(conversation_id = %id, cancelled, "conversation removed");
        Ok(cancelled)
    }

    /// Drops conversations idle for longer than the timeout. Returns how many were dropped.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_locked(&mut self.inner.write())
    }

    fn evict_idle_locked(&self, entries: &mut HashMap<Uuid, Entry>) -> usize {
        let now = Instant::now();
        let idle = entries
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.last_active) >= self.idle_timeout)
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();

        let mut cancelled = 0;
        for id in &idle {
            if let Some(entry) = entries.remove(id) {
                cancelled += cancel_all(entry.scheduled);
            }
        }

        if !idle.is_empty() {
            self.scheduler.metrics().add_cancelled_replies(cancelled);
            debug!(evicted = idle.len(), cancelled, "idle conversations evicted");
        }
        idle.len()
    }

    pub fn shutdown(&self) -> usize {
        let entries = std::mem::take(&mut *self.inner.write());
        let conversations = entries.len();
        let cancelled = entries
            .into_values()
            .map(|entry| cancel_all(entry.scheduled))
            .sum();

        self.scheduler.metrics().add_cancelled_replies(cancelled);
        info!(conversations, cancelled, "conversation registry shut down");
        cancelled
    }

    fn deliver(&self, id: Uuid, reply: String) {
        let mut guard = self.inner.write();
        let Some(entry) = guard.get_mut(&id) else {
            debug!(conversation_id = %id, "reply for discarded conversation dropped");
            return;
        };

        entry.conversation = reduce(
            std::mem::take(&mut entry.conversation),
            ChatEvent::Replied(reply),
        )
        .conversation;
    }
}

fn cancel_all(scheduled: Vec<ScheduledReply>) -> usize {
    scheduled.iter().filter(|reply| reply.cancel()).count()
}
