use rihla_core::Message;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::conversation::{reduce, ChatEvent, Conversation, Effect};
use crate::scheduler::{ReplyScheduler, ScheduledReply};
use crate::{ChatError, Submission};

/// Drives a single conversation: accepts submissions, schedules the delayed replies
/// and folds them back into the message list as they arrive.
pub struct ChatSession {
    conversation: Conversation,
    scheduler: ReplyScheduler,
    replies_tx: mpsc::UnboundedSender<String>,
    replies_rx: mpsc::UnboundedReceiver<String>,
    scheduled: Vec<ScheduledReply>,
    awaiting: usize,
    closed: bool,
}

impl ChatSession {
    pub fn new(scheduler: ReplyScheduler) -> Self {
        let conversation = Conversation::with_welcome(scheduler.interpreter().welcome());
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();

        Self {
            conversation,
            scheduler,
            replies_tx,
            replies_rx,
            scheduled: Vec::new(),
            awaiting: 0,
            closed: false,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    /// Replies scheduled but not yet folded into the conversation.
    pub fn pending(&self) -> usize {
        self.awaiting
    }

    pub fn submit(&mut self, text: &str) -> Result<Submission, ChatError> {
        if self.closed {
            return Err(ChatError::Closed);
        }

        let transition = reduce(
            std::mem::take(&mut self.conversation),
            ChatEvent::Submitted(text.to_string()),
        );
        self.conversation = transition.conversation;

        let Some(Effect::ScheduleReply { input }) = transition.effect else {
            self.scheduler.metrics().inc_rejected_submission();
            debug!("blank submission ignored");
            return Ok(Submission::Rejected);
        };

        let tx = self.replies_tx.clone();
        let scheduled = self.scheduler.schedule(input, move |reply| {
            let _ = tx.send(reply);
        });

        self.scheduled.retain(|reply| !reply.is_finished());
        self.scheduled.push(scheduled);
        self.awaiting += 1;

        Ok(Submission::Accepted)
    }

    /// Waits for the next reply and appends it. Returns `None` when nothing is pending.
    pub async fn next_reply(&mut self) -> Option<&Message> {
        if self.awaiting == 0 || self.closed {
            return None;
        }

        let reply = self.replies_rx.recv().await?;
        self.awaiting -= 1;

        let transition = reduce(
            std::mem::take(&mut self.conversation),
            ChatEvent::Replied(reply),
        );
        self.conversation = transition.conversation;
        self.conversation.last()
    }

    /// Cancels every reply still waiting out its delay. Further submissions fail.
    pub fn close(&mut self) -> usize {
        if self.closed {
            return 0;
        }
        self.closed = true;

        let cancelled = self
            .scheduled
            .drain(..)
            .filter(|reply| reply.cancel())
            .count();
        self.scheduler.metrics().add_cancelled_replies(cancelled);
        info!(cancelled, messages = self.conversation.len(), "chat session closed");

        cancelled
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.close();
    }
}
