use std::sync::Arc;
use std::time::{Duration, Instant};

use rihla_core::{Interpretation, QueryInterpreter};
use rihla_observability::AppMetrics;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub const DEFAULT_REPLY_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns once cancelled.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// A reply waiting out the thinking delay.
#[derive(Debug)]
pub struct ScheduledReply {
    token: CancelToken,
    handle: JoinHandle<bool>,
}

impl ScheduledReply {
    /// Drops the reply if the delay has not elapsed yet. Returns whether it was still pending.
    pub fn cancel(&self) -> bool {
        let pending = !self.handle.is_finished();
        self.token.cancel();
        pending
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Resolves to `true` when the reply was handed to its callback.
    pub async fn delivered(self) -> bool {
        self.handle.await.unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct ReplyScheduler {
    interpreter: Arc<QueryInterpreter>,
    metrics: Arc<AppMetrics>,
    delay: Duration,
}

impl ReplyScheduler {
    pub fn new(
        interpreter: Arc<QueryInterpreter>,
        metrics: Arc<AppMetrics>,
        delay: Duration,
    ) -> Self {
        Self {
            interpreter,
            metrics,
            delay,
        }
    }

    pub fn interpreter(&self) -> &QueryInterpreter {
        &self.interpreter
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Answers immediately, skipping the delay.
    pub fn answer(&self, input: &str) -> (Interpretation, String) {
        answer(&self.interpreter, &self.metrics, input)
    }

    pub fn schedule<F>(&self, input: String, on_reply: F) -> ScheduledReply
    where
        F: FnOnce(String) + Send + 'static,
    {
        let token = CancelToken::new();
        let task_token = token.clone();
        let interpreter = self.interpreter.clone();
        let metrics = self.metrics.clone();
        let delay = self.delay;

        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = task_token.cancelled() => {
                    debug!("scheduled reply cancelled");
                    false
                }
                _ = tokio::time::sleep(delay) => {
                    let (_, reply) = answer(&interpreter, &metrics, &input);
                    on_reply(reply);
                    true
                }
            }
        });

        ScheduledReply { token, handle }
    }
}

fn answer(
    interpreter: &QueryInterpreter,
    metrics: &AppMetrics,
    input: &str,
) -> (Interpretation, String) {
    let started = Instant::now();
    let interpretation = interpreter.interpret(input);
    let reply = interpreter.render(interpretation);

    metrics.record_query(interpretation.is_fallback(), started.elapsed());
    info!(
        kind = interpretation.kind(),
        input_chars = input.chars().count(),
        "query interpreted"
    );

    (interpretation, reply)
}
