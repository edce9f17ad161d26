//! Turn collection: run a triggering action and buffer the peer's messages until the
//! termination policy says the turn is complete.
//!
//! Completion is decided by a fixed-tick polling loop over the buffer, never from inside the
//! listener. All timing uses `tokio::time`.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tgprobe_core::{ClientAdapter, IncomingMessage, ListenerId, ProbeError, Result, Violation};
use tokio::time::Instant;
use tracing::{info, instrument};

use crate::controller::{lock, ChatController};
use crate::policy::{ResolvedPolicy, TerminationPolicy};
use crate::response::Response;

/// Interval between two evaluations of the stop conditions.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Default)]
struct TurnBuffer {
    messages: Vec<IncomingMessage>,
    last_arrival: Option<Instant>,
}

/// Keeps a message listener registered for as long as it lives.
struct ListenerGuard<'a> {
    client: &'a dyn ClientAdapter,
    id: ListenerId,
}

impl<'a> ListenerGuard<'a> {
    /// Registers a listener appending every message addressed to `chat_id` into `buffer`.
    fn register(client: &'a dyn ClientAdapter, chat_id: i64, buffer: Arc<Mutex<TurnBuffer>>) -> Self {
        let id = client.add_message_listener(Arc::new(move |message: &IncomingMessage| {
            if message.chat_id == chat_id {
                let mut buffer = lock(&buffer);
                buffer.messages.push(message.clone());
                buffer.last_arrival = Some(Instant::now());
            }
        }));
        Self { client, id }
    }
}

impl Drop for ListenerGuard<'_> {
    fn drop(&mut self) {
        self.client.remove_message_listener(self.id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Settled,
    Overshoot,
    Timeout,
}

enum Tick {
    Continue,
    Stop(StopReason),
}

fn evaluate(policy: &ResolvedPolicy, buffer: &TurnBuffer, started: Instant, now: Instant) -> Tick {
    if now.duration_since(started) > policy.max_wait {
        return Tick::Stop(StopReason::Timeout);
    }

    let count = buffer.messages.len();
    if policy.max_messages.is_some_and(|max| count > max) {
        return Tick::Stop(StopReason::Overshoot);
    }

    let enough = count >= policy.min_messages && policy.accepts(&buffer.messages);
    if !enough {
        return Tick::Continue;
    }

    match (policy.wait_consecutive, buffer.last_arrival) {
        (Some(quiet), Some(last)) if now.duration_since(last) < quiet => Tick::Continue,
        _ => Tick::Stop(StopReason::Settled),
    }
}

fn check_strict(policy: &ResolvedPolicy, messages: &[IncomingMessage]) -> Result<()> {
    let actual = messages.len();
    if actual < policy.min_messages {
        return Err(ProbeError::ExpectationViolated(Violation::TooFew {
            expected: policy.min_messages,
            actual,
        }));
    }
    if let Some(max) = policy.max_messages {
        if actual > max {
            return Err(ProbeError::ExpectationViolated(Violation::TooMany {
                expected: max,
                actual,
            }));
        }
    }
    if !policy.accepts(messages) {
        return Err(ProbeError::ExpectationViolated(Violation::ValidatorRejected { actual }));
    }
    Ok(())
}

impl ChatController {
    /// Runs `action` and collects the peer's messages into one [`Response`].
    ///
    /// Waits out the global action delay first; that wait does not count against `max_wait`.
    /// Messages beyond `max_messages` are kept, never trimmed. In strict mode an unmet bound
    /// raises `ExpectationViolated`; otherwise whatever arrived is returned.
    /// Errors from `action` are returned as-is, with the listener already removed.
    #[instrument(skip(self, policy, action), fields(peer = %self.peer()))]
    pub async fn collect<F, Fut>(&self, policy: &TerminationPolicy, action: F) -> Result<Response>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let peer_id = self.initialize().await?;
        self.collect_in(peer_id, policy, action).await
    }

    /// Like [`ChatController::collect`], but keeps the messages addressed to `chat_id` instead
    /// of the peer's chat.
    pub(crate) async fn collect_in<F, Fut>(
        &self,
        chat_id: i64,
        policy: &TerminationPolicy,
        action: F,
    ) -> Result<Response>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.wait_global_delay().await;

        let policy = policy.merged_over(self.defaults()).resolve();
        let buffer = Arc::new(Mutex::new(TurnBuffer::default()));

        let guard = ListenerGuard::register(self.client().as_ref(), chat_id, Arc::clone(&buffer));
        let outcome = self.run_turn(&policy, &buffer, action).await;
        drop(guard);
        self.mark_action_done();

        let reason = outcome?;
        let messages = std::mem::take(&mut lock(&buffer).messages);

        info!(
            chat_id,
            count = messages.len(),
            reason = ?reason,
            "step: turn collected"
        );

        if policy.strict {
            check_strict(&policy, &messages)?;
        }

        Ok(Response::new(messages))
    }

    async fn run_turn<F, Fut>(
        &self,
        policy: &ResolvedPolicy,
        buffer: &Mutex<TurnBuffer>,
        action: F,
    ) -> Result<StopReason>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        action().await?;

        let started = Instant::now();
        loop {
            let tick = evaluate(policy, &lock(buffer), started, Instant::now());
            match tick {
                Tick::Stop(reason) => return Ok(reason),
                Tick::Continue => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }
}
