//! Scripted in-memory [`ClientAdapter`] for tests.
//!
//! Replies are registered per sent text or per callback payload and delivered to the registered
//! listeners after a delay on the tokio clock, so tests under `start_paused = true` see
//! deterministic arrival timing without real waiting.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::client::{ClientAdapter, ListenerId, MessageListener};
use crate::error::{AdapterError, AdapterResult};
use crate::types::{CallbackAnswer, GeoPoint, IncomingMessage, InlineResultPage, MessageHandle, Peer};

/// A message the scripted bot sends `delay` after the stimulus.
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    pub delay: Duration,
    pub message: IncomingMessage,
}

impl ScriptedReply {
    pub fn after(delay: Duration, message: IncomingMessage) -> Self {
        Self { delay, message }
    }
}

/// How the scripted bot reacts to a callback query.
#[derive(Debug, Clone)]
pub enum CallbackBehavior {
    Answer(CallbackAnswer),
    /// Never answers; the adapter reports a timeout once the requested wait passes.
    Timeout,
    /// Fails with `AdapterError::Network(reason)`.
    Fail(String),
}

#[derive(Debug, Clone)]
struct CallbackScript {
    behavior: CallbackBehavior,
    replies: Vec<ScriptedReply>,
}

/// Sent inline result, recorded for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentInlineResult {
    pub chat_id: i64,
    pub query_id: i64,
    pub result_id: String,
}

#[derive(Default)]
struct Inner {
    peer_id: Option<i64>,
    resolve_calls: AtomicUsize,
    next_listener: AtomicU64,
    next_message_id: AtomicI32,
    listeners: Mutex<HashMap<ListenerId, MessageListener>>,
    text_replies: Mutex<HashMap<String, Vec<ScriptedReply>>>,
    failing_texts: Mutex<HashSet<String>>,
    callbacks: Mutex<HashMap<String, CallbackScript>>,
    bot_commands: Mutex<Option<Vec<String>>>,
    inline_pages: Mutex<HashMap<String, InlineResultPage>>,
    inline_result_replies: Mutex<Vec<ScriptedReply>>,
    sent_texts: Mutex<Vec<(i64, String)>>,
    callback_requests: Mutex<Vec<(String, Duration)>>,
    inline_requests: Mutex<Vec<String>>,
    sent_inline_results: Mutex<Vec<SentInlineResult>>,
    history_deletions: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Inner {
    fn deliver(&self, message: &IncomingMessage) {
        let listeners: Vec<MessageListener> = lock(&self.listeners).values().cloned().collect();
        for listener in listeners {
            listener(message);
        }
    }
}

/// Scripted bot behind a [`ClientAdapter`]. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ScriptedClient {
    inner: Arc<Inner>,
}

impl ScriptedClient {
    /// Client whose peer resolves to `peer_id`.
    pub fn new(peer_id: i64) -> Self {
        let inner = Inner {
            peer_id: Some(peer_id),
            next_message_id: AtomicI32::new(1),
            bot_commands: Mutex::new(Some(Vec::new())),
            ..Default::default()
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Client whose peer never resolves.
    pub fn unresolvable() -> Self {
        let inner = Inner {
            next_message_id: AtomicI32::new(1),
            ..Default::default()
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Builds a text message from the scripted bot with a fresh message id.
    pub fn message(&self, text: &str) -> IncomingMessage {
        let id = self.inner.next_message_id.fetch_add(1, Ordering::SeqCst);
        IncomingMessage::text(self.inner.peer_id.unwrap_or_default(), id, text)
    }

    /// Replies sent when the controller sends exactly `text`.
    pub fn on_text(&self, text: &str, replies: Vec<ScriptedReply>) {
        lock(&self.inner.text_replies).insert(text.to_string(), replies);
    }

    /// Sending exactly `text` fails with a network error.
    pub fn fail_on_text(&self, text: &str) {
        lock(&self.inner.failing_texts).insert(text.to_string());
    }

    /// Behavior and follow-up messages for a callback payload. Unscripted payloads get an empty answer.
    pub fn on_callback(&self, data: &str, behavior: CallbackBehavior, replies: Vec<ScriptedReply>) {
        lock(&self.inner.callbacks).insert(data.to_string(), CallbackScript { behavior, replies });
    }

    /// Commands returned by `get_bot_commands`; `None` makes the call fail.
    pub fn set_bot_commands(&self, commands: Option<Vec<&str>>) {
        *lock(&self.inner.bot_commands) =
            commands.map(|c| c.into_iter().map(str::to_string).collect());
    }

    /// Page returned for an inline query at `offset`. Unknown offsets yield an empty page.
    pub fn add_inline_page(&self, offset: &str, page: InlineResultPage) {
        lock(&self.inner.inline_pages).insert(offset.to_string(), page);
    }

    /// Messages delivered after an inline result is sent.
    pub fn on_inline_result(&self, replies: Vec<ScriptedReply>) {
        *lock(&self.inner.inline_result_replies) = replies;
    }

    /// Delivers `message` to the listeners after `delay`, without any stimulus.
    pub fn emit_after(&self, delay: Duration, message: IncomingMessage) {
        self.spawn_replies(vec![ScriptedReply::after(delay, message)]);
    }

    pub fn sent_texts(&self) -> Vec<String> {
        lock(&self.inner.sent_texts)
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn sent_to(&self) -> Vec<(i64, String)> {
        lock(&self.inner.sent_texts).clone()
    }

    /// Callback payloads pressed, with the wait the adapter was given.
    pub fn callback_requests(&self) -> Vec<(String, Duration)> {
        lock(&self.inner.callback_requests).clone()
    }

    /// Offsets requested by inline queries, in order.
    pub fn inline_requests(&self) -> Vec<String> {
        lock(&self.inner.inline_requests).clone()
    }

    pub fn sent_inline_results(&self) -> Vec<SentInlineResult> {
        lock(&self.inner.sent_inline_results).clone()
    }

    pub fn resolve_calls(&self) -> usize {
        self.inner.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    pub fn history_deletions(&self) -> usize {
        self.inner.history_deletions.load(Ordering::SeqCst)
    }

    fn spawn_replies(&self, replies: Vec<ScriptedReply>) {
        for reply in replies {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                tokio::time::sleep(reply.delay).await;
                inner.deliver(&reply.message);
            });
        }
    }
}

#[async_trait]
impl ClientAdapter for ScriptedClient {
    async fn resolve_peer(&self, peer: &Peer) -> AdapterResult<i64> {
        self.inner.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .peer_id
            .ok_or_else(|| AdapterError::UnresolvablePeer(peer.to_string()))
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> AdapterResult<MessageHandle> {
        if lock(&self.inner.failing_texts).contains(text) {
            return Err(AdapterError::Network(format!("failed to send {:?}", text)));
        }
        lock(&self.inner.sent_texts).push((chat_id, text.to_string()));
        let replies = lock(&self.inner.text_replies)
            .get(text)
            .cloned()
            .unwrap_or_default();
        self.spawn_replies(replies);
        let id = self.inner.next_message_id.fetch_add(1, Ordering::SeqCst);
        Ok(MessageHandle { chat_id, id })
    }

    async fn delete_history(&self, _chat_id: i64) -> AdapterResult<()> {
        self.inner.history_deletions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn add_message_listener(&self, listener: MessageListener) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::SeqCst));
        lock(&self.inner.listeners).insert(id, listener);
        id
    }

    fn remove_message_listener(&self, id: ListenerId) {
        lock(&self.inner.listeners).remove(&id);
    }

    async fn request_callback_answer(
        &self,
        _chat_id: i64,
        _message_id: i32,
        data: &str,
        timeout: Duration,
    ) -> AdapterResult<CallbackAnswer> {
        lock(&self.inner.callback_requests).push((data.to_string(), timeout));
        let script = lock(&self.inner.callbacks).get(data).cloned();
        let Some(script) = script else {
            return Ok(CallbackAnswer::default());
        };
        self.spawn_replies(script.replies);
        match script.behavior {
            CallbackBehavior::Answer(answer) => Ok(answer),
            CallbackBehavior::Timeout => {
                tokio::time::sleep(timeout).await;
                Err(AdapterError::Timeout(format!("callback {:?} not answered", data)))
            }
            CallbackBehavior::Fail(reason) => Err(AdapterError::Network(reason)),
        }
    }

    async fn get_inline_results(
        &self,
        _bot_id: i64,
        _query: &str,
        offset: &str,
        _geo: Option<GeoPoint>,
    ) -> AdapterResult<InlineResultPage> {
        lock(&self.inner.inline_requests).push(offset.to_string());
        Ok(lock(&self.inner.inline_pages)
            .get(offset)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_inline_result(&self, chat_id: i64, query_id: i64, result_id: &str) -> AdapterResult<()> {
        lock(&self.inner.sent_inline_results).push(SentInlineResult {
            chat_id,
            query_id,
            result_id: result_id.to_string(),
        });
        let replies = lock(&self.inner.inline_result_replies).clone();
        self.spawn_replies(replies);
        Ok(())
    }

    async fn get_bot_commands(&self, _bot_id: i64) -> AdapterResult<Vec<String>> {
        lock(&self.inner.bot_commands)
            .clone()
            .ok_or_else(|| AdapterError::Api("BOT_COMMANDS_UNAVAILABLE".to_string()))
    }
}
