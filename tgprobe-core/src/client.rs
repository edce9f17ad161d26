//! Client adapter abstraction: the primitives the engine needs from a Telegram user client.
//!
//! [`ClientAdapter`] is transport-agnostic. Implementations wrap an MTProto client; tests use
//! [`crate::testing::ScriptedClient`] (feature `testing`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AdapterResult;
use crate::types::{CallbackAnswer, GeoPoint, IncomingMessage, InlineResultPage, MessageHandle, Peer};

/// Callback invoked for every incoming (new or edited) message, system-wide. Must not block.
pub type MessageListener = Arc<dyn Fn(&IncomingMessage) + Send + Sync>;

/// Registration handle returned by [`ClientAdapter::add_message_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

#[async_trait]
pub trait ClientAdapter: Send + Sync {
    /// Maps a configured peer to its canonical numeric id. Fails with `UnresolvablePeer` when it is
    /// neither a chat nor a user.
    async fn resolve_peer(&self, peer: &Peer) -> AdapterResult<i64>;

    async fn send_text(&self, chat_id: i64, text: &str) -> AdapterResult<MessageHandle>;

    async fn delete_history(&self, chat_id: i64) -> AdapterResult<()>;

    /// Registers a listener for all incoming messages; filtering by chat is the caller's job.
    fn add_message_listener(&self, listener: MessageListener) -> ListenerId;

    fn remove_message_listener(&self, id: ListenerId);

    /// Presses an inline button and waits up to `timeout` for the bot's answer.
    /// Fails with `AdapterError::Timeout` when the bot does not answer.
    async fn request_callback_answer(
        &self,
        chat_id: i64,
        message_id: i32,
        data: &str,
        timeout: Duration,
    ) -> AdapterResult<CallbackAnswer>;

    /// Fetches one page of inline results from the bot.
    async fn get_inline_results(
        &self,
        bot_id: i64,
        query: &str,
        offset: &str,
        geo: Option<GeoPoint>,
    ) -> AdapterResult<InlineResultPage>;

    async fn send_inline_result(&self, chat_id: i64, query_id: i64, result_id: &str) -> AdapterResult<()>;

    /// Commands the bot advertises in its default scope, without the leading slash.
    async fn get_bot_commands(&self, bot_id: i64) -> AdapterResult<Vec<String>>;

    async fn disconnect(&self) -> AdapterResult<()> {
        Ok(())
    }
}
