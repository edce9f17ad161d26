//! [`ChatController`]: one automated conversation with a single peer.
//!
//! Owns the lazily resolved canonical peer id and the time of the last collected action; both
//! are per-instance state, never shared across controllers.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tgprobe_core::{AdapterError, ClientAdapter, MessageHandle, Peer, ProbeError, Result};
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::policy::TerminationPolicy;
use crate::response::Response;

/// Default minimum spacing between the end of one collected action and the start of the next.
pub const DEFAULT_GLOBAL_ACTION_DELAY: Duration = Duration::from_millis(800);

/// Gap between consecutive messages of a ping.
const PING_INTERVAL: Duration = Duration::from_secs(1);

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone)]
pub struct PingOptions {
    /// Sent in order; entries starting with `/` go out as commands.
    pub messages: Vec<String>,
    pub max_wait: Option<Duration>,
}

impl Default for PingOptions {
    fn default() -> Self {
        Self {
            messages: vec!["/start".to_string()],
            max_wait: None,
        }
    }
}

pub struct ChatController {
    client: Arc<dyn ClientAdapter>,
    peer: Peer,
    defaults: TerminationPolicy,
    global_action_delay: Duration,
    peer_id: OnceCell<i64>,
    last_action: Mutex<Option<Instant>>,
}

impl ChatController {
    pub fn new(client: Arc<dyn ClientAdapter>, peer: impl Into<Peer>) -> Self {
        Self {
            client,
            peer: peer.into(),
            defaults: TerminationPolicy::default(),
            global_action_delay: DEFAULT_GLOBAL_ACTION_DELAY,
            peer_id: OnceCell::new(),
            last_action: Mutex::new(None),
        }
    }

    /// Policy every `collect` call is merged over.
    pub fn with_defaults(mut self, defaults: TerminationPolicy) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_global_action_delay(mut self, delay: Duration) -> Self {
        self.global_action_delay = delay;
        self
    }

    pub fn client(&self) -> &Arc<dyn ClientAdapter> {
        &self.client
    }

    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub fn defaults(&self) -> &TerminationPolicy {
        &self.defaults
    }

    /// Canonical peer id if it has been resolved already.
    pub fn peer_id(&self) -> Option<i64> {
        self.peer_id.get().copied()
    }

    /// Resolves the peer to its canonical id once; later calls return the cached id.
    /// A failed resolution is not cached, so the next call retries.
    pub async fn initialize(&self) -> Result<i64> {
        self.peer_id
            .get_or_try_init(|| async {
                let id = self.client.resolve_peer(&self.peer).await.map_err(|e| match e {
                    AdapterError::UnresolvablePeer(_) => ProbeError::PeerUnresolved {
                        peer: self.peer.to_string(),
                    },
                    other => ProbeError::Adapter(other),
                })?;
                info!(peer = %self.peer, peer_id = id, "Peer resolved");
                Ok::<_, ProbeError>(id)
            })
            .await
            .copied()
    }

    /// Sleeps until `global_action_delay` has passed since the previous collected action.
    pub(crate) async fn wait_global_delay(&self) {
        let last = *lock(&self.last_action);
        if let Some(last) = last {
            // Deadline past what Instant can hold; tokio clamps an oversized sleep.
            let Some(ready_at) = last.checked_add(self.global_action_delay) else {
                tokio::time::sleep(self.global_action_delay).await;
                return;
            };
            if ready_at > Instant::now() {
                debug!(wait = ?(ready_at - Instant::now()), "Waiting for global action delay");
                tokio::time::sleep_until(ready_at).await;
            }
        }
    }

    pub(crate) fn mark_action_done(&self) {
        *lock(&self.last_action) = Some(Instant::now());
    }

    /// Sends `/command arg1 arg2 ...`.
    pub async fn send_command(&self, command: &str, args: &[&str]) -> Result<MessageHandle> {
        let text = if args.is_empty() {
            format!("/{}", command)
        } else {
            format!("/{} {}", command, args.join(" "))
        };
        self.send_text(&text).await
    }

    pub async fn send_text(&self, text: &str) -> Result<MessageHandle> {
        let peer_id = self.initialize().await?;
        debug!(peer_id, text = %text, "Sending text");
        Ok(self.client.send_text(peer_id, text).await?)
    }

    /// Deletes the chat history with the peer.
    pub async fn clear_chat(&self) -> Result<()> {
        let peer_id = self.initialize().await?;
        self.client.delete_history(peer_id).await?;
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<()> {
        Ok(self.client.disconnect().await?)
    }

    /// Sends the ping messages as one turn and waits for at least one reply.
    #[instrument(skip(self, options), fields(peer = %self.peer))]
    pub async fn ping_bot(&self, options: PingOptions) -> Result<Response> {
        let mut policy = TerminationPolicy::new().min(1);
        policy.max_wait = options.max_wait;
        let messages = options.messages;

        self.collect(&policy, || async move {
            for msg in &messages {
                match msg.strip_prefix('/') {
                    Some(command) => {
                        self.send_command(command, &[]).await?;
                    }
                    None => {
                        self.send_text(msg).await?;
                    }
                }
                tokio::time::sleep(PING_INTERVAL).await;
            }
            Ok::<_, ProbeError>(())
        })
        .await
    }

    /// Commands the bot advertises, without slashes. Best effort: an adapter failure yields an
    /// empty list.
    pub async fn get_bot_commands(&self) -> Result<Vec<String>> {
        let peer_id = self.initialize().await?;
        match self.client.get_bot_commands(peer_id).await {
            Ok(commands) => Ok(commands),
            Err(e) => {
                warn!(error = %e, peer = %self.peer, "Could not fetch bot commands");
                Ok(Vec::new())
            }
        }
    }
}
