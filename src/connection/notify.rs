//! LISTEN/NOTIFY channel registry.
//!
//! `addListener`/`removeListener` issue the actual `LISTEN`/`UNLISTEN`
//! round-trips through the connection; this module only tracks which
//! callbacks are subscribed to which channel and the gap-tolerance latch
//! that guards against notifications from a stale subscription generation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::Connection;
use crate::error::{Error, Result};
use crate::opts::Notification;
use crate::sync_primitives::Deferred;

/// A callback invoked for every notification delivered on a subscribed channel.
pub type NotificationCallback = Arc<dyn Fn(Notification) + Send + Sync>;

/// Opaque handle returned by `add_listener`, passed back to `remove_listener`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

struct ChannelState {
    listeners: HashMap<u64, NotificationCallback>,
    /// Resolved once the `LISTEN` round-trip for the current subscription
    /// generation completes; a notification arriving before that point
    /// belongs to a previous, already-unsubscribed generation and is dropped.
    subscribed: Arc<Deferred<()>>,
}

pub struct Registry {
    channels: RwLock<HashMap<String, ChannelState>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub async fn add_listener(
        &self,
        connection: &Connection,
        channel: &str,
        callback: NotificationCallback,
    ) -> Result<ListenerId> {
        validate_channel_name(channel)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut channels = self.channels.write().await;
        if let Some(state) = channels.get_mut(channel) {
            state.listeners.insert(id, callback);
            return Ok(ListenerId(id));
        }

        let subscribed = Arc::new(Deferred::new());
        channels.insert(
            channel.to_string(),
            ChannelState {
                listeners: HashMap::from([(id, callback)]),
                subscribed: subscribed.clone(),
            },
        );
        drop(channels);

        connection.listen(channel).await?;
        subscribed.resolve(());
        Ok(ListenerId(id))
    }

    pub async fn remove_listener(
        &self,
        connection: &Connection,
        channel: &str,
        id: ListenerId,
    ) -> Result<()> {
        let mut channels = self.channels.write().await;
        let Some(state) = channels.get_mut(channel) else {
            return Ok(());
        };
        state.listeners.remove(&id.0);
        let now_empty = state.listeners.is_empty();
        if now_empty {
            channels.remove(channel);
        }
        drop(channels);

        if now_empty {
            connection.unlisten(channel).await?;
        }
        Ok(())
    }

    /// Called by the read dispatcher for every `NotificationResponse`.
    ///
    /// Returns `true` if the notification was delivered to at least one
    /// registered listener, so the caller can fall back to the connection's
    /// catch-all `notification_handler` when it wasn't.
    pub async fn dispatch(&self, notification: Notification) -> bool {
        let channels = self.channels.read().await;
        let Some(state) = channels.get(&notification.channel) else {
            return false;
        };
        if state.subscribed.peek().is_none() {
            return false;
        }
        for callback in state.listeners.values() {
            callback(notification.clone());
        }
        true
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_channel_name(channel: &str) -> Result<()> {
    if channel.contains('\\') || channel.contains('"') {
        return Err(Error::Contract(format!(
            "invalid channel name (contains backslash or quote): {channel:?}"
        )));
    }
    Ok(())
}
