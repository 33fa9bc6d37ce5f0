// SPDX-License-Identifier: Apache-2.0
//! Channel-scoped event bus for the push channel (§4.9, §5).
//!
//! One [`EventBus`] instance is shared by every `/ws` connection handler in
//! the gateway, mirroring the hub's `Arc<Mutex<HubState>>` plus
//! per-connection `mpsc` outbox pattern: each client gets an id and an
//! outbound [`tokio::sync::mpsc::Receiver`]; [`EventBus::publish`] iterates a
//! snapshot of the subscriber set for a channel and does a non-blocking send
//! to each. A full or closed outbox drops that subscriber rather than
//! blocking the publisher — delivery is best-effort, fire-and-forget, and
//! ordered per subscriber, never across subscribers.
//!
//! The 30s keep-alive probe named in §4.9 is driven by whatever last touched
//! a connection (an inbound `Ping`/`Subscribe`/`Unsubscribe`, or a
//! protocol-level WebSocket pong the transport layer records via
//! [`EventBus::record_activity`]); [`EventBus::sweep_stale`] evicts any
//! client idle for two consecutive probe intervals.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use tracing::warn;
use voidsync_push_proto::ServerMessage;

/// Server-assigned identifier for a push-channel connection.
pub type ClientId = u64;

/// Outbox capacity before a subscriber is considered too slow and dropped.
const OUTBOX_CAPACITY: usize = 256;

/// Default keep-alive probe interval (§6 `keepAliveInterval`).
pub fn default_keep_alive_interval() -> Duration {
    Duration::seconds(30)
}

struct ClientState {
    subscribed: HashSet<String>,
    tx: mpsc::Sender<ServerMessage>,
    last_activity: DateTime<Utc>,
}

struct Inner {
    next_client_id: ClientId,
    clients: HashMap<ClientId, ClientState>,
}

/// Single broadcaster with channel-scoped subscriptions.
pub struct EventBus {
    inner: Mutex<Inner>,
    keep_alive_interval: Duration,
}

impl EventBus {
    /// A fresh bus with the §6 default keep-alive interval.
    #[must_use]
    pub fn new() -> Self {
        Self::with_keep_alive_interval(default_keep_alive_interval())
    }

    /// A fresh bus with a custom keep-alive interval.
    #[must_use]
    pub fn with_keep_alive_interval(keep_alive_interval: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_client_id: 0,
                clients: HashMap::new(),
            }),
            keep_alive_interval,
        }
    }

    /// Register a new connection, returning its id and outbox. The caller is
    /// responsible for draining the outbox onto the wire and for calling
    /// [`Self::disconnect`] when the connection closes.
    pub fn register(&self) -> (ClientId, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        let mut inner = self.lock();
        let id = inner.next_client_id;
        inner.next_client_id += 1;
        inner.clients.insert(
            id,
            ClientState {
                subscribed: HashSet::new(),
                tx,
                last_activity: Utc::now(),
            },
        );
        (id, rx)
    }

    /// Remove a connection and its subscriptions.
    pub fn disconnect(&self, client_id: ClientId) {
        self.lock().clients.remove(&client_id);
    }

    /// Mark `client_id` as having produced activity just now (an inbound
    /// message or a transport-level pong).
    pub fn record_activity(&self, client_id: ClientId) {
        if let Some(client) = self.lock().clients.get_mut(&client_id) {
            client.last_activity = Utc::now();
        }
    }

    /// Subscribe `client_id` to `channel`, replying with a `Subscribed` ack
    /// on its own outbox. Returns `false` if `client_id` is unknown.
    pub fn subscribe(&self, client_id: ClientId, channel: impl Into<String>) -> bool {
        let channel = channel.into();
        let mut inner = self.lock();
        let Some(client) = inner.clients.get_mut(&client_id) else {
            return false;
        };
        client.subscribed.insert(channel.clone());
        let _ = client.tx.try_send(ServerMessage::Subscribed { channel });
        true
    }

    /// Unsubscribe `client_id` from `channel`, replying with an
    /// `Unsubscribed` ack. Returns `false` if `client_id` is unknown.
    pub fn unsubscribe(&self, client_id: ClientId, channel: &str) -> bool {
        let mut inner = self.lock();
        let Some(client) = inner.clients.get_mut(&client_id) else {
            return false;
        };
        client.subscribed.remove(channel);
        let _ = client.tx.try_send(ServerMessage::Unsubscribed {
            channel: channel.to_string(),
        });
        true
    }

    /// Send `message` directly to `client_id`, bypassing channel
    /// subscriptions — used for the `Ping`/`Pong` keep-alive handshake, which
    /// isn't scoped to a channel. Returns `false` if the client is unknown or
    /// its outbox is full or closed.
    pub fn send_to(&self, client_id: ClientId, message: ServerMessage) -> bool {
        let inner = self.lock();
        let Some(client) = inner.clients.get(&client_id) else {
            return false;
        };
        client.tx.try_send(message).is_ok()
    }

    /// Publish `message` to every client subscribed to `channel`. Best
    /// effort: a subscriber whose outbox is full or closed is dropped from
    /// the registry rather than blocking the publisher.
    pub fn publish(&self, channel: &str, message: ServerMessage) {
        let mut inner = self.lock();
        let mut dead = Vec::new();
        for (&id, client) in &inner.clients {
            if !client.subscribed.contains(channel) {
                continue;
            }
            if client.tx.try_send(message.clone()).is_err() {
                warn!(client_id = id, channel, "dropping slow or dead subscriber");
                dead.push(id);
            }
        }
        for id in dead {
            inner.clients.remove(&id);
        }
    }

    /// Evict every client whose last recorded activity is older than two
    /// keep-alive intervals. Returns the evicted client ids.
    pub fn sweep_stale(&self, now: DateTime<Utc>) -> Vec<ClientId> {
        let cutoff = self.keep_alive_interval * 2;
        let mut inner = self.lock();
        let stale: Vec<ClientId> = inner
            .clients
            .iter()
            .filter(|(_, c)| now - c.last_activity > cutoff)
            .map(|(&id, _)| id)
            .collect();
        for id in &stale {
            inner.clients.remove(id);
        }
        stale
    }

    /// Current connected-client count, for metrics snapshots.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().clients.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn publish_reaches_only_subscribed_clients() {
        let bus = EventBus::new();
        let (a, mut a_rx) = bus.register();
        let (b, mut b_rx) = bus.register();

        bus.subscribe(a, "changes");
        assert_eq!(a_rx.recv().await.unwrap(), ServerMessage::Subscribed { channel: "changes".into() });

        bus.publish("changes", ServerMessage::Pong);
        assert_eq!(a_rx.recv().await.unwrap(), ServerMessage::Pong);
        assert!(b_rx.try_recv().is_err());
        let _ = b;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let (client, mut rx) = bus.register();
        bus.subscribe(client, "changes");
        let _ = rx.recv().await;
        bus.unsubscribe(client, "changes");
        let _ = rx.recv().await;

        bus.publish("changes", ServerMessage::Pong);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn sweep_stale_evicts_idle_clients() {
        let bus = EventBus::with_keep_alive_interval(Duration::seconds(1));
        let (client, _rx) = bus.register();
        let future = Utc::now() + Duration::seconds(10);
        let evicted = bus.sweep_stale(future);
        assert_eq!(evicted, vec![client]);
        assert!(!bus.subscribe(client, "changes"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn sweep_keeps_active_clients() {
        let bus = EventBus::with_keep_alive_interval(Duration::seconds(30));
        let (client, _rx) = bus.register();
        bus.record_activity(client);
        let evicted = bus.sweep_stale(Utc::now());
        assert!(evicted.is_empty());
        assert!(bus.subscribe(client, "changes"));
    }
}
