use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::protocol::{ClientMessage, ServerMessage};

/// Oldest events are dropped once the buffer holds this many.
pub const MAX_BUFFERED_EVENTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// An event as received off the wire, kept in the client-side buffer.
#[derive(Debug, Clone)]
pub struct ReceivedEvent {
    pub id: Uuid,
    pub topic: String,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EventSocketConfig {
    pub url: String,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
}

impl EventSocketConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(3),
            max_reconnect_attempts: 10,
        }
    }
}

struct Inner {
    config: EventSocketConfig,
    state: Mutex<ConnectionState>,
    // Guards against overlapping connect loops.
    running: AtomicBool,
    shutdown: AtomicBool,
    subscriptions: Mutex<HashSet<String>>,
    recent: Mutex<VecDeque<ReceivedEvent>>,
    outgoing: Mutex<Option<mpsc::UnboundedSender<ClientMessage>>>,
}

impl Inner {
    fn set_state(&self, next: ConnectionState) {
        *self.state.lock().unwrap() = next;
    }

    fn record_event(&self, event: ReceivedEvent) {
        let mut recent = self.recent.lock().unwrap();
        if recent.len() == MAX_BUFFERED_EVENTS {
            recent.pop_front();
        }
        recent.push_back(event);
    }

    fn queue_message(&self, message: ClientMessage) {
        if let Some(tx) = self.outgoing.lock().unwrap().as_ref() {
            // Receiver gone means the connection just dropped; the
            // subscription set is replayed on reconnect anyway.
            let _ = tx.send(message);
        }
    }
}

/// Client for the server's event stream endpoint.
///
/// Tracks its own subscription set so a reconnect transparently restores
/// server-side state, and keeps a bounded buffer of the most recent events
/// for consumers that poll rather than stream.
#[derive(Clone)]
pub struct EventSocket {
    inner: Arc<Inner>,
}

impl EventSocket {
    pub fn new(config: EventSocketConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(ConnectionState::Disconnected),
                running: AtomicBool::new(false),
                shutdown: AtomicBool::new(false),
                subscriptions: Mutex::new(HashSet::new()),
                recent: Mutex::new(VecDeque::new()),
                outgoing: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock().unwrap()
    }

    /// Snapshot of the buffered events, oldest first.
    pub fn recent_events(&self) -> Vec<ReceivedEvent> {
        self.inner.recent.lock().unwrap().iter().cloned().collect()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.inner
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .cloned()
            .collect()
    }

    /// Starts the connection loop. Calling while a loop is already running
    /// is a no-op, so racing callers cannot open a second socket.
    pub fn connect(&self) -> Option<tokio::task::JoinHandle<()>> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            debug!("connect ignored, socket already running");
            return None;
        }
        self.inner.shutdown.store(false, Ordering::SeqCst);
        let inner = self.inner.clone();
        Some(tokio::spawn(async move { run_loop(inner).await }))
    }

    /// Adds topics to the tracked set and tells the server if connected.
    pub fn subscribe(&self, topics: &[String]) {
        let mut added = Vec::new();
        {
            let mut subs = self.inner.subscriptions.lock().unwrap();
            for topic in topics {
                if subs.insert(topic.clone()) {
                    added.push(topic.clone());
                }
            }
        }
        if !added.is_empty() {
            self.inner
                .queue_message(ClientMessage::Subscribe { topics: added });
        }
    }

    pub fn unsubscribe(&self, topics: &[String]) {
        let mut removed = Vec::new();
        {
            let mut subs = self.inner.subscriptions.lock().unwrap();
            for topic in topics {
                if subs.remove(topic) {
                    removed.push(topic.clone());
                }
            }
        }
        if !removed.is_empty() {
            self.inner
                .queue_message(ClientMessage::Unsubscribe { topics: removed });
        }
    }

    pub fn ping(&self) {
        self.inner.queue_message(ClientMessage::Ping);
    }

    /// Stops the connection loop. The socket may be connected again later.
    pub fn close(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        *self.inner.outgoing.lock().unwrap() = None;
    }
}

async fn run_loop(inner: Arc<Inner>) {
    let mut failures: u32 = 0;

    loop {
        if inner.shutdown.load(Ordering::SeqCst) {
            break;
        }
        inner.set_state(ConnectionState::Connecting);

        let attempt = tokio::time::timeout(
            inner.config.connect_timeout,
            connect_async(&inner.config.url),
        )
        .await;

        let ws = match attempt {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                warn!(error = %e, "websocket connect failed");
                inner.set_state(ConnectionState::Disconnected);
                failures += 1;
                if failures > inner.config.max_reconnect_attempts {
                    warn!(failures, "giving up on reconnect");
                    break;
                }
                tokio::time::sleep(inner.config.reconnect_delay).await;
                continue;
            }
            Err(_) => {
                warn!("websocket connect timed out");
                inner.set_state(ConnectionState::Disconnected);
                failures += 1;
                if failures > inner.config.max_reconnect_attempts {
                    break;
                }
                tokio::time::sleep(inner.config.reconnect_delay).await;
                continue;
            }
        };

        info!(url = %inner.config.url, "websocket connected");
        inner.set_state(ConnectionState::Connected);
        failures = 0;

        let (tx, mut rx) = mpsc::unbounded_channel::<ClientMessage>();
        *inner.outgoing.lock().unwrap() = Some(tx);

        // Replay the tracked subscriptions so the new connection picks up
        // where the old one left off.
        let topics: Vec<String> = inner
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .cloned()
            .collect();
        if !topics.is_empty() {
            inner.queue_message(ClientMessage::Subscribe { topics });
        }

        let (mut sink, mut stream) = ws.split();

        loop {
            tokio::select! {
                outbound = rx.recv() => {
                    match outbound {
                        Some(msg) => {
                            let text = match serde_json::to_string(&msg) {
                                Ok(t) => t,
                                Err(e) => {
                                    warn!(error = %e, "dropping unserializable message");
                                    continue;
                                }
                            };
                            if sink.send(tungstenite::Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                inbound = stream.next() => {
                    match inbound {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            handle_server_message(&inner, &text);
                        }
                        Some(Ok(tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_))) => {}
                        Some(Ok(tungstenite::Message::Close(_))) | None => {
                            debug!("websocket closed by server");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "websocket read error");
                            break;
                        }
                    }
                }
            }
        }

        *inner.outgoing.lock().unwrap() = None;
        inner.set_state(ConnectionState::Disconnected);

        if inner.shutdown.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(inner.config.reconnect_delay).await;
    }

    inner.set_state(ConnectionState::Disconnected);
    inner.running.store(false, Ordering::SeqCst);
}

fn handle_server_message(inner: &Inner, text: &str) {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(ServerMessage::Event { id, topic, payload }) => {
            inner.record_event(ReceivedEvent {
                id,
                topic,
                payload,
                received_at: Utc::now(),
            });
        }
        Ok(ServerMessage::SubscriptionConfirmed { topics }) => {
            debug!(?topics, "subscription confirmed");
        }
        Ok(ServerMessage::Pong) => {}
        Ok(ServerMessage::Error { message }) => {
            warn!(%message, "server reported error");
        }
        Ok(ServerMessage::System { message }) => {
            info!(%message, "server notice");
        }
        Err(e) => {
            warn!(error = %e, "ignoring malformed server message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(n: usize) -> ReceivedEvent {
        ReceivedEvent {
            id: Uuid::new_v4(),
            topic: format!("t.{n}"),
            payload: serde_json::json!({ "n": n }),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn buffer_drops_oldest_beyond_cap() {
        let socket = EventSocket::new(EventSocketConfig::new("ws://localhost:0/ws"));
        for n in 0..150 {
            socket.inner.record_event(event(n));
        }
        let events = socket.recent_events();
        assert_eq!(events.len(), MAX_BUFFERED_EVENTS);
        assert_eq!(events.first().unwrap().topic, "t.50");
        assert_eq!(events.last().unwrap().topic, "t.149");
    }

    #[test]
    fn subscribe_is_idempotent_on_tracked_set() {
        let socket = EventSocket::new(EventSocketConfig::new("ws://localhost:0/ws"));
        socket.subscribe(&["a".into(), "b".into()]);
        socket.subscribe(&["b".into()]);
        let mut subs = socket.subscriptions();
        subs.sort();
        assert_eq!(subs, vec!["a".to_string(), "b".to_string()]);

        socket.unsubscribe(&["a".into()]);
        assert_eq!(socket.subscriptions(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn second_connect_is_a_no_op() {
        let mut config = EventSocketConfig::new("ws://127.0.0.1:1/ws");
        config.reconnect_delay = Duration::from_millis(10);
        config.max_reconnect_attempts = 0;
        let socket = EventSocket::new(config);

        let first = socket.connect();
        assert!(first.is_some());
        assert!(socket.connect().is_none());

        socket.close();
        if let Some(handle) = first {
            let _ = handle.await;
        }
        assert_eq!(socket.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn starts_disconnected_with_empty_buffer() {
        let socket = EventSocket::new(EventSocketConfig::new("ws://localhost:0/ws"));
        assert_eq!(socket.state(), ConnectionState::Disconnected);
        assert!(socket.recent_events().is_empty());
    }
}
