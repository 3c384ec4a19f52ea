#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for spy/word client integration tests.
//!
//! Provides a channel-based [`MockTransport`] whose authority side is driven
//! through a [`MockServer`], a scriptable [`MockRoomQuery`], and helpers for
//! building acknowledgements.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use spyword_client::protocol::{Ack, RolePayload, WireRole};
use spyword_client::{
    ClientEvent, ConnectionId, HostStatus, RoomId, RoomPhase, RoomQuery, RoomStatus, ServerEvent,
    SpyWordConfig, SpyWordError, Transport,
};
use tokio::sync::mpsc;

type Inbound = Option<Result<String, SpyWordError>>;
type Replies = Arc<StdMutex<HashMap<String, VecDeque<ServerEvent>>>>;

// ── MockTransport ───────────────────────────────────────────────────

/// Client half of an in-memory push channel.
///
/// Every sent event is forwarded to the [`MockServer`]. If the server
/// registered a reply for that event name, the reply is queued for `recv`
/// right away, which lets request/acknowledge flows run without a second task.
pub struct MockTransport {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    loopback: mpsc::UnboundedSender<Inbound>,
    sent: mpsc::UnboundedSender<String>,
    replies: Replies,
    closed: Arc<AtomicBool>,
}

/// Authority half of the in-memory push channel.
pub struct MockServer {
    push: mpsc::UnboundedSender<Inbound>,
    sent: mpsc::UnboundedReceiver<String>,
    replies: Replies,
    /// Whether the client closed the transport.
    pub closed: Arc<AtomicBool>,
}

/// Create a connected transport/server pair.
pub fn mock_transport() -> (MockTransport, MockServer) {
    let (push, inbound) = mpsc::unbounded_channel();
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    let replies: Replies = Arc::default();
    let closed = Arc::new(AtomicBool::new(false));

    let transport = MockTransport {
        inbound,
        loopback: push.clone(),
        sent: sent_tx,
        replies: Arc::clone(&replies),
        closed: Arc::clone(&closed),
    };
    let server = MockServer {
        push,
        sent: sent_rx,
        replies,
        closed,
    };
    (transport, server)
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), SpyWordError> {
        let event: ClientEvent = serde_json::from_str(&message).expect("client sent invalid JSON");
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(event.name())
            .and_then(VecDeque::pop_front);
        if let Some(reply) = reply {
            let json = serde_json::to_string(&reply).expect("reply serialization");
            let _ = self.loopback.send(Some(Ok(json)));
        }
        let _ = self.sent.send(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, SpyWordError>> {
        match self.inbound.recv().await {
            Some(item) => item,
            // Every sender is gone: stay open until shutdown.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), SpyWordError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn connection_id(&self) -> Option<ConnectionId> {
        Some(ConnectionId::new("conn-1"))
    }
}

impl MockServer {
    /// Push an event to the client.
    pub fn push(&self, event: ServerEvent) {
        let json = serde_json::to_string(&event).expect("push serialization");
        self.push.send(Some(Ok(json))).expect("transport dropped");
    }

    /// Push a raw text frame.
    pub fn push_raw(&self, text: &str) {
        self.push
            .send(Some(Ok(text.to_string())))
            .expect("transport dropped");
    }

    /// Close the connection from the authority side.
    pub fn close(&self) {
        let _ = self.push.send(None);
    }

    /// Answer the next client event named `event_name` with `reply`.
    /// Several replies for one name are used in order.
    pub fn reply_to(&self, event_name: &str, reply: ServerEvent) {
        self.replies
            .lock()
            .unwrap()
            .entry(event_name.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Everything the client has sent so far, decoded.
    pub async fn sent_events(&mut self) -> Vec<ClientEvent> {
        settle().await;
        let mut events = Vec::new();
        while let Ok(raw) = self.sent.try_recv() {
            events.push(serde_json::from_str(&raw).expect("client sent invalid JSON"));
        }
        events
    }

    /// Names of everything the client has sent so far.
    pub async fn sent_names(&mut self) -> Vec<&'static str> {
        self.sent_events().await.iter().map(ClientEvent::name).collect()
    }
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

// ── MockRoomQuery ───────────────────────────────────────────────────

/// One scripted answer of [`MockRoomQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply<T> {
    Answer(T),
    NotFound,
    Unreachable,
}

struct QueryState {
    room: Reply<RoomStatus>,
    host: VecDeque<Reply<bool>>,
    room_calls: usize,
    host_calls: usize,
    client_ids: Vec<ConnectionId>,
}

/// Scriptable [`RoomQuery`]. Clones share state, so a test can keep one
/// clone to inspect calls after handing the other to the client.
#[derive(Clone)]
pub struct MockRoomQuery {
    state: Arc<StdMutex<QueryState>>,
}

impl MockRoomQuery {
    /// A waiting room whose host is someone else.
    pub fn new() -> Self {
        Self {
            state: Arc::new(StdMutex::new(QueryState {
                room: Reply::Answer(RoomStatus::present(RoomPhase::Waiting)),
                host: VecDeque::from([Reply::Answer(false)]),
                room_calls: 0,
                host_calls: 0,
                client_ids: Vec::new(),
            })),
        }
    }

    pub fn with_room(self, reply: Reply<RoomStatus>) -> Self {
        self.state.lock().unwrap().room = reply;
        self
    }

    /// Host answers in order; the last one repeats.
    pub fn with_host(self, replies: impl IntoIterator<Item = Reply<bool>>) -> Self {
        self.state.lock().unwrap().host = replies.into_iter().collect();
        self
    }

    pub fn room_calls(&self) -> usize {
        self.state.lock().unwrap().room_calls
    }

    pub fn host_calls(&self) -> usize {
        self.state.lock().unwrap().host_calls
    }

    pub fn client_ids(&self) -> Vec<ConnectionId> {
        self.state.lock().unwrap().client_ids.clone()
    }
}

impl Default for MockRoomQuery {
    fn default() -> Self {
        Self::new()
    }
}

fn unreachable_error() -> SpyWordError {
    SpyWordError::QueryTransport("connection refused".into())
}

#[async_trait]
impl RoomQuery for MockRoomQuery {
    async fn query_room_status(
        &self,
        _room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Result<RoomStatus, SpyWordError> {
        let mut state = self.state.lock().unwrap();
        state.room_calls += 1;
        state.client_ids.push(connection_id.clone());
        match state.room {
            Reply::Answer(status) => Ok(status),
            Reply::NotFound => Ok(RoomStatus::absent()),
            Reply::Unreachable => Err(unreachable_error()),
        }
    }

    async fn query_host_status(
        &self,
        _room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Result<HostStatus, SpyWordError> {
        let mut state = self.state.lock().unwrap();
        state.host_calls += 1;
        state.client_ids.push(connection_id.clone());
        let reply = if state.host.len() > 1 {
            state.host.pop_front()
        } else {
            state.host.front().copied()
        };
        match reply.unwrap_or(Reply::Unreachable) {
            Reply::Answer(is_host) => Ok(HostStatus { is_host }),
            Reply::NotFound => Err(SpyWordError::RoomNotFound),
            Reply::Unreachable => Err(unreachable_error()),
        }
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

pub fn room() -> RoomId {
    RoomId::parse("ABC123").unwrap()
}

pub fn config() -> SpyWordConfig {
    SpyWordConfig::new("http://localhost:8000").with_shutdown_timeout(Duration::from_millis(50))
}

pub fn ack(status: u16, message: &str) -> Ack {
    Ack::new(status, message)
}

pub fn join_ok() -> ServerEvent {
    ServerEvent::OnJoin(ack(200, "Joined room"))
}

pub fn game_start() -> ServerEvent {
    ServerEvent::OnGameStart(ack(200, "Game started"))
}

pub fn role(role: WireRole, message: &str) -> ServerEvent {
    ServerEvent::OnMessage(RolePayload {
        role,
        message: message.to_string(),
    })
}
