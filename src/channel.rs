//! The long-lived push channel shared by every session.
//!
//! [`EventChannel`] is a cheap, cloneable handle over one background
//! transport loop. Outbound events are queued with [`emit`](EventChannel::emit)
//! and written in emission order; inbound events are parsed and handed to the
//! single handler registered for their name.
//!
//! Subscriptions are scoped: [`subscribe`](EventChannel::subscribe) returns a
//! [`Subscription`] guard and dropping the guard removes the handler. A second
//! subscription for a name that already has a handler is refused with
//! [`SpyWordError::AlreadySubscribed`].
//!
//! # Example
//!
//! ```rust,ignore
//! let channel = EventChannel::start(transport, &config);
//! let _guard = channel.subscribe(EventKind::OnCheckRoom, |event| {
//!     println!("{event:?}");
//! })?;
//! channel.emit(ClientEvent::CheckRoom { room_id })?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, warn};

use crate::config::SpyWordConfig;
use crate::error::{Result, SpyWordError};
use crate::protocol::{ClientEvent, ConnectionId, EventKind, ServerEvent};
use crate::transport::Transport;

type Handler = Arc<dyn Fn(ServerEvent) + Send + Sync>;

// ── Shared state ────────────────────────────────────────────────────

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<EventKind, (u64, Handler)>,
}

/// State shared between the channel handles, subscription guards and the
/// transport loop.
struct Shared {
    connection_id: ConnectionId,
    connected: watch::Sender<bool>,
    registry: Mutex<Registry>,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        // Handlers never run under the lock, so a poisoned registry is still consistent.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    fn mark_disconnected(&self) {
        self.connected.send_replace(false);
    }

    /// Remove the handler for `kind` only if it is still the one registered as `id`.
    fn release(&self, kind: EventKind, id: u64) {
        let mut registry = self.registry();
        if registry.handlers.get(&kind).is_some_and(|(current, _)| *current == id) {
            registry.handlers.remove(&kind);
            debug!(event = %kind, "subscription released");
        }
    }

    fn dispatch(&self, event: ServerEvent) {
        let kind = event.kind();
        let handler = self.registry().handlers.get(&kind).map(|(_, h)| Arc::clone(h));
        match handler {
            Some(handler) => handler(event),
            None => debug!(event = %kind, "no subscriber, dropping event"),
        }
    }
}

struct LoopHandle {
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

struct ChannelInner {
    cmd_tx: mpsc::Sender<ClientEvent>,
    shared: Arc<Shared>,
    handle: Mutex<LoopHandle>,
    shutdown_timeout: Duration,
}

impl ChannelInner {
    fn handle(&self) -> MutexGuard<'_, LoopHandle> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        // No executor to drive `transport.close()` here; abort the loop instead.
        if let Some(task) = self.handle().task.take() {
            task.abort();
        }
    }
}

// ── Channel handle ──────────────────────────────────────────────────

/// Handle to the process-wide push channel.
///
/// Clones share the same connection, handler registry and transport loop.
/// The loop is stopped by [`shutdown`](Self::shutdown) or when the last
/// handle is dropped.
#[derive(Clone)]
pub struct EventChannel {
    inner: Arc<ChannelInner>,
}

impl EventChannel {
    /// Spawn the transport loop over a connected transport.
    ///
    /// The connection id is taken from the transport when it knows one,
    /// otherwise a random id is generated for the lifetime of this channel.
    pub fn start(transport: impl Transport, config: &SpyWordConfig) -> Self {
        let connection_id = transport
            .connection_id()
            .unwrap_or_else(ConnectionId::generate);
        // tokio panics on a zero-capacity channel.
        let capacity = config.event_channel_capacity.max(1);
        let (cmd_tx, cmd_rx) = mpsc::channel::<ClientEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (connected, _) = watch::channel(true);

        let shared = Arc::new(Shared {
            connection_id,
            connected,
            registry: Mutex::new(Registry::default()),
        });

        debug!(connection_id = %shared.connection_id, "starting push channel");
        let task = tokio::spawn(transport_loop(
            transport,
            cmd_rx,
            Arc::clone(&shared),
            shutdown_rx,
        ));

        Self {
            inner: Arc::new(ChannelInner {
                cmd_tx,
                shared,
                handle: Mutex::new(LoopHandle {
                    task: Some(task),
                    shutdown_tx: Some(shutdown_tx),
                }),
                shutdown_timeout: config.shutdown_timeout,
            }),
        }
    }

    /// Identity of this client on the push channel.
    pub fn connection_id(&self) -> &ConnectionId {
        &self.inner.shared.connection_id
    }

    /// Returns `true` while the transport loop is running.
    pub fn is_connected(&self) -> bool {
        self.inner.shared.is_connected()
    }

    /// Resolves once the transport loop has exited.
    pub async fn closed(&self) {
        let mut rx = self.inner.shared.connected.subscribe();
        // An error means the sender is gone, which also means closed.
        let _ = rx.wait_for(|connected| !*connected).await;
    }

    /// Queue an event for the authority.
    ///
    /// Fire-and-forget: returns as soon as the event is queued. Events queued
    /// from one handle are written in the order they were emitted.
    ///
    /// # Errors
    ///
    /// - [`SpyWordError::NotConnected`] once the transport loop has exited.
    /// - [`SpyWordError::TransportSend`] if the outbound queue is full; the
    ///   event is dropped.
    pub fn emit(&self, event: ClientEvent) -> Result<()> {
        if !self.is_connected() {
            return Err(SpyWordError::NotConnected);
        }
        match self.inner.cmd_tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(event = dropped.name(), "outbound queue full, dropping event");
                Err(SpyWordError::TransportSend("outbound queue full".into()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SpyWordError::NotConnected),
        }
    }

    /// Register the handler for one inbound event name.
    ///
    /// Handlers run on the transport loop and must not block.
    ///
    /// # Errors
    ///
    /// Returns [`SpyWordError::AlreadySubscribed`] if `kind` already has a
    /// handler. The existing handler is kept.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Result<Subscription>
    where
        F: Fn(ServerEvent) + Send + Sync + 'static,
    {
        let mut registry = self.inner.shared.registry();
        if registry.handlers.contains_key(&kind) {
            return Err(SpyWordError::AlreadySubscribed(kind));
        }
        registry.next_id += 1;
        let id = registry.next_id;
        registry.handlers.insert(kind, (id, Arc::new(handler)));
        debug!(event = %kind, "subscribed");

        Ok(Subscription {
            shared: Arc::downgrade(&self.inner.shared),
            kind,
            id,
        })
    }

    /// Remove the handler for `kind`. Returns `false` if none was registered.
    pub fn unsubscribe(&self, kind: EventKind) -> bool {
        let removed = self.inner.shared.registry().handlers.remove(&kind).is_some();
        if removed {
            debug!(event = %kind, "unsubscribed");
        }
        removed
    }

    /// Returns `true` if `kind` currently has a handler.
    pub fn is_subscribed(&self, kind: EventKind) -> bool {
        self.inner.shared.registry().handlers.contains_key(&kind)
    }

    /// Number of event names with an active handler.
    pub fn subscription_count(&self) -> usize {
        self.inner.shared.registry().handlers.len()
    }

    /// Close the transport and stop the loop.
    ///
    /// The loop gets [`SpyWordConfig::shutdown_timeout`] to close the
    /// transport gracefully before it is aborted. Calling this twice is harmless.
    pub async fn shutdown(&self) {
        debug!("push channel shutdown requested");
        let (shutdown_tx, task) = {
            let mut handle = self.inner.handle();
            (handle.shutdown_tx.take(), handle.task.take())
        };

        if let Some(tx) = shutdown_tx {
            let _ = tx.send(());
        }

        if let Some(mut task) = task {
            match tokio::time::timeout(self.inner.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                }
            }
        }

        self.inner.shared.mark_disconnected();
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("connection_id", self.connection_id())
            .field("connected", &self.is_connected())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

// ── Subscription guard ──────────────────────────────────────────────

/// Keeps one handler registered. Dropping it unsubscribes.
///
/// A guard whose handler was already removed with
/// [`EventChannel::unsubscribe`] does nothing on drop, even if a newer
/// handler for the same name has since been registered.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    shared: Weak<Shared>,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    /// The event name this guard holds.
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.release(self.kind, self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

// ── Transport loop ──────────────────────────────────────────────────

/// Multiplexes outbound events, the shutdown signal and inbound frames.
///
/// Exits when the shutdown signal fires, every handle is dropped, the
/// authority closes the connection, or the transport fails.
async fn transport_loop(
    mut transport: impl Transport,
    mut cmd_rx: mpsc::Receiver<ClientEvent>,
    shared: Arc<Shared>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!("transport loop started");

    loop {
        tokio::select! {
            // Queued events go out before a shutdown is honoured.
            biased;

            cmd = cmd_rx.recv() => {
                let Some(event) = cmd else {
                    debug!("all channel handles dropped, closing transport");
                    let _ = transport.close().await;
                    break;
                };
                debug!(event = event.name(), "emitting");
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if let Err(e) = transport.send(json).await {
                            error!("transport send error: {e}");
                            break;
                        }
                    }
                    Err(e) => error!(event = event.name(), "failed to serialize event: {e}"),
                }
            }

            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                break;
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            debug!(event = %event.kind(), "received");
                            shared.dispatch(event);
                        }
                        Err(e) => warn!("failed to parse inbound event: {e}; raw: {text}"),
                    },
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        break;
                    }
                    None => {
                        debug!("transport closed by authority");
                        break;
                    }
                }
            }
        }
    }

    shared.mark_disconnected();
    debug!("transport loop exited");
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::{Ack, RoomId};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Transport whose inbound side is fed through an mpsc sender.
    struct PipeTransport {
        inbound: mpsc::UnboundedReceiver<Option<std::result::Result<String, SpyWordError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    type Feed = mpsc::UnboundedSender<Option<std::result::Result<String, SpyWordError>>>;

    fn pipe() -> (PipeTransport, Feed, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = PipeTransport {
            inbound: rx,
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, tx, sent, closed)
    }

    #[async_trait]
    impl Transport for PipeTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), SpyWordError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, SpyWordError>> {
            match self.inbound.recv().await {
                Some(item) => item,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> std::result::Result<(), SpyWordError> {
            self.closed.store(true, Ordering::Release);
            Ok(())
        }
    }

    fn config() -> SpyWordConfig {
        SpyWordConfig::new("http://localhost:8000")
    }

    fn room() -> RoomId {
        RoomId::parse("ABC123").unwrap()
    }

    fn check_room_json(status: u16) -> String {
        serde_json::to_string(&ServerEvent::OnCheckRoom(Ack::new(status, ""))).unwrap()
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn emit_preserves_order() {
        let (transport, _feed, sent, _closed) = pipe();
        let channel = EventChannel::start(transport, &config());

        channel.emit(ClientEvent::Ping { room_id: room() }).unwrap();
        channel.emit(ClientEvent::CheckRoom { room_id: room() }).unwrap();
        channel.emit(ClientEvent::Leave { room_id: room() }).unwrap();
        settle().await;

        let names: Vec<String> = sent
            .lock()
            .unwrap()
            .iter()
            .map(|raw| {
                let value: serde_json::Value = serde_json::from_str(raw).unwrap();
                value["event"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(names, ["ping", "checkRoom", "leave"]);

        channel.shutdown().await;
    }

    #[tokio::test]
    async fn handler_receives_inbound_event() {
        let (transport, feed, _sent, _closed) = pipe();
        let channel = EventChannel::start(transport, &config());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _guard = channel
            .subscribe(EventKind::OnCheckRoom, move |event| {
                let _ = tx.send(event);
            })
            .unwrap();

        feed.send(Some(Ok(check_room_json(404)))).unwrap();
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ServerEvent::OnCheckRoom(ack) if ack.status.is_not_found()));

        channel.shutdown().await;
    }

    #[tokio::test]
    async fn resubscribe_is_refused_and_keeps_first_handler() {
        let (transport, feed, _sent, _closed) = pipe();
        let channel = EventChannel::start(transport, &config());

        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&first);
        let _guard = channel
            .subscribe(EventKind::OnCheckRoom, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        let counter = Arc::clone(&second);
        let err = channel
            .subscribe(EventKind::OnCheckRoom, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap_err();
        assert!(matches!(err, SpyWordError::AlreadySubscribed(EventKind::OnCheckRoom)));
        assert_eq!(channel.subscription_count(), 1);

        feed.send(Some(Ok(check_room_json(200)))).unwrap();
        settle().await;
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);

        channel.shutdown().await;
    }

    #[tokio::test]
    async fn dropping_guard_unsubscribes() {
        let (transport, _feed, _sent, _closed) = pipe();
        let channel = EventChannel::start(transport, &config());

        let guard = channel.subscribe(EventKind::OnJoin, |_| {}).unwrap();
        assert!(channel.is_subscribed(EventKind::OnJoin));
        drop(guard);
        assert!(!channel.is_subscribed(EventKind::OnJoin));
        assert_eq!(channel.subscription_count(), 0);

        channel.shutdown().await;
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_and_stale_guard_is_inert() {
        let (transport, _feed, _sent, _closed) = pipe();
        let channel = EventChannel::start(transport, &config());

        let stale = channel.subscribe(EventKind::OnJoin, |_| {}).unwrap();
        assert!(channel.unsubscribe(EventKind::OnJoin));
        assert!(!channel.unsubscribe(EventKind::OnJoin));

        let _fresh = channel.subscribe(EventKind::OnJoin, |_| {}).unwrap();
        drop(stale);
        assert!(channel.is_subscribed(EventKind::OnJoin));

        channel.shutdown().await;
    }

    #[tokio::test]
    async fn unparseable_and_unsubscribed_events_do_not_stop_the_loop() {
        let (transport, feed, _sent, _closed) = pipe();
        let channel = EventChannel::start(transport, &config());

        feed.send(Some(Ok("not json".into()))).unwrap();
        feed.send(Some(Ok(r#"{"event":"onUnknown","data":{}}"#.into()))).unwrap();
        feed.send(Some(Ok(check_room_json(200)))).unwrap();
        settle().await;

        assert!(channel.is_connected());
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn authority_close_disconnects() {
        let (transport, feed, _sent, _closed) = pipe();
        let channel = EventChannel::start(transport, &config());

        feed.send(None).unwrap();
        channel.closed().await;

        assert!(!channel.is_connected());
        let err = channel.emit(ClientEvent::CreateRoom {}).unwrap_err();
        assert!(matches!(err, SpyWordError::NotConnected));
    }

    #[tokio::test]
    async fn receive_error_disconnects() {
        let (transport, feed, _sent, _closed) = pipe();
        let channel = EventChannel::start(transport, &config());

        feed.send(Some(Err(SpyWordError::TransportReceive("boom".into()))))
            .unwrap();
        channel.closed().await;
        assert!(!channel.is_connected());
    }

    #[tokio::test]
    async fn shutdown_closes_transport_and_is_repeatable() {
        let (transport, _feed, _sent, closed) = pipe();
        let channel = EventChannel::start(transport, &config());

        channel.shutdown().await;
        channel.shutdown().await;

        assert!(closed.load(Ordering::Acquire));
        assert!(!channel.is_connected());
    }

    #[tokio::test]
    async fn connection_id_comes_from_transport_when_known() {
        struct Named;

        #[async_trait]
        impl Transport for Named {
            async fn send(&mut self, _message: String) -> std::result::Result<(), SpyWordError> {
                Ok(())
            }
            async fn recv(&mut self) -> Option<std::result::Result<String, SpyWordError>> {
                std::future::pending().await
            }
            async fn close(&mut self) -> std::result::Result<(), SpyWordError> {
                Ok(())
            }
            fn connection_id(&self) -> Option<ConnectionId> {
                Some(ConnectionId::new("conn-1"))
            }
        }

        let channel = EventChannel::start(Named, &config());
        assert_eq!(channel.connection_id().as_str(), "conn-1");
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn full_outbound_queue_drops_the_event() {
        /// Transport that never finishes a send, so the queue backs up.
        struct Stalled;

        #[async_trait]
        impl Transport for Stalled {
            async fn send(&mut self, _message: String) -> std::result::Result<(), SpyWordError> {
                std::future::pending().await
            }
            async fn recv(&mut self) -> Option<std::result::Result<String, SpyWordError>> {
                std::future::pending().await
            }
            async fn close(&mut self) -> std::result::Result<(), SpyWordError> {
                Ok(())
            }
        }

        let config = config()
            .with_event_channel_capacity(1)
            .with_shutdown_timeout(Duration::from_millis(20));
        let channel = EventChannel::start(Stalled, &config);

        let mut refused = 0;
        for _ in 0..5 {
            if channel.emit(ClientEvent::Ping { room_id: room() }).is_err() {
                refused += 1;
            }
            settle().await;
        }
        assert!(refused > 0, "expected the single-slot queue to refuse events");

        channel.shutdown().await;
    }
}
