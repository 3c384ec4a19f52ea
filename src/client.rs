//! Async client for the spy/word room protocol.
//!
//! [`SpyWordClient`] ties the pieces together: it owns the shared
//! [`EventChannel`], a [`RoomQuery`] implementation, and at most one current
//! [`RoomSession`]. While a session is current, its push subscriptions and
//! its [`PollLoop`] feed one inbound queue; [`next_event`](SpyWordClient::next_event)
//! takes one message at a time from that queue, applies it to the state
//! machine, carries out the resulting effects, and yields what the
//! presentation layer needs to know.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = SpyWordConfig::new("http://localhost:8000");
//! let transport = WebSocketTransport::connect_with_config(&config).await?;
//! let query = HttpRoomQuery::new(&config)?;
//! let mut client = SpyWordClient::start(transport, query, config);
//!
//! client.enter_room(RoomId::parse("ABC123")?).await?;
//! while let Some(event) = client.next_event().await {
//!     match event {
//!         SessionEvent::Updated(snapshot) => render(snapshot.view()),
//!         SessionEvent::Notice(notice) => toast(notice),
//!         SessionEvent::Ended(_) => break,
//!     }
//! }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::channel::{EventChannel, Subscription};
use crate::config::SpyWordConfig;
use crate::error::{Result, SpyWordError};
use crate::event::{EndReason, Notice, SessionEvent};
use crate::gateway::HostActionGateway;
use crate::poll::PollLoop;
use crate::protocol::{ClientEvent, EventKind, RoomId, ServerEvent};
use crate::query::{RoomQuery, RoomStatus};
use crate::session::{Effect, Input, Lifecycle, RoomSession};
use crate::transport::Transport;
use crate::view::SessionSnapshot;

/// Notice shown after the secret word went out.
pub const WORD_SENT_NOTICE: &str = "Word sent!";

/// Events a session always listens to. `onHostLeave` is added when the
/// authority supports it.
const SESSION_EVENTS: [EventKind; 5] = [
    EventKind::OnJoin,
    EventKind::OnGameStart,
    EventKind::OnMessage,
    EventKind::OnBackToWaitingRoom,
    EventKind::OnCheckRoom,
];

/// One message on a session's inbound queue.
#[derive(Debug)]
enum Inbound {
    Server(ServerEvent),
    Tick,
    Closed,
}

/// Everything that lives exactly as long as the current session.
struct ActiveSession {
    session: RoomSession,
    subscriptions: Vec<Subscription>,
    poll: Option<PollLoop>,
    inbox: mpsc::UnboundedReceiver<Inbound>,
    inbox_tx: mpsc::UnboundedSender<Inbound>,
}

/// Client handle for the spy/word room protocol.
pub struct SpyWordClient {
    channel: EventChannel,
    gateway: HostActionGateway,
    query: Arc<dyn RoomQuery>,
    config: SpyWordConfig,
    current: Option<ActiveSession>,
    pending: VecDeque<SessionEvent>,
    last_end: Option<EndReason>,
}

impl SpyWordClient {
    /// Start a push channel over `transport` and build a client around it.
    pub fn start(
        transport: impl Transport,
        query: impl RoomQuery,
        config: SpyWordConfig,
    ) -> Self {
        let channel = EventChannel::start(transport, &config);
        Self::with_channel(channel, Arc::new(query), config)
    }

    /// Build a client on an existing channel, e.g. one shared with other
    /// parts of the application.
    pub fn with_channel(
        channel: EventChannel,
        query: Arc<dyn RoomQuery>,
        config: SpyWordConfig,
    ) -> Self {
        Self {
            gateway: HostActionGateway::new(channel.clone()),
            channel,
            query,
            config,
            current: None,
            pending: VecDeque::new(),
            last_end: None,
        }
    }

    // ── Room entry ──────────────────────────────────────────────────

    /// Ask the authority for a new room and return its id.
    ///
    /// The caller enters the room with [`enter_room`](Self::enter_room).
    ///
    /// # Errors
    ///
    /// - [`SpyWordError::Rejected`] if the authority refuses;
    /// - [`SpyWordError::Timeout`] if no acknowledgement arrives within
    ///   [`SpyWordConfig::ack_timeout`];
    /// - any error of [`EventChannel::emit`] or [`EventChannel::subscribe`].
    pub async fn create_room(&mut self) -> Result<RoomId> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _guard = self.channel.subscribe(EventKind::OnCreateRoom, move |event| {
            if let ServerEvent::OnCreateRoom(ack) = event {
                let _ = tx.send(ack);
            }
        })?;
        self.gateway.create_room()?;

        let ack = tokio::time::timeout(self.config.ack_timeout, rx.recv())
            .await
            .map_err(|_| SpyWordError::Timeout)?
            .ok_or(SpyWordError::NotConnected)?;

        let message = ack.message_or_default();
        if !ack.status.is_ok() {
            self.pending
                .push_back(SessionEvent::Notice(Notice::error(message.clone())));
            return Err(SpyWordError::Rejected {
                status: ack.status,
                message,
            });
        }
        let Some(data) = ack.data else {
            return Err(SpyWordError::Rejected {
                status: ack.status,
                message: "acknowledgement carried no room id".into(),
            });
        };

        info!(room_id = %data.room_id, "room created");
        self.pending
            .push_back(SessionEvent::Notice(Notice::success(message)));
        Ok(data.room_id)
    }

    /// Make `room_id` the current session.
    ///
    /// Ends any current session first. Then asks the authority for the
    /// room's status, subscribes the session's events, emits `join` and waits
    /// for the acknowledgement. On success the poll loop is running and the
    /// host query has been made.
    ///
    /// # Errors
    ///
    /// - a transport-class error if the status query fails (no session is created);
    /// - [`SpyWordError::RoomNotFound`] if the room does not exist;
    /// - [`SpyWordError::GameAlreadyStarted`] if a round is running (`join` is never sent);
    /// - [`SpyWordError::Rejected`] if the authority refuses the join;
    /// - [`SpyWordError::Timeout`] if the join is not acknowledged in time.
    pub async fn enter_room(&mut self, room_id: RoomId) -> Result<()> {
        self.end_current().await;
        self.last_end = None;

        let status = self
            .query
            .query_room_status(&room_id, self.channel.connection_id())
            .await?;
        debug!(room_id = %room_id, ?status, "room status");

        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let subscriptions = self.subscribe_session(&inbox_tx)?;
        self.current = Some(ActiveSession {
            session: RoomSession::new(room_id.clone()),
            subscriptions,
            poll: None,
            inbox,
            inbox_tx,
        });

        self.dispatch(Input::RoomStatus(status)).await;

        let deadline = Instant::now() + self.config.ack_timeout;
        loop {
            let Some(active) = self.current.as_mut() else {
                break;
            };
            if active.session.lifecycle() != &Lifecycle::Entering {
                break;
            }
            let inbound = tokio::time::timeout_at(
                deadline,
                next_inbound(&self.channel, &mut active.inbox),
            )
            .await;
            match inbound {
                Ok(inbound) => self.handle_inbound(inbound).await,
                Err(_) => {
                    warn!(room_id = %room_id, "join was not acknowledged in time");
                    if let Err(e) = self.gateway.leave_room(&room_id) {
                        debug!("could not emit leave after join timeout: {e}");
                    }
                    self.release_current();
                    return Err(SpyWordError::Timeout);
                }
            }
        }

        if self.current.is_some() {
            return Ok(());
        }
        Err(match self.last_end.clone() {
            Some(EndReason::AlreadyPlaying) => SpyWordError::GameAlreadyStarted,
            Some(EndReason::Rejected { status, message }) => {
                SpyWordError::Rejected { status, message }
            }
            Some(EndReason::Disconnected) => SpyWordError::NotConnected,
            Some(EndReason::Left) => SpyWordError::NotInRoom,
            Some(EndReason::RoomNotFound | EndReason::HostLeft) | None => {
                SpyWordError::RoomNotFound
            }
        })
    }

    fn subscribe_session(
        &self,
        inbox_tx: &mpsc::UnboundedSender<Inbound>,
    ) -> Result<Vec<Subscription>> {
        let host_leave = self
            .config
            .supports_host_leave_notice
            .then_some(EventKind::OnHostLeave);
        SESSION_EVENTS
            .into_iter()
            .chain(host_leave)
            .map(|kind| {
                let tx = inbox_tx.clone();
                self.channel.subscribe(kind, move |event| {
                    let _ = tx.send(Inbound::Server(event));
                })
            })
            .collect()
    }

    // ── Event pump ──────────────────────────────────────────────────

    /// Wait for the next thing the presentation layer should react to.
    ///
    /// Returns `None` once no session is current and every queued event has
    /// been handed out.
    ///
    /// Cancel safety: dropping the future while it waits for inbound traffic
    /// loses nothing.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let active = self.current.as_mut()?;
            let inbound = next_inbound(&self.channel, &mut active.inbox).await;
            self.handle_inbound(inbound).await;
        }
    }

    /// Queued events that can be taken without waiting.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.pending.drain(..).collect()
    }

    async fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Server(event) => self.dispatch(Input::Server(event)).await,
            Inbound::Tick => {
                if let Some(input) = self.resolve_host().await {
                    self.dispatch(input).await;
                }
            }
            Inbound::Closed => self.dispatch(Input::Disconnected).await,
        }
    }

    /// Apply `input` to the current session and carry out every effect.
    async fn dispatch(&mut self, input: Input) {
        let mut effects: VecDeque<Effect> = match self.current.as_mut() {
            Some(active) => active.session.apply(input).into(),
            None => return,
        };

        while let Some(effect) = effects.pop_front() {
            match effect {
                Effect::Emit(event) => {
                    let sent = match event {
                        ClientEvent::Join { room_id } => self.gateway.join_room(&room_id),
                        ClientEvent::Leave { room_id } => self.gateway.leave_room(&room_id),
                        other => self.channel.emit(other),
                    };
                    if let Err(e) = sent {
                        warn!("failed to emit session event: {e}");
                    }
                }
                Effect::StartPolling => self.start_polling(),
                Effect::ResolveHost => {
                    if let Some(input) = self.resolve_host().await {
                        if let Some(active) = self.current.as_mut() {
                            effects.extend(active.session.apply(input));
                        }
                    }
                }
                Effect::Notify(notice) => self.pending.push_back(SessionEvent::Notice(notice)),
                Effect::Changed => {
                    if let Some(active) = &self.current {
                        self.pending
                            .push_back(SessionEvent::Updated(active.session.snapshot()));
                    }
                }
                Effect::Teardown(reason) => {
                    self.release_current();
                    self.last_end = Some(reason.clone());
                    self.pending.push_back(SessionEvent::Ended(reason));
                }
            }
        }
    }

    /// Ask whether this client hosts the current room, unless already known.
    ///
    /// A transport failure is logged and left for the next tick.
    async fn resolve_host(&self) -> Option<Input> {
        let active = self.current.as_ref()?;
        if active.session.host().is_some() || !active.session.is_active() {
            return None;
        }
        let room_id = active.session.room_id().clone();
        match self
            .query
            .query_host_status(&room_id, self.channel.connection_id())
            .await
        {
            Ok(status) => Some(Input::HostStatus(status)),
            Err(e) if e.is_room_absent() => Some(Input::RoomStatus(RoomStatus::absent())),
            Err(e) => {
                warn!(room_id = %room_id, "host query failed, retrying on next tick: {e}");
                None
            }
        }
    }

    fn start_polling(&mut self) {
        let Some(active) = self.current.as_mut() else {
            return;
        };
        if active.poll.is_some() {
            return;
        }
        let tx = active.inbox_tx.clone();
        active.poll = Some(PollLoop::spawn(
            self.gateway.clone(),
            active.session.room_id().clone(),
            self.config.poll_interval,
            move || {
                let _ = tx.send(Inbound::Tick);
            },
        ));
    }

    /// Drop the current session's subscriptions and stop its poll loop.
    fn release_current(&mut self) {
        if let Some(mut active) = self.current.take() {
            if let Some(mut poll) = active.poll.take() {
                poll.cancel();
            }
            active.subscriptions.clear();
            debug!(room_id = %active.session.room_id(), "session released");
        }
    }

    async fn end_current(&mut self) {
        if self.current.is_some() {
            self.dispatch(Input::Leave).await;
        }
        // Entering sessions without a join have nothing to emit but still hold guards.
        self.release_current();
    }

    // ── Room actions ────────────────────────────────────────────────

    fn active(&self) -> Result<&ActiveSession> {
        self.current.as_ref().ok_or(SpyWordError::NotInRoom)
    }

    fn active_mut(&mut self) -> Result<&mut ActiveSession> {
        self.current.as_mut().ok_or(SpyWordError::NotInRoom)
    }

    fn push_snapshot(&mut self) {
        if let Some(active) = &self.current {
            self.pending
                .push_back(SessionEvent::Updated(active.session.snapshot()));
        }
    }

    /// Start a round. Host only, while the room is waiting.
    ///
    /// The phase changes when the authority answers with `onGameStart`.
    ///
    /// # Errors
    ///
    /// `NotInRoom`, `NotHost`, `InvalidPhase`, or an emit error.
    pub fn start_round(&self) -> Result<()> {
        let active = self.active()?;
        active.session.check_start_round()?;
        self.gateway.start_round(active.session.room_id())
    }

    /// Replace the host's draft of the secret word.
    ///
    /// # Errors
    ///
    /// `NotInRoom`, `NotHost`, or `InvalidPhase` outside a round.
    pub fn draft_word(&mut self, text: impl Into<String>) -> Result<()> {
        self.active_mut()?.session.draft_word(text)?;
        self.push_snapshot();
        Ok(())
    }

    /// Send the drafted secret word.
    ///
    /// A blank draft is refused locally with an error notice and nothing is
    /// emitted.
    ///
    /// # Errors
    ///
    /// `NotInRoom`, `NotHost`, `InvalidPhase`, `Validation(EmptyWord)`, or an emit error.
    pub fn submit_word(&mut self) -> Result<()> {
        let active = self.current.as_mut().ok_or(SpyWordError::NotInRoom)?;
        active.session.check_submit_word()?;
        let word = active.session.pending_word().text.trim().to_string();

        if let Err(e) = self.gateway.submit_word(active.session.room_id(), &word) {
            if let SpyWordError::Validation(reason) = &e {
                self.pending
                    .push_back(SessionEvent::Notice(Notice::error(reason.to_string())));
            }
            return Err(e);
        }

        active.session.mark_word_submitted(&word);
        self.pending
            .push_back(SessionEvent::Notice(Notice::success(WORD_SENT_NOTICE)));
        self.push_snapshot();
        Ok(())
    }

    /// Send everyone back to the waiting room. Host only.
    ///
    /// # Errors
    ///
    /// `NotInRoom`, `NotHost`, or an emit error.
    pub fn return_to_waiting(&self) -> Result<()> {
        let active = self.active()?;
        active.session.check_return_to_waiting()?;
        self.gateway.return_to_waiting(active.session.room_id())
    }

    /// Leave the current room. Emits `leave` and tears down locally without
    /// waiting for an answer.
    ///
    /// # Errors
    ///
    /// [`SpyWordError::NotInRoom`] if no session is current.
    pub async fn leave_room(&mut self) -> Result<()> {
        if self.current.is_none() {
            return Err(SpyWordError::NotInRoom);
        }
        self.dispatch(Input::Leave).await;
        Ok(())
    }

    /// Show this client's role. Returns `true` if it is now shown; nothing
    /// happens while the role is unassigned.
    ///
    /// # Errors
    ///
    /// [`SpyWordError::NotInRoom`] if no session is current.
    pub fn reveal_role(&mut self) -> Result<bool> {
        let active = self.active_mut()?;
        let was_open = active.session.is_revealed();
        let open = active.session.reveal_role();
        if open != was_open {
            self.push_snapshot();
        }
        Ok(open)
    }

    /// Hide this client's role. Returns `true` if it was shown.
    ///
    /// # Errors
    ///
    /// [`SpyWordError::NotInRoom`] if no session is current.
    pub fn dismiss_role(&mut self) -> Result<bool> {
        let closed = self.active_mut()?.session.dismiss_role();
        if closed {
            self.push_snapshot();
        }
        Ok(closed)
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// Snapshot of the current session, if any.
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.current.as_ref().map(|active| active.session.snapshot())
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.current.as_ref().map(|active| active.session.room_id())
    }

    pub fn is_in_room(&self) -> bool {
        self.current.is_some()
    }

    /// Why the most recent session ended.
    pub fn last_end_reason(&self) -> Option<&EndReason> {
        self.last_end.as_ref()
    }

    /// Returns `true` while the current session's poll loop is running.
    pub fn poll_active(&self) -> bool {
        self.current
            .as_ref()
            .and_then(|active| active.poll.as_ref())
            .is_some_and(PollLoop::is_running)
    }

    pub fn channel(&self) -> &EventChannel {
        &self.channel
    }

    pub fn gateway(&self) -> &HostActionGateway {
        &self.gateway
    }

    pub fn config(&self) -> &SpyWordConfig {
        &self.config
    }

    /// Leave the current room (if any) and shut the push channel down.
    pub async fn shutdown(&mut self) {
        debug!("SpyWordClient: shutdown requested");
        self.end_current().await;
        self.channel.shutdown().await;
    }
}

/// Next message for the session, or `Closed` once the channel is gone and
/// nothing is left queued.
async fn next_inbound(
    channel: &EventChannel,
    inbox: &mut mpsc::UnboundedReceiver<Inbound>,
) -> Inbound {
    tokio::select! {
        biased;
        msg = inbox.recv() => msg.unwrap_or(Inbound::Closed),
        () = channel.closed() => Inbound::Closed,
    }
}

impl std::fmt::Debug for SpyWordClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpyWordClient")
            .field("connection_id", self.channel.connection_id())
            .field("connected", &self.channel.is_connected())
            .field("room_id", &self.room_id())
            .field("pending_events", &self.pending.len())
            .finish()
    }
}

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
    use crate::protocol::{ConnectionId, RoomPhase};
    use crate::query::HostStatus;
    use async_trait::async_trait;

    struct Silent;

    #[async_trait]
    impl Transport for Silent {
        async fn send(&mut self, _message: String) -> std::result::Result<(), SpyWordError> {
            Ok(())
        }
        async fn recv(&mut self) -> Option<std::result::Result<String, SpyWordError>> {
            std::future::pending().await
        }
        async fn close(&mut self) -> std::result::Result<(), SpyWordError> {
            Ok(())
        }
    }

    struct FixedQuery(RoomStatus);

    #[async_trait]
    impl RoomQuery for FixedQuery {
        async fn query_room_status(&self, _: &RoomId, _: &ConnectionId) -> Result<RoomStatus> {
            Ok(self.0)
        }
        async fn query_host_status(&self, _: &RoomId, _: &ConnectionId) -> Result<HostStatus> {
            Ok(HostStatus { is_host: false })
        }
    }

    fn client(status: RoomStatus) -> SpyWordClient {
        SpyWordClient::start(
            Silent,
            FixedQuery(status),
            SpyWordConfig::new("http://localhost:8000"),
        )
    }

    #[tokio::test]
    async fn actions_without_session_are_refused() {
        let mut client = client(RoomStatus::present(RoomPhase::Waiting));
        assert!(matches!(client.start_round(), Err(SpyWordError::NotInRoom)));
        assert!(matches!(client.submit_word(), Err(SpyWordError::NotInRoom)));
        assert!(matches!(
            client.leave_room().await,
            Err(SpyWordError::NotInRoom)
        ));
        assert!(client.next_event().await.is_none());
        client.shutdown().await;
    }

    #[tokio::test]
    async fn absent_room_leaves_no_subscriptions() {
        let mut client = client(RoomStatus::absent());
        let err = client
            .enter_room(RoomId::parse("GONE").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SpyWordError::RoomNotFound));
        assert!(!client.is_in_room());
        assert_eq!(client.channel().subscription_count(), 0);
        assert_eq!(client.last_end_reason(), Some(&EndReason::RoomNotFound));
        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unacknowledged_join_times_out_and_releases() {
        let mut client = client(RoomStatus::present(RoomPhase::Waiting));
        let err = client
            .enter_room(RoomId::parse("ABC123").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SpyWordError::Timeout));
        assert_eq!(client.channel().subscription_count(), 0);
        assert!(!client.poll_active());
        client.shutdown().await;
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let mut client = client(RoomStatus::absent());
        let debug = format!("{client:?}");
        assert!(debug.contains("SpyWordClient"));
        assert!(debug.contains("connected"));
        client.shutdown().await;
    }
}
