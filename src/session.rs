//! The room session state machine.
//!
//! [`RoomSession`] owns this client's view of one joined room. It is a pure
//! reducer: every stimulus (status query answer, push event, host query
//! answer, user leave, lost connection) goes through [`RoomSession::apply`],
//! which mutates the session and returns the [`Effect`]s the caller must
//! carry out. Nothing here touches the network or a timer, so ordering and
//! idempotence rules can be tested with plain `#[test]`s.
//!
//! ```text
//!  Entering ──onJoin 200──▶ Active{Waiting} ──onGameStart──▶ Active{Playing}
//!     │                         ▲                                 │
//!     │                         └────────onBackToWaitingRoom──────┘
//!     └──────────────── any absence / leave / refusal ──────────▶ Terminated
//! ```
//!
//! Rules worth knowing:
//!
//! - Once terminated, every further input is ignored, so the first absence
//!   signal wins and teardown is requested exactly once.
//! - A role that arrives outside a running round is held back and only
//!   becomes visible when the round starts. A round that starts before the
//!   join is acknowledged hands the held role over on `onJoin`.
//! - A duplicate `onGameStart` during a round changes nothing.
//! - The host flag is set by the first host query answer and never changes.

use tracing::{debug, info};

use crate::error::{Result, SpyWordError};
use crate::event::{EndReason, Notice};
use crate::protocol::{Ack, ClientEvent, RoleAssignment, RoomId, RoomPhase, ServerEvent};
use crate::query::{HostStatus, RoomStatus};
use crate::reveal::RoleReveal;
use crate::view::SessionSnapshot;

/// Text shown when entry is refused because a round is running.
pub const ALREADY_STARTED_NOTICE: &str = "Game is already started!";

/// Text shown when a status or host query finds the room gone.
pub const ROOM_NOT_FOUND_NOTICE: &str = "Room not found.";

/// Text shown when the push channel drops during a session.
pub const DISCONNECTED_NOTICE: &str = "Connection to the server was lost.";

/// Something that happened to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Answer to the room status query made on entry.
    RoomStatus(RoomStatus),
    /// A push event from the authority.
    Server(ServerEvent),
    /// Answer to the host query.
    HostStatus(HostStatus),
    /// The user leaves the room.
    Leave,
    /// The push channel closed.
    Disconnected,
}

/// Work the caller must do after [`RoomSession::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Emit this event on the push channel.
    Emit(ClientEvent),
    /// Ask the authority whether this client is the host.
    ResolveHost,
    /// Start the reconciliation loop.
    StartPolling,
    /// Show a message to the user.
    Notify(Notice),
    /// Session state changed.
    Changed,
    /// Release subscriptions and stop polling. Emitted at most once.
    Teardown(EndReason),
}

/// Where the session is in its life.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Status queried, waiting for the join acknowledgement.
    #[default]
    Entering,
    /// Joined.
    Active,
    /// Over; no input has any effect any more.
    Terminated(EndReason),
}

/// The host's draft of the round's secret word.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendingWord {
    pub submitted: bool,
    pub text: String,
}

/// One client's state for one room.
#[derive(Debug, Clone)]
pub struct RoomSession {
    room_id: RoomId,
    lifecycle: Lifecycle,
    phase: RoomPhase,
    host: Option<bool>,
    role: RoleAssignment,
    held_role: Option<RoleAssignment>,
    pending_word: PendingWord,
    room_alive: bool,
    join_sent: bool,
    reveal: RoleReveal,
}

impl RoomSession {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            lifecycle: Lifecycle::Entering,
            phase: RoomPhase::Waiting,
            host: None,
            role: RoleAssignment::Unassigned,
            held_role: None,
            pending_word: PendingWord::default(),
            room_alive: false,
            join_sent: false,
            reveal: RoleReveal::new(),
        }
    }

    // ── Reducer ─────────────────────────────────────────────────────

    /// Apply one input and return the effects to carry out, in order.
    pub fn apply(&mut self, input: Input) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.is_terminated() {
            debug!(room_id = %self.room_id, ?input, "session over, ignoring input");
            return effects;
        }

        match input {
            Input::RoomStatus(status) => self.on_room_status(status, &mut effects),
            Input::Server(event) => self.on_server_event(event, &mut effects),
            Input::HostStatus(status) => {
                if self.host.is_none() {
                    debug!(room_id = %self.room_id, is_host = status.is_host, "host flag resolved");
                    self.host = Some(status.is_host);
                    effects.push(Effect::Changed);
                }
            }
            Input::Leave => {
                if self.join_sent {
                    effects.push(Effect::Emit(ClientEvent::Leave {
                        room_id: self.room_id.clone(),
                    }));
                }
                self.terminate(EndReason::Left, &mut effects);
            }
            Input::Disconnected => {
                effects.push(Effect::Notify(Notice::error(DISCONNECTED_NOTICE)));
                self.terminate(EndReason::Disconnected, &mut effects);
            }
        }

        self.debug_check_invariants();
        effects
    }

    fn on_room_status(&mut self, status: RoomStatus, effects: &mut Vec<Effect>) {
        if !status.exists {
            effects.push(Effect::Notify(Notice::error(ROOM_NOT_FOUND_NOTICE)));
            self.terminate(EndReason::RoomNotFound, effects);
            return;
        }
        // Only the entry query decides anything; later answers are stale.
        if self.lifecycle != Lifecycle::Entering || self.join_sent {
            return;
        }
        if status.phase == RoomPhase::Playing {
            effects.push(Effect::Notify(Notice::error(ALREADY_STARTED_NOTICE)));
            self.terminate(EndReason::AlreadyPlaying, effects);
            return;
        }
        self.phase = status.phase;
        self.room_alive = true;
        self.join_sent = true;
        effects.push(Effect::Emit(ClientEvent::Join {
            room_id: self.room_id.clone(),
        }));
    }

    fn on_server_event(&mut self, event: ServerEvent, effects: &mut Vec<Effect>) {
        if !self.join_sent {
            debug!(room_id = %self.room_id, event = %event.kind(), "event before join, ignoring");
            return;
        }
        match event {
            ServerEvent::OnJoin(ack) => self.on_join(ack, effects),
            ServerEvent::OnGameStart(ack) => self.on_game_start(ack, effects),
            ServerEvent::OnMessage(payload) => {
                let role = RoleAssignment::from(payload);
                if self.lifecycle == Lifecycle::Active && self.phase == RoomPhase::Playing {
                    if !role.is_assigned() {
                        self.reveal.dismiss();
                    }
                    self.role = role;
                    effects.push(Effect::Changed);
                } else {
                    debug!(room_id = %self.room_id, "role arrived outside a round, holding it");
                    self.held_role = Some(role);
                }
            }
            ServerEvent::OnBackToWaitingRoom(ack) => self.on_back_to_waiting(ack, effects),
            ServerEvent::OnHostLeave(ack) => {
                if ack.status.is_ok() {
                    effects.push(Effect::Notify(Notice::error(ack.message_or_default())));
                    self.terminate(EndReason::HostLeft, effects);
                }
            }
            ServerEvent::OnCheckRoom(ack) => {
                if ack.status.is_not_found() {
                    effects.push(Effect::Notify(Notice::error(ack.message_or_default())));
                    self.terminate(EndReason::RoomNotFound, effects);
                } else if ack.status.is_ok() {
                    if !self.room_alive {
                        self.room_alive = true;
                        effects.push(Effect::Changed);
                    }
                } else {
                    effects.push(Effect::Notify(Notice::error(ack.message_or_default())));
                }
            }
            ServerEvent::OnCreateRoom(_) => {}
        }
    }

    fn on_join(&mut self, ack: Ack, effects: &mut Vec<Effect>) {
        if self.lifecycle != Lifecycle::Entering {
            return;
        }
        if ack.status.is_ok() {
            info!(room_id = %self.room_id, "joined room");
            self.lifecycle = Lifecycle::Active;
            // The round may have started before the join was acknowledged.
            self.role = if self.phase == RoomPhase::Playing {
                self.held_role.take().unwrap_or_default()
            } else {
                RoleAssignment::Unassigned
            };
            effects.extend([Effect::StartPolling, Effect::ResolveHost, Effect::Changed]);
        } else if ack.status.is_not_found() {
            effects.push(Effect::Notify(Notice::error(ack.message_or_default())));
            self.terminate(EndReason::RoomNotFound, effects);
        } else {
            let message = ack.message_or_default();
            effects.push(Effect::Notify(Notice::error(message.clone())));
            self.terminate(
                EndReason::Rejected {
                    status: ack.status,
                    message,
                },
                effects,
            );
        }
    }

    fn on_game_start(&mut self, ack: Ack, effects: &mut Vec<Effect>) {
        if !ack.status.is_ok() {
            effects.push(Effect::Notify(Notice::error(ack.message_or_default())));
            return;
        }
        if self.phase == RoomPhase::Playing {
            debug!(room_id = %self.room_id, "duplicate round start ignored");
            return;
        }
        info!(room_id = %self.room_id, "round started");
        self.phase = RoomPhase::Playing;
        self.pending_word = PendingWord::default();
        if self.lifecycle == Lifecycle::Active {
            self.role = self.held_role.take().unwrap_or_default();
        }
        effects.push(Effect::Changed);
    }

    fn on_back_to_waiting(&mut self, ack: Ack, effects: &mut Vec<Effect>) {
        if !ack.status.is_ok() {
            effects.push(Effect::Notify(Notice::error(ack.message_or_default())));
            return;
        }
        if self.phase != RoomPhase::Playing {
            return;
        }
        info!(room_id = %self.room_id, "back to waiting room");
        self.phase = RoomPhase::Waiting;
        self.clear_round();
        if !ack.message.is_empty() {
            effects.push(Effect::Notify(Notice::success(ack.message)));
        }
        effects.push(Effect::Changed);
    }

    fn clear_round(&mut self) {
        self.role = RoleAssignment::Unassigned;
        self.held_role = None;
        self.pending_word = PendingWord::default();
        self.reveal.dismiss();
    }

    fn terminate(&mut self, reason: EndReason, effects: &mut Vec<Effect>) {
        info!(room_id = %self.room_id, reason = %reason, "session terminated");
        self.clear_round();
        self.room_alive = false;
        self.lifecycle = Lifecycle::Terminated(reason.clone());
        effects.push(Effect::Teardown(reason));
    }

    fn debug_check_invariants(&self) {
        debug_assert!(
            self.phase == RoomPhase::Playing || !self.role.is_assigned(),
            "role visible outside a round"
        );
        debug_assert!(
            self.role.is_assigned() || !self.reveal.is_open(),
            "reveal open with nothing to show"
        );
    }

    // ── Local intents ───────────────────────────────────────────────

    fn require_active(&self) -> Result<()> {
        if self.lifecycle == Lifecycle::Active {
            Ok(())
        } else {
            Err(SpyWordError::NotInRoom)
        }
    }

    fn require_host(&self, action: &'static str) -> Result<()> {
        self.require_active()?;
        if self.host == Some(true) {
            Ok(())
        } else {
            Err(SpyWordError::NotHost(action))
        }
    }

    fn require_phase(&self, action: &'static str, phase: RoomPhase) -> Result<()> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(SpyWordError::InvalidPhase {
                action,
                phase: self.phase,
            })
        }
    }

    /// Check that this client may start a round now.
    ///
    /// # Errors
    ///
    /// `NotInRoom`, `NotHost` or `InvalidPhase` (only while waiting).
    pub fn check_start_round(&self) -> Result<()> {
        const ACTION: &str = "start the round";
        self.require_host(ACTION)?;
        self.require_phase(ACTION, RoomPhase::Waiting)
    }

    /// Check that this client may send the secret word now.
    ///
    /// # Errors
    ///
    /// `NotInRoom`, `NotHost` or `InvalidPhase` (only while playing).
    pub fn check_submit_word(&self) -> Result<()> {
        const ACTION: &str = "send the word";
        self.require_host(ACTION)?;
        self.require_phase(ACTION, RoomPhase::Playing)
    }

    /// Check that this client may send everyone back to the waiting room.
    ///
    /// # Errors
    ///
    /// `NotInRoom` or `NotHost`.
    pub fn check_return_to_waiting(&self) -> Result<()> {
        self.require_host("return to the waiting room")
    }

    /// Replace the host's draft word.
    ///
    /// # Errors
    ///
    /// Same as [`check_submit_word`](Self::check_submit_word).
    pub fn draft_word(&mut self, text: impl Into<String>) -> Result<()> {
        self.check_submit_word()?;
        self.pending_word.text = text.into();
        Ok(())
    }

    /// Record that `word` went out.
    pub fn mark_word_submitted(&mut self, word: &str) {
        self.pending_word.text = word.to_string();
        self.pending_word.submitted = true;
    }

    /// Show the role. Returns `true` if the reveal is now open.
    pub fn reveal_role(&mut self) -> bool {
        self.reveal.reveal(&self.role)
    }

    /// Hide the role. Returns `true` if it was shown.
    pub fn dismiss_role(&mut self) -> bool {
        self.reveal.dismiss()
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Terminated(_))
    }

    /// Why the session ended, once it has.
    pub fn end_reason(&self) -> Option<&EndReason> {
        match &self.lifecycle {
            Lifecycle::Terminated(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn host(&self) -> Option<bool> {
        self.host
    }

    /// The role, as far as it may be shown.
    pub fn role(&self) -> &RoleAssignment {
        &self.role
    }

    pub fn pending_word(&self) -> &PendingWord {
        &self.pending_word
    }

    pub fn is_revealed(&self) -> bool {
        self.reveal.is_open()
    }

    pub fn room_alive(&self) -> bool {
        self.room_alive
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            room_id: self.room_id.clone(),
            lifecycle: self.lifecycle.clone(),
            phase: self.phase,
            host: self.host,
            role: self.role.clone(),
            pending_word: self.pending_word.clone(),
            revealed: self.reveal.is_open(),
            room_alive: self.room_alive,
        }
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
    use crate::protocol::{RolePayload, WireRole};

    fn room() -> RoomId {
        RoomId::parse("ABC123").unwrap()
    }

    fn joined(is_host: bool) -> RoomSession {
        let mut session = RoomSession::new(room());
        session.apply(Input::RoomStatus(RoomStatus::present(RoomPhase::Waiting)));
        session.apply(Input::Server(ServerEvent::OnJoin(Ack::new(200, "joined"))));
        session.apply(Input::HostStatus(HostStatus { is_host }));
        session
    }

    fn game_start() -> Input {
        Input::Server(ServerEvent::OnGameStart(Ack::new(200, "")))
    }

    fn spy() -> Input {
        Input::Server(ServerEvent::OnMessage(RolePayload {
            role: WireRole::Spy,
            message: String::new(),
        }))
    }

    #[test]
    fn entry_emits_join_once() {
        let mut session = RoomSession::new(room());
        let effects = session.apply(Input::RoomStatus(RoomStatus::present(RoomPhase::Waiting)));
        assert_eq!(
            effects,
            [Effect::Emit(ClientEvent::Join { room_id: room() })]
        );
        assert_eq!(session.phase(), RoomPhase::Waiting);
        assert_eq!(session.host(), None);

        let again = session.apply(Input::RoomStatus(RoomStatus::present(RoomPhase::Waiting)));
        assert!(again.is_empty());
    }

    #[test]
    fn playing_room_is_refused_without_join() {
        let mut session = RoomSession::new(room());
        let effects = session.apply(Input::RoomStatus(RoomStatus::present(RoomPhase::Playing)));
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::Emit(ClientEvent::Join { .. }))));
        assert_eq!(
            effects,
            [
                Effect::Notify(Notice::error(ALREADY_STARTED_NOTICE)),
                Effect::Teardown(EndReason::AlreadyPlaying),
            ]
        );
    }

    #[test]
    fn join_ack_activates_and_requests_host_and_polling() {
        let mut session = RoomSession::new(room());
        session.apply(Input::RoomStatus(RoomStatus::present(RoomPhase::Waiting)));
        let effects = session.apply(Input::Server(ServerEvent::OnJoin(Ack::new(200, ""))));
        assert_eq!(
            effects,
            [Effect::StartPolling, Effect::ResolveHost, Effect::Changed]
        );
        assert!(session.is_active());
    }

    #[test]
    fn rejected_join_terminates_with_authority_message() {
        let mut session = RoomSession::new(room());
        session.apply(Input::RoomStatus(RoomStatus::present(RoomPhase::Waiting)));
        let effects = session.apply(Input::Server(ServerEvent::OnJoin(Ack::new(409, "Room is full"))));
        assert_eq!(
            effects,
            [
                Effect::Notify(Notice::error("Room is full")),
                Effect::Teardown(EndReason::Rejected {
                    status: crate::status::Status(409),
                    message: "Room is full".into()
                }),
            ]
        );
    }

    #[test]
    fn host_flag_is_set_once() {
        let mut session = joined(true);
        let effects = session.apply(Input::HostStatus(HostStatus { is_host: false }));
        assert!(effects.is_empty());
        assert_eq!(session.host(), Some(true));
    }

    #[test]
    fn round_start_resets_pending_word() {
        let mut session = joined(true);
        session.apply(game_start());
        session.draft_word("harbor").unwrap();
        session.mark_word_submitted("harbor");
        session.apply(Input::Server(ServerEvent::OnBackToWaitingRoom(Ack::new(200, ""))));
        session.apply(game_start());
        assert_eq!(session.pending_word(), &PendingWord::default());
    }

    #[test]
    fn duplicate_round_start_is_a_no_op() {
        let mut session = joined(false);
        session.apply(game_start());
        session.apply(spy());
        let before = session.snapshot();

        let effects = session.apply(game_start());
        assert!(effects.is_empty());
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn early_role_surfaces_only_after_round_start() {
        let mut session = joined(false);
        let effects = session.apply(spy());
        assert!(effects.is_empty());
        assert_eq!(session.role(), &RoleAssignment::Unassigned);

        session.apply(game_start());
        assert_eq!(session.role(), &RoleAssignment::Spy);
    }

    #[test]
    fn role_from_a_round_started_before_join_ack_survives() {
        let mut session = RoomSession::new(room());
        session.apply(Input::RoomStatus(RoomStatus::present(RoomPhase::Waiting)));
        session.apply(spy());
        session.apply(game_start());
        assert_eq!(session.role(), &RoleAssignment::Unassigned);

        session.apply(Input::Server(ServerEvent::OnJoin(Ack::new(200, "joined"))));
        assert_eq!(session.phase(), RoomPhase::Playing);
        assert_eq!(session.role(), &RoleAssignment::Spy);

        session.apply(Input::HostStatus(HostStatus { is_host: false }));
        assert!(session.apply(game_start()).is_empty());
        assert_eq!(session.role(), &RoleAssignment::Spy);
        assert!(session.reveal_role());
    }

    #[test]
    fn absent_room_is_announced() {
        let mut session = joined(false);
        let effects = session.apply(Input::RoomStatus(RoomStatus::absent()));
        assert_eq!(
            effects,
            [
                Effect::Notify(Notice::error(ROOM_NOT_FOUND_NOTICE)),
                Effect::Teardown(EndReason::RoomNotFound),
            ]
        );
    }

    #[test]
    fn return_to_waiting_clears_round_state() {
        let mut session = joined(false);
        session.apply(game_start());
        session.apply(spy());
        assert!(session.reveal_role());

        let effects = session.apply(Input::Server(ServerEvent::OnBackToWaitingRoom(Ack::new(
            200,
            "Back to waiting room",
        ))));
        assert_eq!(
            effects,
            [
                Effect::Notify(Notice::success("Back to waiting room")),
                Effect::Changed
            ]
        );
        assert_eq!(session.phase(), RoomPhase::Waiting);
        assert_eq!(session.role(), &RoleAssignment::Unassigned);
        assert!(!session.is_revealed());
    }

    #[test]
    fn reveal_is_a_no_op_without_role() {
        let mut session = joined(false);
        session.apply(game_start());
        assert!(!session.reveal_role());
    }

    #[test]
    fn room_absent_terminates_once() {
        let mut session = joined(false);
        let effects = session.apply(Input::Server(ServerEvent::OnCheckRoom(Ack::new(404, "Room not found"))));
        assert_eq!(
            effects,
            [
                Effect::Notify(Notice::error("Room not found")),
                Effect::Teardown(EndReason::RoomNotFound),
            ]
        );

        assert!(session
            .apply(Input::Server(ServerEvent::OnHostLeave(Ack::new(200, "bye"))))
            .is_empty());
        assert!(session.apply(Input::Leave).is_empty());
        assert_eq!(session.end_reason(), Some(&EndReason::RoomNotFound));
    }

    #[test]
    fn leave_emits_then_tears_down() {
        let mut session = joined(true);
        let effects = session.apply(Input::Leave);
        assert_eq!(
            effects,
            [
                Effect::Emit(ClientEvent::Leave { room_id: room() }),
                Effect::Teardown(EndReason::Left),
            ]
        );
    }

    #[test]
    fn host_actions_are_gated() {
        let session = joined(false);
        assert!(matches!(
            session.check_start_round(),
            Err(SpyWordError::NotHost(_))
        ));

        let mut session = joined(true);
        session.check_start_round().unwrap();
        assert!(matches!(
            session.check_submit_word(),
            Err(SpyWordError::InvalidPhase {
                phase: RoomPhase::Waiting,
                ..
            })
        ));
        session.apply(game_start());
        session.check_submit_word().unwrap();
        assert!(session.check_start_round().is_err());
    }

    #[test]
    fn entering_session_refuses_local_actions() {
        let session = RoomSession::new(room());
        assert!(matches!(
            session.check_return_to_waiting(),
            Err(SpyWordError::NotInRoom)
        ));
    }
}
