#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Ordering and idempotence properties of the room session state machine.
//!
//! These drive [`RoomSession`] directly, with no channel or timer, through
//! every short sequence of stimuli a session can see, both once joined and
//! while the join is still unacknowledged.

mod common;

use common::{ack, game_start, join_ok, role, room};
use spyword_client::protocol::WireRole;
use spyword_client::session::{ALREADY_STARTED_NOTICE, ROOM_NOT_FOUND_NOTICE};
use spyword_client::{
    ClientEvent, Effect, EndReason, HostStatus, Input, Lifecycle, Notice, RoleAssignment,
    RoomPhase, RoomSession, RoomStatus, ServerEvent, ViewKind,
};

/// Status answered and `join` emitted, acknowledgement not yet seen.
fn join_sent() -> RoomSession {
    let mut session = RoomSession::new(room());
    session.apply(Input::RoomStatus(RoomStatus::present(RoomPhase::Waiting)));
    assert_eq!(session.lifecycle(), &Lifecycle::Entering);
    session
}

fn joined() -> RoomSession {
    let mut session = join_sent();
    session.apply(Input::Server(join_ok()));
    assert!(session.is_active());
    session
}

fn teardowns(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::Teardown(_)))
        .count()
}

// ════════════════════════════════════════════════════════════════════
// Exhaustive short sequences
// ════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
enum Step {
    Apply(Input),
    Reveal,
    Dismiss,
}

fn steps() -> Vec<Step> {
    vec![
        Step::Apply(Input::Server(join_ok())),
        Step::Apply(Input::Server(game_start())),
        Step::Apply(Input::Server(role(WireRole::Spy, ""))),
        Step::Apply(Input::Server(role(WireRole::Player, "harbor"))),
        Step::Apply(Input::Server(role(WireRole::None, ""))),
        Step::Apply(Input::Server(ServerEvent::OnBackToWaitingRoom(ack(200, "")))),
        Step::Apply(Input::Server(ServerEvent::OnCheckRoom(ack(200, "ok")))),
        Step::Apply(Input::Server(ServerEvent::OnCheckRoom(ack(404, "gone")))),
        Step::Apply(Input::Server(ServerEvent::OnHostLeave(ack(200, "bye")))),
        Step::Apply(Input::RoomStatus(RoomStatus::absent())),
        Step::Apply(Input::HostStatus(HostStatus { is_host: true })),
        Step::Apply(Input::Leave),
        Step::Reveal,
        Step::Dismiss,
    ]
}

fn check_invariants(session: &RoomSession, trace: &[Step]) {
    if session.role().is_assigned() {
        assert_eq!(
            session.phase(),
            RoomPhase::Playing,
            "role visible outside a round after {trace:?}"
        );
        assert!(session.is_active(), "role visible after teardown: {trace:?}");
    }
    if session.is_revealed() {
        assert!(
            session.role().is_assigned(),
            "reveal open with nothing to show after {trace:?}"
        );
    }
    if session.is_terminated() {
        assert!(!session.room_alive(), "terminated room still alive: {trace:?}");
        assert_eq!(session.role(), &RoleAssignment::Unassigned);
    }
}

/// The role the session should show while joined and playing: the last
/// role pushed since the round state was last cleared.
#[derive(Debug, Default)]
struct RoleModel {
    last: Option<RoleAssignment>,
}

impl RoleModel {
    fn observe(&mut self, step: &Step, phase_before: RoomPhase, terminated_before: bool) {
        if terminated_before {
            return;
        }
        match step {
            Step::Apply(Input::Server(ServerEvent::OnMessage(payload))) => {
                self.last = Some(RoleAssignment::from(payload.clone()));
            }
            Step::Apply(Input::Server(ServerEvent::OnBackToWaitingRoom(_)))
                if phase_before == RoomPhase::Playing =>
            {
                self.last = None;
            }
            _ => {}
        }
    }

    fn expected(&self) -> RoleAssignment {
        self.last.clone().unwrap_or_default()
    }
}

fn run_sequences(start: fn() -> RoomSession) {
    let steps = steps();
    let n = steps.len();
    for code in 0..n.pow(4) {
        let trace: Vec<Step> = (0..4)
            .map(|digit| steps[(code / n.pow(digit)) % n].clone())
            .collect();

        let mut session = start();
        let mut model = RoleModel::default();
        let mut torn_down = 0;
        for (i, step) in trace.iter().enumerate() {
            let was_terminated = session.is_terminated();
            let phase_before = session.phase();
            match step.clone() {
                Step::Apply(input) => {
                    let effects = session.apply(input);
                    if was_terminated {
                        assert!(effects.is_empty(), "input after teardown had effects: {trace:?}");
                    }
                    torn_down += teardowns(&effects);
                }
                Step::Reveal => {
                    session.reveal_role();
                }
                Step::Dismiss => {
                    session.dismiss_role();
                }
            }
            model.observe(step, phase_before, was_terminated);
            check_invariants(&session, &trace[..=i]);
            if session.is_active() && session.phase() == RoomPhase::Playing {
                assert_eq!(
                    session.role(),
                    &model.expected(),
                    "role lost during a round after {:?}",
                    &trace[..=i]
                );
            }
        }
        assert!(torn_down <= 1, "teardown requested {torn_down} times: {trace:?}");
        assert_eq!(torn_down == 1, session.is_terminated(), "{trace:?}");
    }
}

#[test]
fn every_four_step_sequence_keeps_the_invariants() {
    run_sequences(joined);
}

#[test]
fn every_four_step_sequence_from_an_unacknowledged_join_keeps_the_invariants() {
    run_sequences(join_sent);
}

// ════════════════════════════════════════════════════════════════════
// Scenarios
// ════════════════════════════════════════════════════════════════════

#[test]
fn entry_into_running_round_never_joins() {
    let mut session = RoomSession::new(room());
    let effects = session.apply(Input::RoomStatus(RoomStatus::present(RoomPhase::Playing)));

    assert!(!effects.iter().any(|e| matches!(e, Effect::Emit(_))));
    assert_eq!(
        effects,
        vec![
            Effect::Notify(Notice::error(ALREADY_STARTED_NOTICE)),
            Effect::Teardown(EndReason::AlreadyPlaying),
        ]
    );
}

#[test]
fn spy_role_before_start_is_shown_with_the_round() {
    let mut session = joined();
    session.apply(Input::HostStatus(HostStatus { is_host: false }));

    session.apply(Input::Server(role(WireRole::Spy, "")));
    assert_eq!(session.role(), &RoleAssignment::Unassigned);
    assert_eq!(session.snapshot().view(), ViewKind::Waiting);

    session.apply(Input::Server(game_start()));
    assert_eq!(session.role(), &RoleAssignment::Spy);
    assert_eq!(
        session.snapshot().view(),
        ViewKind::RoleReady { revealed: false }
    );
}

#[test]
fn round_started_before_join_ack_keeps_the_role() {
    let mut session = join_sent();
    session.apply(Input::Server(game_start()));
    session.apply(Input::Server(role(WireRole::Spy, "")));
    assert_eq!(session.role(), &RoleAssignment::Unassigned);

    session.apply(Input::Server(join_ok()));
    assert!(session.is_active());
    assert_eq!(session.phase(), RoomPhase::Playing);
    assert_eq!(session.role(), &RoleAssignment::Spy);

    session.apply(Input::HostStatus(HostStatus { is_host: false }));
    assert!(session.apply(Input::Server(game_start())).is_empty());
    assert_eq!(session.role(), &RoleAssignment::Spy);
    assert_eq!(
        session.snapshot().view(),
        ViewKind::RoleReady { revealed: false }
    );
}

#[test]
fn absent_room_on_status_query_is_announced() {
    let mut session = joined();
    let effects = session.apply(Input::RoomStatus(RoomStatus::absent()));
    assert_eq!(
        effects,
        vec![
            Effect::Notify(Notice::error(ROOM_NOT_FOUND_NOTICE)),
            Effect::Teardown(EndReason::RoomNotFound),
        ]
    );
}

#[test]
fn duplicate_round_start_keeps_the_role() {
    let mut session = joined();
    session.apply(Input::Server(game_start()));
    session.apply(Input::Server(role(WireRole::Player, "harbor")));

    let effects = session.apply(Input::Server(game_start()));
    assert!(effects.is_empty());
    assert_eq!(
        session.role(),
        &RoleAssignment::Player {
            secret_word: "harbor".into()
        }
    );
}

#[test]
fn room_check_404_tears_down_once() {
    let mut session = joined();
    let gone = Input::Server(ServerEvent::OnCheckRoom(ack(404, "Room not found")));

    let first = session.apply(gone.clone());
    assert_eq!(teardowns(&first), 1);
    assert!(first.contains(&Effect::Notify(Notice::error("Room not found"))));

    assert!(session.apply(gone).is_empty());
    assert!(session
        .apply(Input::Server(ServerEvent::OnHostLeave(ack(200, "bye"))))
        .is_empty());
    assert_eq!(session.end_reason(), Some(&EndReason::RoomNotFound));
}

#[test]
fn host_flag_is_resolved_once() {
    let mut session = joined();
    assert_eq!(
        session.apply(Input::HostStatus(HostStatus { is_host: true })),
        vec![Effect::Changed]
    );
    assert!(session
        .apply(Input::HostStatus(HostStatus { is_host: false }))
        .is_empty());
    assert_eq!(session.host(), Some(true));
}

#[test]
fn round_trip_back_to_waiting_clears_the_round() {
    let mut session = joined();
    session.apply(Input::HostStatus(HostStatus { is_host: true }));
    session.apply(Input::Server(game_start()));
    session.draft_word("harbor").unwrap();
    session.mark_word_submitted("harbor");

    let effects = session.apply(Input::Server(ServerEvent::OnBackToWaitingRoom(ack(
        200,
        "Back to waiting room",
    ))));
    assert_eq!(
        effects,
        vec![
            Effect::Notify(Notice::success("Back to waiting room")),
            Effect::Changed,
        ]
    );
    assert_eq!(session.phase(), RoomPhase::Waiting);
    assert!(!session.pending_word().submitted);
    assert!(session.pending_word().text.is_empty());
    assert_eq!(session.snapshot().view(), ViewKind::HostLobby);
}

#[test]
fn leave_after_join_emits_leave_then_tears_down() {
    let mut session = joined();
    let effects = session.apply(Input::Leave);
    assert_eq!(
        effects,
        vec![
            Effect::Emit(ClientEvent::Leave { room_id: room() }),
            Effect::Teardown(EndReason::Left),
        ]
    );
    assert_eq!(session.lifecycle(), &Lifecycle::Terminated(EndReason::Left));
}

#[test]
fn events_before_join_are_ignored() {
    let mut session = RoomSession::new(room());
    assert!(session.apply(Input::Server(join_ok())).is_empty());
    assert!(session.apply(Input::Server(game_start())).is_empty());
    assert_eq!(session.lifecycle(), &Lifecycle::Entering);
    assert_eq!(session.phase(), RoomPhase::Waiting);
}
