//! Read-only view state for the presentation layer.

use crate::protocol::{RoleAssignment, RoomId, RoomPhase};
use crate::session::{Lifecycle, PendingWord};

/// Copy of a session's state at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub room_id: RoomId,
    pub lifecycle: Lifecycle,
    pub phase: RoomPhase,
    /// `None` until the authority has answered the host query.
    pub host: Option<bool>,
    pub role: RoleAssignment,
    pub pending_word: PendingWord,
    pub revealed: bool,
    pub room_alive: bool,
}

/// Which screen the session calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    /// Host flag not resolved yet.
    Resolving,
    /// Host, room waiting: offer "start round".
    HostLobby,
    /// Host, round running: compose and send the secret word.
    HostComposer { word_submitted: bool },
    /// Non-host outside a round.
    Waiting,
    /// Non-host in a round whose role has not arrived.
    AwaitingWord,
    /// Non-host holding a role, shown only once revealed.
    RoleReady { revealed: bool },
}

impl SessionSnapshot {
    pub fn is_host(&self) -> bool {
        self.host == Some(true)
    }

    pub fn view(&self) -> ViewKind {
        let Some(is_host) = self.host else {
            return ViewKind::Resolving;
        };
        match (is_host, self.phase) {
            (true, RoomPhase::Playing) => ViewKind::HostComposer {
                word_submitted: self.pending_word.submitted,
            },
            (true, RoomPhase::Waiting | RoomPhase::Finished) => ViewKind::HostLobby,
            (false, RoomPhase::Playing) if self.role.is_assigned() => ViewKind::RoleReady {
                revealed: self.revealed,
            },
            (false, RoomPhase::Playing) => ViewKind::AwaitingWord,
            (false, RoomPhase::Waiting | RoomPhase::Finished) => ViewKind::Waiting,
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

    fn snapshot(host: Option<bool>, phase: RoomPhase, role: RoleAssignment) -> SessionSnapshot {
        SessionSnapshot {
            room_id: RoomId::parse("ABC123").unwrap(),
            lifecycle: Lifecycle::Active,
            phase,
            host,
            role,
            pending_word: PendingWord::default(),
            revealed: false,
            room_alive: true,
        }
    }

    #[test]
    fn unresolved_host_is_resolving() {
        let s = snapshot(None, RoomPhase::Playing, RoleAssignment::Spy);
        assert_eq!(s.view(), ViewKind::Resolving);
    }

    #[test]
    fn host_views() {
        let s = snapshot(Some(true), RoomPhase::Waiting, RoleAssignment::Unassigned);
        assert_eq!(s.view(), ViewKind::HostLobby);

        let mut s = snapshot(Some(true), RoomPhase::Playing, RoleAssignment::Unassigned);
        s.pending_word.submitted = true;
        assert_eq!(
            s.view(),
            ViewKind::HostComposer {
                word_submitted: true
            }
        );
    }

    #[test]
    fn player_views() {
        let s = snapshot(Some(false), RoomPhase::Finished, RoleAssignment::Unassigned);
        assert_eq!(s.view(), ViewKind::Waiting);

        let s = snapshot(Some(false), RoomPhase::Playing, RoleAssignment::Unassigned);
        assert_eq!(s.view(), ViewKind::AwaitingWord);

        let mut s = snapshot(Some(false), RoomPhase::Playing, RoleAssignment::Spy);
        s.revealed = true;
        assert_eq!(s.view(), ViewKind::RoleReady { revealed: true });
    }
}
