//! Request/response room queries.
//!
//! Some questions cannot wait for a push event: on entering a room the
//! client must know right away whether it exists and whether a round is
//! already running, and it asks once per session whether it is the host.
//! The [`RoomQuery`] trait is that seam; [`HttpRoomQuery`](crate::HttpRoomQuery)
//! answers it over the authority's `gameHost` endpoints.
//!
//! A failed call is an error, never an "absent" answer. Only the
//! authority's 404 means the room is gone.

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::{ConnectionId, RoomId, RoomPhase};

/// Answer to a room status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomStatus {
    pub exists: bool,
    /// Meaningless when `exists` is `false`.
    pub phase: RoomPhase,
}

impl RoomStatus {
    /// The authority reports no such room.
    pub fn absent() -> Self {
        Self {
            exists: false,
            phase: RoomPhase::Waiting,
        }
    }

    pub fn present(phase: RoomPhase) -> Self {
        Self {
            exists: true,
            phase,
        }
    }
}

/// Answer to a host status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostStatus {
    pub is_host: bool,
}

/// Synchronous questions about a room, asked outside the push channel.
#[async_trait]
pub trait RoomQuery: Send + Sync + 'static {
    /// Does the room exist, and in which phase is it?
    ///
    /// # Errors
    ///
    /// Transport-class errors ([`SpyWordError::is_transport`](crate::SpyWordError::is_transport))
    /// when the call itself fails. A missing room is `Ok(RoomStatus::absent())`.
    async fn query_room_status(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Result<RoomStatus>;

    /// Is `connection_id` the host of the room?
    ///
    /// # Errors
    ///
    /// [`SpyWordError::RoomNotFound`](crate::SpyWordError::RoomNotFound) if
    /// the authority reports the room gone, or a transport-class error.
    async fn query_host_status(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Result<HostStatus>;
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

    #[test]
    fn absent_room_does_not_exist() {
        assert!(!RoomStatus::absent().exists);
        assert_eq!(
            RoomStatus::present(RoomPhase::Playing),
            RoomStatus {
                exists: true,
                phase: RoomPhase::Playing
            }
        );
    }

    #[test]
    fn room_query_is_object_safe() {
        fn assert_dyn(_: Option<&dyn RoomQuery>) {}
        assert_dyn(None);
    }
}
