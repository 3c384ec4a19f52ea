//! Error types for the spy/word client.

use thiserror::Error;

use crate::protocol::{EventKind, RoomPhase};
use crate::status::Status;

/// Errors that can occur when using the spy/word client.
#[derive(Debug, Error)]
pub enum SpyWordError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The push channel's transport loop has exited.
    #[error("not connected to server")]
    NotConnected,

    /// Attempted a room operation but no session is current.
    #[error("not in a room")]
    NotInRoom,

    /// A room query could not be completed (network failure, bad body).
    #[error("room query failed: {0}")]
    QueryTransport(String),

    /// A room query returned a status other than 200 or 404.
    #[error("room query returned status {status}")]
    QueryStatus {
        /// Status returned by the endpoint.
        status: Status,
    },

    /// The authority reports that the room does not exist.
    #[error("room not found")]
    RoomNotFound,

    /// The room is already playing a round; joining mid-round is refused.
    #[error("game is already started")]
    GameAlreadyStarted,

    /// The authority rejected a create/join request.
    #[error("request rejected ({status}): {message}")]
    Rejected {
        /// Status carried by the acknowledgement.
        status: Status,
        /// Human-readable message from the authority.
        message: String,
    },

    /// Input was rejected locally before anything was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A host-only action was attempted by a non-host (or before the host
    /// flag was resolved).
    #[error("only the host can {0}")]
    NotHost(&'static str),

    /// The action is not valid in the room's current phase.
    #[error("cannot {action} while the room is {phase}")]
    InvalidPhase {
        /// What the caller tried to do.
        action: &'static str,
        /// Phase the room was in.
        phase: RoomPhase,
    },

    /// A handler for this event is already registered on the channel.
    #[error("event `{0}` already has an active subscription")]
    AlreadySubscribed(EventKind),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpyWordError {
    /// Returns `true` for failures of the underlying call rather than answers
    /// from the authority. These are retried on the next poll tick and never
    /// end a session by themselves.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::TransportSend(_)
                | Self::TransportReceive(_)
                | Self::TransportClosed
                | Self::NotConnected
                | Self::QueryTransport(_)
                | Self::QueryStatus { .. }
                | Self::Timeout
                | Self::Io(_)
        )
    }

    /// Returns `true` when the authority reported that the room is gone.
    pub fn is_room_absent(&self) -> bool {
        matches!(self, Self::RoomNotFound)
    }
}

/// Input rejected before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The room code was empty or blank.
    #[error("please enter a room code")]
    EmptyRoomCode,

    /// The secret word was empty or blank.
    #[error("please enter a word")]
    EmptyWord,
}

/// A specialized [`Result`] type for spy/word client operations.
pub type Result<T> = std::result::Result<T, SpyWordError>;

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
    fn transport_failures_are_not_absence() {
        let err = SpyWordError::QueryTransport("connection refused".into());
        assert!(err.is_transport());
        assert!(!err.is_room_absent());

        let err = SpyWordError::QueryStatus {
            status: Status(500),
        };
        assert!(err.is_transport());
    }

    #[test]
    fn absence_is_not_transport() {
        assert!(SpyWordError::RoomNotFound.is_room_absent());
        assert!(!SpyWordError::RoomNotFound.is_transport());
    }

    #[test]
    fn validation_messages_are_user_facing() {
        let err = SpyWordError::from(ValidationError::EmptyWord);
        assert_eq!(err.to_string(), "please enter a word");
        assert!(!err.is_transport());
    }

    #[test]
    fn invalid_phase_names_the_phase() {
        let err = SpyWordError::InvalidPhase {
            action: "start the round",
            phase: RoomPhase::Playing,
        };
        assert_eq!(
            err.to_string(),
            "cannot start the round while the room is playing"
        );
    }
}
