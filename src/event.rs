//! What the client hands to the presentation layer.

use std::fmt;

use crate::status::Status;
use crate::view::SessionSnapshot;

/// One step of the event pump ([`SpyWordClient::next_event`](crate::SpyWordClient::next_event)).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Session state changed; re-render from the snapshot.
    Updated(SessionSnapshot),
    /// A message for the user.
    Notice(Notice),
    /// The session is over. The caller should leave the room view.
    Ended(EndReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A user-facing message, usually the authority's own text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The user left.
    Left,
    /// The host left and the authority closed the room.
    HostLeft,
    /// A status query, room check or join answer said the room does not exist.
    RoomNotFound,
    /// The room was already playing when this client tried to enter.
    AlreadyPlaying,
    /// The authority refused the join.
    Rejected { status: Status, message: String },
    /// The push channel closed underneath the session.
    Disconnected,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left the room"),
            Self::HostLeft => f.write_str("the host left the room"),
            Self::RoomNotFound => f.write_str("room not found"),
            Self::AlreadyPlaying => f.write_str("game is already started"),
            Self::Rejected { status, message } => write!(f, "join rejected ({status}): {message}"),
            Self::Disconnected => f.write_str("disconnected from server"),
        }
    }
}
