//! Wire-compatible protocol types for the spy/word room protocol.
//!
//! Push-channel events are adjacently tagged: `{"event": "<name>", "data": {…}}`.
//! Event names and payload field names are part of the wire contract and
//! match the authority exactly (`join`, `onGameStart`, `roomId`, …).
//!
//! The request/response bodies for the `gameHost` HTTP endpoints live here
//! too, so both transports share one definition of `RoomId` and
//! `ConnectionId`.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::status::Status;

// ── Identifiers ─────────────────────────────────────────────────────

/// Opaque room identifier (server-assigned on creation, user-supplied on join).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Parse a user-supplied room code.
    ///
    /// Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyRoomCode`] for an empty or blank code.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyRoomCode);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of one client's channel instance.
///
/// Stable for the lifetime of a channel, regenerated on reconnect. Sent as
/// `clientId` when querying the authority about host status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random connection id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Room state ──────────────────────────────────────────────────────

/// Phase of a room's round lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RoomPhase {
    #[default]
    Waiting,
    Playing,
    Finished,
}

impl RoomPhase {
    /// Map the numeric `gameStatus` field of the status endpoint (`1` = playing).
    pub fn from_game_status(game_status: u8) -> Self {
        match game_status {
            1 => Self::Playing,
            _ => Self::Waiting,
        }
    }
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "waiting",
            Self::Playing => "playing",
            Self::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// The secret role handed to this client for the current round.
///
/// Received opaquely from the authority; the client only stores and shows it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoleAssignment {
    #[default]
    Unassigned,
    /// A regular player holding the round's secret word.
    Player { secret_word: String },
    /// The spy, who holds no word.
    Spy,
}

impl RoleAssignment {
    pub fn is_assigned(&self) -> bool {
        !matches!(self, Self::Unassigned)
    }
}

impl From<RolePayload> for RoleAssignment {
    fn from(payload: RolePayload) -> Self {
        match payload.role {
            WireRole::Player => Self::Player {
                secret_word: payload.message,
            },
            WireRole::Spy => Self::Spy,
            WireRole::None => Self::Unassigned,
        }
    }
}

// ── Payloads ────────────────────────────────────────────────────────

/// Role as it appears on the wire: `"spy"`, `"player"` or `""`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    Spy,
    Player,
    #[default]
    #[serde(rename = "")]
    None,
}

/// Payload of the `onMessage` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePayload {
    pub role: WireRole,
    /// The secret word for players; empty for the spy.
    #[serde(default)]
    pub message: String,
}

/// Room reference carried by create/join acknowledgements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckData {
    pub room_id: RoomId,
}

/// Generic `{status, message, data?}` acknowledgement payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub status: Status,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AckData>,
}

impl Ack {
    /// Build an acknowledgement with no `data` field.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Status(status),
            message: message.into(),
            data: None,
        }
    }

    /// Attach a room reference.
    #[must_use]
    pub fn with_room(mut self, room_id: RoomId) -> Self {
        self.data = Some(AckData { room_id });
        self
    }

    /// The authority's message, or the status description when it sent none.
    pub fn message_or_default(&self) -> String {
        if self.message.is_empty() {
            self.status.description().to_string()
        } else {
            self.message.clone()
        }
    }
}

// ── Push-channel events ─────────────────────────────────────────────

/// Events sent from the client to the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Join an existing room.
    Join { room_id: RoomId },
    /// Leave a room.
    Leave { room_id: RoomId },
    /// Create a new room; the authority assigns its id.
    CreateRoom {},
    /// Start a round (host only).
    StartGame { room_id: RoomId },
    /// Submit the round's secret word (host only).
    SendMessage { room_id: RoomId, message: String },
    /// Return every member to the waiting room (host only).
    BackToWaitingRoom { room_id: RoomId },
    /// Application-level presence signal.
    Ping { room_id: RoomId },
    /// Ask the authority whether the room still exists.
    CheckRoom { room_id: RoomId },
}

impl ClientEvent {
    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::CreateRoom {} => "createRoom",
            Self::StartGame { .. } => "startGame",
            Self::SendMessage { .. } => "sendMessage",
            Self::BackToWaitingRoom { .. } => "backToWaitingRoom",
            Self::Ping { .. } => "ping",
            Self::CheckRoom { .. } => "checkRoom",
        }
    }
}

/// Events sent from the authority to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Acknowledgement of `join`.
    OnJoin(Ack),
    /// Acknowledgement of `createRoom`, carrying the new room id.
    OnCreateRoom(Ack),
    /// A round has started.
    OnGameStart(Ack),
    /// This client's role and (for players) the secret word.
    OnMessage(RolePayload),
    /// The host sent everyone back to the waiting room.
    OnBackToWaitingRoom(Ack),
    /// The host left; the room is gone.
    OnHostLeave(Ack),
    /// Answer to `checkRoom` (`404` means the room is gone).
    OnCheckRoom(Ack),
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::OnJoin(_) => EventKind::OnJoin,
            Self::OnCreateRoom(_) => EventKind::OnCreateRoom,
            Self::OnGameStart(_) => EventKind::OnGameStart,
            Self::OnMessage(_) => EventKind::OnMessage,
            Self::OnBackToWaitingRoom(_) => EventKind::OnBackToWaitingRoom,
            Self::OnHostLeave(_) => EventKind::OnHostLeave,
            Self::OnCheckRoom(_) => EventKind::OnCheckRoom,
        }
    }
}

/// Name of an inbound event, used as the subscription key on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    OnJoin,
    OnCreateRoom,
    OnGameStart,
    OnMessage,
    OnBackToWaitingRoom,
    OnHostLeave,
    OnCheckRoom,
}

impl EventKind {
    /// Every inbound event name.
    pub const ALL: [EventKind; 7] = [
        Self::OnJoin,
        Self::OnCreateRoom,
        Self::OnGameStart,
        Self::OnMessage,
        Self::OnBackToWaitingRoom,
        Self::OnHostLeave,
        Self::OnCheckRoom,
    ];

    /// The wire name of this event.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnJoin => "onJoin",
            Self::OnCreateRoom => "onCreateRoom",
            Self::OnGameStart => "onGameStart",
            Self::OnMessage => "onMessage",
            Self::OnBackToWaitingRoom => "onBackToWaitingRoom",
            Self::OnHostLeave => "onHostLeave",
            Self::OnCheckRoom => "onCheckRoom",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Room query bodies ───────────────────────────────────────────────

/// Request body shared by `POST /gameHost/gameStatus` and `/gameHost/checkMyRoom`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomQueryRequest {
    pub room_id: RoomId,
    pub client_id: ConnectionId,
}

/// Response body of `POST /gameHost/gameStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatusResponse {
    pub res_data: GameStatusData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatusData {
    /// `1` while a round is being played, `0` otherwise.
    pub game_status: u8,
}

/// Response body of `POST /gameHost/checkMyRoom`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostStatusResponse {
    pub res_data: HostStatusData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostStatusData {
    pub is_host: bool,
}
