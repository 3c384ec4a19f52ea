//! # Spy/Word Client
//!
//! Session and state synchronization client for the spy/word room game.
//!
//! A room's truth lives on a remote authority. This crate keeps one client's
//! view of a joined room (does it exist, who hosts it, is a round running,
//! what is this player's role) consistent with that authority across a push
//! channel and a set of request/response queries.
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement [`Transport`] for any bidirectional
//!   text channel; `transport-websocket` (default) provides [`WebSocketTransport`]
//! - **Query-agnostic**: implement [`RoomQuery`]; `query-http` (default)
//!   provides [`HttpRoomQuery`]
//! - **Pure state machine**: [`RoomSession`] is a reducer with no I/O, so its
//!   ordering and idempotence rules are unit-testable
//! - **Scoped subscriptions**: handlers are released when their
//!   [`Subscription`] guard is dropped
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spyword_client::{HttpRoomQuery, RoomId, SessionEvent, SpyWordClient, SpyWordConfig, WebSocketTransport};
//!
//! let config = SpyWordConfig::new("http://localhost:8000");
//! let transport = WebSocketTransport::connect_with_config(&config).await?;
//! let mut client = SpyWordClient::start(transport, HttpRoomQuery::new(&config)?, config);
//!
//! let room_id = client.create_room().await?;
//! client.enter_room(room_id).await?;
//! while let Some(event) = client.next_event().await {
//!     if let SessionEvent::Ended(reason) = event {
//!         println!("session over: {reason}");
//!         break;
//!     }
//! }
//! ```

pub mod error;
pub mod event;
pub mod protocol;
pub mod query;
pub mod reveal;
pub mod session;
pub mod status;
pub mod transport;
pub mod view;

pub mod config;

#[cfg(feature = "tokio-runtime")]
pub mod channel;
#[cfg(feature = "tokio-runtime")]
pub mod client;
#[cfg(feature = "tokio-runtime")]
pub mod gateway;
#[cfg(feature = "tokio-runtime")]
pub mod poll;

pub mod queries;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use config::SpyWordConfig;
pub use error::{SpyWordError, ValidationError};
pub use event::{EndReason, Notice, NoticeLevel, SessionEvent};
pub use protocol::{
    ClientEvent, ConnectionId, EventKind, RoleAssignment, RoomId, RoomPhase, ServerEvent,
};
pub use query::{HostStatus, RoomQuery, RoomStatus};
pub use reveal::RoleReveal;
pub use session::{Effect, Input, Lifecycle, PendingWord, RoomSession};
pub use status::Status;
pub use transport::Transport;
pub use view::{SessionSnapshot, ViewKind};

#[cfg(feature = "tokio-runtime")]
pub use channel::{EventChannel, Subscription};
#[cfg(feature = "tokio-runtime")]
pub use client::SpyWordClient;
#[cfg(feature = "tokio-runtime")]
pub use gateway::HostActionGateway;
#[cfg(feature = "tokio-runtime")]
pub use poll::PollLoop;

#[cfg(feature = "query-http")]
pub use queries::HttpRoomQuery;
#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
