//! Transport abstraction for the push channel.
//!
//! The [`Transport`] trait defines a bidirectional text message channel
//! between the client and the authority. Every push event is one JSON text
//! message, so implementations handle framing internally (WebSocket frames,
//! length-prefixed TCP, in-process channels for tests).
//!
//! # Connection Setup
//!
//! Connection setup is NOT part of this trait. Construct a connected
//! transport externally, then hand it to
//! [`EventChannel::start`](crate::EventChannel::start).
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use spyword_client::error::SpyWordError;
//! use spyword_client::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), SpyWordError> {
//!         // Send the JSON text message over your transport
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, SpyWordError>> {
//!         // Receive the next JSON text message
//!         // Return None when the connection is closed cleanly
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), SpyWordError> {
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::SpyWordError;
use crate::protocol::ConnectionId;

/// A bidirectional text message transport for the push channel.
///
/// Each call to [`send`](Transport::send) transmits one complete JSON message.
/// Each call to [`recv`](Transport::recv) returns one complete JSON message.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because it is
/// used inside `tokio::select!`. Channel-based implementations (e.g. wrapping
/// `mpsc::Receiver`) are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to the authority.
    ///
    /// # Errors
    ///
    /// Returns [`SpyWordError::TransportSend`] if the message could not be sent.
    async fn send(&mut self, message: String) -> Result<(), SpyWordError>;

    /// Receive the next JSON text message from the authority.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete message was received
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the connection was closed cleanly
    async fn recv(&mut self) -> Option<Result<String, SpyWordError>>;

    /// Close the transport connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails. Implementations should
    /// still release resources even if the close handshake fails.
    async fn close(&mut self) -> Result<(), SpyWordError>;

    /// Identity the authority knows this connection by, if the transport
    /// learned one during its handshake. When `None`, the channel generates
    /// a random id.
    fn connection_id(&self) -> Option<ConnectionId> {
        None
    }
}
