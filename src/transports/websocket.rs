//! WebSocket transport for the push channel, built on `tokio-tungstenite`.
//!
//! Each push event travels as one text frame. Both `ws://` and `wss://`
//! URLs work; TLS is negotiated by
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! Every [`connect`](WebSocketTransport::connect) mints a new
//! [`ConnectionId`] and hands it to the authority in the handshake, as the
//! `clientId` query parameter of the socket URL. The authority keys the
//! socket by that id, which is the same `clientId` the room queries send, so
//! host status can be matched to this connection. A reconnect is seen as a
//! new client.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), spyword_client::SpyWordError> {
//! use spyword_client::{SpyWordConfig, WebSocketTransport};
//!
//! let config = SpyWordConfig::new("http://localhost:8000");
//! let transport = WebSocketTransport::connect_with_config(&config).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::config::SpyWordConfig;
use crate::error::SpyWordError;
use crate::protocol::ConnectionId;
use crate::transport::Transport;

/// Query parameter carrying the connection id in the handshake URL.
pub const CLIENT_ID_PARAM: &str = "clientId";

/// `url` with `clientId=<connection_id>` appended to its query string.
///
/// ```
/// use spyword_client::transports::websocket::handshake_url;
/// use spyword_client::ConnectionId;
///
/// let id = ConnectionId::new("c-1");
/// assert_eq!(handshake_url("ws://host/socket", &id), "ws://host/socket?clientId=c-1");
/// assert_eq!(handshake_url("ws://host/socket?v=2", &id), "ws://host/socket?v=2&clientId=c-1");
/// ```
pub fn handshake_url(url: &str, connection_id: &ConnectionId) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{CLIENT_ID_PARAM}={connection_id}")
}

/// The underlying WebSocket stream type.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] backed by a WebSocket connection.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) only awaits `StreamExt::next`, which does not
/// consume a frame unless it completes, so it is safe inside `tokio::select!`.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    connection_id: ConnectionId,
    closed: bool,
}

impl WebSocketTransport {
    /// Open a WebSocket connection to `url` under a fresh [`ConnectionId`].
    ///
    /// The id is sent as the `clientId` query parameter; see [`handshake_url`].
    ///
    /// # Errors
    ///
    /// Returns [`SpyWordError::Io`] if the URL is invalid or the connection
    /// cannot be established. An underlying I/O error keeps its
    /// [`ErrorKind`](std::io::ErrorKind); anything else maps to `Other`.
    pub async fn connect(url: &str) -> Result<Self, SpyWordError> {
        let connection_id = ConnectionId::generate();
        tracing::debug!(url = %url, connection_id = %connection_id, "opening push channel");

        let request = handshake_url(url, &connection_id);
        let (stream, _response) = tokio_tungstenite::connect_async(request).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            SpyWordError::Io(std::io::Error::new(kind, e))
        })?;

        let transport = Self::from_stream(stream, connection_id);
        tracing::info!(
            url = %url,
            connection_id = %transport.connection_id,
            "push channel connected"
        );
        Ok(transport)
    }

    /// Open the push channel described by `config`, bounded by its request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SpyWordError::Timeout`] if the handshake does not finish in
    /// time, or any error [`connect`](Self::connect) may return.
    pub async fn connect_with_config(config: &SpyWordConfig) -> Result<Self, SpyWordError> {
        Self::connect_with_timeout(&config.socket_url(), config.request_timeout).await
    }

    /// Like [`connect`](Self::connect), failing with [`SpyWordError::Timeout`]
    /// once `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`SpyWordError::Timeout`] or any error of [`connect`](Self::connect).
    pub async fn connect_with_timeout(
        url: &str,
        timeout: std::time::Duration,
    ) -> Result<Self, SpyWordError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| SpyWordError::Timeout)?
    }

    /// Wrap an already-established stream (custom TLS, proxies, headers).
    ///
    /// `connection_id` must be the id the authority learned during that
    /// handshake, e.g. by connecting to [`handshake_url`].
    pub fn from_stream(stream: WsStream, connection_id: ConnectionId) -> Self {
        Self {
            stream,
            connection_id,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), SpyWordError> {
        if self.closed {
            return Err(SpyWordError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| SpyWordError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, SpyWordError>> {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "push channel closed by peer");
                    return None;
                }
                // Pongs are queued by tungstenite itself.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Ok(Message::Binary(bytes)) => {
                    tracing::warn!(len = bytes.len(), "skipping binary frame on push channel");
                }
                Err(e) => return Some(Err(SpyWordError::TransportReceive(e.to_string()))),
            }
        }
        None
    }

    async fn close(&mut self) -> Result<(), SpyWordError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| SpyWordError::TransportSend(e.to_string()))
    }

    fn connection_id(&self) -> Option<ConnectionId> {
        Some(self.connection_id.clone())
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
    use tokio::net::TcpListener;

    /// Accept one WebSocket connection on a local port and hand it to `handler`.
    async fn local_authority<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}/socket")
    }

    /// Accept one connection and report the query string of its handshake.
    async fn recording_authority() -> (String, tokio::sync::oneshot::Receiver<Option<String>>) {
        use tokio_tungstenite::tungstenite::handshake::server::{
            ErrorResponse, Request, Response,
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let callback =
                move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                    let _ = tx.send(request.uri().query().map(str::to_string));
                    Ok(response)
                };
            let mut ws = tokio_tungstenite::accept_hdr_async(tcp, callback).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        (format!("ws://{addr}/socket"), rx)
    }

    #[test]
    fn handshake_url_appends_the_client_id() {
        let id = ConnectionId::new("abc");
        assert_eq!(
            handshake_url("ws://localhost:8000/socket", &id),
            "ws://localhost:8000/socket?clientId=abc"
        );
        assert_eq!(
            handshake_url("wss://spy.example.com/socket?v=2", &id),
            "wss://spy.example.com/socket?v=2&clientId=abc"
        );
    }

    #[tokio::test]
    async fn handshake_tells_the_authority_our_connection_id() {
        let (url, seen) = recording_authority().await;

        let transport = WebSocketTransport::connect(&url).await.unwrap();
        let query = seen.await.unwrap().expect("handshake carried no query string");

        let id = transport.connection_id().unwrap();
        assert_eq!(query, format!("clientId={id}"));
    }

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let err = WebSocketTransport::connect("not-a-url").await.unwrap_err();
        assert!(matches!(err, SpyWordError::Io(_)));
    }

    #[tokio::test]
    async fn connect_with_timeout_times_out() {
        let err = WebSocketTransport::connect_with_timeout(
            "ws://192.0.2.1:1/socket",
            std::time::Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SpyWordError::Timeout));
    }

    #[tokio::test]
    async fn each_connection_gets_a_fresh_id() {
        let first = local_authority(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;
        let second = local_authority(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let a = WebSocketTransport::connect(&first).await.unwrap();
        let b = WebSocketTransport::connect(&second).await.unwrap();
        assert_ne!(a.connection_id(), b.connection_id());
        assert!(a.connection_id().is_some());
    }

    #[tokio::test]
    async fn recv_yields_text_and_skips_binary() {
        let url = local_authority(|mut ws| async move {
            ws.send(Message::Binary(vec![1, 2, 3].into())).await.unwrap();
            ws.send(Message::Text(
                r#"{"event":"onCheckRoom","data":{"status":200,"message":"ok"}}"#.into(),
            ))
            .await
            .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        let text = transport.recv().await.unwrap().unwrap();
        assert!(text.contains("onCheckRoom"));
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_reaches_the_peer() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let url = local_authority(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                let _ = tx.send(text.to_string());
            }
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport
            .send(r#"{"event":"ping","data":{"roomId":"ABC123"}}"#.to_string())
            .await
            .unwrap();
        let received = rx.await.unwrap();
        assert!(received.contains("ABC123"));
    }

    #[tokio::test]
    async fn send_after_close_is_rejected_and_close_is_idempotent() {
        let url = local_authority(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("late".to_string()).await.unwrap_err();
        assert!(matches!(err, SpyWordError::TransportClosed));
    }
}
