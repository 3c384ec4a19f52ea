//! # Custom Transport Example
//!
//! Runs a whole host session against an in-process authority: a loopback
//! [`Transport`] for the push channel and an in-memory [`RoomQuery`] for the
//! status endpoints. This is useful for:
//!
//! - **Testing**: exercise presentation logic without a real server
//! - **Custom backends**: adapt any I/O layer (TCP, QUIC, a message bus)
//!
//! ## Running
//!
//! ```sh
//! cargo run --example custom_transport
//! ```

use async_trait::async_trait;
use spyword_client::protocol::Ack;
use spyword_client::{
    ClientEvent, ConnectionId, HostStatus, RoomId, RoomPhase, RoomQuery, RoomStatus, ServerEvent,
    SessionEvent, SessionSnapshot, SpyWordClient, SpyWordConfig, SpyWordError, Transport,
    ViewKind,
};
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────
// Step 1: A channel-based "loopback" transport
// ─────────────────────────────────────────────────────────────────────

/// Client half: handed to `SpyWordClient::start`.
pub struct LoopbackTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

/// Authority half: reads what the client sent and pushes events back.
pub struct LoopbackAuthority {
    rx: mpsc::UnboundedReceiver<String>,
    tx: mpsc::UnboundedSender<String>,
}

fn loopback_pair() -> (LoopbackTransport, LoopbackAuthority) {
    let (client_tx, authority_rx) = mpsc::unbounded_channel();
    let (authority_tx, client_rx) = mpsc::unbounded_channel();
    (
        LoopbackTransport {
            tx: client_tx,
            rx: client_rx,
        },
        LoopbackAuthority {
            rx: authority_rx,
            tx: authority_tx,
        },
    )
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), SpyWordError> {
        self.tx
            .send(message)
            .map_err(|e| SpyWordError::TransportSend(e.to_string()))
    }

    /// `None` once the authority half is dropped. Cancel-safe because
    /// `mpsc::UnboundedReceiver::recv` is.
    async fn recv(&mut self) -> Option<Result<String, SpyWordError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), SpyWordError> {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: An in-memory room query
// ─────────────────────────────────────────────────────────────────────

/// Every room exists and is waiting; this client hosts all of them.
struct FixedRoomQuery;

#[async_trait]
impl RoomQuery for FixedRoomQuery {
    async fn query_room_status(
        &self,
        _room_id: &RoomId,
        _connection_id: &ConnectionId,
    ) -> Result<RoomStatus, SpyWordError> {
        Ok(RoomStatus::present(RoomPhase::Waiting))
    }

    async fn query_host_status(
        &self,
        _room_id: &RoomId,
        _connection_id: &ConnectionId,
    ) -> Result<HostStatus, SpyWordError> {
        Ok(HostStatus { is_host: true })
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: A tiny authority that answers the host's requests
// ─────────────────────────────────────────────────────────────────────

fn reply_for(event: &ClientEvent, new_room: &RoomId) -> Vec<ServerEvent> {
    match event {
        ClientEvent::CreateRoom {} => vec![ServerEvent::OnCreateRoom(
            Ack::new(200, "Room created").with_room(new_room.clone()),
        )],
        ClientEvent::Join { .. } => vec![ServerEvent::OnJoin(Ack::new(200, "Joined room"))],
        ClientEvent::StartGame { .. } => {
            vec![ServerEvent::OnGameStart(Ack::new(200, "Game started"))]
        }
        ClientEvent::BackToWaitingRoom { .. } => vec![ServerEvent::OnBackToWaitingRoom(
            Ack::new(200, "Back to waiting room"),
        )],
        ClientEvent::CheckRoom { .. } => vec![ServerEvent::OnCheckRoom(Ack::new(200, "ok"))],
        // Players would get their role here; the host gets nothing back.
        ClientEvent::SendMessage { .. } | ClientEvent::Leave { .. } | ClientEvent::Ping { .. } => {
            Vec::new()
        }
    }
}

async fn run_authority(mut authority: LoopbackAuthority, new_room: RoomId) {
    while let Some(raw) = authority.rx.recv().await {
        let Ok(event) = serde_json::from_str::<ClientEvent>(&raw) else {
            tracing::warn!("authority got malformed event: {raw}");
            continue;
        };
        tracing::info!("Authority received: {}", event.name());
        for reply in reply_for(&event, &new_room) {
            let Ok(json) = serde_json::to_string(&reply) else {
                continue;
            };
            if authority.tx.send(json).is_err() {
                return;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 4: Drive a host session
// ─────────────────────────────────────────────────────────────────────

/// Pump session events until a snapshot satisfies `done`.
async fn wait_for(
    client: &mut SpyWordClient,
    done: impl Fn(&SessionSnapshot) -> bool,
) -> Result<SessionSnapshot, Box<dyn std::error::Error>> {
    while let Some(event) = client.next_event().await {
        match event {
            SessionEvent::Updated(snapshot) => {
                tracing::info!("View: {:?}", snapshot.view());
                if done(&snapshot) {
                    return Ok(snapshot);
                }
            }
            SessionEvent::Notice(notice) => tracing::info!("Notice: {notice}"),
            SessionEvent::Ended(reason) => return Err(format!("session ended: {reason}").into()),
        }
    }
    Err("no session".into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (transport, authority) = loopback_pair();
    tokio::spawn(run_authority(authority, RoomId::parse("DEMO42")?));

    let config = SpyWordConfig::new("http://in-process");
    let mut client = SpyWordClient::start(transport, FixedRoomQuery, config);

    let room_id = client.create_room().await?;
    client.enter_room(room_id).await?;
    wait_for(&mut client, |s| s.view() == ViewKind::HostLobby).await?;

    client.start_round()?;
    wait_for(&mut client, |s| s.phase == RoomPhase::Playing).await?;

    client.draft_word("lighthouse")?;
    client.submit_word()?;
    wait_for(&mut client, |s| s.pending_word.submitted).await?;

    client.return_to_waiting()?;
    wait_for(&mut client, |s| s.phase == RoomPhase::Waiting).await?;

    client.leave_room().await?;
    while let Some(event) = client.next_event().await {
        tracing::info!("Event: {event:?}");
    }

    client.shutdown().await;
    tracing::info!("Done. Custom transport works!");
    Ok(())
}
