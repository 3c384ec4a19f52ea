//! # Room Session Example
//!
//! Demonstrates a complete spy/word client lifecycle:
//!
//! 1. Connect to the authority's push channel via WebSocket
//! 2. Create a room, or enter the one named on the command line
//! 3. React to session events (host resolved, round started, role received)
//! 4. Leave and shut down gracefully on Ctrl+C or when the session ends
//!
//! ## Running
//!
//! ```sh
//! # Start an authority on localhost:8000, then create a room:
//! cargo run --example room_session
//!
//! # Or enter an existing room against another authority:
//! SPYWORD_URL=https://spy.example.com cargo run --example room_session -- ABC123
//! ```

use spyword_client::{
    HttpRoomQuery, RoleAssignment, RoomId, SessionEvent, SpyWordClient, SpyWordConfig,
    WebSocketTransport,
};

/// Default authority address when `SPYWORD_URL` is not set.
const DEFAULT_URL: &str = "http://localhost:8000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("SPYWORD_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let config = SpyWordConfig::new(url);
    tracing::info!("Connecting to {}", config.socket_url());

    // ── Connect ─────────────────────────────────────────────────────
    let transport = WebSocketTransport::connect_with_config(&config).await?;
    let query = HttpRoomQuery::new(&config)?;
    let mut client = SpyWordClient::start(transport, query, config);

    // ── Enter a room ────────────────────────────────────────────────
    let room_id = match std::env::args().nth(1) {
        Some(code) => RoomId::parse(code)?,
        None => {
            let room_id = client.create_room().await?;
            tracing::info!("Created room {room_id}; share this code with the players");
            room_id
        }
    };
    client.enter_room(room_id).await?;

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = client.next_event() => {
                let Some(event) = event else {
                    tracing::info!("No session left, exiting");
                    break;
                };
                match event {
                    SessionEvent::Updated(snapshot) => {
                        tracing::info!(
                            phase = %snapshot.phase,
                            host = ?snapshot.host,
                            "View: {:?}",
                            snapshot.view()
                        );
                        match &snapshot.role {
                            RoleAssignment::Spy => tracing::info!("You are the spy"),
                            RoleAssignment::Player { secret_word } => {
                                tracing::info!("The secret word is {secret_word}");
                            }
                            RoleAssignment::Unassigned => {}
                        }
                    }
                    SessionEvent::Notice(notice) if notice.is_error() => {
                        tracing::warn!("{notice}");
                    }
                    SessionEvent::Notice(notice) => tracing::info!("{notice}"),
                    SessionEvent::Ended(reason) => {
                        tracing::info!("Session ended: {reason}");
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, leaving room");
                break;
            }
        }
    }

    // ── Shutdown ────────────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("Client shut down cleanly");
    Ok(())
}
