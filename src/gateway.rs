//! Outbound intents.
//!
//! [`HostActionGateway`] turns user actions into push-channel events. It
//! validates input that must never reach the wire (a blank secret word) but
//! does not check the host flag or the room phase: the caller holds that
//! state, and the authority enforces host permissions anyway.

use tracing::debug;

use crate::channel::EventChannel;
use crate::error::{Result, ValidationError};
use crate::protocol::{ClientEvent, RoomId};

/// Emits create/join/leave, host round controls, and poll signals.
#[derive(Debug, Clone)]
pub struct HostActionGateway {
    channel: EventChannel,
}

impl HostActionGateway {
    pub fn new(channel: EventChannel) -> Self {
        Self { channel }
    }

    /// The channel events are emitted on.
    pub fn channel(&self) -> &EventChannel {
        &self.channel
    }

    /// Ask the authority for a new room. The id arrives in `onCreateRoom`.
    ///
    /// # Errors
    ///
    /// Any error of [`EventChannel::emit`].
    pub fn create_room(&self) -> Result<()> {
        self.channel.emit(ClientEvent::CreateRoom {})
    }

    /// # Errors
    ///
    /// Any error of [`EventChannel::emit`].
    pub fn join_room(&self, room_id: &RoomId) -> Result<()> {
        self.channel.emit(ClientEvent::Join {
            room_id: room_id.clone(),
        })
    }

    /// Start a round. Host only, valid while the room is waiting.
    ///
    /// # Errors
    ///
    /// Any error of [`EventChannel::emit`].
    pub fn start_round(&self, room_id: &RoomId) -> Result<()> {
        self.channel.emit(ClientEvent::StartGame {
            room_id: room_id.clone(),
        })
    }

    /// Send the round's secret word. Host only, valid while playing.
    ///
    /// Surrounding whitespace is trimmed before sending.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyWord`] for a blank word, in which case
    /// nothing is emitted; otherwise any error of [`EventChannel::emit`].
    pub fn submit_word(&self, room_id: &RoomId, word: &str) -> Result<()> {
        let word = word.trim();
        if word.is_empty() {
            debug!(room_id = %room_id, "refusing to send an empty word");
            return Err(ValidationError::EmptyWord.into());
        }
        self.channel.emit(ClientEvent::SendMessage {
            room_id: room_id.clone(),
            message: word.to_string(),
        })
    }

    /// Send every member back to the waiting room. Host only.
    ///
    /// # Errors
    ///
    /// Any error of [`EventChannel::emit`].
    pub fn return_to_waiting(&self, room_id: &RoomId) -> Result<()> {
        self.channel.emit(ClientEvent::BackToWaitingRoom {
            room_id: room_id.clone(),
        })
    }

    /// # Errors
    ///
    /// Any error of [`EventChannel::emit`].
    pub fn leave_room(&self, room_id: &RoomId) -> Result<()> {
        self.channel.emit(ClientEvent::Leave {
            room_id: room_id.clone(),
        })
    }

    /// Presence signal for the reconciliation loop.
    ///
    /// # Errors
    ///
    /// Any error of [`EventChannel::emit`].
    pub fn ping(&self, room_id: &RoomId) -> Result<()> {
        self.channel.emit(ClientEvent::Ping {
            room_id: room_id.clone(),
        })
    }

    /// Ask whether the room still exists; answered by `onCheckRoom`.
    ///
    /// # Errors
    ///
    /// Any error of [`EventChannel::emit`].
    pub fn check_room(&self, room_id: &RoomId) -> Result<()> {
        self.channel.emit(ClientEvent::CheckRoom {
            room_id: room_id.clone(),
        })
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
    use crate::config::SpyWordConfig;
    use crate::error::SpyWordError;
    use crate::transport::Transport;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn send(&mut self, message: String) -> std::result::Result<(), SpyWordError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
        async fn recv(&mut self) -> Option<std::result::Result<String, SpyWordError>> {
            std::future::pending().await
        }
        async fn close(&mut self) -> std::result::Result<(), SpyWordError> {
            Ok(())
        }
    }

    fn gateway() -> (HostActionGateway, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let channel = EventChannel::start(
            Recorder {
                sent: Arc::clone(&sent),
            },
            &SpyWordConfig::new("http://localhost:8000"),
        );
        (HostActionGateway::new(channel), sent)
    }

    async fn sent_events(sent: &Mutex<Vec<String>>) -> Vec<ClientEvent> {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        sent.lock()
            .unwrap()
            .iter()
            .map(|raw| serde_json::from_str(raw).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn empty_word_is_rejected_locally() {
        let (gateway, sent) = gateway();
        let room = RoomId::parse("ABC123").unwrap();

        let err = gateway.submit_word(&room, "   ").unwrap_err();
        assert!(matches!(
            err,
            SpyWordError::Validation(ValidationError::EmptyWord)
        ));
        assert!(sent_events(&sent).await.is_empty());

        gateway.channel().shutdown().await;
    }

    #[tokio::test]
    async fn word_is_trimmed_before_sending() {
        let (gateway, sent) = gateway();
        let room = RoomId::parse("ABC123").unwrap();

        gateway.submit_word(&room, "  harbor ").unwrap();
        assert_eq!(
            sent_events(&sent).await,
            [ClientEvent::SendMessage {
                room_id: room,
                message: "harbor".into()
            }]
        );

        gateway.channel().shutdown().await;
    }

    #[tokio::test]
    async fn host_controls_map_to_wire_events() {
        let (gateway, sent) = gateway();
        let room = RoomId::parse("ABC123").unwrap();

        gateway.create_room().unwrap();
        gateway.join_room(&room).unwrap();
        gateway.start_round(&room).unwrap();
        gateway.return_to_waiting(&room).unwrap();
        gateway.leave_room(&room).unwrap();

        let names: Vec<&str> = sent_events(&sent)
            .await
            .iter()
            .map(ClientEvent::name)
            .collect();
        assert_eq!(
            names,
            ["createRoom", "join", "startGame", "backToWaitingRoom", "leave"]
        );

        gateway.channel().shutdown().await;
    }
}
