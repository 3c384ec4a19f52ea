//! Fixed-interval reconciliation.
//!
//! While a session is joined, [`PollLoop`] wakes every interval, emits a
//! `ping` and a `checkRoom` for the room, then calls the tick hook. The
//! answer to `checkRoom` arrives on the push channel like any other event,
//! so a client that missed a push notices within one interval.
//!
//! This is not a transport keep-alive; the channel has its own.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::MIN_POLL_INTERVAL;
use crate::gateway::HostActionGateway;
use crate::protocol::RoomId;

/// Handle to a running reconciliation task.
///
/// [`cancel`](Self::cancel) stops the task; only the first call has any
/// effect. Dropping the handle also stops it.
#[derive(Debug)]
pub struct PollLoop {
    room_id: RoomId,
    interval: Duration,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl PollLoop {
    /// Spawn the loop. The first tick fires one `interval` from now.
    ///
    /// Intervals below 10 ms are clamped.
    pub fn spawn<F>(
        gateway: HostActionGateway,
        room_id: RoomId,
        interval: Duration,
        on_tick: F,
    ) -> Self
    where
        F: Fn() + Send + 'static,
    {
        // tokio panics on a zero period.
        let interval = interval.max(MIN_POLL_INTERVAL);
        let (stop_tx, stop_rx) = oneshot::channel();
        debug!(room_id = %room_id, ?interval, "starting poll loop");
        let task = tokio::spawn(run(gateway, room_id.clone(), interval, on_tick, stop_rx));
        Self {
            room_id,
            interval,
            stop_tx: Some(stop_tx),
            task: Some(task),
        }
    }

    /// Stop the loop. Returns `true` on the call that actually stopped it.
    pub fn cancel(&mut self) -> bool {
        let Some(stop_tx) = self.stop_tx.take() else {
            return false;
        };
        let _ = stop_tx.send(());
        if let Some(task) = self.task.take() {
            task.abort();
        }
        debug!(room_id = %self.room_id, "poll loop cancelled");
        true
    }

    /// Returns `true` until the loop is cancelled.
    pub fn is_running(&self) -> bool {
        self.stop_tx.is_some() && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run<F>(
    gateway: HostActionGateway,
    room_id: RoomId,
    interval: Duration,
    on_tick: F,
    mut stop_rx: oneshot::Receiver<()>,
) where
    F: Fn() + Send + 'static,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    // A late tick (e.g. a suspended host) fires once, not in a burst.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                if let Err(e) = gateway.ping(&room_id) {
                    warn!(room_id = %room_id, "presence ping failed: {e}");
                }
                if let Err(e) = gateway.check_room(&room_id) {
                    warn!(room_id = %room_id, "room check failed: {e}");
                }
                on_tick();
            }
        }
    }
    debug!(room_id = %room_id, "poll loop exited");
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
    use crate::channel::EventChannel;
    use crate::config::SpyWordConfig;
    use crate::error::SpyWordError;
    use crate::protocol::ClientEvent;
    use crate::transport::Transport;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
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

    fn setup() -> (HostActionGateway, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let channel = EventChannel::start(
            Recorder {
                sent: Arc::clone(&sent),
            },
            &SpyWordConfig::new("http://localhost:8000"),
        );
        (HostActionGateway::new(channel), sent)
    }

    fn decoded(sent: &Mutex<Vec<String>>) -> Vec<ClientEvent> {
        sent.lock()
            .unwrap()
            .iter()
            .map(|raw| serde_json::from_str(raw).unwrap())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn each_tick_pings_then_checks_room() {
        let (gateway, sent) = setup();
        let room = RoomId::parse("ABC123").unwrap();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);

        let mut poll = PollLoop::spawn(
            gateway.clone(),
            room.clone(),
            Duration::from_millis(2500),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_millis(2400)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2700)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        tokio::task::yield_now().await;

        assert_eq!(
            decoded(&sent),
            [
                ClientEvent::Ping { room_id: room.clone() },
                ClientEvent::CheckRoom { room_id: room.clone() },
                ClientEvent::Ping { room_id: room.clone() },
                ClientEvent::CheckRoom { room_id: room },
            ]
        );

        assert!(poll.cancel());
        gateway.channel().shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_clamped_and_keeps_ticking() {
        let (gateway, _sent) = setup();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);

        let mut poll = PollLoop::spawn(
            gateway.clone(),
            RoomId::parse("ABC123").unwrap(),
            Duration::ZERO,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert_eq!(poll.interval(), MIN_POLL_INTERVAL);

        tokio::time::sleep(Duration::from_millis(55)).await;
        assert!(poll.is_running());
        assert_eq!(ticks.load(Ordering::SeqCst), 5);

        assert!(poll.cancel());
        gateway.channel().shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_effective_exactly_once() {
        let (gateway, _sent) = setup();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);

        let mut poll = PollLoop::spawn(
            gateway.clone(),
            RoomId::parse("ABC123").unwrap(),
            Duration::from_secs(1),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert!(poll.is_running());

        assert!(poll.cancel());
        assert!(!poll.cancel());
        assert!(!poll.is_running());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        gateway.channel().shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_ticking() {
        let (gateway, _sent) = setup();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);

        let poll = PollLoop::spawn(
            gateway.clone(),
            RoomId::parse("ABC123").unwrap(),
            Duration::from_secs(1),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        drop(poll);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        gateway.channel().shutdown().await;
    }
}
