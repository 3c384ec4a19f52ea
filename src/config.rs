//! Client configuration.
//!
//! One [`SpyWordConfig`] covers every deployment variant: where the authority
//! lives, how often the session reconciles, and whether the authority sends
//! a host-left notice.

use std::time::Duration;

/// Default interval between reconciliation ticks.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2500);

/// Lower bound for the poll interval.
pub(crate) const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default time to wait for a create/join acknowledgement.
const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for a single room query.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for a [`SpyWordClient`](crate::SpyWordClient).
///
/// # Example
///
/// ```
/// use spyword_client::SpyWordConfig;
/// use std::time::Duration;
///
/// let config = SpyWordConfig::new("https://spy.example.com")
///     .with_poll_interval(Duration::from_secs(5))
///     .with_host_leave_notice(false);
/// assert_eq!(config.socket_url(), "wss://spy.example.com/socket");
/// assert_eq!(config.api_url("gameHost/gameStatus"), "https://spy.example.com/gameHost/gameStatus");
/// ```
#[derive(Debug, Clone)]
pub struct SpyWordConfig {
    /// Base address of the authority (e.g. `"http://localhost:8000"`).
    /// A trailing slash is removed.
    pub base_address: String,
    /// Interval between reconciliation ticks (presence ping + room check).
    ///
    /// Defaults to **2.5 seconds**. Values below 10 ms are clamped.
    pub poll_interval: Duration,
    /// Whether the authority sends `onHostLeave`. When `false` the session
    /// does not subscribe to it and relies on the room check instead.
    ///
    /// Defaults to **true**.
    pub supports_host_leave_notice: bool,
    /// Capacity of the bounded outbound queue feeding the transport loop.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// How long to wait for `onJoin` / `onCreateRoom` after emitting the request.
    ///
    /// Defaults to **5 seconds**.
    pub ack_timeout: Duration,
    /// Timeout for a single room query.
    ///
    /// Defaults to **10 seconds**.
    pub request_timeout: Duration,
    /// Timeout for the graceful shutdown of the channel's transport loop.
    ///
    /// Defaults to **1 second**. A zero timeout aborts the loop immediately.
    pub shutdown_timeout: Duration,
}

impl SpyWordConfig {
    /// Create a new configuration for the given base address with default values.
    pub fn new(base_address: impl Into<String>) -> Self {
        let base_address: String = base_address.into();
        Self {
            base_address: base_address.trim_end_matches('/').to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            supports_host_leave_notice: true,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the reconciliation interval. Values below 10 ms are clamped.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Enable or disable the `onHostLeave` subscription.
    #[must_use]
    pub fn with_host_leave_notice(mut self, supported: bool) -> Self {
        self.supports_host_leave_notice = supported;
        self
    }

    /// Set the capacity of the outbound queue. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the acknowledgement timeout for create/join.
    #[must_use]
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Set the timeout for a single room query.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// URL of the push channel endpoint (`{base}/socket`, `http` → `ws`).
    pub fn socket_url(&self) -> String {
        let base = if let Some(rest) = self.base_address.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_address.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_address.clone()
        };
        format!("{base}/socket")
    }

    /// URL of a request/response endpoint relative to the base address.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_address, path.trim_start_matches('/'))
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

    #[test]
    fn config_defaults() {
        let config = SpyWordConfig::new("http://localhost:8000/");
        assert_eq!(config.base_address, "http://localhost:8000");
        assert_eq!(config.poll_interval, Duration::from_millis(2500));
        assert!(config.supports_host_leave_notice);
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.ack_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[test]
    fn builder_methods() {
        let config = SpyWordConfig::new("http://localhost:8000")
            .with_poll_interval(Duration::from_secs(1))
            .with_host_leave_notice(false)
            .with_event_channel_capacity(8)
            .with_ack_timeout(Duration::from_millis(300))
            .with_request_timeout(Duration::from_secs(2))
            .with_shutdown_timeout(Duration::from_secs(3));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert!(!config.supports_host_leave_notice);
        assert_eq!(config.event_channel_capacity, 8);
        assert_eq!(config.ack_timeout, Duration::from_millis(300));
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(3));
    }

    #[test]
    fn clamps_degenerate_values() {
        let config = SpyWordConfig::new("http://x")
            .with_poll_interval(Duration::ZERO)
            .with_event_channel_capacity(0);
        assert_eq!(config.poll_interval, MIN_POLL_INTERVAL);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[test]
    fn derives_urls() {
        let config = SpyWordConfig::new("http://localhost:8000");
        assert_eq!(config.socket_url(), "ws://localhost:8000/socket");
        assert_eq!(
            config.api_url("/gameHost/checkMyRoom"),
            "http://localhost:8000/gameHost/checkMyRoom"
        );

        let config = SpyWordConfig::new("ws://relay.local");
        assert_eq!(config.socket_url(), "ws://relay.local/socket");
    }
}
