//! Configuration for push event connections.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::logging::{LogCrateSink, LogSink};
use crate::protocol_constants::{
    DEFAULT_HANDSHAKE_TIMEOUT_SECS, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_PING_INTERVAL_SECS,
    DEFAULT_PONG_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS, DEFAULT_RECONNECT_INTERVAL_SECS,
    DEFAULT_WS_BUFFER_SIZE, WS_SUBPROTOCOL,
};
use crate::runtime::{Clock, TokioClock};

/// A configuration value that cannot work at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid connection config: {0}")]
pub struct ConfigError(pub String);

/// Tunables for an [`EventConnection`](super::EventConnection).
///
/// Defaults match what SoundTouch firmware tolerates: a ping every 30s,
/// a 60s read deadline and an unlimited reconnect loop at 5s intervals.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Reconnect automatically after the socket drops.
    pub reconnect: bool,
    /// Fixed delay before each reconnection attempt.
    pub reconnect_interval: Duration,
    /// Attempts before giving up. Zero retries forever.
    pub max_reconnect_attempts: u32,
    /// Interval between keep-alive pings.
    pub ping_interval: Duration,
    /// Write deadline for pings and outbound messages.
    pub pong_timeout: Duration,
    /// Inactivity window after which the peer is considered dead.
    pub read_timeout: Duration,
    /// Upper bound on dial + WebSocket handshake.
    pub handshake_timeout: Duration,
    pub read_buffer_size: usize,
    pub write_buffer_size: usize,
    /// Subprotocol offered during the handshake.
    pub subprotocol: Option<String>,
    /// Destination for messages from the background tasks.
    pub logger: Arc<dyn LogSink>,
    /// Timer used for the reconnection delay.
    pub clock: Arc<dyn Clock>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect: true,
            reconnect_interval: Duration::from_secs(DEFAULT_RECONNECT_INTERVAL_SECS),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            pong_timeout: Duration::from_secs(DEFAULT_PONG_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            read_buffer_size: DEFAULT_WS_BUFFER_SIZE,
            write_buffer_size: DEFAULT_WS_BUFFER_SIZE,
            subprotocol: Some(WS_SUBPROTOCOL.to_string()),
            logger: LogCrateSink::arc(),
            clock: TokioClock::arc(),
        }
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn with_reconnect(mut self, enabled: bool) -> Self {
        self.reconnect = enabled;
        self
    }

    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    #[must_use]
    pub fn with_pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_buffer_sizes(mut self, read: usize, write: usize) -> Self {
        self.read_buffer_size = read;
        self.write_buffer_size = write;
        self
    }

    /// Sets the handshake subprotocol; `None` offers none.
    #[must_use]
    pub fn with_subprotocol(mut self, subprotocol: Option<String>) -> Self {
        self.subprotocol = subprotocol;
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn LogSink>) -> Self {
        self.logger = logger;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any value would stall or spin the background tasks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("reconnect_interval", self.reconnect_interval),
            ("ping_interval", self.ping_interval),
            ("pong_timeout", self.pong_timeout),
            ("read_timeout", self.read_timeout),
            ("handshake_timeout", self.handshake_timeout),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(ConfigError(format!("{} must be non-zero", name)));
            }
        }
        if self.read_buffer_size == 0 || self.write_buffer_size == 0 {
            return Err(ConfigError("buffer sizes must be >= 1".to_string()));
        }
        if let Some(protocol) = &self.subprotocol {
            if protocol.is_empty() || !protocol.is_ascii() {
                return Err(ConfigError(format!(
                    "subprotocol {:?} is not a valid token",
                    protocol
                )));
            }
        }
        Ok(())
    }

    /// Socket-level settings for tungstenite.
    pub(crate) fn websocket_config(&self) -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        config.read_buffer_size = self.read_buffer_size;
        config.write_buffer_size = self.write_buffer_size;
        config
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("reconnect", &self.reconnect)
            .field("reconnect_interval", &self.reconnect_interval)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("ping_interval", &self.ping_interval)
            .field("pong_timeout", &self.pong_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("read_buffer_size", &self.read_buffer_size)
            .field("write_buffer_size", &self.write_buffer_size)
            .field("subprotocol", &self.subprotocol)
            .finish_non_exhaustive()
    }
}
