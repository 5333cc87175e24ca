//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by SoundTouch firmware and changing them would
//! break compatibility with real devices. Tunable defaults live in
//! [`crate::connection::ConnectionConfig`].

// ─────────────────────────────────────────────────────────────────────────────
// Ports
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP control API port exposed by every SoundTouch speaker.
pub const DEVICE_HTTP_PORT: u16 = 8090;

/// WebSocket push notification port (root path).
///
/// Distinct from the HTTP control port.
pub const DEVICE_WS_PORT: u16 = 8080;

/// WebSocket subprotocol the firmware requires in the handshake.
///
/// Speakers reject upgrade requests that do not offer it.
pub const WS_SUBPROTOCOL: &str = "gabbo";

// ─────────────────────────────────────────────────────────────────────────────
// Push Event Wire Format
// ─────────────────────────────────────────────────────────────────────────────

/// Root element of every push event envelope.
pub const UPDATES_ELEMENT: &str = "updates";

/// Attribute on the envelope identifying the source device.
pub const DEVICE_ID_ATTRIBUTE: &str = "deviceID";

/// Greeting the device sends once per WebSocket session.
///
/// Not an `updates` envelope; the codec rejects it and the read-loop logs it
/// at debug level.
pub const SDK_INFO_ELEMENT: &str = "SoundTouchSdkInfo";

// ─────────────────────────────────────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────────────────────────────────────

/// Timeout for HTTP requests to the speaker (seconds).
///
/// 10 seconds is reasonable for LAN operations.
pub const HTTP_TIMEOUT_SECS: u64 = 10;

/// Sender name used in key press requests.
///
/// Speakers only honor key presses from this sender.
pub const KEY_SENDER: &str = "Gabbo";

// ─────────────────────────────────────────────────────────────────────────────
// Value Ranges
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum volume level accepted by `/volume`.
pub const MAX_VOLUME: u8 = 100;

/// Lowest bass level accepted by `/bass`.
pub const MIN_BASS: i8 = -9;

/// Highest bass level accepted by `/bass`.
pub const MAX_BASS: i8 = 9;

/// Number of preset slots on the device.
pub const PRESET_SLOTS: u8 = 6;

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket Defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Delay between reconnection attempts (seconds).
pub const DEFAULT_RECONNECT_INTERVAL_SECS: u64 = 5;

/// Maximum reconnection attempts. Zero retries forever.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 0;

/// Interval between keep-alive pings (seconds).
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 30;

/// Write deadline for pings and outbound messages (seconds).
pub const DEFAULT_PONG_TIMEOUT_SECS: u64 = 10;

/// Inactivity window after which the read-loop treats the peer as dead (seconds).
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;

/// Upper bound on the WebSocket handshake (seconds).
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// Default read and write buffer size for the WebSocket (bytes).
pub const DEFAULT_WS_BUFFER_SIZE: usize = 1024;

/// How long `disconnect()` waits for background tasks to exit (milliseconds).
pub const TASK_SHUTDOWN_TIMEOUT_MS: u64 = 2000;

// ─────────────────────────────────────────────────────────────────────────────
// Simulator
// ─────────────────────────────────────────────────────────────────────────────

/// Capacity of the simulator's update broadcast channel.
///
/// Slow WebSocket clients that fall further behind skip frames.
pub const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Error code the firmware uses for rejected request bodies.
pub const CLIENT_XML_ERROR_CODE: u32 = 1019;

/// Error name paired with [`CLIENT_XML_ERROR_CODE`].
pub const CLIENT_XML_ERROR_NAME: &str = "CLIENT_XML_ERROR";
