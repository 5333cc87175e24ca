//! Lifecycle of one device's WebSocket push channel.
//!
//! An [`EventConnection`] moves through
//! `Disconnected → Connecting → Connected → (Reconnecting | Disconnected)`.
//! While connected it owns two background tasks bound to one cancellation
//! token: a read-loop that decodes and dispatches frames, and a keep-alive
//! loop that pings the device. When the read-loop sees the socket die it
//! tears the session down and, if enabled, runs the reconnection loop.
//!
//! All mutable handle state sits behind a single `parking_lot::RwLock` that
//! is only held for swaps, never across socket I/O.

use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::config::{ConfigError, ConnectionConfig};
use super::reconnect::{self, ReconnectOutcome, ReconnectPolicy};
use crate::device::{Bass, ConnectionState, NowPlaying, Preset, Volume, Zone};
use crate::events::{decode, dispatch, DecodeError, Envelope, EventHandlers};
use crate::logging::sink_log;
use crate::protocol_constants::{DEVICE_WS_PORT, SDK_INFO_ELEMENT, TASK_SHUTDOWN_TIMEOUT_MS};

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors returned synchronously by [`EventConnection`] operations.
///
/// Failures inside the background tasks never surface here; they go to the
/// configured log sink.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// `connect()` while a connection is open or being established.
    #[error("already connected")]
    AlreadyConnected,

    /// Operation needs a live socket and there is none.
    #[error("not connected")]
    NotConnected,

    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Target URL or handshake headers could not be built.
    #[error("invalid WebSocket request: {0}")]
    InvalidRequest(String),

    /// Dial and handshake did not finish in time.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// Transport-level WebSocket failure.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// A write did not complete before its deadline.
    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// Outbound payload was not UTF-8 text.
    #[error("message is not valid UTF-8")]
    InvalidMessage,

    /// `disconnect()` interrupted the attempt.
    #[error("connection attempt cancelled")]
    Cancelled,
}

/// Convenient Result alias for connection operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

impl ConnectionError {
    /// Returns true for transport failures worth retrying.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectionError::HandshakeTimeout(_)
                | ConnectionError::WebSocket(_)
                | ConnectionError::WriteTimeout(_)
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle state of an [`EventConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SharedWriter = Arc<AsyncMutex<SplitSink<WsStream, Message>>>;

/// One live socket and the tasks serving it.
///
/// Present in [`HandleState`] exactly while the phase is `Connected`.
struct Session {
    id: u64,
    writer: SharedWriter,
    /// Child of the handle token; cancelled when this socket goes away.
    cancel: CancellationToken,
    reader: JoinHandle<()>,
    keepalive: JoinHandle<()>,
}

struct HandleState {
    phase: ConnectionPhase,
    session: Option<Session>,
    reconnect_enabled: bool,
    /// Cancelled by `disconnect()`; observed by every task and retry.
    cancel: CancellationToken,
    handlers: EventHandlers,
    config: ConnectionConfig,
    next_session_id: u64,
}

struct Shared {
    host: String,
    url: String,
    state: RwLock<HandleState>,
    phase_tx: watch::Sender<ConnectionPhase>,
}

/// Cancels everything when the last [`EventConnection`] clone is dropped.
struct Teardown(Arc<Shared>);

/// Non-owning handle to an [`EventConnection`].
///
/// Does not keep the connection alive; use it inside callbacks.
#[derive(Clone)]
pub struct WeakEventConnection {
    shared: Weak<Shared>,
    teardown: Weak<Teardown>,
}

impl WeakEventConnection {
    /// Returns the connection if any strong handle is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<EventConnection> {
        Some(EventConnection {
            _teardown: self.teardown.upgrade()?,
            shared: self.shared.upgrade()?,
        })
    }
}

impl std::fmt::Debug for WeakEventConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakEventConnection")
            .field("alive", &(self.teardown.strong_count() > 0))
            .finish()
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.0.release();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public handle
// ─────────────────────────────────────────────────────────────────────────────

/// Handle for one device's push event channel.
///
/// Cheap to clone; clones share state. Usually obtained from
/// [`DeviceClient::event_connection`](crate::device::DeviceClient::event_connection).
///
/// The connection shuts down when the last clone is dropped. Callbacks are
/// owned by the connection, so a callback that needs the handle should
/// capture a [`WeakEventConnection`] from [`downgrade`](Self::downgrade);
/// capturing a clone keeps the connection alive forever.
///
/// # Example
///
/// ```ignore
/// let events = DeviceClient::new("192.168.1.131").event_connection();
/// events.on_volume_updated(|v| println!("volume {}", v.actual));
/// events.connect().await?;
/// events.wait().await;
/// ```
#[derive(Clone)]
pub struct EventConnection {
    shared: Arc<Shared>,
    _teardown: Arc<Teardown>,
}

impl EventConnection {
    /// Creates a handle for `ws://<host>:8080/`.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_port(host, DEVICE_WS_PORT)
    }

    /// Creates a handle for `ws://<host>:<port>/`.
    #[must_use]
    pub fn with_port(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let url = format!("ws://{}:{}/", host, port);
        let (phase_tx, _) = watch::channel(ConnectionPhase::Disconnected);
        let shared = Arc::new(Shared {
            host,
            url,
            state: RwLock::new(HandleState {
                phase: ConnectionPhase::Disconnected,
                session: None,
                reconnect_enabled: false,
                cancel: CancellationToken::new(),
                handlers: EventHandlers::default(),
                config: ConnectionConfig::default(),
                next_session_id: 1,
            }),
            phase_tx,
        });
        Self {
            _teardown: Arc::new(Teardown(Arc::clone(&shared))),
            shared,
        }
    }

    /// Replaces the configuration used by [`connect`](Self::connect).
    #[must_use]
    pub fn with_config(self, config: ConnectionConfig) -> Self {
        self.shared.state.write().config = config;
        self
    }

    /// Returns a handle that does not keep the connection alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakEventConnection {
        WeakEventConnection {
            shared: Arc::downgrade(&self.shared),
            teardown: Arc::downgrade(&self._teardown),
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.shared.host
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Returns a copy of the stored configuration.
    #[must_use]
    pub fn config(&self) -> ConnectionConfig {
        self.shared.state.read().config.clone()
    }

    #[must_use]
    pub fn phase(&self) -> ConnectionPhase {
        self.shared.state.read().phase
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.phase() == ConnectionPhase::Connected
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Opens the socket with the stored configuration.
    ///
    /// # Errors
    ///
    /// `AlreadyConnected` unless the handle is `Disconnected`; a transport
    /// error if dial or handshake fail (the handle is `Disconnected` again).
    pub async fn connect(&self) -> ConnectionResult<()> {
        let config = self.config();
        self.connect_with_config(config).await
    }

    /// Stores `config` and opens the socket with it.
    ///
    /// # Errors
    ///
    /// Same as [`connect`](Self::connect), plus `Config` for invalid values.
    pub async fn connect_with_config(&self, config: ConnectionConfig) -> ConnectionResult<()> {
        config.validate()?;

        let cancel = {
            let mut state = self.shared.state.write();
            if state.phase != ConnectionPhase::Disconnected {
                return Err(ConnectionError::AlreadyConnected);
            }
            state.reconnect_enabled = config.reconnect;
            state.config = config.clone();
            state.cancel = CancellationToken::new();
            self.shared.set_phase(&mut state, ConnectionPhase::Connecting);
            state.cancel.clone()
        };

        sink_log!(config.logger, Info, "Connecting to {}", self.shared.url);

        let result = match self.shared.dial(&config, &cancel).await {
            Ok(stream) => self.shared.install(stream, &cancel),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            sink_log!(config.logger, Warn, "Connection to {} failed: {}", self.shared.url, e);
            let mut state = self.shared.state.write();
            if state.phase == ConnectionPhase::Connecting {
                state.reconnect_enabled = false;
                self.shared.set_phase(&mut state, ConnectionPhase::Disconnected);
            }
        }
        result
    }

    /// Closes the socket and stops reconnecting.
    ///
    /// On return both background tasks have exited and no further callbacks
    /// will run.
    ///
    /// # Errors
    ///
    /// `NotConnected` when there is no live socket. Called during a
    /// reconnection backoff or an in-flight connect, it still cancels that
    /// work (the handle ends up `Disconnected`) before reporting the error.
    pub async fn disconnect(&self) -> ConnectionResult<()> {
        let (session, config) = {
            let mut state = self.shared.state.write();
            if state.phase == ConnectionPhase::Disconnected {
                return Err(ConnectionError::NotConnected);
            }
            state.reconnect_enabled = false;
            state.cancel.cancel();
            let session = state.session.take();
            self.shared.set_phase(&mut state, ConnectionPhase::Disconnected);
            (session, state.config.clone())
        };

        let Some(session) = session else {
            sink_log!(config.logger, Info, "Cancelled pending connection to {}", self.shared.url);
            return Err(ConnectionError::NotConnected);
        };

        session.shutdown(&config).await;
        sink_log!(config.logger, Info, "Disconnected from {}", self.shared.url);
        Ok(())
    }

    /// Resolves once the handle is `Disconnected`.
    ///
    /// Returns immediately on a handle that was never connected. A dropped
    /// connection that is being retried keeps this pending.
    pub async fn wait(&self) {
        let mut rx = self.shared.phase_tx.subscribe();
        let _ = rx
            .wait_for(|phase| *phase == ConnectionPhase::Disconnected)
            .await;
    }

    /// Sends a text frame to the device.
    ///
    /// # Errors
    ///
    /// `NotConnected` without a live socket, `InvalidMessage` for non UTF-8
    /// payloads, or a transport error.
    pub async fn send_message(&self, payload: &[u8]) -> ConnectionResult<()> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| ConnectionError::InvalidMessage)?
            .to_string();

        let (writer, timeout) = {
            let state = self.shared.state.read();
            match &state.session {
                Some(session) => (Arc::clone(&session.writer), state.config.pong_timeout),
                None => return Err(ConnectionError::NotConnected),
            }
        };

        let sent = tokio::time::timeout(timeout, async {
            writer.lock().await.send(Message::Text(text.into())).await
        })
        .await;

        match sent {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::WebSocket(e.to_string())),
            Err(_) => Err(ConnectionError::WriteTimeout(timeout)),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Handlers
    // ─────────────────────────────────────────────────────────────────────────

    /// Replaces the whole callback table.
    ///
    /// Callbacks must not capture a strong clone of this handle; see
    /// [`downgrade`](Self::downgrade).
    pub fn set_handlers(&self, handlers: EventHandlers) {
        self.shared.state.write().handlers = handlers;
    }

    /// Returns a snapshot of the callback table.
    #[must_use]
    pub fn handlers(&self) -> EventHandlers {
        self.shared.state.read().handlers.clone()
    }

    // The `on_*` setters replace one slot. Closures that need the handle
    // capture `downgrade()`, otherwise the handle never drops.

    pub fn on_now_playing(&self, f: impl Fn(&NowPlaying) + Send + Sync + 'static) {
        self.shared.state.write().handlers.now_playing = Some(Arc::new(f));
    }

    pub fn on_volume_updated(&self, f: impl Fn(&Volume) + Send + Sync + 'static) {
        self.shared.state.write().handlers.volume = Some(Arc::new(f));
    }

    pub fn on_connection_state_updated(
        &self,
        f: impl Fn(&ConnectionState) + Send + Sync + 'static,
    ) {
        self.shared.state.write().handlers.connection_state = Some(Arc::new(f));
    }

    pub fn on_preset_updated(&self, f: impl Fn(&Preset) + Send + Sync + 'static) {
        self.shared.state.write().handlers.preset = Some(Arc::new(f));
    }

    pub fn on_zone_updated(&self, f: impl Fn(&Zone) + Send + Sync + 'static) {
        self.shared.state.write().handlers.zone = Some(Arc::new(f));
    }

    pub fn on_bass_updated(&self, f: impl Fn(&Bass) + Send + Sync + 'static) {
        self.shared.state.write().handlers.bass = Some(Arc::new(f));
    }

    /// Sets the catch-all for envelopes with no recognized sub-event.
    pub fn on_unknown_event(&self, f: impl Fn(&Envelope) + Send + Sync + 'static) {
        self.shared.state.write().handlers.unknown = Some(Arc::new(f));
    }
}

impl std::fmt::Debug for EventConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventConnection")
            .field("url", &self.shared.url)
            .field("phase", &self.phase())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internals
// ─────────────────────────────────────────────────────────────────────────────

impl Shared {
    fn set_phase(&self, state: &mut HandleState, phase: ConnectionPhase) {
        state.phase = phase;
        self.phase_tx.send_replace(phase);
    }

    /// Dials the device and completes the WebSocket handshake.
    async fn dial(
        &self,
        config: &ConnectionConfig,
        cancel: &CancellationToken,
    ) -> ConnectionResult<WsStream> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| ConnectionError::InvalidRequest(e.to_string()))?;
        if let Some(protocol) = &config.subprotocol {
            let value = HeaderValue::from_str(protocol)
                .map_err(|e| ConnectionError::InvalidRequest(e.to_string()))?;
            request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
        }

        let handshake = connect_async_with_config(request, Some(config.websocket_config()), true);
        tokio::select! {
            _ = cancel.cancelled() => Err(ConnectionError::Cancelled),
            result = tokio::time::timeout(config.handshake_timeout, handshake) => match result {
                Ok(Ok((stream, _response))) => Ok(stream),
                Ok(Err(e)) => Err(ConnectionError::WebSocket(e.to_string())),
                Err(_) => Err(ConnectionError::HandshakeTimeout(config.handshake_timeout)),
            },
        }
    }

    /// Registers a freshly dialed socket and starts its tasks.
    ///
    /// Fails with `Cancelled` if `disconnect()` ran while dialing; the socket
    /// is dropped in that case.
    fn install(self: &Arc<Self>, stream: WsStream, cancel: &CancellationToken) -> ConnectionResult<()> {
        let (writer, reader) = stream.split();
        let writer: SharedWriter = Arc::new(AsyncMutex::new(writer));

        let mut state = self.state.write();
        if cancel.is_cancelled() {
            return Err(ConnectionError::Cancelled);
        }

        let id = state.next_session_id;
        state.next_session_id += 1;
        let session_cancel = cancel.child_token();
        let config = state.config.clone();

        let reader = tokio::spawn(read_loop(
            Arc::clone(self),
            reader,
            session_cancel.clone(),
            id,
            config.clone(),
        ));
        let keepalive = tokio::spawn(keepalive_loop(
            Arc::clone(&writer),
            session_cancel.clone(),
            config.clone(),
        ));

        state.session = Some(Session {
            id,
            writer,
            cancel: session_cancel,
            reader,
            keepalive,
        });
        self.set_phase(&mut state, ConnectionPhase::Connected);
        sink_log!(config.logger, Info, "Connected to {} (session {})", self.url, id);
        Ok(())
    }

    /// Decodes one text frame and dispatches it.
    fn handle_frame(&self, raw: &[u8], config: &ConnectionConfig) {
        match decode(raw) {
            Ok(envelope) => {
                let handlers = self.state.read().handlers.clone();
                if !envelope.has_recognized() {
                    let names: Vec<&str> = envelope.unknown_names().collect();
                    sink_log!(
                        config.logger,
                        Debug,
                        "Unhandled update from {}: {:?}",
                        envelope.device_id,
                        names
                    );
                }
                dispatch(&envelope, &handlers);
            }
            Err(DecodeError::UnexpectedRoot(root)) if root == SDK_INFO_ELEMENT => {
                sink_log!(config.logger, Debug, "Received {} greeting", root);
            }
            Err(e) => {
                sink_log!(config.logger, Warn, "Dropping undecodable frame: {}", e);
            }
        }
    }

    /// Tears down session `session_id` after its socket died.
    ///
    /// Runs on that session's read-loop task. A session already replaced or
    /// removed by `disconnect()` is left alone.
    async fn session_lost(self: Arc<Self>, session_id: u64, reason: String) {
        let (session, reconnect, cancel, config) = {
            let mut state = self.state.write();
            if state.session.as_ref().map(|s| s.id) != Some(session_id) {
                return;
            }
            let session = state.session.take();
            let next = if state.reconnect_enabled {
                ConnectionPhase::Reconnecting
            } else {
                ConnectionPhase::Disconnected
            };
            self.set_phase(&mut state, next);
            (
                session,
                state.reconnect_enabled,
                state.cancel.clone(),
                state.config.clone(),
            )
        };

        sink_log!(config.logger, Warn, "Connection to {} lost: {}", self.url, reason);

        if let Some(Session {
            writer,
            cancel: session_cancel,
            keepalive,
            ..
        }) = session
        {
            session_cancel.cancel();
            close_writer(&writer, config.pong_timeout).await;
            join_with_timeout(keepalive, &config, "keep-alive").await;
        }

        if reconnect {
            self.reconnect(cancel, config).await;
        }
    }

    /// Runs the reconnection loop until it connects, gives up or is cancelled.
    async fn reconnect(self: &Arc<Self>, cancel: CancellationToken, config: ConnectionConfig) {
        let policy = ReconnectPolicy::from(&config);
        sink_log!(
            config.logger,
            Info,
            "Reconnecting to {} every {:?} (max attempts: {})",
            self.url,
            policy.interval,
            if policy.max_attempts == 0 {
                "unlimited".to_string()
            } else {
                policy.max_attempts.to_string()
            }
        );

        let outcome = reconnect::run(
            policy,
            config.clock.as_ref(),
            &cancel,
            |attempt| {
                let shared = Arc::clone(self);
                let cancel = cancel.clone();
                let config = config.clone();
                async move {
                    sink_log!(config.logger, Debug, "Reconnect attempt {} to {}", attempt, shared.url);
                    let stream = shared.dial(&config, &cancel).await?;
                    shared.install(stream, &cancel)
                }
            },
            |attempt, err| {
                if err.is_transient() {
                    sink_log!(config.logger, Warn, "Reconnect attempt {} failed: {}", attempt, err);
                } else {
                    sink_log!(config.logger, Error, "Reconnect attempt {} failed: {}", attempt, err);
                }
            },
        )
        .await;

        match outcome {
            ReconnectOutcome::Connected { attempts } => {
                sink_log!(config.logger, Info, "Reconnected to {} after {} attempt(s)", self.url, attempts);
            }
            ReconnectOutcome::Exhausted { attempts } => {
                {
                    let mut state = self.state.write();
                    if state.phase == ConnectionPhase::Reconnecting {
                        state.reconnect_enabled = false;
                        self.set_phase(&mut state, ConnectionPhase::Disconnected);
                    }
                }
                sink_log!(config.logger, Error, "Giving up on {} after {} attempt(s)", self.url, attempts);
            }
            ReconnectOutcome::Cancelled { attempts } => {
                sink_log!(config.logger, Debug, "Reconnection to {} cancelled after {} attempt(s)", self.url, attempts);
            }
        }
    }

    /// Cancels all work without awaiting it. Used when the last handle drops.
    fn release(&self) {
        let mut state = self.state.write();
        state.reconnect_enabled = false;
        state.cancel.cancel();
        if let Some(session) = state.session.take() {
            session.cancel.cancel();
        }
        if state.phase != ConnectionPhase::Disconnected {
            self.set_phase(&mut state, ConnectionPhase::Disconnected);
        }
    }
}

impl Session {
    /// Stops both tasks and closes the socket.
    ///
    /// Must not run on the session's own read-loop task.
    async fn shutdown(self, config: &ConnectionConfig) {
        self.cancel.cancel();
        close_writer(&self.writer, config.pong_timeout).await;
        join_with_timeout(self.reader, config, "read-loop").await;
        join_with_timeout(self.keepalive, config, "keep-alive").await;
    }
}

async fn close_writer(writer: &SharedWriter, timeout: Duration) {
    let _ = tokio::time::timeout(timeout, async { writer.lock().await.close().await }).await;
}

async fn join_with_timeout(mut handle: JoinHandle<()>, config: &ConnectionConfig, name: &str) {
    let limit = Duration::from_millis(TASK_SHUTDOWN_TIMEOUT_MS);
    if tokio::time::timeout(limit, &mut handle).await.is_err() {
        sink_log!(config.logger, Warn, "{} task did not stop within {:?}, aborting", name, limit);
        handle.abort();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Background tasks
// ─────────────────────────────────────────────────────────────────────────────

/// Receives frames until the socket fails, the deadline passes or the
/// session is cancelled.
async fn read_loop(
    shared: Arc<Shared>,
    mut reader: SplitStream<WsStream>,
    cancel: CancellationToken,
    session_id: u64,
    config: ConnectionConfig,
) {
    let reason = loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return,
            frame = tokio::time::timeout(config.read_timeout, reader.next()) => frame,
        };

        match frame {
            Err(_) => break format!("no frame received within {:?}", config.read_timeout),
            Ok(None) => break "stream ended".to_string(),
            Ok(Some(Err(e))) => break format!("read failed: {}", e),
            Ok(Some(Ok(Message::Text(text)))) => {
                if cancel.is_cancelled() {
                    return;
                }
                shared.handle_frame(text.as_str().as_bytes(), &config);
            }
            Ok(Some(Ok(Message::Close(frame)))) => {
                break match frame {
                    Some(frame) => format!("closed by peer ({}: {})", frame.code, frame.reason.as_str()),
                    None => "closed by peer".to_string(),
                };
            }
            Ok(Some(Ok(Message::Binary(data)))) => {
                sink_log!(config.logger, Trace, "Ignoring {}-byte binary frame", data.len());
            }
            Ok(Some(Ok(_))) => {}
        }
    };

    shared.session_lost(session_id, reason).await;
}

/// Sends a ping every `ping_interval` until cancelled or a ping fails.
///
/// A failed ping only ends this loop; the read deadline detects the dead
/// peer.
async fn keepalive_loop(writer: SharedWriter, cancel: CancellationToken, config: ConnectionConfig) {
    let start = tokio::time::Instant::now() + config.ping_interval;
    let mut ticker = tokio::time::interval_at(start, config.ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let sent = tokio::time::timeout(config.pong_timeout, async {
            writer.lock().await.send(Message::Ping(Bytes::new())).await
        })
        .await;

        match sent {
            Ok(Ok(())) => sink_log!(config.logger, Trace, "Ping sent"),
            Ok(Err(e)) => {
                sink_log!(config.logger, Warn, "Keep-alive ping failed: {}", e);
                return;
            }
            Err(_) => {
                sink_log!(config.logger, Warn, "Keep-alive ping timed out after {:?}", config.pong_timeout);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::encode_updates;
    use crate::events::DeviceEvent;
    use crate::test_fixtures::{SDK_INFO, VOLUME_UPDATED};
    use crate::test_support::{closed_port, eventually, next_text, ws_listener, RecordingSink};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    const LIMIT: Duration = Duration::from_secs(5);

    fn test_config() -> ConnectionConfig {
        ConnectionConfig::default()
            .with_subprotocol(None)
            .with_reconnect(false)
            .with_logger(Arc::new(RecordingSink::default()))
    }

    fn volume_frame(level: u8) -> String {
        encode_updates(
            "X",
            &[DeviceEvent::Volume(Volume {
                device_id: "X".into(),
                target: level,
                actual: level,
                mute_enabled: false,
            })],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn disconnect_without_connect_is_an_error() {
        let connection = EventConnection::new("127.0.0.1");
        assert!(matches!(
            connection.disconnect().await,
            Err(ConnectionError::NotConnected)
        ));
        assert!(matches!(
            connection.disconnect().await,
            Err(ConnectionError::NotConnected)
        ));
        assert_eq!(connection.phase(), ConnectionPhase::Disconnected);
    }

    #[tokio::test]
    async fn connect_twice_fails_and_disconnect_twice_fails() {
        let (port, mut accepted) = ws_listener().await;
        let connection = EventConnection::with_port("127.0.0.1", port).with_config(test_config());

        connection.connect().await.unwrap();
        let _server = accepted.recv().await.unwrap();
        assert!(connection.is_connected());

        assert!(matches!(
            connection.connect().await,
            Err(ConnectionError::AlreadyConnected)
        ));
        assert!(connection.is_connected());

        connection.disconnect().await.unwrap();
        assert!(!connection.is_connected());
        assert!(matches!(
            connection.disconnect().await,
            Err(ConnectionError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn failed_dial_reverts_to_disconnected() {
        let port = closed_port().await;
        let connection = EventConnection::with_port("127.0.0.1", port);

        let result = connection.connect_with_config(test_config()).await;

        assert!(result.is_err());
        assert_eq!(connection.phase(), ConnectionPhase::Disconnected);
        assert!(matches!(
            connection.disconnect().await,
            Err(ConnectionError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_dialing() {
        let connection = EventConnection::new("127.0.0.1");
        let config = test_config().with_read_timeout(Duration::ZERO);

        assert!(matches!(
            connection.connect_with_config(config).await,
            Err(ConnectionError::Config(_))
        ));
        assert_eq!(connection.phase(), ConnectionPhase::Disconnected);
    }

    #[tokio::test]
    async fn dispatches_pushed_frames_in_order() {
        let (port, mut accepted) = ws_listener().await;
        let connection = EventConnection::with_port("127.0.0.1", port).with_config(test_config());
        let (tx, mut rx) = mpsc::unbounded_channel();
        connection.on_volume_updated(move |v| {
            let _ = tx.send(v.actual);
        });

        connection.connect().await.unwrap();
        let mut server = accepted.recv().await.unwrap();
        for level in [10, 20, 30] {
            server.send(Message::Text(volume_frame(level).into())).await.unwrap();
        }

        let mut received = Vec::new();
        for _ in 0..3 {
            received.push(tokio::time::timeout(LIMIT, rx.recv()).await.unwrap().unwrap());
        }
        assert_eq!(received, vec![10, 20, 30]);

        connection.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn malformed_frame_keeps_connection_open() {
        let (port, mut accepted) = ws_listener().await;
        let sink = Arc::new(RecordingSink::default());
        let connection = EventConnection::with_port("127.0.0.1", port)
            .with_config(test_config().with_logger(sink.clone()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        connection.on_volume_updated(move |v| {
            let _ = tx.send(v.clone());
        });

        connection.connect().await.unwrap();
        let mut server = accepted.recv().await.unwrap();
        server.send(Message::Text(SDK_INFO.into())).await.unwrap();
        server.send(Message::Text("<invalid xml>".into())).await.unwrap();
        server.send(Message::Binary(Bytes::from_static(b"\x00\x01"))).await.unwrap();
        server.send(Message::Text(VOLUME_UPDATED.into())).await.unwrap();

        let volume = tokio::time::timeout(LIMIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(volume.device_id, "X");
        assert_eq!(volume.target, 25);
        assert!(connection.is_connected());
        assert!(sink.contains("Dropping undecodable frame"));

        connection.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_envelope_reaches_catch_all() {
        let (port, mut accepted) = ws_listener().await;
        let connection = EventConnection::with_port("127.0.0.1", port).with_config(test_config());
        let (tx, mut rx) = mpsc::unbounded_channel();
        connection.set_handlers(EventHandlers::new().on_unknown_event(move |e| {
            let _ = tx.send(e.device_id.clone());
        }));

        connection.connect().await.unwrap();
        let mut server = accepted.recv().await.unwrap();
        server
            .send(Message::Text(r#"<updates deviceID="Z"><infoUpdated/></updates>"#.into()))
            .await
            .unwrap();

        let id = tokio::time::timeout(LIMIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(id, "Z");
        connection.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn no_callbacks_after_disconnect() {
        let (port, mut accepted) = ws_listener().await;
        let connection = EventConnection::with_port("127.0.0.1", port).with_config(test_config());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        connection.on_volume_updated(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        connection.connect().await.unwrap();
        let mut server = accepted.recv().await.unwrap();
        server.send(Message::Text(volume_frame(1).into())).await.unwrap();
        assert!(eventually(LIMIT, || calls.load(Ordering::SeqCst) == 1).await);

        connection.disconnect().await.unwrap();
        let after_disconnect = calls.load(Ordering::SeqCst);

        for level in 2..10 {
            let _ = server.send(Message::Text(volume_frame(level).into())).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(calls.load(Ordering::SeqCst), after_disconnect);
    }

    #[tokio::test]
    async fn send_message_reaches_device() {
        let (port, mut accepted) = ws_listener().await;
        let connection = EventConnection::with_port("127.0.0.1", port).with_config(test_config());

        assert!(matches!(
            connection.send_message(b"<msg/>").await,
            Err(ConnectionError::NotConnected)
        ));

        connection.connect().await.unwrap();
        let mut server = accepted.recv().await.unwrap();

        connection.send_message(b"<msg>hello</msg>").await.unwrap();
        let text = tokio::time::timeout(LIMIT, next_text(&mut server)).await.unwrap();
        assert_eq!(text.as_deref(), Some("<msg>hello</msg>"));

        assert!(matches!(
            connection.send_message(&[0xff, 0xfe]).await,
            Err(ConnectionError::InvalidMessage)
        ));
        connection.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn keepalive_sends_pings() {
        let (port, mut accepted) = ws_listener().await;
        let connection = EventConnection::with_port("127.0.0.1", port)
            .with_config(test_config().with_ping_interval(Duration::from_millis(30)));

        connection.connect().await.unwrap();
        let mut server = accepted.recv().await.unwrap();

        let ping = tokio::time::timeout(LIMIT, async {
            while let Some(Ok(message)) = server.next().await {
                if message.is_ping() {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap();
        assert!(ping);

        connection.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn read_deadline_drops_silent_peer() {
        let (port, mut accepted) = ws_listener().await;
        let connection = EventConnection::with_port("127.0.0.1", port)
            .with_config(test_config().with_read_timeout(Duration::from_millis(100)));

        connection.connect().await.unwrap();
        let _silent = accepted.recv().await.unwrap();

        tokio::time::timeout(LIMIT, connection.wait()).await.unwrap();
        assert_eq!(connection.phase(), ConnectionPhase::Disconnected);
        assert!(matches!(
            connection.disconnect().await,
            Err(ConnectionError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn peer_close_without_reconnect_ends_wait() {
        let (port, mut accepted) = ws_listener().await;
        let connection = EventConnection::with_port("127.0.0.1", port).with_config(test_config());

        connection.connect().await.unwrap();
        let mut server = accepted.recv().await.unwrap();
        server.close(None).await.unwrap();

        tokio::time::timeout(LIMIT, connection.wait()).await.unwrap();
        assert!(!connection.is_connected());
    }

    #[tokio::test]
    async fn reconnects_after_peer_close() {
        let (port, mut accepted) = ws_listener().await;
        let sink = Arc::new(RecordingSink::default());
        let config = test_config()
            .with_reconnect(true)
            .with_reconnect_interval(Duration::from_millis(20))
            .with_logger(sink.clone());
        let connection = EventConnection::with_port("127.0.0.1", port).with_config(config);
        let (tx, mut rx) = mpsc::unbounded_channel();
        connection.on_volume_updated(move |v| {
            let _ = tx.send(v.actual);
        });

        connection.connect().await.unwrap();
        let mut first = accepted.recv().await.unwrap();
        first.close(None).await.unwrap();
        drop(first);

        let mut second = tokio::time::timeout(LIMIT, accepted.recv()).await.unwrap().unwrap();
        assert!(eventually(LIMIT, || connection.is_connected()).await);

        second.send(Message::Text(volume_frame(42).into())).await.unwrap();
        assert_eq!(tokio::time::timeout(LIMIT, rx.recv()).await.unwrap(), Some(42));
        assert!(sink.contains("Reconnected"));

        connection.disconnect().await.unwrap();
        tokio::time::timeout(LIMIT, connection.wait()).await.unwrap();
    }

    #[tokio::test]
    async fn reconnection_gives_up_after_cap() {
        let (port, mut accepted) = ws_listener().await;
        let config = test_config()
            .with_reconnect(true)
            .with_reconnect_interval(Duration::from_millis(10))
            .with_max_reconnect_attempts(2)
            .with_handshake_timeout(Duration::from_millis(500));
        let connection = EventConnection::with_port("127.0.0.1", port).with_config(config);

        connection.connect().await.unwrap();
        let mut server = accepted.recv().await.unwrap();
        // Stop accepting so every retry fails.
        drop(accepted);
        server.close(None).await.unwrap();

        tokio::time::timeout(LIMIT, connection.wait()).await.unwrap();
        assert_eq!(connection.phase(), ConnectionPhase::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_during_backoff_cancels_retries() {
        let (port, mut accepted) = ws_listener().await;
        let config = test_config()
            .with_reconnect(true)
            .with_reconnect_interval(Duration::from_secs(3600));
        let connection = EventConnection::with_port("127.0.0.1", port).with_config(config);

        connection.connect().await.unwrap();
        let mut server = accepted.recv().await.unwrap();
        server.close(None).await.unwrap();
        assert!(
            eventually(LIMIT, || connection.phase() == ConnectionPhase::Reconnecting).await
        );

        assert!(matches!(
            connection.disconnect().await,
            Err(ConnectionError::NotConnected)
        ));
        tokio::time::timeout(LIMIT, connection.wait()).await.unwrap();
        assert_eq!(connection.phase(), ConnectionPhase::Disconnected);
    }

    #[tokio::test]
    async fn handler_setters_edit_single_slots() {
        let connection = EventConnection::new("127.0.0.1");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        connection.on_bass_updated(move |b| s.lock().push(format!("bass {}", b.actual)));
        let s = Arc::clone(&seen);
        connection.on_zone_updated(move |_| s.lock().push("zone".to_string()));

        let handlers = connection.handlers();
        assert!(handlers.bass.is_some());
        assert!(handlers.zone.is_some());
        assert!(handlers.volume.is_none());

        connection.set_handlers(EventHandlers::new());
        assert!(connection.handlers().bass.is_none());
    }

    #[tokio::test]
    async fn dropping_last_handle_stops_tasks() {
        let (port, mut accepted) = ws_listener().await;
        let connection = EventConnection::with_port("127.0.0.1", port).with_config(test_config());
        connection.connect().await.unwrap();
        let mut server = accepted.recv().await.unwrap();

        drop(connection);

        let ended = tokio::time::timeout(LIMIT, async {
            while let Some(Ok(_)) = server.next().await {}
        })
        .await;
        assert!(ended.is_ok());
    }

    #[test]
    fn transport_failures_are_transient() {
        assert!(ConnectionError::HandshakeTimeout(Duration::from_secs(1)).is_transient());
        assert!(ConnectionError::WebSocket("reset".into()).is_transient());
        assert!(ConnectionError::WriteTimeout(Duration::from_secs(1)).is_transient());
        assert!(!ConnectionError::InvalidRequest("bad url".into()).is_transient());
        assert!(!ConnectionError::Cancelled.is_transient());
        assert!(!ConnectionError::AlreadyConnected.is_transient());
    }

    #[tokio::test]
    async fn callback_holding_weak_handle_does_not_keep_connection_alive() {
        let (port, mut accepted) = ws_listener().await;
        let connection = EventConnection::with_port("127.0.0.1", port).with_config(test_config());
        let weak = connection.downgrade();
        let (tx, mut rx) = mpsc::unbounded_channel();
        connection.on_volume_updated(move |_| {
            let connected = weak.upgrade().map(|c| c.is_connected());
            let _ = tx.send(connected);
        });

        connection.connect().await.unwrap();
        let mut server = accepted.recv().await.unwrap();
        server.send(Message::Text(volume_frame(5).into())).await.unwrap();
        let seen = tokio::time::timeout(LIMIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(seen, Some(true));

        let weak = connection.downgrade();
        drop(connection);
        assert!(weak.upgrade().is_none());

        let ended = tokio::time::timeout(LIMIT, async {
            while let Some(Ok(_)) = server.next().await {}
        })
        .await;
        assert!(ended.is_ok());
    }
}
