//! Simulated SoundTouch speaker.
//!
//! Serves the HTTP control API and the WebSocket push channel on two ports,
//! backed by one [`SimulatedDevice`]. Used by the `soundtouch-server` binary
//! and by this crate's integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::state::{SimulatedDevice, SimulatorConfig};

pub mod http;
pub mod ws;
pub mod ws_connection;

pub use ws_connection::{ClientGuard, ClientInfo, ClientRegistry};

/// Errors that can occur when starting or running the simulator.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind a listener.
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// A listener failed while serving.
    #[error("Server failed: {0}")]
    Serve(#[from] std::io::Error),

    /// Configuration rejected before binding.
    #[error("Invalid simulator config: {0}")]
    Config(String),
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub device: Arc<SimulatedDevice>,
    pub clients: Arc<ClientRegistry>,
}

/// Builder for constructing an `AppState`.
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<SimulatorConfig>,
    device: Option<Arc<SimulatedDevice>>,
    clients: Option<Arc<ClientRegistry>>,
}

impl AppStateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `config` for a fresh device. Ignored if a device is supplied.
    #[must_use]
    pub fn config(mut self, config: SimulatorConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn device(mut self, device: Arc<SimulatedDevice>) -> Self {
        self.device = Some(device);
        self
    }

    #[must_use]
    pub fn clients(mut self, clients: Arc<ClientRegistry>) -> Self {
        self.clients = Some(clients);
        self
    }

    /// Builds the state, defaulting any part not supplied.
    #[must_use]
    pub fn build(self) -> AppState {
        let config = self.config.unwrap_or_default();
        AppState {
            device: self
                .device
                .unwrap_or_else(|| Arc::new(SimulatedDevice::new(config))),
            clients: self.clients.unwrap_or_default(),
        }
    }
}

impl AppState {
    #[must_use]
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }
}

/// A running simulator.
///
/// Dropping the handle leaves the listeners running; call
/// [`shutdown`](Self::shutdown) to stop them.
pub struct SimulatorHandle {
    pub http_addr: SocketAddr,
    pub ws_addr: SocketAddr,
    pub state: AppState,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<std::io::Result<()>>>,
}

impl SimulatorHandle {
    /// Disconnects push clients and stops both listeners.
    ///
    /// # Errors
    ///
    /// Returns the first serve error reported by a listener.
    pub async fn shutdown(self) -> Result<(), ServerError> {
        self.state.clients.disconnect_all();
        self.cancel.cancel();
        self.wait().await
    }

    /// Waits until both listeners stop.
    ///
    /// # Errors
    ///
    /// Returns the first serve error reported by a listener.
    pub async fn wait(self) -> Result<(), ServerError> {
        let mut result = Ok(());
        for task in self.tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if result.is_ok() {
                        result = Err(ServerError::Serve(e));
                    }
                }
                Err(e) => log::error!("[Server] Listener task failed: {}", e),
            }
        }
        result
    }
}

async fn bind(address: &str, port: u16) -> Result<TcpListener, ServerError> {
    let addr = format!("{}:{}", address, port);
    TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Binds both ports and starts serving.
///
/// Returns once the listeners are bound; ports given as zero are resolved
/// in the returned handle.
pub async fn start_simulator(state: AppState) -> Result<SimulatorHandle, ServerError> {
    let config = state.device.config().clone();
    config.validate().map_err(ServerError::Config)?;

    let http_listener = bind(&config.bind_address, config.http_port).await?;
    let ws_listener = bind(&config.bind_address, config.ws_port).await?;
    let http_addr = http_listener.local_addr()?;
    let ws_addr = ws_listener.local_addr()?;

    let cancel = CancellationToken::new();
    let mut tasks = Vec::with_capacity(2);

    for (name, listener, router) in [
        ("HTTP", http_listener, http::create_router(state.clone())),
        ("WS", ws_listener, ws::create_router(state.clone())),
    ] {
        let token = cancel.clone();
        tasks.push(tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await
            .inspect_err(|e| log::error!("[Server] {} listener failed: {}", name, e))
        }));
    }

    log::info!(
        "[Server] Simulating {} ({}): HTTP on {}, WebSocket on {}",
        config.name,
        config.device_id,
        http_addr,
        ws_addr
    );

    Ok(SimulatorHandle {
        http_addr,
        ws_addr,
        state,
        cancel,
        tasks,
    })
}
