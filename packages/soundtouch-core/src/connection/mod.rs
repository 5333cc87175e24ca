//! Push event channel (WebSocket on port 8080).

mod config;
mod manager;
pub mod reconnect;

pub use config::{ConfigError, ConnectionConfig};
pub use manager::{
    ConnectionError, ConnectionPhase, ConnectionResult, EventConnection, WeakEventConnection,
};
pub use reconnect::{ReconnectOutcome, ReconnectPolicy};
