//! SoundTouch Core - client library for Bose SoundTouch speakers.
//!
//! Speakers expose two interfaces: an HTTP control API on port 8090 and a
//! WebSocket push channel on port 8080 that streams `<updates>` documents
//! whenever the device state changes.
//!
//! # Architecture
//!
//! - [`device`]: Typed HTTP control client and the payload model
//! - [`events`]: Push event codec and callback dispatch
//! - [`connection`]: WebSocket connection manager (keep-alive, reconnection)
//! - [`api`]: Simulated speaker serving both interfaces
//! - [`error`]: Error codes and the crate-wide aggregate error
//!
//! # Abstraction Traits
//!
//! - [`LogSink`](logging::LogSink): destination for background task messages
//! - [`Clock`](runtime::Clock): timer used between reconnection attempts
//!
//! Both default to implementations backed by the `log` facade and tokio.

#![warn(clippy::all)]

pub mod api;
pub mod connection;
pub mod device;
pub mod error;
pub mod events;
pub mod logging;
pub mod protocol_constants;
pub mod runtime;
pub mod state;
pub mod utils;

#[cfg(test)]
mod test_fixtures;
#[cfg(test)]
mod test_support;

// Re-export commonly used types at the crate root
pub use connection::{
    ConfigError, ConnectionConfig, ConnectionError, ConnectionPhase, ConnectionResult,
    EventConnection, WeakEventConnection,
};
pub use device::{DeviceClient, DeviceError, DeviceResult};
pub use error::{ErrorCode, SoundTouchError, SoundTouchResult};
pub use events::{decode, dispatch, DecodeError, DeviceEvent, Envelope, EventHandlers, EventKind};
pub use logging::{LogCrateSink, LogSink, NoopSink};
pub use runtime::{Clock, TokioClock};

// Re-export simulator types
pub use api::{start_simulator, AppState, AppStateBuilder, ServerError, SimulatorHandle};
pub use state::{SimulatedDevice, SimulatorConfig, SimulatorError};
