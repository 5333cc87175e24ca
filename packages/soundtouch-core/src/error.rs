//! Centralized error types for the SoundTouch core library.
//!
//! Each subsystem defines its own `thiserror` enum next to the code that
//! produces it. This module adds:
//! - [`ErrorCode`], a machine-readable code per variant
//! - [`SoundTouchError`], an aggregate for callers mixing subsystems

use thiserror::Error;

use crate::api::ServerError;
use crate::connection::{ConfigError, ConnectionError};
use crate::device::DeviceError;
use crate::events::DecodeError;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a stable snake_case code for logs and API responses.
    fn code(&self) -> &'static str;
}

impl ErrorCode for DecodeError {
    fn code(&self) -> &'static str {
        match self {
            Self::Encoding => "frame_not_utf8",
            Self::Empty => "frame_empty",
            Self::Malformed(_) => "frame_malformed",
            Self::UnexpectedRoot(_) => "frame_unexpected_root",
            Self::Payload { .. } => "frame_payload_invalid",
        }
    }
}

impl ErrorCode for ConnectionError {
    fn code(&self) -> &'static str {
        match self {
            Self::AlreadyConnected => "already_connected",
            Self::NotConnected => "not_connected",
            Self::Config(_) => "invalid_config",
            Self::InvalidRequest(_) => "invalid_request",
            Self::HandshakeTimeout(_) => "handshake_timeout",
            Self::WebSocket(_) => "websocket_error",
            Self::WriteTimeout(_) => "write_timeout",
            Self::InvalidMessage => "invalid_message",
            Self::Cancelled => "cancelled",
        }
    }
}

impl ErrorCode for DeviceError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::HttpStatus(_, _) => "http_error_status",
            Self::Api(_) => "device_error",
            Self::Parse(_) => "xml_parse_error",
            Self::Encode(_) => "xml_encode_error",
            Self::InvalidParameter(_) => "invalid_parameter",
        }
    }
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        "invalid_config"
    }
}

impl ErrorCode for ServerError {
    fn code(&self) -> &'static str {
        match self {
            Self::Bind { .. } => "bind_failed",
            Self::Serve(_) => "serve_failed",
            Self::Config(_) => "invalid_config",
        }
    }
}

/// Any error produced by this crate.
#[derive(Debug, Error)]
pub enum SoundTouchError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

impl SoundTouchError {
    /// Returns true if retrying the failed operation may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Device(e) => e.is_transient(),
            Self::Connection(e) => e.is_transient(),
            Self::Decode(_) | Self::Config(_) | Self::Server(_) => false,
        }
    }
}

impl ErrorCode for SoundTouchError {
    fn code(&self) -> &'static str {
        match self {
            Self::Device(e) => e.code(),
            Self::Connection(e) => e.code(),
            Self::Decode(e) => e.code(),
            Self::Config(e) => e.code(),
            Self::Server(e) => e.code(),
        }
    }
}

/// Convenient Result alias for crate-wide operations.
pub type SoundTouchResult<T> = Result<T, SoundTouchError>;

// ─────────────────────────────────────────────────────────────────────────────
// Result Type Aliases
// ─────────────────────────────────────────────────────────────────────────────

pub use crate::connection::ConnectionResult;
pub use crate::device::DeviceResult;
pub use crate::events::DecodeResult;
