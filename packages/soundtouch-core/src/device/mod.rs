//! SoundTouch HTTP control API.
//!
//! # Module Structure
//!
//! - `types` - Typed models of device resources (shared with push events)
//! - `http` - Low-level get/post transport and error shape detection
//! - `retry` - Backoff for transient request failures
//! - `client` - `DeviceClient` endpoint helpers

pub mod client;
pub mod http;
pub(crate) mod retry;
pub mod types;

pub use client::DeviceClient;
pub use http::{decode_xml, encode_xml, DeviceError, DeviceResult};
pub use types::{
    Art, Bass, BassRequest, Component, Components, ConnectionState, ConnectionStatus, ContentItem,
    DeviceErrorEntry, DeviceErrors, DeviceInfo, Key, KeyRequest, KeyState, NetworkInfo,
    NowPlaying, PlayStatus, Preset, Presets, Status, Volume, VolumeRequest, Zone, ZoneMember,
};
