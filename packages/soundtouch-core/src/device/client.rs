//! High-level SoundTouch client commands.
//!
//! [`DeviceClient`] wraps the generic get/post transport with typed helpers
//! for the endpoints applications use most, and is the factory for the
//! device's [`EventConnection`].

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::http::{build_device_url, decode_xml, encode_xml, send_request, DeviceError, DeviceResult};
use super::retry::with_retry;
use super::types::{
    Bass, BassRequest, ContentItem, DeviceInfo, Key, KeyRequest, KeyState, NowPlaying, Preset,
    Presets, Status, Volume, VolumeRequest, Zone,
};
use crate::connection::{ConnectionConfig, EventConnection};
use crate::protocol_constants::{
    DEVICE_HTTP_PORT, DEVICE_WS_PORT, KEY_SENDER, MAX_BASS, MAX_VOLUME, MIN_BASS, PRESET_SLOTS,
};

/// Client for one speaker's HTTP control API.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct DeviceClient {
    http: Client,
    host: String,
    http_port: u16,
    ws_port: u16,
}

impl DeviceClient {
    /// Creates a client for the speaker at `host` on the standard ports.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_ports(host, DEVICE_HTTP_PORT, DEVICE_WS_PORT)
    }

    /// Creates a client for a speaker (or simulator) on non-standard ports.
    #[must_use]
    pub fn with_ports(host: impl Into<String>, http_port: u16, ws_port: u16) -> Self {
        Self {
            http: Client::new(),
            host: host.into(),
            http_port,
            ws_port,
        }
    }

    /// Returns the speaker's host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Creates the push event connection for this speaker.
    ///
    /// The connection is not opened; call [`EventConnection::connect`].
    #[must_use]
    pub fn event_connection(&self) -> EventConnection {
        EventConnection::with_port(self.host.clone(), self.ws_port)
    }

    /// Like [`event_connection`](Self::event_connection) with a custom configuration.
    #[must_use]
    pub fn event_connection_with_config(&self, config: ConnectionConfig) -> EventConnection {
        EventConnection::with_port(self.host.clone(), self.ws_port).with_config(config)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Generic transport
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetches `path` and parses the response into `T`.
    ///
    /// Transient failures are retried with backoff.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> DeviceResult<T> {
        let url = build_device_url(&self.host, self.http_port, path);
        let action = format!("GET {}", path);
        let http = &self.http;
        let url = url.as_str();
        let body = with_retry(&action, move || send_request(http, url, None)).await?;
        decode_xml(&body)
    }

    /// Posts `body` to `path` and parses the response into `T`.
    ///
    /// POSTs change device state and are never retried.
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> DeviceResult<T> {
        let url = build_device_url(&self.host, self.http_port, path);
        let xml = encode_xml(body)?;
        let response = send_request(&self.http, &url, Some(xml)).await?;
        decode_xml(&response)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Endpoints
    // ─────────────────────────────────────────────────────────────────────────

    /// `GET /info`
    pub async fn info(&self) -> DeviceResult<DeviceInfo> {
        self.get("/info").await
    }

    /// `GET /now_playing`
    pub async fn now_playing(&self) -> DeviceResult<NowPlaying> {
        self.get("/now_playing").await
    }

    /// `GET /volume`
    pub async fn volume(&self) -> DeviceResult<Volume> {
        self.get("/volume").await
    }

    /// Sets the volume (0-100).
    pub async fn set_volume(&self, level: u8) -> DeviceResult<()> {
        if level > MAX_VOLUME {
            return Err(DeviceError::InvalidParameter(format!(
                "volume {} outside 0..={}",
                level, MAX_VOLUME
            )));
        }
        let _: Status = self.post("/volume", &VolumeRequest { level }).await?;
        Ok(())
    }

    /// Mutes or unmutes the speaker.
    ///
    /// The device only exposes a mute toggle, so the current state is read
    /// first and the MUTE key is pressed only when it differs.
    pub async fn set_mute(&self, mute: bool) -> DeviceResult<()> {
        let current = self.volume().await?;
        if current.mute_enabled != mute {
            self.press_key(Key::Mute).await?;
        }
        Ok(())
    }

    /// `GET /bass`
    pub async fn bass(&self) -> DeviceResult<Bass> {
        self.get("/bass").await
    }

    /// Sets the bass level (-9 to 9).
    pub async fn set_bass(&self, level: i8) -> DeviceResult<()> {
        if !(MIN_BASS..=MAX_BASS).contains(&level) {
            return Err(DeviceError::InvalidParameter(format!(
                "bass {} outside {}..={}",
                level, MIN_BASS, MAX_BASS
            )));
        }
        let _: Status = self.post("/bass", &BassRequest { level }).await?;
        Ok(())
    }

    /// `GET /presets`
    pub async fn presets(&self) -> DeviceResult<Presets> {
        self.get("/presets").await
    }

    /// Plays the content stored in preset `slot` (1-6).
    pub async fn select_preset(&self, slot: u8) -> DeviceResult<()> {
        let key = Key::preset(slot).ok_or_else(|| {
            DeviceError::InvalidParameter(format!("preset {} outside 1..={}", slot, PRESET_SLOTS))
        })?;
        self.press_key(key).await
    }

    /// Plays `item` via `POST /select`.
    pub async fn select(&self, item: &ContentItem) -> DeviceResult<()> {
        let _: Status = self.post("/select", item).await?;
        Ok(())
    }

    /// Stores `item` in preset `slot` (1-6) and returns the updated list.
    pub async fn store_preset(&self, slot: u8, item: &ContentItem) -> DeviceResult<Presets> {
        if !(1..=PRESET_SLOTS).contains(&slot) {
            return Err(DeviceError::InvalidParameter(format!(
                "preset {} outside 1..={}",
                slot, PRESET_SLOTS
            )));
        }
        let preset = Preset {
            id: slot,
            created_on: None,
            updated_on: None,
            content_item: Some(item.clone()),
        };
        self.post("/storePreset", &preset).await
    }

    /// Replaces the zone this speaker masters via `POST /setZone`.
    pub async fn set_zone(&self, zone: &Zone) -> DeviceResult<()> {
        let _: Status = self.post("/setZone", zone).await?;
        Ok(())
    }

    /// `GET /getZone`
    pub async fn zone(&self) -> DeviceResult<Zone> {
        self.get("/getZone").await
    }

    /// Sends a full key press (press followed by release).
    ///
    /// Most keys act on release; preset keys store the current content when
    /// held, so a quick press+release selects instead.
    pub async fn press_key(&self, key: Key) -> DeviceResult<()> {
        for state in [KeyState::Press, KeyState::Release] {
            let request = KeyRequest {
                state,
                sender: KEY_SENDER.to_string(),
                key,
            };
            let _: Status = self.post("/key", &request).await?;
        }
        Ok(())
    }
}
