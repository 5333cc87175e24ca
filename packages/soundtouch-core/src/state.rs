//! State of the simulated speaker.
//!
//! [`SimulatedDevice`] holds everything a real speaker would report over its
//! HTTP API and publishes an `updates` frame on every change, which the
//! simulator's WebSocket endpoint forwards to connected clients.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::device::{
    Bass, Component, Components, ContentItem, DeviceErrorEntry, DeviceErrors, DeviceInfo, Key,
    KeyState, NetworkInfo, NowPlaying, PlayStatus, Preset, Presets, Volume, Zone,
};
use crate::events::{encode_updates, DeviceEvent};
use crate::protocol_constants::{
    CLIENT_XML_ERROR_CODE, CLIENT_XML_ERROR_NAME, DEVICE_HTTP_PORT, DEVICE_WS_PORT, MAX_BASS,
    MAX_VOLUME, MIN_BASS, PRESET_SLOTS, UPDATE_CHANNEL_CAPACITY,
};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Identity, ports and initial levels of the simulated speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// HTTP control port. Zero binds an ephemeral port.
    pub http_port: u16,
    /// WebSocket push port. Zero binds an ephemeral port.
    pub ws_port: u16,
    /// Address to bind both listeners on.
    pub bind_address: String,
    pub device_id: String,
    pub name: String,
    pub device_type: String,
    /// Address reported in `/info` and zone documents.
    pub ip_address: String,
    pub volume: u8,
    pub bass: i8,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            http_port: DEVICE_HTTP_PORT,
            ws_port: DEVICE_WS_PORT,
            bind_address: "0.0.0.0".to_string(),
            device_id: "689E19B8BB8A".to_string(),
            name: "SoundTouch Simulator".to_string(),
            device_type: "SoundTouch 10".to_string(),
            ip_address: "127.0.0.1".to_string(),
            volume: 30,
            bass: 0,
        }
    }
}

impl SimulatorConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.device_id.is_empty() {
            return Err("device_id must not be empty".to_string());
        }
        if self.volume > MAX_VOLUME {
            return Err(format!("volume must be <= {}", MAX_VOLUME));
        }
        if !(MIN_BASS..=MAX_BASS).contains(&self.bass) {
            return Err(format!("bass must be within {}..={}", MIN_BASS, MAX_BASS));
        }
        if self.http_port != 0 && self.http_port == self.ws_port {
            return Err("http_port and ws_port must differ".to_string());
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// A request the simulated speaker refuses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulatorError {
    #[error("{0}")]
    OutOfRange(String),

    #[error("preset {0} is empty")]
    EmptyPreset(u8),

    #[error("request body is not valid XML: {0}")]
    InvalidBody(String),
}

impl SimulatorError {
    /// Renders the error as the `<errors>` document a speaker would send.
    #[must_use]
    pub fn to_document(&self, device_id: &str) -> DeviceErrors {
        DeviceErrors {
            device_id: Some(device_id.to_string()),
            error: vec![DeviceErrorEntry {
                value: CLIENT_XML_ERROR_CODE,
                name: CLIENT_XML_ERROR_NAME.to_string(),
                severity: Some("Unknown".to_string()),
                message: Some(self.to_string()),
            }],
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Device State
// ─────────────────────────────────────────────────────────────────────────────

struct Levels {
    volume: u8,
    muted: bool,
    bass: i8,
    now_playing: NowPlaying,
    /// Content resumed when leaving standby.
    last_content: Option<NowPlaying>,
    presets: Vec<Preset>,
    zone: Zone,
}

/// The simulated speaker.
///
/// Reads return owned snapshots. Every mutation publishes one `updates`
/// frame after the lock is released.
pub struct SimulatedDevice {
    config: SimulatorConfig,
    levels: RwLock<Levels>,
    updates_tx: broadcast::Sender<String>,
}

impl SimulatedDevice {
    /// Creates a speaker in standby with the configured levels.
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        let (updates_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let levels = Levels {
            volume: config.volume,
            muted: false,
            bass: config.bass,
            now_playing: standby(&config.device_id),
            last_content: None,
            presets: default_presets(),
            zone: Zone::default(),
        };
        Self {
            config,
            levels: RwLock::new(levels),
            updates_tx,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.config.device_id
    }

    /// Subscribes to encoded `updates` frames.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.updates_tx.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            device_id: self.config.device_id.clone(),
            name: self.config.name.clone(),
            device_type: self.config.device_type.clone(),
            marge_account_uuid: None,
            components: Some(Components {
                component: vec![Component {
                    component_category: "SCM".to_string(),
                    software_version: Some(env!("CARGO_PKG_VERSION").to_string()),
                    serial_number: Some(format!("SIM-{}", self.config.device_id)),
                }],
            }),
            network_info: vec![NetworkInfo {
                interface: "SCM".to_string(),
                mac_address: self.config.device_id.clone(),
                ip_address: self.config.ip_address.clone(),
            }],
        }
    }

    #[must_use]
    pub fn now_playing(&self) -> NowPlaying {
        self.levels.read().now_playing.clone()
    }

    #[must_use]
    pub fn volume(&self) -> Volume {
        let levels = self.levels.read();
        self.volume_of(&levels)
    }

    #[must_use]
    pub fn bass(&self) -> Bass {
        let levels = self.levels.read();
        self.bass_of(&levels)
    }

    #[must_use]
    pub fn presets(&self) -> Presets {
        Presets {
            preset: self.levels.read().presets.clone(),
        }
    }

    #[must_use]
    pub fn zone(&self) -> Zone {
        self.levels.read().zone.clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Sets the volume level.
    ///
    /// # Errors
    ///
    /// `OutOfRange` above 100.
    pub fn set_volume(&self, level: u8) -> Result<Volume, SimulatorError> {
        if level > MAX_VOLUME {
            return Err(SimulatorError::OutOfRange(format!(
                "volume {} outside 0..={}",
                level, MAX_VOLUME
            )));
        }
        let mut levels = self.levels.write();
        levels.volume = level;
        let volume = self.volume_of(&levels);
        self.publish(DeviceEvent::Volume(volume.clone()));
        Ok(volume)
    }

    /// Sets the bass level.
    ///
    /// # Errors
    ///
    /// `OutOfRange` outside -9..=9.
    pub fn set_bass(&self, level: i8) -> Result<Bass, SimulatorError> {
        if !(MIN_BASS..=MAX_BASS).contains(&level) {
            return Err(SimulatorError::OutOfRange(format!(
                "bass {} outside {}..={}",
                level, MIN_BASS, MAX_BASS
            )));
        }
        let mut levels = self.levels.write();
        levels.bass = level;
        let bass = self.bass_of(&levels);
        self.publish(DeviceEvent::Bass(bass.clone()));
        Ok(bass)
    }

    /// Starts playing `item`.
    pub fn select(&self, item: ContentItem) -> NowPlaying {
        let playing = self.playing(item);
        self.set_now_playing(&mut self.levels.write(), playing.clone());
        playing
    }

    /// Stores `item` in preset slot `slot`.
    ///
    /// # Errors
    ///
    /// `OutOfRange` for slots outside 1..=6.
    pub fn store_preset(&self, slot: u8, item: ContentItem) -> Result<Preset, SimulatorError> {
        if !(1..=PRESET_SLOTS).contains(&slot) {
            return Err(SimulatorError::OutOfRange(format!(
                "preset {} outside 1..={}",
                slot, PRESET_SLOTS
            )));
        }
        let now = crate::utils::now_secs();
        let mut levels = self.levels.write();
        let created_on = levels
            .presets
            .iter()
            .find(|p| p.id == slot)
            .and_then(|p| p.created_on)
            .unwrap_or(now);
        let preset = Preset {
            id: slot,
            created_on: Some(created_on),
            updated_on: Some(now),
            content_item: Some(item),
        };
        levels.presets.retain(|p| p.id != slot);
        levels.presets.push(preset.clone());
        levels.presets.sort_by_key(|p| p.id);
        self.publish(DeviceEvent::Preset(preset.clone()));
        Ok(preset)
    }

    /// Replaces the zone membership.
    pub fn set_zone(&self, zone: Zone) {
        let mut levels = self.levels.write();
        levels.zone = zone.clone();
        self.publish(DeviceEvent::Zone(zone));
    }

    /// Applies a remote control key.
    ///
    /// Keys act on release, matching the firmware.
    ///
    /// # Errors
    ///
    /// `EmptyPreset` when a preset key selects an unused slot.
    pub fn press_key(&self, key: Key, state: KeyState) -> Result<(), SimulatorError> {
        if state != KeyState::Release {
            return Ok(());
        }

        if let Some(slot) = key.preset_slot() {
            let item = self
                .levels
                .read()
                .presets
                .iter()
                .find(|p| p.id == slot)
                .and_then(|p| p.content_item.clone())
                .ok_or(SimulatorError::EmptyPreset(slot))?;
            self.select(item);
            return Ok(());
        }

        match key {
            Key::Mute => self.adjust_volume(|levels| levels.muted = !levels.muted),
            Key::VolumeUp => self.adjust_volume(|levels| {
                levels.volume = levels.volume.saturating_add(1).min(MAX_VOLUME)
            }),
            Key::VolumeDown => {
                self.adjust_volume(|levels| levels.volume = levels.volume.saturating_sub(1))
            }
            Key::Play => self.set_play_status(|_| PlayStatus::Playing),
            Key::Pause => self.set_play_status(|_| PlayStatus::Paused),
            Key::Stop => self.set_play_status(|_| PlayStatus::Stopped),
            Key::PlayPause => self.set_play_status(|current| match current {
                Some(PlayStatus::Playing) => PlayStatus::Paused,
                _ => PlayStatus::Playing,
            }),
            Key::Power => self.toggle_power(),
            other => log::debug!("[Simulator] Ignoring key {:?}", other),
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn volume_of(&self, levels: &Levels) -> Volume {
        Volume {
            device_id: self.config.device_id.clone(),
            target: levels.volume,
            actual: levels.volume,
            mute_enabled: levels.muted,
        }
    }

    fn bass_of(&self, levels: &Levels) -> Bass {
        Bass {
            device_id: self.config.device_id.clone(),
            target: levels.bass,
            actual: levels.bass,
        }
    }

    fn adjust_volume(&self, change: impl FnOnce(&mut Levels)) {
        let mut levels = self.levels.write();
        change(&mut levels);
        self.publish(DeviceEvent::Volume(self.volume_of(&levels)));
    }

    fn playing(&self, item: ContentItem) -> NowPlaying {
        NowPlaying {
            device_id: self.config.device_id.clone(),
            source: item.source.clone(),
            source_account: item.source_account.clone(),
            station_name: item.item_name.clone(),
            content_item: Some(item),
            play_status: Some(PlayStatus::Playing),
            ..NowPlaying::default()
        }
    }

    fn set_now_playing(&self, levels: &mut Levels, now_playing: NowPlaying) {
        if !now_playing.is_standby() {
            levels.last_content = Some(now_playing.clone());
        }
        levels.now_playing = now_playing.clone();
        self.publish(DeviceEvent::NowPlaying(now_playing));
    }

    fn set_play_status(&self, next: impl FnOnce(Option<&PlayStatus>) -> PlayStatus) {
        let mut levels = self.levels.write();
        if levels.now_playing.is_standby() {
            return;
        }
        let mut now_playing = levels.now_playing.clone();
        now_playing.play_status = Some(next(now_playing.play_status.as_ref()));
        self.set_now_playing(&mut levels, now_playing);
    }

    fn toggle_power(&self) {
        let mut levels = self.levels.write();
        if !levels.now_playing.is_standby() {
            self.set_now_playing(&mut levels, standby(&self.config.device_id));
            return;
        }
        let resumed = match levels.last_content.clone() {
            Some(mut previous) => {
                previous.play_status = Some(PlayStatus::Playing);
                previous
            }
            None => match levels.presets.iter().find_map(|p| p.content_item.clone()) {
                Some(item) => self.playing(item),
                None => return,
            },
        };
        self.set_now_playing(&mut levels, resumed);
    }

    /// Broadcasts one update. Callers hold the write lock so frames leave in
    /// the order the changes were applied.
    fn publish(&self, event: DeviceEvent) {
        match encode_updates(&self.config.device_id, &[event]) {
            Ok(frame) => {
                // No receivers simply means no WebSocket clients.
                let _ = self.updates_tx.send(frame);
            }
            Err(e) => log::error!("[Simulator] Failed to encode update: {}", e),
        }
    }
}

fn standby(device_id: &str) -> NowPlaying {
    NowPlaying {
        device_id: device_id.to_string(),
        source: "STANDBY".to_string(),
        content_item: Some(ContentItem {
            source: "STANDBY".to_string(),
            is_presetable: Some(false),
            ..ContentItem::default()
        }),
        ..NowPlaying::default()
    }
}

fn default_presets() -> Vec<Preset> {
    let station = |id: u8, location: &str, name: &str| Preset {
        id,
        created_on: Some(1_701_220_800),
        updated_on: Some(1_701_220_800),
        content_item: Some(ContentItem {
            source: "TUNEIN".to_string(),
            item_type: Some("stationurl".to_string()),
            location: Some(location.to_string()),
            is_presetable: Some(true),
            item_name: Some(name.to_string()),
            ..ContentItem::default()
        }),
    };
    vec![
        station(1, "/v1/playback/station/s24896", "Radio Paradise"),
        station(2, "/v1/playback/station/s33828", "K-LOVE Radio"),
    ]
}
