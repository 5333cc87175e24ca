//! Typed models of SoundTouch device resources.
//!
//! These mirror the XML documents returned by the HTTP control API. Push
//! events reuse the same shapes, so a `volumeUpdated` event carries the
//! exact [`Volume`] a `GET /volume` would return.
//!
//! Attribute fields use quick-xml's `@` prefix and text content uses `$text`.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Device Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Response of `GET /info`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "info")]
pub struct DeviceInfo {
    #[serde(rename = "@deviceID")]
    pub device_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(
        rename = "margeAccountUUID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub marge_account_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
    #[serde(rename = "networkInfo", default)]
    pub network_info: Vec<NetworkInfo>,
}

/// Hardware/software components listed in [`DeviceInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Components {
    #[serde(default)]
    pub component: Vec<Component>,
}

/// One component entry (SCM, LPM, ...).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub component_category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
}

/// Network interface of the device.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    #[serde(rename = "@type", default)]
    pub interface: String,
    pub mac_address: String,
    pub ip_address: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Now Playing
// ─────────────────────────────────────────────────────────────────────────────

/// Reference to a playable item (station, playlist, input).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "ContentItem")]
pub struct ContentItem {
    #[serde(rename = "@source")]
    pub source: String,
    #[serde(rename = "@type", default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(rename = "@location", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(
        rename = "@sourceAccount",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_account: Option<String>,
    #[serde(
        rename = "@isPresetable",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub is_presetable: Option<bool>,
    #[serde(rename = "itemName", default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    #[serde(
        rename = "containerArt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub container_art: Option<String>,
}

/// Cover art reference.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Art {
    #[serde(
        rename = "@artImageStatus",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<String>,
    #[serde(rename = "$text", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Transport state reported in `playStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlayStatus {
    Playing,
    Paused,
    Stopped,
    Buffering,
    Invalid,
    /// Value this library does not know about.
    Other(String),
}

impl From<String> for PlayStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PLAY_STATE" => Self::Playing,
            "PAUSE_STATE" => Self::Paused,
            "STOP_STATE" => Self::Stopped,
            "BUFFERING_STATE" => Self::Buffering,
            "INVALID_PLAY_STATUS" => Self::Invalid,
            _ => Self::Other(value),
        }
    }
}

impl From<PlayStatus> for String {
    fn from(value: PlayStatus) -> Self {
        match value {
            PlayStatus::Playing => "PLAY_STATE".to_string(),
            PlayStatus::Paused => "PAUSE_STATE".to_string(),
            PlayStatus::Stopped => "STOP_STATE".to_string(),
            PlayStatus::Buffering => "BUFFERING_STATE".to_string(),
            PlayStatus::Invalid => "INVALID_PLAY_STATUS".to_string(),
            PlayStatus::Other(raw) => raw,
        }
    }
}

/// Response of `GET /now_playing` and payload of `nowPlayingUpdated`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "nowPlaying", rename_all = "camelCase")]
pub struct NowPlaying {
    #[serde(rename = "@deviceID", default)]
    pub device_id: String,
    #[serde(rename = "@source", default)]
    pub source: String,
    #[serde(
        rename = "@sourceAccount",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_account: Option<String>,
    #[serde(rename = "ContentItem", default, skip_serializing_if = "Option::is_none")]
    pub content_item: Option<ContentItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub art: Option<Art>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_status: Option<PlayStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shuffle_setting: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_setting: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_type: Option<String>,
}

impl NowPlaying {
    /// Returns true when the speaker is in standby.
    #[must_use]
    pub fn is_standby(&self) -> bool {
        self.source == "STANDBY"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Audio Levels
// ─────────────────────────────────────────────────────────────────────────────

/// Response of `GET /volume` and payload of `volumeUpdated`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "volume")]
pub struct Volume {
    #[serde(rename = "@deviceID", default)]
    pub device_id: String,
    #[serde(rename = "targetvolume")]
    pub target: u8,
    #[serde(rename = "actualvolume")]
    pub actual: u8,
    #[serde(rename = "muteenabled")]
    pub mute_enabled: bool,
}

/// Request body of `POST /volume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "volume")]
pub struct VolumeRequest {
    #[serde(rename = "$text")]
    pub level: u8,
}

/// Response of `GET /bass` and payload of `bassUpdated`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "bass")]
pub struct Bass {
    #[serde(rename = "@deviceID", default)]
    pub device_id: String,
    #[serde(rename = "targetbass")]
    pub target: i8,
    #[serde(rename = "actualbass")]
    pub actual: i8,
}

/// Request body of `POST /bass`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "bass")]
pub struct BassRequest {
    #[serde(rename = "$text")]
    pub level: i8,
}

// ─────────────────────────────────────────────────────────────────────────────
// Presets
// ─────────────────────────────────────────────────────────────────────────────

/// One preset slot and the content stored in it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "preset")]
pub struct Preset {
    #[serde(rename = "@id")]
    pub id: u8,
    #[serde(rename = "@createdOn", default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<u64>,
    #[serde(rename = "@updatedOn", default, skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<u64>,
    #[serde(rename = "ContentItem", default, skip_serializing_if = "Option::is_none")]
    pub content_item: Option<ContentItem>,
}

/// Response of `GET /presets`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "presets")]
pub struct Presets {
    #[serde(default)]
    pub preset: Vec<Preset>,
}

impl Presets {
    /// Returns the preset stored in slot `id`, if any.
    #[must_use]
    pub fn get(&self, id: u8) -> Option<&Preset> {
        self.preset.iter().find(|p| p.id == id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Multi-room Zones
// ─────────────────────────────────────────────────────────────────────────────

/// Response of `GET /getZone` and payload of `zoneUpdated`.
///
/// A speaker that is not part of a zone reports an empty `<zone/>`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "zone")]
pub struct Zone {
    #[serde(rename = "@master", default, skip_serializing_if = "Option::is_none")]
    pub master: Option<String>,
    #[serde(
        rename = "@senderIPAddress",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sender_ip: Option<String>,
    #[serde(default)]
    pub member: Vec<ZoneMember>,
}

impl Zone {
    /// Returns true when the speaker does not belong to a zone.
    #[must_use]
    pub fn is_standalone(&self) -> bool {
        self.master.is_none() && self.member.is_empty()
    }
}

/// A speaker participating in a zone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ZoneMember {
    #[serde(rename = "@ipaddress", default)]
    pub ip_address: String,
    #[serde(rename = "$text")]
    pub device_id: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Network Connection State
// ─────────────────────────────────────────────────────────────────────────────

/// Network state reported by the device itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConnectionStatus {
    WifiConnected,
    WifiDisconnected,
    EthernetConnected,
    Other(String),
}

impl From<String> for ConnectionStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "NETWORK_WIFI_CONNECTED" => Self::WifiConnected,
            "NETWORK_WIFI_DISCONNECTED" => Self::WifiDisconnected,
            "NETWORK_ETHERNET_CONNECTED" => Self::EthernetConnected,
            _ => Self::Other(value),
        }
    }
}

impl From<ConnectionStatus> for String {
    fn from(value: ConnectionStatus) -> Self {
        match value {
            ConnectionStatus::WifiConnected => "NETWORK_WIFI_CONNECTED".to_string(),
            ConnectionStatus::WifiDisconnected => "NETWORK_WIFI_DISCONNECTED".to_string(),
            ConnectionStatus::EthernetConnected => "NETWORK_ETHERNET_CONNECTED".to_string(),
            ConnectionStatus::Other(raw) => raw,
        }
    }
}

/// Payload of `connectionStateUpdated`.
///
/// This is the device's own network state, unrelated to whether this
/// library's WebSocket is connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "connectionStateUpdated")]
pub struct ConnectionState {
    #[serde(rename = "@state")]
    pub state: ConnectionStatus,
    #[serde(rename = "@up", default)]
    pub up: bool,
    #[serde(rename = "@signal", default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Keys
// ─────────────────────────────────────────────────────────────────────────────

/// Remote control keys accepted by `POST /key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Key {
    Play,
    Pause,
    PlayPause,
    Stop,
    PrevTrack,
    NextTrack,
    ThumbsUp,
    ThumbsDown,
    Bookmark,
    Power,
    Mute,
    VolumeUp,
    VolumeDown,
    #[serde(rename = "PRESET_1")]
    Preset1,
    #[serde(rename = "PRESET_2")]
    Preset2,
    #[serde(rename = "PRESET_3")]
    Preset3,
    #[serde(rename = "PRESET_4")]
    Preset4,
    #[serde(rename = "PRESET_5")]
    Preset5,
    #[serde(rename = "PRESET_6")]
    Preset6,
    AuxInput,
    ShuffleOff,
    ShuffleOn,
    RepeatOff,
    RepeatOne,
    RepeatAll,
}

impl Key {
    /// Maps a preset slot (1-6) to its key.
    #[must_use]
    pub fn preset(slot: u8) -> Option<Self> {
        match slot {
            1 => Some(Self::Preset1),
            2 => Some(Self::Preset2),
            3 => Some(Self::Preset3),
            4 => Some(Self::Preset4),
            5 => Some(Self::Preset5),
            6 => Some(Self::Preset6),
            _ => None,
        }
    }

    /// Returns the preset slot this key selects, if it is a preset key.
    #[must_use]
    pub fn preset_slot(self) -> Option<u8> {
        match self {
            Self::Preset1 => Some(1),
            Self::Preset2 => Some(2),
            Self::Preset3 => Some(3),
            Self::Preset4 => Some(4),
            Self::Preset5 => Some(5),
            Self::Preset6 => Some(6),
            _ => None,
        }
    }
}

/// Press phase of a key request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyState {
    Press,
    Release,
}

/// Request body of `POST /key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "key")]
pub struct KeyRequest {
    #[serde(rename = "@state")]
    pub state: KeyState,
    #[serde(rename = "@sender")]
    pub sender: String,
    #[serde(rename = "$text")]
    pub key: Key,
}

// ─────────────────────────────────────────────────────────────────────────────
// Status and Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Acknowledgement returned by most POST endpoints, e.g. `<status>/volume</status>`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "status")]
pub struct Status {
    #[serde(rename = "$text", default)]
    pub path: String,
}

/// Error document the device returns instead of the requested resource.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "errors")]
pub struct DeviceErrors {
    #[serde(rename = "@deviceID", default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default)]
    pub error: Vec<DeviceErrorEntry>,
}

/// One `<error>` element inside [`DeviceErrors`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceErrorEntry {
    #[serde(rename = "@value", default)]
    pub value: u32,
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(rename = "@severity", default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(rename = "$text", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl std::fmt::Display for DeviceErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for entry in &self.error {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{} ({})", entry.name, entry.value)?;
            if let Some(message) = &entry.message {
                write!(f, ": {}", message)?;
            }
        }
        if first {
            f.write_str("unspecified device error")?;
        }
        Ok(())
    }
}
