//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use soundtouch_core::SimulatorConfig;

/// Simulator configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address both listeners bind to.
    /// Override: `SOUNDTOUCH_BIND_ADDRESS`
    pub bind_address: String,

    /// HTTP control API port.
    /// Override: `SOUNDTOUCH_HTTP_PORT`
    pub http_port: u16,

    /// WebSocket push port.
    /// Override: `SOUNDTOUCH_WS_PORT`
    pub ws_port: u16,

    /// Device identifier (MAC-style, e.g. `689E19B8BB8A`).
    /// Override: `SOUNDTOUCH_DEVICE_ID`
    pub device_id: String,

    /// Friendly name reported by `/info`.
    /// Override: `SOUNDTOUCH_NAME`
    pub name: String,

    /// Product type reported by `/info`.
    pub device_type: String,

    /// Address reported in `/info`.
    pub ip_address: String,

    /// Initial volume (0-100).
    pub volume: u8,

    /// Initial bass level (-9 to 9).
    pub bass: i8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let defaults = SimulatorConfig::default();
        Self {
            bind_address: defaults.bind_address,
            http_port: defaults.http_port,
            ws_port: defaults.ws_port,
            device_id: defaults.device_id,
            name: defaults.name,
            device_type: defaults.device_type,
            ip_address: defaults.ip_address,
            volume: defaults.volume,
            bass: defaults.bass,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies `SOUNDTOUCH_*` overrides from `lookup`.
    ///
    /// Unparseable values are logged and ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("SOUNDTOUCH_BIND_ADDRESS") {
            self.bind_address = val;
        }

        for (key, port) in [
            ("SOUNDTOUCH_HTTP_PORT", &mut self.http_port),
            ("SOUNDTOUCH_WS_PORT", &mut self.ws_port),
        ] {
            if let Some(val) = lookup(key) {
                match val.parse() {
                    Ok(parsed) => *port = parsed,
                    Err(_) => log::warn!("Ignoring {}={:?}: not a port number", key, val),
                }
            }
        }

        if let Some(val) = lookup("SOUNDTOUCH_DEVICE_ID") {
            self.device_id = val;
        }

        if let Some(val) = lookup("SOUNDTOUCH_NAME") {
            self.name = val;
        }
    }

    /// Converts to soundtouch-core's simulator configuration.
    pub fn to_simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig {
            http_port: self.http_port,
            ws_port: self.ws_port,
            bind_address: self.bind_address.clone(),
            device_id: self.device_id.clone(),
            name: self.name.clone(),
            device_type: self.device_type.clone(),
            ip_address: self.ip_address.clone(),
            volume: self.volume,
            bass: self.bass,
        }
    }
}
