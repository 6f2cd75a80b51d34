//! Client configuration
//!
//! Connection parameters and tuning knobs, loaded from the environment with
//! defaults matching the reference deployment, plus the user's persisted
//! settings file (JSON) for the options a settings screen would expose.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::net::aoi::AoiConfig;
use crate::net::session::SessionConfig;

/// User-facing settings, persisted as JSON in the data directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Reconnect as the same identity after elimination instead of dropping
    /// back to the menu
    pub auto_reconnect_on_death: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_reconnect_on_death: true,
        }
    }
}

impl Settings {
    pub const FILE_NAME: &'static str = "settings.json";

    /// Load from `dir/settings.json`, falling back to defaults on any error
    pub fn load_or_default(dir: &Path) -> Self {
        let path = dir.join(Self::FILE_NAME);
        match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!("invalid settings file {:?}: {}, using defaults", path, e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, dir: &Path) -> std::io::Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(dir.join(Self::FILE_NAME), text)
    }
}

/// Full client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend endpoint URI
    pub endpoint: String,
    /// Module name to attach to on the backend
    pub module: String,
    /// Display name announced on connect
    pub username: String,
    /// Seconds between a disconnect and the next connect attempt
    pub reconnect_delay: f32,
    /// Resume the persisted identity on reconnect
    pub resume_identity: bool,
    /// Seconds a deleted bit stays in the fade-out store
    pub bit_fade_secs: f32,
    /// Backend event buffer capacity (covers a subscription-swap row burst)
    pub event_buffer_capacity: usize,
    /// Directory for the token file and settings file
    pub data_dir: PathBuf,
    /// AoI region sizing
    pub aoi: AoiConfig,
    /// Persisted user settings
    pub settings: Settings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "wss://localhost:3000".to_string(),
            module: "moonbits".to_string(),
            username: "anon".to_string(),
            reconnect_delay: 2.0,
            resume_identity: true,
            bit_fade_secs: 0.5,
            event_buffer_capacity: 4096,
            data_dir: PathBuf::from("."),
            aoi: AoiConfig::default(),
            settings: Settings::default(),
        }
    }
}

impl ClientConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(endpoint) = std::env::var("ENDPOINT") {
            if endpoint.is_empty() {
                tracing::warn!("ENDPOINT is empty, using default");
            } else {
                config.endpoint = endpoint;
            }
        }

        if let Ok(module) = std::env::var("MODULE_NAME") {
            config.module = module;
        }

        if let Ok(username) = std::env::var("USERNAME") {
            if username.len() >= 2 {
                config.username = username;
            } else {
                tracing::warn!("USERNAME must be at least 2 characters, using default");
            }
        }

        if let Ok(delay) = std::env::var("RECONNECT_DELAY") {
            if let Ok(parsed) = delay.parse::<f32>() {
                if parsed > 0.0 {
                    config.reconnect_delay = parsed;
                } else {
                    tracing::warn!("RECONNECT_DELAY must be > 0, using default");
                }
            } else {
                tracing::warn!("Invalid RECONNECT_DELAY '{}', using default", delay);
            }
        }

        if let Ok(buffer) = std::env::var("RENDER_BUFFER") {
            if let Ok(parsed) = buffer.parse::<f32>() {
                if parsed > 0.0 {
                    config.aoi.buffer = parsed;
                } else {
                    tracing::warn!("RENDER_BUFFER must be > 0, using default");
                }
            } else {
                tracing::warn!("Invalid RENDER_BUFFER '{}', using default", buffer);
            }
        }

        if let Ok(dir) = std::env::var("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        config.settings = Settings::load_or_default(&config.data_dir);
        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.is_empty() {
            return Err("endpoint cannot be empty".to_string());
        }
        if self.username.len() < 2 {
            return Err("username must be at least 2 characters".to_string());
        }
        if self.reconnect_delay <= 0.0 {
            return Err("reconnect_delay must be > 0".to_string());
        }
        if self.aoi.buffer <= 0.0 {
            return Err("AoI buffer must be > 0".to_string());
        }
        if self.aoi.viewport_min > self.aoi.viewport_max {
            return Err("viewport_min cannot exceed viewport_max".to_string());
        }
        if self.bit_fade_secs < 0.0 {
            return Err("bit_fade_secs cannot be negative".to_string());
        }
        Ok(())
    }

    /// Carve out the session state machine's knobs
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            endpoint: self.endpoint.clone(),
            module: self.module.clone(),
            username: self.username.clone(),
            reconnect_delay: self.reconnect_delay,
            resume_identity: self.resume_identity,
            auto_reconnect_on_death: self.settings.auto_reconnect_on_death,
        }
    }
}
