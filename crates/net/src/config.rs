//! Server configuration loaded from TOML

use std::path::Path;
use std::time::Duration;

use easel_core::limits::{DEFAULT_MAX_PARTICIPANTS, DEFAULT_START_DELAY_MS, MAX_START_DELAY_MS};
use easel_core::RoomSettings;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Longest accepted staleness threshold for empty rooms (30 days)
pub const MAX_IDLE_ROOM_SECS: u64 = 30 * 24 * 60 * 60;

/// Settings block applied to every newly created room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomDefaults {
    pub max_participants: usize,
    pub participants_can_draw: bool,
    pub participants_can_chat: bool,
    pub host_can_clear: bool,
    pub host_can_mute: bool,
}

impl Default for RoomDefaults {
    fn default() -> Self {
        Self {
            max_participants: DEFAULT_MAX_PARTICIPANTS,
            participants_can_draw: true,
            participants_can_chat: true,
            host_can_clear: true,
            host_can_mute: true,
        }
    }
}

impl RoomDefaults {
    pub fn settings(&self) -> RoomSettings {
        RoomSettings {
            host_can_clear: self.host_can_clear,
            host_can_mute: self.host_can_mute,
            participants_can_draw: self.participants_can_draw,
            participants_can_chat: self.participants_can_chat,
            max_participants: self.max_participants,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: String,
    /// Delay between "session starting" and "session started"
    pub start_delay_ms: u64,
    /// How often the idle reaper sweeps
    pub reaper_interval_secs: u64,
    /// Age after which an empty room is reaped
    pub idle_room_secs: u64,
    /// Defaults for new rooms
    pub room: RoomDefaults,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{}", crate::DEFAULT_PORT),
            start_delay_ms: DEFAULT_START_DELAY_MS,
            reaper_interval_secs: 60,
            idle_room_secs: 300,
            room: RoomDefaults::default(),
        }
    }
}

impl ServerConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ServerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.room.max_participants == 0 {
            return Err(Error::InvalidConfig(
                "room.max_participants must be at least 1".into(),
            ));
        }
        if self.start_delay_ms > MAX_START_DELAY_MS {
            return Err(Error::InvalidConfig(format!(
                "start_delay_ms must be at most {}",
                MAX_START_DELAY_MS
            )));
        }
        if self.idle_room_secs > MAX_IDLE_ROOM_SECS {
            return Err(Error::InvalidConfig(format!(
                "idle_room_secs must be at most {}",
                MAX_IDLE_ROOM_SECS
            )));
        }
        if self.reaper_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "reaper_interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }

    pub fn idle_threshold(&self) -> chrono::Duration {
        let secs = self.idle_room_secs.min(MAX_IDLE_ROOM_SECS);
        chrono::Duration::seconds(i64::try_from(secs).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:7341");
        assert_eq!(config.start_delay(), Duration::from_secs(3));
        assert_eq!(config.room.max_participants, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml_str(
            r#"
bind_addr = "0.0.0.0:9000"

[room]
max_participants = 4
participants_can_chat = false
"#,
        )
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.idle_room_secs, 300);

        let settings = config.room.settings();
        assert_eq!(settings.max_participants, 4);
        assert!(!settings.participants_can_chat);
        assert!(settings.participants_can_draw);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = ServerConfig::from_toml_str("[room]\nmax_participants = 0\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = ServerConfig::from_toml_str("start_delay_ms = 999999\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = ServerConfig::from_toml_str("bind_addr = 12\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_oversized_idle_threshold_rejected() {
        let err = ServerConfig::from_toml_str("idle_room_secs = 10000000000000000\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        // Unvalidated configs are clamped rather than overflowing
        let config = ServerConfig {
            idle_room_secs: u64::MAX,
            ..ServerConfig::default()
        };
        assert_eq!(
            config.idle_threshold(),
            chrono::Duration::seconds(MAX_IDLE_ROOM_SECS as i64)
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "idle_room_secs = 30").unwrap();
        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.idle_threshold(), chrono::Duration::seconds(30));
    }
}
