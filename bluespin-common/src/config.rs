//! Configuration loading and validation
//!
//! Bluespin reads a single TOML file describing the media server, the
//! Bluetooth sink, player tuning, and supervision timing. Defaults follow
//! the values the appliance shipped with, so a minimal file only needs the
//! `[server]` and `[bluetooth]` sections.
//!
//! **[BSP-CFG-010]** Configuration file resolution priority
//! **[BSP-CFG-020]** Playback tuning defaults

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming the configuration file path
pub const CONFIG_ENV: &str = "BLUESPIN_CONFIG";

/// Top-level daemon configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Media server connection
    pub server: ServerConfig,
    /// Bluetooth sink identity and reconnect pacing
    pub bluetooth: BluetoothConfig,
    /// Player process tuning
    #[serde(default)]
    pub playback: PlaybackConfig,
    /// Supervision loop timing and retry policy
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

/// Media server connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Base URL of the media server, e.g. `http://127.0.0.1:32400`
    pub url: String,
    /// Numeric identifier of the playlist to draw tracks from
    pub playlist_id: u64,
    /// Access token; omit for servers that allow anonymous access
    #[serde(default)]
    pub token: Option<String>,
}

/// Bluetooth sink settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BluetoothConfig {
    /// Device address of the audio sink, e.g. `C0:FF:EE:01:02:03`
    pub device_address: String,
    /// Pause after `disconnect` before re-establishing the link
    #[serde(default = "default_disconnect_settle_secs")]
    pub disconnect_settle_secs: u64,
    /// Pause after `connect` before the audio route is trusted
    #[serde(default = "default_connect_settle_secs")]
    pub connect_settle_secs: u64,
}

/// Player process tuning
///
/// **[BSP-CFG-020]** Defaults match the tuning the appliance has always used:
/// full volume into the Bluetooth ALSA device with generous caching so short
/// network stalls do not produce audible dropouts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Player executable; anything with mpv-compatible flags
    pub player_bin: String,
    /// Player audio output device identifier
    pub audio_device: String,
    /// Output volume, 0-100
    pub volume: u32,
    /// Stream cache size in seconds
    pub cache_secs: u32,
    /// Demuxer read-ahead in seconds
    pub readahead_secs: u32,
    /// Audio output buffer in seconds
    pub audio_buffer_secs: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            player_bin: "mpv".to_string(),
            audio_device: "alsa/bluealsa".to_string(),
            volume: 100,
            cache_secs: 20,
            readahead_secs: 30,
            audio_buffer_secs: 2.0,
        }
    }
}

/// Supervision loop timing and retry policy
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Link watchdog poll interval in seconds
    pub link_poll_secs: u64,
    /// Pause after a recoverable playback failure before the next attempt
    pub retry_pause_secs: u64,
    /// Pause after an unexpected error before re-checking the link
    pub error_cooldown_secs: u64,
    /// Retry the identical track after a recoverable failure instead of
    /// drawing a fresh one
    pub retry_same_track: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            link_poll_secs: 5,
            retry_pause_secs: 2,
            error_cooldown_secs: 5,
            retry_same_track: false,
        }
    }
}

fn default_disconnect_settle_secs() -> u64 {
    1
}

fn default_connect_settle_secs() -> u64 {
    3
}

impl Config {
    /// Resolve the configuration file path following [BSP-CFG-010]
    /// priority order:
    /// 1. Command-line argument (highest priority)
    /// 2. `BLUESPIN_CONFIG` environment variable
    /// 3. `~/.config/bluespin/config.toml`
    /// 4. `/etc/bluespin/config.toml` (Linux)
    pub fn resolve_path(cli_arg: Option<&Path>) -> Result<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return Ok(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Ok(PathBuf::from(path));
            }
        }

        // Priority 3: Per-user config directory
        if let Some(dir) = dirs::config_dir() {
            let user_config = dir.join("bluespin").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // Priority 4: System-wide config (Linux)
        if cfg!(target_os = "linux") {
            let system_config = PathBuf::from("/etc/bluespin/config.toml");
            if system_config.exists() {
                return Ok(system_config);
            }
        }

        Err(Error::Config(
            "No configuration file found.\n\
             Provide one via:\n\
               1. --config <path> on the command line\n\
               2. The BLUESPIN_CONFIG environment variable\n\
               3. ~/.config/bluespin/config.toml\n\
               4. /etc/bluespin/config.toml (Linux)"
                .to_string(),
        ))
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;

        info!(
            path = %path.display(),
            server = %config.server.url,
            playlist = config.server.playlist_id,
            device = %config.bluetooth.device_address,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Config> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field constraints that the TOML schema cannot express
    pub fn validate(&self) -> Result<()> {
        if !self.server.url.starts_with("http://") && !self.server.url.starts_with("https://") {
            return Err(Error::Config(format!(
                "server.url must start with http:// or https:// (got '{}')",
                self.server.url
            )));
        }
        if self.bluetooth.device_address.trim().is_empty() {
            return Err(Error::Config(
                "bluetooth.device_address must not be empty".to_string(),
            ));
        }
        if self.playback.volume > 100 {
            return Err(Error::Config(format!(
                "playback.volume must be 0-100 (got {})",
                self.playback.volume
            )));
        }
        if self.playback.player_bin.trim().is_empty() {
            return Err(Error::Config(
                "playback.player_bin must not be empty".to_string(),
            ));
        }
        if self.supervisor.link_poll_secs == 0 {
            return Err(Error::Config(
                "supervisor.link_poll_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
