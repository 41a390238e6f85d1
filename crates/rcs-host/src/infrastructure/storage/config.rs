//! TOML-based configuration for the host daemon.
//!
//! Reads `AppConfig` from the platform-appropriate config file unless an
//! explicit path is given:
//! - Windows:  `%APPDATA%\RemoteControlHost\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/rcs/config.toml` (or `~/.config/rcs/`)
//! - macOS:    `~/Library/Application Support/RemoteControlHost/config.toml`
//!
//! ```toml
//! [server]
//! log_level = "info"
//!
//! [video]
//! quality = 80
//! resolution_percent = 50
//! target_fps = 30
//!
//! [audio]
//! loopback_patterns = ["stereo mix", "monitor of"]
//!
//! [audio.client]
//! sample_rate = 24000
//! chunk_size = 512
//! channels = 1
//!
//! [shell]
//! program = "/bin/bash"
//! args = ["--login"]
//! ```
//!
//! Every section and field is optional.  Fields annotated with
//! `#[serde(default = "some_fn")]` take `some_fn()` when absent, so a file
//! from an older release keeps working when new fields are added.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rcs_core::{AudioConfig, VideoConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::audio_router::{AudioRouterSettings, DEFAULT_LOOPBACK_PATTERNS};
use crate::application::input_injector::InputSettings;
use crate::application::session_registry::EngineSettings;
use crate::application::shell_sessions::ShellSettings;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but is outside its accepted range.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub video: VideoSection,
    #[serde(default)]
    pub audio: AudioSection,
    #[serde(default)]
    pub shell: ShellSection,
    #[serde(default)]
    pub input: InputSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// `tracing` filter: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`,
    /// or a full directive such as `"rcs_host=debug"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Initial screen stream settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoSection {
    #[serde(default = "default_percent")]
    pub quality: u8,
    #[serde(default = "default_percent")]
    pub resolution_percent: u8,
    /// 0 means unlimited.
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioSection {
    /// Capture settings shared by the microphone and system-audio channels.
    #[serde(default = "AudioConfig::server_default")]
    pub server: AudioConfig,
    /// Playback settings.
    #[serde(default = "AudioConfig::client_default")]
    pub client: AudioConfig,
    /// Case-insensitive substrings identifying loopback input devices.
    #[serde(default = "default_loopback_patterns")]
    pub loopback_patterns: Vec<String>,
    /// Captured chunks buffered toward the transport before dropping.
    #[serde(default = "default_transport_capacity")]
    pub transport_capacity: usize,
    /// Inbound chunks buffered for playback before dropping.
    #[serde(default = "default_playback_queue")]
    pub playback_queue: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShellSection {
    /// Shell executable; the platform default shell when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputSection {
    /// Pause between typed characters.
    #[serde(default)]
    pub type_interval_ms: u64,
    /// Wait after the paste shortcut before the clipboard is restored.
    #[serde(default = "default_paste_settle_ms")]
    pub paste_settle_ms: u64,
    /// Text longer than this many characters is pasted instead of typed.
    #[serde(default = "default_paste_threshold")]
    pub paste_threshold: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_percent() -> u8 {
    100
}
fn default_target_fps() -> u32 {
    60
}
fn default_loopback_patterns() -> Vec<String> {
    DEFAULT_LOOPBACK_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}
fn default_transport_capacity() -> usize {
    32
}
fn default_playback_queue() -> usize {
    64
}
fn default_paste_settle_ms() -> u64 {
    100
}
fn default_paste_threshold() -> usize {
    1
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for VideoSection {
    fn default() -> Self {
        Self {
            quality: default_percent(),
            resolution_percent: default_percent(),
            target_fps: default_target_fps(),
        }
    }
}

impl Default for AudioSection {
    fn default() -> Self {
        Self {
            server: AudioConfig::server_default(),
            client: AudioConfig::client_default(),
            loopback_patterns: default_loopback_patterns(),
            transport_capacity: default_transport_capacity(),
            playback_queue: default_playback_queue(),
        }
    }
}

impl Default for InputSection {
    fn default() -> Self {
        Self {
            type_interval_ms: 0,
            paste_settle_ms: default_paste_settle_ms(),
            paste_threshold: default_paste_threshold(),
        }
    }
}

impl AppConfig {
    /// Checks every value against its accepted range.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("video.quality", self.video.quality),
            ("video.resolution_percent", self.video.resolution_percent),
        ] {
            if !(1..=100).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} = {value} is outside 1..=100"
                )));
            }
        }
        for (name, audio) in [
            ("audio.server", &self.audio.server),
            ("audio.client", &self.audio.client),
        ] {
            audio
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("{name}: {e}")))?;
        }
        if self.audio.transport_capacity == 0 || self.audio.playback_queue == 0 {
            return Err(ConfigError::Invalid(
                "audio queue capacities must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Converts the file layout into the engine's settings.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            video: VideoConfig {
                quality: self.video.quality,
                resolution_percent: self.video.resolution_percent,
                target_fps: self.video.target_fps,
            },
            audio: AudioRouterSettings {
                server: self.audio.server,
                client: self.audio.client,
                loopback_patterns: self.audio.loopback_patterns.clone(),
                playback_queue: self.audio.playback_queue,
            },
            shell: ShellSettings {
                program: self.shell.program.clone(),
                args: self.shell.args.clone(),
                working_dir: self.shell.working_dir.clone(),
            },
            input: InputSettings {
                type_interval: Duration::from_millis(self.input.type_interval_ms),
                paste_settle: Duration::from_millis(self.input.paste_settle_ms),
                paste_threshold: self.input.paste_threshold,
            },
            transport_capacity: self.audio.transport_capacity,
            ..EngineSettings::default()
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads and validates `AppConfig` from `path`, or from the default
/// location when `path` is `None`.
///
/// A missing file yields `AppConfig::default()`.
///
/// # Errors
///
/// [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] for malformed TOML, and [`ConfigError::Invalid`]
/// for out-of-range values.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };

    let cfg = match std::fs::read_to_string(&path) {
        Ok(content) => toml::from_str::<AppConfig>(&content)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
        Err(e) => return Err(ConfigError::Io { path, source: e }),
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Writes `config` to `path` (or the default location), creating the
/// directory if needed.
pub fn save_config(config: &AppConfig, path: Option<&Path>) -> Result<(), ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(())
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("RemoteControlHost"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("rcs"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("RemoteControlHost")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("rcs_test_{}", Uuid::new_v4()))
            .join("config.toml")
    }

    #[test]
    fn test_empty_file_uses_all_defaults() {
        // Arrange / Act
        let cfg: AppConfig = toml::from_str("").unwrap();

        // Assert
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.server.log_level, "info");
        assert_eq!(cfg.audio.server, AudioConfig::server_default());
        assert_eq!(cfg.input.paste_threshold, 1);
    }

    #[test]
    fn test_partial_section_overrides_only_named_fields() {
        // Arrange
        let toml_str = r#"
[video]
target_fps = 15

[audio.client]
sample_rate = 16000
chunk_size = 1024
channels = 1
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();

        // Assert
        assert_eq!(cfg.video.target_fps, 15);
        assert_eq!(cfg.video.quality, 100);
        assert_eq!(cfg.audio.client.sample_rate, 16_000);
        assert_eq!(cfg.audio.server, AudioConfig::server_default());
    }

    #[test]
    fn test_engine_settings_carry_config_values() {
        // Arrange
        let mut cfg = AppConfig::default();
        cfg.shell.program = Some("/bin/zsh".into());
        cfg.input.paste_settle_ms = 250;
        cfg.audio.transport_capacity = 8;

        // Act
        let settings = cfg.engine_settings();

        // Assert
        assert_eq!(settings.shell.program.as_deref(), Some("/bin/zsh"));
        assert_eq!(settings.input.paste_settle, Duration::from_millis(250));
        assert_eq!(settings.transport_capacity, 8);
        assert_eq!(settings.video, VideoConfig::default());
    }

    #[test]
    fn test_validate_rejects_out_of_range_sample_rate() {
        // Arrange
        let mut cfg = AppConfig::default();
        cfg.audio.server.sample_rate = 1_000;

        // Act
        let err = cfg.validate().unwrap_err();

        // Assert
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("audio.server")));
    }

    #[test]
    fn test_validate_rejects_zero_quality() {
        let mut cfg = AppConfig::default();
        cfg.video.quality = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let cfg = load_config(Some(&temp_path())).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        // Arrange
        let path = temp_path();
        let mut cfg = AppConfig::default();
        cfg.server.log_level = "debug".into();
        cfg.audio.loopback_patterns = vec!["monitor of".into()];

        // Act
        save_config(&cfg, Some(&path)).unwrap();
        let loaded = load_config(Some(&path)).unwrap();

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        // Arrange
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        // Act
        let err = load_config(Some(&path)).unwrap_err();

        // Assert
        assert!(matches!(err, ConfigError::Parse(_)));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("config.toml"), "got {path:?}");
        }
    }
}
