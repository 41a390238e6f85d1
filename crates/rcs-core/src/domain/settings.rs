//! Fixed settings records per channel kind.
//!
//! Video settings clamp out-of-range values; audio settings reject them.
//! Both kinds of update are partial: absent fields keep their current value.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Lowest accepted audio sample rate in Hz.
pub const MIN_SAMPLE_RATE: u32 = 8_000;
/// Highest accepted audio sample rate in Hz.
pub const MAX_SAMPLE_RATE: u32 = 192_000;
/// Smallest accepted audio chunk in frames.
pub const MIN_CHUNK_SIZE: u32 = 64;
/// Largest accepted audio chunk in frames.
pub const MAX_CHUNK_SIZE: u32 = 65_536;

/// Bytes per sample for the engine's 16-bit PCM streams.
pub const BYTES_PER_SAMPLE: usize = 2;

// ── Video ─────────────────────────────────────────────────────────────────────

/// Settings for the video channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoConfig {
    /// JPEG quality, 1..=100.
    pub quality: u8,
    /// Output scale relative to the native capture size, 1..=100.
    pub resolution_percent: u8,
    /// Target frames per second (0 = unlimited).
    pub target_fps: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            quality: 100,
            resolution_percent: 100,
            target_fps: 60,
        }
    }
}

/// Partial update to [`VideoConfig`].  Values are signed so that an
/// out-of-range request (e.g. `-5`) clamps instead of failing to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSettingsUpdate {
    #[serde(default)]
    pub quality: Option<i64>,
    #[serde(default)]
    pub resolution_percent: Option<i64>,
    #[serde(default)]
    pub target_fps: Option<u32>,
}

/// Clamps a percentage-like value into `[1, 100]`.
pub fn clamp_percent(value: i64) -> u8 {
    value.clamp(1, 100) as u8
}

impl VideoConfig {
    /// Applies a partial update in place.
    ///
    /// Returns `true` when the target fps changed, which requires the capture
    /// device to be re-opened.
    pub fn apply(&mut self, update: &VideoSettingsUpdate) -> bool {
        if let Some(q) = update.quality {
            self.quality = clamp_percent(q);
        }
        if let Some(r) = update.resolution_percent {
            self.resolution_percent = clamp_percent(r);
        }
        match update.target_fps {
            Some(fps) if fps != self.target_fps => {
                self.target_fps = fps;
                true
            }
            _ => false,
        }
    }

    /// Returns the per-frame interval, or `None` when fps is unlimited.
    pub fn frame_interval(&self) -> Option<std::time::Duration> {
        if self.target_fps == 0 {
            None
        } else {
            Some(std::time::Duration::from_secs_f64(
                1.0 / f64::from(self.target_fps),
            ))
        }
    }

    /// Returns the scaled output size for a native `width` x `height` frame.
    ///
    /// Never returns a zero dimension.
    pub fn scaled_size(&self, width: u32, height: u32) -> (u32, u32) {
        if self.resolution_percent >= 100 {
            return (width, height);
        }
        let pct = u64::from(self.resolution_percent);
        let w = (u64::from(width) * pct / 100).max(1) as u32;
        let h = (u64::from(height) * pct / 100).max(1) as u32;
        (w, h)
    }
}

// ── Audio ─────────────────────────────────────────────────────────────────────

/// Which audio settings record an update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioTarget {
    /// Host capture (microphone and system audio).
    Server,
    /// Operator playback.
    Client,
}

impl std::str::FromStr for AudioTarget {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server" => Ok(AudioTarget::Server),
            "client" => Ok(AudioTarget::Client),
            other => Err(EngineError::PreconditionViolation(format!(
                "unknown audio target: {other}"
            ))),
        }
    }
}

/// Settings for an audio channel.  Streams are 16-bit little-endian PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Frames per chunk.
    pub chunk_size: u32,
    /// Interleaved channel count.
    pub channels: u16,
}

impl AudioConfig {
    /// Default capture settings: 48 kHz, 4096-frame chunks, mono.
    pub fn server_default() -> Self {
        Self {
            sample_rate: 48_000,
            chunk_size: 4_096,
            channels: 1,
        }
    }

    /// Default playback settings: 24 kHz, 512-frame chunks, mono.
    pub fn client_default() -> Self {
        Self {
            sample_rate: 24_000,
            chunk_size: 512,
            channels: 1,
        }
    }

    /// Checks every field against the accepted ranges.
    pub fn validate(&self) -> EngineResult<()> {
        validate_rate(self.sample_rate)?;
        validate_chunk(self.chunk_size)?;
        if self.channels == 0 {
            return Err(EngineError::PreconditionViolation(
                "audio channel count must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Size in bytes of one chunk of interleaved 16-bit samples.
    pub fn chunk_bytes(&self) -> usize {
        self.chunk_size as usize * usize::from(self.channels) * BYTES_PER_SAMPLE
    }

    /// Returns a copy with the update applied, or an error if any supplied
    /// value is out of range.  `self` is never modified.
    pub fn with_update(&self, update: &AudioSettingsUpdate) -> EngineResult<Self> {
        let mut next = *self;
        if let Some(rate) = update.sample_rate {
            validate_rate(rate)?;
            next.sample_rate = rate;
        }
        if let Some(chunk) = update.chunk_size {
            validate_chunk(chunk)?;
            next.chunk_size = chunk;
        }
        Ok(next)
    }
}

fn validate_rate(rate: u32) -> EngineResult<()> {
    if (MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&rate) {
        Ok(())
    } else {
        Err(EngineError::PreconditionViolation(format!(
            "sample rate {rate} outside {MIN_SAMPLE_RATE}..={MAX_SAMPLE_RATE}"
        )))
    }
}

fn validate_chunk(chunk: u32) -> EngineResult<()> {
    if (MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk) {
        Ok(())
    } else {
        Err(EngineError::PreconditionViolation(format!(
            "chunk size {chunk} outside {MIN_CHUNK_SIZE}..={MAX_CHUNK_SIZE}"
        )))
    }
}

/// Partial update to an [`AudioConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSettingsUpdate {
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub chunk_size: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_update_clamps_quality_and_resolution() {
        // Arrange
        let mut cfg = VideoConfig::default();
        let update = VideoSettingsUpdate {
            quality: Some(150),
            resolution_percent: Some(-5),
            target_fps: None,
        };

        // Act
        let fps_changed = cfg.apply(&update);

        // Assert
        assert_eq!(cfg.quality, 100);
        assert_eq!(cfg.resolution_percent, 1);
        assert!(!fps_changed);
    }

    #[test]
    fn test_video_update_reports_fps_change_only_when_different() {
        let mut cfg = VideoConfig::default();
        let same = VideoSettingsUpdate {
            target_fps: Some(60),
            ..Default::default()
        };
        assert!(!cfg.apply(&same));

        let changed = VideoSettingsUpdate {
            target_fps: Some(15),
            ..Default::default()
        };
        assert!(cfg.apply(&changed));
        assert_eq!(cfg.target_fps, 15);
    }

    #[test]
    fn test_zero_fps_means_unlimited() {
        let cfg = VideoConfig {
            target_fps: 0,
            ..Default::default()
        };
        assert!(cfg.frame_interval().is_none());
    }

    #[test]
    fn test_scaled_size_never_zero() {
        let cfg = VideoConfig {
            resolution_percent: 1,
            ..Default::default()
        };
        assert_eq!(cfg.scaled_size(50, 50), (1, 1));
        assert_eq!(cfg.scaled_size(1920, 1080), (19, 10));
    }

    #[test]
    fn test_audio_defaults_match_channel_roles() {
        let server = AudioConfig::server_default();
        assert_eq!((server.sample_rate, server.chunk_size), (48_000, 4_096));
        let client = AudioConfig::client_default();
        assert_eq!((client.sample_rate, client.chunk_size), (24_000, 512));
        assert!(server.validate().is_ok());
        assert!(client.validate().is_ok());
    }

    #[test]
    fn test_audio_update_rejects_out_of_range_without_partial_apply() {
        // Arrange
        let cfg = AudioConfig::server_default();
        let update = AudioSettingsUpdate {
            sample_rate: Some(16_000),
            chunk_size: Some(10),
        };

        // Act
        let result = cfg.with_update(&update);

        // Assert
        assert!(matches!(result, Err(EngineError::PreconditionViolation(_))));
        assert_eq!(cfg, AudioConfig::server_default());
    }

    #[test]
    fn test_audio_update_accepts_range_edges() {
        let cfg = AudioConfig::server_default();
        let low = cfg
            .with_update(&AudioSettingsUpdate {
                sample_rate: Some(MIN_SAMPLE_RATE),
                chunk_size: Some(MIN_CHUNK_SIZE),
            })
            .unwrap();
        assert_eq!(low.sample_rate, 8_000);
        let high = cfg
            .with_update(&AudioSettingsUpdate {
                sample_rate: Some(MAX_SAMPLE_RATE),
                chunk_size: Some(MAX_CHUNK_SIZE),
            })
            .unwrap();
        assert_eq!(high.chunk_size, 65_536);
    }

    #[test]
    fn test_chunk_bytes_counts_16_bit_samples() {
        assert_eq!(AudioConfig::client_default().chunk_bytes(), 1024);
    }

    #[test]
    fn test_audio_target_parses_case_insensitively() {
        assert_eq!("Server".parse::<AudioTarget>().unwrap(), AudioTarget::Server);
        assert!("both".parse::<AudioTarget>().is_err());
    }
}
