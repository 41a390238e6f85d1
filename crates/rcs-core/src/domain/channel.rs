//! Stream channel entity.
//!
//! A stream channel is one of the four long-lived media paths the engine can
//! run: screen video and three audio paths.  Each channel is either idle or
//! active, and exactly one OS device handle belongs to it while active.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::settings::{AudioConfig, VideoConfig};
use crate::error::EngineError;

/// The four stream channel kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelKind {
    /// Screen capture encoded as JPEG frames.
    Video,
    /// Host microphone capture.
    AudioMic,
    /// Host system-audio capture through a loopback device.
    AudioSystem,
    /// Operator audio played on the host speakers.
    AudioPlayback,
}

impl ChannelKind {
    /// Every channel kind, in the order the registry reports them.
    pub const ALL: [ChannelKind; 4] = [
        ChannelKind::Video,
        ChannelKind::AudioMic,
        ChannelKind::AudioSystem,
        ChannelKind::AudioPlayback,
    ];

    /// Returns the canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Video => "video",
            ChannelKind::AudioMic => "audio-mic",
            ChannelKind::AudioSystem => "audio-system",
            ChannelKind::AudioPlayback => "audio-playback",
        }
    }

    pub fn is_audio(self) -> bool {
        !matches!(self, ChannelKind::Video)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = EngineError;

    /// Parses a canonical channel name or one of the legacy aliases
    /// (`server_mic`, `server_system`, `client_playback`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(ChannelKind::Video),
            "audio-mic" | "server_mic" => Ok(ChannelKind::AudioMic),
            "audio-system" | "server_system" => Ok(ChannelKind::AudioSystem),
            "audio-playback" | "client_playback" => Ok(ChannelKind::AudioPlayback),
            other => Err(EngineError::PreconditionViolation(format!(
                "unknown channel: {other}"
            ))),
        }
    }
}

/// Lifecycle state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelState {
    #[default]
    Idle,
    Active,
}

/// Per-kind configuration attached to a channel snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum ChannelConfig {
    Video(VideoConfig),
    Audio(AudioConfig),
}

/// A snapshot of one stream channel as reported by the session registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChannel {
    /// Stable identifier for this channel within one registry instance.
    pub id: Uuid,
    pub kind: ChannelKind,
    pub state: ChannelState,
    pub config: ChannelConfig,
    /// The session that started the channel, if one did.
    pub owning_session: Option<String>,
}

impl StreamChannel {
    pub fn is_active(&self) -> bool {
        self.state == ChannelState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_names() {
        for kind in ChannelKind::ALL {
            assert_eq!(kind.as_str().parse::<ChannelKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_parse_legacy_aliases() {
        assert_eq!(
            "server_mic".parse::<ChannelKind>().unwrap(),
            ChannelKind::AudioMic
        );
        assert_eq!(
            "server_system".parse::<ChannelKind>().unwrap(),
            ChannelKind::AudioSystem
        );
        assert_eq!(
            "client_playback".parse::<ChannelKind>().unwrap(),
            ChannelKind::AudioPlayback
        );
    }

    #[test]
    fn test_parse_unknown_name_is_precondition_violation() {
        let err = "webcam".parse::<ChannelKind>().unwrap_err();
        assert!(matches!(err, EngineError::PreconditionViolation(_)));
    }

    #[test]
    fn test_only_video_is_not_audio() {
        assert!(!ChannelKind::Video.is_audio());
        assert!(ChannelKind::AudioMic.is_audio());
        assert!(ChannelKind::AudioSystem.is_audio());
        assert!(ChannelKind::AudioPlayback.is_audio());
    }

    #[test]
    fn test_serde_uses_kebab_case() {
        let json = serde_json::to_string(&ChannelKind::AudioPlayback).unwrap();
        assert_eq!(json, "\"audio-playback\"");
        let state = serde_json::to_string(&ChannelState::Active).unwrap();
        assert_eq!(state, "\"active\"");
    }
}
