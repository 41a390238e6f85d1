//! Records published by the engine's producer loops.

use serde::{Deserialize, Serialize};

use super::channel::ChannelKind;

/// One encoded video frame.
///
/// Only the newest frame is ever observable by the transport; older frames
/// are overwritten in the hand-off slot, so `sequence` may skip values.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoFrame {
    /// Session that owns the run which produced this frame.
    pub session_id: String,
    /// Monotonic per-run frame counter, starting at 1.
    pub sequence: u64,
    /// JPEG-encoded image bytes.
    #[serde(skip)]
    pub image: Vec<u8>,
    /// Frames produced in the trailing one-second window.
    pub fps: u32,
    /// Title of the foreground window at capture time (may be empty).
    pub active_window_title: String,
}

/// Cursor position in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: i32,
    pub y: i32,
}

/// One chunk of captured 16-bit little-endian PCM audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub channel: ChannelKind,
    pub data: Vec<u8>,
}

/// Out-of-band lifecycle notifications for the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum EngineEvent {
    /// A running channel stopped on its own after a failure.
    ChannelStopped { kind: ChannelKind, reason: String },
    /// A shell session ended and its state was removed.
    ShellClosed { session_id: String },
}
