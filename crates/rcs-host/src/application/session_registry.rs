//! SessionRegistry: the control-plane facade.
//!
//! The transport layer calls only this type.  It parses channel names,
//! delegates each operation to the manager that owns the resource, and hands
//! out the receivers the transport drains.
//!
//! ```text
//!   transport ──► SessionRegistry ──► InputInjector
//!                                 ├─► CapturePipeline ──► frames / cursor (watch)
//!                                 ├─► AudioRouter ──────► audio chunks (mpsc)
//!                                 └─► ShellSessionManager ► poll()
//!                     events (mpsc) ◄── every loop on failure or exit
//! ```

use std::collections::HashMap;
use std::sync::Mutex;

use rcs_core::{
    AudioChunk, AudioConfig, AudioSettingsUpdate, AudioTarget, ChannelConfig, ChannelKind,
    ChannelState, CursorPosition, EngineEvent, EngineResult, InputEvent, StreamChannel,
    VideoConfig, VideoFrame, VideoSettingsUpdate,
};
use tokio::sync::{mpsc, watch};
use tracing::info;
use uuid::Uuid;

use super::audio_router::{AudioRouter, AudioRouterSettings};
use super::capture_pipeline::{CapturePipeline, VideoSettingsSnapshot};
use super::input_injector::{InputInjector, InputSettings};
use super::lock;
use super::platform::PlatformServices;
use super::shell_sessions::{ShellSessionManager, ShellSettings};

/// Everything the engine needs besides its platform backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub video: VideoConfig,
    pub audio: AudioRouterSettings,
    pub shell: ShellSettings,
    pub input: InputSettings,
    /// Capacity of the captured-audio channel, in chunks.
    pub transport_capacity: usize,
    /// Capacity of the engine event channel.
    pub event_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            video: VideoConfig::default(),
            audio: AudioRouterSettings::default(),
            shell: ShellSettings::default(),
            input: InputSettings::default(),
            transport_capacity: 32,
            event_capacity: 64,
        }
    }
}

/// Handles the transport drains.
///
/// `frames` and `cursor` can be obtained any number of times; `audio` and
/// `events` are handed out by the first [`SessionRegistry::outputs`] call
/// only.
pub struct EngineOutputs {
    pub frames: watch::Receiver<Option<VideoFrame>>,
    pub cursor: watch::Receiver<Option<CursorPosition>>,
    pub audio: Option<mpsc::Receiver<AudioChunk>>,
    pub events: Option<mpsc::Receiver<EngineEvent>>,
}

struct PendingReceivers {
    audio: Option<mpsc::Receiver<AudioChunk>>,
    events: Option<mpsc::Receiver<EngineEvent>>,
}

/// The session engine.
pub struct SessionRegistry {
    input: InputInjector,
    capture: CapturePipeline,
    audio: AudioRouter,
    shells: ShellSessionManager,
    channel_ids: HashMap<ChannelKind, Uuid>,
    receivers: Mutex<PendingReceivers>,
}

impl SessionRegistry {
    /// Builds the engine over `platform`.
    ///
    /// # Errors
    ///
    /// [`rcs_core::EngineError::PreconditionViolation`] if either audio
    /// settings record is out of range.  No device is touched.
    pub fn new(platform: PlatformServices, settings: EngineSettings) -> EngineResult<Self> {
        settings.audio.server.validate()?;
        settings.audio.client.validate()?;

        let (event_tx, event_rx) = mpsc::channel(settings.event_capacity.max(1));
        let (audio_tx, audio_rx) = mpsc::channel(settings.transport_capacity.max(1));

        let input = InputInjector::new(platform.input, platform.clipboard, settings.input);
        let capture = CapturePipeline::new(
            platform.capture,
            input.pointer.clone(),
            settings.video,
            event_tx.clone(),
        );
        let audio = AudioRouter::new(platform.audio, settings.audio, audio_tx, event_tx.clone());
        let shells = ShellSessionManager::new(settings.shell, event_tx);

        Ok(Self {
            input,
            capture,
            audio,
            shells,
            channel_ids: ChannelKind::ALL
                .into_iter()
                .map(|kind| (kind, Uuid::new_v4()))
                .collect(),
            receivers: Mutex::new(PendingReceivers {
                audio: Some(audio_rx),
                events: Some(event_rx),
            }),
        })
    }

    pub fn outputs(&self) -> EngineOutputs {
        let capture = self.capture.outputs();
        let mut pending = lock(&self.receivers);
        EngineOutputs {
            frames: capture.frames,
            cursor: capture.cursor,
            audio: pending.audio.take(),
            events: pending.events.take(),
        }
    }

    // ── Video ─────────────────────────────────────────────────────────────────

    pub fn video_start(&self, session_id: &str) -> EngineResult<()> {
        self.capture.start(session_id)
    }

    pub fn video_stop(&self) {
        self.capture.stop();
    }

    /// One PNG screenshot.  Stops a running stream first.
    pub fn screenshot(&self) -> EngineResult<Vec<u8>> {
        self.capture.screenshot()
    }

    pub fn video_update_settings(&self, update: &VideoSettingsUpdate) -> VideoConfig {
        self.capture.update_settings(update)
    }

    pub fn video_settings(&self) -> VideoSettingsSnapshot {
        self.capture.current_settings()
    }

    // ── Audio ─────────────────────────────────────────────────────────────────

    /// Starts an audio channel by name (`audio-mic`, `server_system`, ...).
    pub fn audio_start(&self, channel: &str) -> EngineResult<()> {
        self.audio.start(channel.parse()?)
    }

    pub fn audio_stop(&self, channel: &str) -> EngineResult<()> {
        self.audio.stop(channel.parse()?)
    }

    /// Queues operator audio; `false` means the chunk was dropped.
    pub fn audio_push_inbound(&self, channel: &str, chunk: Vec<u8>) -> EngineResult<bool> {
        self.audio.push_inbound(channel.parse()?, chunk)
    }

    pub fn audio_update_settings(
        &self,
        target: AudioTarget,
        update: &AudioSettingsUpdate,
    ) -> EngineResult<AudioConfig> {
        self.audio.update_settings(target, update)
    }

    // ── Shell ─────────────────────────────────────────────────────────────────

    /// Spawns a shell and returns its new session id.
    pub fn shell_create(&self, cols: u16, rows: u16) -> EngineResult<String> {
        let id = Uuid::new_v4().to_string();
        self.shells.create_session(&id, cols, rows)?;
        Ok(id)
    }

    pub fn shell_write(&self, id: &str, data: &[u8]) -> EngineResult<()> {
        self.shells.write(id, data)
    }

    pub fn shell_poll(&self, id: &str) -> EngineResult<Option<Vec<u8>>> {
        self.shells.poll(id)
    }

    pub fn shell_resize(&self, id: &str, cols: u16, rows: u16) -> EngineResult<()> {
        self.shells.resize(id, cols, rows)
    }

    pub fn shell_cleanup(&self, id: &str) {
        self.shells.cleanup(id);
    }

    pub fn shell_ids(&self) -> Vec<String> {
        self.shells.session_ids()
    }

    // ── Input ─────────────────────────────────────────────────────────────────

    pub fn input_move(&self, x: i32, y: i32) -> EngineResult<()> {
        self.input.pointer.set_position(x, y)
    }

    pub fn input_button(&self, button: &str, pressed: bool) -> EngineResult<()> {
        if pressed {
            self.input.pointer.press(button)
        } else {
            self.input.pointer.release(button)
        }
    }

    pub fn input_scroll(&self, dx: i32, dy: i32) -> EngineResult<()> {
        self.input.pointer.scroll(dx, dy)
    }

    pub fn input_shortcut<S: AsRef<str>>(&self, modifiers: &[S], key: &str) -> EngineResult<()> {
        self.input.keyboard.shortcut(modifiers, key)
    }

    /// Runs a named shortcut such as `copy` or `ctrl+shift+s`.
    pub fn input_shortcut_named(&self, name: &str) -> EngineResult<()> {
        self.input.shortcut_named(name)
    }

    pub fn input_type(&self, text: &str) -> EngineResult<()> {
        self.input.type_text(text, None)
    }

    pub fn input_paste(&self, text: &str) -> EngineResult<()> {
        self.input.paste_text(text)
    }

    /// Types or pastes `text` depending on its length.
    pub fn input_enter(&self, text: &str) -> EngineResult<()> {
        self.input.enter_text(text)
    }

    pub fn input_apply(&self, event: &InputEvent) -> EngineResult<()> {
        self.input.apply(event)
    }

    pub fn cursor_position(&self) -> EngineResult<(i32, i32)> {
        self.input.pointer.position()
    }

    // ── Registry ──────────────────────────────────────────────────────────────

    /// Snapshot of all four stream channels.
    pub fn channels(&self) -> Vec<StreamChannel> {
        let video_owner = self.capture.owning_session();
        ChannelKind::ALL
            .into_iter()
            .map(|kind| {
                let (active, config, owning_session) = match kind {
                    ChannelKind::Video => (
                        video_owner.is_some(),
                        ChannelConfig::Video(self.capture.current_settings().config),
                        video_owner.clone(),
                    ),
                    _ => (
                        self.audio.is_active(kind),
                        ChannelConfig::Audio(self.audio.config(kind)),
                        None,
                    ),
                };
                StreamChannel {
                    id: self.channel_ids.get(&kind).copied().unwrap_or_default(),
                    kind,
                    state: if active {
                        ChannelState::Active
                    } else {
                        ChannelState::Idle
                    },
                    config,
                    owning_session,
                }
            })
            .collect()
    }

    /// Operator disconnect: stops video and audio, cleans up every shell.
    pub fn disconnect(&self) {
        self.capture.stop();
        self.audio.stop_all();
        self.shells.cleanup_all();
        info!("operator disconnected; all channels idle");
    }
}
