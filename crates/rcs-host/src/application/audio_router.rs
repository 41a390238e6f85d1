//! AudioRouter: the three duplex audio channels.
//!
//! | Channel          | Direction | Settings record | Device                     |
//! |------------------|-----------|-----------------|----------------------------|
//! | `audio-mic`      | input     | server          | default input              |
//! | `audio-system`   | input     | server          | discovered loopback input  |
//! | `audio-playback` | output    | client          | default output             |
//!
//! Each active channel owns one device on its own thread.  Input channels
//! push fixed-size [`AudioChunk`]s to the transport with `try_send`, dropping
//! chunks when the transport falls behind.  The playback channel pops from a
//! bounded queue with a 50 ms timeout so that a stop is noticed promptly.
//!
//! Settings changes are validated and stored under the router lock, and apply
//! only on the next `start` of a channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self as std_mpsc, sync_channel, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rcs_core::{
    AudioChunk, AudioConfig, AudioSettingsUpdate, AudioTarget, ChannelKind, EngineError,
    EngineEvent, EngineResult,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::lock;
use super::platform::{emit_event, PlatformError};

/// Playback queue pop timeout; bounds how long a stopped channel lingers.
const PLAYBACK_POLL: Duration = Duration::from_millis(50);

/// Default loopback device name patterns (matched case-insensitively).
pub const DEFAULT_LOOPBACK_PATTERNS: &[&str] =
    &["stereo mix", "loopback", "monitor of", "what u hear"];

// ── Platform seam ─────────────────────────────────────────────────────────────

/// An open capture stream.  Dropping it releases the device.
pub trait AudioInput {
    /// Returns the next full chunk of 16-bit little-endian PCM, or `None` if
    /// no full chunk became available within a short wait (at most 50 ms).
    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, PlatformError>;
}

/// An open playback stream.  Dropping it releases the device.
pub trait AudioOutput {
    /// Queues 16-bit little-endian PCM for playback.
    fn write(&mut self, pcm: &[u8]) -> Result<(), PlatformError>;
}

/// Audio device provider.
pub trait AudioBackend: Send + Sync {
    /// Names of the available input devices.
    fn input_devices(&self) -> Result<Vec<String>, PlatformError>;

    /// Opens an input device by exact name, or the default input for `None`.
    fn open_input(
        &self,
        device: Option<&str>,
        config: &AudioConfig,
    ) -> Result<Box<dyn AudioInput>, PlatformError>;

    /// Opens the default output device.
    fn open_output(&self, config: &AudioConfig) -> Result<Box<dyn AudioOutput>, PlatformError>;
}

// ── Router state ──────────────────────────────────────────────────────────────

/// Static router options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioRouterSettings {
    pub server: AudioConfig,
    pub client: AudioConfig,
    pub loopback_patterns: Vec<String>,
    /// Capacity of the playback queue in chunks.
    pub playback_queue: usize,
}

impl Default for AudioRouterSettings {
    fn default() -> Self {
        Self {
            server: AudioConfig::server_default(),
            client: AudioConfig::client_default(),
            loopback_patterns: DEFAULT_LOOPBACK_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            playback_queue: 64,
        }
    }
}

struct ChannelSlot {
    active: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    /// Sending side of the playback queue; `None` for input channels.
    inbound: Option<SyncSender<Vec<u8>>>,
}

impl ChannelSlot {
    fn is_live(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn stop_and_join(mut self) {
        self.active.store(false, Ordering::Release);
        self.inbound = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("audio thread panicked");
            }
        }
    }
}

struct RouterState {
    server: AudioConfig,
    client: AudioConfig,
    slots: HashMap<ChannelKind, ChannelSlot>,
}

impl RouterState {
    fn config_for(&self, kind: ChannelKind) -> AudioConfig {
        match kind {
            ChannelKind::AudioPlayback => self.client,
            _ => self.server,
        }
    }
}

/// Clears the run flag when the owning loop exits for any reason.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The audio routing use case.
pub struct AudioRouter {
    backend: Arc<dyn AudioBackend>,
    loopback_patterns: Vec<String>,
    playback_queue: usize,
    state: Mutex<RouterState>,
    chunk_tx: mpsc::Sender<AudioChunk>,
    events: mpsc::Sender<EngineEvent>,
}

impl AudioRouter {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        settings: AudioRouterSettings,
        chunk_tx: mpsc::Sender<AudioChunk>,
        events: mpsc::Sender<EngineEvent>,
    ) -> Self {
        Self {
            backend,
            loopback_patterns: settings
                .loopback_patterns
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            playback_queue: settings.playback_queue.max(1),
            state: Mutex::new(RouterState {
                server: settings.server,
                client: settings.client,
                slots: HashMap::new(),
            }),
            chunk_tx,
            events,
        }
    }

    /// Starts an audio channel.  A no-op if it is already active.
    ///
    /// # Errors
    ///
    /// - [`EngineError::PreconditionViolation`] for the video channel.
    /// - [`EngineError::DeviceUnavailable`] if no device can be opened, or no
    ///   loopback device is found for `audio-system`.
    pub fn start(&self, kind: ChannelKind) -> EngineResult<()> {
        require_audio(kind)?;
        let mut state = lock(&self.state);
        if state.slots.get(&kind).is_some_and(ChannelSlot::is_live) {
            debug!(channel = %kind, "audio channel already active");
            return Ok(());
        }
        if let Some(stale) = state.slots.remove(&kind) {
            stale.stop_and_join();
        }

        let config = state.config_for(kind);
        let device = match kind {
            ChannelKind::AudioSystem => Some(self.discover_loopback(&config)?),
            _ => None,
        };

        let active = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = sync_channel(1);
        let (inbound, playback_rx) = if kind == ChannelKind::AudioPlayback {
            let (tx, rx) = sync_channel(self.playback_queue);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let ctx = AudioLoop {
            kind,
            config,
            backend: Arc::clone(&self.backend),
            active: Arc::clone(&active),
            chunk_tx: self.chunk_tx.clone(),
            events: self.events.clone(),
        };
        let spawned = thread::Builder::new()
            .name(format!("rcs-{kind}"))
            .spawn(move || match playback_rx {
                Some(rx) => ctx.run_output(rx, ready_tx),
                None => ctx.run_input(device, ready_tx),
            })
            .map_err(|e| EngineError::TransientIo(format!("spawn audio thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            opened => {
                active.store(false, Ordering::Release);
                if spawned.join().is_err() {
                    warn!(channel = %kind, "audio thread panicked during open");
                }
                return Err(match opened {
                    Ok(Err(e)) => EngineError::DeviceUnavailable(e.to_string()),
                    _ => EngineError::DeviceUnavailable("audio thread exited before open".into()),
                });
            }
        }

        state.slots.insert(
            kind,
            ChannelSlot {
                active,
                handle: Some(spawned),
                inbound,
            },
        );
        info!(
            channel = %kind,
            rate = config.sample_rate,
            chunk = config.chunk_size,
            "audio channel active"
        );
        Ok(())
    }

    /// Stops an audio channel and waits for its device to be released.
    /// Stopping an idle channel is a no-op.
    pub fn stop(&self, kind: ChannelKind) -> EngineResult<()> {
        require_audio(kind)?;
        let mut state = lock(&self.state);
        if let Some(slot) = state.slots.remove(&kind) {
            slot.stop_and_join();
            info!(channel = %kind, "audio channel idle");
        }
        Ok(())
    }

    /// Stops every audio channel.
    pub fn stop_all(&self) {
        let mut state = lock(&self.state);
        for (kind, slot) in state.slots.drain() {
            slot.stop_and_join();
            info!(channel = %kind, "audio channel idle");
        }
    }

    /// Queues operator audio for playback.
    ///
    /// Returns `false` when the chunk was dropped because playback is not
    /// active or its queue is full.
    ///
    /// # Errors
    ///
    /// [`EngineError::PreconditionViolation`] for any channel other than
    /// `audio-playback`.
    pub fn push_inbound(&self, kind: ChannelKind, chunk: Vec<u8>) -> EngineResult<bool> {
        if kind != ChannelKind::AudioPlayback {
            return Err(EngineError::PreconditionViolation(format!(
                "cannot push audio into {kind}"
            )));
        }
        let state = lock(&self.state);
        let Some(tx) = state
            .slots
            .get(&kind)
            .filter(|slot| slot.is_live())
            .and_then(|slot| slot.inbound.as_ref())
        else {
            return Ok(false);
        };
        match tx.try_send(chunk) {
            Ok(()) => Ok(true),
            Err(std_mpsc::TrySendError::Full(_)) => {
                debug!("playback queue full; chunk dropped");
                Ok(false)
            }
            Err(std_mpsc::TrySendError::Disconnected(_)) => Ok(false),
        }
    }

    /// Validates and stores new settings for `target`.  Running channels keep
    /// their current settings until restarted.
    pub fn update_settings(
        &self,
        target: AudioTarget,
        update: &AudioSettingsUpdate,
    ) -> EngineResult<AudioConfig> {
        let mut state = lock(&self.state);
        let slot = match target {
            AudioTarget::Server => &mut state.server,
            AudioTarget::Client => &mut state.client,
        };
        *slot = slot.with_update(update)?;
        debug!(?target, config = ?*slot, "audio settings updated");
        Ok(*slot)
    }

    pub fn is_active(&self, kind: ChannelKind) -> bool {
        lock(&self.state)
            .slots
            .get(&kind)
            .is_some_and(ChannelSlot::is_live)
    }

    /// The settings record a channel uses on its next start.
    pub fn config(&self, kind: ChannelKind) -> AudioConfig {
        lock(&self.state).config_for(kind)
    }

    /// Finds the first input device whose name matches a loopback pattern
    /// and that can actually be opened.
    fn discover_loopback(&self, config: &AudioConfig) -> EngineResult<String> {
        let devices = self
            .backend
            .input_devices()
            .map_err(|e| EngineError::DeviceUnavailable(e.to_string()))?;
        for name in devices {
            let lower = name.to_lowercase();
            if !self.loopback_patterns.iter().any(|p| lower.contains(p)) {
                continue;
            }
            match self.backend.open_input(Some(&name), config) {
                Ok(trial) => {
                    drop(trial);
                    debug!(device = %name, "loopback device found");
                    return Ok(name);
                }
                Err(e) => debug!(device = %name, "loopback candidate rejected: {e}"),
            }
        }
        Err(EngineError::DeviceUnavailable(
            "no loopback capture device found".into(),
        ))
    }
}

impl Drop for AudioRouter {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn require_audio(kind: ChannelKind) -> EngineResult<()> {
    if kind.is_audio() {
        Ok(())
    } else {
        Err(EngineError::PreconditionViolation(format!(
            "{kind} is not an audio channel"
        )))
    }
}

// ── Loops ─────────────────────────────────────────────────────────────────────

struct AudioLoop {
    kind: ChannelKind,
    config: AudioConfig,
    backend: Arc<dyn AudioBackend>,
    active: Arc<AtomicBool>,
    chunk_tx: mpsc::Sender<AudioChunk>,
    events: mpsc::Sender<EngineEvent>,
}

impl AudioLoop {
    fn run_input(self, device: Option<String>, ready: SyncSender<Result<(), PlatformError>>) {
        let _guard = ActiveGuard(Arc::clone(&self.active));
        let mut input = match self.backend.open_input(device.as_deref(), &self.config) {
            Ok(input) => {
                let _ = ready.send(Ok(()));
                input
            }
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        drop(ready);

        let mut dropped = 0u64;
        while self.active.load(Ordering::Acquire) {
            match input.read_chunk() {
                Ok(Some(data)) => {
                    let chunk = AudioChunk {
                        channel: self.kind,
                        data,
                    };
                    if self.chunk_tx.try_send(chunk).is_err() {
                        dropped += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    self.fail(format!("capture read failed: {e}"));
                    return;
                }
            }
        }
        debug!(channel = %self.kind, dropped, "audio input loop exited");
    }

    fn run_output(self, queue: Receiver<Vec<u8>>, ready: SyncSender<Result<(), PlatformError>>) {
        let _guard = ActiveGuard(Arc::clone(&self.active));
        let mut output = match self.backend.open_output(&self.config) {
            Ok(output) => {
                let _ = ready.send(Ok(()));
                output
            }
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        drop(ready);

        let mut drained = 0;
        while self.active.load(Ordering::Acquire) {
            match queue.recv_timeout(PLAYBACK_POLL) {
                Ok(pcm) => {
                    // A stop may land while blocked in recv.
                    if !self.active.load(Ordering::Acquire) {
                        drained += 1;
                        break;
                    }
                    if let Err(e) = output.write(&pcm) {
                        self.fail(format!("playback write failed: {e}"));
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        drained += queue.try_iter().count();
        debug!(channel = %self.kind, drained, "audio output loop exited");
    }

    fn fail(&self, reason: String) {
        error!(channel = %self.kind, "audio loop stopped: {reason}");
        self.active.store(false, Ordering::Release);
        emit_event(
            &self.events,
            EngineEvent::ChannelStopped {
                kind: self.kind,
                reason,
            },
        );
    }
}
