//! CapturePipeline: owns the screen-capture device and runs the video and
//! cursor-broadcast loops.
//!
//! # Threads
//!
//! | Thread         | Produces                | Paced by              |
//! |----------------|-------------------------|-----------------------|
//! | `rcs-video`    | JPEG [`VideoFrame`]s    | target fps (0 = none) |
//! | `rcs-cursor`   | [`CursorPosition`]s     | target fps, max 60 Hz default |
//!
//! Both publish into `watch` slots, so a slow reader only ever sees the
//! newest value and the producers never block.
//!
//! The capture device is opened on the video thread and its open result is
//! handed back to [`CapturePipeline::start`] before it returns, so a missing
//! device fails the `start` call and leaves the channel idle.  The device is
//! dropped on the video thread before the run's active flag clears.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rcs_core::{
    ChannelKind, CursorPosition, EngineError, EngineEvent, EngineResult, VideoConfig,
    VideoFrame, VideoSettingsUpdate,
};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::frame_encoder::{encode_jpeg, encode_png, RawFrame};
use super::input_injector::PointerController;
use super::lock;
use super::platform::{emit_event, PlatformError};

/// Longest single sleep while pacing, bounding stop latency.
const PACE_SLICE: Duration = Duration::from_millis(20);
/// Sleep when the device has no new frame yet.
const IDLE_POLL: Duration = Duration::from_millis(5);
/// Attempts to obtain a screenshot frame before giving up.
const SCREENSHOT_ATTEMPTS: u32 = 40;
const SCREENSHOT_RETRY: Duration = Duration::from_millis(25);
/// Cursor broadcast rate when the video fps is unlimited.
const DEFAULT_CURSOR_FPS: u32 = 60;

// ── Platform seam ─────────────────────────────────────────────────────────────

/// An open capture session.  Dropping it releases the OS device.
pub trait CaptureDevice {
    /// Returns the most recent frame, or `None` if no new frame has been
    /// produced since the previous call.
    fn latest_frame(&mut self) -> Result<Option<RawFrame>, PlatformError>;
}

/// Screen capture provider.
pub trait CaptureBackend: Send + Sync {
    /// Opens the capture device at `target_fps` (0 = as fast as possible).
    ///
    /// Only one device may be open at a time.
    fn open_capture(&self, target_fps: u32) -> Result<Box<dyn CaptureDevice>, PlatformError>;

    /// Title of the foreground window, or an empty string.
    fn active_window_title(&self) -> String;
}

// ── Shared state ──────────────────────────────────────────────────────────────

/// Settings read by the loops on every iteration.
struct Shared {
    settings: Mutex<VideoConfig>,
    /// Raised by a target-fps change, consumed by the video loop.
    fps_changed: AtomicBool,
    native_size: Mutex<Option<(u32, u32)>>,
}

impl Shared {
    fn settings(&self) -> VideoConfig {
        *lock(&self.settings)
    }
}

/// Snapshot returned by [`CapturePipeline::current_settings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VideoSettingsSnapshot {
    #[serde(flatten)]
    pub config: VideoConfig,
    /// Native capture size, known once a frame has been seen.
    pub native_width: Option<u32>,
    pub native_height: Option<u32>,
    pub active: bool,
}

/// Receivers for the pipeline's keep-latest slots.
#[derive(Clone)]
pub struct CaptureOutputs {
    pub frames: watch::Receiver<Option<VideoFrame>>,
    pub cursor: watch::Receiver<Option<CursorPosition>>,
}

/// One continuous capture run.
struct RunHandle {
    session_id: String,
    active: Arc<AtomicBool>,
    video: Option<JoinHandle<()>>,
    cursor: Option<JoinHandle<()>>,
}

impl RunHandle {
    fn is_live(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn stop_and_join(mut self) {
        self.active.store(false, Ordering::Release);
        for handle in [self.video.take(), self.cursor.take()].into_iter().flatten() {
            if handle.join().is_err() {
                warn!("capture thread panicked");
            }
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

/// Measured fps: frames produced in the trailing one-second window.
#[derive(Debug, Default)]
pub struct FpsMeter {
    stamps: VecDeque<Instant>,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame at `now` and returns the current rate.
    pub fn tick(&mut self, now: Instant) -> u32 {
        self.stamps.push_back(now);
        while let Some(&front) = self.stamps.front() {
            if now.duration_since(front) > Duration::from_secs(1) {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
        self.stamps.len() as u32
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// The capture-encode use case.
pub struct CapturePipeline {
    backend: Arc<dyn CaptureBackend>,
    pointer: PointerController,
    shared: Arc<Shared>,
    frame_tx: Arc<watch::Sender<Option<VideoFrame>>>,
    cursor_tx: Arc<watch::Sender<Option<CursorPosition>>>,
    events: mpsc::Sender<EngineEvent>,
    run: Mutex<Option<RunHandle>>,
}

impl CapturePipeline {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        pointer: PointerController,
        settings: VideoConfig,
        events: mpsc::Sender<EngineEvent>,
    ) -> Self {
        let (frame_tx, _) = watch::channel(None);
        let (cursor_tx, _) = watch::channel(None);
        Self {
            backend,
            pointer,
            shared: Arc::new(Shared {
                settings: Mutex::new(settings),
                fps_changed: AtomicBool::new(false),
                native_size: Mutex::new(None),
            }),
            frame_tx: Arc::new(frame_tx),
            cursor_tx: Arc::new(cursor_tx),
            events,
            run: Mutex::new(None),
        }
    }

    /// Returns fresh receivers for the frame and cursor slots.
    pub fn outputs(&self) -> CaptureOutputs {
        CaptureOutputs {
            frames: self.frame_tx.subscribe(),
            cursor: self.cursor_tx.subscribe(),
        }
    }

    /// Starts continuous capture for `session_id`.
    ///
    /// A no-op if the same session is already streaming.  A different session
    /// takes the channel over: the old run is stopped and joined before the
    /// device is opened again.
    ///
    /// # Errors
    ///
    /// [`EngineError::DeviceUnavailable`] if the capture device cannot be
    /// opened; the channel stays idle.
    pub fn start(&self, session_id: &str) -> EngineResult<()> {
        let mut run = lock(&self.run);
        if let Some(current) = run.as_ref() {
            if current.session_id == session_id && current.is_live() {
                debug!(session_id, "video already streaming");
                return Ok(());
            }
        }
        if let Some(old) = run.take() {
            if old.is_live() {
                info!(from = %old.session_id, to = session_id, "video channel taken over");
            }
            old.stop_and_join();
        }

        self.shared.fps_changed.store(false, Ordering::Release);
        let active = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = sync_channel(1);

        let ctx = VideoLoop {
            session_id: session_id.to_string(),
            backend: Arc::clone(&self.backend),
            shared: Arc::clone(&self.shared),
            frame_tx: Arc::clone(&self.frame_tx),
            events: self.events.clone(),
            active: Arc::clone(&active),
        };
        let video = thread::Builder::new()
            .name("rcs-video".into())
            .spawn(move || ctx.run(ready_tx))
            .map_err(|e| EngineError::TransientIo(format!("spawn video thread: {e}")))?;

        let opened = ready_rx.recv();
        if !matches!(opened, Ok(Ok(()))) {
            active.store(false, Ordering::Release);
            if video.join().is_err() {
                warn!("video thread panicked during open");
            }
            return Err(match opened {
                Ok(Err(e)) => EngineError::DeviceUnavailable(e.to_string()),
                _ => EngineError::DeviceUnavailable("capture thread exited before open".into()),
            });
        }

        let cursor = {
            let ctx = CursorLoop {
                pointer: self.pointer.clone(),
                shared: Arc::clone(&self.shared),
                cursor_tx: Arc::clone(&self.cursor_tx),
                active: Arc::clone(&active),
            };
            thread::Builder::new()
                .name("rcs-cursor".into())
                .spawn(move || ctx.run())
        };
        let cursor = match cursor {
            Ok(handle) => Some(handle),
            Err(e) => {
                let handle = RunHandle {
                    session_id: session_id.to_string(),
                    active,
                    video: Some(video),
                    cursor: None,
                };
                handle.stop_and_join();
                return Err(EngineError::TransientIo(format!("spawn cursor thread: {e}")));
            }
        };

        *run = Some(RunHandle {
            session_id: session_id.to_string(),
            active,
            video: Some(video),
            cursor,
        });
        info!(session_id, "video channel active");
        Ok(())
    }

    /// Stops continuous capture and waits for the loops to release the device.
    pub fn stop(&self) {
        let mut run = lock(&self.run);
        if let Some(handle) = run.take() {
            let session_id = handle.session_id.clone();
            handle.stop_and_join();
            info!(%session_id, "video channel idle");
        }
    }

    pub fn is_active(&self) -> bool {
        lock(&self.run).as_ref().is_some_and(RunHandle::is_live)
    }

    /// The session owning the live run, if any.
    pub fn owning_session(&self) -> Option<String> {
        lock(&self.run)
            .as_ref()
            .filter(|r| r.is_live())
            .map(|r| r.session_id.clone())
    }

    /// Captures one frame as PNG.
    ///
    /// A running stream is stopped and joined first, since the device cannot
    /// be opened twice; the transport is notified through a
    /// [`EngineEvent::ChannelStopped`] and may restart it.
    pub fn screenshot(&self) -> EngineResult<Vec<u8>> {
        let mut run = lock(&self.run);
        if let Some(handle) = run.take() {
            let was_live = handle.is_live();
            handle.stop_and_join();
            if was_live {
                emit_event(
                    &self.events,
                    EngineEvent::ChannelStopped {
                        kind: ChannelKind::Video,
                        reason: "stopped for screenshot".into(),
                    },
                );
            }
        }

        let mut device = self
            .backend
            .open_capture(self.shared.settings().target_fps)
            .map_err(|e| EngineError::DeviceUnavailable(e.to_string()))?;
        for _ in 0..SCREENSHOT_ATTEMPTS {
            match device.latest_frame() {
                Ok(Some(frame)) => {
                    drop(device);
                    *lock(&self.shared.native_size) = Some((frame.width, frame.height));
                    return encode_png(frame);
                }
                Ok(None) => thread::sleep(SCREENSHOT_RETRY),
                Err(e) => return Err(EngineError::DeviceUnavailable(e.to_string())),
            }
        }
        Err(EngineError::DeviceUnavailable(
            "no frame obtainable for screenshot".into(),
        ))
    }

    /// Applies a partial settings update.
    ///
    /// Quality and resolution take effect on the next encode.  A changed
    /// target fps makes a running loop re-open the device at the new rate.
    /// While idle the values are stored for the next `start`.
    pub fn update_settings(&self, update: &VideoSettingsUpdate) -> VideoConfig {
        let (config, fps_changed) = {
            let mut settings = lock(&self.shared.settings);
            let changed = settings.apply(update);
            (*settings, changed)
        };
        if fps_changed && self.is_active() {
            self.shared.fps_changed.store(true, Ordering::Release);
        }
        debug!(?config, fps_changed, "video settings updated");
        config
    }

    pub fn current_settings(&self) -> VideoSettingsSnapshot {
        let native = *lock(&self.shared.native_size);
        VideoSettingsSnapshot {
            config: self.shared.settings(),
            native_width: native.map(|(w, _)| w),
            native_height: native.map(|(_, h)| h),
            active: self.is_active(),
        }
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Loops ─────────────────────────────────────────────────────────────────────

struct VideoLoop {
    session_id: String,
    backend: Arc<dyn CaptureBackend>,
    shared: Arc<Shared>,
    frame_tx: Arc<watch::Sender<Option<VideoFrame>>>,
    events: mpsc::Sender<EngineEvent>,
    active: Arc<AtomicBool>,
}

impl VideoLoop {
    fn run(self, ready: SyncSender<Result<(), PlatformError>>) {
        let _guard = ActiveGuard(Arc::clone(&self.active));

        let mut device = match self.backend.open_capture(self.shared.settings().target_fps) {
            Ok(device) => {
                let _ = ready.send(Ok(()));
                device
            }
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        drop(ready);

        let mut meter = FpsMeter::new();
        let mut sequence = 0u64;
        let mut discard_next = false;

        while self.active.load(Ordering::Acquire) {
            if self.shared.fps_changed.swap(false, Ordering::AcqRel) {
                drop(device);
                let fps = self.shared.settings().target_fps;
                device = match self.backend.open_capture(fps) {
                    Ok(device) => device,
                    Err(e) => {
                        self.fail(format!("re-open at {fps} fps failed: {e}"));
                        return;
                    }
                };
                info!(fps, "capture device re-opened");
                discard_next = true;
                continue;
            }

            let started = Instant::now();
            let frame = match device.latest_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    thread::sleep(IDLE_POLL);
                    continue;
                }
                Err(e) => {
                    self.fail(format!("frame grab failed: {e}"));
                    return;
                }
            };
            if discard_next {
                discard_next = false;
                continue;
            }

            *lock(&self.shared.native_size) = Some((frame.width, frame.height));
            let settings = self.shared.settings();
            let target = settings.scaled_size(frame.width, frame.height);
            let image = match encode_jpeg(frame, target, settings.quality) {
                Ok(image) => image,
                Err(e) => {
                    self.fail(e.to_string());
                    return;
                }
            };

            sequence += 1;
            let fps = meter.tick(Instant::now());
            self.frame_tx.send_replace(Some(VideoFrame {
                session_id: self.session_id.clone(),
                sequence,
                image,
                fps,
                active_window_title: self.backend.active_window_title(),
            }));

            pace(&self.active, started, settings.frame_interval());
        }
        debug!(session_id = %self.session_id, frames = sequence, "video loop exited");
    }

    fn fail(&self, reason: String) {
        error!(session_id = %self.session_id, "video loop stopped: {reason}");
        self.active.store(false, Ordering::Release);
        emit_event(
            &self.events,
            EngineEvent::ChannelStopped {
                kind: ChannelKind::Video,
                reason,
            },
        );
    }
}

struct CursorLoop {
    pointer: PointerController,
    shared: Arc<Shared>,
    cursor_tx: Arc<watch::Sender<Option<CursorPosition>>>,
    active: Arc<AtomicBool>,
}

impl CursorLoop {
    fn run(self) {
        while self.active.load(Ordering::Acquire) {
            let started = Instant::now();
            match self.pointer.position() {
                Ok((x, y)) => {
                    self.cursor_tx.send_replace(Some(CursorPosition { x, y }));
                }
                Err(e) => debug!("cursor read failed: {e}"),
            }
            let fps = match self.shared.settings().target_fps {
                0 => DEFAULT_CURSOR_FPS,
                fps => fps,
            };
            pace(
                &self.active,
                started,
                Some(Duration::from_secs_f64(1.0 / f64::from(fps))),
            );
        }
    }
}

/// Sleeps until `interval` has elapsed since `started`, in slices of at most
/// [`PACE_SLICE`], returning early once `active` clears.
fn pace(active: &AtomicBool, started: Instant, interval: Option<Duration>) {
    let Some(interval) = interval else {
        return;
    };
    loop {
        let elapsed = started.elapsed();
        if elapsed >= interval || !active.load(Ordering::Acquire) {
            return;
        }
        thread::sleep((interval - elapsed).min(PACE_SLICE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_meter_counts_trailing_second() {
        let mut meter = FpsMeter::new();
        let t0 = Instant::now();

        assert_eq!(meter.tick(t0), 1);
        assert_eq!(meter.tick(t0 + Duration::from_millis(500)), 2);
        assert_eq!(meter.tick(t0 + Duration::from_millis(900)), 3);
        // The first stamp is now more than a second old.
        assert_eq!(meter.tick(t0 + Duration::from_millis(1_400)), 3);
        assert_eq!(meter.tick(t0 + Duration::from_millis(3_000)), 1);
    }

    #[test]
    fn test_pace_returns_immediately_when_inactive() {
        let active = AtomicBool::new(false);
        let started = Instant::now();

        pace(&active, started, Some(Duration::from_secs(5)));

        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_pace_unlimited_does_not_sleep() {
        let active = AtomicBool::new(true);
        let started = Instant::now();

        pace(&active, started, None);

        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
