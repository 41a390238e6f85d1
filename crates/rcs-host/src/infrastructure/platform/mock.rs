//! Mock platform backends for tests.
//!
//! # Why a mock platform?
//!
//! The native backends move the real cursor, grab the real screen, and open
//! real audio devices.  None of that can run on a headless CI machine or be
//! observed from a test.
//!
//! [`MockPlatform`] implements every platform seam in memory:
//!
//! - injected input is recorded in `injected`,
//! - capture and audio devices produce synthetic frames and PCM and count
//!   how many are open at once in [`MockDevices`],
//! - playback writes are recorded in `played`,
//! - the clipboard is a [`MockClipboard`] with an operation log.
//!
//! # Usage in tests
//!
//! ```ignore
//! let platform = Arc::new(MockPlatform::new());
//! let registry = SessionRegistry::new(platform.services(), EngineSettings::default())?;
//!
//! registry.input_move(10, 20)?;
//!
//! let injected = platform.injected.lock().unwrap();
//! assert!(matches!(injected[0], RawInput::MouseMove { x: 10, y: 20, .. }));
//! ```
//!
//! # Failure switches
//!
//! The `fail_*` flags make the matching OS call fail.  `MockDevices::fail_reads`
//! is atomic so a test can break a running loop's device mid-stream.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rcs_core::AudioConfig;

use crate::application::audio_router::{AudioBackend, AudioInput, AudioOutput};
use crate::application::capture_pipeline::{CaptureBackend, CaptureDevice};
use crate::application::frame_encoder::RawFrame;
use crate::application::input_injector::{ClipboardBackend, InputBackend, RawInput};
use crate::application::lock;
use crate::application::platform::{PlatformError, PlatformServices};

/// Simulated time between two synthetic frames.
const FRAME_DELAY: Duration = Duration::from_millis(2);
/// Simulated time between two synthetic audio chunks.
const CHUNK_DELAY: Duration = Duration::from_millis(10);

/// Live device accounting shared with every open mock device.
#[derive(Debug, Default)]
pub struct MockDevices {
    /// Capture devices currently open.
    pub open_captures: AtomicUsize,
    /// Most capture devices ever open at the same time.
    pub peak_captures: AtomicUsize,
    /// Frames handed out by every capture device so far.
    pub frames_served: AtomicUsize,
    /// Audio devices currently open, inputs and outputs together.
    pub open_audio: AtomicUsize,
    /// When set, every open device fails its next read or write.
    pub fail_reads: AtomicBool,
}

impl MockDevices {
    fn capture_opened(&self) {
        let now = self.open_captures.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_captures.fetch_max(now, Ordering::SeqCst);
    }
}

/// Clipboard operations recorded by [`MockClipboard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardOp {
    Get,
    Set(String),
    Clear,
}

/// In-memory clipboard.
#[derive(Debug, Default)]
pub struct MockClipboard {
    pub text: Mutex<Option<String>>,
    pub ops: Mutex<Vec<ClipboardOp>>,
    pub should_fail: bool,
}

impl MockClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clipboard that starts out holding `text`.
    pub fn with_text(text: &str) -> Self {
        Self {
            text: Mutex::new(Some(text.to_string())),
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), PlatformError> {
        if self.should_fail {
            return Err(PlatformError::Io("mock clipboard failure".into()));
        }
        Ok(())
    }
}

impl ClipboardBackend for MockClipboard {
    fn get_text(&self) -> Result<Option<String>, PlatformError> {
        lock(&self.ops).push(ClipboardOp::Get);
        self.check()?;
        Ok(lock(&self.text).clone())
    }

    fn set_text(&self, text: &str) -> Result<(), PlatformError> {
        lock(&self.ops).push(ClipboardOp::Set(text.to_string()));
        self.check()?;
        *lock(&self.text) = Some(text.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), PlatformError> {
        lock(&self.ops).push(ClipboardOp::Clear);
        self.check()?;
        *lock(&self.text) = None;
        Ok(())
    }
}

/// A platform that records every call without touching the OS.
pub struct MockPlatform {
    /// Every injected raw input event, in order.
    pub injected: Mutex<Vec<RawInput>>,
    /// Position reported by `cursor_position`.
    pub cursor: Mutex<(i32, i32)>,
    pub screen: (u32, u32),
    /// Make every injection fail.
    pub fail_input: bool,

    pub clipboard: Arc<MockClipboard>,

    /// Size of the synthetic frames.
    pub frame_size: (u32, u32),
    pub window_title: String,
    /// Target fps passed to each `open_capture`, in order.
    pub capture_opens: Mutex<Vec<u32>>,
    pub fail_capture_open: bool,

    /// Names returned by `input_devices`.
    pub input_devices: Vec<String>,
    /// Device names whose open always fails.
    pub broken_devices: Vec<String>,
    /// `(device, config)` of each successful input open, `None` = default.
    pub input_opens: Mutex<Vec<(Option<String>, AudioConfig)>>,
    /// Config of each successful output open.
    pub output_opens: Mutex<Vec<AudioConfig>>,
    pub fail_audio_open: bool,
    /// PCM written to playback devices, one entry per write.
    pub played: Arc<Mutex<Vec<Vec<u8>>>>,

    pub devices: Arc<MockDevices>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self {
            injected: Mutex::new(Vec::new()),
            cursor: Mutex::new((0, 0)),
            screen: (1920, 1080),
            fail_input: false,
            clipboard: Arc::new(MockClipboard::new()),
            frame_size: (64, 48),
            window_title: "Mock Window".to_string(),
            capture_opens: Mutex::new(Vec::new()),
            fail_capture_open: false,
            input_devices: vec!["Microphone (Mock)".to_string()],
            broken_devices: Vec::new(),
            input_opens: Mutex::new(Vec::new()),
            output_opens: Mutex::new(Vec::new()),
            fail_audio_open: false,
            played: Arc::new(Mutex::new(Vec::new())),
            devices: Arc::new(MockDevices::default()),
        }
    }
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundles this mock as every backend of a [`PlatformServices`].
    pub fn services(self: &Arc<Self>) -> PlatformServices {
        PlatformServices {
            input: Arc::clone(self) as Arc<dyn InputBackend>,
            clipboard: Arc::clone(&self.clipboard) as Arc<dyn ClipboardBackend>,
            capture: Arc::clone(self) as Arc<dyn CaptureBackend>,
            audio: Arc::clone(self) as Arc<dyn AudioBackend>,
        }
    }

    /// Snapshot of the injected events.
    pub fn injected(&self) -> Vec<RawInput> {
        lock(&self.injected).clone()
    }
}

impl InputBackend for MockPlatform {
    fn inject(&self, input: RawInput) -> Result<(), PlatformError> {
        if self.fail_input {
            return Err(PlatformError::Io("mock injection failure".into()));
        }
        if let RawInput::MouseMove { x, y, .. } = input {
            *lock(&self.cursor) = (x, y);
        }
        lock(&self.injected).push(input);
        Ok(())
    }

    fn cursor_position(&self) -> Result<(i32, i32), PlatformError> {
        Ok(*lock(&self.cursor))
    }

    fn screen_size(&self) -> Result<(u32, u32), PlatformError> {
        Ok(self.screen)
    }
}

// ── Capture ───────────────────────────────────────────────────────────────────

struct MockCaptureDevice {
    devices: Arc<MockDevices>,
    size: (u32, u32),
    served: u8,
}

impl CaptureDevice for MockCaptureDevice {
    fn latest_frame(&mut self) -> Result<Option<RawFrame>, PlatformError> {
        if self.devices.fail_reads.load(Ordering::SeqCst) {
            return Err(PlatformError::Io("mock capture failure".into()));
        }
        thread::sleep(FRAME_DELAY);
        self.served = self.served.wrapping_add(1);
        self.devices.frames_served.fetch_add(1, Ordering::SeqCst);
        Ok(Some(RawFrame::solid(
            self.size.0,
            self.size.1,
            [self.served, 0x40, 0x80],
        )))
    }
}

impl Drop for MockCaptureDevice {
    fn drop(&mut self) {
        self.devices.open_captures.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CaptureBackend for MockPlatform {
    fn open_capture(&self, target_fps: u32) -> Result<Box<dyn CaptureDevice>, PlatformError> {
        if self.fail_capture_open {
            return Err(PlatformError::DeviceUnavailable("mock capture unavailable".into()));
        }
        if self.devices.open_captures.load(Ordering::SeqCst) > 0 {
            return Err(PlatformError::DeviceUnavailable(
                "mock capture device already open".into(),
            ));
        }
        lock(&self.capture_opens).push(target_fps);
        self.devices.capture_opened();
        Ok(Box::new(MockCaptureDevice {
            devices: Arc::clone(&self.devices),
            size: self.frame_size,
            served: 0,
        }))
    }

    fn active_window_title(&self) -> String {
        self.window_title.clone()
    }
}

// ── Audio ─────────────────────────────────────────────────────────────────────

struct MockAudioInput {
    devices: Arc<MockDevices>,
    chunk_bytes: usize,
    served: u8,
}

impl AudioInput for MockAudioInput {
    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, PlatformError> {
        if self.devices.fail_reads.load(Ordering::SeqCst) {
            return Err(PlatformError::Io("mock audio read failure".into()));
        }
        thread::sleep(CHUNK_DELAY);
        self.served = self.served.wrapping_add(1);
        Ok(Some(vec![self.served; self.chunk_bytes]))
    }
}

impl Drop for MockAudioInput {
    fn drop(&mut self) {
        self.devices.open_audio.fetch_sub(1, Ordering::SeqCst);
    }
}

struct MockAudioOutput {
    devices: Arc<MockDevices>,
    played: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl AudioOutput for MockAudioOutput {
    fn write(&mut self, pcm: &[u8]) -> Result<(), PlatformError> {
        if self.devices.fail_reads.load(Ordering::SeqCst) {
            return Err(PlatformError::Io("mock audio write failure".into()));
        }
        lock(&self.played).push(pcm.to_vec());
        Ok(())
    }
}

impl Drop for MockAudioOutput {
    fn drop(&mut self) {
        self.devices.open_audio.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AudioBackend for MockPlatform {
    fn input_devices(&self) -> Result<Vec<String>, PlatformError> {
        Ok(self.input_devices.clone())
    }

    fn open_input(
        &self,
        device: Option<&str>,
        config: &AudioConfig,
    ) -> Result<Box<dyn AudioInput>, PlatformError> {
        if self.fail_audio_open {
            return Err(PlatformError::DeviceUnavailable("mock audio unavailable".into()));
        }
        if let Some(name) = device {
            if !self.input_devices.iter().any(|d| d == name) {
                return Err(PlatformError::DeviceUnavailable(format!("no device {name}")));
            }
            if self.broken_devices.iter().any(|d| d == name) {
                return Err(PlatformError::DeviceUnavailable(format!("{name} is broken")));
            }
        }
        lock(&self.input_opens).push((device.map(str::to_string), *config));
        self.devices.open_audio.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockAudioInput {
            devices: Arc::clone(&self.devices),
            chunk_bytes: config.chunk_bytes(),
            served: 0,
        }))
    }

    fn open_output(&self, config: &AudioConfig) -> Result<Box<dyn AudioOutput>, PlatformError> {
        if self.fail_audio_open {
            return Err(PlatformError::DeviceUnavailable("mock audio unavailable".into()));
        }
        lock(&self.output_opens).push(*config);
        self.devices.open_audio.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockAudioOutput {
            devices: Arc::clone(&self.devices),
            played: Arc::clone(&self.played),
        }))
    }
}
