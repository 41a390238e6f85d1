//! Audio devices through `cpal`.
//!
//! cpal drives each stream from its own callback thread.  The input callback
//! forwards converted samples over a channel and [`CpalInput::read_chunk`]
//! assembles them into fixed-size chunks.  The output callback drains a
//! shared sample buffer that [`CpalOutput::write`] fills, playing silence
//! when it runs dry.
//!
//! `cpal::Stream` is not `Send`, so both wrappers are created and dropped on
//! the audio loop thread that owns them.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, SampleRate, Stream, StreamConfig};
use rcs_core::AudioConfig;
use tracing::{debug, warn};

use super::{pcm_to_samples, samples_to_pcm};
use crate::application::audio_router::{AudioBackend, AudioInput, AudioOutput};
use crate::application::lock;
use crate::application::platform::PlatformError;

/// Longest `read_chunk` wait before reporting "no chunk yet".
const READ_TIMEOUT: Duration = Duration::from_millis(50);
/// Playback buffer limit in seconds of audio; older samples are discarded.
const MAX_BUFFERED_SECS: usize = 2;

type StreamFault = Arc<Mutex<Option<String>>>;

/// Audio backend on the default cpal host.
#[derive(Debug, Default)]
pub struct CpalAudio;

impl CpalAudio {
    pub fn new() -> Self {
        Self
    }
}

fn stream_config(config: &AudioConfig) -> StreamConfig {
    StreamConfig {
        channels: config.channels,
        sample_rate: SampleRate(config.sample_rate),
        buffer_size: BufferSize::Default,
    }
}

fn device_error(context: &str, e: impl std::fmt::Display) -> PlatformError {
    PlatformError::DeviceUnavailable(format!("{context}: {e}"))
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}

fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / f32::from(i16::MAX)
}

fn find_input(name: Option<&str>) -> Result<Device, PlatformError> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_input_device()
            .ok_or_else(|| PlatformError::DeviceUnavailable("no default input device".into())),
        Some(wanted) => host
            .input_devices()
            .map_err(|e| device_error("enumerate inputs", e))?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| PlatformError::DeviceUnavailable(format!("no input device {wanted}"))),
    }
}

fn record_fault(fault: &StreamFault) -> impl FnMut(cpal::StreamError) + Send + 'static {
    let fault = Arc::clone(fault);
    move |e| {
        warn!("audio stream error: {e}");
        *lock(&fault) = Some(e.to_string());
    }
}

impl AudioBackend for CpalAudio {
    fn input_devices(&self) -> Result<Vec<String>, PlatformError> {
        let devices = cpal::default_host()
            .input_devices()
            .map_err(|e| device_error("enumerate inputs", e))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    fn open_input(
        &self,
        device: Option<&str>,
        config: &AudioConfig,
    ) -> Result<Box<dyn AudioInput>, PlatformError> {
        let dev = find_input(device)?;
        let format = dev
            .default_input_config()
            .map_err(|e| device_error("input config", e))?
            .sample_format();
        let cfg = stream_config(config);
        let (tx, rx) = mpsc::channel::<Vec<i16>>();
        let fault: StreamFault = Arc::new(Mutex::new(None));

        let stream = match format {
            SampleFormat::I16 => dev.build_input_stream(
                &cfg,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let _ = tx.send(data.to_vec());
                },
                record_fault(&fault),
                None,
            ),
            SampleFormat::F32 => dev.build_input_stream(
                &cfg,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let _ = tx.send(data.iter().copied().map(f32_to_i16).collect());
                },
                record_fault(&fault),
                None,
            ),
            other => {
                return Err(PlatformError::Unsupported(format!(
                    "input sample format {other:?}"
                )))
            }
        }
        .map_err(|e| device_error("build input stream", e))?;
        stream.play().map_err(|e| device_error("start input stream", e))?;

        debug!(device = ?device, rate = config.sample_rate, "cpal input open");
        Ok(Box::new(CpalInput {
            _stream: stream,
            samples: rx,
            pending: Vec::new(),
            chunk_samples: config.chunk_size as usize * usize::from(config.channels),
            fault,
        }))
    }

    fn open_output(&self, config: &AudioConfig) -> Result<Box<dyn AudioOutput>, PlatformError> {
        let dev = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| PlatformError::DeviceUnavailable("no default output device".into()))?;
        let format = dev
            .default_output_config()
            .map_err(|e| device_error("output config", e))?
            .sample_format();
        let cfg = stream_config(config);
        let buffer: Arc<Mutex<VecDeque<i16>>> = Arc::new(Mutex::new(VecDeque::new()));
        let fault: StreamFault = Arc::new(Mutex::new(None));

        let source = Arc::clone(&buffer);
        let stream = match format {
            SampleFormat::I16 => dev.build_output_stream(
                &cfg,
                move |out: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    let mut queued = lock(&source);
                    for slot in out.iter_mut() {
                        *slot = queued.pop_front().unwrap_or(0);
                    }
                },
                record_fault(&fault),
                None,
            ),
            SampleFormat::F32 => dev.build_output_stream(
                &cfg,
                move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut queued = lock(&source);
                    for slot in out.iter_mut() {
                        *slot = queued.pop_front().map(i16_to_f32).unwrap_or(0.0);
                    }
                },
                record_fault(&fault),
                None,
            ),
            other => {
                return Err(PlatformError::Unsupported(format!(
                    "output sample format {other:?}"
                )))
            }
        }
        .map_err(|e| device_error("build output stream", e))?;
        stream.play().map_err(|e| device_error("start output stream", e))?;

        debug!(rate = config.sample_rate, "cpal output open");
        Ok(Box::new(CpalOutput {
            _stream: stream,
            buffer,
            max_samples: config.sample_rate as usize
                * usize::from(config.channels)
                * MAX_BUFFERED_SECS,
            fault,
        }))
    }
}

struct CpalInput {
    _stream: Stream,
    samples: Receiver<Vec<i16>>,
    pending: Vec<i16>,
    chunk_samples: usize,
    fault: StreamFault,
}

impl AudioInput for CpalInput {
    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, PlatformError> {
        if let Some(e) = lock(&self.fault).take() {
            return Err(PlatformError::Io(e));
        }
        while self.pending.len() < self.chunk_samples {
            match self.samples.recv_timeout(READ_TIMEOUT) {
                Ok(batch) => self.pending.extend_from_slice(&batch),
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(PlatformError::Io("input stream closed".into()))
                }
            }
        }
        let chunk: Vec<i16> = self.pending.drain(..self.chunk_samples).collect();
        Ok(Some(samples_to_pcm(&chunk)))
    }
}

struct CpalOutput {
    _stream: Stream,
    buffer: Arc<Mutex<VecDeque<i16>>>,
    max_samples: usize,
    fault: StreamFault,
}

impl AudioOutput for CpalOutput {
    fn write(&mut self, pcm: &[u8]) -> Result<(), PlatformError> {
        if let Some(e) = lock(&self.fault).take() {
            return Err(PlatformError::Io(e));
        }
        let mut buffer = lock(&self.buffer);
        buffer.extend(pcm_to_samples(pcm));
        let excess = buffer.len().saturating_sub(self.max_samples);
        if excess > 0 {
            buffer.drain(..excess);
        }
        Ok(())
    }
}
