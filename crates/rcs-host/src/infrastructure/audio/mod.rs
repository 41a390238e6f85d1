//! Audio device backends.
//!
//! With the `audio` feature the engine uses [`cpal`] for every audio channel;
//! without it, [`UnavailableAudio`] makes each audio start fail with a
//! device error while the rest of the engine keeps working.

#[cfg(feature = "audio")]
pub mod cpal_backend;

use rcs_core::AudioConfig;

use crate::application::audio_router::{AudioBackend, AudioInput, AudioOutput};
use crate::application::platform::PlatformError;

#[cfg(feature = "audio")]
pub use self::cpal_backend::CpalAudio as NativeAudio;

#[cfg(not(feature = "audio"))]
pub use self::UnavailableAudio as NativeAudio;

/// Audio backend for builds without the `audio` feature.
#[derive(Debug, Default)]
pub struct UnavailableAudio;

impl UnavailableAudio {
    pub fn new() -> Self {
        Self
    }
}

fn unavailable() -> PlatformError {
    PlatformError::DeviceUnavailable("built without the audio feature".into())
}

impl AudioBackend for UnavailableAudio {
    fn input_devices(&self) -> Result<Vec<String>, PlatformError> {
        Ok(Vec::new())
    }

    fn open_input(
        &self,
        _device: Option<&str>,
        _config: &AudioConfig,
    ) -> Result<Box<dyn AudioInput>, PlatformError> {
        Err(unavailable())
    }

    fn open_output(&self, _config: &AudioConfig) -> Result<Box<dyn AudioOutput>, PlatformError> {
        Err(unavailable())
    }
}

/// Little-endian 16-bit PCM bytes to samples.  A trailing odd byte is dropped.
pub fn pcm_to_samples(pcm: &[u8]) -> Vec<i16> {
    pcm.chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

/// Samples to little-endian 16-bit PCM bytes.
pub fn samples_to_pcm(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
