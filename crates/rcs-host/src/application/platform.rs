//! Shared platform seam types.
//!
//! Every OS adapter reports failures as a [`PlatformError`]; the use cases
//! convert them into the engine taxonomy at the boundary.

use std::sync::Arc;

use rcs_core::{EngineError, EngineEvent};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use super::audio_router::AudioBackend;
use super::capture_pipeline::CaptureBackend;
use super::input_injector::{ClipboardBackend, InputBackend};

/// Error type for platform adapter operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// The device or display is missing or could not be opened.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// A read, write, or injection call failed on an open device.
    #[error("platform I/O error: {0}")]
    Io(String),

    /// The operation is not implemented by this backend.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl From<PlatformError> for EngineError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Io(msg) => EngineError::TransientIo(msg),
            PlatformError::DeviceUnavailable(msg) => EngineError::DeviceUnavailable(msg),
            PlatformError::Unsupported(msg) => EngineError::DeviceUnavailable(msg),
        }
    }
}

/// The set of OS backends the engine runs against.
///
/// Built once at startup (native backends in the binary, mocks in tests) and
/// cloned into each manager.
#[derive(Clone)]
pub struct PlatformServices {
    pub input: Arc<dyn InputBackend>,
    pub clipboard: Arc<dyn ClipboardBackend>,
    pub capture: Arc<dyn CaptureBackend>,
    pub audio: Arc<dyn AudioBackend>,
}

/// Publishes a lifecycle event without blocking the calling loop.
///
/// The event is dropped with a warning when the channel is full or closed.
pub(crate) fn emit_event(events: &mpsc::Sender<EngineEvent>, event: EngineEvent) {
    if let Err(e) = events.try_send(event) {
        warn!("engine event dropped: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcs_core::ErrorKind;

    #[test]
    fn test_io_maps_to_transient() {
        let err: EngineError = PlatformError::Io("write failed".into()).into();
        assert_eq!(err.kind(), ErrorKind::TransientIoError);
    }

    #[test]
    fn test_unsupported_maps_to_device_unavailable() {
        let err: EngineError = PlatformError::Unsupported("no display".into()).into();
        assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
    }
}
