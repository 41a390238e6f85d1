//! Fallback backend for builds without a native input and capture stack.
//!
//! Every call reports [`PlatformError::DeviceUnavailable`], so the engine
//! still runs (shells keep working) while video and input start calls fail
//! cleanly.  The binary also uses it as the clipboard when the system
//! clipboard cannot be opened.

use crate::application::capture_pipeline::{CaptureBackend, CaptureDevice};
use crate::application::input_injector::{ClipboardBackend, InputBackend, RawInput};
use crate::application::platform::PlatformError;

#[derive(Debug, Default)]
pub struct UnavailablePlatform;

impl UnavailablePlatform {
    pub fn new() -> Result<Self, PlatformError> {
        Ok(Self)
    }
}

fn unavailable() -> PlatformError {
    PlatformError::DeviceUnavailable(format!(
        "no input or capture backend for {} in this build",
        std::env::consts::OS
    ))
}

impl InputBackend for UnavailablePlatform {
    fn inject(&self, _input: RawInput) -> Result<(), PlatformError> {
        Err(unavailable())
    }

    fn cursor_position(&self) -> Result<(i32, i32), PlatformError> {
        Err(unavailable())
    }

    fn screen_size(&self) -> Result<(u32, u32), PlatformError> {
        Err(unavailable())
    }
}

impl CaptureBackend for UnavailablePlatform {
    fn open_capture(&self, _target_fps: u32) -> Result<Box<dyn CaptureDevice>, PlatformError> {
        Err(unavailable())
    }

    fn active_window_title(&self) -> String {
        String::new()
    }
}

impl ClipboardBackend for UnavailablePlatform {
    fn get_text(&self) -> Result<Option<String>, PlatformError> {
        Err(unavailable())
    }

    fn set_text(&self, _text: &str) -> Result<(), PlatformError> {
        Err(unavailable())
    }

    fn clear(&self) -> Result<(), PlatformError> {
        Err(unavailable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_call_is_device_unavailable() {
        let platform = UnavailablePlatform;

        assert!(matches!(
            platform.cursor_position(),
            Err(PlatformError::DeviceUnavailable(_))
        ));
        assert!(platform.open_capture(30).is_err());
        assert_eq!(platform.active_window_title(), "");
        assert!(platform.set_text("x").is_err());
    }
}
