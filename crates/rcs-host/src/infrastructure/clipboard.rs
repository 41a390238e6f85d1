//! System clipboard text through `arboard`.
//!
//! The `arboard::Clipboard` handle is kept for the process lifetime: on X11
//! the clipboard contents are served by the owning process and vanish when
//! the handle is dropped.

use std::sync::Mutex;

use crate::application::input_injector::ClipboardBackend;
use crate::application::lock;
use crate::application::platform::PlatformError;

pub struct ArboardClipboard {
    inner: Mutex<arboard::Clipboard>,
}

impl ArboardClipboard {
    /// Opens the system clipboard.
    ///
    /// # Errors
    ///
    /// [`PlatformError::DeviceUnavailable`] when no clipboard is reachable,
    /// for example on a headless Linux session.
    pub fn new() -> Result<Self, PlatformError> {
        let inner = arboard::Clipboard::new()
            .map_err(|e| PlatformError::DeviceUnavailable(format!("clipboard: {e}")))?;
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }
}

impl ClipboardBackend for ArboardClipboard {
    fn get_text(&self) -> Result<Option<String>, PlatformError> {
        match lock(&self.inner).get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(PlatformError::Io(format!("clipboard read: {e}"))),
        }
    }

    fn set_text(&self, text: &str) -> Result<(), PlatformError> {
        lock(&self.inner)
            .set_text(text.to_owned())
            .map_err(|e| PlatformError::Io(format!("clipboard write: {e}")))
    }

    fn clear(&self) -> Result<(), PlatformError> {
        lock(&self.inner)
            .clear()
            .map_err(|e| PlatformError::Io(format!("clipboard clear: {e}")))
    }
}
