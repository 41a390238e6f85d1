//! InputInjector: translates logical pointer and keyboard events into raw OS
//! input.
//!
//! This use case sits at the application layer and delegates to an
//! [`InputBackend`] trait object for OS-level event injection.  The
//! platform-specific implementations are in the infrastructure layer.
//!
//! Every call is stateless apart from the fixed key tables in
//! [`rcs_core::keymap`].  The one rule that spans calls is that no modifier
//! may be left held down: a shortcut that fails part-way still releases every
//! key it pressed, in reverse order, before the error is returned.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rcs_core::keymap::scancode::SHIFT;
use rcs_core::keymap::{KeyMapper, KeyStroke, ScanCode};
use rcs_core::{EngineError, EngineResult, InputEvent, PointerButton, WHEEL_DELTA};
use tracing::{debug, warn};

use super::platform::PlatformError;

/// Largest coordinate in the normalized absolute pointer space.
pub const NORMALIZED_MAX: i32 = 65_535;

/// One raw OS input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInput {
    /// Absolute move.  `x`/`y` are clamped screen pixels, `nx`/`ny` the same
    /// point in normalized absolute space (`1..=65535`).
    MouseMove { x: i32, y: i32, nx: i32, ny: i32 },
    MouseButton { button: PointerButton, down: bool },
    /// Wheel movement in `WHEEL_DELTA` units; positive is up or right.
    Wheel { delta: i32, horizontal: bool },
    Key { code: ScanCode, down: bool },
    /// One UTF-16 code unit injected without a scan code.
    Unicode { unit: u16, down: bool },
}

/// Platform-agnostic input injection trait.
///
/// Each supported OS provides an implementation in the infrastructure layer.
pub trait InputBackend: Send + Sync {
    /// Injects a single raw event.
    fn inject(&self, input: RawInput) -> Result<(), PlatformError>;

    /// Returns the current OS cursor position in screen pixels.
    fn cursor_position(&self) -> Result<(i32, i32), PlatformError>;

    /// Returns the primary screen size in pixels.
    fn screen_size(&self) -> Result<(u32, u32), PlatformError>;
}

/// Text clipboard access used by [`InputInjector::paste_text`].
#[cfg_attr(test, mockall::automock)]
pub trait ClipboardBackend: Send + Sync {
    /// Returns the clipboard text, or `None` if it holds no text.
    fn get_text(&self) -> Result<Option<String>, PlatformError>;

    fn set_text(&self, text: &str) -> Result<(), PlatformError>;

    fn clear(&self) -> Result<(), PlatformError>;
}

/// Timing knobs for text entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSettings {
    /// Default pause between typed characters.
    pub type_interval: Duration,
    /// Wait after `ctrl+v` before the clipboard is restored.
    pub paste_settle: Duration,
    /// `enter_text` types strings of at most this many characters and pastes
    /// longer ones.
    pub paste_threshold: usize,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            type_interval: Duration::ZERO,
            paste_settle: Duration::from_millis(100),
            paste_threshold: 1,
        }
    }
}

/// Converts a clamped pixel coordinate into normalized absolute space.
pub fn normalize(value: i32, extent: u32) -> i32 {
    if extent == 0 {
        return 0;
    }
    let scaled = i64::from(value.max(0)) * 65_536 / i64::from(extent) + 1;
    scaled.min(i64::from(NORMALIZED_MAX)) as i32
}

// ── Pointer ───────────────────────────────────────────────────────────────────

/// Mouse sub-controller.
#[derive(Clone)]
pub struct PointerController {
    backend: Arc<dyn InputBackend>,
}

impl PointerController {
    pub fn new(backend: Arc<dyn InputBackend>) -> Self {
        Self { backend }
    }

    /// Reads the live OS cursor position.
    pub fn position(&self) -> EngineResult<(i32, i32)> {
        Ok(self.backend.cursor_position()?)
    }

    /// Moves the cursor to `(x, y)`, clamped to the screen bounds.
    pub fn set_position(&self, x: i32, y: i32) -> EngineResult<()> {
        let (width, height) = self.backend.screen_size()?;
        if width == 0 || height == 0 {
            return Err(EngineError::DeviceUnavailable(
                "screen reports zero size".into(),
            ));
        }
        let x = x.clamp(0, width as i32 - 1);
        let y = y.clamp(0, height as i32 - 1);
        self.backend.inject(RawInput::MouseMove {
            x,
            y,
            nx: normalize(x, width),
            ny: normalize(y, height),
        })?;
        Ok(())
    }

    pub fn press(&self, button: &str) -> EngineResult<()> {
        self.button(button, true)
    }

    pub fn release(&self, button: &str) -> EngineResult<()> {
        self.button(button, false)
    }

    fn button(&self, name: &str, down: bool) -> EngineResult<()> {
        let button: PointerButton = name.parse()?;
        self.backend.inject(RawInput::MouseButton { button, down })?;
        Ok(())
    }

    /// Scrolls `dy` notches vertically, then `dx` notches horizontally.
    /// A zero axis emits nothing.
    pub fn scroll(&self, dx: i32, dy: i32) -> EngineResult<()> {
        for (notches, horizontal) in [(dy, false), (dx, true)] {
            if notches != 0 {
                self.backend.inject(RawInput::Wheel {
                    delta: notches.saturating_mul(WHEEL_DELTA),
                    horizontal,
                })?;
            }
        }
        Ok(())
    }
}

// ── Keyboard ──────────────────────────────────────────────────────────────────

/// Keyboard sub-controller.
#[derive(Clone)]
pub struct KeyboardController {
    backend: Arc<dyn InputBackend>,
}

impl KeyboardController {
    pub fn new(backend: Arc<dyn InputBackend>) -> Self {
        Self { backend }
    }

    /// Presses a named key or single character.
    ///
    /// Shifted characters press shift first.  Characters outside the table
    /// emit UTF-16 key-down units.
    pub fn press(&self, key: &str) -> EngineResult<()> {
        self.press_stroke(resolve(key)?)
    }

    /// Releases a named key or single character, mirroring [`press`](Self::press).
    pub fn release(&self, key: &str) -> EngineResult<()> {
        self.release_stroke(resolve(key)?)
    }

    /// Presses and releases one key.
    pub fn tap(&self, key: &str) -> EngineResult<()> {
        self.tap_stroke(resolve(key)?)
    }

    /// Presses `modifiers` in order, then `key`, then releases everything in
    /// reverse.
    ///
    /// Every name is resolved before anything is pressed.  If a press fails,
    /// the keys already down are released before the error is returned.
    pub fn shortcut<S: AsRef<str>>(&self, modifiers: &[S], key: &str) -> EngineResult<()> {
        let strokes = modifiers
            .iter()
            .map(|m| resolve(m.as_ref()))
            .chain(std::iter::once(resolve(key)))
            .collect::<EngineResult<Vec<_>>>()?;

        let mut pressed = Vec::with_capacity(strokes.len());
        let mut result = Ok(());
        for stroke in strokes {
            match self.press_stroke(stroke) {
                Ok(()) => pressed.push(stroke),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        for stroke in pressed.into_iter().rev() {
            if let Err(e) = self.release_stroke(stroke) {
                warn!("shortcut release failed: {e}");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Types one character.
    pub fn tap_char(&self, c: char) -> EngineResult<()> {
        self.tap_stroke(KeyMapper::resolve_char(c))
    }

    fn tap_stroke(&self, stroke: KeyStroke) -> EngineResult<()> {
        if let KeyStroke::Unicode(c) = stroke {
            return self.unicode_tap(c);
        }
        self.press_stroke(stroke)?;
        self.release_stroke(stroke)
    }

    fn press_stroke(&self, stroke: KeyStroke) -> EngineResult<()> {
        match stroke {
            KeyStroke::Scan { code, shifted } => {
                if shifted {
                    self.key(SHIFT, true)?;
                    if let Err(e) = self.key(code, true) {
                        let _ = self.key(SHIFT, false);
                        return Err(e);
                    }
                    Ok(())
                } else {
                    self.key(code, true)
                }
            }
            KeyStroke::Unicode(c) => self.unicode(c, true),
        }
    }

    fn release_stroke(&self, stroke: KeyStroke) -> EngineResult<()> {
        match stroke {
            KeyStroke::Scan { code, shifted } => {
                let result = self.key(code, false);
                if shifted {
                    let shift = self.key(SHIFT, false);
                    result.and(shift)
                } else {
                    result
                }
            }
            KeyStroke::Unicode(c) => self.unicode(c, false),
        }
    }

    fn key(&self, code: ScanCode, down: bool) -> EngineResult<()> {
        self.backend.inject(RawInput::Key { code, down })?;
        Ok(())
    }

    fn unicode(&self, c: char, down: bool) -> EngineResult<()> {
        let mut buf = [0u16; 2];
        for &unit in c.encode_utf16(&mut buf).iter() {
            self.backend.inject(RawInput::Unicode { unit, down })?;
        }
        Ok(())
    }

    fn unicode_tap(&self, c: char) -> EngineResult<()> {
        let mut buf = [0u16; 2];
        for &unit in c.encode_utf16(&mut buf).iter() {
            self.backend.inject(RawInput::Unicode { unit, down: true })?;
            self.backend.inject(RawInput::Unicode { unit, down: false })?;
        }
        Ok(())
    }
}

fn resolve(key: &str) -> EngineResult<KeyStroke> {
    KeyMapper::resolve(key)
        .ok_or_else(|| EngineError::PreconditionViolation(format!("unknown key: {key:?}")))
}

// ── Injector ──────────────────────────────────────────────────────────────────

/// The input injection use case: pointer and keyboard controllers plus the
/// clipboard-assisted text entry built on top of them.
pub struct InputInjector {
    pub pointer: PointerController,
    pub keyboard: KeyboardController,
    clipboard: Arc<dyn ClipboardBackend>,
    settings: InputSettings,
}

impl InputInjector {
    pub fn new(
        backend: Arc<dyn InputBackend>,
        clipboard: Arc<dyn ClipboardBackend>,
        settings: InputSettings,
    ) -> Self {
        Self {
            pointer: PointerController::new(Arc::clone(&backend)),
            keyboard: KeyboardController::new(backend),
            clipboard,
            settings,
        }
    }

    /// Expands a named alias (`copy`, `alt-tab`, ...) or a `"ctrl+shift+s"`
    /// combo and runs it as a shortcut.
    pub fn shortcut_named(&self, name: &str) -> EngineResult<()> {
        let combo = KeyMapper::shortcut(name).ok_or_else(|| {
            EngineError::PreconditionViolation(format!("unknown shortcut: {name:?}"))
        })?;
        self.keyboard.shortcut(combo.modifiers.as_slice(), &combo.key)
    }

    /// Taps each character of `text`, pausing `interval` (or the configured
    /// default) between characters.
    pub fn type_text(&self, text: &str, interval: Option<Duration>) -> EngineResult<()> {
        let interval = interval.unwrap_or(self.settings.type_interval);
        for c in text.chars() {
            self.keyboard.tap_char(c)?;
            if !interval.is_zero() {
                thread::sleep(interval);
            }
        }
        Ok(())
    }

    /// Inserts `text` through the clipboard.
    ///
    /// The previous clipboard text is restored afterwards (or the clipboard
    /// cleared if it held none), also when the paste shortcut failed.
    ///
    /// # Errors
    ///
    /// If the clipboard cannot be read first, the error is returned and the
    /// clipboard is left untouched.
    pub fn paste_text(&self, text: &str) -> EngineResult<()> {
        let saved = self.clipboard.get_text().map_err(|e| {
            warn!("could not read clipboard before paste: {e}");
            EngineError::from(e)
        })?;
        self.clipboard.set_text(text)?;

        let result = self.keyboard.shortcut(&["ctrl"], "v");
        thread::sleep(self.settings.paste_settle);

        let restored = match saved {
            Some(previous) => self.clipboard.set_text(&previous),
            None => self.clipboard.clear(),
        };
        debug!(chars = text.chars().count(), "pasted text");
        result?;
        restored.map_err(Into::into)
    }

    /// Types short text and pastes long text.
    pub fn enter_text(&self, text: &str) -> EngineResult<()> {
        if text.chars().count() <= self.settings.paste_threshold {
            self.type_text(text, None)
        } else {
            self.paste_text(text)
        }
    }

    /// Dispatches one logical input event.
    pub fn apply(&self, event: &InputEvent) -> EngineResult<()> {
        match event {
            InputEvent::PointerMove { x, y } => self.pointer.set_position(*x, *y),
            InputEvent::PointerButton { button, pressed } => {
                if *pressed {
                    self.pointer.press(button)
                } else {
                    self.pointer.release(button)
                }
            }
            InputEvent::PointerScroll { dx, dy } => self.pointer.scroll(*dx, *dy),
            InputEvent::KeyShortcut { modifiers, key } => {
                self.keyboard.shortcut(modifiers.as_slice(), key)
            }
            InputEvent::TypeText { text, interval_ms } => {
                self.type_text(text, interval_ms.map(Duration::from_millis))
            }
            InputEvent::PasteText { text } => self.paste_text(text),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
