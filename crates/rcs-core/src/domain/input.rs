//! Logical input events accepted by the injector.
//!
//! These are decoded directly from the transport's JSON frames, so the serde
//! layout is part of the control-plane contract:
//!
//! ```json
//! {"type":"pointer-move","x":100,"y":200}
//! {"type":"key-shortcut","modifiers":["ctrl"],"key":"c"}
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Wheel units per scroll notch.
pub const WHEEL_DELTA: i32 = 120;

/// A logical pointer or keyboard event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InputEvent {
    /// Move the cursor to absolute screen coordinates.
    PointerMove { x: i32, y: i32 },
    /// Press or release a named mouse button.
    PointerButton { button: String, pressed: bool },
    /// Scroll by whole notches on each axis.
    PointerScroll { dx: i32, dy: i32 },
    /// Press modifiers and a key together, then release in reverse.
    KeyShortcut {
        #[serde(default)]
        modifiers: Vec<String>,
        key: String,
    },
    /// Tap each character in order.
    TypeText {
        text: String,
        #[serde(default)]
        interval_ms: Option<u64>,
    },
    /// Insert text through the clipboard.
    PasteText { text: String },
}

/// Hardware mouse buttons the injector can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    Left,
    Right,
    Middle,
}

impl FromStr for PointerButton {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(PointerButton::Left),
            "right" => Ok(PointerButton::Right),
            "middle" => Ok(PointerButton::Middle),
            other => Err(EngineError::PreconditionViolation(format!(
                "unknown mouse button: {other}"
            ))),
        }
    }
}
