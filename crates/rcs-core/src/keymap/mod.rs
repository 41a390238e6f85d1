//! Key translation tables for keyboard injection.
//!
//! The canonical representation is the PC set-1 scan code with an extended
//! flag.  Logical key names and characters from the operator resolve to a
//! [`KeyStroke`] here; platform backends translate scan codes to their own
//! keycodes at the injection boundary.

pub mod scancode;
pub mod shortcuts;
pub mod x11;

pub use scancode::ScanCode;
pub use shortcuts::KeyCombo;

/// How one logical key is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStroke {
    /// A physical key; `shifted` means shift is held around it.
    Scan { code: ScanCode, shifted: bool },
    /// A character outside the table, injected as UTF-16 code units.
    Unicode(char),
}

/// Unified key mapper providing all translation directions.
pub struct KeyMapper;

impl KeyMapper {
    /// Resolves a key name or single character.
    ///
    /// - Shifted printable characters (`A`, `!`, `?`, ...) resolve to their
    ///   base key with `shifted = true`.
    /// - Names and characters in the scan-code table resolve case-insensitively.
    /// - Any other single character resolves to [`KeyStroke::Unicode`].
    ///
    /// Returns `None` for an empty string or an unknown multi-character name.
    pub fn resolve(key: &str) -> Option<KeyStroke> {
        let mut chars = key.chars();
        let first = chars.next()?;
        if chars.next().is_none() {
            return Some(Self::resolve_char(first));
        }
        scancode::lookup(&key.to_ascii_lowercase()).map(|code| KeyStroke::Scan {
            code,
            shifted: false,
        })
    }

    /// Resolves a single character; never fails.
    pub fn resolve_char(c: char) -> KeyStroke {
        let mut buf = [0u8; 4];
        if let Some(base) = scancode::shifted_base(c) {
            if let Some(code) = scancode::lookup(base.encode_utf8(&mut buf)) {
                return KeyStroke::Scan {
                    code,
                    shifted: true,
                };
            }
        }
        match scancode::lookup(c.encode_utf8(&mut buf)) {
            Some(code) => KeyStroke::Scan {
                code,
                shifted: false,
            },
            None => KeyStroke::Unicode(c),
        }
    }

    /// Looks up a name in the scan-code table without shift decomposition.
    pub fn scan_code(name: &str) -> Option<ScanCode> {
        scancode::lookup(&name.to_ascii_lowercase())
    }

    /// Translates a scan code to an X11 keycode for XTest injection.
    pub fn scan_to_x11_keycode(sc: ScanCode) -> Option<u8> {
        x11::scan_to_keycode(sc)
    }

    /// Expands a named shortcut alias (`copy`, `alt-tab`, ...) or a literal
    /// `"ctrl+shift+s"` combo.
    pub fn shortcut(name: &str) -> Option<KeyCombo> {
        shortcuts::resolve_named(name)
    }
}
