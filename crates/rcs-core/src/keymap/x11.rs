//! Scan code to X11 keycode translation for the XTest backend.
//!
//! On evdev-based X servers a keycode is the Linux input event code plus 8.
//! For the non-extended keys in the table the evdev code equals the set-1
//! scan code; the extended keys get their own evdev codes.

use super::scancode::ScanCode;

/// Offset between Linux evdev key codes and X11 keycodes.
const EVDEV_OFFSET: u16 = 8;

/// Translates a [`ScanCode`] to an X11 keycode.
///
/// Returns `None` for extended codes the table does not cover.
pub fn scan_to_keycode(sc: ScanCode) -> Option<u8> {
    let evdev = if sc.extended {
        match sc.code {
            0x1C => 96,  // KEY_KPENTER
            0x1D => 97,  // KEY_RIGHTCTRL
            0x35 => 98,  // KEY_KPSLASH
            0x37 => 99,  // KEY_SYSRQ
            0x38 => 100, // KEY_RIGHTALT
            0x45 => 119, // KEY_PAUSE
            0x47 => 102, // KEY_HOME
            0x48 => 103, // KEY_UP
            0x49 => 104, // KEY_PAGEUP
            0x4B => 105, // KEY_LEFT
            0x4D => 106, // KEY_RIGHT
            0x4F => 107, // KEY_END
            0x50 => 108, // KEY_DOWN
            0x51 => 109, // KEY_PAGEDOWN
            0x52 => 110, // KEY_INSERT
            0x53 => 111, // KEY_DELETE
            0x5B => 125, // KEY_LEFTMETA
            0x5C => 126, // KEY_RIGHTMETA
            0x5D => 127, // KEY_COMPOSE
            _ => return None,
        }
    } else {
        sc.code
    };
    u8::try_from(evdev + EVDEV_OFFSET).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::scancode::lookup;

    #[test]
    fn test_letter_a_maps_to_keycode_38() {
        assert_eq!(scan_to_keycode(lookup("a").unwrap()), Some(38));
    }

    #[test]
    fn test_arrow_up_maps_to_keycode_111() {
        assert_eq!(scan_to_keycode(lookup("up").unwrap()), Some(111));
    }

    #[test]
    fn test_unknown_extended_code_is_none() {
        assert_eq!(scan_to_keycode(ScanCode::ext(0x01)), None);
    }
}
