//! Logical key name to PC scan code (set 1) translation table.
//!
//! Scan codes identify physical key positions independently of the active
//! keyboard layout.  Keys on the "grey" cluster (arrows, navigation block,
//! right-hand modifiers, Windows keys) share a base code with a numpad or
//! left-hand key and are distinguished by the `E0` extended prefix, which is
//! carried here as [`ScanCode::extended`].
//!
//! | Name     | Code | Extended |
//! |----------|------|----------|
//! | `a`      | 0x1E | no       |
//! | `enter`  | 0x1C | no       |
//! | `up`     | 0x48 | yes      |
//! | `win`    | 0x5B | yes      |

use serde::{Deserialize, Serialize};

/// A set-1 scan code plus its extended-prefix flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanCode {
    pub code: u16,
    pub extended: bool,
}

impl ScanCode {
    pub const fn base(code: u16) -> Self {
        Self {
            code,
            extended: false,
        }
    }

    pub const fn ext(code: u16) -> Self {
        Self {
            code,
            extended: true,
        }
    }
}

/// Scan code for the left shift key, used to decompose shifted characters.
pub const SHIFT: ScanCode = ScanCode::base(0x2A);

/// Looks up a lowercase key name or single character.
///
/// Names are matched exactly; callers lowercase multi-character names first.
pub fn lookup(name: &str) -> Option<ScanCode> {
    let sc = match name {
        // Function keys
        "f1" => ScanCode::base(0x3B),
        "f2" => ScanCode::base(0x3C),
        "f3" => ScanCode::base(0x3D),
        "f4" => ScanCode::base(0x3E),
        "f5" => ScanCode::base(0x3F),
        "f6" => ScanCode::base(0x40),
        "f7" => ScanCode::base(0x41),
        "f8" => ScanCode::base(0x42),
        "f9" => ScanCode::base(0x43),
        "f10" => ScanCode::base(0x44),
        "f11" => ScanCode::base(0x57),
        "f12" => ScanCode::base(0x58),

        // System keys
        "escape" | "esc" => ScanCode::base(0x01),
        "tab" | "\t" => ScanCode::base(0x0F),
        "enter" | "return" | "\n" => ScanCode::base(0x1C),
        " " | "space" => ScanCode::base(0x39),
        "backspace" => ScanCode::base(0x0E),
        "delete" | "del" => ScanCode::ext(0x53),
        "insert" | "ins" => ScanCode::ext(0x52),
        "printscreen" | "prtsc" => ScanCode::ext(0x37),
        "scrolllock" => ScanCode::base(0x46),
        "pause" => ScanCode::ext(0x45),
        "capslock" => ScanCode::base(0x3A),
        "numlock" => ScanCode::base(0x45),

        // Modifiers
        "shift" | "shiftleft" => SHIFT,
        "shiftright" => ScanCode::base(0x36),
        "ctrl" | "control" | "ctrlleft" => ScanCode::base(0x1D),
        "ctrlright" => ScanCode::ext(0x1D),
        "alt" | "option" | "altleft" => ScanCode::base(0x38),
        "altright" | "altgr" => ScanCode::ext(0x38),
        "win" | "windows" | "winleft" | "cmd" | "meta" | "super" => ScanCode::ext(0x5B),
        "winright" => ScanCode::ext(0x5C),
        "apps" | "menu" => ScanCode::ext(0x5D),

        // Navigation
        "up" => ScanCode::ext(0x48),
        "down" => ScanCode::ext(0x50),
        "left" => ScanCode::ext(0x4B),
        "right" => ScanCode::ext(0x4D),
        "home" => ScanCode::ext(0x47),
        "end" => ScanCode::ext(0x4F),
        "pageup" | "pgup" | "page up" => ScanCode::ext(0x49),
        "pagedown" | "pgdn" | "pgdown" | "page down" => ScanCode::ext(0x51),

        // Punctuation
        "`" => ScanCode::base(0x29),
        "-" => ScanCode::base(0x0C),
        "=" => ScanCode::base(0x0D),
        "[" => ScanCode::base(0x1A),
        "]" => ScanCode::base(0x1B),
        "\\" => ScanCode::base(0x2B),
        ";" => ScanCode::base(0x27),
        "'" => ScanCode::base(0x28),
        "," => ScanCode::base(0x33),
        "." => ScanCode::base(0x34),
        "/" => ScanCode::base(0x35),

        // Digits
        "1" => ScanCode::base(0x02),
        "2" => ScanCode::base(0x03),
        "3" => ScanCode::base(0x04),
        "4" => ScanCode::base(0x05),
        "5" => ScanCode::base(0x06),
        "6" => ScanCode::base(0x07),
        "7" => ScanCode::base(0x08),
        "8" => ScanCode::base(0x09),
        "9" => ScanCode::base(0x0A),
        "0" => ScanCode::base(0x0B),

        // Letters
        "a" => ScanCode::base(0x1E),
        "b" => ScanCode::base(0x30),
        "c" => ScanCode::base(0x2E),
        "d" => ScanCode::base(0x20),
        "e" => ScanCode::base(0x12),
        "f" => ScanCode::base(0x21),
        "g" => ScanCode::base(0x22),
        "h" => ScanCode::base(0x23),
        "i" => ScanCode::base(0x17),
        "j" => ScanCode::base(0x24),
        "k" => ScanCode::base(0x25),
        "l" => ScanCode::base(0x26),
        "m" => ScanCode::base(0x32),
        "n" => ScanCode::base(0x31),
        "o" => ScanCode::base(0x18),
        "p" => ScanCode::base(0x19),
        "q" => ScanCode::base(0x10),
        "r" => ScanCode::base(0x13),
        "s" => ScanCode::base(0x1F),
        "t" => ScanCode::base(0x14),
        "u" => ScanCode::base(0x16),
        "v" => ScanCode::base(0x2F),
        "w" => ScanCode::base(0x11),
        "x" => ScanCode::base(0x2D),
        "y" => ScanCode::base(0x15),
        "z" => ScanCode::base(0x2C),

        _ => return None,
    };
    Some(sc)
}

/// Returns the unshifted base character of a character that needs shift on a
/// US layout, or `None` if `c` is typed without shift.
pub fn shifted_base(c: char) -> Option<char> {
    if c.is_ascii_uppercase() {
        return Some(c.to_ascii_lowercase());
    }
    let base = match c {
        '~' => '`',
        '!' => '1',
        '@' => '2',
        '#' => '3',
        '$' => '4',
        '%' => '5',
        '^' => '6',
        '&' => '7',
        '*' => '8',
        '(' => '9',
        ')' => '0',
        '_' => '-',
        '+' => '=',
        '{' => '[',
        '}' => ']',
        '|' => '\\',
        ':' => ';',
        '"' => '\'',
        '<' => ',',
        '>' => '.',
        '?' => '/',
        _ => return None,
    };
    Some(base)
}
