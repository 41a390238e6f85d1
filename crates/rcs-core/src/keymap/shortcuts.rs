//! Named shortcut aliases and `"mod+mod+key"` combo parsing.

use serde::{Deserialize, Serialize};

/// A parsed key combination: modifiers pressed in order, then `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCombo {
    pub modifiers: Vec<String>,
    pub key: String,
}

/// Alias name to combo string.
const ALIASES: &[(&str, &str)] = &[
    ("copy", "ctrl+c"),
    ("paste", "ctrl+v"),
    ("cut", "ctrl+x"),
    ("undo", "ctrl+z"),
    ("redo", "ctrl+y"),
    ("save", "ctrl+s"),
    ("find", "ctrl+f"),
    ("selectall", "ctrl+a"),
    ("tab", "tab"),
    ("alt-tab", "alt+tab"),
    ("win", "windows"),
    ("del", "delete"),
    ("backspace", "backspace"),
    ("esc", "escape"),
    ("enter", "enter"),
    ("up", "up"),
    ("down", "down"),
    ("left", "left"),
    ("right", "right"),
    ("pgup", "page up"),
    ("pgdown", "page down"),
    ("home", "home"),
    ("end", "end"),
    ("space", "space"),
];

/// Returns the combo string for a named alias.
pub fn alias(name: &str) -> Option<&'static str> {
    let name = name.trim().to_ascii_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, combo)| *combo)
}

/// Splits `"ctrl+shift+s"` into modifiers and a final key.
///
/// A trailing `"++"` names the plus key itself.  Returns `None` for an empty
/// combo or an empty component.
pub fn parse_combo(combo: &str) -> Option<KeyCombo> {
    let combo = combo.trim();
    if combo.is_empty() {
        return None;
    }
    let (head, key) = if combo == "+" {
        ("", "+")
    } else if let Some(head) = combo.strip_suffix("++") {
        (head, "+")
    } else {
        match combo.rsplit_once('+') {
            Some((head, key)) => (head, key.trim()),
            None => ("", combo),
        }
    };
    if key.is_empty() {
        return None;
    }
    let mut modifiers = Vec::new();
    if !head.is_empty() {
        for part in head.split('+') {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            modifiers.push(part.to_string());
        }
    }
    Some(KeyCombo {
        modifiers,
        key: key.to_string(),
    })
}

/// Resolves an alias or a literal combo string.
pub fn resolve_named(name: &str) -> Option<KeyCombo> {
    parse_combo(alias(name).unwrap_or(name))
}
