//! Integration tests for key resolution through the public [`KeyMapper`] API.
//!
//! These cover the three resolution paths the injector relies on: the named
//! scan-code table, shift decomposition of printable characters, and the
//! Unicode fallback for characters outside the table.

use rcs_core::keymap::{KeyMapper, KeyStroke, ScanCode};

fn scan(key: &str) -> (ScanCode, bool) {
    match KeyMapper::resolve(key) {
        Some(KeyStroke::Scan { code, shifted }) => (code, shifted),
        other => panic!("{key:?} resolved to {other:?}"),
    }
}

#[test]
fn test_named_keys_resolve_case_insensitively() {
    let (lower, _) = scan("pagedown");
    let (upper, _) = scan("PageDown");
    assert_eq!(lower, upper);
    assert_eq!(lower, ScanCode::ext(0x51));
}

#[test]
fn test_uppercase_letter_decomposes_to_shift_and_base() {
    let (code, shifted) = scan("A");
    assert!(shifted);
    assert_eq!(code, scan("a").0);
}

#[test]
fn test_shifted_punctuation_uses_base_key() {
    let (bang, shifted) = scan("!");
    assert!(shifted);
    assert_eq!(bang, scan("1").0);

    let (question, shifted) = scan("?");
    assert!(shifted);
    assert_eq!(question, scan("/").0);
}

#[test]
fn test_character_outside_table_falls_back_to_unicode() {
    assert_eq!(KeyMapper::resolve("é"), Some(KeyStroke::Unicode('é')));
    assert_eq!(KeyMapper::resolve("😀"), Some(KeyStroke::Unicode('😀')));
}

#[test]
fn test_unknown_multi_character_name_is_none() {
    assert_eq!(KeyMapper::resolve("hyperkey"), None);
    assert_eq!(KeyMapper::resolve(""), None);
}

#[test]
fn test_modifier_aliases_resolve_to_same_code() {
    assert_eq!(KeyMapper::scan_code("win"), KeyMapper::scan_code("windows"));
    assert_eq!(KeyMapper::scan_code("ctrl"), KeyMapper::scan_code("control"));
}

#[test]
fn test_named_shortcut_expansion() {
    let combo = KeyMapper::shortcut("alt-tab").unwrap();
    assert_eq!(combo.modifiers, vec!["alt"]);
    assert_eq!(combo.key, "tab");
    // Every alias key must itself resolve in the table.
    for name in ["copy", "paste", "selectall", "win", "pgdown", "esc"] {
        let combo = KeyMapper::shortcut(name).unwrap();
        assert!(KeyMapper::resolve(&combo.key).is_some(), "{name}");
    }
}

#[test]
fn test_x11_keycodes_for_common_keys() {
    assert_eq!(KeyMapper::scan_to_x11_keycode(scan("enter").0), Some(36));
    assert_eq!(KeyMapper::scan_to_x11_keycode(scan("esc").0), Some(9));
    assert_eq!(KeyMapper::scan_to_x11_keycode(scan("delete").0), Some(119));
}
