//! Input vocabulary: mouse buttons, symbolic keys and raw hook events

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Prefix older recordings put in front of key names (`Key.enter`)
const LEGACY_KEY_PREFIX: &str = "Key.";
/// Prefix older recordings put in front of button names (`Button.left`)
const LEGACY_BUTTON_PREFIX: &str = "Button.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Left,
    Right,
    Middle,
}

impl Button {
    pub fn as_str(&self) -> &'static str {
        match self {
            Button::Left => "left",
            Button::Right => "right",
            Button::Middle => "middle",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Button {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.strip_prefix(LEGACY_BUTTON_PREFIX).unwrap_or(s);
        match name.to_lowercase().as_str() {
            "left" => Ok(Button::Left),
            "right" => Ok(Button::Right),
            "middle" => Ok(Button::Middle),
            _ => Err(Error::malformed(format!("unknown mouse button '{}'", s))),
        }
    }
}

impl Serialize for Button {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Button {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e: Error| serde::de::Error::custom(e.message))
    }
}

/// Keys that have a name rather than a printable character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Enter,
    Escape,
    Tab,
    Space,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    Shift,
    ShiftLeft,
    ShiftRight,
    Ctrl,
    CtrlLeft,
    CtrlRight,
    Alt,
    AltLeft,
    AltRight,
    AltGr,
    Cmd,
    CmdLeft,
    CmdRight,
    CapsLock,
    NumLock,
    ScrollLock,
    PrintScreen,
    Pause,
    Menu,
    /// F1 through F24
    F(u8),
}

const KEY_NAMES: &[(NamedKey, &str)] = &[
    (NamedKey::Enter, "enter"),
    (NamedKey::Escape, "esc"),
    (NamedKey::Tab, "tab"),
    (NamedKey::Space, "space"),
    (NamedKey::Backspace, "backspace"),
    (NamedKey::Delete, "delete"),
    (NamedKey::Insert, "insert"),
    (NamedKey::Home, "home"),
    (NamedKey::End, "end"),
    (NamedKey::PageUp, "page_up"),
    (NamedKey::PageDown, "page_down"),
    (NamedKey::Up, "up"),
    (NamedKey::Down, "down"),
    (NamedKey::Left, "left"),
    (NamedKey::Right, "right"),
    (NamedKey::Shift, "shift"),
    (NamedKey::ShiftLeft, "shift_l"),
    (NamedKey::ShiftRight, "shift_r"),
    (NamedKey::Ctrl, "ctrl"),
    (NamedKey::CtrlLeft, "ctrl_l"),
    (NamedKey::CtrlRight, "ctrl_r"),
    (NamedKey::Alt, "alt"),
    (NamedKey::AltLeft, "alt_l"),
    (NamedKey::AltRight, "alt_r"),
    (NamedKey::AltGr, "alt_gr"),
    (NamedKey::Cmd, "cmd"),
    (NamedKey::CmdLeft, "cmd_l"),
    (NamedKey::CmdRight, "cmd_r"),
    (NamedKey::CapsLock, "caps_lock"),
    (NamedKey::NumLock, "num_lock"),
    (NamedKey::ScrollLock, "scroll_lock"),
    (NamedKey::PrintScreen, "print_screen"),
    (NamedKey::Pause, "pause"),
    (NamedKey::Menu, "menu"),
];

impl NamedKey {
    pub fn name(&self) -> String {
        if let NamedKey::F(n) = self {
            return format!("f{}", n);
        }
        KEY_NAMES
            .iter()
            .find(|(k, _)| k == self)
            .map(|(_, name)| name.to_string())
            .unwrap_or_default()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
            return (1..=24).contains(&n).then_some(NamedKey::F(n));
        }
        match lower.as_str() {
            "escape" => return Some(NamedKey::Escape),
            "return" => return Some(NamedKey::Enter),
            _ => {}
        }
        KEY_NAMES
            .iter()
            .find(|(_, n)| *n == lower)
            .map(|(k, _)| *k)
    }
}

/// Symbolic key identity as reported by the hook and replayed by the injector
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Printable character
    Char(char),
    Named(NamedKey),
    /// Anything else the hook reported (raw virtual key codes, media keys)
    Other(String),
}

impl Key {
    pub fn is_named(&self, key: NamedKey) -> bool {
        matches!(self, Key::Named(k) if *k == key)
    }
}

impl From<NamedKey> for Key {
    fn from(k: NamedKey) -> Self {
        Key::Named(k)
    }
}

impl From<char> for Key {
    fn from(c: char) -> Self {
        Key::Char(c)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{}", c),
            Key::Named(k) => f.write_str(&k.name()),
            Key::Other(s) => f.write_str(s),
        }
    }
}

impl FromStr for Key {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ok(Key::Char(c));
        }
        let name = s.strip_prefix(LEGACY_KEY_PREFIX).unwrap_or(s);
        if name.is_empty() {
            return Err(Error::malformed("empty key identifier"));
        }
        Ok(NamedKey::from_name(name)
            .map(Key::Named)
            .unwrap_or_else(|| Key::Other(s.to_string())))
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e: Error| serde::de::Error::custom(e.message))
    }
}

/// One event as delivered by the OS input hook, in absolute screen pixels
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    Move { x: f64, y: f64 },
    Button { x: f64, y: f64, button: Button, pressed: bool },
    Key { key: Key, pressed: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_printable_char() {
        assert_eq!("a".parse::<Key>().unwrap(), Key::Char('a'));
        assert_eq!(".".parse::<Key>().unwrap(), Key::Char('.'));
    }

    #[test]
    fn parse_named_and_legacy() {
        assert_eq!("enter".parse::<Key>().unwrap(), Key::Named(NamedKey::Enter));
        assert_eq!("Key.esc".parse::<Key>().unwrap(), Key::Named(NamedKey::Escape));
        assert_eq!("Key.f9".parse::<Key>().unwrap(), Key::Named(NamedKey::F(9)));
        assert_eq!("shift_r".parse::<Key>().unwrap(), Key::Named(NamedKey::ShiftRight));
    }

    #[test]
    fn unknown_key_kept_verbatim() {
        let k: Key = "<65437>".parse().unwrap();
        assert_eq!(k, Key::Other("<65437>".into()));
        assert_eq!(k.to_string(), "<65437>");
    }

    #[test]
    fn empty_key_rejected() {
        assert!("".parse::<Key>().is_err());
        assert!("Key.".parse::<Key>().is_err());
    }

    #[test]
    fn function_key_range() {
        assert_eq!(NamedKey::from_name("f24"), Some(NamedKey::F(24)));
        assert_eq!(NamedKey::from_name("f25"), None);
        assert_eq!(NamedKey::F(12).name(), "f12");
    }

    #[test]
    fn button_accepts_legacy_form() {
        assert_eq!("Button.right".parse::<Button>().unwrap(), Button::Right);
        assert_eq!("middle".parse::<Button>().unwrap(), Button::Middle);
        assert!("x1".parse::<Button>().is_err());
    }

    #[test]
    fn key_serializes_as_string() {
        let json = serde_json::to_string(&Key::Named(NamedKey::PageDown)).unwrap();
        assert_eq!(json, "\"page_down\"");
        let back: Key = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Key::Named(NamedKey::PageDown));
    }
}
