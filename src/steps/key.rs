use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::error::{MacroError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    #[serde(alias = "left_click")]
    Left,
    #[serde(alias = "right_click")]
    Right,
    #[serde(alias = "middle_click")]
    Middle,
}

impl MouseButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            MouseButton::Left => "left_click",
            MouseButton::Right => "right_click",
            MouseButton::Middle => "middle_click",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Enter,
    Space,
    Tab,
    Backspace,
    Delete,
    Escape,
    Shift,
    Ctrl,
    Alt,
    Cmd,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    /// F1..=F12
    Function(u8),
}

impl NamedKey {
    fn from_name(name: &str) -> Option<Self> {
        let key = match name {
            "enter" | "return" => NamedKey::Enter,
            "space" => NamedKey::Space,
            "tab" => NamedKey::Tab,
            "backspace" => NamedKey::Backspace,
            "delete" => NamedKey::Delete,
            "esc" | "escape" => NamedKey::Escape,
            "shift" => NamedKey::Shift,
            "ctrl" | "control" => NamedKey::Ctrl,
            "alt" => NamedKey::Alt,
            "cmd" => NamedKey::Cmd,
            "up" => NamedKey::Up,
            "down" => NamedKey::Down,
            "left" => NamedKey::Left,
            "right" => NamedKey::Right,
            "home" => NamedKey::Home,
            "end" => NamedKey::End,
            "page_up" | "pageup" => NamedKey::PageUp,
            "page_down" | "pagedown" => NamedKey::PageDown,
            _ => return function_key_number(name).map(NamedKey::Function),
        };
        Some(key)
    }

    pub fn name(&self) -> String {
        match self {
            NamedKey::Enter => "enter".to_string(),
            NamedKey::Space => "space".to_string(),
            NamedKey::Tab => "tab".to_string(),
            NamedKey::Backspace => "backspace".to_string(),
            NamedKey::Delete => "delete".to_string(),
            NamedKey::Escape => "esc".to_string(),
            NamedKey::Shift => "shift".to_string(),
            NamedKey::Ctrl => "ctrl".to_string(),
            NamedKey::Alt => "alt".to_string(),
            NamedKey::Cmd => "cmd".to_string(),
            NamedKey::Up => "up".to_string(),
            NamedKey::Down => "down".to_string(),
            NamedKey::Left => "left".to_string(),
            NamedKey::Right => "right".to_string(),
            NamedKey::Home => "home".to_string(),
            NamedKey::End => "end".to_string(),
            NamedKey::PageUp => "page_up".to_string(),
            NamedKey::PageDown => "page_down".to_string(),
            NamedKey::Function(n) => format!("f{}", n),
        }
    }
}

fn function_key_number(name: &str) -> Option<u8> {
    static FN_KEY: OnceLock<Option<Regex>> = OnceLock::new();
    let re = FN_KEY
        .get_or_init(|| Regex::new(r"^f([1-9]|1[0-2])$").ok())
        .as_ref()?;
    let caps = re.captures(name)?;
    caps.get(1)?.as_str().parse().ok()
}

/// A keyboard key: either a named key or a literal character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Key {
    Named(NamedKey),
    Char(char),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Named(named) => write!(f, "{}", named.name()),
            Key::Char(c) => write!(f, "{}", c),
        }
    }
}

/// What a click/hold step actuates. Persisted as the key string
/// ("left_click", "mouse_move", "enter", "a", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Trigger {
    Mouse(MouseButton),
    /// Cursor relocation only, no press/release.
    MouseMove,
    Key(Key),
}

impl Trigger {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MacroError::config("key", "key name is empty"));
        }

        // Single characters keep their case ("A" and "a" are typed differently)
        let mut chars = trimmed.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ok(Trigger::Key(Key::Char(c)));
        }

        let lower = trimmed.to_lowercase();
        match lower.as_str() {
            "left_click" => Ok(Trigger::Mouse(MouseButton::Left)),
            "right_click" => Ok(Trigger::Mouse(MouseButton::Right)),
            "middle_click" => Ok(Trigger::Mouse(MouseButton::Middle)),
            "mouse_move" => Ok(Trigger::MouseMove),
            other => NamedKey::from_name(other)
                .map(|k| Trigger::Key(Key::Named(k)))
                .ok_or_else(|| MacroError::config("key", format!("unknown key name '{}'", raw))),
        }
    }

    pub fn is_mouse(&self) -> bool {
        matches!(self, Trigger::Mouse(_) | Trigger::MouseMove)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Mouse(button) => write!(f, "{}", button.as_str()),
            Trigger::MouseMove => write!(f, "mouse_move"),
            Trigger::Key(key) => write!(f, "{}", key),
        }
    }
}

impl TryFrom<String> for Trigger {
    type Error = MacroError;

    fn try_from(value: String) -> Result<Self> {
        Trigger::parse(&value)
    }
}

impl From<Trigger> for String {
    fn from(value: Trigger) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Key {
    type Error = MacroError;

    fn try_from(value: String) -> Result<Self> {
        match Trigger::parse(&value)? {
            Trigger::Key(key) => Ok(key),
            other => Err(MacroError::config("key", format!("'{}' is not a keyboard key", other))),
        }
    }
}

impl From<Key> for String {
    fn from(value: Key) -> Self {
        value.to_string()
    }
}
