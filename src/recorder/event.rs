use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{MacroError, Result};
use crate::steps::{Key, MouseButton};

/// One captured input. `t` is seconds since the recorder was armed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordedEvent {
    MouseMove {
        x: i32,
        y: i32,
        #[serde(alias = "timestamp")]
        t: f64,
    },
    MouseClick {
        x: i32,
        y: i32,
        button: MouseButton,
        pressed: bool,
        #[serde(alias = "timestamp")]
        t: f64,
    },
    MouseScroll {
        x: i32,
        y: i32,
        dx: i32,
        /// Positive scrolls up.
        dy: i32,
        #[serde(alias = "timestamp")]
        t: f64,
    },
    KeyPress {
        key: Key,
        #[serde(alias = "timestamp")]
        t: f64,
    },
    KeyRelease {
        key: Key,
        #[serde(alias = "timestamp")]
        t: f64,
    },
}

impl RecordedEvent {
    pub fn t(&self) -> f64 {
        match self {
            RecordedEvent::MouseMove { t, .. }
            | RecordedEvent::MouseClick { t, .. }
            | RecordedEvent::MouseScroll { t, .. }
            | RecordedEvent::KeyPress { t, .. }
            | RecordedEvent::KeyRelease { t, .. } => *t,
        }
    }

    /// Screen position for pointer events.
    pub fn position(&self) -> Option<(i32, i32)> {
        match self {
            RecordedEvent::MouseMove { x, y, .. }
            | RecordedEvent::MouseClick { x, y, .. }
            | RecordedEvent::MouseScroll { x, y, .. } => Some((*x, *y)),
            RecordedEvent::KeyPress { .. } | RecordedEvent::KeyRelease { .. } => None,
        }
    }
}

/// Read a JSON array of events, as written by `save_events`.
pub fn load_events(path: &Path) -> Result<Vec<RecordedEvent>> {
    let contents = fs::read_to_string(path).map_err(|e| MacroError::io(path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn save_events(path: &Path, events: &[RecordedEvent]) -> Result<()> {
    let json = serde_json::to_string_pretty(events)?;
    fs::write(path, json).map_err(|e| MacroError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::NamedKey;

    #[test]
    fn reads_legacy_event_log() {
        let raw = r#"[
            {"type": "mouse_click", "timestamp": 0.5, "x": 10, "y": 20, "button": "left_click", "pressed": true},
            {"type": "key_press", "timestamp": 1.25, "key": "enter"},
            {"type": "mouse_scroll", "timestamp": 2.0, "x": 1, "y": 2, "dx": 0, "dy": -1}
        ]"#;
        let events: Vec<RecordedEvent> = serde_json::from_str(raw).unwrap();

        assert_eq!(
            events[0],
            RecordedEvent::MouseClick {
                x: 10,
                y: 20,
                button: MouseButton::Left,
                pressed: true,
                t: 0.5
            }
        );
        assert_eq!(
            events[1],
            RecordedEvent::KeyPress {
                key: Key::Named(NamedKey::Enter),
                t: 1.25
            }
        );
        assert_eq!(events[2].position(), Some((1, 2)));
    }

    #[test]
    fn rejects_mouse_name_as_key() {
        let raw = r#"{"type": "key_press", "t": 0.0, "key": "left_click"}"#;
        assert!(serde_json::from_str::<RecordedEvent>(raw).is_err());
    }
}
