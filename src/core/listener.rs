use rdev::{Button, EventType};
use std::sync::Arc;
use std::thread;
use tracing::{error, info};

use crate::core::window::get_cursor_pos;
use crate::recorder::{RawInput, Recorder};
use crate::steps::{Key, MouseButton, NamedKey};

/// Start the process-wide input hook feeding `recorder`. The hook cannot be
/// removed again, so this is called once; the recorder drops input while
/// it is not armed.
pub fn spawn_input_listener(recorder: Arc<Recorder>) {
    thread::spawn(move || {
        let mut last_pos: Option<(i32, i32)> = None;

        info!("Input listener started");
        if let Err(error) = rdev::listen(move |event: rdev::Event| {
            let position = |last: Option<(i32, i32)>| last.or_else(get_cursor_pos).unwrap_or((0, 0));

            let input = match event.event_type {
                EventType::MouseMove { x, y } => {
                    let pos = (x.round() as i32, y.round() as i32);
                    last_pos = Some(pos);
                    RawInput::Move { x: pos.0, y: pos.1 }
                }
                EventType::ButtonPress(button) | EventType::ButtonRelease(button) => {
                    let Some(button) = map_button(button) else {
                        return;
                    };
                    let (x, y) = position(last_pos);
                    RawInput::Button {
                        x,
                        y,
                        button,
                        pressed: matches!(event.event_type, EventType::ButtonPress(_)),
                    }
                }
                EventType::Wheel { delta_x, delta_y } => {
                    let (x, y) = position(last_pos);
                    RawInput::Wheel {
                        x,
                        y,
                        dx: delta_x as i32,
                        dy: delta_y as i32,
                    }
                }
                EventType::KeyPress(key) => match map_key(key) {
                    Some(key) => RawInput::KeyDown(key),
                    None => return,
                },
                EventType::KeyRelease(key) => match map_key(key) {
                    Some(key) => RawInput::KeyUp(key),
                    None => return,
                },
            };
            recorder.handle(input);
        }) {
            error!("Input listener failed: {:?}", error);
        }
    });
}

fn map_button(button: Button) -> Option<MouseButton> {
    match button {
        Button::Left => Some(MouseButton::Left),
        Button::Right => Some(MouseButton::Right),
        Button::Middle => Some(MouseButton::Middle),
        Button::Unknown(_) => None,
    }
}

/// Letters come out lowercase regardless of shift state.
fn map_key(key: rdev::Key) -> Option<Key> {
    use rdev::Key as K;

    let named = match key {
        K::Return | K::KpReturn => NamedKey::Enter,
        K::Space => NamedKey::Space,
        K::Tab => NamedKey::Tab,
        K::Backspace => NamedKey::Backspace,
        K::Delete | K::KpDelete => NamedKey::Delete,
        K::Escape => NamedKey::Escape,
        K::ShiftLeft | K::ShiftRight => NamedKey::Shift,
        K::ControlLeft | K::ControlRight => NamedKey::Ctrl,
        K::Alt | K::AltGr => NamedKey::Alt,
        K::MetaLeft | K::MetaRight => NamedKey::Cmd,
        K::UpArrow => NamedKey::Up,
        K::DownArrow => NamedKey::Down,
        K::LeftArrow => NamedKey::Left,
        K::RightArrow => NamedKey::Right,
        K::Home => NamedKey::Home,
        K::End => NamedKey::End,
        K::PageUp => NamedKey::PageUp,
        K::PageDown => NamedKey::PageDown,
        K::F1 => NamedKey::Function(1),
        K::F2 => NamedKey::Function(2),
        K::F3 => NamedKey::Function(3),
        K::F4 => NamedKey::Function(4),
        K::F5 => NamedKey::Function(5),
        K::F6 => NamedKey::Function(6),
        K::F7 => NamedKey::Function(7),
        K::F8 => NamedKey::Function(8),
        K::F9 => NamedKey::Function(9),
        K::F10 => NamedKey::Function(10),
        K::F11 => NamedKey::Function(11),
        K::F12 => NamedKey::Function(12),
        other => return map_char(other).map(Key::Char),
    };
    Some(Key::Named(named))
}

fn map_char(key: rdev::Key) -> Option<char> {
    use rdev::Key as K;

    let c = match key {
        K::KeyA => 'a',
        K::KeyB => 'b',
        K::KeyC => 'c',
        K::KeyD => 'd',
        K::KeyE => 'e',
        K::KeyF => 'f',
        K::KeyG => 'g',
        K::KeyH => 'h',
        K::KeyI => 'i',
        K::KeyJ => 'j',
        K::KeyK => 'k',
        K::KeyL => 'l',
        K::KeyM => 'm',
        K::KeyN => 'n',
        K::KeyO => 'o',
        K::KeyP => 'p',
        K::KeyQ => 'q',
        K::KeyR => 'r',
        K::KeyS => 's',
        K::KeyT => 't',
        K::KeyU => 'u',
        K::KeyV => 'v',
        K::KeyW => 'w',
        K::KeyX => 'x',
        K::KeyY => 'y',
        K::KeyZ => 'z',
        K::Num0 | K::Kp0 => '0',
        K::Num1 | K::Kp1 => '1',
        K::Num2 | K::Kp2 => '2',
        K::Num3 | K::Kp3 => '3',
        K::Num4 | K::Kp4 => '4',
        K::Num5 | K::Kp5 => '5',
        K::Num6 | K::Kp6 => '6',
        K::Num7 | K::Kp7 => '7',
        K::Num8 | K::Kp8 => '8',
        K::Num9 | K::Kp9 => '9',
        K::Minus | K::KpMinus => '-',
        K::Equal => '=',
        K::KpPlus => '+',
        K::KpMultiply => '*',
        K::KpDivide | K::Slash => '/',
        K::Comma => ',',
        K::Dot => '.',
        K::SemiColon => ';',
        K::Quote => '\'',
        K::BackQuote => '`',
        K::BackSlash | K::IntlBackslash => '\\',
        K::LeftBracket => '[',
        K::RightBracket => ']',
        _ => return None,
    };
    Some(c)
}
