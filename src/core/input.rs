use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, VkKeyScanW, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_KEYUP, KEYEVENTF_UNICODE, MOUSEEVENTF_HWHEEL, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP,
    MOUSEEVENTF_WHEEL, MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY, VK_BACK, VK_CONTROL, VK_DELETE,
    VK_DOWN, VK_END, VK_ESCAPE, VK_F1, VK_HOME, VK_LEFT, VK_LWIN, VK_MENU, VK_NEXT, VK_PRIOR,
    VK_RETURN, VK_RIGHT, VK_SHIFT, VK_SPACE, VK_TAB, VK_UP,
};
use windows::Win32::UI::WindowsAndMessaging::SetCursorPos;

use crate::automation::traits::InputActuator;
use crate::error::{MacroError, Result};
use crate::steps::{Key, MouseButton, NamedKey};

const WHEEL_DELTA: i32 = 120;

/// Injects real input with `SendInput`. Coordinates are virtual-screen pixels.
#[derive(Debug, Default)]
pub struct SendInputActuator;

impl SendInputActuator {
    pub fn new() -> Self {
        Self
    }
}

fn mouse_input(flags: MOUSE_EVENT_FLAGS, data: i32) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: data as _,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn key_input(vk: VIRTUAL_KEY, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send(inputs: &[INPUT]) -> Result<()> {
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        return Err(MacroError::Actuation(format!(
            "SendInput injected {} of {} events",
            sent,
            inputs.len()
        )));
    }
    Ok(())
}

fn button_flags(button: MouseButton, down: bool) -> MOUSE_EVENT_FLAGS {
    match (button, down) {
        (MouseButton::Left, true) => MOUSEEVENTF_LEFTDOWN,
        (MouseButton::Left, false) => MOUSEEVENTF_LEFTUP,
        (MouseButton::Right, true) => MOUSEEVENTF_RIGHTDOWN,
        (MouseButton::Right, false) => MOUSEEVENTF_RIGHTUP,
        (MouseButton::Middle, true) => MOUSEEVENTF_MIDDLEDOWN,
        (MouseButton::Middle, false) => MOUSEEVENTF_MIDDLEUP,
    }
}

fn named_vk(key: NamedKey) -> VIRTUAL_KEY {
    match key {
        NamedKey::Enter => VK_RETURN,
        NamedKey::Space => VK_SPACE,
        NamedKey::Tab => VK_TAB,
        NamedKey::Backspace => VK_BACK,
        NamedKey::Delete => VK_DELETE,
        NamedKey::Escape => VK_ESCAPE,
        NamedKey::Shift => VK_SHIFT,
        NamedKey::Ctrl => VK_CONTROL,
        NamedKey::Alt => VK_MENU,
        NamedKey::Cmd => VK_LWIN,
        NamedKey::Up => VK_UP,
        NamedKey::Down => VK_DOWN,
        NamedKey::Left => VK_LEFT,
        NamedKey::Right => VK_RIGHT,
        NamedKey::Home => VK_HOME,
        NamedKey::End => VK_END,
        NamedKey::PageUp => VK_PRIOR,
        NamedKey::PageDown => VK_NEXT,
        NamedKey::Function(n) => VIRTUAL_KEY(VK_F1.0 + u16::from(n.saturating_sub(1))),
    }
}

/// Key events for one key transition. Characters without a plain virtual
/// key (or needing modifiers) go through as unicode input.
fn key_events(key: Key, up: bool) -> Vec<INPUT> {
    let release = if up { KEYEVENTF_KEYUP } else { KEYBD_EVENT_FLAGS(0) };
    match key {
        Key::Named(named) => vec![key_input(named_vk(named), 0, release)],
        Key::Char(c) => {
            let mut units = [0u16; 2];
            let encoded = c.encode_utf16(&mut units);
            if encoded.len() == 1 {
                let scan = unsafe { VkKeyScanW(encoded[0]) };
                // high byte holds required shift state; -1 means unmapped
                if scan != -1 && (scan >> 8) & 0xff == 0 {
                    return vec![key_input(VIRTUAL_KEY((scan & 0xff) as u16), 0, release)];
                }
            }
            encoded
                .iter()
                .map(|unit| key_input(VIRTUAL_KEY(0), *unit, KEYEVENTF_UNICODE | release))
                .collect()
        }
    }
}

impl InputActuator for SendInputActuator {
    fn move_cursor(&mut self, x: i32, y: i32) -> Result<()> {
        unsafe { SetCursorPos(x, y) }.map_err(|e| MacroError::Actuation(format!("SetCursorPos({}, {}): {}", x, y, e)))
    }

    fn press_button(&mut self, button: MouseButton) -> Result<()> {
        send(&[mouse_input(button_flags(button, true), 0)])
    }

    fn release_button(&mut self, button: MouseButton) -> Result<()> {
        send(&[mouse_input(button_flags(button, false), 0)])
    }

    fn press_key(&mut self, key: Key) -> Result<()> {
        send(&key_events(key, false))
    }

    fn release_key(&mut self, key: Key) -> Result<()> {
        send(&key_events(key, true))
    }

    fn scroll(&mut self, dx: i32, dy: i32) -> Result<()> {
        let mut inputs = Vec::with_capacity(2);
        if dy != 0 {
            inputs.push(mouse_input(MOUSEEVENTF_WHEEL, dy.saturating_mul(WHEEL_DELTA)));
        }
        if dx != 0 {
            inputs.push(mouse_input(MOUSEEVENTF_HWHEEL, dx.saturating_mul(WHEEL_DELTA)));
        }
        if inputs.is_empty() {
            return Ok(());
        }
        send(&inputs)
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        let inputs: Vec<INPUT> = text
            .encode_utf16()
            .flat_map(|unit| {
                [
                    key_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE),
                    key_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE | KEYEVENTF_KEYUP),
                ]
            })
            .collect();
        if inputs.is_empty() {
            return Ok(());
        }
        send(&inputs)
    }
}
