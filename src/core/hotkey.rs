use global_hotkey::hotkey::HotKey;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use tracing::{debug, info};
use windows::Win32::Foundation::HWND;
use windows::Win32::UI::WindowsAndMessaging::{DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE};

use crate::automation::session::HotkeyAction;
use crate::error::{MacroError, Result};
use crate::settings::HotkeySettings;

/// Registers the play and record hotkeys for the lifetime of the value.
/// Must be created and polled on the same thread, which also has to pump
/// its message queue.
pub struct HotkeyListener {
    // unregisters on drop
    _manager: GlobalHotKeyManager,
    play: HotKey,
    record: HotKey,
}

impl HotkeyListener {
    pub fn register(settings: &HotkeySettings) -> Result<Self> {
        let play = settings.play_hotkey()?;
        let record = settings.record_hotkey()?;

        let manager = GlobalHotKeyManager::new()
            .map_err(|e| MacroError::Platform(format!("hotkey manager: {}", e)))?;
        manager
            .register(play)
            .map_err(|e| MacroError::config("hotkeys.play", format!("'{}': {}", settings.play, e)))?;
        manager
            .register(record)
            .map_err(|e| MacroError::config("hotkeys.record", format!("'{}': {}", settings.record, e)))?;

        info!("Hotkeys: {} play/stop, {} record/stop", settings.play, settings.record);
        Ok(Self {
            _manager: manager,
            play,
            record,
        })
    }

    /// Next pending hotkey press, if any. Releases are ignored.
    pub fn poll(&self) -> Option<HotkeyAction> {
        pump_messages();
        while let Ok(event) = GlobalHotKeyEvent::receiver().try_recv() {
            if event.state != HotKeyState::Pressed {
                continue;
            }
            if event.id == self.play.id() {
                return Some(HotkeyAction::TogglePlay);
            }
            if event.id == self.record.id() {
                return Some(HotkeyAction::ToggleRecord);
            }
            debug!("Ignoring unknown hotkey id {}", event.id);
        }
        None
    }
}

fn pump_messages() {
    unsafe {
        let mut msg = MSG::default();
        while PeekMessageW(&mut msg, HWND(0), 0, 0, PM_REMOVE).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}
