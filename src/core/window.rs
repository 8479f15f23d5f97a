use windows::{
    Win32::Foundation::{HWND, POINT, RECT},
    Win32::System::Console::GetConsoleWindow,
    Win32::UI::WindowsAndMessaging::{GetCursorPos, GetWindowRect, IsWindow, IsWindowVisible},
};

use crate::recorder::ScreenRect;

/// Screen bounds of a window, if the handle is still valid
pub fn get_window_rect(hwnd: HWND) -> Option<ScreenRect> {
    unsafe {
        if !IsWindow(hwnd).as_bool() {
            return None;
        }
        let mut rect = RECT::default();
        if GetWindowRect(hwnd, &mut rect).is_ok() {
            Some(ScreenRect {
                left: rect.left,
                top: rect.top,
                right: rect.right,
                bottom: rect.bottom,
            })
        } else {
            None
        }
    }
}

/// Bounds of the console window this tool runs in, so clicks on it are
/// not recorded. `None` when detached or hidden.
pub fn own_window_rect() -> Option<ScreenRect> {
    unsafe {
        let hwnd = GetConsoleWindow();
        if hwnd.0 == 0 || !IsWindowVisible(hwnd).as_bool() {
            return None;
        }
        get_window_rect(hwnd)
    }
}

/// Get current cursor position in screen coordinates
pub fn get_cursor_pos() -> Option<(i32, i32)> {
    unsafe {
        let mut point = POINT::default();
        if GetCursorPos(&mut point).is_ok() {
            Some((point.x, point.y))
        } else {
            None
        }
    }
}
