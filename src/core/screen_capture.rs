use image::{ImageBuffer, RgbImage};
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, SRCCOPY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN, SM_YVIRTUALSCREEN,
};

use crate::automation::traits::ScreenSource;
use crate::error::{MacroError, Result};

/// Captures the whole virtual desktop (all monitors) with BitBlt.
#[derive(Debug, Default)]
pub struct DesktopCapture;

impl DesktopCapture {
    pub fn new() -> Self {
        Self
    }
}

impl ScreenSource for DesktopCapture {
    fn capture(&mut self) -> Result<RgbImage> {
        let (left, top, width, height) = unsafe {
            (
                GetSystemMetrics(SM_XVIRTUALSCREEN),
                GetSystemMetrics(SM_YVIRTUALSCREEN),
                GetSystemMetrics(SM_CXVIRTUALSCREEN),
                GetSystemMetrics(SM_CYVIRTUALSCREEN),
            )
        };
        capture_screen_region(left, top, width, height)
    }
}

/// Capture a rectangle of the desktop in screen coordinates.
pub fn capture_screen_region(left: i32, top: i32, width: i32, height: i32) -> Result<RgbImage> {
    if width <= 0 || height <= 0 {
        return Err(MacroError::Actuation(format!(
            "empty capture region {}x{}",
            width, height
        )));
    }

    let desktop = HWND(0);
    unsafe {
        let hdc = GetDC(desktop);
        if hdc.is_invalid() {
            return Err(MacroError::Actuation("failed to get desktop device context".into()));
        }

        let mem_dc = CreateCompatibleDC(hdc);
        if mem_dc.is_invalid() {
            let _ = ReleaseDC(desktop, hdc);
            return Err(MacroError::Actuation("failed to create compatible DC".into()));
        }

        let bitmap = CreateCompatibleBitmap(hdc, width, height);
        if bitmap.is_invalid() {
            let _ = DeleteDC(mem_dc);
            let _ = ReleaseDC(desktop, hdc);
            return Err(MacroError::Actuation("failed to create compatible bitmap".into()));
        }

        let old_bitmap = SelectObject(mem_dc, bitmap);
        let blit = BitBlt(mem_dc, 0, 0, width, height, hdc, left, top, SRCCOPY);

        // 32 bpp keeps rows free of padding
        let mut bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                biHeight: -height,
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0 as u32,
                biSizeImage: 0,
                biXPelsPerMeter: 0,
                biYPelsPerMeter: 0,
                biClrUsed: 0,
                biClrImportant: 0,
            },
            bmiColors: [Default::default(); 1],
        };
        let mut buffer: Vec<u8> = vec![0; width as usize * height as usize * 4];
        let scan_lines = if blit.is_ok() {
            GetDIBits(
                mem_dc,
                bitmap,
                0,
                height as u32,
                Some(buffer.as_mut_ptr() as *mut _),
                &mut bmi,
                DIB_RGB_COLORS,
            )
        } else {
            0
        };

        let _ = SelectObject(mem_dc, old_bitmap);
        let _ = DeleteObject(bitmap);
        let _ = DeleteDC(mem_dc);
        let _ = ReleaseDC(desktop, hdc);

        if let Err(e) = blit {
            return Err(MacroError::Actuation(format!("BitBlt failed: {}", e)));
        }
        if scan_lines == 0 {
            return Err(MacroError::Actuation("failed to read bitmap bits".into()));
        }

        Ok(bgra_to_rgb(width as u32, height as u32, &buffer))
    }
}

fn bgra_to_rgb(width: u32, height: u32, bgra: &[u8]) -> RgbImage {
    let rgb: Vec<u8> = bgra
        .chunks_exact(4)
        .flat_map(|px| [px[2], px[1], px[0]])
        .collect();
    ImageBuffer::from_raw(width, height, rgb).unwrap_or_else(|| RgbImage::new(width, height))
}
