use image::RgbImage;

use crate::error::Result;
use crate::steps::{Key, MouseButton, TemplateRef};

/// Where a template was found on screen, as the center of the match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub x: i32,
    pub y: i32,
    pub confidence: f32,
}

/// Finds a template image on the current screen.
///
/// `Ok(None)` means "not visible right now". A missing or unreadable
/// template is reported as `MacroError::ResourceUnavailable`, which
/// playback treats the same as not found.
pub trait ImageLocator {
    fn locate(&mut self, template: &TemplateRef, confidence: f32) -> Result<Option<Match>>;
}

/// Synthetic input injection in screen coordinates.
pub trait InputActuator {
    fn move_cursor(&mut self, x: i32, y: i32) -> Result<()>;
    fn press_button(&mut self, button: MouseButton) -> Result<()>;
    fn release_button(&mut self, button: MouseButton) -> Result<()>;
    fn press_key(&mut self, key: Key) -> Result<()>;
    fn release_key(&mut self, key: Key) -> Result<()>;
    /// Vertical scroll in notches, positive scrolls up.
    fn scroll(&mut self, dx: i32, dy: i32) -> Result<()>;
    fn type_text(&mut self, text: &str) -> Result<()>;

    fn click(&mut self, button: MouseButton) -> Result<()> {
        self.press_button(button)?;
        self.release_button(button)
    }
}

/// Full-screen capture, used for detection screenshots.
pub trait ScreenSource: Send {
    fn capture(&mut self) -> Result<RgbImage>;
}
