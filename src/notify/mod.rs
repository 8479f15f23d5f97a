pub mod webhook;

use image::RgbImage;
use std::fmt;

pub use webhook::WebhookNotifier;

/// Total configured outer loops, for progress messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopTotal {
    Finite(u32),
    Infinite,
}

impl LoopTotal {
    /// `0` is the "loop forever" sentinel used by the settings.
    pub fn from_loop_count(loop_count: u32) -> Self {
        if loop_count == 0 {
            LoopTotal::Infinite
        } else {
            LoopTotal::Finite(loop_count)
        }
    }
}

impl fmt::Display for LoopTotal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopTotal::Finite(n) => write!(f, "{}", n),
            LoopTotal::Infinite => write!(f, "∞"),
        }
    }
}

/// Progress notifications emitted by playback and the item watcher.
/// Implementations must not block the caller on delivery.
pub trait Notifier: Send + Sync {
    fn loop_complete(&self, completed: u64, total: LoopTotal);
    fn item_detected(&self, name: &str, screenshot: &RgbImage);
}

/// Drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn loop_complete(&self, _completed: u64, _total: LoopTotal) {}
    fn item_detected(&self, _name: &str, _screenshot: &RgbImage) {}
}
