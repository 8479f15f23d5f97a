//! Scripted collaborators for driving playback and the item watcher
//! without a desktop session.

use image::RgbImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::traits::{ImageLocator, Match, ScreenSource};
use crate::error::Result;
use crate::notify::{LoopTotal, Notifier};
use crate::steps::TemplateRef;

type Script = Box<dyn FnMut(usize, &TemplateRef) -> Result<Option<Match>> + Send>;

/// Locator whose answer is computed from the 1-based call number.
pub struct ScriptedLocator {
    script: Script,
    calls: Arc<AtomicUsize>,
}

impl ScriptedLocator {
    pub fn new<F>(script: F) -> Self
    where
        F: FnMut(usize, &TemplateRef) -> Result<Option<Match>> + Send + 'static,
    {
        Self {
            script: Box::new(script),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn never() -> Self {
        Self::new(|_, _| Ok(None))
    }

    /// Not found for the first `misses` calls, then found at `(x, y)`.
    pub fn found_after(misses: usize, x: i32, y: i32) -> Self {
        Self::new(move |call, _| {
            Ok((call > misses).then_some(Match {
                x,
                y,
                confidence: 1.0,
            }))
        })
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl ImageLocator for ScriptedLocator {
    fn locate(&mut self, template: &TemplateRef, _confidence: f32) -> Result<Option<Match>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        (self.script)(call, template)
    }
}

/// Returns a fixed blank frame.
pub struct BlankScreen {
    pub width: u32,
    pub height: u32,
}

impl ScreenSource for BlankScreen {
    fn capture(&mut self) -> Result<RgbImage> {
        Ok(RgbImage::new(self.width, self.height))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Loop { completed: u64, total: LoopTotal },
    Item { name: String },
}

/// Keeps every notification for later inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier(Arc<Mutex<Vec<Notification>>>);

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn push(&self, n: Notification) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(n);
    }
}

impl Notifier for RecordingNotifier {
    fn loop_complete(&self, completed: u64, total: LoopTotal) {
        self.push(Notification::Loop { completed, total });
    }

    fn item_detected(&self, name: &str, _screenshot: &RgbImage) {
        self.push(Notification::Item { name: name.to_string() });
    }
}
