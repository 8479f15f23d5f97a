use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::clock::{sleep_unless_stopped, Clock};
use super::traits::{ImageLocator, ScreenSource};
use crate::core::worker::StopSignal;
use crate::notify::Notifier;
use crate::settings::WatchedItem;

pub const SCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Background check for watched item templates. A detection captures the
/// screen and notifies, then the item is quiet for its cooldown.
pub struct ItemWatcher {
    items: Vec<WatchedItem>,
    last_detected: HashMap<usize, Duration>,
    locator: Box<dyn ImageLocator>,
    screen: Box<dyn ScreenSource>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl ItemWatcher {
    pub fn new(
        items: Vec<WatchedItem>,
        locator: Box<dyn ImageLocator>,
        screen: Box<dyn ScreenSource>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            items,
            last_detected: HashMap::new(),
            locator,
            screen,
            notifier,
            clock,
        }
    }

    /// One pass over the enabled items. Returns the names that were notified.
    pub fn scan_once(&mut self) -> Vec<String> {
        let mut notified = Vec::new();

        for (idx, item) in self.items.iter().enumerate() {
            if !item.enabled {
                continue;
            }

            match self.locator.locate(&item.template, item.confidence) {
                Ok(Some(found)) => {
                    let now = self.clock.now();
                    let cooldown = Duration::try_from_secs_f64(item.cooldown_secs).unwrap_or(Duration::MAX);
                    if let Some(last) = self.last_detected.get(&idx) {
                        if now.saturating_sub(*last) < cooldown {
                            debug!("{} still cooling down", item.name);
                            continue;
                        }
                    }

                    let screenshot = match self.screen.capture() {
                        Ok(image) => image,
                        Err(e) => {
                            warn!("Detected {} but screen capture failed: {}", item.name, e);
                            continue;
                        }
                    };
                    info!("Item {} detected at ({}, {})", item.name, found.x, found.y);
                    self.notifier.item_detected(&item.name, &screenshot);
                    self.last_detected.insert(idx, now);
                    notified.push(item.name.clone());
                }
                Ok(None) => {}
                Err(e) => debug!("Skipping {}: {}", item.name, e),
            }
        }
        notified
    }

    /// Scan every `SCAN_INTERVAL` until `stop` is raised.
    pub fn run(mut self, stop: StopSignal) {
        info!("Watching {} item(s)", self.items.iter().filter(|i| i.enabled).count());
        while sleep_unless_stopped(self.clock.as_ref(), &stop, SCAN_INTERVAL) {
            self.scan_once();
        }
        info!("Item watcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::clock::ManualClock;
    use crate::automation::testing::{BlankScreen, Notification, RecordingNotifier, ScriptedLocator};
    use crate::automation::traits::Match;
    use crate::error::MacroError;
    use crate::steps::TemplateRef;

    fn item(name: &str, hash: &str, cooldown_secs: f64) -> WatchedItem {
        WatchedItem {
            name: name.to_string(),
            template: TemplateRef::new(hash, None),
            confidence: 0.8,
            enabled: true,
            cooldown_secs,
        }
    }

    fn watcher(items: Vec<WatchedItem>, locator: ScriptedLocator) -> (ItemWatcher, Arc<ManualClock>, RecordingNotifier) {
        let clock = Arc::new(ManualClock::new());
        let notifier = RecordingNotifier::default();
        let watcher = ItemWatcher::new(
            items,
            Box::new(locator),
            Box::new(BlankScreen { width: 4, height: 4 }),
            Arc::new(notifier.clone()),
            clock.clone(),
        );
        (watcher, clock, notifier)
    }

    fn always_found() -> ScriptedLocator {
        ScriptedLocator::new(|_, _| Ok(Some(Match { x: 1, y: 1, confidence: 0.9 })))
    }

    #[test]
    fn cooldown_suppresses_repeat_notifications() {
        let (mut watcher, clock, notifier) = watcher(vec![item("gem", "aa", 10.0)], always_found());

        assert_eq!(watcher.scan_once(), vec!["gem".to_string()]);
        clock.advance(Duration::from_secs(5));
        assert!(watcher.scan_once().is_empty());
        clock.advance(Duration::from_secs(5));
        assert_eq!(watcher.scan_once().len(), 1);
        assert_eq!(notifier.sent().len(), 2);
    }

    #[test]
    fn disabled_and_failing_items_are_skipped() {
        let mut disabled = item("off", "bb", 0.0);
        disabled.enabled = false;
        let locator = ScriptedLocator::new(|_, template: &TemplateRef| match template.hash.as_deref() {
            Some("cc") => Err(MacroError::unavailable("template cc", "missing")),
            _ => Ok(Some(Match { x: 0, y: 0, confidence: 1.0 })),
        });
        let (mut watcher, _clock, notifier) =
            watcher(vec![disabled, item("broken", "cc", 0.0), item("ok", "dd", 0.0)], locator);

        assert_eq!(watcher.scan_once(), vec!["ok".to_string()]);
        assert_eq!(notifier.sent(), vec![Notification::Item { name: "ok".into() }]);
    }

    #[test]
    fn run_scans_once_per_second_until_stopped() {
        let locator = always_found();
        let calls = locator.call_counter();
        let (watcher, clock, _notifier) = watcher(vec![item("gem", "aa", 0.0)], locator);
        let stop = StopSignal::new();
        clock.stop_at(Duration::from_millis(3500), stop.clone());

        watcher.run(stop);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
