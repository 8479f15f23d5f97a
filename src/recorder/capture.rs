use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

use super::event::RecordedEvent;
use crate::automation::clock::Clock;
use crate::steps::{Key, MouseButton};

/// Which input families are captured while armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordOptions {
    pub mouse_moves: bool,
    pub clicks: bool,
    pub scroll: bool,
    pub keys: bool,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            mouse_moves: false,
            clicks: true,
            scroll: true,
            keys: true,
        }
    }
}

/// Screen rectangle, right/bottom exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ScreenRect {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }
}

/// Input as delivered by a platform listener.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawInput {
    Move { x: i32, y: i32 },
    Button { x: i32, y: i32, button: MouseButton, pressed: bool },
    Wheel { x: i32, y: i32, dx: i32, dy: i32 },
    KeyDown(Key),
    KeyUp(Key),
}

#[derive(Default)]
struct CaptureState {
    armed: bool,
    started_at: Duration,
    events: Vec<RecordedEvent>,
}

/// Collects filtered, timestamped input between `arm` and `disarm`.
/// Shared between the listener thread and the command side.
pub struct Recorder {
    clock: Arc<dyn Clock>,
    options: Mutex<RecordOptions>,
    exclusion: Mutex<Option<ScreenRect>>,
    ignored_keys: Mutex<Vec<Key>>,
    state: Mutex<CaptureState>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Recorder {
    pub fn new(clock: Arc<dyn Clock>, options: RecordOptions) -> Self {
        Self {
            clock,
            options: Mutex::new(options),
            exclusion: Mutex::new(None),
            ignored_keys: Mutex::new(Vec::new()),
            state: Mutex::new(CaptureState::default()),
        }
    }

    pub fn set_options(&self, options: RecordOptions) {
        *lock(&self.options) = options;
    }

    /// Pointer events inside `rect` (the app's own window) are discarded.
    pub fn set_exclusion(&self, rect: Option<ScreenRect>) {
        *lock(&self.exclusion) = rect;
    }

    /// Keys never recorded, such as the hotkeys that start and stop capture.
    pub fn ignore_keys(&self, keys: Vec<Key>) {
        *lock(&self.ignored_keys) = keys;
    }

    /// Clear the log and start capturing; timestamps restart at zero.
    pub fn arm(&self) {
        let mut state = lock(&self.state);
        state.events.clear();
        state.started_at = self.clock.now();
        state.armed = true;
        info!("Recording started");
    }

    /// Stop capturing and hand over everything recorded since `arm`.
    pub fn disarm(&self) -> Vec<RecordedEvent> {
        let mut state = lock(&self.state);
        state.armed = false;
        let events = std::mem::take(&mut state.events);
        info!("Recording stopped, {} events captured", events.len());
        events
    }

    pub fn is_armed(&self) -> bool {
        lock(&self.state).armed
    }

    /// Feed one listener event. Returns whether it was appended.
    pub fn handle(&self, input: RawInput) -> bool {
        let options = *lock(&self.options);
        let wanted = match input {
            RawInput::Move { .. } => options.mouse_moves,
            RawInput::Button { .. } => options.clicks,
            RawInput::Wheel { .. } => options.scroll,
            RawInput::KeyDown(key) | RawInput::KeyUp(key) => {
                options.keys && !lock(&self.ignored_keys).contains(&key)
            }
        };
        if !wanted {
            return false;
        }

        if let Some(rect) = *lock(&self.exclusion) {
            let inside = match input {
                RawInput::Move { x, y } | RawInput::Button { x, y, .. } | RawInput::Wheel { x, y, .. } => {
                    rect.contains(x, y)
                }
                RawInput::KeyDown(_) | RawInput::KeyUp(_) => false,
            };
            if inside {
                return false;
            }
        }

        let mut state = lock(&self.state);
        if !state.armed {
            return false;
        }
        let t = self.clock.now().saturating_sub(state.started_at).as_secs_f64();

        let event = match input {
            RawInput::Move { x, y } => RecordedEvent::MouseMove { x, y, t },
            RawInput::Button { x, y, button, pressed } => RecordedEvent::MouseClick {
                x,
                y,
                button,
                pressed,
                t,
            },
            RawInput::Wheel { x, y, dx, dy } => RecordedEvent::MouseScroll { x, y, dx, dy, t },
            RawInput::KeyDown(key) => RecordedEvent::KeyPress { key, t },
            RawInput::KeyUp(key) => RecordedEvent::KeyRelease { key, t },
        };
        debug!("Recorded {:?}", event);
        state.events.push(event);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::clock::ManualClock;
    use crate::steps::NamedKey;

    fn recorder(options: RecordOptions) -> (Recorder, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (Recorder::new(clock.clone(), options), clock)
    }

    #[test]
    fn ignores_input_while_disarmed() {
        let (rec, _) = recorder(RecordOptions::default());
        assert!(!rec.handle(RawInput::KeyDown(Key::Char('a'))));
        assert!(rec.disarm().is_empty());
    }

    #[test]
    fn timestamps_are_relative_to_arm() {
        let (rec, clock) = recorder(RecordOptions::default());
        clock.advance(Duration::from_secs(10));
        rec.arm();
        clock.advance(Duration::from_millis(1500));
        rec.handle(RawInput::KeyDown(Key::Char('a')));

        let events = rec.disarm();
        assert_eq!(events, vec![RecordedEvent::KeyPress { key: Key::Char('a'), t: 1.5 }]);
        assert!(!rec.is_armed());
    }

    #[test]
    fn drops_pointer_events_inside_own_window() {
        let (rec, _) = recorder(RecordOptions::default());
        rec.set_exclusion(Some(ScreenRect {
            left: 0,
            top: 0,
            right: 100,
            bottom: 100,
        }));
        rec.arm();

        let press = |x, y| RawInput::Button {
            x,
            y,
            button: MouseButton::Left,
            pressed: true,
        };
        assert!(!rec.handle(press(50, 50)));
        assert!(rec.handle(press(100, 50)));
        // keyboard input has no position and is never excluded
        assert!(rec.handle(RawInput::KeyDown(Key::Char('q'))));
        assert_eq!(rec.disarm().len(), 2);
    }

    #[test]
    fn honours_options_and_ignored_keys() {
        let (rec, _) = recorder(RecordOptions::default());
        rec.ignore_keys(vec![Key::Named(NamedKey::Function(7))]);
        rec.arm();

        assert!(!rec.handle(RawInput::Move { x: 1, y: 1 }));
        assert!(!rec.handle(RawInput::KeyDown(Key::Named(NamedKey::Function(7)))));
        assert!(rec.handle(RawInput::Wheel { x: 1, y: 1, dx: 0, dy: 2 }));

        rec.set_options(RecordOptions {
            mouse_moves: true,
            ..RecordOptions::default()
        });
        assert!(rec.handle(RawInput::Move { x: 1, y: 1 }));
    }
}
