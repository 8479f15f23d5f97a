use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::info;

use crate::automation::clock::Clock;
use crate::automation::traits::InputActuator;
use crate::error::Result;
use crate::steps::{Key, MouseButton};

/// One synthetic input the actuator was asked to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Move(i32, i32),
    ButtonDown(MouseButton),
    ButtonUp(MouseButton),
    KeyDown(Key),
    KeyUp(Key),
    Scroll(i32, i32),
    Type(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimedAction {
    pub at: Duration,
    pub action: Action,
}

/// Shared, append-only list of performed actions.
#[derive(Debug, Clone, Default)]
pub struct ActionLog(Arc<Mutex<Vec<TimedAction>>>);

impl ActionLog {
    pub fn entries(&self) -> Vec<TimedAction> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn actions(&self) -> Vec<Action> {
        self.entries().into_iter().map(|a| a.action).collect()
    }

    pub fn count(&self, pred: impl Fn(&Action) -> bool) -> usize {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|a| pred(&a.action))
            .count()
    }

    fn push(&self, at: Duration, action: Action) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(TimedAction { at, action });
    }
}

/// Actuator that logs instead of injecting input. Backs `--dry-run`
/// and doubles as the recording fake in tests.
pub struct DryRunActuator {
    clock: Arc<dyn Clock>,
    log: ActionLog,
    quiet: bool,
}

impl DryRunActuator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            log: ActionLog::default(),
            quiet: false,
        }
    }

    /// Record without emitting a log line per action.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn log(&self) -> ActionLog {
        self.log.clone()
    }

    fn record(&mut self, action: Action) -> Result<()> {
        let at = self.clock.now();
        if !self.quiet {
            info!("[dry-run {:>8.2}s] {:?}", at.as_secs_f64(), action);
        }
        self.log.push(at, action);
        Ok(())
    }
}

impl InputActuator for DryRunActuator {
    fn move_cursor(&mut self, x: i32, y: i32) -> Result<()> {
        self.record(Action::Move(x, y))
    }

    fn press_button(&mut self, button: MouseButton) -> Result<()> {
        self.record(Action::ButtonDown(button))
    }

    fn release_button(&mut self, button: MouseButton) -> Result<()> {
        self.record(Action::ButtonUp(button))
    }

    fn press_key(&mut self, key: Key) -> Result<()> {
        self.record(Action::KeyDown(key))
    }

    fn release_key(&mut self, key: Key) -> Result<()> {
        self.record(Action::KeyUp(key))
    }

    fn scroll(&mut self, dx: i32, dy: i32) -> Result<()> {
        self.record(Action::Scroll(dx, dy))
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        self.record(Action::Type(text.to_string()))
    }
}
