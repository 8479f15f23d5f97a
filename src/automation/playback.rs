use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::clock::{sleep_unless_stopped, Clock};
use super::traits::{ImageLocator, InputActuator};
use crate::core::worker::{StatusLine, StopSignal};
use crate::error::{MacroError, Result};
use crate::notify::{LoopTotal, Notifier, NullNotifier};
use crate::steps::{ImageSearch, Key, MouseButton, OnTimeout, Step, StepKind, Trigger, STEP_LOOP_INFINITE};

/// Image search polling interval.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

// Pauses in seconds at speed 1.0
const MOVE_SETTLE: f64 = 0.1;
const CLICK_GAP: f64 = 0.05;
const SCROLL_SETTLE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackConfig {
    /// Outer loops to run, `0` loops until stopped.
    pub loop_count: u32,
    pub speed: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            loop_count: 1,
            speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackReport {
    pub outcome: PlaybackOutcome,
    pub loops_completed: u64,
}

enum Flow {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeldInput {
    Button(MouseButton),
    Key(Key),
}

impl HeldInput {
    fn from_trigger(trigger: Trigger) -> Option<Self> {
        match trigger {
            Trigger::Mouse(button) => Some(HeldInput::Button(button)),
            Trigger::Key(key) => Some(HeldInput::Key(key)),
            Trigger::MouseMove => None,
        }
    }
}

/// Runs a step list against an actuator and locator until the loop budget
/// is spent or the stop signal is raised.
pub struct PlaybackEngine {
    actuator: Box<dyn InputActuator>,
    locator: Box<dyn ImageLocator>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    stop: StopSignal,
    status: StatusLine,
    held: Vec<HeldInput>,
}

impl PlaybackEngine {
    pub fn new(
        actuator: Box<dyn InputActuator>,
        locator: Box<dyn ImageLocator>,
        clock: Arc<dyn Clock>,
        stop: StopSignal,
    ) -> Self {
        Self {
            actuator,
            locator,
            clock,
            notifier: Arc::new(NullNotifier),
            stop,
            status: StatusLine::default(),
            held: Vec::new(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_status(mut self, status: StatusLine) -> Self {
        self.status = status;
        self
    }

    /// Play `steps`. Anything still pressed is released before returning,
    /// whether playback completed, was stopped, or failed.
    pub fn run(&mut self, steps: &[Step], config: PlaybackConfig) -> Result<PlaybackReport> {
        if steps.is_empty() {
            return Err(MacroError::config("steps", "no steps to play"));
        }
        if !(config.speed.is_finite() && config.speed > 0.0) {
            return Err(MacroError::config("speed", format!("{} must be greater than 0", config.speed)));
        }

        info!(
            "Playing {} steps, loops: {}, speed: {}x",
            steps.len(),
            LoopTotal::from_loop_count(config.loop_count),
            config.speed
        );

        let result = self.run_loops(steps, config);
        self.release_held();

        match &result {
            Ok(report) => {
                info!("Playback {:?} after {} loop(s)", report.outcome, report.loops_completed);
                self.status.set(match report.outcome {
                    PlaybackOutcome::Completed => "Playback finished",
                    PlaybackOutcome::Stopped => "Playback stopped",
                });
            }
            Err(e) => {
                error!("Playback aborted: {}", e);
                self.status.set(format!("Error: {}", e));
            }
        }
        result
    }

    fn run_loops(&mut self, steps: &[Step], config: PlaybackConfig) -> Result<PlaybackReport> {
        let total = LoopTotal::from_loop_count(config.loop_count);
        let mut executed_once: HashSet<usize> = HashSet::new();
        let mut completed: u64 = 0;

        let stopped = |completed| PlaybackReport {
            outcome: PlaybackOutcome::Stopped,
            loops_completed: completed,
        };

        loop {
            if let LoopTotal::Finite(n) = total {
                if completed >= u64::from(n) {
                    return Ok(PlaybackReport {
                        outcome: PlaybackOutcome::Completed,
                        loops_completed: completed,
                    });
                }
            }
            if self.stop.is_stopped() {
                return Ok(stopped(completed));
            }

            let current = completed + 1;
            let mut ran_any = false;
            for (index, step) in steps.iter().enumerate() {
                if self.stop.is_stopped() {
                    return Ok(stopped(completed));
                }
                // Marked before running so a stop mid-step still counts
                if step.is_run_once() && !executed_once.insert(index) {
                    continue;
                }
                ran_any = true;

                let effective = config.speed * step.step_speed;
                if !(effective.is_finite() && effective > 0.0) {
                    return Err(MacroError::config(
                        format!("step {} step_speed", index + 1),
                        format!("effective speed {} must be greater than 0", effective),
                    ));
                }

                self.status.set(format!("Loop {}/{} - Step {}", current, total, index + 1));
                if let Flow::Stop = self.run_visit(index, step, effective)? {
                    return Ok(stopped(completed));
                }
            }

            completed = current;
            debug!("Loops completed: {} / {}", completed, total);
            self.notifier.loop_complete(completed, total);

            if !ran_any && total == LoopTotal::Infinite {
                info!("Only run-once steps remain and all have run; ending playback");
                return Ok(PlaybackReport {
                    outcome: PlaybackOutcome::Completed,
                    loops_completed: completed,
                });
            }
        }
    }

    /// One visit of a step: its inner repetitions plus the pacing delay after each.
    fn run_visit(&mut self, index: usize, step: &Step, speed: f64) -> Result<Flow> {
        let mut iteration: u64 = 0;
        while step.step_loop == STEP_LOOP_INFINITE || iteration < u64::from(step.step_loop) {
            if self.stop.is_stopped() {
                return Ok(Flow::Stop);
            }
            iteration += 1;
            debug!("{}", step.describe(index));

            if let Flow::Stop = self.perform(step, speed)? {
                return Ok(Flow::Stop);
            }
            if !self.pause(step.delay / speed) {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    fn perform(&mut self, step: &Step, speed: f64) -> Result<Flow> {
        match &step.kind {
            StepKind::Click { key, count, .. } => self.click(*key, step.position(), *count, speed),
            StepKind::Hold { key, duration, .. } => self.hold(*key, step.position(), *duration, speed),
            StepKind::Type { text } => {
                if !text.is_empty() {
                    self.actuator.type_text(text)?;
                }
                Ok(Flow::Continue)
            }
            StepKind::Scroll { amount, .. } => {
                if let Some((x, y)) = step.position() {
                    self.actuator.move_cursor(x, y)?;
                    if !self.pause(SCROLL_SETTLE / speed) {
                        return Ok(Flow::Stop);
                    }
                }
                self.actuator.scroll(0, *amount)?;
                Ok(Flow::Continue)
            }
            StepKind::ImageSearch(search) => self.image_search(search, speed),
        }
    }

    fn click(&mut self, key: Trigger, at: Option<(i32, i32)>, count: u32, speed: f64) -> Result<Flow> {
        if let Some((x, y)) = at {
            self.actuator.move_cursor(x, y)?;
        }
        let Some(input) = HeldInput::from_trigger(key) else {
            // mouse_move relocates only
            return Ok(Flow::Continue);
        };
        if at.is_some() && !self.pause(MOVE_SETTLE / speed) {
            return Ok(Flow::Stop);
        }

        for _ in 0..count {
            if self.stop.is_stopped() {
                return Ok(Flow::Stop);
            }
            self.press(input)?;
            self.release(input)?;
            if !self.pause(CLICK_GAP / speed) {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    fn hold(&mut self, key: Trigger, at: Option<(i32, i32)>, duration: f64, speed: f64) -> Result<Flow> {
        if let Some((x, y)) = at {
            self.actuator.move_cursor(x, y)?;
            if !self.pause(MOVE_SETTLE / speed) {
                return Ok(Flow::Stop);
            }
        }

        let Some(input) = HeldInput::from_trigger(key) else {
            return Ok(if self.pause(duration / speed) { Flow::Continue } else { Flow::Stop });
        };

        self.press(input)?;
        let finished = self.pause(duration / speed);
        self.release(input)?;
        Ok(if finished { Flow::Continue } else { Flow::Stop })
    }

    fn image_search(&mut self, search: &ImageSearch, speed: f64) -> Result<Flow> {
        let label = search.template.label();
        let timeout = (search.timeout_seconds > 0.0).then(|| secs(search.timeout_seconds));
        let mut window_start = self.clock.now();
        let mut warned = false;

        let found = loop {
            if self.stop.is_stopped() {
                return Ok(Flow::Stop);
            }

            if let Some(limit) = timeout {
                if self.clock.now().saturating_sub(window_start) >= limit {
                    match search.on_timeout {
                        OnTimeout::MoveOn => {
                            info!("Image {} not found within {}s, moving on", label, search.timeout_seconds);
                            break None;
                        }
                        OnTimeout::Retry => {
                            info!("Image {} not found within {}s, retrying", label, search.timeout_seconds);
                            self.status.set(format!("Retrying search for {}", label));
                            window_start = self.clock.now();
                        }
                    }
                }
            }

            match self.locator.locate(&search.template, search.confidence) {
                Ok(Some(found)) => break Some(found),
                Ok(None) => {}
                Err(e) if !e.is_fatal_for_playback() => {
                    if !warned {
                        warn!("{}; treating as not found", e);
                        warned = true;
                    }
                }
                Err(e) => return Err(e),
            }

            if !self.pause_for(POLL_INTERVAL) {
                return Ok(Flow::Stop);
            }
        };

        let Some(found) = found else {
            return Ok(Flow::Continue);
        };
        info!("Found {} at ({}, {}) confidence {:.2}", label, found.x, found.y, found.confidence);

        if search.click_on_found {
            let (x, y) = search.click_target(found.x, found.y);
            for _ in 0..search.click_count {
                if self.stop.is_stopped() {
                    return Ok(Flow::Stop);
                }
                self.actuator.move_cursor(x, y)?;
                self.actuator.click(MouseButton::Left)?;
                if !self.pause(MOVE_SETTLE / speed) {
                    return Ok(Flow::Stop);
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn press(&mut self, input: HeldInput) -> Result<()> {
        match input {
            HeldInput::Button(button) => self.actuator.press_button(button)?,
            HeldInput::Key(key) => self.actuator.press_key(key)?,
        }
        self.held.push(input);
        Ok(())
    }

    /// A failed release stays in `held` so `release_held` tries it again.
    fn release(&mut self, input: HeldInput) -> Result<()> {
        match input {
            HeldInput::Button(button) => self.actuator.release_button(button)?,
            HeldInput::Key(key) => self.actuator.release_key(key)?,
        }
        if let Some(pos) = self.held.iter().rposition(|h| *h == input) {
            self.held.remove(pos);
        }
        Ok(())
    }

    fn release_held(&mut self) {
        while let Some(input) = self.held.pop() {
            debug!("Releasing held {:?}", input);
            let result = match input {
                HeldInput::Button(button) => self.actuator.release_button(button),
                HeldInput::Key(key) => self.actuator.release_key(key),
            };
            if let Err(e) = result {
                warn!("Failed to release {:?}: {}", input, e);
            }
        }
    }

    /// Sleep `seconds`, returning false as soon as a stop is requested.
    fn pause(&self, seconds: f64) -> bool {
        self.pause_for(secs(seconds))
    }

    fn pause_for(&self, duration: Duration) -> bool {
        sleep_unless_stopped(self.clock.as_ref(), &self.stop, duration)
    }
}

fn secs(seconds: f64) -> Duration {
    if seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::clock::{ManualClock, STOP_SLICE};
    use crate::automation::testing::{Notification, RecordingNotifier, ScriptedLocator};
    use crate::core::dry_run::{Action, ActionLog, DryRunActuator};
    use crate::steps::{ClickMode, NamedKey, TemplateRef};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Harness {
        clock: Arc<ManualClock>,
        stop: StopSignal,
        log: ActionLog,
        notifier: RecordingNotifier,
    }

    fn engine(locator: ScriptedLocator) -> (PlaybackEngine, Harness) {
        let clock = Arc::new(ManualClock::new());
        let stop = StopSignal::new();
        let actuator = DryRunActuator::new(clock.clone()).quiet();
        let log = actuator.log();
        let notifier = RecordingNotifier::default();
        let engine = PlaybackEngine::new(Box::new(actuator), Box::new(locator), clock.clone(), stop.clone())
            .with_notifier(Arc::new(notifier.clone()));
        (
            engine,
            Harness {
                clock,
                stop,
                log,
                notifier,
            },
        )
    }

    fn left() -> Trigger {
        Trigger::Mouse(MouseButton::Left)
    }

    fn search(timeout: f64, on_timeout: OnTimeout) -> Step {
        let mut search = ImageSearch::new(TemplateRef::new("ab12", None));
        search.timeout_seconds = timeout;
        search.on_timeout = on_timeout;
        Step::image_search(search).with_step_loop(2)
    }

    #[test]
    fn click_issues_count_pairs_with_spacing() {
        let (mut engine, h) = engine(ScriptedLocator::never());
        let steps = vec![Step::click(left(), Some((10, 20)), 4).with_step_speed(2.0)];

        let report = engine.run(&steps, PlaybackConfig::default()).unwrap();
        assert_eq!(report.outcome, PlaybackOutcome::Completed);

        let entries = h.log.entries();
        let downs: Vec<_> = entries
            .iter()
            .filter(|a| a.action == Action::ButtonDown(MouseButton::Left))
            .collect();
        assert_eq!(downs.len(), 4);
        assert_eq!(h.log.count(|a| *a == Action::ButtonUp(MouseButton::Left)), 4);
        for pair in downs.windows(2) {
            // 0.05 / effective speed 2.0
            assert!(pair[1].at - pair[0].at >= Duration::from_millis(25));
        }
        assert_eq!(entries[0].action, Action::Move(10, 20));
    }

    #[test]
    fn run_once_step_executes_once_per_session() {
        let (mut engine, h) = engine(ScriptedLocator::never());
        let key = Trigger::Key(Key::Named(NamedKey::Enter));
        let steps = vec![
            Step::click(key, None, 1),
            Step::type_text("hi").with_step_loop(2),
        ];

        let config = PlaybackConfig {
            loop_count: 5,
            speed: 1.0,
        };
        let report = engine.run(&steps, config).unwrap();

        assert_eq!(report.loops_completed, 5);
        assert_eq!(h.log.count(|a| matches!(a, Action::KeyDown(_))), 1);
        assert_eq!(h.log.count(|a| matches!(a, Action::Type(_))), 10);
        assert_eq!(h.notifier.sent().len(), 5);
        assert_eq!(
            h.notifier.sent()[4],
            Notification::Loop {
                completed: 5,
                total: LoopTotal::Finite(5)
            }
        );
    }

    #[test]
    fn infinite_step_loop_ends_only_on_stop() {
        let (mut engine, h) = engine(ScriptedLocator::never());
        h.clock.stop_at(Duration::from_secs(3), h.stop.clone());
        let steps = vec![
            Step::type_text("x").with_step_loop(STEP_LOOP_INFINITE).with_delay(0.5),
            Step::type_text("never reached"),
        ];

        let report = engine.run(&steps, PlaybackConfig::default()).unwrap();
        assert_eq!(report.outcome, PlaybackOutcome::Stopped);
        assert_eq!(report.loops_completed, 0);
        assert_eq!(h.log.count(|a| *a == Action::Type("x".into())), 6);
        assert_eq!(h.log.count(|a| *a == Action::Type("never reached".into())), 0);
    }

    #[test]
    fn wait_forever_search_only_stops_on_signal() {
        let locator = ScriptedLocator::never();
        let calls = locator.call_counter();
        let (mut engine, h) = engine(locator);
        h.clock.stop_at(Duration::from_secs(2), h.stop.clone());

        let report = engine.run(&[search(0.0, OnTimeout::MoveOn)], PlaybackConfig::default()).unwrap();
        assert_eq!(report.outcome, PlaybackOutcome::Stopped);
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert!(h.clock.now() >= Duration::from_secs(2));
        assert!(h.clock.now() < Duration::from_secs(2) + STOP_SLICE);
    }

    #[test]
    fn retry_keeps_polling_past_timeout() {
        let locator = ScriptedLocator::never();
        let calls = locator.call_counter();
        let (mut engine, h) = engine(locator);
        h.clock.stop_at(Duration::from_secs(10), h.stop.clone());

        let report = engine.run(&[search(1.0, OnTimeout::Retry)], PlaybackConfig::default()).unwrap();
        assert_eq!(report.outcome, PlaybackOutcome::Stopped);
        // One window of 1s holds 5 polls; ten seconds is many windows
        assert!(calls.load(Ordering::SeqCst) > 30);
    }

    #[test]
    fn move_on_gives_up_after_timeout() {
        let locator = ScriptedLocator::never();
        let calls = locator.call_counter();
        let (mut engine, h) = engine(locator);
        let step = search(1.0, OnTimeout::MoveOn).with_step_loop(3).with_delay(0.0);

        let report = engine.run(&[step], PlaybackConfig::default()).unwrap();
        assert_eq!(report.outcome, PlaybackOutcome::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 15);
        assert_eq!(h.clock.now(), Duration::from_secs(3));
    }

    #[test]
    fn found_image_clicks_target() {
        let (mut engine, h) = engine(ScriptedLocator::found_after(2, 100, 50));
        let mut found = ImageSearch::new(TemplateRef::new("ab12", None));
        found.click_on_found = true;
        found.click_mode = ClickMode::Offset { dx: 5, dy: -5 };
        found.click_count = 2;

        engine.run(&[Step::image_search(found).with_step_loop(2)], PlaybackConfig::default()).unwrap();
        assert_eq!(
            h.log.actions()[..3],
            [
                Action::Move(105, 45),
                Action::ButtonDown(MouseButton::Left),
                Action::ButtonUp(MouseButton::Left)
            ]
        );
        // the second visit matches on its first poll
        assert_eq!(h.log.count(|a| *a == Action::ButtonDown(MouseButton::Left)), 4);
    }

    #[test]
    fn missing_template_counts_as_not_found() {
        let locator = ScriptedLocator::new(|_, _| Err(MacroError::unavailable("template ab12", "gone")));
        let (mut engine, _h) = engine(locator);
        let report = engine.run(&[search(0.4, OnTimeout::MoveOn)], PlaybackConfig::default()).unwrap();
        assert_eq!(report.outcome, PlaybackOutcome::Completed);
    }

    #[test]
    fn locator_failure_aborts_session() {
        let locator = ScriptedLocator::new(|_, _| Err(MacroError::Actuation("capture failed".into())));
        let (mut engine, h) = engine(locator);
        let steps = vec![search(5.0, OnTimeout::MoveOn), Step::type_text("after")];

        assert!(matches!(
            engine.run(&steps, PlaybackConfig::default()),
            Err(MacroError::Actuation(_))
        ));
        assert_eq!(h.log.count(|a| matches!(a, Action::Type(_))), 0);
    }

    /// Passes everything to a dry-run actuator except the first key release.
    struct FlakyRelease {
        inner: DryRunActuator,
        release_attempts: Arc<AtomicUsize>,
    }

    impl InputActuator for FlakyRelease {
        fn move_cursor(&mut self, x: i32, y: i32) -> Result<()> {
            self.inner.move_cursor(x, y)
        }
        fn press_button(&mut self, button: MouseButton) -> Result<()> {
            self.inner.press_button(button)
        }
        fn release_button(&mut self, button: MouseButton) -> Result<()> {
            self.inner.release_button(button)
        }
        fn press_key(&mut self, key: Key) -> Result<()> {
            self.inner.press_key(key)
        }
        fn release_key(&mut self, key: Key) -> Result<()> {
            if self.release_attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(MacroError::Actuation("SendInput rejected the event".into()));
            }
            self.inner.release_key(key)
        }
        fn scroll(&mut self, dx: i32, dy: i32) -> Result<()> {
            self.inner.scroll(dx, dy)
        }
        fn type_text(&mut self, text: &str) -> Result<()> {
            self.inner.type_text(text)
        }
    }

    #[test]
    fn actuator_failure_aborts_and_still_releases_held_key() {
        let clock = Arc::new(ManualClock::new());
        let inner = DryRunActuator::new(clock.clone()).quiet();
        let log = inner.log();
        let attempts = Arc::new(AtomicUsize::new(0));
        let actuator = FlakyRelease {
            inner,
            release_attempts: attempts.clone(),
        };
        let status = StatusLine::default();
        let mut engine = PlaybackEngine::new(
            Box::new(actuator),
            Box::new(ScriptedLocator::never()),
            clock.clone(),
            StopSignal::new(),
        )
        .with_status(status.clone());

        let steps = vec![Step::hold(Trigger::Key(Key::Char('w')), None, 1.0), Step::type_text("after")];
        let result = engine.run(&steps, PlaybackConfig::default());

        assert!(matches!(result, Err(MacroError::Actuation(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(
            log.actions(),
            vec![Action::KeyDown(Key::Char('w')), Action::KeyUp(Key::Char('w'))]
        );
        assert!(status.get().starts_with("Error:"));
    }

    #[test]
    fn stop_during_hold_releases_input() {
        let (mut engine, h) = engine(ScriptedLocator::never());
        h.clock.stop_at(Duration::from_secs(1), h.stop.clone());
        let key = Trigger::Key(Key::Char('w'));

        let report = engine.run(&[Step::hold(key, None, 5.0)], PlaybackConfig::default()).unwrap();
        assert_eq!(report.outcome, PlaybackOutcome::Stopped);
        assert_eq!(
            h.log.actions(),
            vec![Action::KeyDown(Key::Char('w')), Action::KeyUp(Key::Char('w'))]
        );
        assert!(h.clock.now() < Duration::from_secs(2));
    }

    #[test]
    fn hold_duration_scales_with_speed() {
        let (mut engine, h) = engine(ScriptedLocator::never());
        let step = Step::hold(left(), None, 2.0).with_delay(0.0);
        let config = PlaybackConfig {
            loop_count: 1,
            speed: 4.0,
        };

        engine.run(&[step], config).unwrap();
        let entries = h.log.entries();
        assert_eq!(entries[1].at - entries[0].at, Duration::from_millis(500));
    }

    #[test]
    fn scroll_moves_then_scrolls() {
        let (mut engine, h) = engine(ScriptedLocator::never());
        engine
            .run(&[Step::scroll(-3, Some((7, 8)))], PlaybackConfig::default())
            .unwrap();
        assert_eq!(h.log.actions(), vec![Action::Move(7, 8), Action::Scroll(0, -3)]);
    }

    #[test]
    fn mouse_move_only_relocates() {
        let (mut engine, h) = engine(ScriptedLocator::never());
        engine
            .run(&[Step::click(Trigger::MouseMove, Some((3, 4)), 1)], PlaybackConfig::default())
            .unwrap();
        assert_eq!(h.log.actions(), vec![Action::Move(3, 4)]);
    }

    #[test]
    fn zero_effective_speed_is_rejected() {
        let (mut engine, _h) = engine(ScriptedLocator::never());
        let steps = vec![Step::type_text("a").with_step_speed(0.0)];
        assert!(matches!(
            engine.run(&steps, PlaybackConfig::default()),
            Err(MacroError::Configuration { .. })
        ));
        assert!(engine.run(&[], PlaybackConfig::default()).is_err());
    }

    #[test]
    fn infinite_loops_end_when_only_spent_run_once_steps_remain() {
        let (mut engine, h) = engine(ScriptedLocator::never());
        let config = PlaybackConfig {
            loop_count: 0,
            speed: 1.0,
        };
        let report = engine.run(&[Step::type_text("once")], config).unwrap();
        assert_eq!(report.outcome, PlaybackOutcome::Completed);
        assert_eq!(report.loops_completed, 2);
        assert_eq!(h.log.count(|a| matches!(a, Action::Type(_))), 1);
    }
}
