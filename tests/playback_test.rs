use std::sync::Arc;
use std::time::Duration;

use simplemacro::automation::clock::ManualClock;
use simplemacro::automation::testing::{Notification, RecordingNotifier, ScriptedLocator};
use simplemacro::automation::{Clock, InputActuator, PlaybackConfig, PlaybackEngine, PlaybackOutcome};
use simplemacro::core::dry_run::{Action, DryRunActuator};
use simplemacro::core::worker::StopSignal;
use simplemacro::error::Result;
use simplemacro::notify::LoopTotal;
use simplemacro::recorder::{convert, ConvertOptions, RawInput, RecordOptions, Recorder};
use simplemacro::steps::{ClickMode, ImageSearch, Key, MouseButton, NamedKey, Step, StepKind, TemplateRef, Trigger};

/// Actuator that plays straight into a recorder, as if the listener had
/// seen the injected input.
struct LoopbackActuator {
    recorder: Arc<Recorder>,
    cursor: (i32, i32),
}

impl InputActuator for LoopbackActuator {
    fn move_cursor(&mut self, x: i32, y: i32) -> Result<()> {
        self.cursor = (x, y);
        self.recorder.handle(RawInput::Move { x, y });
        Ok(())
    }

    fn press_button(&mut self, button: MouseButton) -> Result<()> {
        let (x, y) = self.cursor;
        self.recorder.handle(RawInput::Button { x, y, button, pressed: true });
        Ok(())
    }

    fn release_button(&mut self, button: MouseButton) -> Result<()> {
        let (x, y) = self.cursor;
        self.recorder.handle(RawInput::Button { x, y, button, pressed: false });
        Ok(())
    }

    fn press_key(&mut self, key: Key) -> Result<()> {
        self.recorder.handle(RawInput::KeyDown(key));
        Ok(())
    }

    fn release_key(&mut self, key: Key) -> Result<()> {
        self.recorder.handle(RawInput::KeyUp(key));
        Ok(())
    }

    fn scroll(&mut self, dx: i32, dy: i32) -> Result<()> {
        let (x, y) = self.cursor;
        self.recorder.handle(RawInput::Wheel { x, y, dx, dy });
        Ok(())
    }

    fn type_text(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }
}

#[test]
fn replayed_steps_record_back_to_the_same_classification() {
    let clock = Arc::new(ManualClock::new());
    let recorder = Arc::new(Recorder::new(clock.clone(), RecordOptions::default()));
    recorder.arm();

    let steps = vec![
        Step::click(Trigger::Mouse(MouseButton::Left), Some((10, 20)), 1).with_delay(0.5),
        Step::hold(Trigger::Key(Key::Char('a')), None, 1.0).with_delay(0.5),
        Step::click(Trigger::Key(Key::Named(NamedKey::Enter)), None, 1),
        Step::hold(Trigger::Mouse(MouseButton::Right), Some((30, 40)), 0.31),
    ];

    let actuator = LoopbackActuator {
        recorder: recorder.clone(),
        cursor: (0, 0),
    };
    let mut engine = PlaybackEngine::new(
        Box::new(actuator),
        Box::new(ScriptedLocator::never()),
        clock.clone(),
        StopSignal::new(),
    );
    let report = engine.run(&steps, PlaybackConfig::default()).unwrap();
    assert_eq!(report.outcome, PlaybackOutcome::Completed);

    let converted = convert(&recorder.disarm(), ConvertOptions::default());
    let kinds: Vec<StepKind> = converted.into_iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            StepKind::Click {
                key: Trigger::Mouse(MouseButton::Left),
                x: Some(10),
                y: Some(20),
                count: 1
            },
            StepKind::Hold {
                key: Trigger::Key(Key::Char('a')),
                x: None,
                y: None,
                duration: 1.0
            },
            StepKind::Click {
                key: Trigger::Key(Key::Named(NamedKey::Enter)),
                x: None,
                y: None,
                count: 1
            },
            StepKind::Hold {
                key: Trigger::Mouse(MouseButton::Right),
                x: Some(30),
                y: Some(40),
                duration: 0.31
            },
        ]
    );
}

#[test]
fn image_gate_clicks_offset_target_then_continues() {
    let clock = Arc::new(ManualClock::new());
    let actuator = DryRunActuator::new(clock.clone()).quiet();
    let log = actuator.log();

    let mut search = ImageSearch::new(TemplateRef::new("feedface", None));
    search.click_on_found = true;
    search.click_mode = ClickMode::Offset { dx: 5, dy: -5 };
    search.click_count = 2;
    let steps = vec![Step::image_search(search), Step::type_text("done")];

    let locator = ScriptedLocator::found_after(3, 100, 50);
    let calls = locator.call_counter();
    let mut engine = PlaybackEngine::new(Box::new(actuator), Box::new(locator), clock.clone(), StopSignal::new());
    engine.run(&steps, PlaybackConfig::default()).unwrap();

    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 4);
    let actions = log.actions();
    assert_eq!(actions.iter().filter(|a| **a == Action::Move(105, 45)).count(), 2);
    assert_eq!(
        log.count(|a| matches!(a, Action::ButtonDown(MouseButton::Left))),
        2
    );
    assert_eq!(actions.last(), Some(&Action::Type("done".into())));
}

#[test]
fn each_outer_loop_is_reported() {
    let clock = Arc::new(ManualClock::new());
    let notifier = RecordingNotifier::default();
    let mut engine = PlaybackEngine::new(
        Box::new(DryRunActuator::new(clock.clone()).quiet()),
        Box::new(ScriptedLocator::never()),
        clock.clone(),
        StopSignal::new(),
    )
    .with_notifier(Arc::new(notifier.clone()));

    let steps = vec![Step::click(Trigger::Key(Key::Char('x')), None, 1).with_step_loop(2)];
    let report = engine
        .run(&steps, PlaybackConfig { loop_count: 3, speed: 2.0 })
        .unwrap();

    assert_eq!(report.loops_completed, 3);
    assert_eq!(
        notifier.sent().last(),
        Some(&Notification::Loop {
            completed: 3,
            total: LoopTotal::Finite(3)
        })
    );
}

#[test]
fn stopping_an_endless_macro_reports_stopped() {
    let clock = Arc::new(ManualClock::new());
    let stop = StopSignal::new();
    clock.stop_at(Duration::from_secs(3), stop.clone());

    let mut engine = PlaybackEngine::new(
        Box::new(DryRunActuator::new(clock.clone()).quiet()),
        Box::new(ScriptedLocator::never()),
        clock.clone(),
        stop,
    );
    let steps = vec![Step::click(Trigger::Mouse(MouseButton::Left), Some((1, 1)), 1)
        .with_delay(0.25)
        .with_step_loop(2)];
    let report = engine
        .run(&steps, PlaybackConfig { loop_count: 0, speed: 1.0 })
        .unwrap();

    assert_eq!(report.outcome, PlaybackOutcome::Stopped);
    assert!(clock.now() < Duration::from_millis(3100));
}
