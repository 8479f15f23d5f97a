use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

use super::clock::Clock;
use super::playback::{PlaybackEngine, PlaybackOutcome, PlaybackReport};
use crate::core::worker::{StatusLine, StopSignal, Worker};
use crate::error::{MacroError, Result};
use crate::recorder::{convert, Recorder};
use crate::settings::AppSettings;
use crate::steps::Step;

/// Builds a fresh engine for each playback run, on the worker thread.
pub type EngineFactory = Arc<dyn Fn(StopSignal, StatusLine) -> Result<PlaybackEngine> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Recording,
    Playing,
    Completed(PlaybackReport),
    Stopped(PlaybackReport),
    Errored(String),
}

impl SessionState {
    /// Terminal playback states accept new commands like `Idle`.
    pub fn is_idle(&self) -> bool {
        !matches!(self, SessionState::Recording | SessionState::Playing)
    }
}

/// Which global hotkey fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    TogglePlay,
    ToggleRecord,
}

/// Owns the step list and coordinates recording and playback so only one
/// runs at a time and the steps never change while either is active.
pub struct MacroSession {
    steps: Vec<Step>,
    settings: AppSettings,
    state: SessionState,
    recorder: Arc<Recorder>,
    worker: Worker,
    factory: EngineFactory,
    outcome: Arc<Mutex<Option<SessionState>>>,
}

impl MacroSession {
    pub fn new(settings: AppSettings, clock: Arc<dyn Clock>, factory: EngineFactory) -> Self {
        let recorder = Recorder::new(clock, settings.recording);
        recorder.ignore_keys(settings.hotkeys.main_keys());
        Self {
            steps: Vec::new(),
            settings,
            state: SessionState::Idle,
            recorder: Arc::new(recorder),
            worker: Worker::new(),
            factory,
            outcome: Arc::new(Mutex::new(None)),
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Shared with the platform listener that feeds raw input.
    pub fn recorder(&self) -> Arc<Recorder> {
        Arc::clone(&self.recorder)
    }

    pub fn status(&self) -> String {
        self.worker.get_status()
    }

    /// Current state, picking up the result of a finished playback.
    pub fn state(&mut self) -> SessionState {
        if self.state == SessionState::Playing && !self.worker.is_running() {
            self.worker.join();
            self.collect_outcome();
        }
        self.state.clone()
    }

    fn collect_outcome(&mut self) {
        let finished = self.outcome.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.state = finished.unwrap_or_else(|| SessionState::Errored("playback worker exited without a result".into()));
    }

    fn ensure_editable(&mut self) -> Result<()> {
        match self.state() {
            SessionState::Playing => Err(MacroError::Busy("steps cannot change during playback".into())),
            SessionState::Recording => Err(MacroError::Busy("steps cannot change while recording".into())),
            _ => Ok(()),
        }
    }

    pub fn add_step(&mut self, step: Step) -> Result<()> {
        self.ensure_editable()?;
        step.validate()?;
        self.steps.push(step);
        Ok(())
    }

    pub fn remove_step(&mut self, index: usize) -> Result<Step> {
        self.ensure_editable()?;
        if index >= self.steps.len() {
            return Err(MacroError::config("index", format!("no step {}", index + 1)));
        }
        Ok(self.steps.remove(index))
    }

    /// Swap a step with its neighbour; `up` moves it towards the start.
    pub fn move_step(&mut self, index: usize, up: bool) -> Result<()> {
        self.ensure_editable()?;
        let target = if up { index.checked_sub(1) } else { Some(index + 1) };
        match target.filter(|t| *t < self.steps.len() && index < self.steps.len()) {
            Some(target) => {
                self.steps.swap(index, target);
                Ok(())
            }
            None => Err(MacroError::config("index", format!("cannot move step {}", index + 1))),
        }
    }

    /// Replace the whole list, as after loading a macro file.
    pub fn set_steps(&mut self, steps: Vec<Step>) -> Result<()> {
        self.ensure_editable()?;
        for step in &steps {
            step.validate()?;
        }
        self.steps = steps;
        Ok(())
    }

    pub fn start_playback(&mut self) -> Result<()> {
        match self.state() {
            SessionState::Playing => return Err(MacroError::Busy("already playing".into())),
            SessionState::Recording => return Err(MacroError::Busy("stop recording before playing".into())),
            _ => {}
        }
        if self.steps.is_empty() {
            return Err(MacroError::config("steps", "no steps to play"));
        }
        let config = self.settings.playback_config();
        if !(config.speed.is_finite() && config.speed > 0.0) {
            return Err(MacroError::config("playback.speed", "must be greater than 0"));
        }

        let steps: Arc<[Step]> = self.steps.clone().into();
        let factory = Arc::clone(&self.factory);
        let outcome = Arc::clone(&self.outcome);
        *outcome.lock().unwrap_or_else(PoisonError::into_inner) = None;

        let started = self.worker.start(move |stop, status| {
            let result = factory(stop, status).and_then(|mut engine| engine.run(&steps, config));
            let finished = match result {
                Ok(report) if report.outcome == PlaybackOutcome::Completed => SessionState::Completed(report),
                Ok(report) => SessionState::Stopped(report),
                Err(e) => SessionState::Errored(e.to_string()),
            };
            *outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(finished);
        });
        if !started {
            return Err(MacroError::Busy("previous playback is still shutting down".into()));
        }

        info!("Playback started");
        self.state = SessionState::Playing;
        Ok(())
    }

    /// Request a stop; playback ends at its next check.
    pub fn stop_playback(&mut self) {
        if self.state() == SessionState::Playing {
            self.worker.stop();
        }
    }

    /// Block until the running playback finishes and return its final state.
    pub fn wait(&mut self) -> SessionState {
        if self.state == SessionState::Playing {
            self.worker.join();
            self.collect_outcome();
        }
        self.state.clone()
    }

    pub fn start_recording(&mut self) -> Result<()> {
        match self.state() {
            SessionState::Playing => return Err(MacroError::Busy("stop playback before recording".into())),
            SessionState::Recording => return Err(MacroError::Busy("already recording".into())),
            _ => {}
        }
        self.recorder.set_options(self.settings.recording);
        self.recorder.arm();
        self.state = SessionState::Recording;
        Ok(())
    }

    /// Stop capturing, convert the events and append the steps.
    /// Returns how many steps were added.
    pub fn stop_recording(&mut self) -> Result<usize> {
        if self.state != SessionState::Recording {
            return Err(MacroError::config("recording", "not recording"));
        }
        let events = self.recorder.disarm();
        self.state = SessionState::Idle;

        if events.is_empty() {
            warn!("No events were recorded");
            return Ok(0);
        }
        let steps = convert(&events, self.settings.convert);
        let added = steps.len();
        self.steps.extend(steps);
        info!("Recorded {} events, converted to {} steps", events.len(), added);
        Ok(added)
    }

    pub fn handle_hotkey(&mut self, action: HotkeyAction) -> Result<()> {
        match (action, self.state()) {
            (HotkeyAction::TogglePlay, SessionState::Playing) => {
                self.stop_playback();
                Ok(())
            }
            (HotkeyAction::TogglePlay, _) => self.start_playback(),
            (HotkeyAction::ToggleRecord, SessionState::Recording) => self.stop_recording().map(|_| ()),
            (HotkeyAction::ToggleRecord, _) => self.start_recording(),
        }
    }
}
