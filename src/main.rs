use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use simplemacro::automation::{Clock, EngineFactory, MacroSession, PlaybackEngine, SessionState, SystemClock};
use simplemacro::core::dry_run::DryRunActuator;
use simplemacro::core::worker::{StatusLine, StopSignal};
use simplemacro::error::{MacroError, Result};
use simplemacro::notify::{Notifier, NullNotifier, WebhookNotifier};
use simplemacro::recorder::{convert, load_events};
use simplemacro::settings::{AppSettings, SETTINGS_FILE};
use simplemacro::steps::StepDraft;
use simplemacro::storage::{ImageIndex, MacroFile};

#[derive(Parser)]
#[command(name = "simplemacro", version, about = "Record and replay step macros with image-gated waits")]
struct Cli {
    /// Settings file
    #[arg(long, global = true, default_value = SETTINGS_FILE)]
    settings: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a saved macro
    Play {
        macro_file: PathBuf,
        /// Outer loops, 0 loops forever
        #[arg(long)]
        loops: Option<u32>,
        #[arg(long)]
        speed: Option<f64>,
        /// Log input instead of sending it
        #[arg(long)]
        dry_run: bool,
    },
    /// Record input until the record hotkey is pressed, then save it as a macro
    Record {
        out: PathBuf,
        /// Also record cursor movement
        #[arg(long)]
        moves: bool,
    },
    /// Convert a saved event log into a macro
    Convert { events: PathBuf, out: PathBuf },
    /// Print the steps of a macro
    Show { macro_file: PathBuf },
    /// Append one step to a macro, creating the file if needed
    Add(AddArgs),
    /// Validate the settings file
    CheckSettings,
}

#[derive(Args)]
struct AddArgs {
    macro_file: PathBuf,
    /// click, hold, type, scroll or image_search
    action: String,
    #[arg(long)]
    name: Option<String>,
    /// Key or mouse trigger (left_click, enter, a, ...)
    #[arg(long)]
    key: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    x: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    y: Option<String>,
    /// Click count, hold seconds or scroll ticks
    #[arg(long, allow_hyphen_values = true)]
    amount: Option<String>,
    #[arg(long)]
    text: Option<String>,
    #[arg(long)]
    delay: Option<String>,
    #[arg(long = "step-speed")]
    step_speed: Option<String>,
    #[arg(long = "step-loop")]
    step_loop: Option<String>,
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long)]
    confidence: Option<String>,
    #[arg(long)]
    timeout: Option<String>,
    /// move_on or retry
    #[arg(long = "on-timeout")]
    on_timeout: Option<String>,
    #[arg(long = "click-on-found")]
    click_on_found: bool,
    #[arg(long, num_args = 2, value_names = ["DX", "DY"], allow_hyphen_values = true)]
    offset: Option<Vec<String>>,
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_hyphen_values = true)]
    absolute: Option<Vec<String>>,
    #[arg(long = "click-count")]
    click_count: Option<String>,
}

impl AddArgs {
    fn draft(&self) -> StepDraft {
        let pair = |v: &Option<Vec<String>>| match v.as_deref() {
            Some([a, b]) => Some((a.clone(), b.clone())),
            _ => None,
        };
        StepDraft {
            action: self.action.clone(),
            name: self.name.clone(),
            key: self.key.clone(),
            x: self.x.clone(),
            y: self.y.clone(),
            amount: self.amount.clone(),
            text: self.text.clone(),
            delay: self.delay.clone(),
            step_speed: self.step_speed.clone(),
            step_loop: self.step_loop.clone(),
            image: self.image.clone(),
            confidence: self.confidence.clone(),
            timeout: self.timeout.clone(),
            on_timeout: self.on_timeout.clone(),
            click_on_found: self.click_on_found,
            offset: pair(&self.offset),
            absolute: pair(&self.absolute),
            click_count: self.click_count.clone(),
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("simplemacro=info")))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Play {
            macro_file,
            loops,
            speed,
            dry_run,
        } => {
            let mut settings = AppSettings::load(&cli.settings);
            if let Some(loops) = loops {
                settings.playback.loop_count = loops;
            }
            if let Some(speed) = speed {
                settings.playback.speed = speed;
            }
            play(settings, &macro_file, dry_run)
        }
        Command::Record { out, moves } => {
            let mut settings = AppSettings::load(&cli.settings);
            if moves {
                settings.recording.mouse_moves = true;
            }
            record(settings, &out)
        }
        Command::Convert { events, out } => {
            let settings = AppSettings::load(&cli.settings);
            let events = load_events(&events)?;
            let steps = convert(&events, settings.convert);
            info!("Converted {} events into {} steps", events.len(), steps.len());
            MacroFile::new(String::new(), steps).save(&out)
        }
        Command::Show { macro_file } => {
            let settings = AppSettings::load(&cli.settings);
            let images = ImageIndex::new(settings.folders.images.clone());
            let (loaded, _) = MacroFile::load(&macro_file, &images)?;
            println!("{} ({} steps)", loaded.name, loaded.steps.len());
            for (idx, step) in loaded.steps.iter().enumerate() {
                println!("{}", step.describe(idx));
            }
            Ok(())
        }
        Command::Add(args) => {
            let step = args.draft().build()?;
            let settings = AppSettings::load(&cli.settings);
            let images = ImageIndex::new(settings.folders.images.clone());
            let mut target = if args.macro_file.exists() {
                MacroFile::load(&args.macro_file, &images)?.0
            } else {
                MacroFile::new(String::new(), Vec::new())
            };
            println!("{}", step.describe(target.steps.len()));
            target.steps.push(step);
            target.save(&args.macro_file)
        }
        Command::CheckSettings => {
            let settings = AppSettings::load_strict(&cli.settings)?;
            settings.validate()?;
            println!("{} is valid", cli.settings.display());
            Ok(())
        }
    }
}

fn play(settings: AppSettings, macro_file: &Path, dry_run: bool) -> Result<()> {
    settings.validate()?;
    if !dry_run && !cfg!(windows) {
        return Err(MacroError::Platform("live playback needs Windows, use --dry-run".into()));
    }

    let images = ImageIndex::new(settings.folders.images.clone());
    let (loaded, report) = MacroFile::load(macro_file, &images)?;
    if !report.missing.is_empty() {
        warn!(
            "{} image step(s) have no template file and will never match",
            report.missing.len()
        );
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let notifier = build_notifier(&settings)?;
    let factory = engine_factory(dry_run, images.clone(), Arc::clone(&clock), Arc::clone(&notifier));

    let mut session = MacroSession::new(settings.clone(), Arc::clone(&clock), factory);
    session.set_steps(loaded.steps)?;

    let mut watcher = if dry_run {
        None
    } else {
        platform::start_item_watcher(&settings, images, notifier, clock)
    };

    info!("Playing '{}'", loaded.name);
    session.start_playback()?;
    let finished = platform::wait_for_playback(&mut session, &settings);

    if let Some(watcher) = watcher.as_mut() {
        watcher.stop();
        watcher.join();
    }

    match finished? {
        SessionState::Completed(report) => {
            info!("Playback completed after {} loop(s)", report.loops_completed);
            Ok(())
        }
        SessionState::Stopped(report) => {
            info!("Playback stopped after {} loop(s)", report.loops_completed);
            Ok(())
        }
        SessionState::Errored(reason) => Err(MacroError::Actuation(reason)),
        other => Err(MacroError::Busy(format!("unexpected session state {:?}", other))),
    }
}

fn record(settings: AppSettings, out: &Path) -> Result<()> {
    settings.validate()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let factory = engine_factory(
        false,
        ImageIndex::new(settings.folders.images.clone()),
        Arc::clone(&clock),
        Arc::new(NullNotifier),
    );
    let mut session = MacroSession::new(settings, clock, factory);

    let added = platform::record_until_hotkey(&mut session)?;
    if added == 0 {
        return Err(MacroError::config("recording", "nothing was recorded"));
    }
    MacroFile::new(String::new(), session.steps().to_vec()).save(out)
}

fn build_notifier(settings: &AppSettings) -> Result<Arc<dyn Notifier>> {
    let webhook = &settings.webhook;
    if !webhook.loop_enabled && !webhook.item_enabled {
        return Ok(Arc::new(NullNotifier));
    }
    let notifier = WebhookNotifier::from_settings(webhook, platform::screen_source())?;
    Ok(Arc::new(notifier))
}

/// Engines are built on the worker thread because the Windows backends
/// cannot be moved across threads.
fn engine_factory(
    dry_run: bool,
    images: ImageIndex,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
) -> EngineFactory {
    Arc::new(move |stop: StopSignal, status: StatusLine| -> Result<PlaybackEngine> {
        let engine = if dry_run {
            let actuator = DryRunActuator::new(Arc::clone(&clock));
            PlaybackEngine::new(
                Box::new(actuator),
                platform::dry_run_locator(&images)?,
                Arc::clone(&clock),
                stop,
            )
        } else {
            platform::live_engine(&images, Arc::clone(&clock), stop)?
        };
        Ok(engine.with_notifier(Arc::clone(&notifier)).with_status(status))
    })
}

#[cfg(windows)]
mod platform {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use tracing::info;

    use simplemacro::automation::context::TemplateLocator;
    use simplemacro::automation::item_watch::ItemWatcher;
    use simplemacro::automation::{Clock, HotkeyAction, ImageLocator, MacroSession, PlaybackEngine, ScreenSource, SessionState};
    use simplemacro::core::hotkey::HotkeyListener;
    use simplemacro::core::input::SendInputActuator;
    use simplemacro::core::listener::spawn_input_listener;
    use simplemacro::core::screen_capture::DesktopCapture;
    use simplemacro::core::window::own_window_rect;
    use simplemacro::core::worker::{StopSignal, Worker};
    use simplemacro::error::Result;
    use simplemacro::notify::Notifier;
    use simplemacro::settings::AppSettings;
    use simplemacro::storage::ImageIndex;

    const POLL: Duration = Duration::from_millis(50);

    pub fn screen_source() -> Option<Box<dyn ScreenSource>> {
        Some(Box::new(DesktopCapture::new()))
    }

    pub fn dry_run_locator(images: &ImageIndex) -> Result<Box<dyn ImageLocator>> {
        Ok(Box::new(TemplateLocator::new(images.clone())?))
    }

    pub fn live_engine(images: &ImageIndex, clock: Arc<dyn Clock>, stop: StopSignal) -> Result<PlaybackEngine> {
        Ok(PlaybackEngine::new(
            Box::new(SendInputActuator::new()),
            Box::new(TemplateLocator::new(images.clone())?),
            clock,
            stop,
        ))
    }

    pub fn start_item_watcher(
        settings: &AppSettings,
        images: ImageIndex,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Option<Worker> {
        let items: Vec<_> = settings.items.iter().filter(|i| i.enabled).cloned().collect();
        if items.is_empty() {
            return None;
        }

        let mut worker = Worker::new();
        worker.start(move |stop, _status| match TemplateLocator::new(images) {
            Ok(locator) => {
                ItemWatcher::new(items, Box::new(locator), Box::new(DesktopCapture::new()), notifier, clock).run(stop)
            }
            Err(e) => tracing::warn!("Item watcher disabled: {}", e),
        });
        Some(worker)
    }

    /// Wait for playback to end. The play hotkey stops it early.
    pub fn wait_for_playback(session: &mut MacroSession, settings: &AppSettings) -> Result<SessionState> {
        let hotkeys = HotkeyListener::register(&settings.hotkeys)?;
        info!("Press {} to stop", settings.hotkeys.play);

        let mut last_status = String::new();
        loop {
            if hotkeys.poll() == Some(HotkeyAction::TogglePlay) {
                session.stop_playback();
            }
            let state = session.state();
            if state != SessionState::Playing {
                return Ok(state);
            }
            let status = session.status();
            if status != last_status {
                tracing::debug!("{}", status);
                last_status = status;
            }
            thread::sleep(POLL);
        }
    }

    pub fn record_until_hotkey(session: &mut MacroSession) -> Result<usize> {
        let hotkeys = HotkeyListener::register(&session.settings().hotkeys)?;
        let recorder = session.recorder();
        recorder.set_exclusion(own_window_rect());
        spawn_input_listener(recorder);

        session.start_recording()?;
        info!("Recording, press {} to stop", session.settings().hotkeys.record);
        loop {
            if hotkeys.poll() == Some(HotkeyAction::ToggleRecord) {
                return session.stop_recording();
            }
            thread::sleep(POLL);
        }
    }
}

#[cfg(not(windows))]
mod platform {
    use std::sync::Arc;

    use simplemacro::automation::testing::ScriptedLocator;
    use simplemacro::automation::{Clock, ImageLocator, MacroSession, PlaybackEngine, ScreenSource, SessionState};
    use simplemacro::core::worker::{StopSignal, Worker};
    use simplemacro::error::{MacroError, Result};
    use simplemacro::notify::Notifier;
    use simplemacro::settings::AppSettings;
    use simplemacro::storage::ImageIndex;

    pub fn screen_source() -> Option<Box<dyn ScreenSource>> {
        None
    }

    /// No screen to search here, so image steps never match.
    pub fn dry_run_locator(_images: &ImageIndex) -> Result<Box<dyn ImageLocator>> {
        Ok(Box::new(ScriptedLocator::never()))
    }

    pub fn live_engine(_images: &ImageIndex, _clock: Arc<dyn Clock>, _stop: StopSignal) -> Result<PlaybackEngine> {
        Err(MacroError::Platform("input injection needs Windows".into()))
    }

    pub fn start_item_watcher(
        _settings: &AppSettings,
        _images: ImageIndex,
        _notifier: Arc<dyn Notifier>,
        _clock: Arc<dyn Clock>,
    ) -> Option<Worker> {
        None
    }

    pub fn wait_for_playback(session: &mut MacroSession, _settings: &AppSettings) -> Result<SessionState> {
        Ok(session.wait())
    }

    pub fn record_until_hotkey(_session: &mut MacroSession) -> Result<usize> {
        Err(MacroError::Platform("recording needs Windows".into()))
    }
}
