pub mod clock;
pub mod item_watch;
pub mod playback;
pub mod session;
pub mod testing;
pub mod traits;

#[cfg(windows)]
pub mod context;

pub use clock::{Clock, SystemClock};
pub use playback::{PlaybackConfig, PlaybackEngine, PlaybackOutcome, PlaybackReport};
pub use session::{EngineFactory, HotkeyAction, MacroSession, SessionState};
pub use traits::{ImageLocator, InputActuator, Match, ScreenSource};
