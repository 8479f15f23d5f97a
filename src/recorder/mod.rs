pub mod capture;
pub mod convert;
pub mod event;

pub use capture::{RawInput, RecordOptions, Recorder, ScreenRect};
pub use convert::{convert, ConvertOptions, UnmatchedPress};
pub use event::{load_events, save_events, RecordedEvent};
