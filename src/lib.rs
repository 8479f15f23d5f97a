//! Step-based macro recording and playback.
//!
//! A macro is an ordered list of [`steps::Step`]s. The playback engine
//! drives them through an [`automation::InputActuator`], waiting on screen
//! templates through an [`automation::ImageLocator`]. The recorder turns
//! captured input back into steps. Platform backends live under `core`
//! and `automation::context` and are only built on Windows.

pub mod automation;
pub mod core;
pub mod error;
pub mod notify;
pub mod recorder;
pub mod settings;
pub mod steps;
pub mod storage;

pub use error::{MacroError, Result};
