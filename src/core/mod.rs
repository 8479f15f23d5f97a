pub mod dry_run;
pub mod worker;

#[cfg(windows)]
pub mod hotkey;
#[cfg(windows)]
pub mod input;
#[cfg(windows)]
pub mod listener;
#[cfg(windows)]
pub mod screen_capture;
#[cfg(windows)]
pub mod window;
