use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::core::worker::StopSignal;

/// Time source used for pacing. Playback and recording only ever read
/// time and sleep through this, so tests can run on simulated time.
pub trait Clock: Send + Sync {
    /// Monotonic time since the clock was created.
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

/// Longest uninterrupted sleep, which bounds how late a stop request is seen.
pub const STOP_SLICE: Duration = Duration::from_millis(50);

/// Sleep for `duration` in short slices. Returns false as soon as `stop`
/// is raised, true once the full duration has passed.
pub fn sleep_unless_stopped(clock: &dyn Clock, stop: &StopSignal, duration: Duration) -> bool {
    let deadline = clock.now().saturating_add(duration);
    loop {
        if stop.is_stopped() {
            return false;
        }
        let now = clock.now();
        if now >= deadline {
            return true;
        }
        clock.sleep((deadline - now).min(STOP_SLICE));
    }
}

/// Simulated clock: `sleep` advances time instantly. Can raise a stop
/// signal once simulated time passes a deadline.
#[derive(Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
    stop_at: Mutex<Option<(Duration, StopSignal)>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request `stop` as soon as simulated time reaches `deadline`.
    pub fn stop_at(&self, deadline: Duration, stop: StopSignal) {
        *self.stop_at.lock().unwrap_or_else(PoisonError::into_inner) = Some((deadline, stop));
    }

    pub fn advance(&self, duration: Duration) {
        let now = {
            let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
            *now += duration;
            *now
        };
        if let Some((deadline, stop)) = &*self.stop_at.lock().unwrap_or_else(PoisonError::into_inner) {
            if now >= *deadline {
                stop.request_stop();
            }
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_on_sleep() {
        let clock = ManualClock::new();
        clock.sleep(Duration::from_millis(250));
        clock.sleep(Duration::from_millis(250));
        assert_eq!(clock.now(), Duration::from_millis(500));
    }

    #[test]
    fn sleep_wakes_early_on_stop() {
        let clock = ManualClock::new();
        let stop = StopSignal::new();
        clock.stop_at(Duration::from_millis(120), stop.clone());
        assert!(!sleep_unless_stopped(&clock, &stop, Duration::from_secs(5)));
        assert_eq!(clock.now(), Duration::from_millis(150));
    }

    #[test]
    fn manual_clock_raises_stop_at_deadline() {
        let clock = ManualClock::new();
        let stop = StopSignal::new();
        clock.stop_at(Duration::from_secs(2), stop.clone());
        clock.sleep(Duration::from_millis(1999));
        assert!(!stop.is_stopped());
        clock.sleep(Duration::from_millis(1));
        assert!(stop.is_stopped());
    }
}
