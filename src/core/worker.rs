use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// Cooperative stop flag shared between the command side and a worker.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Latest human-readable progress line of a worker.
#[derive(Debug, Clone)]
pub struct StatusLine(Arc<Mutex<String>>);

impl Default for StatusLine {
    fn default() -> Self {
        Self(Arc::new(Mutex::new("Ready".to_string())))
    }
}

impl StatusLine {
    pub fn set(&self, text: impl Into<String>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = text.into();
    }

    pub fn get(&self) -> String {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

// Clears the running flag even if the task panics
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs one background task at a time with a stop flag and a status line.
#[derive(Default)]
pub struct Worker {
    running: Arc<AtomicBool>,
    stop: StopSignal,
    status: StatusLine,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` on its own thread. Returns false if a task is still running.
    pub fn start<F>(&mut self, task: F) -> bool
    where
        F: FnOnce(StopSignal, StatusLine) + Send + 'static,
    {
        if self.is_running() {
            return false;
        }
        // Reap the previous thread before reusing the flags
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }

        self.stop.reset();
        self.running.store(true, Ordering::SeqCst);

        let guard = RunningGuard(Arc::clone(&self.running));
        let stop = self.stop.clone();
        let status = self.status.clone();

        self.handle = Some(thread::spawn(move || {
            let _guard = guard;
            task(stop, status);
        }));
        true
    }

    pub fn stop(&self) {
        if self.is_running() {
            self.stop.request_stop();
            self.set_status("Stopping...");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Block until the current task (if any) has finished.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn get_status(&self) -> String {
        self.status.get()
    }

    pub fn set_status(&self, text: &str) {
        self.status.set(text);
    }
}
