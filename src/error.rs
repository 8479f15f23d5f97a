use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the macro engine, recorder and persistence layers.
#[derive(Debug, Error)]
pub enum MacroError {
    /// A step or setting failed validation at authoring time.
    #[error("invalid {field}: {reason}")]
    Configuration { field: String, reason: String },

    /// A template image (or other required resource) is missing or unreadable.
    #[error("{what} unavailable: {reason}")]
    ResourceUnavailable { what: String, reason: String },

    /// An input injection or screen capture call failed.
    #[error("actuation failed: {0}")]
    Actuation(String),

    /// Rejected because the session is busy (playing or recording).
    #[error("session busy: {0}")]
    Busy(String),

    /// Requested feature is not available on this platform.
    #[error("not supported on this platform: {0}")]
    Platform(String),

    #[error("webhook delivery failed: {0}")]
    Webhook(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl MacroError {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        MacroError::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(what: impl Into<String>, reason: impl Into<String>) -> Self {
        MacroError::ResourceUnavailable {
            what: what.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MacroError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error should abort a running playback session.
    pub fn is_fatal_for_playback(&self) -> bool {
        !matches!(self, MacroError::ResourceUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, MacroError>;
