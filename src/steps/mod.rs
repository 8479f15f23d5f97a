pub mod key;
pub mod validate;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{MacroError, Result};
pub use key::{Key, MouseButton, NamedKey, Trigger};
pub use validate::StepDraft;

/// Inner repetitions of a step per visit. `0` repeats until stopped,
/// `1` runs at most once per playback session.
pub const STEP_LOOP_INFINITE: u32 = 0;
pub const STEP_LOOP_ONCE: u32 = 1;

fn default_delay() -> f64 {
    0.1
}

fn default_step_speed() -> f64 {
    1.0
}

fn default_step_loop() -> u32 {
    STEP_LOOP_ONCE
}

fn default_count() -> u32 {
    1
}

fn default_confidence() -> f32 {
    0.8
}

fn default_timeout_seconds() -> f64 {
    30.0
}

/// One unit of an automation sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Display-only label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(flatten)]
    pub kind: StepKind,

    /// Pause after the action, in seconds, scaled by the effective speed.
    #[serde(default = "default_delay")]
    pub delay: f64,

    #[serde(default = "default_step_speed")]
    pub step_speed: f64,

    #[serde(default = "default_step_loop")]
    pub step_loop: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepKind {
    /// Press+release `count` times, optionally after moving the cursor.
    Click {
        key: Trigger,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        x: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        y: Option<i32>,
        #[serde(default = "default_count")]
        count: u32,
    },
    /// Press, wait `duration` seconds, release.
    Hold {
        key: Trigger,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        x: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        y: Option<i32>,
        duration: f64,
    },
    Type {
        text: String,
    },
    /// Signed wheel ticks, positive scrolls up.
    Scroll {
        amount: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        x: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        y: Option<i32>,
    },
    ImageSearch(ImageSearch),
}

/// Wait until a template appears on screen, optionally clicking it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSearch {
    pub template: TemplateRef,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    /// `0` polls forever.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,
    #[serde(default)]
    pub on_timeout: OnTimeout,
    #[serde(default)]
    pub click_on_found: bool,
    #[serde(default)]
    pub click_mode: ClickMode,
    #[serde(default = "default_count")]
    pub click_count: u32,
}

impl ImageSearch {
    pub fn new(template: TemplateRef) -> Self {
        Self {
            template,
            confidence: default_confidence(),
            timeout_seconds: default_timeout_seconds(),
            on_timeout: OnTimeout::default(),
            click_on_found: false,
            click_mode: ClickMode::default(),
            click_count: 1,
        }
    }

    /// Where to click for a match centred at `(cx, cy)`.
    pub fn click_target(&self, cx: i32, cy: i32) -> (i32, i32) {
        match self.click_mode {
            ClickMode::Offset { dx, dy } => (cx + dx, cy + dy),
            ClickMode::Absolute { x, y } => (x, y),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnTimeout {
    #[default]
    MoveOn,
    /// Restart the timeout window and keep polling.
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ClickMode {
    /// Relative to the match centre.
    Offset { dx: i32, dy: i32 },
    Absolute { x: i32, y: i32 },
}

impl Default for ClickMode {
    fn default() -> Self {
        ClickMode::Offset { dx: 0, dy: 0 }
    }
}

/// Template image identity. The SHA-256 content hash is authoritative,
/// the path is only a cache of where that content was last seen.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TemplateRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl TemplateRef {
    pub fn new(hash: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self {
            hash: Some(hash.into()),
            path,
        }
    }

    /// Short label for logs and the step list.
    pub fn label(&self) -> String {
        if let Some(name) = self.path.as_ref().and_then(|p| p.file_name()) {
            return name.to_string_lossy().into_owned();
        }
        match &self.hash {
            Some(hash) => format!("#{}", hash.chars().take(12).collect::<String>()),
            None => "<unset>".to_string(),
        }
    }
}

fn position(x: Option<i32>, y: Option<i32>) -> Option<(i32, i32)> {
    match (x, y) {
        (Some(x), Some(y)) => Some((x, y)),
        _ => None,
    }
}

impl Step {
    pub fn new(kind: StepKind) -> Self {
        Self {
            name: None,
            kind,
            delay: default_delay(),
            step_speed: default_step_speed(),
            step_loop: default_step_loop(),
        }
    }

    pub fn with_delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_step_loop(mut self, step_loop: u32) -> Self {
        self.step_loop = step_loop;
        self
    }

    pub fn with_step_speed(mut self, step_speed: f64) -> Self {
        self.step_speed = step_speed;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn click(key: Trigger, at: Option<(i32, i32)>, count: u32) -> Self {
        Self::new(StepKind::Click {
            key,
            x: at.map(|p| p.0),
            y: at.map(|p| p.1),
            count,
        })
    }

    pub fn hold(key: Trigger, at: Option<(i32, i32)>, duration: f64) -> Self {
        Self::new(StepKind::Hold {
            key,
            x: at.map(|p| p.0),
            y: at.map(|p| p.1),
            duration,
        })
    }

    pub fn type_text(text: impl Into<String>) -> Self {
        Self::new(StepKind::Type { text: text.into() })
    }

    pub fn scroll(amount: i32, at: Option<(i32, i32)>) -> Self {
        Self::new(StepKind::Scroll {
            amount,
            x: at.map(|p| p.0),
            y: at.map(|p| p.1),
        })
    }

    pub fn image_search(search: ImageSearch) -> Self {
        Self::new(StepKind::ImageSearch(search))
    }

    /// Cursor position the step moves to before actuating, if any.
    pub fn position(&self) -> Option<(i32, i32)> {
        match &self.kind {
            StepKind::Click { x, y, .. }
            | StepKind::Hold { x, y, .. }
            | StepKind::Scroll { x, y, .. } => position(*x, *y),
            StepKind::Type { .. } | StepKind::ImageSearch(_) => None,
        }
    }

    pub fn is_run_once(&self) -> bool {
        self.step_loop == STEP_LOOP_ONCE
    }

    /// Check the model invariants. Called before a step enters a step list.
    pub fn validate(&self) -> Result<()> {
        check_non_negative("delay", self.delay)?;
        check_non_negative("step_speed", self.step_speed)?;

        match &self.kind {
            StepKind::Click { x, y, count, .. } => {
                check_coordinates(*x, *y)?;
                if *count < 1 {
                    return Err(MacroError::config("count", "must be at least 1"));
                }
            }
            StepKind::Hold { x, y, duration, .. } => {
                check_coordinates(*x, *y)?;
                check_non_negative("duration", *duration)?;
            }
            StepKind::Type { .. } => {}
            StepKind::Scroll { x, y, .. } => check_coordinates(*x, *y)?,
            StepKind::ImageSearch(search) => {
                if search.template.hash.is_none() && search.template.path.is_none() {
                    return Err(MacroError::config("template", "no image hash or path"));
                }
                if let Some(hash) = &search.template.hash {
                    if !is_content_hash(hash) {
                        return Err(MacroError::config("template", format!("{:?} is not a SHA-256 hex digest", hash)));
                    }
                }
                if !(0.0..=1.0).contains(&search.confidence) {
                    return Err(MacroError::config(
                        "confidence",
                        format!("{} is outside 0.0..=1.0", search.confidence),
                    ));
                }
                check_non_negative("timeout_seconds", search.timeout_seconds)?;
                if search.click_count < 1 {
                    return Err(MacroError::config("click_count", "must be at least 1"));
                }
            }
        }
        Ok(())
    }

    /// One-line summary for step listings.
    pub fn describe(&self, index: usize) -> String {
        let coord_text = self
            .position()
            .map(|(x, y)| format!(" at ({}, {})", x, y))
            .unwrap_or_default();

        let mut opts = String::new();
        if self.step_speed != 1.0 {
            opts.push_str(&format!(" @{:.1}x", self.step_speed));
        }
        match self.step_loop {
            STEP_LOOP_INFINITE => opts.push_str(" loop:inf"),
            STEP_LOOP_ONCE => opts.push_str(" once"),
            n => opts.push_str(&format!(" loop:{}", n)),
        }

        let prefix = match &self.name {
            Some(name) if !name.is_empty() => format!("[{}] ", name),
            _ => String::new(),
        };

        let body = match &self.kind {
            StepKind::Click { key, count, .. } => {
                format!("Click '{}'{} x{} times", key, coord_text, count)
            }
            StepKind::Hold { key, duration, .. } => {
                format!("Hold '{}'{} for {}s", key, coord_text, duration)
            }
            StepKind::Type { text } => {
                let shown: String = text.chars().take(30).collect();
                let ellipsis = if text.chars().count() > 30 { "..." } else { "" };
                format!("Type \"{}{}\"", shown, ellipsis)
            }
            StepKind::Scroll { amount, .. } => {
                let direction = if *amount > 0 { "up" } else { "down" };
                format!("Scroll {} {}{}", direction, amount.abs(), coord_text)
            }
            StepKind::ImageSearch(search) => {
                let timeout = if search.timeout_seconds > 0.0 {
                    format!(" timeout {}s", search.timeout_seconds)
                } else {
                    " timeout inf".to_string()
                };
                let click = if search.click_on_found {
                    match search.click_mode {
                        ClickMode::Absolute { x, y } => format!(" -> Click at ({}, {})", x, y),
                        ClickMode::Offset { dx: 0, dy: 0 } => " -> Click".to_string(),
                        ClickMode::Offset { dx, dy } => format!(" -> Click ({:+}, {:+})", dx, dy),
                    }
                } else {
                    String::new()
                };
                format!("WAIT Image '{}'{}{}", search.template.label(), timeout, click)
            }
        };

        format!("{}. {}{}{}  [Delay: {}s]", index, prefix, body, opts, self.delay)
    }
}

fn check_non_negative(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(MacroError::config(field, format!("{} must be a finite number >= 0", value)));
    }
    Ok(())
}

/// 64 hex digits, as written by `storage::hash_file`.
pub fn is_content_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

fn check_coordinates(x: Option<i32>, y: Option<i32>) -> Result<()> {
    if x.is_some() != y.is_some() {
        return Err(MacroError::config("x/y", "both coordinates must be given together"));
    }
    Ok(())
}
