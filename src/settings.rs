use global_hotkey::hotkey::HotKey;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

use crate::automation::playback::PlaybackConfig;
use crate::error::{MacroError, Result};
use crate::recorder::{ConvertOptions, RecordOptions};
use crate::steps::{Key, TemplateRef, Trigger};

pub const SETTINGS_FILE: &str = "simplemacro_settings.json";
const IMAGES_FOLDER: &str = "SimpleMacro_Images";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub playback: PlaybackSettings,
    pub hotkeys: HotkeySettings,
    pub folders: FolderSettings,
    pub recording: RecordOptions,
    pub convert: ConvertOptions,
    pub webhook: WebhookSettings,
    pub items: Vec<WatchedItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub speed: f64,
    /// `0` loops until stopped.
    pub loop_count: u32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            speed: 1.0,
            loop_count: 1,
        }
    }
}

/// Global hotkeys in `global-hotkey` notation ("F6", "ctrl+shift+KeyR").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeySettings {
    pub play: String,
    pub record: String,
}

impl Default for HotkeySettings {
    fn default() -> Self {
        Self {
            play: "F6".to_string(),
            record: "F7".to_string(),
        }
    }
}

impl HotkeySettings {
    pub fn play_hotkey(&self) -> Result<HotKey> {
        parse_hotkey("hotkeys.play", &self.play)
    }

    pub fn record_hotkey(&self) -> Result<HotKey> {
        parse_hotkey("hotkeys.record", &self.record)
    }

    /// Main keys of both hotkeys, kept out of recordings. Letters are
    /// lowercased to match what the listener reports.
    pub fn main_keys(&self) -> Vec<Key> {
        [&self.play, &self.record]
            .iter()
            .filter_map(|hotkey| hotkey.rsplit('+').next())
            .filter_map(|main| Trigger::parse(main.trim_start_matches("Key")).ok())
            .filter_map(|trigger| match trigger {
                Trigger::Key(Key::Char(c)) => Some(Key::Char(c.to_ascii_lowercase())),
                Trigger::Key(key) => Some(key),
                _ => None,
            })
            .collect()
    }
}

fn parse_hotkey(field: &str, raw: &str) -> Result<HotKey> {
    HotKey::from_str(raw).map_err(|e| MacroError::config(field, format!("'{}': {}", raw, e)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderSettings {
    pub recordings: PathBuf,
    /// Root searched when re-resolving templates by hash.
    pub images: PathBuf,
}

impl Default for FolderSettings {
    fn default() -> Self {
        let documents = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            images: documents.join(IMAGES_FOLDER),
            recordings: documents,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookSettings {
    pub loop_url: String,
    pub loop_enabled: bool,
    pub item_url: String,
    pub item_enabled: bool,
    pub mention_enabled: bool,
    /// Numeric user id (pinged) or a plain name.
    pub mention_user: String,
}

fn default_item_confidence() -> f32 {
    0.8
}

fn default_true() -> bool {
    true
}

fn default_cooldown_secs() -> f64 {
    10.0
}

/// A template the item watcher looks for in the background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedItem {
    pub name: String,
    pub template: TemplateRef,
    #[serde(default = "default_item_confidence")]
    pub confidence: f32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: f64,
}

impl AppSettings {
    /// Load settings, falling back to defaults if the file is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        match Self::load_strict(path) {
            Ok(settings) => settings,
            Err(MacroError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                info!("No settings at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("Ignoring settings at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn load_strict(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| MacroError::io(path, e))?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| MacroError::io(path, e))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.playback.speed.is_finite() && self.playback.speed > 0.0) {
            return Err(MacroError::config(
                "playback.speed",
                format!("{} must be greater than 0", self.playback.speed),
            ));
        }
        self.hotkeys.play_hotkey()?;
        self.hotkeys.record_hotkey()?;
        if self.hotkeys.play.eq_ignore_ascii_case(&self.hotkeys.record) {
            return Err(MacroError::config("hotkeys", "play and record hotkeys must differ"));
        }

        for item in &self.items {
            let field = |name: &str| format!("items.{}.{}", item.name, name);
            if !(0.0..=1.0).contains(&item.confidence) {
                return Err(MacroError::config(field("confidence"), "must be between 0 and 1"));
            }
            if !(item.cooldown_secs.is_finite() && item.cooldown_secs >= 0.0) {
                return Err(MacroError::config(field("cooldown_secs"), "must be 0 or more"));
            }
            if item.template.hash.is_none() && item.template.path.is_none() {
                return Err(MacroError::config(field("template"), "needs a hash or a path"));
            }
        }
        Ok(())
    }

    pub fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig {
            loop_count: self.playback.loop_count,
            speed: self.playback.speed,
        }
    }
}
