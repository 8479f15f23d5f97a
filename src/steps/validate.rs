// Authoring-time parsing of operator-entered step fields
use std::path::PathBuf;
use std::str::FromStr;

use super::{ClickMode, ImageSearch, OnTimeout, Step, StepKind, TemplateRef, Trigger};
use crate::error::{MacroError, Result};
use crate::storage::image_index::hash_file;

/// Raw, unvalidated step fields as typed by the operator.
///
/// `amount` is interpreted per action: click count, hold duration in
/// seconds, or scroll ticks.
#[derive(Debug, Clone, Default)]
pub struct StepDraft {
    pub action: String,
    pub name: Option<String>,
    pub key: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
    pub amount: Option<String>,
    pub text: Option<String>,
    pub delay: Option<String>,
    pub step_speed: Option<String>,
    pub step_loop: Option<String>,
    pub image: Option<PathBuf>,
    pub confidence: Option<String>,
    pub timeout: Option<String>,
    pub on_timeout: Option<String>,
    pub click_on_found: bool,
    pub offset: Option<(String, String)>,
    pub absolute: Option<(String, String)>,
    pub click_count: Option<String>,
}

fn parse_field<T: FromStr>(field: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| MacroError::config(field, format!("'{}' is not a valid number", raw)))
}

fn parse_opt<T: FromStr>(field: &str, raw: &Option<String>) -> Result<Option<T>> {
    raw.as_deref().map(|r| parse_field(field, r)).transpose()
}

fn require<'a>(field: &str, raw: &'a Option<String>) -> Result<&'a str> {
    raw.as_deref()
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| MacroError::config(field, "is required"))
}

impl StepDraft {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    /// Parse and validate into a [`Step`]. Nothing invalid gets past here.
    pub fn build(&self) -> Result<Step> {
        let x: Option<i32> = parse_opt("x", &self.x)?;
        let y: Option<i32> = parse_opt("y", &self.y)?;

        let kind = match self.action.trim().to_lowercase().as_str() {
            "click" => StepKind::Click {
                key: Trigger::parse(require("key", &self.key)?)?,
                x,
                y,
                count: parse_opt("count", &self.amount)?.unwrap_or(1),
            },
            "hold" => StepKind::Hold {
                key: Trigger::parse(require("key", &self.key)?)?,
                x,
                y,
                duration: parse_field("duration", require("duration", &self.amount)?)?,
            },
            "type" => {
                let text = self.text.clone().unwrap_or_default();
                if text.is_empty() {
                    return Err(MacroError::config("text", "nothing to type"));
                }
                StepKind::Type { text }
            }
            "scroll" => StepKind::Scroll {
                amount: parse_field("scroll amount", require("scroll amount", &self.amount)?)?,
                x,
                y,
            },
            "image_search" => StepKind::ImageSearch(self.build_image_search()?),
            other => {
                return Err(MacroError::config("action", format!("unknown action '{}'", other)));
            }
        };

        let mut step = Step::new(kind);
        step.name = self
            .name
            .as_ref()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if let Some(delay) = parse_opt("delay", &self.delay)? {
            step.delay = delay;
        }
        if let Some(speed) = parse_opt::<f64>("step_speed", &self.step_speed)? {
            if speed <= 0.0 {
                return Err(MacroError::config("step_speed", "must be greater than 0"));
            }
            step.step_speed = speed;
        }
        if let Some(step_loop) = parse_opt("step_loop", &self.step_loop)? {
            step.step_loop = step_loop;
        }

        step.validate()?;
        Ok(step)
    }

    fn build_image_search(&self) -> Result<ImageSearch> {
        let path = self
            .image
            .clone()
            .ok_or_else(|| MacroError::config("image", "is required"))?;
        let hash = hash_file(&path)?;
        let mut search = ImageSearch::new(TemplateRef::new(hash, Some(path)));

        if let Some(confidence) = parse_opt("confidence", &self.confidence)? {
            search.confidence = confidence;
        }
        if let Some(timeout) = parse_opt("timeout", &self.timeout)? {
            search.timeout_seconds = timeout;
        }
        if let Some(policy) = self.on_timeout.as_deref() {
            search.on_timeout = match policy.trim().to_lowercase().as_str() {
                "move_on" | "moveon" => OnTimeout::MoveOn,
                "retry" => OnTimeout::Retry,
                other => {
                    return Err(MacroError::config(
                        "on_timeout",
                        format!("expected move_on or retry, got '{}'", other),
                    ));
                }
            };
        }
        search.click_on_found = self.click_on_found;
        if let Some((dx, dy)) = &self.offset {
            search.click_mode = ClickMode::Offset {
                dx: parse_field("offset x", dx)?,
                dy: parse_field("offset y", dy)?,
            };
        }
        if let Some((x, y)) = &self.absolute {
            search.click_mode = ClickMode::Absolute {
                x: parse_field("absolute x", x)?,
                y: parse_field("absolute y", y)?,
            };
        }
        if let Some(count) = parse_opt("click_count", &self.click_count)? {
            search.click_count = count;
        }
        Ok(search)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::MouseButton;
    use std::io::Write;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn builds_a_click_with_coordinates() {
        let draft = StepDraft {
            key: some("left_click"),
            x: some("120"),
            y: some(" 45 "),
            amount: some("3"),
            delay: some("0.25"),
            name: some("  open bag "),
            ..StepDraft::new("click")
        };
        let step = draft.build().unwrap();
        assert_eq!(step.name.as_deref(), Some("open bag"));
        assert_eq!(step.delay, 0.25);
        assert_eq!(
            step.kind,
            StepKind::Click {
                key: Trigger::Mouse(MouseButton::Left),
                x: Some(120),
                y: Some(45),
                count: 3,
            }
        );
    }

    #[test]
    fn rejects_non_numeric_delay_and_speed() {
        let draft = StepDraft {
            key: some("a"),
            delay: some("soon"),
            ..StepDraft::new("click")
        };
        let err = draft.build().unwrap_err();
        assert!(matches!(err, MacroError::Configuration { ref field, .. } if field == "delay"));

        let draft = StepDraft {
            key: some("a"),
            step_speed: some("fast"),
            ..StepDraft::new("click")
        };
        assert!(draft.build().is_err());

        let draft = StepDraft {
            key: some("a"),
            step_speed: some("0"),
            ..StepDraft::new("click")
        };
        assert!(draft.build().is_err());
    }

    #[test]
    fn hold_requires_duration() {
        let draft = StepDraft {
            key: some("space"),
            ..StepDraft::new("hold")
        };
        assert!(draft.build().is_err());
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(StepDraft::new("teleport").build().is_err());
        assert!(StepDraft::new("type").build().is_err());
    }

    #[test]
    fn image_search_hashes_the_template() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not really a png").unwrap();

        let draft = StepDraft {
            image: Some(file.path().to_path_buf()),
            confidence: some("0.9"),
            timeout: some("0"),
            on_timeout: some("retry"),
            click_on_found: true,
            offset: Some(("5".into(), "-2".into())),
            ..StepDraft::new("image_search")
        };
        let step = draft.build().unwrap();
        let StepKind::ImageSearch(search) = step.kind else {
            panic!("expected image search");
        };
        assert_eq!(search.template.hash.as_deref().map(str::len), Some(64));
        assert_eq!(search.on_timeout, OnTimeout::Retry);
        assert_eq!(search.timeout_seconds, 0.0);
        assert_eq!(search.click_mode, ClickMode::Offset { dx: 5, dy: -2 });
    }
}
