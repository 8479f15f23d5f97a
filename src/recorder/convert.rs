use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::event::RecordedEvent;
use crate::steps::{Key, Step, Trigger};

/// Press/release gaps longer than this become holds.
pub const HOLD_THRESHOLD_MS: i64 = 300;
/// Floor for the delay of every produced step, in seconds.
pub const MIN_STEP_DELAY: f64 = 0.05;

/// What to do with a mouse press that never sees its release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedPress {
    /// Same as an unmatched key press: an immediate single click.
    #[default]
    Click,
    Drop,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    pub unmatched_mouse_press: UnmatchedPress,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn step_delay(gap: f64) -> f64 {
    round2(gap).max(MIN_STEP_DELAY)
}

// Compare whole milliseconds so a gap of exactly 0.3s stays a click
fn press_step(trigger: Trigger, at: Option<(i32, i32)>, held_for: f64) -> Step {
    if (held_for * 1000.0).round() as i64 > HOLD_THRESHOLD_MS {
        Step::hold(trigger, at, round2(held_for))
    } else {
        Step::click(trigger, at, 1)
    }
}

/// Turn a recorded event log into steps in one forward pass.
///
/// Each release pairs with at most one press. Repeated key presses while
/// the key is still down (keyboard auto-repeat) fold into the first press.
pub fn convert(events: &[RecordedEvent], options: ConvertOptions) -> Vec<Step> {
    let mut events = events.to_vec();
    events.sort_by(|a, b| a.t().total_cmp(&b.t()));

    let mut paired: HashSet<usize> = HashSet::new();
    let mut keys_down: HashMap<Key, usize> = HashMap::new();
    let mut last_consumed = 0.0;
    let mut steps = Vec::new();

    for (i, event) in events.iter().enumerate() {
        let step = match event {
            RecordedEvent::MouseClick {
                x,
                y,
                button,
                pressed: true,
                t,
            } => {
                let release = find_release(&events, i, &paired, |e| {
                    matches!(e, RecordedEvent::MouseClick { button: b, pressed: false, .. } if b == button)
                });
                let trigger = Trigger::Mouse(*button);
                match release {
                    Some(j) => {
                        paired.insert(j);
                        Some(press_step(trigger, Some((*x, *y)), events[j].t() - t))
                    }
                    None => match options.unmatched_mouse_press {
                        UnmatchedPress::Click => Some(Step::click(trigger, Some((*x, *y)), 1)),
                        UnmatchedPress::Drop => {
                            debug!("Dropping {} press at {:.2}s with no release", button.as_str(), t);
                            None
                        }
                    },
                }
            }
            RecordedEvent::KeyPress { key, t } => {
                if keys_down.get(key).is_some_and(|&release| release > i) {
                    // auto-repeat of a press already paired with a later release
                    None
                } else {
                    let release = find_release(&events, i, &paired, |e| {
                        matches!(e, RecordedEvent::KeyRelease { key: k, .. } if k == key)
                    });
                    let trigger = Trigger::Key(*key);
                    match release {
                        Some(j) => {
                            paired.insert(j);
                            keys_down.insert(*key, j);
                            Some(press_step(trigger, None, events[j].t() - t))
                        }
                        None => Some(Step::click(trigger, None, 1)),
                    }
                }
            }
            RecordedEvent::MouseMove { x, y, .. } => Some(Step::click(Trigger::MouseMove, Some((*x, *y)), 1)),
            RecordedEvent::MouseScroll { x, y, dy, .. } => Some(Step::scroll(*dy, Some((*x, *y)))),
            RecordedEvent::MouseClick { pressed: false, .. } | RecordedEvent::KeyRelease { .. } => None,
        };

        if let Some(step) = step {
            let t = event.t();
            steps.push(step.with_delay(step_delay(t - last_consumed)));
            last_consumed = t;
        }
    }

    debug!("Converted {} events into {} steps", events.len(), steps.len());
    steps
}

fn find_release(
    events: &[RecordedEvent],
    press: usize,
    paired: &HashSet<usize>,
    is_release: impl Fn(&RecordedEvent) -> bool,
) -> Option<usize> {
    events
        .iter()
        .enumerate()
        .skip(press + 1)
        .find(|(j, e)| !paired.contains(j) && is_release(e))
        .map(|(j, _)| j)
}
