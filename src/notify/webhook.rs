use image::{ImageFormat, RgbImage};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use super::{LoopTotal, Notifier};
use crate::automation::traits::ScreenSource;
use crate::error::{MacroError, Result};
use crate::settings::WebhookSettings;

const SCREENSHOT_NAME: &str = "screenshot.png";
const POST_TIMEOUT: Duration = Duration::from_secs(10);

/// Discord-style webhook delivery. Each post runs on its own thread and
/// failures are only logged.
pub struct WebhookNotifier {
    client: Client,
    loop_url: Option<String>,
    item_url: Option<String>,
    mention: Option<String>,
    screen: Option<Arc<Mutex<Box<dyn ScreenSource>>>>,
}

impl WebhookNotifier {
    /// `screen` is used to attach a screenshot to loop notifications.
    pub fn from_settings(settings: &WebhookSettings, screen: Option<Box<dyn ScreenSource>>) -> Result<Self> {
        let client = Client::builder()
            .timeout(POST_TIMEOUT)
            .build()
            .map_err(|e| MacroError::Webhook(format!("failed to build http client: {}", e)))?;

        let enabled_url = |url: &str, enabled: bool| {
            let url = url.trim();
            (enabled && !url.is_empty()).then(|| url.to_string())
        };

        Ok(Self {
            client,
            loop_url: enabled_url(&settings.loop_url, settings.loop_enabled),
            item_url: enabled_url(&settings.item_url, settings.item_enabled),
            mention: settings
                .mention_enabled
                .then(|| settings.mention_user.trim().to_string())
                .filter(|u| !u.is_empty()),
            screen: screen.map(|s| Arc::new(Mutex::new(s))),
        })
    }

    /// Run `job` on a detached thread and post whatever it builds.
    fn post_with<F>(&self, url: &str, job: F)
    where
        F: FnOnce() -> (Value, Option<Vec<u8>>) + Send + 'static,
    {
        let client = self.client.clone();
        let url = url.to_string();
        thread::spawn(move || {
            let (payload, png) = job();
            match send(&client, &url, &payload, png) {
                Ok(()) => debug!("Webhook delivered"),
                Err(e) => warn!("{}", e),
            }
        });
    }
}

fn capture(screen: &Mutex<Box<dyn ScreenSource>>) -> Option<RgbImage> {
    let mut screen = screen.lock().unwrap_or_else(PoisonError::into_inner);
    match screen.capture() {
        Ok(image) => Some(image),
        Err(e) => {
            warn!("Screenshot for webhook failed: {}", e);
            None
        }
    }
}

fn png_or_log(image: &RgbImage) -> Option<Vec<u8>> {
    match encode_png(image) {
        Ok(png) => Some(png),
        Err(e) => {
            warn!("Could not encode webhook screenshot: {}", e);
            None
        }
    }
}

impl Notifier for WebhookNotifier {
    fn loop_complete(&self, completed: u64, total: LoopTotal) {
        let Some(url) = &self.loop_url else {
            return;
        };
        let screen = self.screen.clone();
        self.post_with(url, move || {
            let png = screen.as_deref().and_then(capture).as_ref().and_then(png_or_log);
            (loop_payload(completed, total, png.is_some()), png)
        });
    }

    fn item_detected(&self, name: &str, screenshot: &RgbImage) {
        let Some(url) = &self.item_url else {
            return;
        };
        let payload = item_payload(name, self.mention.as_deref());
        let screenshot = screenshot.clone();
        self.post_with(url, move || (payload, png_or_log(&screenshot)));
    }
}

fn send(client: &Client, url: &str, payload: &Value, png: Option<Vec<u8>>) -> Result<()> {
    let mut form = Form::new().text("payload_json", payload.to_string());
    if let Some(bytes) = png {
        let part = Part::bytes(bytes)
            .file_name(SCREENSHOT_NAME)
            .mime_str("image/png")
            .map_err(|e| MacroError::Webhook(e.to_string()))?;
        form = form.part("file", part);
    }

    let response = client
        .post(url)
        .multipart(form)
        .send()
        .map_err(|e| MacroError::Webhook(e.to_string()))?;

    if !response.status().is_success() {
        return Err(MacroError::Webhook(format!("server answered {}", response.status())));
    }
    Ok(())
}

fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

pub(crate) fn loop_payload(completed: u64, total: LoopTotal, with_image: bool) -> Value {
    let mut embed = json!({
        "title": "Loop Complete",
        "description": format!("Loops completed: {} / {}", completed, total),
    });
    if with_image {
        embed["image"] = json!({ "url": format!("attachment://{}", SCREENSHOT_NAME) });
    }
    json!({ "embeds": [embed] })
}

/// Numeric user ids get a real ping, anything else is plain text.
pub(crate) fn item_payload(name: &str, mention: Option<&str>) -> Value {
    let (prefix, allowed) = match mention {
        Some(user) if user.chars().all(|c| c.is_ascii_digit()) => {
            (format!("<@{}> ", user), Some(json!({ "users": [user] })))
        }
        Some(user) => (format!("@{} ", user), None),
        None => (String::new(), None),
    };

    let mut payload = json!({
        "content": format!("{}Item ({}) obtained!", prefix, name),
        "embeds": [{
            "title": format!("Item ({}) obtained!", name),
            "description": format!("Item: {}", name),
            "image": { "url": format!("attachment://{}", SCREENSHOT_NAME) },
        }],
    });
    if let Some(allowed) = allowed {
        payload["allowed_mentions"] = allowed;
    }
    payload
}
