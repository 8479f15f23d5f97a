use rustautogui::{MatchMode, RustAutoGui};
use std::collections::HashMap;
use tracing::debug;

use super::traits::{ImageLocator, Match};
use crate::error::{MacroError, Result};
use crate::steps::TemplateRef;
use crate::storage::ImageIndex;

/// Screen template matching through rustautogui. Templates are resolved
/// through the image index (so moved files are still found by content)
/// and stored once per content hash.
pub struct TemplateLocator {
    gui: RustAutoGui,
    index: ImageIndex,
    aliases: HashMap<String, String>,
}

impl TemplateLocator {
    pub fn new(index: ImageIndex) -> Result<Self> {
        let gui = RustAutoGui::new(false)
            .map_err(|e| MacroError::Platform(format!("failed to initialize RustAutoGui: {}", e)))?;
        Ok(Self {
            gui,
            index,
            aliases: HashMap::new(),
        })
    }

    /// Alias for `template`, loading it into rustautogui on first use.
    fn alias_for(&mut self, template: &TemplateRef) -> Result<String> {
        let key = cache_key(template);
        if let Some(alias) = self.aliases.get(&key) {
            return Ok(alias.clone());
        }

        let path = self.index.locate_file(template)?;
        let path_str = path
            .to_str()
            .ok_or_else(|| MacroError::unavailable(format!("template {}", path.display()), "path is not valid UTF-8"))?;
        let alias = format!("tpl{}", self.aliases.len());
        self.gui
            .store_template_from_file(path_str, None, MatchMode::Segmented, &alias)
            .map_err(|e| MacroError::unavailable(format!("template {}", template.label()), e.to_string()))?;

        debug!("Stored template {} as {}", path.display(), alias);
        self.aliases.insert(key, alias.clone());
        Ok(alias)
    }
}

fn cache_key(template: &TemplateRef) -> String {
    match (&template.hash, &template.path) {
        (Some(hash), _) => hash.clone(),
        (None, Some(path)) => path.display().to_string(),
        (None, None) => String::new(),
    }
}

impl ImageLocator for TemplateLocator {
    fn locate(&mut self, template: &TemplateRef, confidence: f32) -> Result<Option<Match>> {
        let alias = self.alias_for(template)?;

        match self.gui.find_stored_image_on_screen(confidence, &alias) {
            Ok(Some(matches)) => Ok(matches
                .iter()
                .max_by(|a, b| a.2.total_cmp(&b.2))
                .map(|(x, y, score)| Match {
                    x: *x as i32,
                    y: *y as i32,
                    confidence: *score as f32,
                })),
            Ok(None) => Ok(None),
            Err(e) => Err(MacroError::Actuation(format!(
                "template search for {} failed: {}",
                template.label(),
                e
            ))),
        }
    }
}
