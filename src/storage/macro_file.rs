use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use super::image_index::{hash_file, ImageIndex, Resolution};
use crate::error::{MacroError, Result};
use crate::steps::{Step, StepKind};

/// A saved macro: a name plus its ordered steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroFile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Per-template outcome of reconciling a loaded macro.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub relocated: Vec<usize>,
    pub missing: Vec<usize>,
}

impl MacroFile {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Write the macro as pretty JSON. Image-search steps get their content
    /// hash filled in from the cached path when it is missing.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if self.steps.is_empty() {
            return Err(MacroError::config("steps", "no steps to save"));
        }
        if self.name.is_empty() {
            self.name = file_stem(path);
        }

        for step in self.steps.iter_mut() {
            if let StepKind::ImageSearch(search) = &mut step.kind {
                if search.template.hash.is_none() {
                    if let Some(cached) = &search.template.path {
                        search.template.hash = Some(hash_file(cached)?);
                    }
                }
            }
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| MacroError::io(path, e))?;
        info!("Saved macro '{}' ({} steps) to {}", self.name, self.steps.len(), path.display());
        Ok(())
    }

    /// Read a macro and reconcile every image-search template by hash.
    /// Steps that fail validation are rejected here, not at playback.
    pub fn load(path: &Path, images: &ImageIndex) -> Result<(Self, LoadReport)> {
        let contents = fs::read_to_string(path).map_err(|e| MacroError::io(path, e))?;
        let mut file: MacroFile = serde_json::from_str(&contents)?;
        if file.name.is_empty() {
            file.name = file_stem(path);
        }

        let mut report = LoadReport::default();
        for (idx, step) in file.steps.iter_mut().enumerate() {
            step.validate().map_err(|e| match e {
                MacroError::Configuration { field, reason } => MacroError::Configuration {
                    field: format!("step {} {}", idx + 1, field),
                    reason,
                },
                other => other,
            })?;

            if let StepKind::ImageSearch(search) = &mut step.kind {
                match images.resolve(&mut search.template) {
                    Resolution::Relocated(_) => report.relocated.push(idx),
                    Resolution::Missing => {
                        warn!(
                            "Step {}: template {} not found under {}",
                            idx + 1,
                            search.template.label(),
                            images.root().display()
                        );
                        report.missing.push(idx);
                    }
                    Resolution::Cached(_) | Resolution::Hashed(_) => {}
                }
            }
        }

        info!("Loaded macro '{}' ({} steps)", file.name, file.steps.len());
        Ok((file, report))
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "macro".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{ImageSearch, MouseButton, TemplateRef, Trigger};

    #[test]
    fn refuses_to_save_empty_macro() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = MacroFile::new("empty", Vec::new());
        assert!(file.save(&dir.path().join("empty.json")).is_err());
    }

    #[test]
    fn save_fills_missing_hash_and_names_from_stem() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("ok.png");
        fs::write(&image, b"ok-button").unwrap();

        let template = TemplateRef {
            hash: None,
            path: Some(image),
        };
        let mut file = MacroFile::new("", vec![Step::image_search(ImageSearch::new(template))]);
        let target = dir.path().join("farm_route.json");
        file.save(&target).unwrap();

        assert_eq!(file.name, "farm_route");
        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&target).unwrap()).unwrap();
        assert_eq!(raw["name"], "farm_route");
        assert_eq!(raw["steps"][0]["action"], "image_search");
        assert_eq!(raw["steps"][0]["template"]["hash"].as_str().map(str::len), Some(64));
    }

    #[test]
    fn load_rejects_invalid_steps() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("bad.json");
        fs::write(
            &target,
            r#"{"name":"bad","steps":[{"action":"click","key":"a","count":0}]}"#,
        )
        .unwrap();

        let err = MacroFile::load(&target, &ImageIndex::new(dir.path())).unwrap_err();
        assert!(matches!(err, MacroError::Configuration { ref field, .. } if field.starts_with("step 1")));
    }

    #[test]
    fn load_reports_missing_templates() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("m.json");
        let mut file = MacroFile::new(
            "m",
            vec![
                Step::click(Trigger::Mouse(MouseButton::Left), Some((1, 1)), 1),
                Step::image_search(ImageSearch::new(TemplateRef::new("00ff".repeat(16), None))),
            ],
        );
        file.save(&target).unwrap();

        let (loaded, report) = MacroFile::load(&target, &ImageIndex::new(dir.path())).unwrap();
        assert_eq!(loaded.steps.len(), 2);
        assert_eq!(report.missing, vec![1]);
        assert!(report.relocated.is_empty());
    }
}
