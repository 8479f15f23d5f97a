use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{MacroError, Result};
use crate::steps::TemplateRef;

/// SHA-256 hex digest of raw image bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn hash_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| MacroError::io(path, e))?;
    Ok(content_hash(&bytes))
}

/// How a template reference was reconciled against disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Cached path still holds the hashed content.
    Cached(PathBuf),
    /// Content found elsewhere; the cached path was updated.
    Relocated(PathBuf),
    /// Reference had only a path; its hash was filled in.
    Hashed(PathBuf),
    Missing,
}

/// Finds template images by content hash under the images folder.
#[derive(Debug, Clone)]
pub struct ImageIndex {
    root: PathBuf,
}

impl ImageIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Search the images folder recursively for a file with this hash.
    pub fn find_by_hash(&self, hash: &str) -> Option<PathBuf> {
        if !self.root.exists() {
            return None;
        }
        WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .find(|entry| {
                hash_file(entry.path())
                    .map(|h| h.eq_ignore_ascii_case(hash))
                    .unwrap_or(false)
            })
            .map(|entry| entry.into_path())
    }

    /// Reconcile a reference: the hash wins over the cached path.
    pub fn resolve(&self, template: &mut TemplateRef) -> Resolution {
        let cached = template.path.clone().filter(|p| p.is_file());

        let Some(hash) = template.hash.clone() else {
            // Legacy reference: adopt the content currently at the path
            return match cached {
                Some(path) => match hash_file(&path) {
                    Ok(hash) => {
                        template.hash = Some(hash);
                        Resolution::Hashed(path)
                    }
                    Err(e) => {
                        warn!("Could not hash template {}: {}", path.display(), e);
                        Resolution::Missing
                    }
                },
                None => Resolution::Missing,
            };
        };

        if let Some(path) = cached {
            if hash_file(&path).map(|h| h.eq_ignore_ascii_case(&hash)).unwrap_or(false) {
                return Resolution::Cached(path);
            }
            debug!("Template at {} no longer matches its hash", path.display());
        }

        match self.find_by_hash(&hash) {
            Some(found) => {
                debug!("Template {} relocated to {}", template.label(), found.display());
                template.path = Some(found.clone());
                Resolution::Relocated(found)
            }
            None => {
                template.path = None;
                Resolution::Missing
            }
        }
    }

    /// Path of a template whose content still matches, for loading.
    pub fn locate_file(&self, template: &TemplateRef) -> Result<PathBuf> {
        let mut probe = template.clone();
        match self.resolve(&mut probe) {
            Resolution::Cached(p) | Resolution::Relocated(p) | Resolution::Hashed(p) => Ok(p),
            Resolution::Missing => Err(MacroError::unavailable(
                format!("template {}", template.label()),
                format!("no file with matching content under {}", self.root.display()),
            )),
        }
    }

    /// Decode a template image, surfacing missing/corrupt files as unavailable.
    pub fn load_template(&self, template: &TemplateRef) -> Result<image::RgbImage> {
        let path = self.locate_file(template)?;
        image::open(&path)
            .map(|img| img.to_rgb8())
            .map_err(|e| MacroError::unavailable(format!("template {}", path.display()), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_hex_sha256() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn resolve_keeps_matching_cached_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("button.png");
        fs::write(&path, b"button-bytes").unwrap();

        let index = ImageIndex::new(dir.path());
        let mut template = TemplateRef::new(content_hash(b"button-bytes"), Some(path.clone()));
        assert_eq!(index.resolve(&mut template), Resolution::Cached(path));
    }

    #[test]
    fn resolve_relocates_moved_content() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("items").join("rare");
        fs::create_dir_all(&nested).unwrap();
        let moved = nested.join("renamed.png");
        fs::write(&moved, b"gem").unwrap();
        fs::write(dir.path().join("other.png"), b"not the gem").unwrap();

        let index = ImageIndex::new(dir.path());
        let mut template = TemplateRef::new(content_hash(b"gem"), Some(dir.path().join("gem.png")));
        assert_eq!(index.resolve(&mut template), Resolution::Relocated(moved.clone()));
        assert_eq!(template.path, Some(moved));
    }

    #[test]
    fn resolve_ignores_replaced_content_at_cached_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gem.png");
        fs::write(&path, b"different content").unwrap();

        let index = ImageIndex::new(dir.path());
        let mut template = TemplateRef::new(content_hash(b"gem"), Some(path));
        assert_eq!(index.resolve(&mut template), Resolution::Missing);
        assert_eq!(template.path, None);
        assert!(template.hash.is_some());
    }

    #[test]
    fn resolve_fills_in_missing_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.png");
        fs::write(&path, b"legacy").unwrap();

        let index = ImageIndex::new(dir.path());
        let mut template = TemplateRef {
            hash: None,
            path: Some(path.clone()),
        };
        assert_eq!(index.resolve(&mut template), Resolution::Hashed(path));
        assert_eq!(template.hash, Some(content_hash(b"legacy")));
    }

    #[test]
    fn corrupt_template_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        fs::write(&path, b"not a png").unwrap();

        let index = ImageIndex::new(dir.path());
        let template = TemplateRef::new(content_hash(b"not a png"), Some(path));
        let err = index.load_template(&template).unwrap_err();
        assert!(matches!(err, MacroError::ResourceUnavailable { .. }));
    }
}
