// ============================================================
// Layer 4 — Paired Dataset
// ============================================================
// The data root holds two sibling folders:
//
//   <root>/realoriginals/   micrographs
//   <root>/realmask/        binary masks
//
// Pairing is by position after sorting each folder by file
// name independently: original #i goes with mask #i. File
// names are NOT compared for equality, so the only hard check
// is that both folders hold the same number of images. Stem
// mismatches are reported as a warning.
//
// Nothing is cached: every load() decodes the files again.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::preprocessor::ImagePreprocessor;
use crate::domain::{error::PipelineError, sample::ImageSample, traits::SampleSource};

/// File extensions treated as images when listing a folder
pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

/// Names of the two sub-folders under the data root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetLayout {
    pub originals_dir: String,
    pub masks_dir:     String,
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self {
            originals_dir: "realoriginals".to_string(),
            masks_dir:     "realmask".to_string(),
        }
    }
}

pub struct PairedDataset {
    originals:    Vec<PathBuf>,
    masks:        Vec<PathBuf>,
    preprocessor: ImagePreprocessor,
}

impl PairedDataset {
    /// Enumerate both folders and validate that they pair up.
    pub fn open(
        root:         impl AsRef<Path>,
        layout:       &DatasetLayout,
        preprocessor: ImagePreprocessor,
    ) -> Result<Self> {
        let root      = root.as_ref();
        let originals = list_images(&root.join(&layout.originals_dir))?;
        let masks     = list_images(&root.join(&layout.masks_dir))?;

        if originals.len() != masks.len() {
            return Err(PipelineError::configuration(format!(
                "'{}' holds {} images but '{}' holds {}",
                layout.originals_dir,
                originals.len(),
                layout.masks_dir,
                masks.len(),
            ))
            .into());
        }

        let mismatched = originals
            .iter()
            .zip(&masks)
            .filter(|(o, m)| o.file_stem() != m.file_stem())
            .count();
        if mismatched > 0 {
            tracing::warn!(
                "{} of {} image/mask pairs have different file stems; pairing by sort order",
                mismatched,
                originals.len()
            );
        }

        tracing::info!(
            "Paired dataset at '{}': {} image/mask pairs",
            root.display(),
            originals.len()
        );
        Ok(Self { originals, masks, preprocessor })
    }

    pub fn preprocessor(&self) -> &ImagePreprocessor {
        &self.preprocessor
    }

    /// Paths of pair `index` as (original, mask)
    pub fn paths(&self, index: usize) -> Option<(&Path, &Path)> {
        Some((self.originals.get(index)?.as_path(), self.masks.get(index)?.as_path()))
    }
}

impl SampleSource for PairedDataset {
    fn len(&self) -> usize {
        self.originals.len()
    }

    fn load(&self, index: usize) -> Result<ImageSample> {
        let (org_path, mask_path) = self
            .paths(index)
            .with_context(|| format!("sample index {index} out of range ({})", self.len()))?;

        let image  = self.preprocessor.preprocess_path(org_path)?;
        let mask   = ImagePreprocessor::decode(mask_path)?;
        let target = self.preprocessor.preprocess_mask(&mask);

        Ok(ImageSample {
            name:     file_stem(org_path),
            input:    image.input,
            target:   Some(target),
            original: image.original,
            working:  self.preprocessor.working(),
        })
    }
}

/// List the image files of `dir`, sorted lexicographically by name.
/// A missing directory is a configuration error.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PipelineError::configuration(format!(
            "directory '{}' does not exist",
            dir.display()
        ))
        .into());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
    {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && is_image {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    tracing::debug!("Found {} images in '{}'", files.len(), dir.display());
    Ok(files)
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}
