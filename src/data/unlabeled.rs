// ============================================================
// Layer 4 — Unlabeled Image Folder
// ============================================================
// A flat folder of micrographs with no masks, used for
// free-run inference. Same preprocessing as the paired
// dataset, but samples carry no target.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::data::dataset::{file_stem, list_images};
use crate::data::preprocessor::ImagePreprocessor;
use crate::domain::{sample::ImageSample, traits::SampleSource};

pub struct UnlabeledFolder {
    images:       Vec<PathBuf>,
    preprocessor: ImagePreprocessor,
}

impl UnlabeledFolder {
    pub fn open(dir: impl AsRef<Path>, preprocessor: ImagePreprocessor) -> Result<Self> {
        let images = list_images(dir.as_ref())?;
        tracing::info!("Unlabeled folder '{}': {} images", dir.as_ref().display(), images.len());
        Ok(Self { images, preprocessor })
    }
}

impl SampleSource for UnlabeledFolder {
    fn len(&self) -> usize {
        self.images.len()
    }

    fn load(&self, index: usize) -> Result<ImageSample> {
        let path = self
            .images
            .get(index)
            .with_context(|| format!("image index {index} out of range ({})", self.len()))?;
        let image = self.preprocessor.preprocess_path(path)?;
        Ok(ImageSample {
            name:     file_stem(path),
            input:    image.input,
            target:   None,
            original: image.original,
            working:  self.preprocessor.working(),
        })
    }
}
