// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Turns a raw micrograph into the input tensor layout the
// network expects.
//
// Steps (applied in order):
//   1. Decode the file with the `image` crate
//   2. Broadcast grayscale to 3 identical RGB channels
//   3. Resize to the fixed working resolution (256×256 by
//      default), ignoring aspect ratio
//   4. Scale u8 intensities to [0,1]
//   5. Lay the pixels out channel-first: [R plane, G plane, B plane]
//
// Masks go through the same resize but stay single-channel.
//
// The decoded image is returned alongside the tensor data so
// callers can keep the native-resolution original around.
//
// Reference: image crate documentation (imageops::FilterType)

use anyhow::Result;
use image::{imageops::FilterType, DynamicImage};
use std::path::Path;

use crate::domain::{error::PipelineError, sample::Resolution};

/// Output of preprocessing one file
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    /// [3, H, W] channel-first, values in [0,1]
    pub input: Vec<f32>,
    /// The decoded file, untouched
    pub original: DynamicImage,
}

#[derive(Debug, Clone, Copy)]
pub struct ImagePreprocessor {
    working: Resolution,
    filter:  FilterType,
}

impl ImagePreprocessor {
    pub fn new(working: Resolution) -> Self {
        Self { working, filter: FilterType::Triangle }
    }

    pub fn working(&self) -> Resolution {
        self.working
    }

    /// Decode an image file. Any failure becomes PipelineError::Decode
    /// so the run stops with the offending path in the message.
    pub fn decode(path: &Path) -> Result<DynamicImage> {
        let img = image::open(path).map_err(|source| PipelineError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(img)
    }

    /// Decode `path` and convert it to network input.
    pub fn preprocess_path(&self, path: &Path) -> Result<PreprocessedImage> {
        let original = Self::decode(path)?;
        let input    = self.preprocess(&original);
        Ok(PreprocessedImage { input, original })
    }

    /// Convert an already decoded image to a [3, H, W] buffer in [0,1].
    pub fn preprocess(&self, img: &DynamicImage) -> Vec<f32> {
        let Resolution { width, height } = self.working;

        // to_rgb8 copies the luma value into all three channels for
        // grayscale inputs, which is exactly the broadcast we want
        let rgb = img
            .resize_exact(width, height, self.filter)
            .to_rgb8();

        let plane = self.working.pixels();
        let mut data = vec![0.0f32; 3 * plane];
        for (i, pixel) in rgb.pixels().enumerate() {
            for c in 0..3 {
                data[c * plane + i] = pixel[c] as f32 / 255.0;
            }
        }
        data
    }

    /// Convert a mask image to a single [H, W] plane in [0,1].
    /// Nearest keeps the resized mask binary.
    pub fn preprocess_mask(&self, mask: &DynamicImage) -> Vec<f32> {
        let Resolution { width, height } = self.working;
        mask.resize_exact(width, height, FilterType::Nearest)
            .to_luma8()
            .pixels()
            .map(|p| p[0] as f32 / 255.0)
            .collect()
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(Resolution::WORKING)
    }
}
