// ============================================================
// Layer 5 — Prediction Post-processor
// ============================================================
// Turns raw mask logits into images on disk.
//
//   1. binarize     sigmoid, then threshold at 0.5 → {0, 1}
//   2. normalize    scale each mask by ITS OWN maximum to 0..255
//                   (an all-zero mask stays all-zero)
//   3. resize       back to the native resolution (512×512)
//   4. save         {i}_pred_mask.png, {i}_true_mask.png,
//                   {i}_org_img.png
//
// normalize_to_u8 is a free function so it can be tested
// without a backend. Masks are resized with nearest-neighbour
// so a binary mask stays binary at native size.

use anyhow::{Context, Result};
use burn::{prelude::*, tensor::activation::sigmoid};
use image::{imageops::FilterType, DynamicImage, GrayImage};
use std::{fs, path::Path};

use crate::domain::sample::Resolution;

/// Probability at or above which a pixel counts as foreground
pub const THRESHOLD: f64 = 0.5;

/// Scale `values` so the largest becomes 255.
/// Values are truncated, not rounded. If the maximum is not positive
/// (all-zero mask) the output is all zeros.
pub fn normalize_to_u8(values: &[f32]) -> Vec<u8> {
    let max = values.iter().copied().fold(0.0f32, f32::max);
    if max <= 0.0 || !max.is_finite() {
        return vec![0; values.len()];
    }
    values
        .iter()
        .map(|&v| (v.max(0.0) * 255.0 / max) as u8)
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct PredictionPostprocessor {
    working: Resolution,
    native:  Resolution,
}

impl PredictionPostprocessor {
    pub fn new(working: Resolution, native: Resolution) -> Self {
        Self { working, native }
    }

    pub fn native(&self) -> Resolution {
        self.native
    }

    /// sigmoid + threshold. Returns one {0,1} buffer of H*W per batch item.
    pub fn binarize<B: Backend>(&self, mask_logits: Tensor<B, 4>) -> Result<Vec<Vec<f32>>> {
        let [batch, _, h, w] = mask_logits.dims();
        let binary = sigmoid(mask_logits)
            .greater_equal_elem(THRESHOLD)
            .float();
        let flat: Vec<f32> = binary
            .into_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| anyhow::anyhow!("Cannot read prediction tensor: {e:?}"))?;
        Ok(flat.chunks(h * w).take(batch).map(<[f32]>::to_vec).collect())
    }

    /// Normalize a working-resolution mask and upscale it to native size.
    pub fn mask_image(&self, mask: &[f32]) -> Result<GrayImage> {
        let Resolution { width, height } = self.working;
        let small = GrayImage::from_raw(width, height, normalize_to_u8(mask))
            .with_context(|| {
                format!("mask has {} values, expected {}x{}", mask.len(), width, height)
            })?;
        Ok(image::imageops::resize(
            &small,
            self.native.width,
            self.native.height,
            FilterType::Nearest,
        ))
    }

    /// Original image at native size, keeping it grayscale if it was.
    pub fn original_image(&self, original: &DynamicImage) -> DynamicImage {
        let resized = original.resize_exact(self.native.width, self.native.height, FilterType::Triangle);
        if original.color().has_color() {
            DynamicImage::ImageRgb8(resized.to_rgb8())
        } else {
            DynamicImage::ImageLuma8(resized.to_luma8())
        }
    }

    /// Write the predicted / true / original triple for sample `index`.
    pub fn save_prediction(
        &self,
        output_dir: &Path,
        index:      usize,
        predicted:  &[f32],
        truth:      &[f32],
        original:   &DynamicImage,
    ) -> Result<()> {
        ensure_dir(output_dir)?;
        save(self.mask_image(predicted)?, &output_dir.join(format!("{index}_pred_mask.png")))?;
        save(self.mask_image(truth)?,     &output_dir.join(format!("{index}_true_mask.png")))?;
        save(self.original_image(original), &output_dir.join(format!("{index}_org_img.png")))?;
        tracing::debug!("Saved prediction triple {index} to '{}'", output_dir.display());
        Ok(())
    }

    /// Write `{stem}.png` (copy of the original) and `{stem}_mask.png`.
    pub fn save_unlabeled(
        &self,
        output_dir: &Path,
        stem:       &str,
        predicted:  &[f32],
        original:   &DynamicImage,
    ) -> Result<()> {
        ensure_dir(output_dir)?;
        let copy = if original.color().has_color() {
            DynamicImage::ImageRgb8(original.to_rgb8())
        } else {
            DynamicImage::ImageLuma8(original.to_luma8())
        };
        save(copy, &output_dir.join(format!("{stem}.png")))?;
        save(self.mask_image(predicted)?, &output_dir.join(format!("{stem}_mask.png")))?;
        Ok(())
    }
}

impl Default for PredictionPostprocessor {
    fn default() -> Self {
        Self::new(Resolution::WORKING, Resolution::NATIVE)
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Cannot create output directory '{}'", dir.display()))
}

fn save(img: impl Into<DynamicImage>, path: &Path) -> Result<()> {
    img.into()
        .save(path)
        .with_context(|| format!("Cannot write '{}'", path.display()))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use image::Luma;

    type TestBackend = NdArray;

    #[test]
    fn test_all_zero_mask_stays_zero() {
        assert_eq!(normalize_to_u8(&[0.0; 5]), vec![0; 5]);
    }

    #[test]
    fn test_binary_mask_scales_to_255() {
        assert_eq!(normalize_to_u8(&[0.0, 1.0, 1.0]), vec![0, 255, 255]);
    }

    #[test]
    fn test_normalization_uses_own_maximum() {
        // max = 0.5 → 0.25 maps to half range, truncated
        assert_eq!(normalize_to_u8(&[0.25, 0.5]), vec![127, 255]);
    }

    #[test]
    fn test_binarize_thresholds_at_half() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 1>::from_floats([-3.0, -0.01, 0.0, 2.0], &device)
            .reshape([1, 1, 2, 2]);
        let post = PredictionPostprocessor::new(Resolution::square(2), Resolution::square(4));
        let masks = post.binarize(logits).unwrap();
        assert_eq!(masks, vec![vec![0.0, 0.0, 1.0, 1.0]]);
    }

    #[test]
    fn test_mask_image_is_upscaled_to_native() {
        let post = PredictionPostprocessor::new(Resolution::square(2), Resolution::square(8));
        let img  = post.mask_image(&[1.0, 0.0, 0.0, 1.0]).unwrap();
        assert_eq!(img.dimensions(), (8, 8));
        assert_eq!(img.get_pixel(0, 0), &Luma([255]));
        assert_eq!(img.get_pixel(7, 0), &Luma([0]));
    }

    #[test]
    fn test_save_prediction_writes_three_files() {
        let dir  = tempfile::tempdir().unwrap();
        let post = PredictionPostprocessor::new(Resolution::square(2), Resolution::square(4));
        let org  = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([7])));

        post.save_prediction(dir.path(), 3, &[0.0; 4], &[1.0; 4], &org).unwrap();

        for name in ["3_pred_mask.png", "3_true_mask.png", "3_org_img.png"] {
            assert!(dir.path().join(name).exists(), "{name} missing");
        }
        let pred = image::open(dir.path().join("3_pred_mask.png")).unwrap().to_luma8();
        assert!(pred.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_wrong_mask_length_is_an_error() {
        let post = PredictionPostprocessor::new(Resolution::square(2), Resolution::square(4));
        assert!(post.mask_image(&[1.0; 3]).is_err());
    }
}
