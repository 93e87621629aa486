// ============================================================
// Layer 5 — Inference Runner
// ============================================================
// Applies a trained network to images and writes the results
// through the PredictionPostprocessor. Two entry points share
// one prediction path (for_each_prediction):
//
//   run_validation_inference  validation split of the paired
//                             dataset, one image at a time,
//                             triples saved as 0, 1, 2, …
//
//   run_unlabeled_inference   every image of a plain folder,
//                             saved as {stem}.png + {stem}_mask.png
//
// The network is only ever called on a plain (non-autodiff)
// backend here, so no gradients are tracked.

use anyhow::{Context, Result};
use burn::prelude::*;
use std::path::Path;

use crate::data::batcher::SegBatcher;
use crate::domain::{sample::ImageSample, traits::SampleSource};
use crate::ml::model::SegmentationNetwork;
use crate::ml::postprocess::PredictionPostprocessor;

/// Predict a binary mask for every index in `indices`, batch size 1,
/// and hand (position, sample, mask) to `sink`.
pub fn for_each_prediction<B, M, S, F>(
    model:   &M,
    source:  &S,
    indices: &[usize],
    post:    &PredictionPostprocessor,
    device:  &B::Device,
    mut sink: F,
) -> Result<usize>
where
    B: Backend,
    M: SegmentationNetwork<B>,
    S: SampleSource + ?Sized,
    F: FnMut(usize, &ImageSample, &[f32]) -> Result<()>,
{
    let batcher = SegBatcher::<B>::new(device.clone());

    for (position, &index) in indices.iter().enumerate() {
        let sample = source.load(index)?;
        let batch  = batcher.stack(std::slice::from_ref(&sample));
        let output = model.segment(batch.images);
        let mask   = post
            .binarize(output.mask_logits)?
            .into_iter()
            .next()
            .context("network returned an empty batch")?;
        sink(position, &sample, &mask)?;
    }
    Ok(indices.len())
}

/// Predict the validation split and save pred / true / original triples.
/// Returns the number of samples written.
pub fn run_validation_inference<B, M, S>(
    model:      &M,
    source:     &S,
    validation: &[usize],
    post:       &PredictionPostprocessor,
    output_dir: &Path,
    device:     &B::Device,
) -> Result<usize>
where
    B: Backend,
    M: SegmentationNetwork<B>,
    S: SampleSource + ?Sized,
{
    let written = for_each_prediction(model, source, validation, post, device, |i, sample, mask| {
        let truth = sample
            .target
            .as_deref()
            .with_context(|| format!("validation sample '{}' has no ground-truth mask", sample.name))?;
        post.save_prediction(output_dir, i, mask, truth, &sample.original)
    })?;
    tracing::info!("Saved {} validation predictions to '{}'", written, output_dir.display());
    Ok(written)
}

/// Predict every image of `source` and save original copy + mask by name.
pub fn run_unlabeled_inference<B, M, S>(
    model:      &M,
    source:     &S,
    post:       &PredictionPostprocessor,
    output_dir: &Path,
    device:     &B::Device,
) -> Result<usize>
where
    B: Backend,
    M: SegmentationNetwork<B>,
    S: SampleSource + ?Sized,
{
    let indices: Vec<usize> = (0..source.len()).collect();
    let written = for_each_prediction(model, source, &indices, post, device, |_, sample, mask| {
        post.save_unlabeled(output_dir, &sample.name, mask, &sample.original)
    })?;
    tracing::info!("Labeled {} unlabeled images into '{}'", written, output_dir.display());
    Ok(written)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        dataset::{tests::write_pairs, DatasetLayout, PairedDataset},
        preprocessor::ImagePreprocessor,
        unlabeled::UnlabeledFolder,
    };
    use crate::domain::sample::Resolution;
    use crate::ml::model::{SegmentationOutput, NUM_CLASSES};
    use burn::backend::NdArray;
    use image::{GrayImage, Luma};

    type TestBackend = NdArray;

    /// Stand-in network that predicts the same logit for every pixel
    struct ConstantLogits(f32);

    impl<B: Backend> SegmentationNetwork<B> for ConstantLogits {
        fn segment(&self, images: Tensor<B, 4>) -> SegmentationOutput<B> {
            let [batch, _, h, w] = images.dims();
            let device = images.device();
            SegmentationOutput {
                mask_logits:  Tensor::full([batch, 1, h, w], self.0, &device),
                class_logits: Tensor::zeros([batch, NUM_CLASSES], &device),
            }
        }
    }

    #[test]
    fn test_positive_logits_give_uniform_255_mask() {
        let input_dir  = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        GrayImage::from_fn(512, 512, |x, y| Luma([((x ^ y) % 256) as u8]))
            .save(input_dir.path().join("cells.png"))
            .unwrap();

        let folder = UnlabeledFolder::open(input_dir.path(), ImagePreprocessor::default()).unwrap();
        let post   = PredictionPostprocessor::default();
        let n = run_unlabeled_inference::<TestBackend, _, _>(
            &ConstantLogits(3.0), &folder, &post, output_dir.path(), &Default::default(),
        )
        .unwrap();
        assert_eq!(n, 1);

        let mask = image::open(output_dir.path().join("cells_mask.png")).unwrap().to_luma8();
        assert_eq!(mask.dimensions(), (512, 512));
        assert!(mask.pixels().all(|p| p[0] == 255));
        assert!(output_dir.path().join("cells.png").exists());
    }

    #[test]
    fn test_negative_logits_give_empty_mask() {
        let input_dir  = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        GrayImage::from_pixel(32, 32, Luma([128]))
            .save(input_dir.path().join("blank.png"))
            .unwrap();

        let pre    = ImagePreprocessor::new(Resolution::square(16));
        let folder = UnlabeledFolder::open(input_dir.path(), pre).unwrap();
        let post   = PredictionPostprocessor::new(Resolution::square(16), Resolution::square(32));
        run_unlabeled_inference::<TestBackend, _, _>(
            &ConstantLogits(-3.0), &folder, &post, output_dir.path(), &Default::default(),
        )
        .unwrap();

        let mask = image::open(output_dir.path().join("blank_mask.png")).unwrap().to_luma8();
        assert!(mask.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_validation_triples_are_numbered_sequentially() {
        let data_dir   = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        write_pairs(data_dir.path(), 4, 16);

        let pre  = ImagePreprocessor::new(Resolution::square(8));
        let ds   = PairedDataset::open(data_dir.path(), &DatasetLayout::default(), pre).unwrap();
        let post = PredictionPostprocessor::new(Resolution::square(8), Resolution::square(16));

        let n = run_validation_inference::<TestBackend, _, _>(
            &ConstantLogits(1.0), &ds, &[3, 1], &post, output_dir.path(), &Default::default(),
        )
        .unwrap();
        assert_eq!(n, 2);

        for i in 0..2 {
            for role in ["pred_mask", "true_mask", "org_img"] {
                let path = output_dir.path().join(format!("{i}_{role}.png"));
                assert!(path.exists(), "{} missing", path.display());
            }
        }
        assert!(!output_dir.path().join("2_pred_mask.png").exists());
    }
}
