// ============================================================
// Layer 4 — Segmentation Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<ImageSample>
// into backend tensors.
//
// How batching works here:
//   Input:  N samples, each with a [3, H, W] input plane buffer
//           and (optionally) a [H, W] mask buffer
//   Output: images [N, 3, H, W] and masks [N, 1, H, W]
//
//   All buffers are already at the working resolution, so we
//   flatten them into one Vec and reshape — no padding needed.
//
// Loading is kept out of the batcher on purpose: `load_batch`
// decodes the files and returns a Result, so a bad image stops
// the run with an error instead of a panic inside batch().
//
// Reference: Burn Book §4 (Batcher)

use anyhow::Result;
use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::domain::{sample::ImageSample, traits::SampleSource};

// ─── SegBatch ─────────────────────────────────────────────────────────────────
/// A batch of images ready for the network forward pass.
#[derive(Debug, Clone)]
pub struct SegBatch<B: Backend> {
    /// Network input — shape: [batch_size, 3, H, W]
    pub images: Tensor<B, 4>,

    /// Ground truth masks — shape: [batch_size, 1, H, W].
    /// None when any sample in the batch is unlabeled.
    pub masks: Option<Tensor<B, 4>>,
}

// ─── SegBatcher ───────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct SegBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> SegBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Stack borrowed samples. `items` must be non-empty and share
    /// one working resolution.
    pub fn stack(&self, items: &[ImageSample]) -> SegBatch<B> {
        let batch_size = items.len();
        let res        = items[0].working;
        let (h, w)     = (res.height as usize, res.width as usize);

        let image_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.input.iter().copied())
            .collect();
        let images = Tensor::<B, 4>::from_data(
            TensorData::new(image_flat, [batch_size, 3, h, w]),
            &self.device,
        );

        let masks = if items.iter().all(ImageSample::is_labeled) {
            let mask_flat: Vec<f32> = items
                .iter()
                .flat_map(|s| s.target.iter().flatten().copied())
                .collect();
            Some(Tensor::<B, 4>::from_data(
                TensorData::new(mask_flat, [batch_size, 1, h, w]),
                &self.device,
            ))
        } else {
            None
        };

        SegBatch { images, masks }
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
impl<B: Backend> Batcher<ImageSample, SegBatch<B>> for SegBatcher<B> {
    fn batch(&self, items: Vec<ImageSample>) -> SegBatch<B> {
        self.stack(&items)
    }
}

/// Load the samples at `indices` from `source`, in order.
/// The first decode failure aborts the whole batch.
pub fn load_batch<S: SampleSource + ?Sized>(
    source:  &S,
    indices: &[usize],
) -> Result<Vec<ImageSample>> {
    indices.iter().map(|&i| source.load(i)).collect()
}
