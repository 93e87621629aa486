// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All code that runs the segmentation network lives here.
//
//   model.rs        — U-Net with an auxiliary classification
//                     head, the SegmentationNetwork trait, and
//                     the BCE-with-logits loss
//
//   trainer.rs      — The resumable epoch loop: train pass,
//                     eval pass, cadence + final checkpoints
//
//   postprocess.rs  — Logits → binary mask → 0..255 images at
//                     native resolution on disk
//
//   inferencer.rs   — Validation-split and unlabeled-folder
//                     inference built on the post-processor
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Ronneberger et al. (2015) U-Net

use burn::backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu};

/// Segmentation network architecture
pub mod model;

/// Resumable training loop with checkpointing
pub mod trainer;

/// Prediction → image reconstruction
pub mod postprocess;

/// Inference over the validation split or an unlabeled folder
pub mod inferencer;

/// GPU backend (any wgpu adapter) used for inference
pub type GpuBackend = Wgpu;
/// GPU backend with gradient tracking, used for training
pub type GpuTrainBackend = Autodiff<Wgpu>;
/// CPU backend used for inference
pub type CpuBackend = NdArray;
/// CPU backend with gradient tracking, used for training
pub type CpuTrainBackend = Autodiff<NdArray>;

pub fn gpu_device() -> WgpuDevice {
    WgpuDevice::default()
}

pub fn cpu_device() -> NdArrayDevice {
    NdArrayDevice::default()
}
