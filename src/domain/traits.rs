// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Two places need "give me image number i, preprocessed":
//
//   - validation inference reads the paired dataset
//     (input + true mask + original)
//   - unlabeled inference reads a plain folder of images
//     (input + original, no mask)
//
// Both implement SampleSource so the inference runner and the
// training loop share one code path for loading and batching.
//
// Implementations:
//   - PairedDataset   → data/dataset.rs
//   - UnlabeledFolder → data/unlabeled.rs
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::sample::ImageSample;

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// An indexed collection of preprocessed images.
///
/// `load` re-reads the file every time (no caching), so it is
/// side-effect free and safe to call from several threads.
pub trait SampleSource {
    /// Number of images available
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode and preprocess image `index`.
    /// Decode failures are returned, never skipped.
    fn load(&self, index: usize) -> Result<ImageSample>;
}
