// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from image files on disk to
// backend-ready tensor batches.
//
// The pipeline flows in this order:
//
//   realoriginals/ + realmask/        unlabeled_test/
//       │                                  │
//       ▼                                  ▼
//   PairedDataset                     UnlabeledFolder
//       │   (both use ImagePreprocessor, both are SampleSources)
//       ▼
//   DatasetPartitioner  → seeded train / validation indices
//       │
//       ▼
//   load_batch          → decodes one mini-batch of samples
//       │
//       ▼
//   SegBatcher          → stacks samples into tensors
//
// Each module is responsible for exactly one step.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Decodes images and converts them to network input layout
pub mod preprocessor;

/// Matched (original, mask) pairs from the data root
pub mod dataset;

/// Plain image folder for inference without ground truth
pub mod unlabeled;

/// Seeded train/validation split
pub mod splitter;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
