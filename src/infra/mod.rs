// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that do not belong to any one
// business layer:
//
//   checkpoint.rs — Saving and restoring the training state
//                   (parameters + absolute epoch count) as one
//                   atomically written file.
//
//   metrics.rs    — In-memory per-batch loss history and the
//                   per-epoch metrics CSV.
//
//   plot.rs       — Loss curves rendered to a PNG.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Checkpoint persistence and resume
pub mod checkpoint;

/// Loss history and metrics CSV logger
pub mod metrics;

/// Loss-curve image
pub mod plot;
