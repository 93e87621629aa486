// ============================================================
// Layer 3 — Pipeline Errors
// ============================================================
// Two kinds of failure end a run immediately:
//
//   Configuration — the data layout on disk is unusable
//                   (missing folders, mismatched file counts)
//   Decode        — an image file could not be read
//
// Both travel inside anyhow::Error; callers that need to tell
// them apart use `err.downcast_ref::<PipelineError>()`.
// Checkpoint problems are NOT here: they are recoverable and
// have their own type in infra::checkpoint.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cannot decode image '{}': {source}", path.display())]
    Decode {
        path:   PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl PipelineError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
