// ============================================================
// Layer 6 — Checkpoint Store
// ============================================================
// Persists the network parameters together with the number of
// epochs they have been trained for, so an interrupted run can
// pick up exactly where it stopped.
//
// What a checkpoint holds:
//   - parameters        model record captured by Burn's
//                       BinBytesRecorder (full precision)
//   - epochs_completed  ABSOLUTE epoch count, not per-run
//   - is_final          false for cadence saves, true for the
//                       save at the end of the epoch budget
//
// On-disk format (single file):
//   b"CSEGCKPT" magic, then a bincode envelope carrying a format
//   version, the fields above, and the parameter count (used to
//   reject a checkpoint written for a different architecture).
//
// Only the latest state survives: each save overwrites the one
// file. Writes go to "<path>.tmp" first and are renamed into
// place, so a crash mid-write leaves the previous checkpoint
// intact.
//
// Precondition: one writer per checkpoint path. Two runs saving
// to the same path at the same time is not supported.
//
// Loading never fails hard. A missing or unreadable file comes
// back as CheckpointLoad::NotFound and the caller starts from
// epoch 0.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

const MAGIC: &[u8; 8] = b"CSEGCKPT";

/// Bumped whenever the envelope layout changes
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope {
    format_version:   u32,
    epochs_completed: u64,
    is_final:         bool,
    num_params:       u64,
    parameters:       Vec<u8>,
}

// ─── Checkpoint ───────────────────────────────────────────────────────────────
/// One saved training state. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Opaque parameter blob
    pub parameters:       Vec<u8>,
    pub epochs_completed: usize,
    pub is_final:         bool,
    /// Scalar parameter count of the model that produced `parameters`
    pub num_params:       usize,
}

impl Checkpoint {
    /// Snapshot the parameters of `model`.
    pub fn capture<B: Backend, M: Module<B>>(
        model:            &M,
        epochs_completed: usize,
        is_final:         bool,
    ) -> Result<Self> {
        let recorder   = BinBytesRecorder::<FullPrecisionSettings>::default();
        let parameters = Recorder::<B>::record(&recorder, model.clone().into_record(), ())
            .map_err(|e| anyhow::anyhow!("Cannot serialise model parameters: {e:?}"))?;
        Ok(Self {
            parameters,
            epochs_completed,
            is_final,
            num_params: model.num_params(),
        })
    }

    /// Load the stored parameters into `model`.
    /// Fails if the checkpoint was written for a different architecture.
    pub fn restore<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let expected = model.num_params();
        if expected != self.num_params {
            anyhow::bail!(
                "checkpoint holds {} parameters but the model has {}",
                self.num_params,
                expected
            );
        }

        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let record: M::Record = Recorder::<B>::load(&recorder, self.parameters.clone(), device)
            .map_err(|e| anyhow::anyhow!("Cannot deserialise model parameters: {e:?}"))?;
        Ok(model.load_record(record))
    }
}

// ─── Load Result ──────────────────────────────────────────────────────────────
/// Why no usable checkpoint was found
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("no checkpoint at '{}'", .0.display())]
    Missing(PathBuf),

    #[error("checkpoint '{}' is malformed: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("checkpoint format version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("cannot read checkpoint: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of reading the checkpoint file.
/// Callers branch on this to choose resume vs. fresh start.
#[derive(Debug)]
pub enum CheckpointLoad {
    Found(Checkpoint),
    NotFound(CheckpointError),
}

impl CheckpointLoad {
    pub fn found(self) -> Option<Checkpoint> {
        match self {
            Self::Found(c)    => Some(c),
            Self::NotFound(_) => None,
        }
    }
}

// ─── CheckpointStore ──────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Capture `model` and write it as the current checkpoint.
    pub fn save<B: Backend, M: Module<B>>(
        &self,
        model:            &M,
        epochs_completed: usize,
        is_final:         bool,
    ) -> Result<()> {
        let checkpoint = Checkpoint::capture::<B, M>(model, epochs_completed, is_final)?;
        self.write(&checkpoint)
    }

    /// Atomically replace the checkpoint file with `checkpoint`.
    pub fn write(&self, checkpoint: &Checkpoint) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }

        let envelope = Envelope {
            format_version:   CHECKPOINT_FORMAT_VERSION,
            epochs_completed: checkpoint.epochs_completed as u64,
            is_final:         checkpoint.is_final,
            num_params:       checkpoint.num_params as u64,
            parameters:       checkpoint.parameters.clone(),
        };
        let mut bytes = MAGIC.to_vec();
        bytes.extend(bincode::serialize(&envelope)?);

        let tmp = self.temp_path();
        fs::write(&tmp, &bytes)
            .with_context(|| format!("Failed to write checkpoint to '{}'", tmp.display()))?;
        fs::rename(&tmp, &self.path).with_context(|| {
            format!("Failed to move checkpoint into '{}'", self.path.display())
        })?;

        tracing::info!(
            "Saved checkpoint '{}' (epochs_completed={}, final={})",
            self.path.display(),
            checkpoint.epochs_completed,
            checkpoint.is_final
        );
        Ok(())
    }

    /// Read the checkpoint file, if there is a valid one.
    pub fn load(&self) -> CheckpointLoad {
        match self.read() {
            Ok(c)  => CheckpointLoad::Found(c),
            Err(e) => CheckpointLoad::NotFound(e),
        }
    }

    /// Restore `model` from the checkpoint and report how many epochs
    /// it already has. Any problem is logged and treated as a fresh
    /// start: the untouched model and 0 are returned.
    pub fn resume<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> (M, usize) {
        let checkpoint = match self.load() {
            CheckpointLoad::Found(c) => c,
            CheckpointLoad::NotFound(reason) => {
                tracing::warn!("No valid checkpoint has been found: {reason}");
                return (model, 0);
            }
        };

        match checkpoint.restore(model.clone(), device) {
            Ok(restored) => {
                tracing::info!(
                    "Resumed from '{}' after {} epochs",
                    self.path.display(),
                    checkpoint.epochs_completed
                );
                (restored, checkpoint.epochs_completed)
            }
            Err(e) => {
                tracing::warn!("Ignoring checkpoint '{}': {e:#}", self.path.display());
                (model, 0)
            }
        }
    }

    fn read(&self) -> std::result::Result<Checkpoint, CheckpointError> {
        if !self.path.is_file() {
            return Err(CheckpointError::Missing(self.path.clone()));
        }
        let bytes = fs::read(&self.path)?;

        let malformed = |reason: String| CheckpointError::Malformed {
            path: self.path.clone(),
            reason,
        };

        let payload = bytes
            .strip_prefix(MAGIC.as_slice())
            .ok_or_else(|| malformed("missing checkpoint header".to_string()))?;
        let envelope: Envelope = bincode::deserialize(payload)
            .map_err(|e| malformed(e.to_string()))?;

        if envelope.format_version != CHECKPOINT_FORMAT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found:    envelope.format_version,
                expected: CHECKPOINT_FORMAT_VERSION,
            });
        }

        Ok(Checkpoint {
            parameters:       envelope.parameters,
            epochs_completed: envelope.epochs_completed as usize,
            is_final:         envelope.is_final,
            num_params:       envelope.num_params as usize,
        })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name: OsString = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}
