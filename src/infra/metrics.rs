// ============================================================
// Layer 6 — Loss Bookkeeping
// ============================================================
// Two records of how training went:
//
//   LossHistory    every mini-batch loss of the current run, in
//                  order, for train and validation passes. This
//                  is what the loss-curve plot is drawn from.
//                  It lives in memory only: a resumed run starts
//                  with an empty history.
//
//   MetricsLogger  one CSV row per epoch (mean losses), appended
//                  to <output_dir>/metrics.csv. The header is
//                  written once, when the file is created.
//
// Example CSV output:
//   epoch,train_loss,val_loss
//   1,0.693100,0.688400
//   2,0.512900,0.530200
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

// ─── LossHistory ──────────────────────────────────────────────────────────────
/// Per-batch losses of one run. Append-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LossHistory {
    pub train:      Vec<f64>,
    pub validation: Vec<f64>,
}

impl LossHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_train(&mut self, loss: f64) {
        self.train.push(loss);
    }

    pub fn push_validation(&mut self, loss: f64) {
        self.validation.push(loss);
    }

    pub fn is_empty(&self) -> bool {
        self.train.is_empty() && self.validation.is_empty()
    }
}

/// Arithmetic mean, NaN for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        f64::NAN
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

// ─── EpochMetrics ─────────────────────────────────────────────────────────────
/// One row of the metrics CSV
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Absolute epoch number (starts at 1, continues across resumes)
    pub epoch: usize,

    /// Mean BCE loss over the training batches of this epoch
    pub train_loss: f64,

    /// Mean BCE loss over the validation batches of this epoch
    pub val_loss: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: f64) -> Self {
        Self { epoch, train_loss, val_loss }
    }
}

// ─── MetricsLogger ────────────────────────────────────────────────────────────
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the logger, writing the CSV header if the file is new.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,train_loss,val_loss")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's row.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(f, "{},{:.6},{:.6}", m.epoch, m.train_loss, m.val_loss)?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_history_appends_in_order() {
        let mut h = LossHistory::new();
        assert!(h.is_empty());
        h.push_train(0.9);
        h.push_train(0.7);
        h.push_validation(0.8);
        assert_eq!(h.train, vec![0.9, 0.7]);
        assert_eq!(h.validation, vec![0.8]);
    }

    #[test]
    fn test_csv_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&EpochMetrics::new(1, 0.5, 0.6)).unwrap();

        // Re-opening must not write a second header
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&EpochMetrics::new(2, 0.4, 0.5)).unwrap();

        let csv = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec![
            "epoch,train_loss,val_loss",
            "1,0.500000,0.600000",
            "2,0.400000,0.500000",
        ]);
    }
}
