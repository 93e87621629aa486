// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates one training run in order:
//
//   Step 1: Validate the configuration
//   Step 2: Open the paired dataset           (Layer 4 - data)
//   Step 3: Seeded train/validation split     (Layer 4 - data)
//   Step 4: Build the network                 (Layer 5 - ml)
//   Step 5: Resume from the checkpoint        (Layer 6 - infra)
//   Step 6: Stop early if already trained
//   Step 7: Save config for inference         (Layer 2)
//   Step 8: Run the training loop             (Layer 5 - ml)
//   Step 9: Draw the loss curves              (Layer 6 - infra)
//
// The backend is a type parameter and the device is passed in,
// so nothing here depends on process-wide state.

use anyhow::{Context, Result};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::settings::ModelSettings;
use crate::data::{
    dataset::{DatasetLayout, PairedDataset},
    preprocessor::ImagePreprocessor,
    splitter::{DatasetPartitioner, DEFAULT_SEED},
};
use crate::domain::{error::PipelineError, traits::SampleSource};
use crate::infra::{
    checkpoint::CheckpointStore,
    metrics::{LossHistory, MetricsLogger},
    plot::draw_training_curves,
};
use crate::ml::{
    model::UNet,
    trainer::{run_training, TrainingPlan, CHECKPOINT_EVERY},
};

/// File the training configuration is written to inside the output dir
pub const CONFIG_FILE: &str = "train_config.json";

// ─── Training Configuration ──────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_root:       String,
    pub output_dir:      String,
    pub checkpoint_path: String,
    pub epochs:          usize,
    pub batch_size:      usize,
    pub lr:              f64,
    pub seed:            u64,
    pub layout:          DatasetLayout,
    pub model:           ModelSettings,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_root:       ".".to_string(),
            output_dir:      "./outputs".to_string(),
            checkpoint_path: "./outputs/unet_checkpoint.bin".to_string(),
            epochs:          80,
            batch_size:      2,
            lr:              1e-4,
            seed:            DEFAULT_SEED,
            layout:          DatasetLayout::default(),
            model:           ModelSettings::default(),
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PipelineError::configuration("batch size must be at least 1").into());
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(PipelineError::configuration(format!("invalid learning rate {}", self.lr)).into());
        }
        self.model.validate()
    }

    /// Write this config as JSON into `dir`.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(path)
    }

    /// Read the config a previous training run left in `dir`.
    /// A missing or unreadable file yields None.
    pub fn load_from(dir: &Path) -> Option<Self> {
        let path = dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&json) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                tracing::warn!("Ignoring unreadable '{}': {e}", path.display());
                None
            }
        }
    }
}

/// What a training run did
#[derive(Debug, Clone)]
pub struct TrainReport {
    /// Epochs executed by this invocation
    pub epochs_run:       usize,
    /// Absolute epochs stored in the checkpoint afterwards
    pub epochs_completed: usize,
    /// True when the checkpoint already covered the requested budget
    pub already_complete: bool,
    pub history:          LossHistory,
    pub loss_curve:       Option<PathBuf>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Execute the full training pipeline on backend `B`.
    pub fn execute<B: AutodiffBackend>(&self, device: &B::Device) -> Result<TrainReport> {
        let cfg = &self.config;

        // ── Step 1: Validate ─────────────────────────────────────────────────
        cfg.validate()?;

        // ── Step 2: Open the paired dataset ──────────────────────────────────
        let preprocessor = ImagePreprocessor::new(cfg.model.working());
        let dataset = PairedDataset::open(&cfg.data_root, &cfg.layout, preprocessor)?;

        // ── Step 3: Seeded split ─────────────────────────────────────────────
        let partition = DatasetPartitioner::new(cfg.seed).split(dataset.len());
        tracing::info!(
            "Split (seed {}): {} train, {} validation",
            cfg.seed,
            partition.train.len(),
            partition.validation.len()
        );

        // ── Step 4 + 5: Build network, resume if possible ────────────────────
        let model: UNet<B> = cfg.model.unet_config().init(device);
        let store = CheckpointStore::new(&cfg.checkpoint_path);
        let (model, executed) = store.resume(model, device);
        tracing::info!("Executed epochs {executed}");

        let plan = TrainingPlan {
            requested_epochs: cfg.epochs,
            epochs_completed: executed,
            batch_size:       cfg.batch_size,
            learning_rate:    cfg.lr,
            checkpoint_every: CHECKPOINT_EVERY,
            shuffle_seed:     cfg.seed,
        };

        // ── Step 6: Nothing left to do? ──────────────────────────────────────
        if plan.remaining_epochs() == 0 {
            tracing::info!("Checkpoint already covers {} epochs, nothing to do", cfg.epochs);
            return Ok(TrainReport {
                epochs_run:       0,
                epochs_completed: executed,
                already_complete: true,
                history:          LossHistory::new(),
                loss_curve:       None,
            });
        }

        // ── Step 7: Save config for inference ────────────────────────────────
        let output_dir = Path::new(&cfg.output_dir);
        cfg.save_to(output_dir)?;
        let metrics = MetricsLogger::new(output_dir)?;

        // ── Step 8: Training loop ────────────────────────────────────────────
        let outcome = run_training(model, &plan, &dataset, &partition, &store, Some(&metrics), device)?;

        // ── Step 9: Loss curves ──────────────────────────────────────────────
        let curve = draw_training_curves(&outcome.history, outcome.epochs_run, output_dir)?;

        Ok(TrainReport {
            epochs_run:       outcome.epochs_run,
            epochs_completed: outcome.epochs_completed,
            already_complete: false,
            history:          outcome.history,
            loss_curve:       Some(curve),
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::tests::write_pairs;
    use crate::infra::{checkpoint::CheckpointStore, plot::LOSS_CURVE_FILE};
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    /// Small but complete setup: 10 pairs, 32×32 working size
    fn toy_config(root: &Path, epochs: usize) -> TrainConfig {
        TrainConfig {
            data_root:       root.join("data").display().to_string(),
            output_dir:      root.join("out").display().to_string(),
            checkpoint_path: root.join("out/unet_checkpoint.bin").display().to_string(),
            epochs,
            batch_size:      2,
            lr:              1e-3,
            seed:            10,
            layout:          DatasetLayout::default(),
            model: ModelSettings {
                working_size:  32,
                native_size:   64,
                base_channels: 2,
                depth:         2,
            },
        }
    }

    fn train(cfg: TrainConfig) -> TrainReport {
        TrainUseCase::new(cfg)
            .execute::<TestBackend>(&Default::default())
            .unwrap()
    }

    #[test]
    fn test_two_epochs_from_scratch() {
        let dir = tempfile::tempdir().unwrap();
        write_pairs(&dir.path().join("data"), 10, 64);
        let cfg = toy_config(dir.path(), 2);

        let report = train(cfg.clone());

        // 8 train samples / batch 2 = 4 batches, 2 validation samples = 1 batch
        assert_eq!(report.epochs_run, 2);
        assert_eq!(report.history.train.len(), 4 * 2);
        assert_eq!(report.history.validation.len(), 2);

        let ckpt = CheckpointStore::new(&cfg.checkpoint_path).load().found().unwrap();
        assert_eq!(ckpt.epochs_completed, 2);
        assert!(ckpt.is_final);

        let out = Path::new(&cfg.output_dir);
        assert!(out.join(LOSS_CURVE_FILE).exists());
        assert!(out.join(CONFIG_FILE).exists());
        assert!(out.join("metrics.csv").exists());
    }

    #[test]
    fn test_resume_runs_only_missing_epochs() {
        let dir = tempfile::tempdir().unwrap();
        write_pairs(&dir.path().join("data"), 10, 64);

        let first = train(toy_config(dir.path(), 2));
        assert_eq!(first.epochs_run, 2);

        let cfg    = toy_config(dir.path(), 4);
        let second = train(cfg.clone());
        assert_eq!(second.epochs_run, 2);
        assert_eq!(second.epochs_completed, 4);
        // loss history restarts with each run
        assert_eq!(second.history.train.len(), 4 * 2);

        let ckpt = CheckpointStore::new(&cfg.checkpoint_path).load().found().unwrap();
        assert_eq!(ckpt.epochs_completed, 4);
    }

    #[test]
    fn test_budget_already_met_is_a_successful_noop() {
        let dir = tempfile::tempdir().unwrap();
        write_pairs(&dir.path().join("data"), 10, 64);

        train(toy_config(dir.path(), 2));
        let again = train(toy_config(dir.path(), 2));

        assert!(again.already_complete);
        assert_eq!(again.epochs_run, 0);
        assert_eq!(again.epochs_completed, 2);
        assert!(again.loss_curve.is_none());
    }

    #[test]
    fn test_corrupt_checkpoint_starts_from_zero() {
        let dir = tempfile::tempdir().unwrap();
        write_pairs(&dir.path().join("data"), 10, 64);
        let cfg = toy_config(dir.path(), 1);
        fs::create_dir_all(&cfg.output_dir).unwrap();
        fs::write(&cfg.checkpoint_path, b"junk").unwrap();

        let report = train(cfg);
        assert_eq!(report.epochs_run, 1);
        assert_eq!(report.epochs_completed, 1);
    }

    #[test]
    fn test_mismatched_folders_fail_fast() {
        let dir = tempfile::tempdir().unwrap();
        write_pairs(&dir.path().join("data"), 4, 64);
        fs::remove_file(dir.path().join("data/realmask/cell_000.png")).unwrap();

        let err = TrainUseCase::new(toy_config(dir.path(), 1))
            .execute::<TestBackend>(&Default::default())
            .unwrap_err();
        assert!(err.downcast_ref::<PipelineError>().unwrap().is_configuration());
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig { batch_size: 0, ..toy_config(dir.path(), 1) };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = toy_config(dir.path(), 3);
        cfg.save_to(dir.path()).unwrap();

        let loaded = TrainConfig::load_from(dir.path()).unwrap();
        assert_eq!(loaded.epochs, 3);
        assert_eq!(loaded.model, cfg.model);
    }
}
