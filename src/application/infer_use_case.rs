// ============================================================
// Layer 2 — InferUseCase
// ============================================================
// Loads the trained network and writes predictions:
//
//   Step 1: Resolve model settings (train_config.json wins)
//   Step 2: Build the network and load the checkpoint
//   Step 3: Predict the validation split      → output_dir
//   Step 4: Predict the unlabeled folder      → labeled_dir
//
// The validation split is recomputed from the same seed the
// training run used, so the images written here were never
// trained on.

use anyhow::Result;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::application::{settings::ModelSettings, train_use_case::TrainConfig};
use crate::data::{
    dataset::{DatasetLayout, PairedDataset},
    preprocessor::ImagePreprocessor,
    splitter::{DatasetPartitioner, DEFAULT_SEED},
    unlabeled::UnlabeledFolder,
};
use crate::domain::traits::SampleSource;
use crate::infra::checkpoint::CheckpointStore;
use crate::ml::{
    inferencer::{run_unlabeled_inference, run_validation_inference},
    model::UNet,
    postprocess::PredictionPostprocessor,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferConfig {
    pub data_root:       String,
    /// Validation triples go here; also where train_config.json is looked up
    pub output_dir:      String,
    pub checkpoint_path: String,
    pub unlabeled_dir:   String,
    pub labeled_dir:     String,
    pub seed:            u64,
    pub layout:          DatasetLayout,
    /// Used only when no train_config.json is found
    pub model:           ModelSettings,
    pub skip_validation: bool,
}

impl Default for InferConfig {
    fn default() -> Self {
        Self {
            data_root:       ".".to_string(),
            output_dir:      "./outputs".to_string(),
            checkpoint_path: "./outputs/unet_checkpoint.bin".to_string(),
            unlabeled_dir:   "./unlabeled_test".to_string(),
            labeled_dir:     "./labeled_test".to_string(),
            seed:            DEFAULT_SEED,
            layout:          DatasetLayout::default(),
            model:           ModelSettings::default(),
            skip_validation: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InferReport {
    /// Absolute epochs of the checkpoint that was used (0 = untrained)
    pub epochs_trained:      usize,
    pub validation_written:  usize,
    /// None when the unlabeled folder does not exist
    pub unlabeled_written:   Option<usize>,
    pub labeled_dir:         PathBuf,
}

/// What inference actually runs with after consulting train_config.json
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRun {
    pub model:  ModelSettings,
    pub seed:   u64,
    pub layout: DatasetLayout,
}

// ─── InferUseCase ─────────────────────────────────────────────────────────────
pub struct InferUseCase {
    config: InferConfig,
}

impl InferUseCase {
    pub fn new(config: InferConfig) -> Self {
        Self { config }
    }

    /// Settings the network must be rebuilt with: the ones saved by
    /// training when available, otherwise the configured ones.
    pub fn model_settings(&self) -> ModelSettings {
        self.resolve().model
    }

    /// Model settings, split seed and folder layout for this run.
    /// A saved training config wins over the configured values, so the
    /// validation split is the one training held out.
    pub fn resolve(&self) -> ResolvedRun {
        let cfg = &self.config;
        let Some(saved) = TrainConfig::load_from(Path::new(&cfg.output_dir)) else {
            return ResolvedRun {
                model:  cfg.model.clone(),
                seed:   cfg.seed,
                layout: cfg.layout.clone(),
            };
        };

        tracing::info!("Using model settings, seed and layout from the training run");
        if saved.seed != cfg.seed {
            tracing::warn!("Ignoring seed {}: the model was trained with seed {}", cfg.seed, saved.seed);
        }
        if saved.layout != cfg.layout {
            tracing::warn!("Ignoring dataset layout {:?}: training used {:?}", cfg.layout, saved.layout);
        }
        ResolvedRun {
            model:  saved.model,
            seed:   saved.seed,
            layout: saved.layout,
        }
    }

    pub fn execute<B: Backend>(&self, device: &B::Device) -> Result<InferReport> {
        let cfg = &self.config;

        // ── Step 1: Model settings, seed and layout ──────────────────────────
        let run      = self.resolve();
        let settings = &run.model;
        settings.validate()?;

        // ── Step 2: Network + checkpoint ─────────────────────────────────────
        let model: UNet<B> = settings.unet_config().init(device);
        let store = CheckpointStore::new(&cfg.checkpoint_path);
        let (model, epochs_trained) = store.resume(model, device);
        if epochs_trained == 0 {
            tracing::warn!("No usable checkpoint, predicting with untrained weights");
        }

        let preprocessor = ImagePreprocessor::new(settings.working());
        let post         = PredictionPostprocessor::new(settings.working(), settings.native());

        // ── Step 3: Validation split ─────────────────────────────────────────
        let validation_written = if cfg.skip_validation {
            0
        } else {
            let dataset   = PairedDataset::open(&cfg.data_root, &run.layout, preprocessor)?;
            let partition = DatasetPartitioner::new(run.seed).split(dataset.len());
            run_validation_inference(
                &model,
                &dataset,
                &partition.validation,
                &post,
                Path::new(&cfg.output_dir),
                device,
            )?
        };

        // ── Step 4: Unlabeled folder ─────────────────────────────────────────
        let unlabeled_dir = Path::new(&cfg.unlabeled_dir);
        let labeled_dir   = PathBuf::from(&cfg.labeled_dir);
        let unlabeled_written = if unlabeled_dir.is_dir() {
            let folder = UnlabeledFolder::open(unlabeled_dir, preprocessor)?;
            if folder.is_empty() {
                tracing::warn!("'{}' contains no images", unlabeled_dir.display());
            }
            Some(run_unlabeled_inference(&model, &folder, &post, &labeled_dir, device)?)
        } else {
            tracing::warn!("Unlabeled folder '{}' not found, skipping", unlabeled_dir.display());
            None
        };

        Ok(InferReport {
            epochs_trained,
            validation_written,
            unlabeled_written,
            labeled_dir,
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainUseCase;
    use crate::data::dataset::tests::write_pairs;
    use burn::backend::{Autodiff, NdArray};
    use image::{GenericImageView, RgbImage};
    use std::fs;

    fn settings() -> ModelSettings {
        ModelSettings {
            working_size:  32,
            native_size:   64,
            base_channels: 2,
            depth:         2,
        }
    }

    fn infer_config(root: &Path) -> InferConfig {
        InferConfig {
            data_root:       root.join("data").display().to_string(),
            output_dir:      root.join("out").display().to_string(),
            checkpoint_path: root.join("out/unet_checkpoint.bin").display().to_string(),
            unlabeled_dir:   root.join("unlabeled").display().to_string(),
            labeled_dir:     root.join("labeled").display().to_string(),
            model:           settings(),
            ..Default::default()
        }
    }

    #[test]
    fn test_infer_after_training_writes_validation_and_unlabeled() {
        let dir = tempfile::tempdir().unwrap();
        write_pairs(&dir.path().join("data"), 10, 64);

        let unlabeled = dir.path().join("unlabeled");
        fs::create_dir_all(&unlabeled).unwrap();
        RgbImage::from_pixel(40, 40, image::Rgb([90, 30, 200]))
            .save(unlabeled.join("fresh.png"))
            .unwrap();

        let infer = infer_config(dir.path());
        let train = TrainConfig {
            data_root:       infer.data_root.clone(),
            output_dir:      infer.output_dir.clone(),
            checkpoint_path: infer.checkpoint_path.clone(),
            epochs:          1,
            model:           settings(),
            ..Default::default()
        };
        TrainUseCase::new(train)
            .execute::<Autodiff<NdArray>>(&Default::default())
            .unwrap();

        let report = InferUseCase::new(infer.clone())
            .execute::<NdArray>(&Default::default())
            .unwrap();

        assert_eq!(report.epochs_trained, 1);
        assert_eq!(report.validation_written, 2);
        assert_eq!(report.unlabeled_written, Some(1));

        let out = Path::new(&infer.output_dir);
        for i in 0..2 {
            for suffix in ["pred_mask", "true_mask", "org_img"] {
                assert!(out.join(format!("{i}_{suffix}.png")).exists());
            }
        }
        let mask = image::open(report.labeled_dir.join("fresh_mask.png")).unwrap();
        assert_eq!(mask.dimensions(), (64, 64));
        assert!(report.labeled_dir.join("fresh.png").exists());
    }

    #[test]
    fn test_missing_checkpoint_and_unlabeled_folder_are_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_pairs(&dir.path().join("data"), 5, 64);

        let report = InferUseCase::new(infer_config(dir.path()))
            .execute::<NdArray>(&Default::default())
            .unwrap();

        assert_eq!(report.epochs_trained, 0);
        assert_eq!(report.validation_written, 1);
        assert_eq!(report.unlabeled_written, None);
    }

    #[test]
    fn test_validation_split_follows_training_seed() {
        let dir = tempfile::tempdir().unwrap();
        write_pairs(&dir.path().join("data"), 10, 64);

        // inference keeps the default seed 10
        let infer = infer_config(dir.path());
        let train = TrainConfig {
            data_root:       infer.data_root.clone(),
            output_dir:      infer.output_dir.clone(),
            checkpoint_path: infer.checkpoint_path.clone(),
            epochs:          1,
            seed:            7,
            model:           settings(),
            ..Default::default()
        };
        TrainUseCase::new(train)
            .execute::<Autodiff<NdArray>>(&Default::default())
            .unwrap();

        let use_case = InferUseCase::new(infer.clone());
        assert_eq!(use_case.resolve().seed, 7);
        use_case.execute::<NdArray>(&Default::default()).unwrap();

        // pixel (0, 0) of sample i is i
        let out = Path::new(&infer.output_dir);
        let written: Vec<usize> = (0..2)
            .map(|i| {
                let img = image::open(out.join(format!("{i}_org_img.png"))).unwrap().to_luma8();
                img.get_pixel(0, 0)[0] as usize
            })
            .collect();
        assert_eq!(written, DatasetPartitioner::new(7).split(10).validation);
    }

    #[test]
    fn test_saved_training_config_overrides_settings() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let saved = TrainConfig { model: settings(), ..Default::default() };
        saved.save_to(&out).unwrap();

        let cfg = InferConfig { model: ModelSettings::default(), ..infer_config(dir.path()) };
        assert_eq!(InferUseCase::new(cfg).model_settings(), settings());
    }
}
