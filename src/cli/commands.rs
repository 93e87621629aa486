// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `infer`
// and all their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};

use crate::application::{
    infer_use_case::InferConfig,
    settings::ModelSettings,
    train_use_case::TrainConfig,
};
use crate::data::dataset::DatasetLayout;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train (or resume training) the segmentation network
    Train(TrainArgs),

    /// Predict masks for the validation split and an unlabeled folder
    Infer(InferArgs),
}

/// Compute backend
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// Any GPU adapter wgpu can find
    #[default]
    Wgpu,
    /// Pure-Rust CPU backend
    Ndarray,
}

/// Flags shared by both commands
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Folder containing realoriginals/ and realmask/
    #[arg(long, default_value = ".")]
    pub data_root: String,

    /// Where loss curves, metrics and validation predictions are written
    #[arg(long, default_value = "./outputs")]
    pub output_dir: String,

    /// Checkpoint file used for resume and inference
    #[arg(long, default_value = "./outputs/unet_checkpoint.bin")]
    pub checkpoint: String,

    /// Seed for the train/validation split and epoch shuffling
    #[arg(long, default_value_t = 10)]
    pub seed: u64,

    #[arg(long, value_enum, default_value_t = BackendKind::Wgpu)]
    pub backend: BackendKind,

    /// Side of the square images fed to the network
    #[arg(long, default_value_t = 256)]
    pub working_size: u32,

    /// Side of the square images written to disk
    #[arg(long, default_value_t = 512)]
    pub native_size: u32,

    /// Channels of the first U-Net stage
    #[arg(long, default_value_t = 16)]
    pub base_channels: usize,

    /// Number of U-Net down-sampling stages
    #[arg(long, default_value_t = 4)]
    pub depth: usize,
}

impl CommonArgs {
    fn model(&self) -> ModelSettings {
        ModelSettings {
            working_size:  self.working_size,
            native_size:   self.native_size,
            base_channels: self.base_channels,
            depth:         self.depth,
        }
    }
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Total number of epochs the model should end up trained for
    #[arg(long, default_value_t = 80)]
    pub epochs: usize,

    #[arg(long, default_value_t = 2)]
    pub batch_size: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,
}

/// Layer 1 → Layer 2 boundary: the application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        let model = a.common.model();
        TrainConfig {
            data_root:       a.common.data_root,
            output_dir:      a.common.output_dir,
            checkpoint_path: a.common.checkpoint,
            epochs:          a.epochs,
            batch_size:      a.batch_size,
            lr:              a.lr,
            seed:            a.common.seed,
            layout:          DatasetLayout::default(),
            model,
        }
    }
}

/// All arguments for the `infer` command
#[derive(Args, Debug)]
pub struct InferArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Folder of images without ground truth
    #[arg(long, default_value = "./unlabeled_test")]
    pub unlabeled_dir: String,

    /// Where `{name}.png` and `{name}_mask.png` are written
    #[arg(long, default_value = "./labeled_test")]
    pub labeled_dir: String,

    /// Only label the unlabeled folder
    #[arg(long)]
    pub skip_validation: bool,
}

impl From<InferArgs> for InferConfig {
    fn from(a: InferArgs) -> Self {
        let model = a.common.model();
        InferConfig {
            data_root:       a.common.data_root,
            output_dir:      a.common.output_dir,
            checkpoint_path: a.common.checkpoint,
            unlabeled_dir:   a.unlabeled_dir,
            labeled_dir:     a.labeled_dir,
            seed:            a.common.seed,
            layout:          DatasetLayout::default(),
            model,
            skip_validation: a.skip_validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults() {
        let cli = Cli::try_parse_from(["cell-seg", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        assert_eq!(args.common.backend, BackendKind::Wgpu);

        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.epochs, 80);
        assert_eq!(cfg.batch_size, 2);
        assert_eq!(cfg.seed, 10);
        assert_eq!(cfg.model, ModelSettings::default());
    }

    #[test]
    fn test_infer_flags() {
        let cli = Cli::try_parse_from([
            "cell-seg", "infer", "--backend", "ndarray", "--unlabeled-dir", "in", "--skip-validation",
        ])
        .unwrap();
        let Commands::Infer(args) = cli.command else { panic!("expected infer") };
        assert_eq!(args.common.backend, BackendKind::Ndarray);

        let cfg: InferConfig = args.into();
        assert_eq!(cfg.unlabeled_dir, "in");
        assert_eq!(cfg.labeled_dir, "./labeled_test");
        assert!(cfg.skip_validation);
    }
}
