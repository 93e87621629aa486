// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train` — trains (or resumes) the U-Net on image/mask pairs
//   2. `infer` — loads the checkpoint and writes predicted masks
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{BackendKind, Commands, InferArgs, TrainArgs};

use crate::application::{
    infer_use_case::{InferReport, InferUseCase},
    train_use_case::{TrainReport, TrainUseCase},
};
use crate::ml::{cpu_device, gpu_device, CpuBackend, CpuTrainBackend, GpuBackend, GpuTrainBackend};

#[derive(Parser, Debug)]
#[command(
    name = "cell-seg",
    version = "0.1.0",
    about = "Train a U-Net on cell images and masks, then segment new images."
)]
pub struct Cli {
    /// The subcommand to run (train or infer)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Infer(args) => run_infer(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    tracing::info!("Training on images in: {}", args.common.data_root);

    let backend  = args.common.backend;
    let use_case = TrainUseCase::new(args.into());
    let report = match backend {
        BackendKind::Wgpu    => use_case.execute::<GpuTrainBackend>(&gpu_device())?,
        BackendKind::Ndarray => use_case.execute::<CpuTrainBackend>(&cpu_device())?,
    };
    print_train_report(&report);
    Ok(())
}

fn run_infer(args: InferArgs) -> Result<()> {
    let backend  = args.common.backend;
    let use_case = InferUseCase::new(args.into());
    let report = match backend {
        BackendKind::Wgpu    => use_case.execute::<GpuBackend>(&gpu_device())?,
        BackendKind::Ndarray => use_case.execute::<CpuBackend>(&cpu_device())?,
    };
    print_infer_report(&report);
    Ok(())
}

fn print_train_report(report: &TrainReport) {
    if report.already_complete {
        println!("The model has already been trained for the requested number of epochs. Nothing to do!");
        return;
    }
    println!(
        "Training complete: {} epochs this run, {} in total.",
        report.epochs_run, report.epochs_completed
    );
    if let Some(curve) = &report.loss_curve {
        println!("Loss curves: {}", curve.display());
    }
}

fn print_infer_report(report: &InferReport) {
    println!("Model trained for {} epochs.", report.epochs_trained);
    println!("Validation predictions written: {}", report.validation_written);
    if let Some(n) = report.unlabeled_written {
        println!("Labeled {n} images into {}", report.labeled_dir.display());
    }
}
