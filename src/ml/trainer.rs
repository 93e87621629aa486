// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Drives the epochs of one (possibly resumed) run:
//
//   INIT → (TRAIN_PASS → EVAL_PASS)* → DONE
//
//   TRAIN_PASS  for every mini-batch: forward, BCE loss against
//               the true masks, backward, Adam step. Each batch
//               loss is appended to the train history.
//   EVAL_PASS   model.valid() on the inner backend, forward only,
//               loss appended to the validation history. The
//               trained model is not touched.
//
// Resume arithmetic:
//   remaining = requested_epochs - epochs_completed (saturating)
//   remaining == 0 → nothing runs, nothing is saved
//
// Checkpoints always carry the ABSOLUTE epoch number:
//   - after local epochs 0, 2, 4, … a cadence save (final=false)
//   - after the last epoch, one final save (final=true)
// so a crash loses at most one completed epoch.
//
// Any failure inside a batch (e.g. a decode error) ends the run.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{Context, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::data::{
    batcher::{load_batch, SegBatcher},
    splitter::Partition,
};
use crate::domain::traits::SampleSource;
use crate::infra::{
    checkpoint::CheckpointStore,
    metrics::{mean, EpochMetrics, LossHistory, MetricsLogger},
};
use crate::ml::model::{bce_with_logits, SegmentationNetwork};

/// Epochs between two cadence checkpoints
pub const CHECKPOINT_EVERY: usize = 2;

// ─── TrainingPlan ─────────────────────────────────────────────────────────────
/// Everything the loop needs to know besides the model and the data.
#[derive(Debug, Clone)]
pub struct TrainingPlan {
    /// Total epoch budget, counted from the very first run
    pub requested_epochs: usize,
    /// Epochs already stored in the checkpoint we resumed from
    pub epochs_completed: usize,
    pub batch_size:       usize,
    pub learning_rate:    f64,
    pub checkpoint_every: usize,
    /// Seed for the per-epoch shuffle of the training indices
    pub shuffle_seed:     u64,
}

impl TrainingPlan {
    pub fn remaining_epochs(&self) -> usize {
        self.requested_epochs.saturating_sub(self.epochs_completed)
    }

    /// Cadence test on the 0-based epoch counter of THIS run
    pub fn is_checkpoint_epoch(&self, local_epoch: usize) -> bool {
        local_epoch % self.checkpoint_every.max(1) == 0
    }

    /// Absolute, 1-based number of local epoch `local_epoch`
    pub fn absolute_epoch(&self, local_epoch: usize) -> usize {
        self.epochs_completed + local_epoch + 1
    }
}

/// Result of a training run
pub struct TrainingOutcome<M> {
    pub model:            M,
    /// Epochs executed by this run
    pub epochs_run:       usize,
    /// Absolute epoch count after this run
    pub epochs_completed: usize,
    pub history:          LossHistory,
}

/// Training indices in the order used for `epoch`.
/// Depends only on the seed and the absolute epoch, so a resumed run
/// sees the same order an uninterrupted run would have.
pub fn epoch_order(indices: &[usize], seed: u64, epoch: usize) -> Vec<usize> {
    let mut order = indices.to_vec();
    let mut rng   = StdRng::seed_from_u64(seed.wrapping_add(epoch as u64));
    order.shuffle(&mut rng);
    order
}

pub fn run_training<B, M, S>(
    model:     M,
    plan:      &TrainingPlan,
    source:    &S,
    partition: &Partition,
    store:     &CheckpointStore,
    metrics:   Option<&MetricsLogger>,
    device:    &B::Device,
) -> Result<TrainingOutcome<M>>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + SegmentationNetwork<B>,
    M::InnerModule: SegmentationNetwork<B::InnerBackend>,
    S: SampleSource + ?Sized,
{
    let remaining = plan.remaining_epochs();
    let mut history = LossHistory::new();

    if remaining == 0 {
        tracing::info!(
            "Model already trained for {} of {} requested epochs, nothing to do",
            plan.epochs_completed,
            plan.requested_epochs
        );
        return Ok(TrainingOutcome {
            model,
            epochs_run: 0,
            epochs_completed: plan.epochs_completed,
            history,
        });
    }

    let batch_size = plan.batch_size.max(1);
    let mut model  = model;
    let mut optim  = AdamConfig::new().init::<B, M>();

    // Training batches carry autodiff tensors, validation batches
    // live on the inner backend (no graph bookkeeping)
    let train_batcher = SegBatcher::<B>::new(device.clone());
    let val_batcher   = SegBatcher::<B::InnerBackend>::new(device.clone());

    tracing::info!(
        "Training {} epochs ({} → {}), {} train / {} validation samples, batch size {}",
        remaining,
        plan.epochs_completed,
        plan.requested_epochs,
        partition.train.len(),
        partition.validation.len(),
        batch_size
    );

    for local_epoch in 0..remaining {
        let epoch = plan.absolute_epoch(local_epoch);

        // ── Training phase ────────────────────────────────────────────────────
        let order = epoch_order(&partition.train, plan.shuffle_seed, epoch);
        let mut train_losses = Vec::new();

        for chunk in order.chunks(batch_size) {
            let batch = train_batcher.batch(load_batch(source, chunk)?);
            let masks = batch.masks.context("training batch without ground-truth masks")?;

            let output = model.segment(batch.images);
            let loss   = bce_with_logits(output.mask_logits, masks);
            let value: f64 = loss.clone().into_scalar().elem();

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(plan.learning_rate, model, grads);

            history.push_train(value);
            train_losses.push(value);
        }

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();
        let mut val_losses = Vec::new();

        for chunk in partition.validation.chunks(batch_size) {
            let batch = val_batcher.batch(load_batch(source, chunk)?);
            let masks = batch.masks.context("validation batch without ground-truth masks")?;

            let output = model_valid.segment(batch.images);
            let value: f64 = bce_with_logits(output.mask_logits, masks)
                .into_scalar()
                .elem();

            history.push_validation(value);
            val_losses.push(value);
        }

        let row = EpochMetrics::new(epoch, mean(&train_losses), mean(&val_losses));
        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4}",
            epoch, plan.requested_epochs, row.train_loss, row.val_loss,
        );
        if let Some(logger) = metrics {
            logger.log(&row)?;
        }

        if plan.is_checkpoint_epoch(local_epoch) {
            store.save::<B, M>(&model, epoch, false)?;
        }
    }

    store.save::<B, M>(&model, plan.requested_epochs, true)?;
    tracing::info!("Training complete after {} epochs", plan.requested_epochs);

    Ok(TrainingOutcome {
        model,
        epochs_run: remaining,
        epochs_completed: plan.requested_epochs,
        history,
    })
}
