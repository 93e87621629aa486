// ============================================================
// Layer 4 — Train/Validation Partitioner
// ============================================================
// Splits dataset indices into two sets:
//   - Training set:   used to update model weights
//   - Validation set: used to measure loss on unseen images,
//                     and later as the set inference runs on
//
// Why must the split be seeded?
//   Training can be interrupted and resumed, and inference is
//   a separate process that runs after training. All of them
//   have to agree on which images are "validation", otherwise
//   a resumed run would train on images the previous run used
//   for validation. So the seed is explicit configuration and
//   the permutation comes from a seeded StdRng, never from
//   thread_rng().
//
// Split ratio: floor(80%) training, remainder validation.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.
//
// Reference: rand crate documentation (SeedableRng)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Default seed, matches the one the reference runs were made with
pub const DEFAULT_SEED: u64 = 10;

/// Default share of samples that go to training
pub const TRAIN_FRACTION: f64 = 0.8;

/// Index sets produced by the partitioner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub train:      Vec<usize>,
    pub validation: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct DatasetPartitioner {
    seed:           u64,
    train_fraction: f64,
}

impl DatasetPartitioner {
    pub fn new(seed: u64) -> Self {
        Self { seed, train_fraction: TRAIN_FRACTION }
    }

    pub fn with_train_fraction(mut self, fraction: f64) -> Self {
        self.train_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of training samples for a dataset of `n`
    pub fn train_size(&self, n: usize) -> usize {
        ((n as f64) * self.train_fraction).floor() as usize
    }

    /// Shuffle 0..n with the seeded generator and split it.
    ///
    /// For n < 2 one side is empty; that is allowed, callers just
    /// end up with nothing to train or nothing to validate on.
    pub fn split(&self, n: usize) -> Partition {
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        indices.shuffle(&mut rng);

        let split_at   = self.train_size(n).min(n);
        let validation = indices.split_off(split_at);

        tracing::debug!(
            "Dataset split (seed {}): {} training, {} validation",
            self.seed,
            indices.len(),
            validation.len(),
        );

        Partition { train: indices, validation }
    }
}

impl Default for DatasetPartitioner {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let p = DatasetPartitioner::new(10).split(100);
        assert_eq!(p.train.len(),      80);
        assert_eq!(p.validation.len(), 20);
    }

    #[test]
    fn test_train_size_rounds_down() {
        // 0.8 * 9 = 7.2 → 7
        let p = DatasetPartitioner::new(10).split(9);
        assert_eq!(p.train.len(),      7);
        assert_eq!(p.validation.len(), 2);
    }

    #[test]
    fn test_same_seed_same_partition() {
        let a = DatasetPartitioner::new(10).split(50);
        let b = DatasetPartitioner::new(10).split(50);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seed_changes_partition() {
        let a = DatasetPartitioner::new(10).split(50);
        let b = DatasetPartitioner::new(11).split(50);
        assert_ne!(a, b);
    }

    #[test]
    fn test_all_indices_preserved_once() {
        let p = DatasetPartitioner::new(3).split(37);
        let mut all: Vec<usize> = p.train.iter().chain(&p.validation).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..37).collect::<Vec<_>>());
    }

    #[test]
    fn test_degenerate_sizes_do_not_panic() {
        let empty = DatasetPartitioner::default().split(0);
        assert!(empty.train.is_empty() && empty.validation.is_empty());

        let one = DatasetPartitioner::default().split(1);
        assert!(one.train.is_empty());
        assert_eq!(one.validation, vec![0]);
    }
}
