// ============================================================
// Layer 6 — Loss Curve Plot
// ============================================================
// Renders the per-batch train and validation losses into
// <output_dir>/loss_curves.png with plotters.
//
// The two sequences have different lengths (more train batches
// than validation batches per epoch), so both are spread over a
// shared x axis measured in epochs: point i of a series with n
// points sits at x = i * epochs / n.
//
//   blue → train loss,  red → validation loss
//
// No text is drawn, so no font backend is needed.

use anyhow::Result;
use plotters::prelude::*;
use std::path::{Path, PathBuf};

use crate::infra::metrics::LossHistory;

pub const LOSS_CURVE_FILE: &str = "loss_curves.png";

const SIZE: (u32, u32) = (800, 480);

/// Draw `history` and return the path of the written image.
pub fn draw_training_curves(
    history:    &LossHistory,
    epochs:     usize,
    output_dir: &Path,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(LOSS_CURVE_FILE);

    let train = spread(&history.train, epochs);
    let valid = spread(&history.validation, epochs);

    let x_max = epochs.max(1) as f64;
    let y_max = train
        .iter()
        .chain(&valid)
        .map(|&(_, y)| y)
        .filter(|y| y.is_finite())
        .fold(0.0f64, f64::max)
        .max(1e-6)
        * 1.05;

    // the backend borrows `path` until it is dropped at the end of the block
    {
        let root = BitMapBackend::new(&path, SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(plot_err)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .build_cartesian_2d(0.0..x_max, 0.0..y_max)
            .map_err(plot_err)?;

        chart
            .draw_series(LineSeries::new(train, &BLUE))
            .map_err(plot_err)?;
        chart
            .draw_series(LineSeries::new(valid, &RED))
            .map_err(plot_err)?;

        root.present().map_err(plot_err)?;
    }

    tracing::info!("Saved loss curves to '{}'", path.display());
    Ok(path)
}

fn spread(values: &[f64], epochs: usize) -> Vec<(f64, f64)> {
    let n = values.len().max(1) as f64;
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, &v)| (i as f64 * epochs as f64 / n, v))
        .collect()
}

fn plot_err(e: impl std::fmt::Display) -> anyhow::Error {
    anyhow::anyhow!("Cannot draw loss curves: {e}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spread_covers_epoch_axis() {
        let pts = spread(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(pts.first(), Some(&(0.0, 1.0)));
        assert_eq!(pts.last(),  Some(&(1.5, 4.0)));
    }

    #[test]
    fn test_curve_file_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let history = LossHistory {
            train:      vec![0.9, 0.7, 0.6, 0.5],
            validation: vec![0.8, 0.65],
        };
        let path = draw_training_curves(&history, 2, dir.path()).unwrap();
        assert!(path.ends_with(LOSS_CURVE_FILE));
        assert!(image::open(&path).is_ok());
    }
}
