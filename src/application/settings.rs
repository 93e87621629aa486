// ============================================================
// Layer 2 — Shared Run Settings
// ============================================================
// Settings that training and inference must agree on: the
// network shape and the two image resolutions. They are saved
// inside train_config.json so an inference run can rebuild the
// exact network the checkpoint was trained with.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::{error::PipelineError, sample::Resolution};
use crate::ml::model::UNetConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Side of the square images the network sees
    pub working_size:  u32,
    /// Side of the square images written back to disk
    pub native_size:   u32,
    pub base_channels: usize,
    pub depth:         usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            working_size:  Resolution::WORKING.width,
            native_size:   Resolution::NATIVE.width,
            base_channels: 16,
            depth:         4,
        }
    }
}

impl ModelSettings {
    pub fn working(&self) -> Resolution {
        Resolution::square(self.working_size)
    }

    pub fn native(&self) -> Resolution {
        Resolution::square(self.native_size)
    }

    pub fn unet_config(&self) -> UNetConfig {
        UNetConfig::new()
            .with_base_channels(self.base_channels)
            .with_depth(self.depth)
    }

    /// Reject shapes the U-Net cannot process.
    pub fn validate(&self) -> Result<()> {
        if self.depth == 0 || self.base_channels == 0 {
            return Err(PipelineError::configuration("network depth and base channels must be positive").into());
        }
        let stride = 1u32.checked_shl(self.depth as u32).unwrap_or(0);
        if self.working_size == 0 || stride == 0 || self.working_size % stride != 0 {
            return Err(PipelineError::configuration(format!(
                "working size {} must be a positive multiple of 2^{}",
                self.working_size, self.depth
            ))
            .into());
        }
        if self.native_size == 0 {
            return Err(PipelineError::configuration("native size must be positive").into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ModelSettings::default().validate().is_ok());
    }

    #[test]
    fn test_working_size_must_divide_by_depth() {
        let s = ModelSettings { working_size: 100, depth: 4, ..Default::default() };
        assert!(s.validate().is_err());
    }
}
