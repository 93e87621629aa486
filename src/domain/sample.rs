// ============================================================
// Layer 3 — Sample Domain Types
// ============================================================
// A sample is one micrograph prepared for the network:
//
//   input    [3, H, W]  working resolution, channel-first, [0,1]
//   target   [H, W]     working resolution, [0,1] (None if unlabeled)
//   original            the decoded file at native resolution
//
// The original is kept so predictions can be put next to the
// untouched source image when artifacts are written to disk.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width:  u32,
    pub height: u32,
}

impl Resolution {
    /// Size the network works at.
    pub const WORKING: Resolution = Resolution::square(256);

    /// Size of the source micrographs.
    pub const NATIVE: Resolution = Resolution::square(512);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn square(side: u32) -> Self {
        Self { width: side, height: side }
    }

    /// Number of pixels in one channel plane
    pub fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// One preprocessed image, ready for batching.
#[derive(Debug, Clone)]
pub struct ImageSample {
    /// Name used for output files (the source file stem)
    pub name: String,

    /// Channel-first RGB planes at working resolution, len = 3 * W * H
    pub input: Vec<f32>,

    /// Ground-truth mask at working resolution, len = W * H.
    /// `None` for images that come from the unlabeled folder.
    pub target: Option<Vec<f32>>,

    /// The decoded source image at its native resolution
    pub original: DynamicImage,

    /// Resolution of `input` and `target`
    pub working: Resolution,
}

impl ImageSample {
    pub fn is_labeled(&self) -> bool {
        self.target.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_resolutions() {
        assert_eq!(Resolution::WORKING, Resolution::new(256, 256));
        assert_eq!(Resolution::NATIVE.pixels(), 512 * 512);
    }
}
