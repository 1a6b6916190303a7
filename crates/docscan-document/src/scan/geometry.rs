// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The geometry capability consumed by the worker pool.

use docscan_core::config::ScannerConfig;
use docscan_core::error::ScanError;
use docscan_core::{PixelBuffer, Quad};

use super::detect::{DetectOptions, detect_boundary};
use super::extract::extract_region;

/// Boundary detection and perspective extraction as one swappable unit.
///
/// Implementations must be pure with respect to their inputs: neither call
/// may modify `pixels`, and `detect_boundary` must return the same answer for
/// the same buffer. Anything meeting that contract can back the worker pool.
pub trait DocumentGeometry: Send + Sync {
    /// Most likely document outline, or `None` when nothing is confident.
    fn detect_boundary(&self, pixels: &PixelBuffer) -> Result<Option<Quad>, ScanError>;

    /// Perspective-correct `quad` into a `target_width` wide image. A missing
    /// height is inferred from the quad's aspect ratio.
    fn extract_region(
        &self,
        pixels: &PixelBuffer,
        quad: &Quad,
        target_width: u32,
        target_height: Option<u32>,
    ) -> Result<PixelBuffer, ScanError>;
}

/// Edge/contour based implementation built on `imageproc`.
#[derive(Debug, Clone, Default)]
pub struct ContourGeometry {
    options: DetectOptions,
}

impl ContourGeometry {
    pub fn new(options: DetectOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(DetectOptions::from_config(config))
    }

    pub fn options(&self) -> &DetectOptions {
        &self.options
    }
}

impl DocumentGeometry for ContourGeometry {
    fn detect_boundary(&self, pixels: &PixelBuffer) -> Result<Option<Quad>, ScanError> {
        detect_boundary(pixels, &self.options)
    }

    fn extract_region(
        &self,
        pixels: &PixelBuffer,
        quad: &Quad,
        target_width: u32,
        target_height: Option<u32>,
    ) -> Result<PixelBuffer, ScanError> {
        extract_region(pixels, quad, target_width, target_height)
    }
}
