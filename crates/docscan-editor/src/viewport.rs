// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Mapping between screen space and source-image space.
//
// The image is displayed "contained": scaled uniformly to fit the viewport
// and centred. `scale` is source-image pixels per screen pixel. Everything
// derived from the viewport size is recomputed together in `resize`, so no
// conversion can see a scale from before the last resize.

use docscan_core::Point;
use docscan_core::error::ScanError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A position in screen (client) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &ScreenPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &ScreenPoint) -> ScreenPoint {
        ScreenPoint::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    image_width: u32,
    image_height: u32,
    viewport_width: f64,
    viewport_height: f64,
    // Derived in `recompute`.
    display_width: f64,
    display_height: f64,
    offset_x: f64,
    offset_y: f64,
    scale: f64,
}

impl Viewport {
    pub fn new(
        image_width: u32,
        image_height: u32,
        viewport_width: f64,
        viewport_height: f64,
    ) -> Result<Self, ScanError> {
        if image_width == 0 || image_height == 0 {
            return Err(ScanError::InvalidBuffer(format!(
                "image must have non-zero size, got {}x{}",
                image_width, image_height
            )));
        }
        let mut viewport = Self {
            image_width,
            image_height,
            viewport_width: 0.0,
            viewport_height: 0.0,
            display_width: 0.0,
            display_height: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
            scale: 1.0,
        };
        viewport.resize(viewport_width, viewport_height)?;
        Ok(viewport)
    }

    /// Apply a new viewport size and recompute the display geometry.
    pub fn resize(&mut self, width: f64, height: f64) -> Result<(), ScanError> {
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(ScanError::Config(format!(
                "viewport must have positive size, got {}x{}",
                width, height
            )));
        }
        self.viewport_width = width;
        self.viewport_height = height;
        self.recompute();
        debug!(
            width,
            height,
            scale = self.scale,
            "Viewport resized"
        );
        Ok(())
    }

    fn recompute(&mut self) {
        let (iw, ih) = (self.image_width as f64, self.image_height as f64);
        let fit = (self.viewport_width / iw).min(self.viewport_height / ih);
        self.display_width = iw * fit;
        self.display_height = ih * fit;
        self.offset_x = (self.viewport_width - self.display_width) / 2.0;
        self.offset_y = (self.viewport_height - self.display_height) / 2.0;
        self.scale = iw / self.display_width;
    }

    /// Source-image pixels per screen pixel.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn image_size(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    pub fn viewport_size(&self) -> (f64, f64) {
        (self.viewport_width, self.viewport_height)
    }

    /// Size of the displayed image on screen.
    pub fn display_size(&self) -> (f64, f64) {
        (self.display_width, self.display_height)
    }

    /// Screen position to image position. Not clamped.
    pub fn to_image(&self, p: ScreenPoint) -> Point {
        Point::new(
            (p.x - self.offset_x) * self.scale,
            (p.y - self.offset_y) * self.scale,
        )
    }

    pub fn to_screen(&self, p: Point) -> ScreenPoint {
        ScreenPoint::new(
            p.x / self.scale + self.offset_x,
            p.y / self.scale + self.offset_y,
        )
    }

    /// `fraction` of the smaller viewport side, in screen pixels.
    pub fn grab_threshold(&self, fraction: f64) -> f64 {
        fraction * self.viewport_width.min(self.viewport_height)
    }
}
