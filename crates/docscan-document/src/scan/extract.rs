// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective extraction: warp a quad region of a frame onto a flat
// rectangle.

use docscan_core::error::ScanError;
use docscan_core::{PixelBuffer, Quad};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{debug, instrument};

use crate::image::processor::ImageProcessor;

/// Quads enclosing less than this many square pixels are treated as empty.
const MIN_QUAD_AREA: f64 = 1.0;

/// Largest output image, in pixels, that extraction will allocate.
pub const MAX_OUTPUT_PIXELS: u64 = 64 * 1024 * 1024;

/// Fill colour for output pixels whose source falls outside the frame.
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Map `quad` onto a `target_width` x `target_height` rectangle with bilinear
/// resampling.
///
/// When `target_height` is `None` it is inferred from the quad's measured
/// aspect ratio: the longer of the `ab`/`cd` edges against the longer of the
/// `bc`/`da` edges. The input buffer is never modified.
///
/// Zero-area and self-intersecting quads are rejected with
/// [`ScanError::DegenerateQuad`] instead of producing a folded image. Output
/// sizes above [`MAX_OUTPUT_PIXELS`] (a sliver quad with a wide target, say)
/// are rejected with [`ScanError::InvalidBuffer`] before anything is
/// allocated.
#[instrument(skip(pixels), fields(width = pixels.width(), height = pixels.height()))]
pub fn extract_region(
    pixels: &PixelBuffer,
    quad: &Quad,
    target_width: u32,
    target_height: Option<u32>,
) -> Result<PixelBuffer, ScanError> {
    if target_width == 0 || target_height == Some(0) {
        return Err(ScanError::InvalidBuffer(format!(
            "target size must be positive, got {}x{:?}",
            target_width, target_height
        )));
    }
    validate_quad(quad)?;

    let out_w = target_width;
    let out_h = target_height.unwrap_or_else(|| infer_height(quad, target_width));
    let out_pixels = out_w as u64 * out_h as u64;
    if out_pixels > MAX_OUTPUT_PIXELS {
        return Err(ScanError::InvalidBuffer(format!(
            "output {}x{} exceeds the {} pixel limit",
            out_w, out_h, MAX_OUTPUT_PIXELS
        )));
    }

    let src = quad.points().map(|p| (p.x as f32, p.y as f32));
    let dest: [(f32, f32); 4] = [
        (0.0, 0.0),
        (out_w as f32, 0.0),
        (out_w as f32, out_h as f32),
        (0.0, out_h as f32),
    ];

    let projection = Projection::from_control_points(src, dest).ok_or_else(|| {
        ScanError::DegenerateQuad("projective transform is singular".into())
    })?;

    let rgba = ImageProcessor::from_pixels(pixels)?.as_dynamic().to_rgba8();
    let mut output = RgbaImage::new(out_w, out_h);
    warp_into(&rgba, &projection, Interpolation::Bilinear, BACKGROUND, &mut output);

    debug!(out_w, out_h, "Region extracted");
    ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(output)).into_pixel_buffer()
}

/// Output height preserving the quad's measured aspect ratio. Saturates at
/// `u32::MAX`; callers bound the final pixel count.
pub fn infer_height(quad: &Quad, target_width: u32) -> u32 {
    match quad.measured_aspect() {
        Some(aspect) => (target_width as f64 * aspect)
            .round()
            .clamp(1.0, u32::MAX as f64) as u32,
        None => 1,
    }
}

fn validate_quad(quad: &Quad) -> Result<(), ScanError> {
    if quad
        .points()
        .iter()
        .any(|p| !p.x.is_finite() || !p.y.is_finite())
    {
        return Err(ScanError::DegenerateQuad("non-finite corner".into()));
    }
    if quad.area() < MIN_QUAD_AREA {
        return Err(ScanError::DegenerateQuad(format!(
            "area {:.2} is too small",
            quad.area()
        )));
    }
    if quad.is_self_intersecting() {
        return Err(ScanError::DegenerateQuad("edges cross each other".into()));
    }
    Ok(())
}
