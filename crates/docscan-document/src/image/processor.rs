// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: decode uploads, convert between `PixelBuffer` and the
// `image` crate's buffers, downscale for detection, and encode JPEG for PDF
// embedding.

use docscan_core::error::ScanError;
use docscan_core::{PixelBuffer, PixelFormat};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use tracing::{debug, instrument};

/// Image pipeline operating on a single in-memory image.
///
/// Each transformation consumes `self` and returns a new processor, so calls
/// chain:
///
/// ```ignore
/// let jpeg = ImageProcessor::from_pixels(&buffer)?
///     .downscale_to_fit(1600)
///     .to_jpeg_bytes(90)?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Decode raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, ScanError> {
        let img = image::load_from_memory(data).map_err(|err| {
            ScanError::Image(format!("failed to decode image: {}", err))
        })?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Load and decode an image file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, ScanError> {
        let img = image::open(path.as_ref()).map_err(|err| {
            ScanError::Image(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        Ok(Self { image: img })
    }

    /// Copy a `PixelBuffer` into a processor. The buffer is left untouched.
    pub fn from_pixels(buffer: &PixelBuffer) -> Result<Self, ScanError> {
        let (w, h) = (buffer.width(), buffer.height());
        let raw = buffer.data().to_vec();
        let image = match buffer.format() {
            PixelFormat::Rgba8 => RgbaImage::from_raw(w, h, raw).map(DynamicImage::ImageRgba8),
            PixelFormat::Rgb8 => RgbImage::from_raw(w, h, raw).map(DynamicImage::ImageRgb8),
        }
        .ok_or_else(|| {
            ScanError::InvalidBuffer(format!("{w}x{h} buffer does not match its sample count"))
        })?;
        Ok(Self { image })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the underlying `DynamicImage`.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// Luma view of the current image.
    pub fn to_luma(&self) -> GrayImage {
        self.image.to_luma8()
    }

    // -- Transformations ------------------------------------------------------

    /// Shrink the image so neither side exceeds `max_dimension`, preserving
    /// aspect ratio. Smaller images are returned unchanged.
    #[instrument(skip(self), fields(max_dimension))]
    pub fn downscale_to_fit(self, max_dimension: u32) -> Self {
        let (w, h) = (self.image.width(), self.image.height());
        if w <= max_dimension && h <= max_dimension {
            return self;
        }
        let resized = self
            .image
            .resize(max_dimension, max_dimension, FilterType::Triangle);
        debug!(
            from_w = w,
            from_h = h,
            new_w = resized.width(),
            new_h = resized.height(),
            "Downscaled"
        );
        Self { image: resized }
    }

    // -- Output ---------------------------------------------------------------

    /// Copy the image out as an RGBA `PixelBuffer`.
    pub fn to_pixel_buffer(&self) -> Result<PixelBuffer, ScanError> {
        let rgba = self.image.to_rgba8();
        let (w, h) = rgba.dimensions();
        PixelBuffer::new(w, h, PixelFormat::Rgba8, rgba.into_raw())
    }

    /// Consume the processor, producing an RGBA `PixelBuffer` without an
    /// extra copy when the image is already RGBA.
    pub fn into_pixel_buffer(self) -> Result<PixelBuffer, ScanError> {
        let rgba = self.image.into_rgba8();
        let (w, h) = rgba.dimensions();
        PixelBuffer::new(w, h, PixelFormat::Rgba8, rgba.into_raw())
    }

    /// Encode the current image as baseline JPEG with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>, ScanError> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
        rgb.write_with_encoder(encoder).map_err(|err| {
            ScanError::Image(format!("JPEG encoding failed: {}", err))
        })?;
        Ok(buffer)
    }

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, ScanError> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        self.image.write_to(&mut cursor, ImageFormat::Png).map_err(|err| {
            ScanError::Image(format!("image encoding failed: {}", err))
        })?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_buffer_survives_conversion() {
        let buffer = PixelBuffer::new(2, 1, PixelFormat::Rgb8, vec![10, 20, 30, 40, 50, 60]).unwrap();
        let out = ImageProcessor::from_pixels(&buffer).unwrap().into_pixel_buffer().unwrap();
        assert_eq!(out.format(), PixelFormat::Rgba8);
        assert_eq!(out.data(), &[10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn downscale_preserves_aspect() {
        let buffer = PixelBuffer::filled(400, 200, [0, 0, 0, 255]).unwrap();
        let small = ImageProcessor::from_pixels(&buffer).unwrap().downscale_to_fit(100);
        assert_eq!((small.width(), small.height()), (100, 50));

        let untouched = ImageProcessor::from_pixels(&buffer).unwrap().downscale_to_fit(1000);
        assert_eq!((untouched.width(), untouched.height()), (400, 200));
    }

    #[test]
    fn jpeg_output_decodes_back() {
        let buffer = PixelBuffer::filled(16, 8, [200, 100, 50, 255]).unwrap();
        let jpeg = ImageProcessor::from_pixels(&buffer).unwrap().to_jpeg_bytes(90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = ImageProcessor::from_bytes(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn garbage_bytes_are_an_image_error() {
        let err = ImageProcessor::from_bytes(b"not an image").err().unwrap();
        assert!(matches!(err, ScanError::Image(_)));
    }
}
