// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer: assemble corrected page images into a PDF 1.4 file.
//
// Layout for N pages, in write order:
//
//   3i+1  image XObject (DCTDecode)
//   3i+2  content stream painting /I over the whole page
//   3i+3  page dictionary
//   3N+1  pages root
//   3N+2  catalog
//
// Page dictionaries reference the pages root before it exists, so its number
// is fixed up front and the object log refuses any write that would shift it.

use std::path::Path;

use docscan_core::PixelBuffer;
use docscan_core::config::ScannerConfig;
use docscan_core::error::ScanError;
use tracing::{debug, info, instrument};

use super::object::{ObjectNumber, PdfDict, PdfValue};
use super::serializer::ObjectLog;
use crate::image::processor::ImageProcessor;

/// Page height in points (US Letter). Width follows the image aspect ratio.
pub const PAGE_HEIGHT_PT: f64 = 792.0;

/// Indirect objects contributed by each page.
pub const OBJECTS_PER_PAGE: u32 = 3;

/// Resource name the content stream uses for the page image.
const IMAGE_RESOURCE: &str = "I";

/// Object number of the pages root for a document of `page_count` pages.
pub fn pages_root_number(page_count: usize) -> ObjectNumber {
    OBJECTS_PER_PAGE * page_count as ObjectNumber + 1
}

/// A page image ready for embedding: baseline JPEG bytes plus the pixel
/// dimensions they decode to.
#[derive(Debug, Clone)]
pub struct PdfImage {
    width: u32,
    height: u32,
    jpeg: Vec<u8>,
}

impl PdfImage {
    /// JPEG-encode a pixel buffer.
    pub fn from_pixels(buffer: &PixelBuffer, quality: u8) -> Result<Self, ScanError> {
        let jpeg = ImageProcessor::from_pixels(buffer)?.to_jpeg_bytes(quality)?;
        Ok(Self {
            width: buffer.width(),
            height: buffer.height(),
            jpeg,
        })
    }

    /// Wrap JPEG bytes that are already encoded.
    pub fn from_jpeg(width: u32, height: u32, jpeg: Vec<u8>) -> Result<Self, ScanError> {
        if width == 0 || height == 0 {
            return Err(ScanError::PdfEncoding(format!(
                "page image must have non-zero size, got {}x{}",
                width, height
            )));
        }
        Ok(Self {
            width,
            height,
            jpeg,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    /// Page size in points: `(792 * w / h, 792)`.
    pub fn page_size(&self) -> (f64, f64) {
        let width = PAGE_HEIGHT_PT * self.width as f64 / self.height as f64;
        (width, PAGE_HEIGHT_PT)
    }
}

/// Creates PDF documents from page images without any PDF library.
#[derive(Debug, Clone)]
pub struct PdfWriter {
    /// JPEG quality used when re-encoding pixel buffers (1-100).
    jpeg_quality: u8,
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new(ScannerConfig::default().jpeg_quality)
    }
}

impl PdfWriter {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(config.jpeg_quality)
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    // -- Images to PDF --------------------------------------------------------

    /// Encode each buffer as JPEG and build a one-image-per-page PDF.
    #[instrument(skip_all, fields(pages = images.len(), quality = self.jpeg_quality))]
    pub fn create_from_images(&self, images: &[PixelBuffer]) -> Result<Vec<u8>, ScanError> {
        let encoded = images
            .iter()
            .map(|buffer| PdfImage::from_pixels(buffer, self.jpeg_quality))
            .collect::<Result<Vec<_>, _>>()?;
        self.create_from_jpegs(&encoded)
    }

    /// Build a PDF from already encoded page images. Zero pages is valid and
    /// yields an empty page tree.
    #[instrument(skip_all, fields(pages = images.len()))]
    pub fn create_from_jpegs(&self, images: &[PdfImage]) -> Result<Vec<u8>, ScanError> {
        let pages_root = pages_root_number(images.len());
        let catalog = pages_root + 1;
        let mut log = ObjectLog::new();
        let mut kids = Vec::with_capacity(images.len());

        for image in images {
            let image_obj = log.next_number();
            let content_obj = image_obj + 1;
            let page_obj = image_obj + 2;
            let (page_w, page_h) = image.page_size();

            let image_dict = PdfDict::new()
                .with("Type", PdfValue::name("XObject"))
                .with("Subtype", PdfValue::name("Image"))
                .with("Width", image.width)
                .with("Height", image.height)
                .with("ColorSpace", PdfValue::name("DeviceRGB"))
                .with("BitsPerComponent", 8u32)
                .with("Filter", PdfValue::name("DCTDecode"))
                .with("Length", image.jpeg.len() as i64);
            log.write_stream(image_obj, &image_dict, &image.jpeg)?;

            let content = content_stream(page_w, page_h);
            let content_dict = PdfDict::new().with("Length", content.len() as i64);
            log.write_stream(content_obj, &content_dict, &content)?;

            let page_dict = PdfDict::new()
                .with("Type", PdfValue::name("Page"))
                .with("Parent", PdfValue::Reference(pages_root))
                .with(
                    "Resources",
                    PdfDict::new().with(
                        "XObject",
                        PdfDict::new().with(IMAGE_RESOURCE, PdfValue::Reference(image_obj)),
                    ),
                )
                .with("Contents", PdfValue::Reference(content_obj))
                .with(
                    "MediaBox",
                    PdfValue::Array(vec![
                        PdfValue::Integer(0),
                        PdfValue::Integer(0),
                        PdfValue::Real(page_w),
                        PdfValue::Real(page_h),
                    ]),
                );
            log.write_object(page_obj, &page_dict.into())?;
            kids.push(PdfValue::Reference(page_obj));

            debug!(
                page_obj,
                width_px = image.width,
                height_px = image.height,
                jpeg_bytes = image.jpeg.len(),
                "Page written"
            );
        }

        let pages_dict = PdfDict::new()
            .with("Type", PdfValue::name("Pages"))
            .with("Count", images.len() as i64)
            .with("Kids", PdfValue::Array(kids));
        log.write_object(pages_root, &pages_dict.into())?;

        let catalog_dict = PdfDict::new()
            .with("Type", PdfValue::name("Catalog"))
            .with("Pages", PdfValue::Reference(pages_root));
        log.write_object(catalog, &catalog_dict.into())?;

        let bytes = log.finish(catalog)?;
        info!(pages = images.len(), bytes = bytes.len(), "PDF assembled");
        Ok(bytes)
    }

    // -- File output convenience ----------------------------------------------

    /// Create a PDF from pixel buffers and write it directly to a file.
    pub fn write_to_file(
        &self,
        images: &[PixelBuffer],
        path: impl AsRef<Path>,
    ) -> Result<usize, ScanError> {
        let bytes = self.create_from_images(images)?;
        std::fs::write(path.as_ref(), &bytes)?;
        info!("Wrote PDF to {}", path.as_ref().display());
        Ok(bytes.len())
    }
}

/// `q w 0 0 h 0 0 cm /I Do Q`: scale the unit square to the page and paint
/// the image into it.
fn content_stream(width: f64, height: f64) -> Vec<u8> {
    let mut out = b"q\n".to_vec();
    PdfValue::Real(width).write_to(&mut out);
    out.extend_from_slice(b" 0 0 ");
    PdfValue::Real(height).write_to(&mut out);
    out.extend_from_slice(b" 0 0 cm\n/");
    out.extend_from_slice(IMAGE_RESOURCE.as_bytes());
    out.extend_from_slice(b" Do\nQ\n");
    out
}
