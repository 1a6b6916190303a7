// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand implementations. Each returns the JSON line printed on stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use docscan_core::config::ScannerConfig;
use docscan_core::error::ScanError;
use docscan_core::Quad;
use docscan_dispatch::CaptureSession;
use docscan_document::pdf::reader::PageBox;
use docscan_document::{ContourGeometry, DocumentGeometry, ImageProcessor, PdfInspector};
use serde::Serialize;
use tracing::{info, instrument};

/// Emitted once the PDF is on disk.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "pdfGenerated", rename_all = "camelCase")]
struct PdfGenerated {
    file_name: String,
    pages: usize,
    bytes: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Detection {
    width: u32,
    height: u32,
    detected: bool,
    quad: Quad,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Inspection {
    version: String,
    pages: usize,
    media_boxes: Vec<PageBox>,
}

/// Config from `path` (or the defaults) with command-line overrides applied.
pub fn load_config(path: Option<&Path>, width: Option<u32>) -> Result<ScannerConfig, ScanError> {
    let mut config = match path {
        Some(path) => ScannerConfig::load(path)?,
        None => ScannerConfig::default(),
    };
    if width.is_some() {
        config.output_width = width;
    }
    config.validate()?;
    Ok(config)
}

/// Build one PDF from `images`, in order.
///
/// With `quad` set, detection is skipped and the quad is applied to every
/// page (clamped to each image). Otherwise each page uses its detected
/// boundary, or the full frame when none is found.
#[instrument(skip(config, images, quad), fields(images = images.len()))]
pub async fn scan(
    config: &ScannerConfig,
    images: &[PathBuf],
    output: &Path,
    quad: Option<Quad>,
) -> Result<String, ScanError> {
    let geometry = Arc::new(ContourGeometry::from_config(config));
    let mut session = CaptureSession::with_geometry(geometry, config);

    for path in images {
        let bytes = std::fs::read(path)?;
        match quad {
            Some(quad) => {
                let frame = session.pool().get_data(bytes).await?;
                session.add_with_quad(frame, quad);
            }
            None => {
                session.add_encoded(bytes).await?;
            }
        }
    }

    let pdf = session.finish().await?;
    std::fs::write(output, &pdf)?;
    info!(path = %output.display(), bytes = pdf.len(), "PDF written");

    let event = PdfGenerated {
        file_name: output.display().to_string(),
        pages: session.pages().len(),
        bytes: pdf.len(),
    };
    Ok(serde_json::to_string(&event)?)
}

/// Report the boundary detected in one image.
pub fn detect(config: &ScannerConfig, image: &Path) -> Result<String, ScanError> {
    let pixels = ImageProcessor::open(image)?.into_pixel_buffer()?;
    let found = ContourGeometry::from_config(config).detect_boundary(&pixels)?;
    let report = Detection {
        width: pixels.width(),
        height: pixels.height(),
        detected: found.is_some(),
        quad: found.unwrap_or_else(|| Quad::full_frame(pixels.width(), pixels.height())),
    };
    Ok(serde_json::to_string(&report)?)
}

pub fn inspect(pdf: &Path) -> Result<String, ScanError> {
    let inspector = PdfInspector::open(pdf)?;
    let report = Inspection {
        version: inspector.version().to_string(),
        pages: inspector.page_count(),
        media_boxes: inspector.media_boxes()?,
    };
    Ok(serde_json::to_string(&report)?)
}
