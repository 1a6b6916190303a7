// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docscan-document: Geometry and file-format work for the Docscan pipeline.
//
// Provides document boundary detection and perspective extraction (the
// geometry core), pixel-buffer conversion and JPEG encoding, and a hand-written
// PDF 1.4 encoder that assembles corrected pages into a single file.

pub mod image;
pub mod pdf;
pub mod scan;

// Re-export the primary structs so callers can use `docscan_document::PdfWriter` etc.
pub use crate::image::processor::ImageProcessor;
pub use crate::pdf::reader::PdfInspector;
pub use crate::pdf::writer::{PdfImage, PdfWriter};
pub use crate::scan::geometry::{ContourGeometry, DocumentGeometry};
