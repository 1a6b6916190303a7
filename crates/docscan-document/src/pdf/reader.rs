// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF inspector: read a PDF back with `lopdf` and report its page geometry.
// Used by the `inspect` command and to check the writer's output against an
// independent parser.

use std::path::Path;

use docscan_core::error::ScanError;
use lopdf::{Document, Object};
use serde::Serialize;
use tracing::{debug, info, instrument};

/// Page size in points as declared by a page's `/MediaBox`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageBox {
    pub width: f64,
    pub height: f64,
}

/// Read-only view over an existing PDF.
pub struct PdfInspector {
    document: Document,
    /// Source path, if opened from a file.
    source_path: Option<String>,
}

impl PdfInspector {
    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let document = Document::load(path_ref).map_err(|err| {
            ScanError::PdfRead(format!("failed to open {}: {}", path_ref.display(), err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded");

        Ok(Self {
            document,
            source_path: Some(path_ref.display().to_string()),
        })
    }

    /// Inspect PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, ScanError> {
        let document = Document::load_mem(data).map_err(|err| {
            ScanError::PdfRead(format!("failed to load PDF from memory: {}", err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self {
            document,
            source_path: None,
        })
    }

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    /// PDF version from the file header, e.g. `"1.4"`.
    pub fn version(&self) -> &str {
        &self.document.version
    }

    /// `/MediaBox` of every page in page order.
    pub fn media_boxes(&self) -> Result<Vec<PageBox>, ScanError> {
        self.document
            .get_pages()
            .into_iter()
            .map(|(number, id)| {
                let page = self.document.get_dictionary(id).map_err(|err| {
                    ScanError::PdfRead(format!("page {} is not a dictionary: {}", number, err))
                })?;
                let media_box = page
                    .get(b"MediaBox")
                    .and_then(Object::as_array)
                    .map_err(|err| {
                        ScanError::PdfRead(format!("page {} has no /MediaBox: {}", number, err))
                    })?;
                page_box(media_box).ok_or_else(|| {
                    ScanError::PdfRead(format!("page {} has a malformed /MediaBox", number))
                })
            })
            .collect()
    }
}

/// `[llx lly urx ury]` to a width/height pair.
fn page_box(values: &[Object]) -> Option<PageBox> {
    let numbers: Vec<f64> = values.iter().map(number).collect::<Option<_>>()?;
    match numbers.as_slice() {
        [llx, lly, urx, ury] => Some(PageBox {
            width: urx - llx,
            height: ury - lly,
        }),
        _ => None,
    }
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}
