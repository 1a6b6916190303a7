// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: a minimal hand-written PDF 1.4 encoder for scanned pages, plus
// a read-back inspector.

pub mod object;
pub mod reader;
pub mod serializer;
pub mod writer;

pub use object::{ObjectNumber, PdfDict, PdfValue};
pub use reader::PdfInspector;
pub use serializer::ObjectLog;
pub use writer::{PdfImage, PdfWriter};
