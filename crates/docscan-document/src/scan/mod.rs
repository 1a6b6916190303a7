// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometry core: document boundary detection and perspective extraction.

pub mod detect;
pub mod extract;
pub mod geometry;

pub use detect::{DetectOptions, detect_boundary};
pub use extract::extract_region;
pub use geometry::{ContourGeometry, DocumentGeometry};
