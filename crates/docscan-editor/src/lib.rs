// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docscan-editor: interactive adjustment of detected page outlines.
//
// UI-agnostic. A host feeds pointer and resize events in screen coordinates
// and draws whatever `Overlay` the editor hands to its `RedrawSink`.

pub mod editor;
pub mod review;
pub mod viewport;

pub use editor::{DragState, Overlay, QuadEditor, RedrawSink};
pub use review::{ReviewOutcome, ReviewStrip};
pub use viewport::{ScreenPoint, Viewport};
