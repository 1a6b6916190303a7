// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docscan-dispatch: moves geometry work off the caller's task.
//
// A lazily grown pool of worker threads runs detection, extraction and image
// decoding. Requests and responses are matched by correlation id, so jobs may
// finish in any order. On top of the pool sit the live-preview loop and the
// capture session that collaborators drive.

pub mod correlate;
pub mod pool;
pub mod preview;
pub mod protocol;
pub mod session;
mod worker;

pub use pool::WorkerPool;
pub use preview::{FrameSource, PreviewHandle, PreviewLoop, PreviewState};
pub use protocol::{WorkerMessage, WorkerOutput, WorkerRequest, WorkerResponse};
pub use session::CaptureSession;
pub use worker::PANIC_ERROR_NAME;
