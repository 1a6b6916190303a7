// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// A single geometry worker: one OS thread draining a request channel.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use docscan_core::error::{ScanError, SerializedError};
use docscan_document::{DocumentGeometry, ImageProcessor};
use tracing::{debug, error, warn};

use crate::correlate::Correlator;
use crate::protocol::{WorkerMessage, WorkerOutput, WorkerRequest, WorkerResponse};

/// Error name reported when a job panics.
pub const PANIC_ERROR_NAME: &str = "Panic";

/// Owning side of a worker thread. Dropping it closes the request channel
/// and the thread exits once its current job is done.
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    index: usize,
    requests: mpsc::Sender<WorkerRequest>,
}

impl WorkerHandle {
    /// Start worker `index`. Responses are routed through `correlator`.
    pub(crate) fn spawn(
        index: usize,
        geometry: Arc<dyn DocumentGeometry>,
        correlator: Arc<Correlator>,
    ) -> Result<Self, ScanError> {
        let (tx, rx) = mpsc::channel::<WorkerRequest>();
        thread::Builder::new()
            .name(format!("docscan-worker-{index}"))
            .spawn(move || {
                debug!(index, "worker started");
                while let Ok(request) = rx.recv() {
                    let response = handle_request(geometry.as_ref(), request);
                    correlator.complete(response);
                }
                debug!(index, "worker stopped");
            })?;
        Ok(Self {
            index,
            requests: tx,
        })
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    /// Hand a request to the worker. Fails only when the thread is gone.
    pub(crate) fn send(&self, request: WorkerRequest) -> Result<(), ScanError> {
        self.requests.send(request).map_err(|err| {
            ScanError::WorkerTransport(format!(
                "worker {} is not accepting requests (job {})",
                self.index, err.0.id
            ))
        })
    }
}

/// Run one request to completion. Never panics: a panicking job becomes an
/// error response and the worker carries on.
pub(crate) fn handle_request(geometry: &dyn DocumentGeometry, request: WorkerRequest) -> WorkerResponse {
    let WorkerRequest { id, msg, extra } = request;
    let operation = msg.operation();

    match catch_unwind(AssertUnwindSafe(|| execute(geometry, msg))) {
        Ok(Ok(output)) => {
            debug!(id, operation, kind = output.kind(), "job finished");
            WorkerResponse::success(id, output, extra)
        }
        Ok(Err(err)) => {
            warn!(id, operation, error = %err, "job failed");
            WorkerResponse::failure(id, err.to_serialized(None), extra)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(id, operation, message, "job panicked");
            let stack = thread::current().name().map(|n| format!("at {n}"));
            WorkerResponse::failure(
                id,
                SerializedError {
                    message,
                    name: PANIC_ERROR_NAME.to_string(),
                    stack,
                },
                extra,
            )
        }
    }
}

fn execute(geometry: &dyn DocumentGeometry, msg: WorkerMessage) -> Result<WorkerOutput, ScanError> {
    match msg {
        WorkerMessage::FindDocument { pixels } => {
            let quad = geometry.detect_boundary(&pixels)?;
            Ok(WorkerOutput::Boundary { quad, pixels })
        }
        WorkerMessage::ExtractDocument {
            pixels,
            quad,
            target_width,
            target_height,
        } => {
            let page = geometry.extract_region(&pixels, &quad, target_width, target_height)?;
            Ok(WorkerOutput::Extracted {
                page,
                source: pixels,
            })
        }
        WorkerMessage::GetData { bytes } => {
            let pixels = ImageProcessor::from_bytes(&bytes)?.into_pixel_buffer()?;
            Ok(WorkerOutput::Decoded { pixels })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
