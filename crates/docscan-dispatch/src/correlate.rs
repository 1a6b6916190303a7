// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Request/response correlation.
//
// Every dispatched job registers its id here and waits on a oneshot. Workers
// hand finished responses to `complete`, which routes each one to the waiter
// with the matching id regardless of arrival order.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::protocol::{RequestId, WorkerResponse};

/// Table of in-flight requests.
#[derive(Debug, Default)]
pub struct Correlator {
    pending: Mutex<HashMap<RequestId, oneshot::Sender<WorkerResponse>>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start waiting for the response to `id`.
    pub fn register(&self, id: RequestId) -> oneshot::Receiver<WorkerResponse> {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut pending) = self.pending.lock() {
            if pending.insert(id, tx).is_some() {
                warn!(id, "request id registered twice; earlier waiter dropped");
            }
        }
        rx
    }

    /// Deliver a response to its waiter. Returns `false` when nobody is waiting
    /// for that id any more (timed out, or the caller went away).
    pub fn complete(&self, response: WorkerResponse) -> bool {
        let id = response.id;
        let waiter = self.pending.lock().ok().and_then(|mut p| p.remove(&id));
        match waiter {
            Some(tx) => {
                let delivered = tx.send(response).is_ok();
                if !delivered {
                    debug!(id, "caller stopped waiting before the response arrived");
                }
                delivered
            }
            None => {
                warn!(id, "response for unknown request id ignored");
                false
            }
        }
    }

    /// Forget a request. Its receiver resolves with a closed-channel error.
    pub fn cancel(&self, id: RequestId) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&id);
        }
    }

    /// Number of requests still awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }
}
