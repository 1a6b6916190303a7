// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Worker pool: runs geometry jobs off the caller's task.
//
// The pool holds at most `size` workers, created lazily on first demand.
// A semaphore with `size` permits bounds in-flight jobs; callers beyond that
// wait for a permit. Each job leases one idle worker (or spawns one), sends
// the request, and awaits the response with the matching correlation id.
// The lease returns the worker to the idle list on every exit path, success
// or failure, unless the worker is known to be broken.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use docscan_core::config::ScannerConfig;
use docscan_core::error::ScanError;
use docscan_core::{PixelBuffer, Quad};
use docscan_document::DocumentGeometry;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, info, instrument, warn};

use crate::correlate::Correlator;
use crate::protocol::{Extra, RequestId, WorkerMessage, WorkerOutput, WorkerRequest};
use crate::worker::WorkerHandle;

/// Correlation ids start here and are never reused within a pool.
const FIRST_REQUEST_ID: RequestId = 1;

/// Cloneable handle to a shared pool of geometry workers.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    geometry: Arc<dyn DocumentGeometry>,
    size: usize,
    permits: Semaphore,
    idle: Mutex<Vec<WorkerHandle>>,
    spawned: AtomicUsize,
    discarded: AtomicUsize,
    next_id: AtomicU64,
    correlator: Arc<Correlator>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.inner.size)
            .field("spawned", &self.spawned())
            .field("idle", &self.idle_count())
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

impl WorkerPool {
    /// Pool sized and timed from `config`.
    pub fn new(geometry: Arc<dyn DocumentGeometry>, config: &ScannerConfig) -> Self {
        Self::with_size(geometry, config.effective_pool_size(), config.job_timeout())
    }

    /// Pool with an explicit size (clamped to at least 1) and optional
    /// per-job timeout.
    pub fn with_size(
        geometry: Arc<dyn DocumentGeometry>,
        size: usize,
        timeout: Option<Duration>,
    ) -> Self {
        let size = size.max(1);
        info!(size, ?timeout, "Worker pool created");
        Self {
            inner: Arc::new(PoolInner {
                geometry,
                size,
                permits: Semaphore::new(size),
                idle: Mutex::new(Vec::with_capacity(size)),
                spawned: AtomicUsize::new(0),
                discarded: AtomicUsize::new(0),
                next_id: AtomicU64::new(FIRST_REQUEST_ID),
                correlator: Arc::new(Correlator::new()),
                timeout,
            }),
        }
    }

    /// Maximum number of concurrent workers.
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Workers started so far, including any since discarded.
    pub fn spawned(&self) -> usize {
        self.inner.spawned.load(Ordering::SeqCst)
    }

    /// Workers thrown away after a transport failure or timeout.
    pub fn discarded(&self) -> usize {
        self.inner.discarded.load(Ordering::SeqCst)
    }

    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    /// Jobs dispatched and not yet answered.
    pub fn in_flight(&self) -> usize {
        self.inner.correlator.in_flight()
    }

    // -- Dispatch -------------------------------------------------------------

    /// Run one operation on a worker and wait for its result.
    pub async fn dispatch(&self, msg: WorkerMessage) -> Result<WorkerOutput, ScanError> {
        self.dispatch_with(msg, Extra::new())
            .await
            .map(|(output, _)| output)
    }

    /// Like [`dispatch`](Self::dispatch), carrying `extra` fields through to
    /// the response.
    #[instrument(skip_all, fields(op = msg.operation()))]
    pub async fn dispatch_with(
        &self,
        msg: WorkerMessage,
        extra: Extra,
    ) -> Result<(WorkerOutput, Extra), ScanError> {
        let inner = &self.inner;
        let permit = inner
            .permits
            .acquire()
            .await
            .map_err(|_| ScanError::WorkerTransport("worker pool is closed".into()))?;
        let mut lease = Lease::acquire(inner, permit)?;

        let id = inner.next_id.fetch_add(1, Ordering::SeqCst);
        let receiver = inner.correlator.register(id);
        debug!(id, worker = ?lease.index(), "Dispatching job");

        if let Err(err) = lease.send(WorkerRequest { id, msg, extra }) {
            inner.correlator.cancel(id);
            lease.discard();
            return Err(err);
        }

        let response = match inner.timeout {
            Some(limit) => match tokio::time::timeout(limit, receiver).await {
                Ok(received) => received,
                Err(_) => {
                    inner.correlator.cancel(id);
                    lease.discard();
                    warn!(id, timeout_ms = limit.as_millis() as u64, "Job timed out");
                    return Err(ScanError::Timeout(format!(
                        "job {} did not finish within {} ms",
                        id,
                        limit.as_millis()
                    )));
                }
            },
            None => receiver.await,
        };

        match response {
            Ok(response) => response.into_result(),
            Err(_) => {
                lease.discard();
                Err(ScanError::WorkerTransport(format!(
                    "worker dropped job {} without answering",
                    id
                )))
            }
        }
    }

    // -- Typed operations -----------------------------------------------------

    /// Detect the document boundary in `pixels`. The buffer comes back with
    /// the result.
    pub async fn find_document(
        &self,
        pixels: PixelBuffer,
    ) -> Result<(Option<Quad>, PixelBuffer), ScanError> {
        match self.dispatch(WorkerMessage::FindDocument { pixels }).await? {
            WorkerOutput::Boundary { quad, pixels } => Ok((quad, pixels)),
            other => Err(unexpected("find-document", &other)),
        }
    }

    /// Extract `quad` from `pixels`. Returns `(page, source)`.
    pub async fn extract_document(
        &self,
        pixels: PixelBuffer,
        quad: Quad,
        target_width: u32,
        target_height: Option<u32>,
    ) -> Result<(PixelBuffer, PixelBuffer), ScanError> {
        let msg = WorkerMessage::ExtractDocument {
            pixels,
            quad,
            target_width,
            target_height,
        };
        match self.dispatch(msg).await? {
            WorkerOutput::Extracted { page, source } => Ok((page, source)),
            other => Err(unexpected("extract-document", &other)),
        }
    }

    /// Decode an encoded image file on a worker.
    pub async fn get_data(&self, bytes: Vec<u8>) -> Result<PixelBuffer, ScanError> {
        match self.dispatch(WorkerMessage::GetData { bytes }).await? {
            WorkerOutput::Decoded { pixels } => Ok(pixels),
            other => Err(unexpected("get-data", &other)),
        }
    }
}

fn unexpected(operation: &str, output: &WorkerOutput) -> ScanError {
    ScanError::WorkerTransport(format!(
        "{} answered with a {} result",
        operation,
        output.kind()
    ))
}

impl PoolInner {
    fn take_idle(&self) -> Option<WorkerHandle> {
        self.idle.lock().ok().and_then(|mut idle| idle.pop())
    }

    fn spawn_worker(&self) -> Result<WorkerHandle, ScanError> {
        let index = self.spawned.fetch_add(1, Ordering::SeqCst);
        let worker =
            WorkerHandle::spawn(index, Arc::clone(&self.geometry), Arc::clone(&self.correlator))?;
        debug!(index, "Worker spawned");
        Ok(worker)
    }

    fn release(&self, worker: WorkerHandle) {
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(worker);
        }
    }
}

/// A worker checked out for one job, plus the permit that admitted it.
struct Lease<'a> {
    pool: &'a PoolInner,
    worker: Option<WorkerHandle>,
    _permit: SemaphorePermit<'a>,
}

impl<'a> Lease<'a> {
    fn acquire(pool: &'a PoolInner, permit: SemaphorePermit<'a>) -> Result<Self, ScanError> {
        let worker = match pool.take_idle() {
            Some(worker) => worker,
            None => pool.spawn_worker()?,
        };
        Ok(Self {
            pool,
            worker: Some(worker),
            _permit: permit,
        })
    }

    fn index(&self) -> Option<usize> {
        self.worker.as_ref().map(WorkerHandle::index)
    }

    fn send(&self, request: WorkerRequest) -> Result<(), ScanError> {
        match &self.worker {
            Some(worker) => worker.send(request),
            None => Err(ScanError::WorkerTransport(format!(
                "job {} sent on a discarded lease",
                request.id
            ))),
        }
    }

    /// Drop the worker instead of returning it to the idle list.
    fn discard(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.pool.discarded.fetch_add(1, Ordering::SeqCst);
            warn!(index = worker.index(), "Worker discarded");
        }
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.pool.release(worker);
        }
    }
}
