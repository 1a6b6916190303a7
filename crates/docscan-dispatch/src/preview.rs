// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Live-preview detection loop.
//
// At most one detection is in flight per preview stream. The next frame is
// requested only after the previous result has arrived, and the loop then
// sleeps for whatever is left of the cadence interval. Cancellation is
// checked before every reschedule; a result that lands after cancellation
// is dropped.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use docscan_core::config::ScannerConfig;
use docscan_core::error::ScanError;
use docscan_core::{PixelBuffer, Quad};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::pool::WorkerPool;

/// Supplies preview frames, e.g. a camera stream.
pub trait FrameSource: Send {
    /// Next frame, or `None` when the stream has ended.
    fn next_frame(&mut self) -> Option<PixelBuffer>;
}

impl<I> FrameSource for I
where
    I: Iterator<Item = PixelBuffer> + Send,
{
    fn next_frame(&mut self) -> Option<PixelBuffer> {
        self.next()
    }
}

/// Loop state owned by one preview stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PreviewState {
    pub cancelled: bool,
    /// Sequence number of the most recent detection request.
    pub last_request_id: u64,
    /// Results actually delivered to the callback.
    pub frames_processed: u64,
}

/// Cloneable remote control for a running [`PreviewLoop`].
#[derive(Debug, Clone)]
pub struct PreviewHandle {
    state: Arc<Mutex<PreviewState>>,
}

impl PreviewHandle {
    /// Stop issuing detection requests. An in-flight request still finishes
    /// but its result is ignored.
    pub fn cancel(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.cancelled = true;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.snapshot().cancelled
    }

    pub fn snapshot(&self) -> PreviewState {
        self.state.lock().map(|s| *s).unwrap_or_default()
    }
}

/// Repeatedly detects the document boundary in frames from a [`FrameSource`].
#[derive(Debug)]
pub struct PreviewLoop {
    pool: WorkerPool,
    interval: Duration,
    state: Arc<Mutex<PreviewState>>,
}

impl PreviewLoop {
    pub fn new(pool: WorkerPool, interval: Duration) -> Self {
        Self {
            pool,
            interval,
            state: Arc::new(Mutex::new(PreviewState::default())),
        }
    }

    pub fn from_config(pool: WorkerPool, config: &ScannerConfig) -> Self {
        Self::new(pool, config.preview_interval())
    }

    pub fn handle(&self) -> PreviewHandle {
        PreviewHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Drive the loop until the source runs dry or the handle is cancelled.
    ///
    /// `on_result` receives the detected quad (or `None`) and the frame it
    /// was found in. Failed detections are logged and skipped; the loop keeps
    /// going. Returns the final state.
    #[instrument(skip_all, fields(interval_ms = self.interval.as_millis() as u64))]
    pub async fn run<S, F>(&self, mut source: S, mut on_result: F) -> Result<PreviewState, ScanError>
    where
        S: FrameSource,
        F: FnMut(Option<Quad>, &PixelBuffer),
    {
        info!("Preview started");
        loop {
            if self.is_cancelled() {
                break;
            }
            let Some(frame) = source.next_frame() else {
                debug!("Frame source ended");
                break;
            };

            let started = Instant::now();
            let request_id = self.begin_request()?;
            let outcome = self.pool.find_document(frame).await;

            if self.is_cancelled() || self.snapshot().last_request_id != request_id {
                debug!(request_id, "Dropping result that arrived after cancellation");
                break;
            }
            match outcome {
                Ok((quad, frame)) => {
                    on_result(quad, &frame);
                    self.update(|s| s.frames_processed += 1)?;
                }
                Err(err) => warn!(request_id, error = %err, "Preview detection failed"),
            }

            let elapsed = started.elapsed();
            let pause = self.interval.saturating_sub(elapsed);
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }

        let state = self.snapshot();
        info!(
            frames = state.frames_processed,
            cancelled = state.cancelled,
            "Preview stopped"
        );
        Ok(state)
    }

    fn is_cancelled(&self) -> bool {
        self.snapshot().cancelled
    }

    fn snapshot(&self) -> PreviewState {
        self.state.lock().map(|s| *s).unwrap_or_default()
    }

    fn begin_request(&self) -> Result<u64, ScanError> {
        self.update(|s| {
            s.last_request_id += 1;
        })?;
        Ok(self.snapshot().last_request_id)
    }

    fn update(&self, apply: impl FnOnce(&mut PreviewState)) -> Result<(), ScanError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ScanError::Cancelled("preview state poisoned".into()))?;
        apply(&mut state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscan_core::Point;
    use docscan_document::DocumentGeometry;

    /// Reports a quad for wide frames and nothing for narrow ones.
    struct ByWidth;

    impl DocumentGeometry for ByWidth {
        fn detect_boundary(&self, pixels: &PixelBuffer) -> Result<Option<Quad>, ScanError> {
            std::thread::sleep(Duration::from_millis(5));
            Ok((pixels.width() > 2).then(|| {
                let p = Point::new(1.0, 1.0);
                Quad::new(p, p, p, p)
            }))
        }

        fn extract_region(
            &self,
            pixels: &PixelBuffer,
            _: &Quad,
            _: u32,
            _: Option<u32>,
        ) -> Result<PixelBuffer, ScanError> {
            Ok(pixels.clone())
        }
    }

    fn pool() -> WorkerPool {
        WorkerPool::with_size(Arc::new(ByWidth), 2, None)
    }

    fn frames(widths: &[u32]) -> impl Iterator<Item = PixelBuffer> + Send + 'static {
        widths
            .to_vec()
            .into_iter()
            .map(|w| PixelBuffer::filled(w, 1, [0, 0, 0, 255]).unwrap())
    }

    #[tokio::test]
    async fn processes_every_frame_until_source_ends() {
        let preview = PreviewLoop::new(pool(), Duration::from_millis(1));
        let mut seen = Vec::new();
        let state = preview
            .run(frames(&[4, 1, 5]), |quad, frame| seen.push((quad.is_some(), frame.width())))
            .await
            .unwrap();

        assert_eq!(seen, vec![(true, 4), (false, 1), (true, 5)]);
        assert_eq!(state.frames_processed, 3);
        assert_eq!(state.last_request_id, 3);
        assert!(!state.cancelled);
    }

    #[tokio::test]
    async fn cancel_stops_new_requests() {
        let preview = PreviewLoop::new(pool(), Duration::from_millis(1));
        let handle = preview.handle();
        let mut delivered = 0;
        let state = preview
            .run(std::iter::repeat_with(|| PixelBuffer::filled(3, 1, [0; 4]).unwrap()), |_, _| {
                delivered += 1;
                if delivered == 2 {
                    handle.cancel();
                }
            })
            .await
            .unwrap();

        assert!(state.cancelled);
        assert_eq!(state.frames_processed, 2);
        assert_eq!(state.last_request_id, 2);
    }

    #[tokio::test]
    async fn cadence_is_respected() {
        let preview = PreviewLoop::new(pool(), Duration::from_millis(30));
        let started = Instant::now();
        preview.run(frames(&[3, 3, 3]), |_, _| {}).await.unwrap();
        // Two full gaps between three requests, plus the trailing pause.
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn result_after_cancellation_is_ignored() {
        let preview = Arc::new(PreviewLoop::new(pool(), Duration::from_millis(1)));
        let handle = preview.handle();
        let runner = {
            let preview = Arc::clone(&preview);
            tokio::spawn(async move {
                let mut delivered = 0u32;
                let state = preview
                    .run(
                        std::iter::repeat_with(|| PixelBuffer::filled(3, 1, [0; 4]).unwrap()),
                        |_, _| delivered += 1,
                    )
                    .await;
                (state, delivered)
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();

        let (state, delivered) = runner.await.unwrap();
        let state = state.unwrap();
        assert!(state.cancelled);
        assert_eq!(state.frames_processed, delivered as u64);
        // Every request except possibly the one cut off was delivered.
        assert!(state.last_request_id - state.frames_processed <= 1);
    }
}
