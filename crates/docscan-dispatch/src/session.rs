// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capture session: the collaborator-facing entry point.
//
// Holds the ordered page list for one scan. Frames are detected on the pool
// as they arrive; `finish` extracts every page concurrently and encodes the
// PDF on the calling task.

use std::sync::Arc;

use docscan_core::config::ScannerConfig;
use docscan_core::error::ScanError;
use docscan_core::{Page, PageId, PageList, PixelBuffer, Quad};
use docscan_document::{DocumentGeometry, PdfWriter};
use tracing::{info, instrument, warn};

use crate::pool::WorkerPool;

/// Pages collected for one document, plus the machinery to finish it.
#[derive(Debug)]
pub struct CaptureSession {
    pool: WorkerPool,
    writer: PdfWriter,
    output_width: Option<u32>,
    pages: PageList,
}

impl CaptureSession {
    pub fn new(pool: WorkerPool, config: &ScannerConfig) -> Self {
        Self {
            pool,
            writer: PdfWriter::from_config(config),
            output_width: config.output_width,
            pages: PageList::new(),
        }
    }

    /// Session with its own pool built from `config`.
    pub fn with_geometry(geometry: Arc<dyn DocumentGeometry>, config: &ScannerConfig) -> Self {
        Self::new(WorkerPool::new(geometry, config), config)
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn pages(&self) -> &PageList {
        &self.pages
    }

    // -- Adding pages ---------------------------------------------------------

    /// Add a captured frame. Its quad comes from detection, or covers the
    /// whole frame when nothing is found.
    #[instrument(skip_all, fields(width = frame.width(), height = frame.height()))]
    pub async fn add_frame(&mut self, frame: PixelBuffer) -> Result<PageId, ScanError> {
        let (quad, frame) = self.pool.find_document(frame).await?;
        if quad.is_none() {
            warn!("No document boundary found; using the full frame");
        }
        let id = self.pages.push(Page::new(frame, quad));
        info!(page = %id, total = self.pages.len(), "Page added");
        Ok(id)
    }

    /// Decode an uploaded image file on the pool, then add it like a frame.
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    pub async fn add_encoded(&mut self, bytes: Vec<u8>) -> Result<PageId, ScanError> {
        let frame = self.pool.get_data(bytes).await?;
        self.add_frame(frame).await
    }

    /// Add a frame with a quad chosen by the caller; detection is skipped.
    pub fn add_with_quad(&mut self, frame: PixelBuffer, quad: Quad) -> PageId {
        let mut page = Page::new(frame, Some(quad));
        page.detected = false;
        self.pages.push(page)
    }

    // -- Editing --------------------------------------------------------------

    pub fn set_quad(&mut self, id: &PageId, quad: Quad) -> Result<(), ScanError> {
        self.pages.set_quad(id, quad)
    }

    pub fn remove_page(&mut self, id: &PageId) -> Result<Page, ScanError> {
        self.pages
            .remove(id)
            .ok_or_else(|| ScanError::PageNotFound(id.to_string()))
    }

    // -- Finishing ------------------------------------------------------------

    /// Extract every page through the pool and encode the result as a PDF.
    ///
    /// Extraction jobs run concurrently; pages keep their order. On failure
    /// the page list is left as it was so the caller can adjust and retry.
    ///
    /// Unlike detection, this sends each worker a copy of the page buffer
    /// rather than moving it: the session must still own every page if a job
    /// fails. The source buffer a worker hands back is dropped.
    #[instrument(skip(self), fields(pages = self.pages.len()))]
    pub async fn finish(&self) -> Result<Vec<u8>, ScanError> {
        let jobs: Vec<_> = self
            .pages
            .iter()
            .map(|page| {
                let pool = self.pool.clone();
                let pixels = page.data.clone();
                let quad = page.quad;
                let width = self.target_width(&quad);
                tokio::spawn(async move { pool.extract_document(pixels, quad, width, None).await })
            })
            .collect();

        let mut corrected = Vec::with_capacity(jobs.len());
        for (index, job) in jobs.into_iter().enumerate() {
            let (page, _source) = job.await.map_err(|err| {
                ScanError::WorkerTransport(format!("extraction task for page {} failed: {}", index, err))
            })??;
            corrected.push(page);
        }

        let pdf = self.writer.create_from_images(&corrected)?;
        info!(pages = corrected.len(), bytes = pdf.len(), "Session finished");
        Ok(pdf)
    }

    /// Output width for a page: the configured width, or the quad's own
    /// measured width.
    fn target_width(&self, quad: &Quad) -> u32 {
        self.output_width
            .unwrap_or_else(|| quad.measured_size().0.round() as u32)
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscan_core::{PixelFormat, Point};
    use docscan_document::{ContourGeometry, PdfInspector};

    fn config() -> ScannerConfig {
        ScannerConfig {
            pool_size: Some(2),
            ..ScannerConfig::default()
        }
    }

    /// Light page on a dark background, page corners inset by 20%.
    fn scene(width: u32, height: u32) -> PixelBuffer {
        let (x0, x1) = (width / 5, width * 4 / 5);
        let (y0, y1) = (height / 5, height * 4 / 5);
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let v = if (x0..x1).contains(&x) && (y0..y1).contains(&y) { 240 } else { 30 };
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        PixelBuffer::new(width, height, PixelFormat::Rgba8, data).unwrap()
    }

    fn session() -> CaptureSession {
        CaptureSession::with_geometry(Arc::new(ContourGeometry::default()), &config())
    }

    #[tokio::test]
    async fn blank_frame_falls_back_to_full_quad() {
        let mut session = session();
        let id = session
            .add_frame(PixelBuffer::filled(60, 40, [255; 4]).unwrap())
            .await
            .unwrap();
        let page = session.pages().get(&id).unwrap();
        assert!(!page.detected);
        assert_eq!(page.quad, Quad::full_frame(60, 40));
    }

    #[tokio::test]
    async fn detected_page_gets_detected_quad() {
        let mut session = session();
        let id = session.add_frame(scene(200, 150)).await.unwrap();
        let page = session.pages().get(&id).unwrap();
        assert!(page.detected);
        assert!((page.quad.a.x - 40.0).abs() < 6.0, "quad {:?}", page.quad);
        assert!((page.quad.c.y - 120.0).abs() < 6.0, "quad {:?}", page.quad);
    }

    #[tokio::test]
    async fn finish_keeps_page_order_and_sizes() {
        let mut session = CaptureSession::with_geometry(
            Arc::new(ContourGeometry::default()),
            &ScannerConfig {
                output_width: Some(100),
                ..config()
            },
        );
        session.add_with_quad(PixelBuffer::filled(80, 40, [200; 4]).unwrap(), Quad::full_frame(80, 40));
        session.add_with_quad(PixelBuffer::filled(40, 80, [100; 4]).unwrap(), Quad::full_frame(40, 80));
        session.add_with_quad(PixelBuffer::filled(50, 50, [10; 4]).unwrap(), Quad::full_frame(50, 50));

        let pdf = session.finish().await.unwrap();
        let inspector = PdfInspector::from_bytes(&pdf).unwrap();
        assert_eq!(inspector.page_count(), 3);

        let widths: Vec<f64> = inspector
            .media_boxes()
            .unwrap()
            .iter()
            .map(|b| b.width.round())
            .collect();
        assert_eq!(widths, vec![1584.0, 396.0, 792.0]);
        assert_eq!(session.pages().len(), 3, "pages survive finish");
    }

    #[tokio::test]
    async fn failed_finish_leaves_pages_for_retry() {
        let mut session = session();
        let id = session.add_with_quad(
            PixelBuffer::filled(30, 30, [0; 4]).unwrap(),
            Quad::full_frame(30, 30),
        );
        // Bow-tie quad: extraction refuses it.
        session
            .set_quad(
                &id,
                Quad::new(
                    Point::new(0.0, 0.0),
                    Point::new(30.0, 0.0),
                    Point::new(0.0, 30.0),
                    Point::new(30.0, 30.0),
                ),
            )
            .unwrap();

        let err = session.finish().await.unwrap_err();
        assert!(matches!(err, ScanError::DegenerateQuad(_)));
        assert_eq!(session.pages().len(), 1);

        session.set_quad(&id, Quad::full_frame(30, 30)).unwrap();
        assert!(session.finish().await.is_ok());
    }

    #[tokio::test]
    async fn empty_session_produces_empty_pdf() {
        let pdf = session().finish().await.unwrap();
        assert_eq!(PdfInspector::from_bytes(&pdf).unwrap().page_count(), 0);
    }

    #[tokio::test]
    async fn add_encoded_decodes_on_pool() {
        let mut session = session();
        let png = docscan_document::ImageProcessor::from_pixels(&scene(120, 90))
            .unwrap()
            .to_png_bytes()
            .unwrap();
        let id = session.add_encoded(png).await.unwrap();
        assert_eq!(session.pages().get(&id).unwrap().data.width(), 120);
    }

    #[tokio::test]
    async fn remove_unknown_page_fails() {
        let mut session = session();
        let err = session.remove_page(&PageId::new()).unwrap_err();
        assert!(matches!(err, ScanError::PageNotFound(_)));
    }
}
