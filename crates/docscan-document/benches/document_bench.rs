// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the docscan-document crate: boundary detection on
// a preview-sized frame, perspective extraction, and PDF assembly.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use docscan_core::{PixelBuffer, PixelFormat, Point, Quad};
use docscan_document::scan::{DetectOptions, detect_boundary, extract_region};
use docscan_document::{PdfImage, PdfWriter};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Dark frame with a light, slightly skewed page in the middle.
fn preview_frame(width: u32, height: u32) -> (PixelBuffer, Quad) {
    let quad = Quad::new(
        Point::new(width as f64 * 0.22, height as f64 * 0.15),
        Point::new(width as f64 * 0.80, height as f64 * 0.12),
        Point::new(width as f64 * 0.84, height as f64 * 0.88),
        Point::new(width as f64 * 0.18, height as f64 * 0.85),
    );
    let corners = quad.points();
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let inside = (0..4).all(|i| {
                let a = corners[i];
                let b = corners[(i + 1) % 4];
                (b.x - a.x) * (y as f64 - a.y) - (b.y - a.y) * (x as f64 - a.x) >= 0.0
            });
            let v = if inside { 235 } else { 40 };
            data.extend_from_slice(&[v, v, v, 255]);
        }
    }
    let buffer = PixelBuffer::new(width, height, PixelFormat::Rgba8, data)
        .expect("fixture dimensions match");
    (buffer, quad)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// One live-preview detection on a 640x480 frame.
fn bench_detect_boundary(c: &mut Criterion) {
    let (frame, _) = preview_frame(640, 480);
    let options = DetectOptions::default();

    c.bench_function("detect_boundary (640x480)", |b| {
        b.iter(|| black_box(detect_boundary(black_box(&frame), &options)))
    });
}

/// Flatten the skewed page into a 600 pixel wide image.
fn bench_extract_region(c: &mut Criterion) {
    let (frame, quad) = preview_frame(640, 480);

    c.bench_function("extract_region (640x480 -> 600w)", |b| {
        b.iter(|| black_box(extract_region(black_box(&frame), &quad, 600, None)))
    });
}

/// Assemble a three-page PDF from pre-encoded JPEGs, isolating the object
/// writer from JPEG encoding cost.
fn bench_pdf_assembly(c: &mut Criterion) {
    let (frame, _) = preview_frame(320, 240);
    let image = PdfImage::from_pixels(&frame, 85).expect("fixture encodes");
    let pages = vec![image.clone(), image.clone(), image];
    let writer = PdfWriter::default();

    c.bench_function("pdf assembly (3 pages)", |b| {
        b.iter(|| black_box(writer.create_from_jpegs(black_box(&pages))))
    });
}

criterion_group!(
    benches,
    bench_detect_boundary,
    bench_extract_region,
    bench_pdf_assembly
);
criterion_main!(benches);
