// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Docscan pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ScanError};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A point in source-image pixel space (not screen space).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Midpoint of the segment `self`–`other`.
    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Identifies one of the four corners of a [`Quad`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    A,
    B,
    C,
    D,
}

impl Corner {
    pub const ALL: [Corner; 4] = [Corner::A, Corner::B, Corner::C, Corner::D];

    /// The corner following this one in winding order.
    pub fn next(self) -> Corner {
        match self {
            Corner::A => Corner::B,
            Corner::B => Corner::C,
            Corner::C => Corner::D,
            Corner::D => Corner::A,
        }
    }
}

/// Four corners of a document boundary, wound a→b→c→d→a.
///
/// Detected quads use `a` = top-left, `b` = top-right, `c` = bottom-right and
/// `d` = bottom-left. User edits may break that order; nothing here enforces
/// convexity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Quad {
    pub a: Point,
    pub b: Point,
    pub c: Point,
    pub d: Point,
}

impl Quad {
    pub const fn new(a: Point, b: Point, c: Point, d: Point) -> Self {
        Self { a, b, c, d }
    }

    /// A quad covering the whole `width` x `height` image.
    ///
    /// Callers fall back to this when detection finds nothing, so every page
    /// always has a quad to edit.
    pub fn full_frame(width: u32, height: u32) -> Self {
        let (w, h) = (width as f64, height as f64);
        Self {
            a: Point::new(0.0, 0.0),
            b: Point::new(w, 0.0),
            c: Point::new(w, h),
            d: Point::new(0.0, h),
        }
    }

    pub fn corner(&self, corner: Corner) -> Point {
        match corner {
            Corner::A => self.a,
            Corner::B => self.b,
            Corner::C => self.c,
            Corner::D => self.d,
        }
    }

    pub fn corner_mut(&mut self, corner: Corner) -> &mut Point {
        match corner {
            Corner::A => &mut self.a,
            Corner::B => &mut self.b,
            Corner::C => &mut self.c,
            Corner::D => &mut self.d,
        }
    }

    /// Corners in winding order.
    pub fn points(&self) -> [Point; 4] {
        [self.a, self.b, self.c, self.d]
    }

    /// Clamp every corner into `[0, width] x [0, height]`.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let clamp = |p: Point| {
            Point::new(p.x.clamp(0.0, width as f64), p.y.clamp(0.0, height as f64))
        };
        Self {
            a: clamp(self.a),
            b: clamp(self.b),
            c: clamp(self.c),
            d: clamp(self.d),
        }
    }

    /// Scale every coordinate by `factor` (used to map detection results from
    /// a downsampled frame back to full resolution).
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |p: Point| Point::new(p.x * factor, p.y * factor);
        Self {
            a: scale(self.a),
            b: scale(self.b),
            c: scale(self.c),
            d: scale(self.d),
        }
    }

    /// Unsigned polygon area (shoelace formula).
    pub fn area(&self) -> f64 {
        let pts = self.points();
        let mut twice = 0.0;
        for i in 0..4 {
            let j = (i + 1) % 4;
            twice += pts[i].x * pts[j].y - pts[j].x * pts[i].y;
        }
        twice.abs() / 2.0
    }

    /// Lengths of the edges `[ab, bc, cd, da]`.
    pub fn edge_lengths(&self) -> [f64; 4] {
        [
            self.a.distance(&self.b),
            self.b.distance(&self.c),
            self.c.distance(&self.d),
            self.d.distance(&self.a),
        ]
    }

    /// Measured `(width, height)`: the longer of the two opposing edges in
    /// each direction.
    pub fn measured_size(&self) -> (f64, f64) {
        let [ab, bc, cd, da] = self.edge_lengths();
        (ab.max(cd), bc.max(da))
    }

    /// Measured height over measured width, or `None` for a zero-width quad.
    pub fn measured_aspect(&self) -> Option<f64> {
        let (w, h) = self.measured_size();
        (w > f64::EPSILON).then(|| h / w)
    }

    /// True if two opposite edges cross each other (a "bow-tie").
    pub fn is_self_intersecting(&self) -> bool {
        segments_cross(&self.a, &self.b, &self.c, &self.d)
            || segments_cross(&self.b, &self.c, &self.d, &self.a)
    }
}

/// Strict crossing test for segments p1p2 and q1q2 (touching does not count).
fn segments_cross(p1: &Point, p2: &Point, q1: &Point, q2: &Point) -> bool {
    let orient = |a: &Point, b: &Point, c: &Point| -> f64 {
        (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
    };
    let d1 = orient(q1, q2, p1);
    let d2 = orient(q1, q2, p2);
    let d3 = orient(p1, p2, q1);
    let d4 = orient(p1, p2, q2);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

// ---------------------------------------------------------------------------
// Pixel buffers
// ---------------------------------------------------------------------------

/// Sample layout of a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Rgba8,
    Rgb8,
}

impl PixelFormat {
    pub fn channels(&self) -> usize {
        match self {
            Self::Rgba8 => 4,
            Self::Rgb8 => 3,
        }
    }
}

/// Row-major, top-left-origin raster.
///
/// Owned by whichever stage currently holds it. Passing one to a worker moves
/// it; the caller gets it back only through the worker's response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw samples, checking that the length matches the dimensions.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ScanError::InvalidBuffer(format!(
                "dimensions must be non-zero, got {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize * format.channels();
        if data.len() != expected {
            return Err(ScanError::InvalidBuffer(format!(
                "{width}x{height} {format:?} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// A buffer filled with one RGBA colour.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(width, height, PixelFormat::Rgba8, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Samples of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let channels = self.format.channels();
        let start = (y as usize * self.width as usize + x as usize) * channels;
        &self.data[start..start + channels]
    }
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

/// Unique identifier for a captured page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId(pub Uuid);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One captured or uploaded image plus its current boundary quad.
#[derive(Debug, Clone)]
pub struct Page {
    pub id: PageId,
    pub data: PixelBuffer,
    pub quad: Quad,
    /// Whether `quad` came from detection or is the full-frame fallback.
    pub detected: bool,
    pub captured_at: DateTime<Utc>,
}

impl Page {
    /// Create a page; the quad is clamped to the image bounds.
    pub fn new(data: PixelBuffer, quad: Option<Quad>) -> Self {
        let (w, h) = (data.width(), data.height());
        let detected = quad.is_some();
        let quad = quad
            .map(|q| q.clamp_to(w, h))
            .unwrap_or_else(|| Quad::full_frame(w, h));
        Self {
            id: PageId::new(),
            data,
            quad,
            detected,
            captured_at: Utc::now(),
        }
    }
}

/// Ordered, in-memory list of pages awaiting finalisation.
#[derive(Debug, Clone, Default)]
pub struct PageList {
    pages: Vec<Page>,
}

impl PageList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, page: Page) -> PageId {
        let id = page.id;
        self.pages.push(page);
        id
    }

    pub fn get(&self, id: &PageId) -> Option<&Page> {
        self.pages.iter().find(|p| &p.id == id)
    }

    /// Replace a page's quad, clamped to its image bounds.
    pub fn set_quad(&mut self, id: &PageId, quad: Quad) -> Result<()> {
        let page = self
            .pages
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| ScanError::PageNotFound(id.to_string()))?;
        page.quad = quad.clamp_to(page.data.width(), page.data.height());
        Ok(())
    }

    pub fn remove(&mut self, id: &PageId) -> Option<Page> {
        let index = self.pages.iter().position(|p| &p.id == id)?;
        Some(self.pages.remove(index))
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter()
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }
}
