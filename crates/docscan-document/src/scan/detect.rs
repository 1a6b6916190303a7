// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document boundary detection.
//
// Finds the most likely four-corner page outline in a frame, or reports that
// there is none. Runs against live preview frames several times a second, so
// large frames are downsampled first and corners are scaled back afterwards.

use docscan_core::config::ScannerConfig;
use docscan_core::error::ScanError;
use docscan_core::{PixelBuffer, Point, Quad};
use imageproc::contours::{BorderType, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::convex_hull;
use imageproc::morphology::dilate;
use tracing::{debug, info, instrument};

use crate::image::processor::ImageProcessor;

/// Frames smaller than this on either side are not worth analysing.
const MIN_ANALYSIS_DIMENSION: u32 = 8;

/// Dilation applied to the edge map. The traced outer contour runs this many
/// pixels outside the edge it follows.
const DILATION_RADIUS: u8 = 1;

/// Share of each side, at either end, left out of its line fit. Blur rounds
/// the corners off.
const SIDE_TRIM: f64 = 0.15;

/// Fewer contour points than this along a side and its line is not trusted.
const MIN_SIDE_POINTS: usize = 6;

/// Tuning for [`detect_boundary`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectOptions {
    /// Downsample bound applied before analysis.
    pub max_dimension: u32,
    /// Candidates covering less of the frame than this are rejected.
    pub min_area_fraction: f64,
    /// Minimum ratio of quad area to the area of the outline it approximates.
    /// Rounded or ragged shapes fall below it.
    pub min_fill_ratio: f64,
    /// Gaussian blur applied before edge detection.
    pub blur_sigma: f32,
    /// Canny hysteresis thresholds.
    pub canny_low: f32,
    pub canny_high: f32,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            max_dimension: 720,
            min_area_fraction: 0.1,
            min_fill_ratio: 0.85,
            blur_sigma: 2.0,
            canny_low: 50.0,
            canny_high: 150.0,
        }
    }
}

impl DetectOptions {
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self {
            max_dimension: config.detect_max_dimension,
            min_area_fraction: config.min_quad_area_fraction,
            ..Self::default()
        }
    }
}

/// Locate the document boundary in `pixels`.
///
/// ## Pipeline
///
/// 1. Downsample so neither side exceeds `max_dimension`
/// 2. Convert to grayscale and blur to suppress sensor noise
/// 3. Canny edge detection, then a one-pixel dilation to close small gaps
/// 4. Trace outer contours of the edge map
/// 5. Take each contour's convex hull and reduce it to its four dominant
///    vertices
/// 6. Keep the largest candidate that is big enough and quad-shaped enough
/// 7. Refine its corners: fit a line to the contour along the middle of each
///    side and intersect neighbouring lines
///
/// Returns `Ok(None)` when no candidate passes, rather than guessing. The
/// result is deterministic for a given buffer. Corners are ordered top-left,
/// top-right, bottom-right, bottom-left and lie inside the frame.
#[instrument(skip(pixels, options), fields(width = pixels.width(), height = pixels.height()))]
pub fn detect_boundary(
    pixels: &PixelBuffer,
    options: &DetectOptions,
) -> Result<Option<Quad>, ScanError> {
    let processor = ImageProcessor::from_pixels(pixels)?.downscale_to_fit(options.max_dimension);
    let scale = pixels.width() as f64 / processor.width() as f64;
    let gray = processor.to_luma();
    let (w, h) = gray.dimensions();

    if w < MIN_ANALYSIS_DIMENSION || h < MIN_ANALYSIS_DIMENSION {
        debug!(w, h, "Frame too small for detection");
        return Ok(None);
    }

    let blurred = gaussian_blur_f32(&gray, options.blur_sigma);
    let edges = canny(&blurred, options.canny_low, options.canny_high);
    let closed = dilate(&edges, Norm::LInf, DILATION_RADIUS);
    let contours = find_contours::<i32>(&closed);
    debug!(contours = contours.len(), scale, "Contours traced");

    let min_area = options.min_area_fraction * w as f64 * h as f64;
    let mut best: Option<(f64, [Point; 4], usize)> = None;

    for (index, contour) in contours
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c.border_type, BorderType::Outer))
    {
        if contour.points.len() < 4 {
            continue;
        }

        let hull: Vec<Point> = convex_hull(contour.points.as_slice())
            .iter()
            .map(|p| Point::new(p.x as f64, p.y as f64))
            .collect();
        let hull_area = polygon_area(&hull);
        if hull_area < min_area {
            continue;
        }

        let Some(corners) = reduce_to_quad(&hull) else {
            continue;
        };
        let area = polygon_area(&corners);
        if area < min_area || area / hull_area < options.min_fill_ratio {
            continue;
        }

        if best.is_none_or(|(best_area, _, _)| area > best_area) {
            best = Some((area, corners, index));
        }
    }

    match best {
        Some((area, corners, index)) => {
            let outline: Vec<Point> = contours[index]
                .points
                .iter()
                .map(|p| Point::new(p.x as f64, p.y as f64))
                .collect();
            let refined = match refine_corners(&corners, &outline) {
                Some(first) => refine_corners(&first, &outline).unwrap_or(first),
                None => {
                    debug!("Corner refinement failed; keeping hull corners");
                    corners
                }
            };
            // Pixel indices to continuous coordinates (pixel centres).
            let refined = refined.map(|p| Point::new(p.x + 0.5, p.y + 0.5));
            let quad = order_corners(refined)
                .scaled(scale)
                .clamp_to(pixels.width(), pixels.height());
            info!(
                area_fraction = area / (w as f64 * h as f64),
                "Document boundary detected"
            );
            Ok(Some(quad))
        }
        None => {
            debug!("No confident document boundary");
            Ok(None)
        }
    }
}

// -- Polygon helpers ----------------------------------------------------------

/// Unsigned area of a simple polygon (shoelace formula).
fn polygon_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        twice += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    twice.abs() / 2.0
}

/// Area of the triangle `a`, `b`, `c`.
fn triangle_area(a: &Point, b: &Point, c: &Point) -> f64 {
    ((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)).abs() / 2.0
}

/// Reduce a convex polygon to four vertices by repeatedly dropping the vertex
/// whose removal loses the least area.
///
/// Returns `None` for polygons with fewer than four vertices.
fn reduce_to_quad(hull: &[Point]) -> Option<[Point; 4]> {
    if hull.len() < 4 {
        return None;
    }
    let mut points = hull.to_vec();
    while points.len() > 4 {
        let n = points.len();
        let (weakest, _) = (0..n)
            .map(|i| {
                let prev = &points[(i + n - 1) % n];
                let next = &points[(i + 1) % n];
                (i, triangle_area(prev, &points[i], next))
            })
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;
        points.remove(weakest);
    }
    Some([points[0], points[1], points[2], points[3]])
}

/// Straight line through `point` along the unit vector `dir`.
#[derive(Debug, Clone, Copy)]
struct Line {
    point: Point,
    dir: (f64, f64),
}

impl Line {
    /// Move the line `distance` towards `target`, keeping its direction.
    fn shifted_toward(self, target: &Point, distance: f64) -> Self {
        let mut normal = (-self.dir.1, self.dir.0);
        let side = (target.x - self.point.x) * normal.0 + (target.y - self.point.y) * normal.1;
        if side < 0.0 {
            normal = (-normal.0, -normal.1);
        }
        Self {
            point: Point::new(
                self.point.x + normal.0 * distance,
                self.point.y + normal.1 * distance,
            ),
            dir: self.dir,
        }
    }

    fn intersect(&self, other: &Line) -> Option<Point> {
        let cross = self.dir.0 * other.dir.1 - self.dir.1 * other.dir.0;
        if cross.abs() < 1e-9 {
            return None;
        }
        let (wx, wy) = (other.point.x - self.point.x, other.point.y - self.point.y);
        let t = (wx * other.dir.1 - wy * other.dir.0) / cross;
        Some(Point::new(
            self.point.x + t * self.dir.0,
            self.point.y + t * self.dir.1,
        ))
    }
}

/// Total least squares line through `points`.
fn fit_line(points: &[Point]) -> Option<Line> {
    if points.len() < MIN_SIDE_POINTS {
        return None;
    }
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let my = points.iter().map(|p| p.y).sum::<f64>() / n;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for p in points {
        let (dx, dy) = (p.x - mx, p.y - my);
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    Some(Line {
        point: Point::new(mx, my),
        dir: (theta.cos(), theta.sin()),
    })
}

/// Sharpen approximate corners against the contour they came from.
///
/// Side `i` runs from `corners[i]` to `corners[i + 1]`. Contour points near
/// the middle of a side are fitted with a line, which is then pulled in by
/// the dilation radius; corner `i` becomes the intersection of sides `i - 1`
/// and `i`. Returns `None` when a side has too few points, two sides are
/// parallel, or a corner would move implausibly far.
fn refine_corners(corners: &[Point; 4], contour: &[Point]) -> Option<[Point; 4]> {
    let centre = Point::new(
        corners.iter().map(|p| p.x).sum::<f64>() / 4.0,
        corners.iter().map(|p| p.y).sum::<f64>() / 4.0,
    );

    let mut lines = Vec::with_capacity(4);
    let mut shortest = f64::INFINITY;
    for i in 0..4 {
        let (p, q) = (corners[i], corners[(i + 1) % 4]);
        let len = p.distance(&q);
        if len < f64::EPSILON {
            return None;
        }
        shortest = shortest.min(len);
        let (ux, uy) = ((q.x - p.x) / len, (q.y - p.y) / len);
        let band = (0.03 * len).max(3.0);
        let side: Vec<Point> = contour
            .iter()
            .filter(|c| {
                let (rx, ry) = (c.x - p.x, c.y - p.y);
                let t = (rx * ux + ry * uy) / len;
                let offset = (rx * uy - ry * ux).abs();
                (SIDE_TRIM..=1.0 - SIDE_TRIM).contains(&t) && offset <= band
            })
            .copied()
            .collect();
        lines.push(fit_line(&side)?.shifted_toward(&centre, DILATION_RADIUS as f64));
    }

    let mut refined = [Point::default(); 4];
    for i in 0..4 {
        refined[i] = lines[(i + 3) % 4].intersect(&lines[i])?;
    }
    if refined
        .iter()
        .zip(corners.iter())
        .any(|(r, c)| r.distance(c) > 0.25 * shortest)
    {
        return None;
    }
    Some(refined)
}

/// Arrange four corners as top-left, top-right, bottom-right, bottom-left.
///
/// Corners are sorted by angle around their centroid (clockwise on screen,
/// since y grows downward) and rotated so the corner nearest the origin
/// comes first.
fn order_corners(corners: [Point; 4]) -> Quad {
    let cx = corners.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = corners.iter().map(|p| p.y).sum::<f64>() / 4.0;

    let mut sorted = corners;
    sorted.sort_by(|p, q| {
        let ap = (p.y - cy).atan2(p.x - cx);
        let aq = (q.y - cy).atan2(q.x - cx);
        ap.partial_cmp(&aq).unwrap_or(std::cmp::Ordering::Equal)
    });

    let start = (0..4)
        .min_by(|&i, &j| {
            let si = sorted[i].x + sorted[i].y;
            let sj = sorted[j].x + sorted[j].y;
            si.partial_cmp(&sj).unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(0);
    sorted.rotate_left(start);

    Quad::new(sorted[0], sorted[1], sorted[2], sorted[3])
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscan_core::PixelFormat;

    /// Deterministic noisy background with a bright convex quad painted on.
    fn synthetic_scene(width: u32, height: u32, quad: &Quad) -> PixelBuffer {
        let mut seed: u32 = 0x2545_F491;
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        let corners = quad.points();
        for y in 0..height {
            for x in 0..width {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                let noise = (seed >> 24) as i32 % 31 - 15;
                let p = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                let inside = (0..4).all(|i| {
                    let a = corners[i];
                    let b = corners[(i + 1) % 4];
                    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x) >= 0.0
                });
                let base = if inside { 225 } else { 45 };
                let v = (base + noise).clamp(0, 255) as u8;
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        PixelBuffer::new(width, height, PixelFormat::Rgba8, data).unwrap()
    }

    fn assert_corners_near(actual: &Quad, expected: &Quad, tolerance: f64) {
        for (got, want) in actual.points().iter().zip(expected.points().iter()) {
            assert!(
                got.distance(want) <= tolerance,
                "corner {:?} not within {} of {:?} (full quad {:?})",
                got,
                tolerance,
                want,
                actual
            );
        }
    }

    #[test]
    fn blank_frame_has_no_boundary() {
        let pixels = PixelBuffer::filled(200, 300, [200, 200, 200, 255]).unwrap();
        let result = detect_boundary(&pixels, &DetectOptions::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn finds_rectangle_in_noise() {
        let expected = Quad::new(
            Point::new(80.0, 60.0),
            Point::new(320.0, 60.0),
            Point::new(320.0, 240.0),
            Point::new(80.0, 240.0),
        );
        let pixels = synthetic_scene(400, 300, &expected);
        let quad = detect_boundary(&pixels, &DetectOptions::default())
            .unwrap()
            .expect("rectangle should be detected");
        assert_corners_near(&quad, &expected, 6.0);
    }

    #[test]
    fn finds_skewed_quad() {
        let expected = Quad::new(
            Point::new(100.0, 50.0),
            Point::new(330.0, 85.0),
            Point::new(300.0, 265.0),
            Point::new(70.0, 230.0),
        );
        let pixels = synthetic_scene(400, 300, &expected);
        let quad = detect_boundary(&pixels, &DetectOptions::default())
            .unwrap()
            .expect("skewed quad should be detected");
        assert_corners_near(&quad, &expected, 6.0);
    }

    #[test]
    fn downsampled_detection_maps_back_to_full_resolution() {
        let expected = Quad::new(
            Point::new(300.0, 200.0),
            Point::new(1300.0, 200.0),
            Point::new(1300.0, 1000.0),
            Point::new(300.0, 1000.0),
        );
        let pixels = synthetic_scene(1600, 1200, &expected);
        let options = DetectOptions {
            max_dimension: 400,
            ..DetectOptions::default()
        };
        let quad = detect_boundary(&pixels, &options)
            .unwrap()
            .expect("rectangle should be detected");
        assert_corners_near(&quad, &expected, 16.0);
    }

    #[test]
    fn tiny_patch_is_rejected() {
        let speck = Quad::new(
            Point::new(100.0, 100.0),
            Point::new(112.0, 100.0),
            Point::new(112.0, 112.0),
            Point::new(100.0, 112.0),
        );
        let pixels = synthetic_scene(400, 300, &speck);
        assert!(detect_boundary(&pixels, &DetectOptions::default()).unwrap().is_none());
    }

    #[test]
    fn detection_is_deterministic() {
        let expected = Quad::new(
            Point::new(60.0, 40.0),
            Point::new(340.0, 40.0),
            Point::new(340.0, 260.0),
            Point::new(60.0, 260.0),
        );
        let pixels = synthetic_scene(400, 300, &expected);
        let first = detect_boundary(&pixels, &DetectOptions::default()).unwrap();
        let second = detect_boundary(&pixels, &DetectOptions::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn reduce_to_quad_drops_chamfers() {
        // A square with its corners slightly cut off.
        let hull = vec![
            Point::new(2.0, 0.0),
            Point::new(98.0, 0.0),
            Point::new(100.0, 2.0),
            Point::new(100.0, 98.0),
            Point::new(98.0, 100.0),
            Point::new(2.0, 100.0),
            Point::new(0.0, 98.0),
            Point::new(0.0, 2.0),
        ];
        let quad = reduce_to_quad(&hull).unwrap();
        assert!(polygon_area(&quad) > 9_500.0);
        assert!(reduce_to_quad(&hull[..3]).is_none());
    }

    /// Outline of a 100 x 100 square with 6px chamfers, one point per pixel
    /// step, as a contour tracer would report it.
    fn chamfered_square_outline() -> Vec<Point> {
        let mut outline = Vec::new();
        for k in 6..=94 {
            let k = k as f64;
            outline.push(Point::new(k, 0.0));
            outline.push(Point::new(100.0, k));
            outline.push(Point::new(k, 100.0));
            outline.push(Point::new(0.0, k));
        }
        for k in 0..=6 {
            let k = k as f64;
            outline.push(Point::new(94.0 + k, k));
            outline.push(Point::new(100.0 - k, 94.0 + k));
            outline.push(Point::new(6.0 - k, 100.0 - k));
            outline.push(Point::new(k, 6.0 - k));
        }
        outline
    }

    #[test]
    fn refinement_recovers_corners_cut_by_chamfers() {
        // What greedy hull reduction tends to keep: one chamfer vertex per
        // corner, each pulled along a side.
        let rough = [
            Point::new(6.0, 0.0),
            Point::new(100.0, 6.0),
            Point::new(94.0, 100.0),
            Point::new(0.0, 94.0),
        ];
        let refined = refine_corners(&rough, &chamfered_square_outline()).unwrap();

        // Sides sit one dilation radius inside the traced outline.
        let expected = [
            Point::new(1.0, 1.0),
            Point::new(99.0, 1.0),
            Point::new(99.0, 99.0),
            Point::new(1.0, 99.0),
        ];
        for (got, want) in refined.iter().zip(expected.iter()) {
            assert!(got.distance(want) < 1e-6, "{got:?} vs {want:?}");
        }
    }

    #[test]
    fn refinement_needs_points_on_every_side() {
        let rough = [
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ];
        let top_only: Vec<Point> = (10..90).map(|x| Point::new(x as f64, 0.0)).collect();
        assert!(refine_corners(&rough, &top_only).is_none());
        assert!(refine_corners(&rough, &[]).is_none());
    }

    #[test]
    fn clean_rectangle_corners_are_close() {
        let expected = Quad::new(
            Point::new(80.0, 60.0),
            Point::new(320.0, 60.0),
            Point::new(320.0, 240.0),
            Point::new(80.0, 240.0),
        );
        let corners = expected.points();
        let mut data = Vec::with_capacity(400 * 300 * 4);
        for y in 0..300u32 {
            for x in 0..400u32 {
                let inside = (x as f64 + 0.5) >= corners[0].x
                    && (x as f64 + 0.5) <= corners[2].x
                    && (y as f64 + 0.5) >= corners[0].y
                    && (y as f64 + 0.5) <= corners[2].y;
                let v = if inside { 230 } else { 40 };
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        let pixels = PixelBuffer::new(400, 300, PixelFormat::Rgba8, data).unwrap();
        let quad = detect_boundary(&pixels, &DetectOptions::default())
            .unwrap()
            .expect("rectangle should be detected");
        assert_corners_near(&quad, &expected, 2.5);
    }

    #[test]
    fn order_corners_starts_top_left_clockwise() {
        let quad = order_corners([
            Point::new(10.0, 90.0),
            Point::new(90.0, 10.0),
            Point::new(10.0, 10.0),
            Point::new(90.0, 90.0),
        ]);
        assert_eq!(quad.a, Point::new(10.0, 10.0));
        assert_eq!(quad.b, Point::new(90.0, 10.0));
        assert_eq!(quad.c, Point::new(90.0, 90.0));
        assert_eq!(quad.d, Point::new(10.0, 90.0));
    }
}
