// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quad editor: drag state machine for the four corners of one page.
//
//   Idle --press on handle / near edge midpoint--> Dragging(corner)
//   Dragging --move--> Dragging   (corner follows pointer, overlay redrawn)
//   Dragging --release anywhere--> Idle
//
// Pressing within the grab threshold of an edge's midpoint drags whichever of
// that edge's two corners is nearer the press, which makes corners easy to
// catch on touch screens.

use docscan_core::config::ScannerConfig;
use docscan_core::error::ScanError;
use docscan_core::{Corner, Point, Quad};
use serde::Serialize;
use tracing::{debug, trace};

use crate::viewport::{ScreenPoint, Viewport};

/// Hit radius of a corner handle in screen pixels.
pub const DEFAULT_HANDLE_RADIUS: f64 = 22.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "corner", rename_all = "lowercase")]
pub enum DragState {
    Idle,
    Dragging(Corner),
}

/// Screen-space geometry to draw for the current quad: the four boundary
/// segments `ab, bc, cd, da` and one handle per corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Overlay {
    pub segments: [(ScreenPoint, ScreenPoint); 4],
    pub handles: [ScreenPoint; 4],
}

/// Receives the overlay whenever it changes.
pub trait RedrawSink {
    fn redraw(&mut self, overlay: &Overlay);
}

impl<F: FnMut(&Overlay)> RedrawSink for F {
    fn redraw(&mut self, overlay: &Overlay) {
        self(overlay)
    }
}

/// Editor for a single page's quad.
#[derive(Debug, Clone)]
pub struct QuadEditor {
    quad: Quad,
    viewport: Viewport,
    state: DragState,
    grab_fraction: f64,
    handle_radius: f64,
}

impl QuadEditor {
    pub fn new(quad: Quad, viewport: Viewport, grab_fraction: f64) -> Self {
        let (w, h) = viewport.image_size();
        Self {
            quad: quad.clamp_to(w, h),
            viewport,
            state: DragState::Idle,
            grab_fraction,
            handle_radius: DEFAULT_HANDLE_RADIUS,
        }
    }

    pub fn from_config(quad: Quad, viewport: Viewport, config: &ScannerConfig) -> Self {
        Self::new(quad, viewport, config.grab_threshold_fraction)
    }

    pub fn with_handle_radius(mut self, radius: f64) -> Self {
        self.handle_radius = radius;
        self
    }

    pub fn quad(&self) -> Quad {
        self.quad
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Current grab threshold in screen pixels.
    pub fn grab_threshold(&self) -> f64 {
        self.viewport.grab_threshold(self.grab_fraction)
    }

    /// Replace the quad outright (e.g. a fresh detection result). Any drag in
    /// progress ends.
    pub fn reset(&mut self, quad: Quad, sink: &mut impl RedrawSink) {
        let (w, h) = self.viewport.image_size();
        self.quad = quad.clamp_to(w, h);
        self.state = DragState::Idle;
        sink.redraw(&self.overlay());
    }

    // -- Pointer events -------------------------------------------------------

    /// Pointer down. Returns the corner now being dragged, if any.
    pub fn press(&mut self, at: ScreenPoint) -> Option<Corner> {
        let grabbed = self.hit_handle(at).or_else(|| self.hit_edge(at));
        if let Some(corner) = grabbed {
            self.state = DragState::Dragging(corner);
            debug!(?corner, x = at.x, y = at.y, "Drag started");
        }
        grabbed
    }

    /// Pointer move. While dragging, moves the corner to the pointer (in
    /// image space, clamped to the image) and redraws. Returns whether the
    /// quad changed.
    pub fn move_to(&mut self, at: ScreenPoint, sink: &mut impl RedrawSink) -> bool {
        let DragState::Dragging(corner) = self.state else {
            return false;
        };
        let (w, h) = self.viewport.image_size();
        let p = self.viewport.to_image(at);
        let clamped = Point::new(p.x.clamp(0.0, w as f64), p.y.clamp(0.0, h as f64));
        *self.quad.corner_mut(corner) = clamped;
        trace!(?corner, x = clamped.x, y = clamped.y, "Corner moved");
        sink.redraw(&self.overlay());
        true
    }

    /// Pointer up or finger lift, anywhere.
    pub fn release(&mut self) -> Option<Corner> {
        let released = match self.state {
            DragState::Dragging(corner) => Some(corner),
            DragState::Idle => None,
        };
        self.state = DragState::Idle;
        if let Some(corner) = released {
            debug!(?corner, "Drag ended");
        }
        released
    }

    /// Viewport changed size. The scale is recomputed before anything else
    /// and the overlay is redrawn at the new positions.
    pub fn resize(
        &mut self,
        width: f64,
        height: f64,
        sink: &mut impl RedrawSink,
    ) -> Result<(), ScanError> {
        self.viewport.resize(width, height)?;
        sink.redraw(&self.overlay());
        Ok(())
    }

    // -- Geometry -------------------------------------------------------------

    pub fn overlay(&self) -> Overlay {
        let handles = self.quad.points().map(|p| self.viewport.to_screen(p));
        Overlay {
            segments: [
                (handles[0], handles[1]),
                (handles[1], handles[2]),
                (handles[2], handles[3]),
                (handles[3], handles[0]),
            ],
            handles,
        }
    }

    fn screen_corner(&self, corner: Corner) -> ScreenPoint {
        self.viewport.to_screen(self.quad.corner(corner))
    }

    /// Nearest corner whose handle contains `at`.
    fn hit_handle(&self, at: ScreenPoint) -> Option<Corner> {
        nearest(
            Corner::ALL
                .into_iter()
                .map(|c| (c, self.screen_corner(c).distance(&at))),
            self.handle_radius,
        )
    }

    /// Edge whose midpoint is within the grab threshold, resolved to the
    /// nearer of its two corners.
    fn hit_edge(&self, at: ScreenPoint) -> Option<Corner> {
        let edge_start = nearest(
            Corner::ALL.into_iter().map(|c| {
                let mid = self.screen_corner(c).midpoint(&self.screen_corner(c.next()));
                (c, mid.distance(&at))
            }),
            self.grab_threshold(),
        )?;
        let edge_end = edge_start.next();
        let to_start = self.screen_corner(edge_start).distance(&at);
        let to_end = self.screen_corner(edge_end).distance(&at);
        Some(if to_end < to_start { edge_end } else { edge_start })
    }
}

/// Candidate with the smallest distance not exceeding `limit`. Ties go to
/// the earlier corner.
fn nearest(candidates: impl Iterator<Item = (Corner, f64)>, limit: f64) -> Option<Corner> {
    candidates
        .filter(|(_, d)| *d <= limit)
        .fold(None, |best: Option<(Corner, f64)>, (c, d)| match best {
            Some((_, bd)) if bd <= d => best,
            _ => Some((c, d)),
        })
        .map(|(c, _)| c)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1000x1000 image shown 1:2 in a 500x500 viewport; quad inset by 100px.
    fn editor() -> QuadEditor {
        let viewport = Viewport::new(1000, 1000, 500.0, 500.0).unwrap();
        let quad = Quad::new(
            Point::new(100.0, 100.0),
            Point::new(900.0, 100.0),
            Point::new(900.0, 900.0),
            Point::new(100.0, 900.0),
        );
        QuadEditor::new(quad, viewport, 0.2)
    }

    #[test]
    fn press_on_handle_drags_that_corner() {
        let mut ed = editor();
        // Corner b at image (900,100) is screen (450,50).
        assert_eq!(ed.press(ScreenPoint::new(445.0, 55.0)), Some(Corner::B));
        assert_eq!(ed.state(), DragState::Dragging(Corner::B));
    }

    #[test]
    fn press_near_edge_midpoint_grabs_nearer_corner() {
        let mut ed = editor();
        // Edge ab runs from screen (50,50) to (450,50), midpoint (250,50).
        // Threshold is 0.2 * 500 = 100. A press at (280,70) is 36px from the
        // midpoint, well off both handles, and closer to b.
        let press = ScreenPoint::new(280.0, 70.0);
        assert!(press.distance(&ScreenPoint::new(450.0, 50.0)) > DEFAULT_HANDLE_RADIUS);
        assert_eq!(ed.press(press), Some(Corner::B));

        ed.release();
        assert_eq!(ed.press(ScreenPoint::new(220.0, 70.0)), Some(Corner::A));
    }

    #[test]
    fn press_far_from_everything_stays_idle() {
        let mut ed = editor();
        // Centre of the quad: 200px from every edge midpoint.
        assert_eq!(ed.press(ScreenPoint::new(250.0, 250.0)), None);
        assert_eq!(ed.state(), DragState::Idle);
        let mut redraws = 0;
        assert!(!ed.move_to(ScreenPoint::new(10.0, 10.0), &mut |_: &Overlay| redraws += 1));
        assert_eq!(redraws, 0);
    }

    #[test]
    fn move_converts_to_image_space_and_redraws() {
        let mut ed = editor();
        ed.press(ScreenPoint::new(50.0, 50.0));

        let mut last: Option<Overlay> = None;
        let moved = ed.move_to(ScreenPoint::new(75.0, 60.0), &mut |o: &Overlay| last = Some(*o));
        assert!(moved);
        assert_eq!(ed.quad().a, Point::new(150.0, 120.0));

        let overlay = last.unwrap();
        assert_eq!(overlay.handles[0], ScreenPoint::new(75.0, 60.0));
        assert_eq!(overlay.segments[0].0, ScreenPoint::new(75.0, 60.0));
        assert_eq!(overlay.segments[3].1, ScreenPoint::new(75.0, 60.0));
    }

    #[test]
    fn moves_are_clamped_to_image() {
        let mut ed = editor();
        ed.press(ScreenPoint::new(450.0, 450.0));
        ed.move_to(ScreenPoint::new(900.0, -40.0), &mut |_: &Overlay| {});
        assert_eq!(ed.quad().c, Point::new(1000.0, 0.0));
    }

    #[test]
    fn release_returns_to_idle() {
        let mut ed = editor();
        ed.press(ScreenPoint::new(50.0, 450.0));
        assert_eq!(ed.release(), Some(Corner::D));
        assert_eq!(ed.state(), DragState::Idle);
        assert_eq!(ed.release(), None);
    }

    #[test]
    fn resize_mid_drag_uses_new_scale() {
        let mut ed = editor();
        ed.press(ScreenPoint::new(50.0, 50.0));

        let mut redrawn = false;
        ed.resize(1000.0, 1000.0, &mut |_: &Overlay| redrawn = true).unwrap();
        assert!(redrawn);
        assert!((ed.viewport().scale() - 1.0).abs() < 1e-12);

        ed.move_to(ScreenPoint::new(300.0, 200.0), &mut |_: &Overlay| {});
        assert_eq!(ed.quad().a, Point::new(300.0, 200.0));
        assert!((ed.grab_threshold() - 200.0).abs() < 1e-12);
    }

    #[test]
    fn handles_win_over_edges() {
        let mut ed = editor();
        // On corner a exactly; also within threshold of edge da's midpoint?
        // No: da midpoint is (50,250), 200px away. Still must pick A.
        assert_eq!(ed.press(ScreenPoint::new(50.0, 50.0)), Some(Corner::A));
    }

    #[test]
    fn drag_state_serialises_with_corner() {
        let json = serde_json::to_value(DragState::Dragging(Corner::C)).unwrap();
        assert_eq!(json, serde_json::json!({"state": "dragging", "corner": "C"}));
    }
}
