// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Multi-page review strip.
//
// All pages under review are shown side by side, each with its own editor and
// its own quad. Pages are confirmed individually or all at once. Cancelling
// keeps pages that were already confirmed and drops the rest; a confirmed
// page can be reopened for further editing.

use docscan_core::config::ScannerConfig;
use docscan_core::error::ScanError;
use docscan_core::{PageId, PageList, Quad};
use tracing::info;

use crate::editor::{Overlay, QuadEditor};
use crate::viewport::Viewport;

#[derive(Debug, Clone)]
struct ReviewEntry {
    page_id: PageId,
    editor: QuadEditor,
    confirmed: bool,
}

/// Result of closing the review.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewOutcome {
    /// Pages to keep, in strip order, with their committed quads.
    pub kept: Vec<(PageId, Quad)>,
    /// Pages the user discarded by cancelling before confirming them.
    pub dropped: Vec<PageId>,
}

impl ReviewOutcome {
    /// Write the outcome back into the page list: kept pages take their new
    /// quads, dropped pages are removed.
    pub fn apply(&self, pages: &mut PageList) -> Result<(), ScanError> {
        for (id, quad) in &self.kept {
            pages.set_quad(id, *quad)?;
        }
        for id in &self.dropped {
            pages.remove(id);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ReviewStrip {
    entries: Vec<ReviewEntry>,
}

impl ReviewStrip {
    /// One editor per page. Every page gets the same viewport (one cell of
    /// the strip).
    pub fn new(
        pages: &PageList,
        cell_width: f64,
        cell_height: f64,
        config: &ScannerConfig,
    ) -> Result<Self, ScanError> {
        let entries = pages
            .iter()
            .map(|page| {
                let viewport =
                    Viewport::new(page.data.width(), page.data.height(), cell_width, cell_height)?;
                Ok(ReviewEntry {
                    page_id: page.id,
                    editor: QuadEditor::from_config(page.quad, viewport, config),
                    confirmed: false,
                })
            })
            .collect::<Result<Vec<_>, ScanError>>()?;
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn page_ids(&self) -> impl Iterator<Item = PageId> + '_ {
        self.entries.iter().map(|e| e.page_id)
    }

    pub fn editor(&self, index: usize) -> Option<&QuadEditor> {
        self.entries.get(index).map(|e| &e.editor)
    }

    pub fn editor_mut(&mut self, index: usize) -> Option<&mut QuadEditor> {
        self.entries.get_mut(index).map(|e| &mut e.editor)
    }

    pub fn is_confirmed(&self, index: usize) -> bool {
        self.entries.get(index).is_some_and(|e| e.confirmed)
    }

    pub fn confirm(&mut self, index: usize) -> Result<(), ScanError> {
        self.entry_mut(index)?.confirmed = true;
        Ok(())
    }

    pub fn reopen(&mut self, index: usize) -> Result<(), ScanError> {
        self.entry_mut(index)?.confirmed = false;
        Ok(())
    }

    /// Resize every cell of the strip.
    pub fn resize(&mut self, cell_width: f64, cell_height: f64) -> Result<(), ScanError> {
        for entry in &mut self.entries {
            entry.editor.resize(cell_width, cell_height, &mut |_: &Overlay| {})?;
        }
        Ok(())
    }

    /// "Done": every page is kept with its current quad.
    pub fn confirm_all(self) -> ReviewOutcome {
        let kept: Vec<_> = self
            .entries
            .into_iter()
            .map(|e| (e.page_id, e.editor.quad()))
            .collect();
        info!(kept = kept.len(), "Review confirmed");
        ReviewOutcome {
            kept,
            dropped: Vec::new(),
        }
    }

    /// "Cancel": confirmed pages survive, the rest are dropped.
    pub fn cancel(self) -> ReviewOutcome {
        let (confirmed, unconfirmed): (Vec<_>, Vec<_>) =
            self.entries.into_iter().partition(|e| e.confirmed);
        let outcome = ReviewOutcome {
            kept: confirmed
                .into_iter()
                .map(|e| (e.page_id, e.editor.quad()))
                .collect(),
            dropped: unconfirmed.into_iter().map(|e| e.page_id).collect(),
        };
        info!(
            kept = outcome.kept.len(),
            dropped = outcome.dropped.len(),
            "Review cancelled"
        );
        outcome
    }

    fn entry_mut(&mut self, index: usize) -> Result<&mut ReviewEntry, ScanError> {
        let len = self.entries.len();
        self.entries.get_mut(index).ok_or_else(|| {
            ScanError::PageNotFound(format!("review index {} out of range ({} pages)", index, len))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::ScreenPoint;
    use docscan_core::{Page, PixelBuffer, Point};

    fn pages(n: usize) -> PageList {
        let mut list = PageList::new();
        for _ in 0..n {
            list.push(Page::new(PixelBuffer::filled(100, 100, [255; 4]).unwrap(), None));
        }
        list
    }

    fn drag_corner_a(strip: &mut ReviewStrip, index: usize, to: ScreenPoint) {
        let editor = strip.editor_mut(index).unwrap();
        editor.press(ScreenPoint::new(0.0, 0.0)).unwrap();
        editor.move_to(to, &mut |_: &Overlay| {});
        editor.release();
    }

    #[test]
    fn each_page_has_independent_quad() {
        let list = pages(3);
        let mut strip = ReviewStrip::new(&list, 100.0, 100.0, &ScannerConfig::default()).unwrap();
        drag_corner_a(&mut strip, 1, ScreenPoint::new(20.0, 10.0));

        assert_eq!(strip.editor(0).unwrap().quad().a, Point::new(0.0, 0.0));
        assert_eq!(strip.editor(1).unwrap().quad().a, Point::new(20.0, 10.0));
        assert_eq!(strip.editor(2).unwrap().quad().a, Point::new(0.0, 0.0));
    }

    #[test]
    fn confirm_all_commits_every_quad() {
        let mut list = pages(2);
        let mut strip = ReviewStrip::new(&list, 100.0, 100.0, &ScannerConfig::default()).unwrap();
        drag_corner_a(&mut strip, 0, ScreenPoint::new(5.0, 5.0));

        let outcome = strip.confirm_all();
        assert_eq!(outcome.kept.len(), 2);
        outcome.apply(&mut list).unwrap();
        assert_eq!(list.iter().next().unwrap().quad.a, Point::new(5.0, 5.0));
    }

    #[test]
    fn cancel_keeps_previously_confirmed_pages() {
        let mut list = pages(3);
        let ids: Vec<_> = list.iter().map(|p| p.id).collect();
        let mut strip = ReviewStrip::new(&list, 100.0, 100.0, &ScannerConfig::default()).unwrap();
        strip.confirm(0).unwrap();
        strip.confirm(1).unwrap();
        strip.reopen(1).unwrap();

        let outcome = strip.cancel();
        assert_eq!(outcome.kept.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![ids[0]]);
        assert_eq!(outcome.dropped, vec![ids[1], ids[2]]);

        outcome.apply(&mut list).unwrap();
        assert_eq!(list.len(), 1);
        assert!(list.get(&ids[0]).is_some());
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let mut strip = ReviewStrip::new(&pages(1), 50.0, 50.0, &ScannerConfig::default()).unwrap();
        assert!(matches!(strip.confirm(3), Err(ScanError::PageNotFound(_))));
        assert!(!strip.is_confirmed(3));
    }

    #[test]
    fn resize_applies_to_every_cell() {
        let mut strip = ReviewStrip::new(&pages(2), 50.0, 50.0, &ScannerConfig::default()).unwrap();
        strip.resize(200.0, 200.0).unwrap();
        for i in 0..2 {
            assert!((strip.editor(i).unwrap().viewport().scale() - 0.5).abs() < 1e-12);
        }
    }
}
