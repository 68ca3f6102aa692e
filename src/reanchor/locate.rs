//! Relocating highlights on a page

use crate::annotations::{Annotation, LogicalAnchor, PinnedRegion, SpatialRegion};

use super::layout::TextLayout;
use super::search::{find_text, TextMatch};

/// Anchor derived for a freshly captured selection
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedHighlight {
    /// Best-effort character offsets, `None` if the page text didn't contain
    /// the selection
    pub anchor: Option<LogicalAnchor>,
    /// The live selection's own regions
    pub pinned: Vec<PinnedRegion>,
}

/// Stateless highlight locator
#[derive(Debug, Clone, Copy, Default)]
pub struct TextReanchorer;

impl TextReanchorer {
    pub fn new() -> Self {
        Self
    }

    /// Region to draw `target` on `page`.
    ///
    /// A pinned region is returned as-is. Otherwise the page text is searched
    /// and the match translated through the page's layout. Not finding the
    /// text is not an error: the highlight is skipped on this page.
    pub fn locate<L: TextLayout + ?Sized>(
        &self,
        target: &str,
        page: &L,
        pinned: Option<&SpatialRegion>,
    ) -> Option<SpatialRegion> {
        if let Some(region) = pinned {
            return Some(region.clone());
        }

        let Some(found) = self.find_range(target, page.text()) else {
            tracing::debug!(page = page.page_index(), "Highlight text not found on page");
            return None;
        };

        page.regions_for_range(found.range)
    }

    /// Character range of `target` in `page_text`
    pub fn find_range(&self, target: &str, page_text: &str) -> Option<TextMatch> {
        find_text(target, page_text)
    }

    /// Region for an annotation on `page`, preferring its pinned rects
    pub fn locate_annotation<L: TextLayout + ?Sized>(
        &self,
        annotation: &Annotation,
        page: &L,
    ) -> Option<SpatialRegion> {
        let pinned = annotation.pinned_region_for(page.page_index());
        self.locate(&annotation.text, page, pinned.as_ref())
    }

    /// Derive a logical anchor for a new selection and pin its regions
    pub fn capture<L: TextLayout + ?Sized>(
        &self,
        selection_text: &str,
        selection_regions: &[SpatialRegion],
        page: &L,
        chapter: Option<&str>,
    ) -> CapturedHighlight {
        let anchor = self
            .find_range(selection_text, page.text())
            .map(|found| {
                let anchor = LogicalAnchor::new(found.range.start, found.range.end)
                    .on_page(page.page_index());
                match chapter {
                    Some(chapter) => anchor.in_chapter(chapter),
                    None => anchor,
                }
            });

        let pinned = selection_regions
            .iter()
            .flat_map(|region| {
                region.rects.iter().map(|rect| PinnedRegion {
                    page_index: region.page_index,
                    rect: *rect,
                })
            })
            .collect();

        CapturedHighlight { anchor, pinned }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::Rect;
    use crate::reanchor::layout::PageTextLayout;

    #[test]
    fn test_case_insensitive_locate() {
        let page = PageTextLayout::monospaced(0, "...alpha appears here...", 5.0, 10.0);

        let region = TextReanchorer::new().locate("Alpha", &page, None).unwrap();

        assert_eq!(region.page_index, 0);
        assert!(region.rects[0].approx_eq(&Rect::new(15.0, 0.0, 25.0, 10.0), 0.01));
    }

    #[test]
    fn test_missing_text_is_soft_failure() {
        let page = PageTextLayout::monospaced(0, "some unrelated text", 5.0, 10.0);

        assert!(TextReanchorer::new()
            .locate("zzz-not-present", &page, None)
            .is_none());
    }

    #[test]
    fn test_pinned_region_is_returned_unchanged() {
        let page = PageTextLayout::monospaced(2, "alpha", 5.0, 10.0);
        let pinned = SpatialRegion::new(2, vec![Rect::new(100.0, 200.0, 30.0, 12.0)]);

        let region = TextReanchorer::new()
            .locate("alpha", &page, Some(&pinned))
            .unwrap();

        assert_eq!(region, pinned);
    }

    #[test]
    fn test_locate_annotation_prefers_pinned_rects_for_page() {
        let page = PageTextLayout::monospaced(1, "alpha beta", 5.0, 10.0);
        let pinned_rect = Rect::new(1.0, 2.0, 3.0, 4.0);
        let annotation = Annotation::new_highlight("doc-1", "beta", LogicalAnchor::new(6, 10))
            .with_pinned_regions(vec![PinnedRegion {
                page_index: 1,
                rect: pinned_rect,
            }]);
        let reanchorer = TextReanchorer::new();

        let on_pinned_page = reanchorer.locate_annotation(&annotation, &page).unwrap();
        assert_eq!(on_pinned_page.rects, vec![pinned_rect]);

        let other_page = PageTextLayout::monospaced(4, "beta again", 5.0, 10.0);
        let searched = reanchorer.locate_annotation(&annotation, &other_page).unwrap();
        assert!(searched.rects[0].approx_eq(&Rect::new(0.0, 0.0, 20.0, 10.0), 0.01));
    }

    #[test]
    fn test_capture_derives_anchor_and_pins_selection() {
        let page = PageTextLayout::monospaced(7, "Intro. The Selected words.", 5.0, 10.0);
        let selection = vec![SpatialRegion::new(
            7,
            vec![Rect::new(35.0, 0.0, 60.0, 10.0), Rect::new(0.0, 10.0, 20.0, 10.0)],
        )];

        let captured =
            TextReanchorer::new().capture("the selected", &selection, &page, Some("ch-2"));

        let anchor = captured.anchor.unwrap();
        assert_eq!((anchor.start, anchor.end), (7, 19));
        assert_eq!(anchor.page, Some(7));
        assert_eq!(anchor.chapter.as_deref(), Some("ch-2"));
        assert_eq!(captured.pinned.len(), 2);
    }

    #[test]
    fn test_capture_without_text_match_still_pins() {
        let page = PageTextLayout::monospaced(0, "nothing relevant", 5.0, 10.0);
        let selection = vec![SpatialRegion::new(0, vec![Rect::new(0.0, 0.0, 5.0, 5.0)])];

        let captured = TextReanchorer::new().capture("image caption", &selection, &page, None);

        assert!(captured.anchor.is_none());
        assert_eq!(captured.pinned.len(), 1);
    }
}
