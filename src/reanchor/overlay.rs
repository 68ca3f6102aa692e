//! Overlay markup and per-page batch reanchoring

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinError;

use crate::annotations::{Annotation, HighlightColor, Rect};
use crate::transfer::UiDispatcher;

use super::layout::{PageTextLayout, TextLayout};
use super::locate::TextReanchorer;

/// Bounds closer than this are the same markup
const BOUNDS_TOLERANCE: f32 = 0.5;

/// One drawn rectangle on a page
#[derive(Debug, Clone, PartialEq)]
pub struct Markup {
    pub annotation_id: String,
    pub bounds: Rect,
    pub caption: Option<String>,
    pub color: HighlightColor,
}

impl Markup {
    /// Whether placing `self` should remove `existing`
    fn supersedes(&self, existing: &Markup) -> bool {
        existing.bounds.approx_eq(&self.bounds, BOUNDS_TOLERANCE)
            && (existing.caption.is_none() || existing.caption == self.caption)
    }
}

/// Markup currently drawn on one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayPage {
    pub page_index: usize,
    markups: Vec<Markup>,
}

impl OverlayPage {
    pub fn new(page_index: usize) -> Self {
        Self {
            page_index,
            markups: Vec::new(),
        }
    }

    /// Draw `markup`, first removing markup at the same bounds with the same
    /// or no caption. Returns how many were removed.
    pub fn place(&mut self, markup: Markup) -> usize {
        let before = self.markups.len();
        self.markups.retain(|existing| !markup.supersedes(existing));
        let removed = before - self.markups.len();
        self.markups.push(markup);
        removed
    }

    /// Apply a whole batch in one pass
    pub fn apply(&mut self, placement: PagePlacement) -> usize {
        placement
            .markups
            .into_iter()
            .map(|markup| self.place(markup))
            .sum()
    }

    pub fn markups(&self) -> &[Markup] {
        &self.markups
    }

    pub fn len(&self) -> usize {
        self.markups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markups.is_empty()
    }
}

/// Markup recovered for one page, applied together
#[derive(Debug, Clone, PartialEq)]
pub struct PagePlacement {
    pub page_index: usize,
    pub markups: Vec<Markup>,
}

/// Compute placements for every page, grouped per page.
///
/// An annotation is tried on the pages it was pinned or anchored to, or on
/// every page when it records neither. Pages where nothing was found are
/// left out.
pub fn place_annotations(
    annotations: &[Annotation],
    pages: &[PageTextLayout],
) -> Vec<PagePlacement> {
    let reanchorer = TextReanchorer::new();
    let mut by_page: BTreeMap<usize, Vec<Markup>> = BTreeMap::new();

    for page in pages {
        let page_index = page.page_index();
        for annotation in annotations {
            let expected = annotation.pages();
            if !expected.is_empty() && !expected.contains(&page_index) {
                continue;
            }

            let Some(region) = reanchorer.locate_annotation(annotation, page) else {
                continue;
            };

            by_page
                .entry(page_index)
                .or_default()
                .extend(region.rects.into_iter().map(|bounds| Markup {
                    annotation_id: annotation.id.clone(),
                    bounds,
                    caption: annotation.note.clone(),
                    color: annotation.color,
                }));
        }
    }

    by_page
        .into_iter()
        .map(|(page_index, markups)| PagePlacement {
            page_index,
            markups,
        })
        .collect()
}

/// Reanchor `annotations` against `pages` on a blocking worker and hand one
/// batch per page to `apply` on the UI-affine context.
///
/// Returns the number of batches dispatched.
pub async fn reanchor_pages<F>(
    annotations: Vec<Annotation>,
    pages: Vec<PageTextLayout>,
    dispatcher: Arc<dyn UiDispatcher>,
    apply: F,
) -> Result<usize, JoinError>
where
    F: Fn(PagePlacement) + Send + Sync + 'static,
{
    let page_count = pages.len();
    let placements =
        tokio::task::spawn_blocking(move || place_annotations(&annotations, &pages)).await?;

    tracing::debug!(
        pages = page_count,
        batches = placements.len(),
        "Reanchored annotations"
    );

    let apply = Arc::new(apply);
    let batches = placements.len();
    for placement in placements {
        let apply = Arc::clone(&apply);
        dispatcher.dispatch(Box::new(move || (*apply)(placement)));
    }

    Ok(batches)
}
