//! Annotation data model
//!
//! Highlights, notes, the per-document personal record and the reading
//! position, in the shape shared by the local cache and the remote store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Records that merge by a stable, author-assigned id
pub trait Identified {
    fn id(&self) -> &str;
}

/// Records that merge by whole-record last-writer-wins
pub trait Timestamped {
    fn updated_at(&self) -> DateTime<Utc>;
}

/// Page-relative rectangle in page coordinates (points, origin top-left)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    /// Equality within `tolerance` on every edge
    pub fn approx_eq(&self, other: &Rect, tolerance: f32) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.width - other.width).abs() <= tolerance
            && (self.height - other.height).abs() <= tolerance
    }
}

/// A drawable region: one or more rectangles on a single page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialRegion {
    pub page_index: usize,
    pub rects: Vec<Rect>,
}

impl SpatialRegion {
    pub fn new(page_index: usize, rects: Vec<Rect>) -> Self {
        Self { page_index, rects }
    }

    /// Union of all rectangles, `None` for an empty region
    pub fn bounds(&self) -> Option<Rect> {
        let mut rects = self.rects.iter();
        let first = *rects.next()?;
        Some(rects.fold(first, |acc, r| acc.union(r)))
    }
}

/// A rectangle pinned at creation time, authoritative until the page reflows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinnedRegion {
    pub page_index: usize,
    pub rect: Rect,
}

/// Best-effort logical location; may go stale when the document re-renders
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalAnchor {
    /// Start character offset within the page (or chapter) text
    pub start: usize,
    /// End character offset, exclusive
    pub end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

impl LogicalAnchor {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            chapter: None,
            page: None,
        }
    }

    pub fn on_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn in_chapter(mut self, chapter: &str) -> Self {
        self.chapter = Some(chapter.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Highlight colors offered by the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    #[default]
    Yellow,
    Green,
    Blue,
    Pink,
    Purple,
}

impl HighlightColor {
    pub fn hex(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "#ffeb3b",
            HighlightColor::Green => "#a5d6a7",
            HighlightColor::Blue => "#90caf9",
            HighlightColor::Pink => "#f48fb1",
            HighlightColor::Purple => "#ce93d8",
        }
    }
}

/// A highlight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Globally unique, assigned by the author at creation (merge key)
    pub id: String,
    pub document_id: String,
    /// The highlighted text as captured at creation
    pub text: String,
    pub anchor: LogicalAnchor,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pinned_regions: Vec<PinnedRegion>,
    #[serde(default)]
    pub color: HighlightColor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Annotation {
    /// Create a new highlight with a fresh id
    pub fn new_highlight(document_id: &str, text: &str, anchor: LogicalAnchor) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            text: text.to_string(),
            anchor,
            pinned_regions: Vec::new(),
            color: HighlightColor::default(),
            note: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_color(mut self, color: HighlightColor) -> Self {
        self.color = color;
        self
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }

    pub fn with_pinned_regions(mut self, regions: Vec<PinnedRegion>) -> Self {
        self.pinned_regions = regions;
        self
    }

    /// Pinned rectangles for `page_index`, if any were recorded
    pub fn pinned_region_for(&self, page_index: usize) -> Option<SpatialRegion> {
        let rects: Vec<Rect> = self
            .pinned_regions
            .iter()
            .filter(|r| r.page_index == page_index)
            .map(|r| r.rect)
            .collect();

        if rects.is_empty() {
            None
        } else {
            Some(SpatialRegion::new(page_index, rects))
        }
    }

    /// Pages this highlight is expected on: pinned pages, else the anchor page
    pub fn pages(&self) -> Vec<usize> {
        let mut pages: Vec<usize> = self.pinned_regions.iter().map(|r| r.page_index).collect();
        pages.sort_unstable();
        pages.dedup();

        if pages.is_empty() {
            pages.extend(self.anchor.page);
        }
        pages
    }
}

impl Identified for Annotation {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A free-text note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<LogicalAnchor>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Note {
    pub fn new(title: &str, body: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            body: body.to_string(),
            anchor: None,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn anchored(mut self, anchor: LogicalAnchor) -> Self {
        self.anchor = Some(anchor);
        self
    }
}

impl Identified for Note {
    fn id(&self) -> &str {
        &self.id
    }
}

/// One entry of the reading journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn new(body: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// The reader's own summary of a document. One per document; merged as a
/// whole by `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalRecord {
    pub document_id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub takeaways: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<String>,
    #[serde(default)]
    pub journal: Vec<JournalEntry>,
    pub updated_at: DateTime<Utc>,
}

impl PersonalRecord {
    pub fn new(document_id: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            summary: String::new(),
            takeaways: Vec::new(),
            action_items: Vec::new(),
            journal: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Bump the record timestamp after an edit
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Timestamped for PersonalRecord {
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Where the reader left off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingPosition {
    pub document_id: String,
    /// Normalized progress in [0, 1]
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_index: Option<usize>,
    pub saved_at: DateTime<Utc>,
}

impl ReadingPosition {
    pub fn new(document_id: &str, progress: f64, page_index: Option<usize>) -> Self {
        let progress = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };

        Self {
            document_id: document_id.to_string(),
            progress,
            page_index,
            saved_at: Utc::now(),
        }
    }
}

impl Timestamped for ReadingPosition {
    fn updated_at(&self) -> DateTime<Utc> {
        self.saved_at
    }
}

/// Everything kept per user and document, as cached locally or delivered by
/// a remote snapshot
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecords {
    pub document_id: String,
    #[serde(default)]
    pub highlights: Vec<Annotation>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal: Option<PersonalRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<ReadingPosition>,
}

impl DocumentRecords {
    pub fn empty(document_id: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_highlight() {
        let anchor = LogicalAnchor::new(10, 25).on_page(3);
        let highlight = Annotation::new_highlight("doc-1", "hello world", anchor)
            .with_color(HighlightColor::Blue)
            .with_note("check this");

        assert_eq!(highlight.document_id, "doc-1");
        assert_eq!(highlight.color.hex(), "#90caf9");
        assert_eq!(highlight.anchor.len(), 15);
        assert_eq!(highlight.pages(), vec![3]);
        assert!(Uuid::parse_str(&highlight.id).is_ok());
    }

    #[test]
    fn test_pinned_region_for_page() {
        let highlight = Annotation::new_highlight("doc-1", "text", LogicalAnchor::new(0, 4))
            .with_pinned_regions(vec![
                PinnedRegion {
                    page_index: 2,
                    rect: Rect::new(10.0, 10.0, 50.0, 12.0),
                },
                PinnedRegion {
                    page_index: 2,
                    rect: Rect::new(10.0, 24.0, 30.0, 12.0),
                },
                PinnedRegion {
                    page_index: 3,
                    rect: Rect::new(10.0, 10.0, 5.0, 12.0),
                },
            ]);

        let region = highlight.pinned_region_for(2).unwrap();
        assert_eq!(region.rects.len(), 2);
        assert_eq!(region.bounds().unwrap(), Rect::new(10.0, 10.0, 50.0, 26.0));
        assert!(highlight.pinned_region_for(7).is_none());
        assert_eq!(highlight.pages(), vec![2, 3]);
    }

    #[test]
    fn test_reading_position_is_clamped() {
        assert_eq!(ReadingPosition::new("d", 1.7, None).progress, 1.0);
        assert_eq!(ReadingPosition::new("d", -0.2, None).progress, 0.0);
        assert_eq!(ReadingPosition::new("d", f64::NAN, None).progress, 0.0);
        assert_eq!(ReadingPosition::new("d", 0.42, Some(12)).progress, 0.42);
    }

    #[test]
    fn test_serialization_uses_camel_case() {
        let highlight = Annotation::new_highlight("doc-1", "alpha", LogicalAnchor::new(0, 5));
        let json = serde_json::to_string(&highlight).unwrap();

        assert!(json.contains("\"documentId\":\"doc-1\""));
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"color\":\"yellow\""));
        assert!(!json.contains("pinnedRegions"));

        let parsed: Annotation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, highlight);
    }
}
