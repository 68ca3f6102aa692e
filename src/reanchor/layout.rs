//! Page text layout
//!
//! Structured text as produced by a renderer, and the character-range to
//! page-region lookup built on it. Character offsets count `char`s of the
//! page text, with one `'\n'` between lines.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::annotations::{Rect, SpatialRegion};

/// Character position with bounding box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharPosition {
    pub char: char,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CharPosition {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Text line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLine {
    pub chars: Vec<CharPosition>,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.chars.iter().map(|c| c.char).collect()
    }
}

/// Structured text for one rendered page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredText {
    /// Page index
    pub page_index: usize,
    /// Page width
    pub width: f32,
    /// Page height
    pub height: f32,
    /// Lines in reading order
    pub lines: Vec<TextLine>,
}

/// The document's own text-layout lookup for one page
pub trait TextLayout {
    fn page_index(&self) -> usize;

    /// The page's current text
    fn text(&self) -> &str;

    /// Regions covering the characters in `range`, or `None` if no character
    /// in the range has a box
    fn regions_for_range(&self, range: Range<usize>) -> Option<SpatialRegion>;
}

/// Page text with one optional box per character
#[derive(Debug, Clone, PartialEq)]
pub struct PageTextLayout {
    page_index: usize,
    text: String,
    boxes: Vec<Option<Rect>>,
}

impl PageTextLayout {
    pub fn from_structured(page: &StructuredText) -> Self {
        let mut text = String::new();
        let mut boxes = Vec::new();

        for (i, line) in page.lines.iter().enumerate() {
            if i > 0 {
                text.push('\n');
                boxes.push(None);
            }
            for position in &line.chars {
                text.push(position.char);
                boxes.push(Some(position.rect()));
            }
        }

        Self {
            page_index: page.page_index,
            text,
            boxes,
        }
    }

    /// Fixed-pitch layout: every character is `char_width` wide, lines are
    /// `line_height` apart
    pub fn monospaced(page_index: usize, text: &str, char_width: f32, line_height: f32) -> Self {
        let mut boxes = Vec::with_capacity(text.len());
        let (mut column, mut row) = (0usize, 0usize);

        for c in text.chars() {
            if c == '\n' {
                boxes.push(None);
                column = 0;
                row += 1;
                continue;
            }
            boxes.push(Some(Rect::new(
                column as f32 * char_width,
                row as f32 * line_height,
                char_width,
                line_height,
            )));
            column += 1;
        }

        Self {
            page_index,
            text: text.to_string(),
            boxes,
        }
    }

    pub fn char_count(&self) -> usize {
        self.boxes.len()
    }
}

impl TextLayout for PageTextLayout {
    fn page_index(&self) -> usize {
        self.page_index
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn regions_for_range(&self, range: Range<usize>) -> Option<SpatialRegion> {
        let end = range.end.min(self.boxes.len());
        let start = range.start.min(end);

        // One rect per visual line: merge boxes sharing a baseline
        let mut rects: Vec<Rect> = Vec::new();
        for rect in self.boxes[start..end].iter().flatten() {
            match rects.last_mut() {
                Some(last) if (last.y - rect.y).abs() < 0.5 * rect.height.max(1.0) => {
                    *last = last.union(rect);
                }
                _ => rects.push(*rect),
            }
        }

        if rects.is_empty() {
            None
        } else {
            Some(SpatialRegion::new(self.page_index, rects))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str, y: f32) -> TextLine {
        TextLine {
            chars: text
                .chars()
                .enumerate()
                .map(|(i, c)| CharPosition {
                    char: c,
                    x: i as f32 * 5.0,
                    y,
                    width: 5.0,
                    height: 10.0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_from_structured_joins_lines() {
        let page = StructuredText {
            page_index: 3,
            width: 600.0,
            height: 800.0,
            lines: vec![line("first", 0.0), line("second", 12.0)],
        };

        let layout = PageTextLayout::from_structured(&page);

        assert_eq!(layout.text(), "first\nsecond");
        assert_eq!(layout.char_count(), 12);
        assert_eq!(layout.page_index(), 3);
    }

    #[test]
    fn test_range_spanning_lines_yields_one_rect_per_line() {
        let page = StructuredText {
            page_index: 0,
            width: 600.0,
            height: 800.0,
            lines: vec![line("first", 0.0), line("second", 12.0)],
        };
        let layout = PageTextLayout::from_structured(&page);

        // "rst\nsec"
        let region = layout.regions_for_range(2..9).unwrap();

        assert_eq!(region.rects.len(), 2);
        assert!(region.rects[0].approx_eq(&Rect::new(10.0, 0.0, 15.0, 10.0), 0.01));
        assert!(region.rects[1].approx_eq(&Rect::new(0.0, 12.0, 15.0, 10.0), 0.01));
    }

    #[test]
    fn test_monospaced_layout() {
        let layout = PageTextLayout::monospaced(1, "ab\ncd", 4.0, 8.0);

        let region = layout.regions_for_range(3..5).unwrap();
        assert_eq!(region.page_index, 1);
        assert!(region.rects[0].approx_eq(&Rect::new(0.0, 8.0, 8.0, 8.0), 0.01));
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let layout = PageTextLayout::monospaced(0, "abc", 4.0, 8.0);

        assert!(layout.regions_for_range(2..50).is_some());
        assert!(layout.regions_for_range(10..20).is_none());
        assert!(layout.regions_for_range(1..1).is_none());
    }
}
