//! Highlight reanchoring
//!
//! Recovers where a highlight should be drawn after the page has re-rendered.
//! A pinned region is authoritative; otherwise the captured text is searched
//! in the page's current text (exact, then case and diacritic insensitive,
//! then by prefix) and mapped back through the page's text layout.

mod layout;
mod locate;
mod overlay;
mod search;

pub use layout::{CharPosition, PageTextLayout, StructuredText, TextLayout, TextLine};
pub use locate::{CapturedHighlight, TextReanchorer};
pub use overlay::{place_annotations, reanchor_pages, Markup, OverlayPage, PagePlacement};
pub use search::{fold, find_text, MatchStrategy, TextMatch, MIN_PREFIX_TARGET_CHARS, PREFIX_CHARS};
