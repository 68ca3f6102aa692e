//! Ordered text search strategies
//!
//! Ranges are character offsets into the page text, matching the layout's
//! per-character boxes.

use std::ops::Range;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Targets longer than this fall back to matching their prefix
pub const MIN_PREFIX_TARGET_CHARS: usize = 50;

/// Characters of the target used by the prefix strategy
pub const PREFIX_CHARS: usize = 50;

/// Which strategy located the text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Exact,
    /// Case, diacritic and whitespace-run insensitive
    Insensitive,
    /// Insensitive match on the leading characters of a long target
    Prefix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMatch {
    pub range: Range<usize>,
    pub strategy: MatchStrategy,
}

/// Search `page_text` for `target`, trying each strategy in order
pub fn find_text(target: &str, page_text: &str) -> Option<TextMatch> {
    if target.trim().is_empty() {
        return None;
    }

    if let Some(byte_start) = page_text.find(target) {
        let start = page_text[..byte_start].chars().count();
        return Some(TextMatch {
            range: start..start + target.chars().count(),
            strategy: MatchStrategy::Exact,
        });
    }

    let page = FoldedText::new(page_text);
    let folded_target = FoldedText::new(target);

    if let Some(range) = page.find(&folded_target.chars) {
        return Some(TextMatch {
            range,
            strategy: MatchStrategy::Insensitive,
        });
    }

    let target_chars = target.chars().count();
    if target_chars > MIN_PREFIX_TARGET_CHARS {
        let prefix: String = target.chars().take(PREFIX_CHARS).collect();
        let folded_prefix = FoldedText::new(&prefix);

        if let Some(range) = page.find(&folded_prefix.chars) {
            // Cover the target's length where the page allows it
            let end = (range.start + target_chars).min(page.source_chars);
            return Some(TextMatch {
                range: range.start..end.max(range.end),
                strategy: MatchStrategy::Prefix,
            });
        }
    }

    None
}

/// Normalize text for insensitive comparison (NFKD, no combining marks,
/// lowercase, single spaces)
pub fn fold(text: &str) -> String {
    FoldedText::new(text).chars.into_iter().collect()
}

/// Folded text that remembers the source character each folded one came from
struct FoldedText {
    chars: Vec<char>,
    origins: Vec<usize>,
    source_chars: usize,
}

impl FoldedText {
    fn new(text: &str) -> Self {
        let mut chars = Vec::new();
        let mut origins = Vec::new();
        let mut source_chars = 0;
        let mut in_space = true;

        for (index, c) in text.chars().enumerate() {
            source_chars = index + 1;

            if c.is_whitespace() {
                if !in_space {
                    chars.push(' ');
                    origins.push(index);
                    in_space = true;
                }
                continue;
            }

            for decomposed in std::iter::once(c).nfkd().filter(|d| !is_combining_mark(*d)) {
                for lower in decomposed.to_lowercase() {
                    chars.push(lower);
                    origins.push(index);
                }
                in_space = false;
            }
        }

        if chars.last() == Some(&' ') {
            chars.pop();
            origins.pop();
        }

        Self {
            chars,
            origins,
            source_chars,
        }
    }

    /// Source character range of the first occurrence of `needle`
    fn find(&self, needle: &[char]) -> Option<Range<usize>> {
        if needle.is_empty() || needle.len() > self.chars.len() {
            return None;
        }

        let start = self
            .chars
            .windows(needle.len())
            .position(|window| window == needle)?;
        let last = start + needle.len() - 1;

        Some(self.origins[start]..self.origins[last] + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold() {
        assert_eq!(fold("Hello World"), "hello world");
        assert_eq!(fold("Café"), "cafe");
        assert_eq!(fold("  spread \n\t out  "), "spread out");
        assert_eq!(fold("ﬁne"), "fine");
    }

    #[test]
    fn test_exact_match_comes_first() {
        let found = find_text("alpha", "the alpha and Alpha").unwrap();

        assert_eq!(found.strategy, MatchStrategy::Exact);
        assert_eq!(found.range, 4..9);
    }

    #[test]
    fn test_case_insensitive_match() {
        let found = find_text("Alpha", "...alpha appears here...").unwrap();

        assert_eq!(found.strategy, MatchStrategy::Insensitive);
        assert_eq!(found.range, 3..8);
    }

    #[test]
    fn test_diacritic_insensitive_match_maps_to_source_chars() {
        let page = "un café noir";
        let found = find_text("CAFE", page).unwrap();

        assert_eq!(found.strategy, MatchStrategy::Insensitive);
        let matched: String = page
            .chars()
            .skip(found.range.start)
            .take(found.range.len())
            .collect();
        assert_eq!(matched, "café");
    }

    #[test]
    fn test_whitespace_drift_is_tolerated() {
        let found = find_text("end of\nline", "the end   of line here").unwrap();

        assert_eq!(found.strategy, MatchStrategy::Insensitive);
        assert_eq!(found.range, 4..17);
    }

    #[test]
    fn test_exact_range_counts_chars_not_bytes() {
        let found = find_text("noir", "un café noir").unwrap();

        assert_eq!(found.strategy, MatchStrategy::Exact);
        assert_eq!(found.range, 8..12);
    }

    #[test]
    fn test_prefix_match_for_long_targets() {
        let sentence = "It was the best of times, it was the worst of times, it was the age";
        let page = format!("Chapter one. {}!! and so on", &sentence[..60]);
        let target = format!("{}.", sentence);

        let found = find_text(&target, &page).unwrap();

        assert_eq!(found.strategy, MatchStrategy::Prefix);
        assert_eq!(found.range.start, 13);
        assert!(found.range.end <= page.chars().count());
    }

    #[test]
    fn test_short_targets_skip_prefix_strategy() {
        assert!(find_text("short target.", "a short target here").is_none());
    }

    #[test]
    fn test_no_match() {
        assert!(find_text("zzz-not-present", "some unrelated text").is_none());
        assert!(find_text("", "anything").is_none());
        assert!(find_text("   ", "anything").is_none());
    }
}
