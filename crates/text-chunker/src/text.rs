//! Span helpers shared by every strategy.
//!
//! All offsets are absolute byte offsets into the original document and always
//! fall on char boundaries. Sizes are counted in characters.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));

/// Half-open byte range into a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.end <= self.start
    }

    /// Text covered by the span, empty when out of range
    #[must_use]
    pub fn slice(self, text: &str) -> &str {
        text.get(self.start..self.end).unwrap_or("")
    }

    /// Characters of the span's trimmed text
    #[must_use]
    pub fn trimmed_chars(self, text: &str) -> usize {
        char_len(self.slice(text).trim())
    }

    /// Smallest span covering both
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }
}

#[must_use]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Paragraph spans of `text[span]`, separated by blank lines; blank-only
/// paragraphs are skipped.
#[must_use]
pub fn paragraph_spans(text: &str, span: Span) -> Vec<Span> {
    let slice = span.slice(text);
    let mut out = Vec::new();
    let mut cursor = 0;
    for found in PARAGRAPH_BREAK.find_iter(slice) {
        push_non_blank(slice, span.start, cursor, found.start(), &mut out);
        cursor = found.end();
    }
    push_non_blank(slice, span.start, cursor, slice.len(), &mut out);
    out
}

fn push_non_blank(slice: &str, base: usize, start: usize, end: usize, out: &mut Vec<Span>) {
    if slice[start..end].trim().is_empty() {
        return;
    }
    out.push(Span::new(base + start, base + end));
}

/// Sentence spans of `text[span]` using Unicode sentence bounds.
///
/// Spans are contiguous (trailing whitespace stays with its sentence);
/// whitespace-only pieces are skipped.
#[must_use]
pub fn sentence_spans(text: &str, span: Span) -> Vec<Span> {
    span.slice(text)
        .split_sentence_bound_indices()
        .filter(|(_, sentence)| !sentence.trim().is_empty())
        .map(|(offset, sentence)| {
            Span::new(span.start + offset, span.start + offset + sentence.len())
        })
        .collect()
}

/// Greedily group consecutive spans while the covered text stays within
/// `target_chars`. A single span larger than the target forms its own group.
#[must_use]
pub fn group_spans(text: &str, spans: &[Span], target_chars: usize) -> Vec<Span> {
    let mut groups = Vec::new();
    let mut current: Option<Span> = None;

    for &span in spans {
        current = match current {
            None => Some(span),
            Some(group) => {
                let widened = group.union(span);
                if widened.trimmed_chars(text) > target_chars {
                    groups.push(group);
                    Some(span)
                } else {
                    Some(widened)
                }
            }
        };
    }

    groups.extend(current);
    groups
}

/// Paragraph grouping of `text[span]` targeting `target_chars` per group.
#[must_use]
pub fn paragraph_groups(text: &str, span: Span, target_chars: usize) -> Vec<Span> {
    group_spans(text, &paragraph_spans(text, span), target_chars)
}

/// Paragraph grouping that never yields a group above `target_chars`:
/// oversized groups fall back to sentence grouping, then to character windows.
#[must_use]
pub fn bounded_groups(text: &str, span: Span, target_chars: usize) -> Vec<Span> {
    let target_chars = target_chars.max(1);
    let mut out = Vec::new();
    for group in paragraph_groups(text, span, target_chars) {
        if group.trimmed_chars(text) <= target_chars {
            out.push(group);
            continue;
        }
        for sentences in group_spans(text, &sentence_spans(text, group), target_chars) {
            if sentences.trimmed_chars(text) <= target_chars {
                out.push(sentences);
            } else {
                out.extend(
                    char_windows(text, sentences, target_chars)
                        .into_iter()
                        .filter(|w| !w.slice(text).trim().is_empty()),
                );
            }
        }
    }
    out
}

/// Consecutive non-overlapping windows of `width_chars` characters over `text[span]`.
#[must_use]
pub fn char_windows(text: &str, span: Span, width_chars: usize) -> Vec<Span> {
    let width_chars = width_chars.max(1);
    let slice = span.slice(text);
    let mut boundaries: Vec<usize> = slice
        .char_indices()
        .map(|(idx, _)| idx)
        .step_by(width_chars)
        .collect();
    boundaries.push(slice.len());
    boundaries
        .windows(2)
        .map(|pair| Span::new(span.start + pair[0], span.start + pair[1]))
        .filter(|w| !w.is_empty())
        .collect()
}

/// Byte offset of each char in `text`, plus `text.len()` as a final entry.
#[must_use]
pub fn char_boundaries(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(idx, _)| idx)
        .chain(std::iter::once(text.len()))
        .collect()
}

/// Truncate to at most `max_chars` characters
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
