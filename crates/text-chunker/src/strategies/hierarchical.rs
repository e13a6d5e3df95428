use super::{base_metadata, validated};
use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::text::{paragraph_spans, sentence_spans, Span};
use crate::types::Chunk;

/// Names of the tree levels, indexed by `semantic_level`
pub const LEVEL_NAMES: [&str; 4] = ["document", "section", "subsection", "sentence"];

/// Sentences shorter than this are left out of the tree
const MIN_SENTENCE_CHARS: usize = 20;

/// Builds a document → section → paragraph → sentence tree.
///
/// Output is flattened level by level (root first, then sections, paragraphs
/// and sentences, each in document order). Parent/child links are stored as
/// ids on the chunks; see [`crate::ChunkHierarchy`] for navigation.
#[derive(Debug, Clone)]
pub struct HierarchicalChunker {
    config: ChunkingConfig,
}

impl HierarchicalChunker {
    pub const NAME: &'static str = "hierarchical";

    pub fn new(config: ChunkingConfig) -> Result<Self> {
        Ok(Self {
            config: validated(config)?,
        })
    }

    #[must_use]
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let whole = Span::new(0, text.len());
        if whole.trimmed_chars(text) == 0 {
            return Vec::new();
        }

        let mut root = self.node(text, whole, 0, None);
        let mut sections = Vec::new();
        let mut subsections = Vec::new();
        let mut sentences = Vec::new();

        for section_span in self.section_spans(text) {
            let mut section = self.node(text, section_span, 1, Some(&root.id));
            root.add_child(&section.id);

            for paragraph in paragraph_spans(text, section_span) {
                let mut subsection = self.node(text, paragraph, 2, Some(&section.id));
                section.add_child(&subsection.id);

                for sentence in sentence_spans(text, paragraph) {
                    if sentence.trimmed_chars(text) < MIN_SENTENCE_CHARS {
                        continue;
                    }
                    let leaf = self.node(text, sentence, 3, Some(&subsection.id));
                    subsection.add_child(&leaf.id);
                    sentences.push(leaf);
                }
                subsections.push(subsection);
            }
            sections.push(section);
        }

        log::debug!(
            "hierarchical: {} sections, {} subsections, {} sentences",
            sections.len(),
            subsections.len(),
            sentences.len()
        );

        let mut out = Vec::with_capacity(1 + sections.len() + subsections.len() + sentences.len());
        out.push(root);
        out.extend(sections);
        out.extend(subsections);
        out.extend(sentences);
        out
    }

    fn node(&self, text: &str, span: Span, level: usize, parent: Option<&str>) -> Chunk {
        let metadata =
            base_metadata(&self.config, Self::NAME).attr("level_name", LEVEL_NAMES[level]);
        let chunk = Chunk::new(span.start, span.end, span.slice(text), metadata);
        let id = Chunk::derive_id(
            &format!("{}/{level}", Self::NAME),
            span.start,
            span.end,
            &chunk.content,
        );
        let mut chunk = chunk.with_id(id).with_level(level);
        chunk.parent_id = parent.map(str::to_string);
        chunk
    }

    /// Split on the first configured section marker present in the text, join
    /// small neighbours, then break apart anything over twice the target.
    fn section_spans(&self, text: &str) -> Vec<Span> {
        let target = self.config.target_chars();
        let ceiling = target * 2;

        let marker = self
            .config
            .section_markers
            .iter()
            .find(|marker| !marker.is_empty() && text.contains(marker.as_str()));
        let raw: Vec<Span> = match marker {
            Some(marker) => split_on(text, marker),
            None => vec![Span::new(0, text.len())],
        };

        let mut joined = Vec::with_capacity(raw.len());
        let mut current: Option<Span> = None;
        for span in raw.into_iter().filter(|s| s.trimmed_chars(text) > 0) {
            current = match current {
                None => Some(span),
                Some(open) => {
                    let widened = open.union(span);
                    if open.trimmed_chars(text) < target && widened.trimmed_chars(text) <= ceiling {
                        Some(widened)
                    } else {
                        joined.push(open);
                        Some(span)
                    }
                }
            };
        }
        joined.extend(current);

        joined
            .into_iter()
            .flat_map(|span| split_oversized(text, span, target, ceiling))
            .collect()
    }
}

fn split_on(text: &str, marker: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    for (pos, found) in text.match_indices(marker) {
        spans.push(Span::new(cursor, pos));
        cursor = pos + found.len();
    }
    spans.push(Span::new(cursor, text.len()));
    spans
}

/// Cut `span` at the last paragraph break within the first `target` chars
/// after any leading whitespace, else the last sentence end, else exactly at
/// `target`; repeat on the rest while it stays above `ceiling`.
fn split_oversized(text: &str, span: Span, target: usize, ceiling: usize) -> Vec<Span> {
    let mut parts = Vec::new();
    let mut rest = span;

    while rest.trimmed_chars(text) > ceiling {
        let slice = rest.slice(text);
        // Leading whitespace does not count toward the target.
        let lead = slice.len() - slice.trim_start().len();
        let limit = slice[lead..]
            .char_indices()
            .nth(target)
            .map_or(slice.len(), |(idx, _)| lead + idx);
        let head = &slice[..limit];
        let cut = head
            .rfind("\n\n")
            .map(|pos| pos + 2)
            .filter(|&pos| !head[..pos].trim().is_empty())
            .or_else(|| {
                head.rfind(&['.', '!', '?'][..])
                    .map(|pos| pos + 1)
                    .filter(|&pos| !head[..pos].trim().is_empty())
            })
            .unwrap_or(limit);
        if cut == 0 {
            break;
        }
        parts.push(Span::new(rest.start, rest.start + cut));
        rest = Span::new(rest.start + cut, rest.end);
    }

    if rest.trimmed_chars(text) > 0 {
        parts.push(rest);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    const TEXT: &str = "Intro paragraph one. It has two sentences.\n\n\n\
        Second section starts here. Another sentence follows.\n\n\
        A second paragraph in section two.";

    fn chunker(chunk_size: usize) -> HierarchicalChunker {
        HierarchicalChunker::new(ChunkingConfig {
            chunk_size,
            chunk_overlap: 0,
            include_timestamps: false,
            ..Default::default()
        })
        .expect("valid config")
    }

    #[test]
    fn builds_four_levels_in_order() {
        let chunks = chunker(12).chunk(TEXT);
        let levels: Vec<usize> = chunks.iter().filter_map(|c| c.semantic_level).collect();
        assert_eq!(levels, vec![0, 1, 1, 2, 2, 2, 3, 3, 3, 3, 3]);
        assert_eq!(chunks[0].metadata.get_str("level_name"), Some("document"));
        assert_eq!(chunks[1].content, "Intro paragraph one. It has two sentences.");
        assert_eq!(chunks[10].content, "A second paragraph in section two.");
    }

    #[test]
    fn links_are_bidirectional() {
        let chunks = chunker(12).chunk(TEXT);
        let by_id: HashMap<&str, &Chunk> = chunks.iter().map(|c| (c.id.as_str(), c)).collect();
        assert_eq!(by_id.len(), chunks.len());

        for chunk in &chunks {
            match &chunk.parent_id {
                None => assert_eq!(chunk.semantic_level, Some(0)),
                Some(parent_id) => {
                    let parent = by_id[parent_id.as_str()];
                    let hits = parent.children_ids.iter().filter(|id| **id == chunk.id).count();
                    assert_eq!(hits, 1);
                }
            }
        }
        assert_eq!(chunks[0].children_ids.len(), 2);
    }

    #[test]
    fn short_sentences_are_dropped() {
        let chunks = chunker(50).chunk("Tiny. This sentence is long enough to keep.");
        let sentences: Vec<&str> = chunks
            .iter()
            .filter(|c| c.semantic_level == Some(3))
            .map(|c| c.content.as_str())
            .collect();
        assert_eq!(sentences, vec!["This sentence is long enough to keep."]);
    }

    #[test]
    fn small_sections_are_joined_forward() {
        let text = "One.\n\nTwo.\n\nThree.";
        let chunks = chunker(50).chunk(text);
        let sections: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| c.semantic_level == Some(1))
            .collect();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].children_ids.len(), 3);
    }

    #[test]
    fn oversized_sections_are_cut_at_sentence_ends() {
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta. Iota kappa lambda mu.";
        let parts = split_oversized(text, Span::new(0, text.len()), 30, 50);
        let slices: Vec<&str> = parts.iter().map(|p| p.slice(text).trim()).collect();
        assert_eq!(
            slices,
            vec![
                "Alpha beta gamma delta.",
                "Epsilon zeta eta theta. Iota kappa lambda mu."
            ]
        );
    }

    #[test]
    fn whitespace_runs_never_become_blank_sections() {
        let text = format!("Start sentence. {}{}", " ".repeat(40), "word ".repeat(30));
        let chunks = chunker(5).chunk(&text);

        let sections: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| c.semantic_level == Some(1))
            .collect();
        assert!(sections.len() > 1);
        assert!(chunks.iter().all(|c| !c.content.is_empty()));
        assert!(sections.iter().all(|s| !s.children_ids.is_empty()));
    }

    #[test]
    fn whitespace_only_input_yields_nothing() {
        assert!(chunker(10).chunk("  \n\n ").is_empty());
    }
}
