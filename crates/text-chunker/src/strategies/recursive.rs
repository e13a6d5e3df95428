use super::{base_metadata, validated};
use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::text::{char_windows, Span};
use crate::types::Chunk;

/// Separator ladder, coarsest first. The character fallback sits below it.
const LADDER: &[(&str, &[&str])] = &[
    ("paragraph", &["\n\n"]),
    ("line", &["\n"]),
    ("sentence", &[". ", "! ", "? "]),
    ("clause", &["; ", ", "]),
    ("word", &[" "]),
];

const DOCUMENT_LEVEL: (usize, &str) = (0, "document");
const CHARACTER_LEVEL: (usize, &str) = (LADDER.len() + 1, "character");

/// Splits by progressively finer separators until every piece fits
/// `chunk_size * 4` characters.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    config: ChunkingConfig,
}

#[derive(Debug, Clone, Copy)]
struct Leaf {
    span: Span,
    level: (usize, &'static str),
    depth: usize,
}

impl RecursiveChunker {
    pub const NAME: &'static str = "recursive";

    pub fn new(config: ChunkingConfig) -> Result<Self> {
        Ok(Self {
            config: validated(config)?,
        })
    }

    #[must_use]
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let mut leaves = Vec::new();
        self.split(text, Span::new(0, text.len()), 0, DOCUMENT_LEVEL, 0, &mut leaves);

        let chunks: Vec<Chunk> = leaves
            .into_iter()
            .enumerate()
            .map(|(idx, leaf)| {
                let metadata = base_metadata(&self.config, Self::NAME)
                    .attr("chunk_index", idx)
                    .attr("separator_level", leaf.level.0)
                    .attr("separator_name", leaf.level.1)
                    .attr("depth", leaf.depth);
                Chunk::new(leaf.span.start, leaf.span.end, leaf.span.slice(text), metadata)
            })
            .collect();

        log::debug!("recursive: {} chunks", chunks.len());
        chunks
    }

    fn split(
        &self,
        text: &str,
        span: Span,
        from_level: usize,
        produced_by: (usize, &'static str),
        depth: usize,
        out: &mut Vec<Leaf>,
    ) {
        let target = self.config.target_chars();
        let chars = span.trimmed_chars(text);
        if chars == 0 {
            return;
        }
        if chars <= target {
            out.push(Leaf {
                span,
                level: produced_by,
                depth,
            });
            return;
        }

        let slice = span.slice(text);
        let next = LADDER
            .iter()
            .enumerate()
            .skip(from_level)
            .find(|(_, (_, separators))| separators.iter().any(|sep| slice.contains(sep)));

        let Some((level, (name, separators))) = next else {
            for window in char_windows(text, span, target) {
                if window.trimmed_chars(text) > 0 {
                    out.push(Leaf {
                        span: window,
                        level: CHARACTER_LEVEL,
                        depth: depth + 1,
                    });
                }
            }
            return;
        };

        let pieces: Vec<Span> = split_keep(slice, separators)
            .into_iter()
            .map(|(start, end)| Span::new(span.start + start, span.start + end))
            .collect();
        for piece in self.merge_small(text, pieces) {
            self.split(text, piece, level + 1, (level + 1, name), depth + 1, out);
        }
    }

    /// Fold pieces below `min_chunk_size` forward into their successor.
    fn merge_small(&self, text: &str, pieces: Vec<Span>) -> Vec<Span> {
        let mut merged: Vec<Span> = Vec::with_capacity(pieces.len());
        let mut pending: Option<Span> = None;

        for piece in pieces {
            let current = pending.take().map_or(piece, |run| run.union(piece));
            if current.trimmed_chars(text) < self.config.min_chunk_size {
                pending = Some(current);
            } else {
                merged.push(current);
            }
        }

        // Finalized pieces are never widened; a trailing run stands alone.
        merged.extend(pending);
        merged
    }
}

/// Split `slice` after every occurrence of any separator, keeping each
/// separator attached to the segment before it.
fn split_keep(slice: &str, separators: &[&str]) -> Vec<(usize, usize)> {
    let mut cuts: Vec<usize> = separators
        .iter()
        .flat_map(|sep| slice.match_indices(sep).map(|(pos, found)| pos + found.len()))
        .collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut pieces = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for cut in cuts {
        if cut > start {
            pieces.push((start, cut));
            start = cut;
        }
    }
    if start < slice.len() {
        pieces.push((start, slice.len()));
    }
    pieces
}
