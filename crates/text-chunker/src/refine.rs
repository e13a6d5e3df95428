use crate::config::ChunkingConfig;
use crate::strategies::base_metadata;
use crate::text::{bounded_groups, Span};
use crate::types::Chunk;
use serde_json::Value;

const MERGE_SEPARATOR: &str = "\n\n";

/// Merge-undersized / split-oversized normalization over any chunk sequence.
///
/// One left-to-right pass, no external calls. Running it on its own output
/// changes nothing.
#[derive(Debug, Clone)]
pub struct RefinementPass {
    config: ChunkingConfig,
}

impl RefinementPass {
    #[must_use]
    pub const fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Refine `chunks` produced from `document`.
    ///
    /// - consecutive chunks below `min_chunk_size` accumulate until their
    ///   combined size reaches the minimum and are emitted as one new chunk;
    ///   a run is flushed early rather than grow past the split threshold
    /// - chunks within bounds pass through unchanged
    /// - chunks above `1.5 * max_chunk_size` are split by paragraph grouping
    #[must_use]
    pub fn refine(&self, document: &str, chunks: Vec<Chunk>) -> Vec<Chunk> {
        let input_len = chunks.len();
        let mut out = Vec::with_capacity(input_len);
        let mut pending = Pending::default();

        for chunk in chunks {
            if chunk.len() > self.config.split_threshold() {
                for part in self.split(document, &chunk) {
                    self.accept(part, &mut pending, &mut out);
                }
            } else {
                self.accept(chunk, &mut pending, &mut out);
            }
        }
        self.flush(&mut pending, &mut out);

        log::debug!("refinement: {input_len} chunks in, {} out", out.len());
        out
    }

    fn accept(&self, chunk: Chunk, pending: &mut Pending, out: &mut Vec<Chunk>) {
        if chunk.len() >= self.config.min_chunk_size {
            self.flush(pending, out);
            out.push(chunk);
            return;
        }

        // Merged chunks never exceed the split threshold.
        if pending.chars_with(&chunk) > self.config.split_threshold() {
            self.flush(pending, out);
        }
        pending.push(chunk);
        if pending.chars >= self.config.min_chunk_size {
            self.flush(pending, out);
        }
    }

    fn flush(&self, pending: &mut Pending, out: &mut Vec<Chunk>) {
        let mut group = std::mem::take(pending).chunks;
        match group.len() {
            0 => {}
            1 => out.extend(group.pop()),
            _ => out.push(self.merge(group)),
        }
    }

    fn merge(&self, group: Vec<Chunk>) -> Chunk {
        let start = group.iter().map(|c| c.start_idx).min().unwrap_or(0);
        let end = group.iter().map(|c| c.end_idx).max().unwrap_or(start);
        let content = group
            .iter()
            .map(|c| c.content.as_str())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(MERGE_SEPARATOR);
        let merged_from: Vec<Value> = group.iter().map(|c| Value::from(c.id.clone())).collect();

        let first = &group[0];
        let mut metadata = base_metadata(&self.config, &first.metadata.strategy);
        metadata.attributes = first.metadata.attributes.clone();
        metadata.set("refinement", "merged");
        metadata.set("merged_count", group.len());
        metadata.set("merged_from", merged_from);

        Chunk::new(start, end, &content, metadata)
    }

    fn split(&self, document: &str, chunk: &Chunk) -> Vec<Chunk> {
        let target = self.config.target_chars().min(self.config.max_chunk_size);

        // Offsets of the trimmed content inside the document, when the chunk
        // really is a slice of it; composed chunks are split on their own text.
        let located = chunk.slice_of(document).and_then(|slice| {
            slice
                .find(chunk.content.as_str())
                .map(|offset| chunk.start_idx + offset)
        });
        let (source, base, parts): (&str, usize, Vec<Span>) = match located {
            Some(content_start) => {
                let span = Span::new(content_start, content_start + chunk.content.len());
                (document, 0, bounded_groups(document, span, target))
            }
            None => {
                let span = Span::new(0, chunk.content.len());
                (
                    chunk.content.as_str(),
                    chunk.start_idx,
                    bounded_groups(&chunk.content, span, target),
                )
            }
        };

        let count = parts.len();
        parts
            .into_iter()
            .enumerate()
            .map(|(idx, part)| {
                let mut metadata = base_metadata(&self.config, &chunk.metadata.strategy);
                metadata.attributes = chunk.metadata.attributes.clone();
                metadata.set("refinement", "split");
                metadata.set("split_from", chunk.id.clone());
                metadata.set("split_index", idx);
                metadata.set("split_count", count);

                let start = (base + part.start).min(chunk.end_idx);
                let end = (base + part.end).min(chunk.end_idx).max(start);
                Chunk::new(start, end, part.slice(source), metadata)
            })
            .collect()
    }
}

#[derive(Default)]
struct Pending {
    chunks: Vec<Chunk>,
    chars: usize,
}

impl Pending {
    /// Size of the merged content if `chunk` joined the run
    fn chars_with(&self, chunk: &Chunk) -> usize {
        if chunk.is_empty() {
            self.chars
        } else if self.chars > 0 {
            self.chars + MERGE_SEPARATOR.len() + chunk.len()
        } else {
            chunk.len()
        }
    }

    fn push(&mut self, chunk: Chunk) {
        self.chars = self.chars_with(&chunk);
        self.chunks.push(chunk);
    }
}
