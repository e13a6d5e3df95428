use super::{base_metadata, validated};
use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::text::{char_boundaries, char_len};
use crate::types::Chunk;

/// Sliding-window chunking with backward overlap
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    config: ChunkingConfig,
}

impl FixedSizeChunker {
    pub const NAME: &'static str = "fixed_size";

    pub fn new(config: ChunkingConfig) -> Result<Self> {
        Ok(Self {
            config: validated(config)?,
        })
    }

    /// Advance a window of `chunk_size` units by `chunk_size - chunk_overlap`
    /// until it reaches the end of `text`. A window pulled back to a sentence or
    /// paragraph break is followed by one starting `chunk_overlap` units before
    /// the break.
    #[must_use]
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let bounds = char_boundaries(text);
        let total = bounds.len() - 1;
        let unit = self.config.chars_per_unit();
        let window = self.config.chunk_size * unit;
        let step = (self.config.chunk_size - self.config.chunk_overlap) * unit;
        let overlap = self.config.chunk_overlap * unit;

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < total {
            let reaches_end = start + window >= total;
            let end = if reaches_end {
                total
            } else {
                self.snap_end(text, &bounds, start, start + window)
            };

            let (byte_start, byte_end) = (bounds[start], bounds[end]);
            let slice = &text[byte_start..byte_end];
            if !slice.trim().is_empty() && char_len(slice.trim()) >= self.config.min_chunk_size {
                let metadata = base_metadata(&self.config, Self::NAME)
                    .attr("chunk_index", chunks.len())
                    .attr("window_start", start)
                    .attr("unit", self.config.length_unit.as_str());
                chunks.push(Chunk::new(byte_start, byte_end, slice, metadata));
            }

            if reaches_end {
                break;
            }
            // A snapped window resumes at its own end so no text is skipped.
            start = (start + step).min(end.saturating_sub(overlap).max(start + 1));
        }

        log::debug!(
            "fixed_size: {} chunks (window={window}, step={step} chars)",
            chunks.len()
        );
        chunks
    }

    /// Pull the window end back to the last paragraph or sentence break in the
    /// second half of the window, when structure preservation is enabled.
    fn snap_end(&self, text: &str, bounds: &[usize], start: usize, end: usize) -> usize {
        if !self.config.preserve_paragraphs && !self.config.preserve_sentences {
            return end;
        }

        let half = start + (end - start) / 2;
        let region = &text[bounds[half]..bounds[end]];
        let mut cut = None;
        if self.config.preserve_paragraphs {
            cut = region.rfind("\n\n").map(|pos| pos + 2);
        }
        if cut.is_none() && self.config.preserve_sentences {
            cut = region
                .rmatch_indices(|c| matches!(c, '.' | '!' | '?' | '\n'))
                .map(|(pos, _)| pos + 1)
                .next();
        }

        cut.and_then(|offset| bounds.binary_search(&(bounds[half] + offset)).ok())
            .filter(|&snapped| snapped > start)
            .unwrap_or(end)
    }
}
