use super::{base_metadata, validated};
use crate::config::ChunkingConfig;
use crate::embedding::{
    cosine_similarity, embed_texts, mean_vector, normalize, BatchPlan, EmbeddingCache,
    EmbeddingProvider,
};
use crate::error::Result;
use crate::text::{sentence_spans, Span};
use crate::types::Chunk;
use std::ops::Range;
use std::sync::Arc;

/// Tolerance applied when comparing a similarity against the threshold
const SIMILARITY_EPSILON: f64 = 1e-6;

/// Adaptive boundary threshold: `max(floor, mean - stddev)` over consecutive
/// similarities (population standard deviation). Empty input yields `floor`.
#[must_use]
pub fn boundary_threshold(similarities: &[f32], floor: f32) -> f64 {
    let floor = f64::from(floor);
    if similarities.is_empty() {
        return floor;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = similarities.len() as f64;
    let mean = similarities.iter().copied().map(f64::from).sum::<f64>() / n;
    let variance = similarities
        .iter()
        .map(|s| (f64::from(*s) - mean).powi(2))
        .sum::<f64>()
        / n;
    floor.max(mean - variance.sqrt())
}

/// Sentence indices that start a group. Always contains 0; index `i + 1` is
/// added when `similarities[i]` falls below `threshold`.
#[must_use]
pub fn find_boundaries(similarities: &[f32], threshold: f64) -> Vec<usize> {
    std::iter::once(0)
        .chain(
            similarities
                .iter()
                .enumerate()
                .filter(|(_, sim)| f64::from(**sim) + SIMILARITY_EPSILON < threshold)
                .map(|(idx, _)| idx + 1),
        )
        .collect()
}

/// Groups sentences by embedding similarity.
pub struct SemanticChunker {
    config: ChunkingConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    cache: Option<Arc<EmbeddingCache>>,
}

impl SemanticChunker {
    pub const NAME: &'static str = "semantic";

    pub fn new(config: ChunkingConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let config = validated(config)?;
        let cache = config
            .enable_embedding_cache
            .then(|| Arc::new(EmbeddingCache::new(config.embedding_cache_capacity)));
        Ok(Self {
            config,
            embedder,
            cache,
        })
    }

    /// Share an existing cache instead of the instance-local one
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        if self.config.enable_embedding_cache {
            self.cache = Some(cache);
        }
        self
    }

    #[must_use]
    pub const fn cache(&self) -> Option<&Arc<EmbeddingCache>> {
        self.cache.as_ref()
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    pub async fn chunk(&self, text: &str) -> Result<Vec<Chunk>> {
        let whole = Span::new(0, text.len());
        if whole.trimmed_chars(text) == 0 {
            return Ok(Vec::new());
        }

        let sentences = sentence_spans(text, whole);
        if sentences.len() <= 1 {
            let metadata = base_metadata(&self.config, Self::NAME)
                .attr("sentence_count", sentences.len())
                .attr("group_index", 0);
            return Ok(vec![Chunk::new(0, text.len(), text, metadata)]);
        }

        let texts: Vec<String> = sentences
            .iter()
            .map(|s| s.slice(text).trim().to_string())
            .collect();
        let plan = BatchPlan {
            batch_size: self.config.embedding_batch_size,
            parallel: self.config.parallel_embedding,
        };
        let embeddings = embed_texts(&self.embedder, &texts, plan, self.cache.as_deref()).await?;

        let similarities: Vec<f32> = embeddings
            .windows(2)
            .map(|pair| cosine_similarity(&pair[0], &pair[1]))
            .collect();
        let threshold = boundary_threshold(&similarities, self.config.similarity_threshold);
        let boundaries = find_boundaries(&similarities, threshold);
        log::debug!(
            "semantic: {} sentences, threshold {threshold:.4}, {} boundaries",
            sentences.len(),
            boundaries.len()
        );

        let mut chunks = Vec::new();
        for (idx, &start) in boundaries.iter().enumerate() {
            let end = boundaries.get(idx + 1).copied().unwrap_or(sentences.len());
            for range in self.size_groups(text, &sentences, start..end) {
                let span = covering(&sentences[range.clone()]);
                let size = span.trimmed_chars(text);
                if size == 0 || size < self.config.min_chunk_size {
                    continue;
                }

                let mut metadata = base_metadata(&self.config, Self::NAME)
                    .attr("boundary_threshold", threshold)
                    .attr("sentence_count", range.len())
                    .attr("group_index", idx);
                if range.len() != end - start {
                    metadata.set("group_part", range.start - start);
                }
                let mut chunk = Chunk::new(span.start, span.end, span.slice(text), metadata);
                if self.config.include_embeddings {
                    let members: Vec<&[f32]> =
                        embeddings[range].iter().map(Vec::as_slice).collect();
                    if let Some(mut mean) = mean_vector(&members) {
                        normalize(&mut mean);
                        chunk = chunk.with_embedding(mean);
                    }
                }
                chunks.push(chunk);
            }
        }
        Ok(chunks)
    }

    /// Keep a group whole when it fits `max_chunk_size`, otherwise re-accumulate
    /// its sentences up to `chunk_size * 4` characters.
    fn size_groups(
        &self,
        text: &str,
        sentences: &[Span],
        group: Range<usize>,
    ) -> Vec<Range<usize>> {
        if covering(&sentences[group.clone()]).trimmed_chars(text) <= self.config.max_chunk_size {
            return vec![group];
        }

        let target = self.config.target_chars();
        let mut out = Vec::new();
        let mut current = group.start;
        for idx in group.start + 1..group.end {
            let widened = covering(&sentences[current..=idx]);
            if widened.trimmed_chars(text) > target {
                out.push(current..idx);
                current = idx;
            }
        }
        out.push(current..group.end);
        out
    }
}

impl std::fmt::Debug for SemanticChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticChunker")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

fn covering(sentences: &[Span]) -> Span {
    match (sentences.first(), sentences.last()) {
        (Some(first), Some(last)) => first.union(*last),
        _ => Span::new(0, 0),
    }
}
