use super::{base_metadata, validated};
use crate::config::ChunkingConfig;
use crate::embedding::{blend, embed_texts, BatchPlan, EmbeddingProvider};
use crate::error::Result;
use crate::text::{paragraph_groups, truncate_chars, Span};
use crate::types::Chunk;
use std::sync::Arc;

/// Paragraph-grouped chunks whose embeddings blend in whole-document context.
pub struct LateContextChunker {
    config: ChunkingConfig,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl LateContextChunker {
    pub const NAME: &'static str = "late_context";

    pub fn new(config: ChunkingConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        Ok(Self {
            config: validated(config)?,
            embedder,
        })
    }

    pub async fn chunk(&self, text: &str) -> Result<Vec<Chunk>> {
        let whole = Span::new(0, text.len());
        if whole.trimmed_chars(text) == 0 {
            return Ok(Vec::new());
        }

        let context = truncate_chars(text, self.config.late_context_max_chars);
        let global = self.embedder.embed(context).await?;

        let groups = paragraph_groups(text, whole, self.config.target_chars());
        let contents: Vec<String> = groups
            .iter()
            .map(|g| g.slice(text).trim().to_string())
            .collect();
        let plan = BatchPlan {
            batch_size: self.config.embedding_batch_size,
            parallel: self.config.parallel_embedding,
        };
        let locals = embed_texts(&self.embedder, &contents, plan, None).await?;

        let (local_weight, global_weight) = (
            self.config.late_context_local_weight,
            self.config.late_context_global_weight,
        );
        let mut chunks = Vec::with_capacity(groups.len());
        for (idx, (group, local)) in groups.iter().zip(locals.iter()).enumerate() {
            let combined = blend(local, &global, local_weight, global_weight)?;
            let metadata = base_metadata(&self.config, Self::NAME)
                .attr("context_aware", true)
                .attr("group_index", idx)
                .attr("local_weight", local_weight)
                .attr("global_weight", global_weight)
                .attr("context_chars", context.chars().count());
            chunks.push(
                Chunk::new(group.start, group.end, group.slice(text), metadata)
                    .with_embedding(combined),
            );
        }

        log::debug!(
            "late_context: {} chunks, {} context chars",
            chunks.len(),
            context.len()
        );
        Ok(chunks)
    }
}

impl std::fmt::Debug for LateContextChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LateContextChunker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
