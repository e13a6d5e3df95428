use crate::completion::CompletionProvider;
use crate::config::ChunkingConfig;
use crate::dispatch::{select, Capabilities, Strategy, StrategyKind};
use crate::embedding::{EmbeddingCache, EmbeddingProvider};
use crate::error::{ChunkerError, Result};
use crate::hierarchy::ChunkHierarchy;
use crate::refine::RefinementPass;
use crate::strategies::HierarchicalChunker;
use crate::types::{Chunk, DocumentMetadata};
use std::sync::Arc;

/// Main chunker interface for processing documents
pub struct Chunker {
    config: ChunkingConfig,
    capabilities: Capabilities,
}

impl Chunker {
    /// Create a new chunker with configuration
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate().map_err(ChunkerError::InvalidConfig)?;
        let mut capabilities = Capabilities::default();
        if config.enable_embedding_cache {
            capabilities.embedding_cache =
                Some(Arc::new(EmbeddingCache::new(config.embedding_cache_capacity)));
        }
        Ok(Self {
            config,
            capabilities,
        })
    }

    /// Attach the embedding service used by semantic and late-context chunking
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.capabilities.embedder = Some(embedder);
        self
    }

    /// Attach the completion service used by LLM-assisted and agentic chunking
    #[must_use]
    pub fn with_completer(mut self, completer: Arc<dyn CompletionProvider>) -> Self {
        self.capabilities.completer = Some(completer);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Drop every cached sentence embedding
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.capabilities.embedding_cache {
            cache.clear();
        }
    }

    /// Strategy [`Chunker::chunk`] would use for this document
    pub fn select_strategy(&self, text: &str, metadata: &DocumentMetadata) -> Result<StrategyKind> {
        select(text, metadata, &self.config)
    }

    /// Chunk a document with the strategy chosen from its metadata and shape
    pub async fn chunk(&self, text: &str, metadata: &DocumentMetadata) -> Result<Vec<Chunk>> {
        ensure_content(text)?;
        let kind = self.select_strategy(text, metadata)?;
        log::debug!("chunker: selected {kind}");
        self.run(kind, text, metadata).await
    }

    /// Chunk a document with an explicit strategy
    pub async fn chunk_with(
        &self,
        kind: StrategyKind,
        text: &str,
        metadata: &DocumentMetadata,
    ) -> Result<Vec<Chunk>> {
        ensure_content(text)?;
        self.run(kind, text, metadata).await
    }

    /// Build the hierarchical tree of a document and index it for navigation
    pub fn chunk_hierarchy(&self, text: &str) -> Result<ChunkHierarchy> {
        ensure_content(text)?;
        let chunks = HierarchicalChunker::new(self.config.clone())?.chunk(text);
        let chunks =
            self.post_process(StrategyKind::Hierarchical, text, &DocumentMetadata::new(), chunks)?;
        let hierarchy = ChunkHierarchy::from_chunks(chunks);
        hierarchy.validate()?;
        Ok(hierarchy)
    }

    async fn run(
        &self,
        kind: StrategyKind,
        text: &str,
        metadata: &DocumentMetadata,
    ) -> Result<Vec<Chunk>> {
        let strategy = Strategy::build(kind, self.config.clone(), &self.capabilities)?;
        let chunks = strategy.chunk(text, metadata).await?;
        self.post_process(kind, text, metadata, chunks)
    }

    /// Post-process chunks (refinement, ordering, span checks, metadata)
    fn post_process(
        &self,
        kind: StrategyKind,
        text: &str,
        metadata: &DocumentMetadata,
        mut chunks: Vec<Chunk>,
    ) -> Result<Vec<Chunk>> {
        let is_tree = chunks.iter().any(|c| c.semantic_level.is_some());

        if self.config.refine_output && kind.is_deterministic() && !is_tree {
            chunks = RefinementPass::new(self.config.clone()).refine(text, chunks);
        }

        // Trees keep level-then-position order.
        if !is_tree {
            chunks.sort_by(|a, b| {
                a.start_idx
                    .cmp(&b.start_idx)
                    .then_with(|| a.end_idx.cmp(&b.end_idx))
            });
        }

        for chunk in &chunks {
            chunk.validate_span(text.len())?;
        }

        if self.config.include_document_metadata && !metadata.is_empty() {
            for chunk in &mut chunks {
                for (key, value) in metadata {
                    chunk
                        .metadata
                        .attributes
                        .entry(format!("document.{key}"))
                        .or_insert_with(|| value.clone());
                }
            }
        }

        log::debug!("chunker: {kind} produced {} chunks", chunks.len());
        Ok(chunks)
    }
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker")
            .field("config", &self.config)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

fn ensure_content(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(ChunkerError::EmptyContent);
    }
    Ok(())
}
