//! # Context Text Chunker
//!
//! Segmentation and refinement of long documents into retrieval-sized chunks.
//!
//! ## Philosophy
//!
//! Every chunk is a bounded span of the original text:
//! - Offsets always point back into the source document
//! - Ids are derived from content and position, so reruns are reproducible
//! - Embedding and completion services are optional capabilities, never globals
//! - Service-driven strategies only propose boundaries; a local pass normalizes sizes
//!
//! ## Architecture
//!
//! ```text
//! Document + metadata
//!     │
//!     ├──> Strategy selection (explicit name, document type, text shape)
//!     │
//!     ├──> Boundary detection
//!     │    ├─> fixed_size, recursive, document_based, hierarchical (local)
//!     │    ├─> semantic, late_context (embedding service)
//!     │    └─> llm_assisted, agentic (completion service)
//!     │
//!     ├──> Refinement (merge undersized, split oversized)
//!     │
//!     └──> Chunk[] with offsets, ids, metadata, optional embeddings
//! ```
//!
//! ## Example
//!
//! ```rust
//! use context_text_chunker::{ChunkingConfig, FixedSizeChunker};
//!
//! let config = ChunkingConfig {
//!     chunk_size: 10,
//!     chunk_overlap: 3,
//!     min_chunk_size: 1,
//!     ..Default::default()
//! };
//! let chunker = FixedSizeChunker::new(config).unwrap();
//!
//! let chunks = chunker.chunk("ABCDEFGHIJKLMNOPQRSTUVWXYZ");
//! for chunk in &chunks {
//!     println!("{}..{}: {}", chunk.start_idx, chunk.end_idx, chunk.content);
//! }
//! assert_eq!(chunks.len(), 4);
//! ```
//!
//! The [`Chunker`] facade picks a strategy per document:
//!
//! ```rust
//! use context_text_chunker::{Chunker, ChunkingConfig, DocumentMetadata, StubEmbedder};
//! use std::sync::Arc;
//!
//! # async fn run() -> context_text_chunker::Result<()> {
//! let chunker = Chunker::new(ChunkingConfig::for_embeddings())?
//!     .with_embedder(Arc::new(StubEmbedder::new(384)));
//!
//! let mut metadata = DocumentMetadata::new();
//! metadata.insert("strategy".into(), "semantic".into());
//! let chunks = chunker.chunk("First topic. More on it. A new topic.", &metadata).await?;
//! # let _ = chunks;
//! # Ok(())
//! # }
//! ```

mod chunker;
mod completion;
mod config;
mod dispatch;
mod embedding;
mod error;
mod hierarchy;
mod refine;
mod strategies;
mod text;
mod types;

pub use chunker::Chunker;
pub use completion::{extract_json, parse_json, CompletionProvider};
pub use config::{
    ChunkingConfig, LengthUnit, CHARS_PER_TOKEN, LATE_CONTEXT_GLOBAL_WEIGHT,
    LATE_CONTEXT_LOCAL_WEIGHT,
};
pub use dispatch::{auto_select, select, Capabilities, Strategy, StrategyKind};
pub use embedding::{
    blend, cosine_similarity, embed_texts, mean_vector, normalize, BatchPlan, EmbeddingCache,
    EmbeddingProvider, StubEmbedder,
};
pub use error::{ChunkerError, Result};
pub use hierarchy::ChunkHierarchy;
pub use refine::RefinementPass;
pub use strategies::{
    boundary_threshold, find_boundaries, AgentPlan, AgenticChunker, DocumentChunker,
    DocumentFormat, FixedSizeChunker, HierarchicalChunker, LateContextChunker,
    LlmAssistedChunker, RecursiveChunker, SemanticChunker, LEVEL_NAMES,
};
pub use text::Span;
pub use types::{Chunk, ChunkMetadata, DocumentMetadata};
