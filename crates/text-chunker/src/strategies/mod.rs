//! Boundary-detection strategies.
//!
//! Deterministic strategies expose a synchronous `chunk`; strategies that call
//! an embedding or completion service are async. [`crate::Strategy`] wraps
//! them all behind one async entry point.

pub(crate) mod document;
mod fixed_size;
mod hierarchical;
mod late_context;
mod llm;
mod recursive;
mod semantic;

pub use document::{DocumentChunker, DocumentFormat};
pub use fixed_size::FixedSizeChunker;
pub use hierarchical::{HierarchicalChunker, LEVEL_NAMES};
pub use late_context::LateContextChunker;
pub use llm::{AgentPlan, AgenticChunker, LlmAssistedChunker};
pub use recursive::RecursiveChunker;
pub use semantic::{boundary_threshold, find_boundaries, SemanticChunker};

use crate::config::ChunkingConfig;
use crate::error::{ChunkerError, Result};
use crate::types::ChunkMetadata;

/// Fresh metadata for a chunk produced by `strategy`
pub(crate) fn base_metadata(config: &ChunkingConfig, strategy: &str) -> ChunkMetadata {
    let metadata = ChunkMetadata::for_strategy(strategy);
    if config.include_timestamps {
        metadata.created_now()
    } else {
        metadata
    }
}

pub(crate) fn validated(config: ChunkingConfig) -> Result<ChunkingConfig> {
    config.validate().map_err(ChunkerError::InvalidConfig)?;
    Ok(config)
}
