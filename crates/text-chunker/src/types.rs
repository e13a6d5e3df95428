use crate::config::CHARS_PER_TOKEN;
use crate::error::{ChunkerError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Caller-supplied metadata describing the whole document.
pub type DocumentMetadata = BTreeMap<String, Value>;

/// A bounded span of source text with offset provenance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Stable identifier (content + offset derived unless assigned)
    pub id: String,

    /// Chunk text, trimmed at both ends
    pub content: String,

    /// Start of the untrimmed span (byte offset, on a char boundary)
    pub start_idx: usize,

    /// End of the untrimmed span (exclusive)
    pub end_idx: usize,

    /// Strategy annotations
    pub metadata: ChunkMetadata,

    /// Chunk this one was decomposed from
    #[serde(default)]
    pub parent_id: Option<String>,

    /// Chunks decomposed from this one, in document order
    #[serde(default)]
    pub children_ids: Vec<String>,

    /// Embedding attached by similarity-aware strategies
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,

    /// Hierarchy depth, 0 = whole document
    #[serde(default)]
    pub semantic_level: Option<usize>,
}

impl Chunk {
    /// Create a chunk over `[start_idx, end_idx)`; content is trimmed and the
    /// id is derived from the strategy name, offsets and content.
    #[must_use]
    pub fn new(start_idx: usize, end_idx: usize, content: &str, metadata: ChunkMetadata) -> Self {
        let content = content.trim().to_string();
        let id = Self::derive_id(&metadata.strategy, start_idx, end_idx, &content);
        let mut metadata = metadata;
        metadata.size = content.chars().count();
        metadata.estimated_tokens = ChunkMetadata::estimate_tokens_from_content(&content);
        Self {
            id,
            content,
            start_idx,
            end_idx,
            metadata,
            parent_id: None,
            children_ids: Vec::new(),
            embedding: None,
            semantic_level: None,
        }
    }

    /// Create a chunk from `document[start_idx..end_idx]`.
    ///
    /// Returns `None` when the span is out of range or not on char boundaries.
    #[must_use]
    pub fn from_span(
        document: &str,
        start_idx: usize,
        end_idx: usize,
        metadata: ChunkMetadata,
    ) -> Option<Self> {
        let slice = document.get(start_idx..end_idx)?;
        Some(Self::new(start_idx, end_idx, slice, metadata))
    }

    /// Deterministic id: first 32 hex chars of SHA-256 over scope, offsets and content.
    #[must_use]
    pub fn derive_id(scope: &str, start_idx: usize, end_idx: usize, content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(scope.as_bytes());
        hasher.update([0u8]);
        hasher.update(start_idx.to_le_bytes());
        hasher.update(end_idx.to_le_bytes());
        hasher.update(content.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..32].to_string()
    }

    /// Builder: replace the derived id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Builder: set hierarchy depth
    #[must_use]
    pub const fn with_level(mut self, level: usize) -> Self {
        self.semantic_level = Some(level);
        self
    }

    /// Builder: attach an embedding
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Register a child id once
    pub fn add_child(&mut self, id: &str) {
        if !self.children_ids.iter().any(|existing| existing == id) {
            self.children_ids.push(id.to_string());
        }
    }

    /// Number of characters in the trimmed content
    #[must_use]
    pub const fn len(&self) -> usize {
        self.metadata.size
    }

    /// Whether the trimmed content is empty
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.metadata.size == 0
    }

    /// Length of the untrimmed span in bytes
    #[must_use]
    pub const fn span_len(&self) -> usize {
        self.end_idx.saturating_sub(self.start_idx)
    }

    /// Whether this chunk has no children
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children_ids.is_empty()
    }

    /// Get estimated token count
    #[must_use]
    pub const fn estimated_tokens(&self) -> usize {
        self.metadata.estimated_tokens
    }

    /// The untrimmed span this chunk covers in `document`
    #[must_use]
    pub fn slice_of<'a>(&self, document: &'a str) -> Option<&'a str> {
        document.get(self.start_idx..self.end_idx)
    }

    /// Check `start_idx <= end_idx <= document_len`
    pub fn validate_span(&self, document_len: usize) -> Result<()> {
        if self.start_idx > self.end_idx || self.end_idx > document_len {
            return Err(ChunkerError::InvalidBoundaries {
                start: self.start_idx,
                end: self.end_idx,
            });
        }
        Ok(())
    }

    /// Check if the chunk span contains a byte offset
    #[must_use]
    pub const fn contains_offset(&self, offset: usize) -> bool {
        offset >= self.start_idx && offset < self.end_idx
    }
}

/// Metadata about a chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// Name of the strategy that produced the chunk
    pub strategy: String,

    /// Creation time (RFC 3339), when timestamps are enabled
    #[serde(default)]
    pub created_at: Option<String>,

    /// Characters of trimmed content
    pub size: usize,

    /// Estimated token count (rough approximation)
    pub estimated_tokens: usize,

    /// Strategy-specific annotations
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl ChunkMetadata {
    /// Create metadata for a strategy
    pub fn for_strategy(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            ..Default::default()
        }
    }

    /// Builder: stamp the current time
    #[must_use]
    pub fn created_now(mut self) -> Self {
        self.created_at = Some(chrono::Utc::now().to_rfc3339());
        self
    }

    /// Builder: set an annotation
    #[must_use]
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set an annotation in place
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Look up an annotation
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Look up a string annotation
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Estimate tokens from content (~4 characters per token)
    #[must_use]
    pub fn estimate_tokens_from_content(content: &str) -> usize {
        let chars = content.chars().count();
        if chars == 0 {
            return 0;
        }
        (chars / CHARS_PER_TOKEN).max(1)
    }
}
