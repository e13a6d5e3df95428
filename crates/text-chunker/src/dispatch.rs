use crate::completion::CompletionProvider;
use crate::config::ChunkingConfig;
use crate::embedding::{EmbeddingCache, EmbeddingProvider};
use crate::error::{ChunkerError, Result};
use crate::strategies::document::HeadingPatterns;
use crate::strategies::{
    AgenticChunker, DocumentChunker, FixedSizeChunker, HierarchicalChunker, LateContextChunker,
    LlmAssistedChunker, RecursiveChunker, SemanticChunker,
};
use crate::text::char_len;
use crate::types::{Chunk, DocumentMetadata};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Chunking strategy identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Sliding window with overlap
    FixedSize,
    /// Separator ladder from paragraphs down to characters
    Recursive,
    /// Heading-delimited sections
    DocumentBased,
    /// Embedding-similarity sentence groups
    Semantic,
    /// Document/section/paragraph/sentence tree
    Hierarchical,
    /// Paragraph groups with context-blended embeddings
    LateContext,
    /// Paragraph grouping proposed by a completion service
    LlmAssisted,
    /// Completion-service planned choice of a deterministic strategy
    Agentic,
}

impl StrategyKind {
    pub const ALL: [Self; 8] = [
        Self::FixedSize,
        Self::Recursive,
        Self::DocumentBased,
        Self::Semantic,
        Self::Hierarchical,
        Self::LateContext,
        Self::LlmAssisted,
        Self::Agentic,
    ];

    /// Get strategy name as string
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FixedSize => FixedSizeChunker::NAME,
            Self::Recursive => RecursiveChunker::NAME,
            Self::DocumentBased => DocumentChunker::NAME,
            Self::Semantic => SemanticChunker::NAME,
            Self::Hierarchical => HierarchicalChunker::NAME,
            Self::LateContext => LateContextChunker::NAME,
            Self::LlmAssisted => LlmAssistedChunker::NAME,
            Self::Agentic => AgenticChunker::NAME,
        }
    }

    #[must_use]
    pub fn valid_names() -> Vec<&'static str> {
        Self::ALL.iter().map(|kind| kind.as_str()).collect()
    }

    /// Resolve a strategy name, case-insensitively; `-` and spaces count as `_`.
    pub fn from_name(name: &str) -> Result<Self> {
        let normalized: String = name
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect();

        let kind = match normalized.as_str() {
            "fixed_size" | "fixed" | "fixedsize" | "sliding_window" => Self::FixedSize,
            "recursive" | "recursive_character" => Self::Recursive,
            "document_based" | "document" | "structure" | "structural" => Self::DocumentBased,
            "semantic" | "embedding" => Self::Semantic,
            "hierarchical" | "hierarchy" | "tree" => Self::Hierarchical,
            "late_context" | "late_chunking" | "late" => Self::LateContext,
            "llm_assisted" | "llm" | "llm_based" => Self::LlmAssisted,
            "agentic" | "agent" => Self::Agentic,
            _ => {
                return Err(ChunkerError::UnknownStrategy {
                    name: name.to_string(),
                    valid: Self::valid_names(),
                })
            }
        };
        Ok(kind)
    }

    #[must_use]
    pub const fn requires_embeddings(self) -> bool {
        matches!(self, Self::Semantic | Self::LateContext)
    }

    #[must_use]
    pub const fn requires_completion(self) -> bool {
        matches!(self, Self::LlmAssisted | Self::Agentic)
    }

    /// Runs without any external service
    #[must_use]
    pub const fn is_deterministic(self) -> bool {
        matches!(
            self,
            Self::FixedSize | Self::Recursive | Self::DocumentBased | Self::Hierarchical
        )
    }

    /// Strategy suited to a caller-declared document type; `Recursive` when unknown.
    #[must_use]
    pub fn recommended_for_document_type(document_type: &str) -> Self {
        match document_type.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" | "html" | "documentation" | "docs" | "readme" | "wiki"
            | "manual" => Self::DocumentBased,
            "book" | "report" | "legal" | "contract" | "thesis" | "paper" | "research_paper" => {
                Self::Hierarchical
            }
            "article" | "essay" | "blog" | "news" | "transcript" => Self::Semantic,
            "log" | "logs" | "csv" | "data" | "code" | "source_code" => Self::FixedSize,
            _ => Self::Recursive,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = ChunkerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

/// Pick a deterministic strategy from the shape of `text`.
#[must_use]
pub fn auto_select(text: &str, config: &ChunkingConfig) -> StrategyKind {
    if char_len(text.trim()) <= config.target_chars() {
        return StrategyKind::FixedSize;
    }

    let has_headings = HeadingPatterns::new(&config.header_markers)
        .map(|patterns| patterns.has_headings(text))
        .unwrap_or(false);
    if has_headings {
        StrategyKind::DocumentBased
    } else {
        StrategyKind::Recursive
    }
}

/// Resolve the strategy for a document: an explicit `strategy` metadata entry
/// wins, then a `document_type` hint, then [`auto_select`].
pub fn select(
    text: &str,
    metadata: &DocumentMetadata,
    config: &ChunkingConfig,
) -> Result<StrategyKind> {
    if let Some(name) = metadata.get("strategy").and_then(serde_json::Value::as_str) {
        return StrategyKind::from_name(name);
    }
    if let Some(document_type) = metadata
        .get("document_type")
        .and_then(serde_json::Value::as_str)
    {
        return Ok(StrategyKind::recommended_for_document_type(document_type));
    }
    Ok(auto_select(text, config))
}

/// External services available to strategies
#[derive(Clone, Default)]
pub struct Capabilities {
    pub embedder: Option<Arc<dyn EmbeddingProvider>>,
    pub completer: Option<Arc<dyn CompletionProvider>>,
    pub embedding_cache: Option<Arc<EmbeddingCache>>,
}

impl Capabilities {
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    #[must_use]
    pub fn with_completer(mut self, completer: Arc<dyn CompletionProvider>) -> Self {
        self.completer = Some(completer);
        self
    }

    #[must_use]
    pub fn with_embedding_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.embedding_cache = Some(cache);
        self
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("embedder", &self.embedder.is_some())
            .field("completer", &self.completer.is_some())
            .field("embedding_cache", &self.embedding_cache)
            .finish()
    }
}

/// A configured strategy instance
#[derive(Debug)]
pub enum Strategy {
    FixedSize(FixedSizeChunker),
    Recursive(RecursiveChunker),
    DocumentBased(DocumentChunker),
    Semantic(SemanticChunker),
    Hierarchical(HierarchicalChunker),
    LateContext(LateContextChunker),
    LlmAssisted(LlmAssistedChunker),
    Agentic(AgenticChunker),
}

impl Strategy {
    /// Build `kind`, failing when a required capability is absent.
    pub fn build(
        kind: StrategyKind,
        config: ChunkingConfig,
        capabilities: &Capabilities,
    ) -> Result<Self> {
        let strategy = match kind {
            StrategyKind::FixedSize => Self::FixedSize(FixedSizeChunker::new(config)?),
            StrategyKind::Recursive => Self::Recursive(RecursiveChunker::new(config)?),
            StrategyKind::DocumentBased => Self::DocumentBased(DocumentChunker::new(config)?),
            StrategyKind::Hierarchical => Self::Hierarchical(HierarchicalChunker::new(config)?),
            StrategyKind::Semantic => {
                let chunker = SemanticChunker::new(config, require_embedder(kind, capabilities)?)?;
                Self::Semantic(match &capabilities.embedding_cache {
                    Some(cache) => chunker.with_cache(Arc::clone(cache)),
                    None => chunker,
                })
            }
            StrategyKind::LateContext => Self::LateContext(LateContextChunker::new(
                config,
                require_embedder(kind, capabilities)?,
            )?),
            StrategyKind::LlmAssisted => Self::LlmAssisted(LlmAssistedChunker::new(
                config,
                require_completer(kind, capabilities)?,
            )?),
            StrategyKind::Agentic => Self::Agentic(AgenticChunker::new(
                config,
                require_completer(kind, capabilities)?,
            )?),
        };
        Ok(strategy)
    }

    #[must_use]
    pub const fn kind(&self) -> StrategyKind {
        match self {
            Self::FixedSize(_) => StrategyKind::FixedSize,
            Self::Recursive(_) => StrategyKind::Recursive,
            Self::DocumentBased(_) => StrategyKind::DocumentBased,
            Self::Semantic(_) => StrategyKind::Semantic,
            Self::Hierarchical(_) => StrategyKind::Hierarchical,
            Self::LateContext(_) => StrategyKind::LateContext,
            Self::LlmAssisted(_) => StrategyKind::LlmAssisted,
            Self::Agentic(_) => StrategyKind::Agentic,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Run a strategy that needs no external service; `None` for the others.
    #[must_use]
    pub fn chunk_sync(&self, text: &str, metadata: &DocumentMetadata) -> Option<Vec<Chunk>> {
        match self {
            Self::FixedSize(chunker) => Some(chunker.chunk(text)),
            Self::Recursive(chunker) => Some(chunker.chunk(text)),
            Self::DocumentBased(chunker) => Some(chunker.chunk(text, metadata)),
            Self::Hierarchical(chunker) => Some(chunker.chunk(text)),
            Self::Semantic(_)
            | Self::LateContext(_)
            | Self::LlmAssisted(_)
            | Self::Agentic(_) => None,
        }
    }

    pub async fn chunk(&self, text: &str, metadata: &DocumentMetadata) -> Result<Vec<Chunk>> {
        match self {
            Self::FixedSize(chunker) => Ok(chunker.chunk(text)),
            Self::Recursive(chunker) => Ok(chunker.chunk(text)),
            Self::DocumentBased(chunker) => Ok(chunker.chunk(text, metadata)),
            Self::Hierarchical(chunker) => Ok(chunker.chunk(text)),
            Self::Semantic(chunker) => chunker.chunk(text).await,
            Self::LateContext(chunker) => chunker.chunk(text).await,
            Self::LlmAssisted(chunker) => chunker.chunk(text).await,
            Self::Agentic(chunker) => chunker.chunk(text, metadata).await,
        }
    }
}

fn require_embedder(
    kind: StrategyKind,
    capabilities: &Capabilities,
) -> Result<Arc<dyn EmbeddingProvider>> {
    capabilities
        .embedder
        .clone()
        .ok_or(ChunkerError::MissingCapability {
            strategy: kind.as_str(),
            capability: "embedding",
        })
}

fn require_completer(
    kind: StrategyKind,
    capabilities: &Capabilities,
) -> Result<Arc<dyn CompletionProvider>> {
    capabilities
        .completer
        .clone()
        .ok_or(ChunkerError::MissingCapability {
            strategy: kind.as_str(),
            capability: "completion",
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::StubEmbedder;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn names_round_trip() {
        for kind in StrategyKind::ALL {
            assert_eq!(StrategyKind::from_name(kind.as_str()).expect("known"), kind);
            assert_eq!(kind.to_string().parse::<StrategyKind>().expect("known"), kind);
        }
    }

    #[test]
    fn names_are_normalized() {
        assert_eq!(StrategyKind::from_name("Fixed-Size").expect("known"), StrategyKind::FixedSize);
        assert_eq!(
            StrategyKind::from_name(" late context ").expect("known"),
            StrategyKind::LateContext
        );
        assert_eq!(StrategyKind::from_name("LLM").expect("known"), StrategyKind::LlmAssisted);
    }

    #[test]
    fn unknown_name_lists_valid_names() {
        let err = StrategyKind::from_name("magic").expect_err("unknown");
        match err {
            ChunkerError::UnknownStrategy { name, valid } => {
                assert_eq!(name, "magic");
                assert_eq!(valid.len(), 8);
                assert!(valid.contains(&"hierarchical"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_value(StrategyKind::DocumentBased).expect("json"),
            json!("document_based")
        );
    }

    #[test]
    fn auto_select_follows_document_shape() {
        let config = ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 0,
            ..Default::default()
        };
        assert_eq!(auto_select("tiny", &config), StrategyKind::FixedSize);

        let body = "lorem ipsum dolor sit amet ".repeat(3);
        assert_eq!(
            auto_select(&format!("# Title\n{body}"), &config),
            StrategyKind::DocumentBased
        );
        assert_eq!(
            auto_select(&format!("{body}\n\n{body}"), &config),
            StrategyKind::Recursive
        );
        assert_eq!(auto_select(&body, &config), StrategyKind::Recursive);
    }

    #[test]
    fn select_prefers_explicit_metadata() {
        let config = ChunkingConfig::default();
        let mut metadata = DocumentMetadata::new();
        metadata.insert("document_type".to_string(), json!("book"));
        assert_eq!(select("text", &metadata, &config).expect("kind"), StrategyKind::Hierarchical);

        metadata.insert("strategy".to_string(), json!("semantic"));
        assert_eq!(select("text", &metadata, &config).expect("kind"), StrategyKind::Semantic);

        metadata.insert("strategy".to_string(), json!("bogus"));
        assert!(select("text", &metadata, &config).is_err());
    }

    #[test]
    fn unknown_document_type_defaults_to_recursive() {
        assert_eq!(
            StrategyKind::recommended_for_document_type("spreadsheet-ish"),
            StrategyKind::Recursive
        );
    }

    #[test]
    fn build_reports_missing_capabilities() {
        let config = ChunkingConfig::default();
        for kind in StrategyKind::ALL {
            let result = Strategy::build(kind, config.clone(), &Capabilities::default());
            if kind.is_deterministic() {
                assert_eq!(result.expect("built").kind(), kind);
            } else {
                let err = result.expect_err("missing capability");
                assert!(matches!(err, ChunkerError::MissingCapability { .. }));
                assert!(err.is_configuration());
            }
        }

        let capabilities = Capabilities::default().with_embedder(Arc::new(StubEmbedder::new(4)));
        let strategy =
            Strategy::build(StrategyKind::Semantic, config, &capabilities).expect("built");
        assert_eq!(strategy.name(), "semantic");
    }

    #[tokio::test]
    async fn local_strategies_run_through_async_entry_point() {
        let config = ChunkingConfig {
            chunk_size: 5,
            chunk_overlap: 1,
            min_chunk_size: 1,
            include_timestamps: false,
            ..Default::default()
        };
        let text = "Alpha beta gamma delta.\n\nEpsilon zeta eta theta.";
        let metadata = DocumentMetadata::new();
        for kind in StrategyKind::ALL.into_iter().filter(|k| k.is_deterministic()) {
            let strategy =
                Strategy::build(kind, config.clone(), &Capabilities::default()).expect("built");
            let chunks = strategy.chunk(text, &metadata).await.expect("chunks");
            assert!(!chunks.is_empty(), "{kind} produced nothing");
            assert_eq!(Some(chunks), strategy.chunk_sync(text, &metadata));
        }
    }
}
