use async_trait::async_trait;
use context_text_chunker::{
    Chunker, ChunkerError, ChunkingConfig, CompletionProvider, DocumentMetadata,
    EmbeddingProvider, Result, StrategyKind, StubEmbedder,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct CannedCompleter {
    reply: String,
    calls: AtomicUsize,
}

impl CannedCompleter {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CompletionProvider for CannedCompleter {
    async fn complete(
        &self,
        _prompt: &str,
        _system: Option<&str>,
        _temperature: f32,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Returns vectors whose length depends on the input length.
struct ShiftingEmbedder;

#[async_trait]
impl EmbeddingProvider for ShiftingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0; if text.len() > 40 { 4 } else { 3 }])
    }
}

fn config() -> ChunkingConfig {
    ChunkingConfig {
        chunk_size: 10,
        chunk_overlap: 0,
        min_chunk_size: 1,
        include_timestamps: false,
        ..ChunkingConfig::default()
    }
}

fn metadata(entries: &[(&str, serde_json::Value)]) -> DocumentMetadata {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

const ESSAY: &str =
    "Bees pollinate crops.\n\nBees live in hives.\n\nRain fell all week.\n\nRivers rose fast.";

#[tokio::test]
async fn unknown_strategy_name_lists_choices() {
    let _ = env_logger::builder().is_test(true).try_init();
    let chunker = Chunker::new(config()).expect("chunker");
    let err = chunker
        .chunk(ESSAY, &metadata(&[("strategy", json!("quantum"))]))
        .await
        .expect_err("unknown");

    let message = err.to_string();
    for kind in StrategyKind::ALL {
        assert!(message.contains(kind.as_str()), "{message}");
    }
    assert!(err.is_configuration());
}

#[tokio::test]
async fn document_type_routes_to_hierarchical() {
    let chunker = Chunker::new(config()).expect("chunker");
    let chunks = chunker
        .chunk(ESSAY, &metadata(&[("document_type", json!("report"))]))
        .await
        .expect("chunks");
    assert_eq!(chunks[0].semantic_level, Some(0));
    assert_eq!(chunks[0].metadata.get_str("document.document_type"), Some("report"));
}

#[tokio::test]
async fn late_context_reports_dimension_mismatch() {
    let chunker = Chunker::new(config())
        .expect("chunker")
        .with_embedder(Arc::new(ShiftingEmbedder));
    let err = chunker
        .chunk_with(StrategyKind::LateContext, ESSAY, &DocumentMetadata::new())
        .await
        .expect_err("mismatch");
    assert!(matches!(
        err,
        ChunkerError::DimensionMismatch {
            expected: 4,
            actual: 3
        }
    ));
}

#[tokio::test]
async fn llm_garbage_falls_back_to_heuristic() {
    let completer = CannedCompleter::new("I would rather not answer in JSON.");
    let chunker = Chunker::new(config()).expect("chunker").with_completer(completer.clone());
    let chunks = chunker
        .chunk_with(StrategyKind::LlmAssisted, ESSAY, &DocumentMetadata::new())
        .await
        .expect("chunks");

    assert_eq!(completer.calls.load(Ordering::SeqCst), 1);
    assert!(!chunks.is_empty());
    assert!(chunks
        .iter()
        .all(|c| c.metadata.get_str("boundary_source") == Some("heuristic")));
}

#[tokio::test]
async fn llm_boundaries_shape_the_chunks() {
    let completer = CannedCompleter::new("```json\n{\"boundaries\": [0, 2]}\n```");
    let chunker = Chunker::new(config()).expect("chunker").with_completer(completer);
    let chunks = chunker
        .chunk_with(StrategyKind::LlmAssisted, ESSAY, &DocumentMetadata::new())
        .await
        .expect("chunks");

    let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(
        contents,
        vec![
            "Bees pollinate crops.\n\nBees live in hives.",
            "Rain fell all week.\n\nRivers rose fast."
        ]
    );
}

#[tokio::test]
async fn agentic_without_completer_is_a_configuration_error() {
    let chunker = Chunker::new(config())
        .expect("chunker")
        .with_embedder(Arc::new(StubEmbedder::new(8)));
    let err = chunker
        .chunk_with(StrategyKind::Agentic, ESSAY, &DocumentMetadata::new())
        .await
        .expect_err("no completer");
    assert!(matches!(
        err,
        ChunkerError::MissingCapability {
            strategy: "agentic",
            capability: "completion"
        }
    ));
}

#[tokio::test]
async fn agentic_plan_drives_strategy_choice() {
    let completer = CannedCompleter::new(
        r#"Plan: {"document_type": "notes", "strategy": "recursive", "topics": ["bees", "rain"]}"#,
    );
    let chunker = Chunker::new(config()).expect("chunker").with_completer(completer);
    let chunks = chunker
        .chunk_with(StrategyKind::Agentic, ESSAY, &DocumentMetadata::new())
        .await
        .expect("chunks");

    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert_eq!(chunk.metadata.strategy, "agentic");
        assert_eq!(chunk.metadata.get_str("agent_strategy"), Some("recursive"));
        assert_eq!(chunk.metadata.get("topics"), Some(&json!(["bees", "rain"])));
    }
}
