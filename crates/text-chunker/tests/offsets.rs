use context_text_chunker::{
    Chunk, Chunker, ChunkingConfig, DocumentMetadata, StrategyKind, StubEmbedder,
};
use proptest::prelude::*;
use std::sync::Arc;

fn config(chunk_size: usize, min_chunk_size: usize) -> ChunkingConfig {
    ChunkingConfig {
        chunk_size,
        chunk_overlap: chunk_size / 3,
        min_chunk_size,
        max_chunk_size: min_chunk_size + 40,
        include_timestamps: false,
        ..ChunkingConfig::default()
    }
}

fn assert_offsets(text: &str, chunks: &[Chunk]) -> Result<(), TestCaseError> {
    for chunk in chunks {
        prop_assert!(chunk.start_idx <= chunk.end_idx);
        prop_assert!(chunk.end_idx <= text.len());
        prop_assert!(text.is_char_boundary(chunk.start_idx));
        prop_assert!(text.is_char_boundary(chunk.end_idx));
        let slice = chunk.slice_of(text).expect("span on char boundaries");
        prop_assert_eq!(slice.trim(), chunk.content.as_str());
    }
    Ok(())
}

fn run(chunker: &Chunker, kind: StrategyKind, text: &str) -> Vec<Chunk> {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
        .block_on(chunker.chunk_with(kind, text, &DocumentMetadata::new()))
        .expect("chunks")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn proptest_spans_slice_back_to_content(
        text in "[a-zA-Zéü中 .,;!?#\n]{1,300}",
        chunk_size in 2usize..24,
        min_chunk_size in 0usize..12,
    ) {
        prop_assume!(!text.trim().is_empty());
        let chunker = Chunker::new(config(chunk_size, min_chunk_size))
            .expect("chunker")
            .with_embedder(Arc::new(StubEmbedder::new(16)));

        for kind in [
            StrategyKind::FixedSize,
            StrategyKind::Recursive,
            StrategyKind::DocumentBased,
            StrategyKind::Hierarchical,
            StrategyKind::Semantic,
            StrategyKind::LateContext,
        ] {
            let chunks = run(&chunker, kind, &text);
            assert_offsets(&text, &chunks)?;
        }
    }
}
