use context_text_chunker::{Chunk, ChunkingConfig, FixedSizeChunker};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn chunker(chunk_size: usize, chunk_overlap: usize, min_chunk_size: usize) -> FixedSizeChunker {
    FixedSizeChunker::new(ChunkingConfig {
        chunk_size,
        chunk_overlap,
        min_chunk_size,
        include_timestamps: false,
        ..ChunkingConfig::default()
    })
    .expect("valid config")
}

fn preserving(chunk_size: usize, chunk_overlap: usize) -> FixedSizeChunker {
    FixedSizeChunker::new(ChunkingConfig {
        chunk_size,
        chunk_overlap,
        min_chunk_size: 0,
        preserve_sentences: true,
        preserve_paragraphs: true,
        include_timestamps: false,
        ..ChunkingConfig::default()
    })
    .expect("valid config")
}

fn spans(chunks: &[Chunk]) -> Vec<(usize, usize)> {
    chunks.iter().map(|c| (c.start_idx, c.end_idx)).collect()
}

#[test]
fn alphabet_scenario() {
    let chunks = chunker(10, 3, 1).chunk("ABCDEFGHIJKLMNOPQRSTUVWXYZ");
    let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();

    assert_eq!(
        contents,
        vec!["ABCDEFGHIJ", "HIJKLMNOPQ", "OPQRSTUVWX", "UVWXYZ"]
    );
    assert_eq!(spans(&chunks), vec![(0, 10), (7, 17), (14, 24), (21, 26)]);
}

#[test]
fn overlap_law_on_exact_fit() {
    let text = "a".repeat(25);
    let chunks = chunker(10, 2, 1).chunk(&text);
    let starts: Vec<usize> = chunks.iter().map(|c| c.start_idx).collect();

    assert_eq!(starts, vec![0, 8, 16]);
    assert_eq!(chunks.last().map(|c| c.end_idx), Some(25));
}

#[test]
fn ids_are_reproducible() {
    let text = "The quick brown fox jumps over the lazy dog.";
    let a = chunker(12, 4, 1).chunk(text);
    let b = chunker(12, 4, 1).chunk(text);
    assert_eq!(a, b);
    assert!(a.iter().all(|c| c.id.len() == 32));
}

proptest! {
    #[test]
    fn proptest_windows_step_by_size_minus_overlap(
        len in 1usize..300,
        size in 2usize..40,
        overlap_ratio in 0usize..100,
    ) {
        let overlap = (size - 1) * overlap_ratio / 100;
        let text = "x".repeat(len);
        let chunks = chunker(size, overlap, 1).chunk(&text);
        let step = size - overlap;

        prop_assert!(!chunks.is_empty());
        for (idx, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.start_idx, idx * step);
            prop_assert!(chunk.end_idx - chunk.start_idx <= size);
        }
        prop_assert_eq!(chunks.last().map(|c| c.end_idx), Some(len));
    }

    #[test]
    fn proptest_snapped_windows_cover_every_character(
        text in "[a-z .!?\n]{1,300}",
        size in 2usize..30,
        overlap_ratio in 0usize..100,
    ) {
        let overlap = (size - 1) * overlap_ratio / 100;
        let chunks = preserving(size, overlap).chunk(&text);

        for (offset, ch) in text.char_indices() {
            if ch.is_whitespace() {
                continue;
            }
            prop_assert!(
                chunks.iter().any(|c| c.start_idx <= offset && offset < c.end_idx),
                "byte {} ({:?}) is in no chunk", offset, ch
            );
        }
    }

    #[test]
    fn proptest_identical_input_identical_output(text in "[a-zé ,.\n]{0,200}") {
        let a = chunker(16, 5, 3).chunk(&text);
        let b = chunker(16, 5, 3).chunk(&text);
        prop_assert_eq!(spans(&a), spans(&b));
        let ids_a: Vec<&str> = a.iter().map(|c| c.id.as_str()).collect();
        let ids_b: Vec<&str> = b.iter().map(|c| c.id.as_str()).collect();
        prop_assert_eq!(ids_a, ids_b);
    }
}
