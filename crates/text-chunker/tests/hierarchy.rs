use context_text_chunker::{
    ChunkHierarchy, Chunker, ChunkingConfig, HierarchicalChunker, LEVEL_NAMES,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const REPORT: &str = "Quarterly report for the infrastructure team.\n\n\n\
    Uptime stayed above target for the whole quarter. Two incidents were minor.\n\n\
    The storage migration finished two weeks early. Costs dropped by a third.\n\n\n\
    Next quarter focuses on observability. Dashboards will be rebuilt from scratch.";

fn chunker(chunk_size: usize) -> HierarchicalChunker {
    HierarchicalChunker::new(ChunkingConfig {
        chunk_size,
        chunk_overlap: 0,
        include_timestamps: false,
        ..ChunkingConfig::default()
    })
    .expect("valid config")
}

#[test]
fn report_tree_is_navigable() {
    let hierarchy = ChunkHierarchy::from_chunks(chunker(20).chunk(REPORT));
    hierarchy.validate().expect("consistent tree");

    let root = hierarchy.root().expect("root");
    assert_eq!(root.metadata.get_str("level_name"), Some(LEVEL_NAMES[0]));

    let sections = hierarchy.level(1);
    assert_eq!(sections.len(), 3);
    assert_eq!(hierarchy.children(&root.id).len(), 3);

    let paragraphs = hierarchy.children(&sections[1].id);
    assert_eq!(paragraphs.len(), 2);
    assert_eq!(hierarchy.siblings(&paragraphs[0].id).len(), 1);

    let sentence = hierarchy.children(&paragraphs[1].id)[0];
    assert_eq!(sentence.content, "The storage migration finished two weeks early.");
    let ancestry: Vec<Option<usize>> = hierarchy
        .ancestors(&sentence.id)
        .iter()
        .map(|c| c.semantic_level)
        .collect();
    assert_eq!(ancestry, vec![Some(0), Some(1), Some(2)]);
}

#[test]
fn facade_returns_validated_hierarchy() {
    let chunker = Chunker::new(ChunkingConfig {
        chunk_size: 20,
        chunk_overlap: 0,
        include_timestamps: false,
        ..ChunkingConfig::default()
    })
    .expect("chunker");
    let hierarchy = chunker.chunk_hierarchy(REPORT).expect("hierarchy");
    assert_eq!(hierarchy.level(0).len(), 1);
    assert!(hierarchy.level(3).len() >= 5);
}

const SEPARATORS: &[&str] = &[
    "\n\n",
    "\n\n\n",
    "\n",
    "                                             ",
    "\n\n                              \n\n",
];

proptest! {
    #[test]
    fn proptest_links_are_bidirectional(
        paragraphs in prop::collection::vec("[A-Z][a-z ]{5,60}[.!?]( [A-Z][a-z ]{5,60}[.])?", 1..8),
        separators in prop::collection::vec(prop::sample::select(SEPARATORS.to_vec()), 8),
        chunk_size in 2usize..40,
    ) {
        let mut text = String::new();
        for (idx, paragraph) in paragraphs.iter().enumerate() {
            if idx > 0 {
                text.push_str(separators[idx % separators.len()]);
            }
            text.push_str(paragraph);
        }

        let chunks = chunker(chunk_size).chunk(&text);
        let hierarchy = ChunkHierarchy::from_chunks(chunks.clone());
        prop_assert!(hierarchy.validate().is_ok());
        prop_assert_eq!(chunks.iter().filter(|c| c.parent_id.is_none()).count(), 1);

        let levels: Vec<usize> = chunks.iter().filter_map(|c| c.semantic_level).collect();
        let mut sorted = levels.clone();
        sorted.sort_unstable();
        prop_assert_eq!(levels, sorted);

        for chunk in &chunks {
            prop_assert!(!chunk.content.is_empty());
            prop_assert!(chunk.end_idx <= text.len());
            prop_assert!(text.is_char_boundary(chunk.start_idx));
        }
    }
}
