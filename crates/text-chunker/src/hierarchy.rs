use crate::error::{ChunkerError, Result};
use crate::types::Chunk;
use std::collections::{HashMap, HashSet};

/// Navigable view over a flattened hierarchical chunk list.
///
/// Chunks live in one arena; links are resolved through an id index, so the
/// tree never holds references into itself.
#[derive(Debug, Clone, Default)]
pub struct ChunkHierarchy {
    chunks: Vec<Chunk>,
    index: HashMap<String, usize>,
}

impl ChunkHierarchy {
    /// Index `chunks` by id. On duplicate ids the first occurrence wins.
    #[must_use]
    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        let mut index = HashMap::with_capacity(chunks.len());
        for (pos, chunk) in chunks.iter().enumerate() {
            index.entry(chunk.id.clone()).or_insert(pos);
        }
        Self { chunks, index }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[must_use]
    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Chunk> {
        self.index.get(id).map(|&pos| &self.chunks[pos])
    }

    #[must_use]
    pub fn parent(&self, id: &str) -> Option<&Chunk> {
        self.get(id)?.parent_id.as_deref().and_then(|pid| self.get(pid))
    }

    /// Children in the order the parent lists them
    #[must_use]
    pub fn children(&self, id: &str) -> Vec<&Chunk> {
        self.get(id)
            .map(|chunk| {
                chunk
                    .children_ids
                    .iter()
                    .filter_map(|child| self.get(child))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Other children of the same parent
    #[must_use]
    pub fn siblings(&self, id: &str) -> Vec<&Chunk> {
        self.parent(id)
            .map(|parent| {
                parent
                    .children_ids
                    .iter()
                    .filter(|child| child.as_str() != id)
                    .filter_map(|child| self.get(child))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ancestors from the root down to the direct parent
    #[must_use]
    pub fn ancestors(&self, id: &str) -> Vec<&Chunk> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(id);
        let mut current = self.parent(id);
        while let Some(parent) = current {
            if !seen.insert(parent.id.as_str()) {
                break;
            }
            chain.push(parent);
            current = self.parent(&parent.id);
        }
        chain.reverse();
        chain
    }

    /// First chunk without a parent
    #[must_use]
    pub fn root(&self) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.parent_id.is_none())
    }

    /// Chunks at `semantic_level == level`, in stored order
    #[must_use]
    pub fn level(&self, level: usize) -> Vec<&Chunk> {
        self.chunks
            .iter()
            .filter(|c| c.semantic_level == Some(level))
            .collect()
    }

    /// Check that every parent link resolves and is mirrored exactly once in
    /// the parent's children, and that every listed child points back.
    pub fn validate(&self) -> Result<()> {
        if self.index.len() != self.chunks.len() {
            return Err(ChunkerError::InvalidHierarchy(
                "duplicate chunk ids".to_string(),
            ));
        }

        for chunk in &self.chunks {
            if let Some(parent_id) = &chunk.parent_id {
                let parent = self.get(parent_id).ok_or_else(|| {
                    ChunkerError::InvalidHierarchy(format!(
                        "chunk {} references missing parent {parent_id}",
                        chunk.id
                    ))
                })?;
                let listed = parent.children_ids.iter().filter(|c| **c == chunk.id).count();
                if listed != 1 {
                    return Err(ChunkerError::InvalidHierarchy(format!(
                        "parent {parent_id} lists child {} {listed} times",
                        chunk.id
                    )));
                }
            }

            for child_id in &chunk.children_ids {
                let child = self.get(child_id).ok_or_else(|| {
                    ChunkerError::InvalidHierarchy(format!(
                        "chunk {} lists missing child {child_id}",
                        chunk.id
                    ))
                })?;
                if child.parent_id.as_deref() != Some(chunk.id.as_str()) {
                    return Err(ChunkerError::InvalidHierarchy(format!(
                        "child {child_id} does not point back to {}",
                        chunk.id
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkMetadata;
    use pretty_assertions::assert_eq;

    fn node(id: &str, parent: Option<&str>, level: usize) -> Chunk {
        let mut chunk = Chunk::new(0, 0, id, ChunkMetadata::for_strategy("test"))
            .with_id(id)
            .with_level(level);
        chunk.parent_id = parent.map(str::to_string);
        chunk
    }

    fn tree() -> ChunkHierarchy {
        let mut root = node("root", None, 0);
        let mut s1 = node("s1", Some("root"), 1);
        let s2 = node("s2", Some("root"), 1);
        let p1 = node("p1", Some("s1"), 2);
        let p2 = node("p2", Some("s1"), 2);
        root.add_child("s1");
        root.add_child("s2");
        s1.add_child("p1");
        s1.add_child("p2");
        ChunkHierarchy::from_chunks(vec![root, s1, s2, p1, p2])
    }

    fn ids(chunks: &[&Chunk]) -> Vec<String> {
        chunks.iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn navigates_links() {
        let tree = tree();
        assert!(tree.validate().is_ok());
        assert_eq!(tree.root().map(|c| c.id.as_str()), Some("root"));
        assert_eq!(ids(&tree.children("s1")), vec!["p1", "p2"]);
        assert_eq!(ids(&tree.siblings("p1")), vec!["p2"]);
        assert_eq!(ids(&tree.ancestors("p2")), vec!["root", "s1"]);
        assert_eq!(tree.parent("s2").map(|c| c.id.as_str()), Some("root"));
        assert_eq!(ids(&tree.level(1)), vec!["s1", "s2"]);
        assert!(tree.siblings("root").is_empty());
    }

    #[test]
    fn detects_one_sided_links() {
        let mut chunks = tree().into_chunks();
        chunks[1].children_ids.clear();
        let err = ChunkHierarchy::from_chunks(chunks).validate().expect_err("broken");
        assert!(matches!(err, ChunkerError::InvalidHierarchy(_)));
    }

    #[test]
    fn detects_missing_parent() {
        let mut chunks = tree().into_chunks();
        chunks.push(node("orphan", Some("nowhere"), 3));
        assert!(ChunkHierarchy::from_chunks(chunks).validate().is_err());
    }

    #[test]
    fn ancestors_stop_on_cycles() {
        let mut a = node("a", Some("b"), 1);
        let mut b = node("b", Some("a"), 1);
        a.add_child("b");
        b.add_child("a");
        let tree = ChunkHierarchy::from_chunks(vec![a, b]);
        assert_eq!(ids(&tree.ancestors("a")), vec!["b"]);
    }
}
