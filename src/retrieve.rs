//! Top-k retrieval and context assembly.

use anyhow::{ensure, Result};
use tracing::debug;

use crate::embedding::{embed_query, Embedder};
use crate::index::Index;
use crate::models::ScoredChunk;

/// Separator between chunks in the assembled context block.
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// Result of a retrieval pass. `chunks` are ranked best-first; `context`
/// joins their texts with [`CONTEXT_DELIMITER`]; `sources` preserves rank
/// order with duplicates removed.
#[derive(Debug, Clone)]
pub struct Retrieved {
    pub chunks: Vec<ScoredChunk>,
    pub context: String,
    pub sources: Vec<String>,
}

impl Retrieved {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Embed the query and fetch the top `k` chunks. `k` must be >= 1; an
/// empty result set is valid (the caller decides how to answer without
/// context).
pub async fn retrieve(
    index: &dyn Index,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
) -> Result<Retrieved> {
    ensure!(k >= 1, "retrieval k must be >= 1");

    let query_vector = embed_query(embedder, query).await?;
    let chunks = index.search(&query_vector, k).await?;

    debug!(k, hits = chunks.len(), "Retrieval complete");

    let context = chunks
        .iter()
        .map(|s| s.chunk.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER);

    let sources = dedup_sources(&chunks);

    Ok(Retrieved {
        chunks,
        context,
        sources,
    })
}

/// Source identifiers in rank order, first occurrence wins.
pub fn dedup_sources(chunks: &[ScoredChunk]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut sources = Vec::new();
    for scored in chunks {
        if seen.insert(scored.chunk.source.as_str()) {
            sources.push(scored.chunk.source.clone());
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn scored(content: &str, source: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                content: content.to_string(),
                source: source.to_string(),
                start_offset: 0,
            },
            score,
        }
    }

    #[test]
    fn dedup_preserves_rank_order() {
        let chunks = vec![
            scored("a", "two.md", 0.9),
            scored("b", "one.md", 0.8),
            scored("c", "two.md", 0.7),
            scored("d", "three.md", 0.6),
        ];
        assert_eq!(dedup_sources(&chunks), vec!["two.md", "one.md", "three.md"]);
    }

    #[test]
    fn dedup_empty_is_empty() {
        assert!(dedup_sources(&[]).is_empty());
    }
}
