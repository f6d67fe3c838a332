//! Chunk index abstraction.
//!
//! An [`Index`] stores embedded chunks and answers nearest-neighbor queries
//! by cosine similarity. The persistent implementation lives in
//! [`crate::sqlite_index`]; [`MemoryIndex`] here backs tests and keeps the
//! pipeline honest about depending only on the trait.

use anyhow::{ensure, Result};
use async_trait::async_trait;
use std::sync::RwLock;

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, ScoredChunk};

#[async_trait]
pub trait Index: Send + Sync {
    /// Insert chunks with their embedding vectors. `chunks` and `vectors`
    /// must have equal length.
    async fn add_batch(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// Top-k chunks by cosine similarity, best first. May return fewer than
    /// `k` when the index holds fewer chunks.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Number of stored chunks.
    async fn count(&self) -> Result<u64>;

    /// Whether a previous ingestion run finished writing this index. An
    /// index with rows but no completion marker is a torn build and must
    /// not be reused.
    async fn is_complete(&self) -> Result<bool>;

    /// Record that ingestion finished. Set only after the last batch.
    async fn mark_complete(&self) -> Result<()>;

    /// Drop all chunks and the completion marker.
    async fn clear(&self) -> Result<()>;
}

/// Non-persistent index, brute-force cosine scan over a guarded Vec.
#[derive(Default)]
pub struct MemoryIndex {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    rows: Vec<(Chunk, Vec<f32>)>,
    complete: bool,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Index for MemoryIndex {
    async fn add_batch(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        ensure!(
            chunks.len() == vectors.len(),
            "chunk/vector count mismatch: {} vs {}",
            chunks.len(),
            vectors.len()
        );
        let mut inner = self.inner.write().unwrap();
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            inner.rows.push((chunk.clone(), vector.clone()));
        }
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let inner = self.inner.read().unwrap();
        let mut scored: Vec<ScoredChunk> = inner
            .rows
            .iter()
            .map(|(chunk, vector)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(query, vector),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.inner.read().unwrap().rows.len() as u64)
    }

    async fn is_complete(&self) -> Result<bool> {
        Ok(self.inner.read().unwrap().complete)
    }

    async fn mark_complete(&self) -> Result<()> {
        self.inner.write().unwrap().complete = true;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.rows.clear();
        inner.complete = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str) -> Chunk {
        Chunk {
            content: content.to_string(),
            source: "doc.md".to_string(),
            start_offset: 0,
        }
    }

    #[tokio::test]
    async fn search_ranks_by_similarity() {
        let index = MemoryIndex::new();
        index
            .add_batch(
                &[chunk("x axis"), chunk("y axis"), chunk("diagonal")],
                &[
                    vec![1.0, 0.0],
                    vec![0.0, 1.0],
                    vec![0.7, 0.7],
                ],
            )
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.content, "x axis");
        assert_eq!(hits[1].chunk.content, "diagonal");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn search_returns_fewer_when_small() {
        let index = MemoryIndex::new();
        index
            .add_batch(&[chunk("only")], &[vec![1.0, 0.0]])
            .await
            .unwrap();
        let hits = index.search(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn mismatched_batch_rejected() {
        let index = MemoryIndex::new();
        assert!(index
            .add_batch(&[chunk("a")], &[vec![1.0], vec![2.0]])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn completion_marker_lifecycle() {
        let index = MemoryIndex::new();
        assert!(!index.is_complete().await.unwrap());
        index
            .add_batch(&[chunk("a")], &[vec![1.0]])
            .await
            .unwrap();
        index.mark_complete().await.unwrap();
        assert!(index.is_complete().await.unwrap());
        assert_eq!(index.count().await.unwrap(), 1);

        index.clear().await.unwrap();
        assert!(!index.is_complete().await.unwrap());
        assert_eq!(index.count().await.unwrap(), 0);
    }
}
