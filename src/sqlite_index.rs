//! Persistent chunk index on SQLite.
//!
//! Chunks are rows with their embedding stored as a little-endian f32 BLOB.
//! Search loads candidate vectors and scores them in Rust with cosine
//! similarity; corpora here are small enough that the brute-force scan is
//! the simplest thing that works.
//!
//! Ingestion completeness is tracked in the `meta` table: an index with
//! chunk rows but no `ingest_complete` marker is a torn build from an
//! interrupted run and is rebuilt rather than reused.

use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use uuid::Uuid;

use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::index::Index;
use crate::migrate;
use crate::models::{Chunk, ScoredChunk};

const COMPLETE_KEY: &str = "ingest_complete";

#[derive(Debug)]
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    /// Open (creating if missing) the index at `path` and apply the schema.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path)
            .await
            .with_context(|| format!("Failed to open index at {}", path.display()))?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Index for SqliteIndex {
    async fn add_batch(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        ensure!(
            chunks.len() == vectors.len(),
            "chunk/vector count mismatch: {} vs {}",
            chunks.len(),
            vectors.len()
        );

        let mut tx = self.pool.begin().await?;
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                "INSERT INTO chunks (id, source, start_offset, content, embedding) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&chunk.source)
            .bind(chunk.start_offset as i64)
            .bind(&chunk.content)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let rows = sqlx::query("SELECT source, start_offset, content, embedding FROM chunks")
            .fetch_all(&self.pool)
            .await?;

        let mut scored: Vec<ScoredChunk> = rows
            .into_iter()
            .map(|row| {
                let embedding = blob_to_vec(row.get::<Vec<u8>, _>("embedding").as_slice());
                ScoredChunk {
                    chunk: Chunk {
                        content: row.get("content"),
                        source: row.get("source"),
                        start_offset: row.get::<i64, _>("start_offset") as usize,
                    },
                    score: cosine_similarity(query, &embedding),
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn is_complete(&self) -> Result<bool> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM meta WHERE key = ?")
            .bind(COMPLETE_KEY)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.as_deref() == Some("1"))
    }

    async fn mark_complete(&self) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO meta (key, value) VALUES (?, '1')")
            .bind(COMPLETE_KEY)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM meta WHERE key = ?")
            .bind(COMPLETE_KEY)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
