//! Ingestion pipeline: corpus to populated chunk index.
//!
//! `ensure_index` is the single entry point. It decides between three paths,
//! cheapest first:
//!
//! 1. **Reuse** a populated, completely-written index untouched.
//! 2. **Rebuild from cache**: re-chunk and re-embed from the extraction
//!    cache artifact, skipping document extraction.
//! 3. **Rebuild from scratch**: scan the corpus, extract every document,
//!    persist the extraction cache, then chunk and embed.
//!
//! Corrupt or unreadable artifacts are never fatal: they are logged and the
//! pipeline falls through to the next-cheaper path. Fatal conditions (empty
//! corpus, extraction/embedding/index failures) carry the [`IngestError`]
//! taxonomy.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::chunk::split_text;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::extract::{scan_corpus, Extractor};
use crate::index::Index;
use crate::models::RawDocument;
use crate::normalize::Normalizer;
use crate::sqlite_index::SqliteIndex;

/// Fatal ingestion failures. Anything not listed here is degraded-mode
/// behavior (warn and fall back), not an error.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("No ingestible documents under corpus root {0}")]
    EmptyCorpus(PathBuf),

    #[error("Corpus scan failed")]
    Scan(#[source] anyhow::Error),

    #[error("Extraction failed for {source}")]
    Extraction {
        source: String,
        #[source]
        cause: anyhow::Error,
    },

    #[error("Invalid pipeline configuration")]
    Config(#[source] anyhow::Error),

    #[error("Embedding failed")]
    Embedding(#[source] anyhow::Error),

    #[error("Index operation failed")]
    Index(#[source] anyhow::Error),
}

/// The path `ensure_index` will take, decided up front from two probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestPlan {
    ReuseIndex,
    RebuildFromCache,
    RebuildFromScratch,
}

/// Pure decision function for the ingestion ladder. A populated index wins
/// unconditionally; the cache only matters when the index is unusable.
pub fn plan(index_ready: bool, cache_loadable: bool) -> IngestPlan {
    if index_ready {
        IngestPlan::ReuseIndex
    } else if cache_loadable {
        IngestPlan::RebuildFromCache
    } else {
        IngestPlan::RebuildFromScratch
    }
}

const CACHE_VERSION: u32 = 1;

/// On-disk extraction cache: raw document texts keyed by source, written
/// after a successful scan+extract pass so a crashed run can skip straight
/// to chunking on retry.
#[derive(Serialize, Deserialize)]
struct ExtractionCache {
    version: u32,
    generated_at: chrono::DateTime<chrono::Utc>,
    documents: Vec<RawDocument>,
}

pub fn cache_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("extracted.json")
}

/// Load the extraction cache. Missing, unreadable, corrupt, or
/// version-mismatched artifacts all return `None` (with a warning for the
/// non-missing cases); the caller falls back to scratch extraction.
fn load_cache(path: &Path) -> Option<Vec<RawDocument>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Extraction cache unreadable, ignoring");
            return None;
        }
    };

    match serde_json::from_str::<ExtractionCache>(&content) {
        Ok(cache) if cache.version == CACHE_VERSION => {
            info!(
                path = %path.display(),
                generated_at = %cache.generated_at,
                documents = cache.documents.len(),
                "Loaded extraction cache"
            );
            Some(cache.documents)
        }
        Ok(cache) => {
            warn!(
                path = %path.display(),
                found = cache.version,
                expected = CACHE_VERSION,
                "Extraction cache version mismatch, ignoring"
            );
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Extraction cache corrupt, ignoring");
            None
        }
    }
}

/// Write the extraction cache atomically: serialize to a sibling temp file,
/// then rename over the target so readers never observe a partial artifact.
fn persist_cache(path: &Path, documents: &[RawDocument]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let cache = ExtractionCache {
        version: CACHE_VERSION,
        generated_at: chrono::Utc::now(),
        documents: documents.to_vec(),
    };
    let json = serde_json::to_string(&cache)?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Delete the index database (including its WAL sidecar files) and the
/// extraction cache so the next ingest runs from scratch. Missing files are
/// fine. The sidecars must go with the database: recreating a database
/// under a stale `-wal` file can replay old frames into the fresh file.
pub fn discard_artifacts(config: &Config) -> anyhow::Result<Vec<PathBuf>> {
    let mut targets: Vec<PathBuf> = Vec::new();
    for suffix in ["", "-wal", "-shm"] {
        let mut os = config.index.path.as_os_str().to_owned();
        os.push(suffix);
        targets.push(PathBuf::from(os));
    }
    targets.push(cache_path(&config.index.cache_dir));

    let mut removed = Vec::new();
    for path in targets {
        match std::fs::remove_file(&path) {
            Ok(()) => removed.push(path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(removed)
}

/// Open the index and make sure it is populated, extracting and embedding
/// the corpus if needed. Idempotent: a second call against a completed
/// index does no extraction or embedding work.
pub async fn ensure_index(
    config: &Config,
    extractor: &dyn Extractor,
    embedder: &dyn Embedder,
) -> Result<SqliteIndex, IngestError> {
    let index = SqliteIndex::open(&config.index.path)
        .await
        .map_err(IngestError::Index)?;

    let index_ready = index.is_complete().await.map_err(IngestError::Index)?
        && index.count().await.map_err(IngestError::Index)? > 0;

    let cache_file = cache_path(&config.index.cache_dir);
    let cached = if index_ready { None } else { load_cache(&cache_file) };

    match plan(index_ready, cached.is_some()) {
        IngestPlan::ReuseIndex => {
            info!(path = %config.index.path.display(), "Reusing populated index");
            Ok(index)
        }
        IngestPlan::RebuildFromCache => {
            let documents = cached.unwrap_or_default();
            info!(documents = documents.len(), "Rebuilding index from extraction cache");
            index.clear().await.map_err(IngestError::Index)?;
            build_index(&index, &documents, config, embedder).await?;
            Ok(index)
        }
        IngestPlan::RebuildFromScratch => {
            info!(root = %config.corpus.root.display(), "Building index from corpus");
            let documents = extract_corpus(config, extractor).await?;

            if let Err(e) = persist_cache(&cache_file, &documents) {
                // Losing the cache only costs the crash-retry shortcut.
                warn!(path = %cache_file.display(), error = %e, "Failed to persist extraction cache");
            }

            index.clear().await.map_err(IngestError::Index)?;
            build_index(&index, &documents, config, embedder).await?;
            Ok(index)
        }
    }
}

/// Scan the corpus and extract every matching document.
async fn extract_corpus(
    config: &Config,
    extractor: &dyn Extractor,
) -> Result<Vec<RawDocument>, IngestError> {
    let sources = scan_corpus(&config.corpus).map_err(IngestError::Scan)?;
    if sources.is_empty() {
        return Err(IngestError::EmptyCorpus(config.corpus.root.clone()));
    }

    let mut documents = Vec::with_capacity(sources.len());
    for source in sources {
        let text = extractor
            .extract(&source)
            .await
            .map_err(|cause| IngestError::Extraction {
                source: source.clone(),
                cause,
            })?;
        documents.push(RawDocument { source, text });
    }
    Ok(documents)
}

/// Normalize, chunk, embed, and store the given documents, then set the
/// completion marker. Shared by both rebuild paths (and by tests over the
/// in-memory index). Returns the number of chunks stored.
pub async fn build_index(
    index: &dyn Index,
    documents: &[RawDocument],
    config: &Config,
    embedder: &dyn Embedder,
) -> Result<u64, IngestError> {
    let normalizer = Normalizer::new(&config.normalize).map_err(IngestError::Config)?;

    let mut chunks = Vec::new();
    for doc in documents {
        let text = normalizer.normalize(&doc.text);
        chunks.extend(split_text(
            &doc.source,
            &text,
            config.chunking.max_chars,
            config.chunking.overlap,
        ));
    }

    if chunks.is_empty() {
        // Documents existed but yielded no text worth indexing.
        return Err(IngestError::EmptyCorpus(config.corpus.root.clone()));
    }

    let mut stored = 0u64;
    for batch in chunks.chunks(config.embedding.batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder.embed(&texts).await.map_err(IngestError::Embedding)?;
        if vectors.len() != batch.len() {
            return Err(IngestError::Embedding(anyhow::anyhow!(
                "Embedder returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }
        index
            .add_batch(batch, &vectors)
            .await
            .map_err(IngestError::Index)?;
        stored += batch.len() as u64;
    }

    index.mark_complete().await.map_err(IngestError::Index)?;

    info!(
        documents = documents.len(),
        chunks = stored,
        model = embedder.model_name(),
        "Index build complete"
    );
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_prefers_index_then_cache() {
        assert_eq!(plan(true, true), IngestPlan::ReuseIndex);
        assert_eq!(plan(true, false), IngestPlan::ReuseIndex);
        assert_eq!(plan(false, true), IngestPlan::RebuildFromCache);
        assert_eq!(plan(false, false), IngestPlan::RebuildFromScratch);
    }

    #[test]
    fn cache_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = cache_path(dir.path());
        let docs = vec![RawDocument {
            source: "a.md".to_string(),
            text: "hello".to_string(),
        }];

        persist_cache(&path, &docs).unwrap();
        let loaded = load_cache(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].source, "a.md");
        assert_eq!(loaded[0].text, "hello");
    }

    #[test]
    fn missing_cache_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_cache(&cache_path(dir.path())).is_none());
    }

    #[test]
    fn corrupt_cache_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = cache_path(dir.path());
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_cache(&path).is_none());
    }

    #[test]
    fn version_mismatch_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = cache_path(dir.path());
        std::fs::write(
            &path,
            r#"{"version": 99, "generated_at": "2026-01-01T00:00:00Z", "documents": []}"#,
        )
        .unwrap();
        assert!(load_cache(&path).is_none());
    }

    #[test]
    fn persist_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = cache_path(dir.path());
        persist_cache(&path, &[]).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
