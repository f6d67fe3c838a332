//! Corpus scanning and text extraction.
//!
//! Scanning walks the configured corpus root and applies include/exclude
//! globs, returning a deterministic (sorted) list of relative source paths.
//! Extraction turns one source file into plain UTF-8 text; it is behind the
//! [`Extractor`] trait so the ingestion pipeline can be tested without
//! touching real files.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::config::CorpusConfig;

/// Produces the raw text of a single corpus document.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// `source` is the path relative to the corpus root, as returned by
    /// [`scan_corpus`].
    async fn extract(&self, source: &str) -> Result<String>;
}

/// Reads documents from the local filesystem. PDF text extraction runs on
/// the blocking pool; markdown and plain text are read as-is.
pub struct FsExtractor {
    root: PathBuf,
}

impl FsExtractor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Extractor for FsExtractor {
    async fn extract(&self, source: &str) -> Result<String> {
        let path = self.root.join(source);
        let is_pdf = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        if is_pdf {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let text = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_from_mem(&bytes)
            })
            .await
            .context("PDF extraction task panicked")?
            .with_context(|| format!("PDF extraction failed for {source}"))?;
            Ok(text)
        } else {
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))
        }
    }
}

/// Walk the corpus root and return the relative paths of all documents that
/// match the include globs and none of the exclude globs. Sorted for
/// deterministic ingestion order.
pub fn scan_corpus(config: &CorpusConfig) -> Result<Vec<String>> {
    let root = &config.root;
    if !root.exists() {
        bail!("Corpus root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut sources = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        sources.push(rel_str);
    }

    sources.sort();

    Ok(sources)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn corpus_config(root: &Path) -> CorpusConfig {
        CorpusConfig {
            root: root.to_path_buf(),
            include_globs: vec!["**/*.md".to_string(), "**/*.txt".to_string()],
            exclude_globs: vec!["drafts/**".to_string()],
        }
    }

    #[test]
    fn scan_matches_globs_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::create_dir_all(dir.path().join("drafts")).unwrap();
        std::fs::write(dir.path().join("b.md"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("skip.rs"), "no").unwrap();
        std::fs::write(dir.path().join("sub/c.md"), "c").unwrap();
        std::fs::write(dir.path().join("drafts/d.md"), "excluded").unwrap();

        let sources = scan_corpus(&corpus_config(dir.path())).unwrap();
        assert_eq!(sources, vec!["a.txt", "b.md", "sub/c.md"]);
    }

    #[test]
    fn scan_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        assert!(scan_corpus(&corpus_config(&gone)).is_err());
    }

    #[tokio::test]
    async fn fs_extractor_reads_text_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.txt"), "hello corpus").unwrap();

        let extractor = FsExtractor::new(dir.path());
        let text = extractor.extract("doc.txt").await.unwrap();
        assert_eq!(text, "hello corpus");
    }

    #[tokio::test]
    async fn fs_extractor_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FsExtractor::new(dir.path());
        assert!(extractor.extract("absent.txt").await.is_err());
    }
}
