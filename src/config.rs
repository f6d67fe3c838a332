use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// Root directory scanned for source documents.
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.md".to_string(),
        "**/*.txt".to_string(),
        "**/*.pdf".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// SQLite index artifact location.
    pub path: PathBuf,
    /// Directory for intermediate cache artifacts (extraction cache).
    pub cache_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap: default_overlap(),
        }
    }
}

fn default_max_chars() -> usize {
    3500
}
fn default_overlap() -> usize {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

/// Patterns driving the text normalization stages. All fields are optional;
/// an empty config makes the marker-driven stages pass text through
/// unchanged.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct NormalizeConfig {
    /// Marker at which the main content begins. Everything before it is
    /// dropped; the marker itself is kept. Absent marker means the stage
    /// skips without failing.
    #[serde(default)]
    pub start_marker: Option<String>,
    /// Marker after which content is dropped (the marker included).
    #[serde(default)]
    pub end_marker: Option<String>,
    /// Headings of non-content blocks removed up to the next blank line
    /// (discussion questions, media credits, source supplements).
    #[serde(default)]
    pub excise_sections: Vec<String>,
    /// Regex alternatives matched against whole lines to strip running
    /// headers and footers. Joined into one `(?m)^[ \t]*(?:..)[ \t]*$`.
    #[serde(default)]
    pub header_patterns: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "ollama".to_string()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_dims() -> usize {
    768
}
fn default_batch_size() -> usize {
    50
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            url: None,
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_provider() -> String {
    "ollama".to_string()
}
fn default_generation_model() -> String {
    "phi3".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap must be < chunking.max_chars");
    }
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai or ollama.",
            other
        ),
    }
    match config.generation.provider.as_str() {
        "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be openai or ollama.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let f = write_config(
            r#"
[corpus]
root = "./docs"

[index]
path = "./data/lore.sqlite"
cache_dir = "./data/cache"
"#,
        );
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.chunking.max_chars, 3500);
        assert_eq!(config.chunking.overlap, 300);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(config.server.bind, "127.0.0.1:8000");
    }

    #[test]
    fn overlap_must_stay_below_max_chars() {
        let f = write_config(
            r#"
[corpus]
root = "./docs"

[index]
path = "./data/lore.sqlite"
cache_dir = "./data/cache"

[chunking]
max_chars = 100
overlap = 100
"#,
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn zero_top_k_rejected() {
        let f = write_config(
            r#"
[corpus]
root = "./docs"

[index]
path = "./data/lore.sqlite"
cache_dir = "./data/cache"

[retrieval]
top_k = 0
"#,
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn unknown_provider_rejected() {
        let f = write_config(
            r#"
[corpus]
root = "./docs"

[index]
path = "./data/lore.sqlite"
cache_dir = "./data/cache"

[embedding]
provider = "sorcery"
"#,
        );
        assert!(load_config(f.path()).is_err());
    }
}
