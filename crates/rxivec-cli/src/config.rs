//! Configuration loading for rxivec.
//! Reads rxivec.toml from the current directory or the path in the
//! RXIVEC_CONFIG env var; every field has a default so the file is
//! optional. CLI flags override whatever the file says.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rxivec_common::corpus;
use rxivec_embed::{EmbedderConfig, PoolingStrategy};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Preprint server prefix, "bio" or "med"
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Input directory; defaults to `{prefix}rxiv-xml-dump`
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Where output tables and error logs land
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_prefix() -> String { "bio".to_string() }
fn default_output_dir() -> PathBuf { PathBuf::from(".") }

impl Default for CorpusConfig {
    fn default() -> Self {
        Self { prefix: default_prefix(), data_dir: None, output_dir: default_output_dir() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Extraction worker count; 1 runs the file loop sequentially
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize { 1 }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { workers: default_workers() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embed_model")]
    pub model: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_normalize")]
    pub normalize: bool,
    #[serde(default)]
    pub pooling: PoolingStrategy,
    #[serde(default = "default_use_gpu")]
    pub use_gpu: bool,
    #[serde(default)]
    pub cache_dir: Option<String>,
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
}

fn default_embed_model() -> String { "mixedbread-ai/mxbai-embed-large-v1".to_string() }
fn default_batch_size() -> usize { 32 }
fn default_max_length() -> usize { 512 }
fn default_normalize() -> bool { true }
fn default_use_gpu() -> bool { true }
fn default_cache_size() -> usize { 10_000 }

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embed_model(),
            batch_size: default_batch_size(),
            max_length: default_max_length(),
            normalize: default_normalize(),
            pooling: PoolingStrategy::default(),
            use_gpu: default_use_gpu(),
            cache_dir: None,
            cache_size: default_cache_size(),
        }
    }
}

impl EmbeddingConfig {
    pub fn to_embedder_config(&self) -> EmbedderConfig {
        EmbedderConfig {
            model_id: self.model.clone(),
            max_length: self.max_length,
            batch_size: self.batch_size,
            normalize: self.normalize,
            pooling: self.pooling,
            use_gpu: self.use_gpu,
            cache_dir: self.cache_dir.clone(),
            cache_size: self.cache_size,
        }
    }
}

impl Config {
    /// Load config. An explicitly passed path must exist; the implicit
    /// search (RXIVEC_CONFIG, then ./rxivec.toml) falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("config file not found: {}", path.display());
                }
                path.to_path_buf()
            }
            None => {
                let path = std::env::var("RXIVEC_CONFIG")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("rxivec.toml"));
                if !path.exists() {
                    debug!("No config at {}, using defaults", path.display());
                    return Ok(Self::default());
                }
                path
            }
        };

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.corpus
            .data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(corpus::xml_dump_dir(&self.corpus.prefix)))
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.corpus.output_dir.join(corpus::metadata_file(&self.corpus.prefix))
    }

    pub fn embeddings_path(&self) -> PathBuf {
        self.corpus.output_dir.join(corpus::embeddings_file(&self.corpus.prefix))
    }

    pub fn merged_path(&self) -> PathBuf {
        self.corpus.output_dir.join(corpus::merged_file(&self.corpus.prefix))
    }

    pub fn metadata_error_log_path(&self) -> PathBuf {
        self.corpus.output_dir.join(corpus::metadata_error_log(&self.corpus.prefix))
    }

    pub fn embed_error_log_path(&self) -> PathBuf {
        self.corpus.output_dir.join(corpus::embed_error_log(&self.corpus.prefix))
    }
}
