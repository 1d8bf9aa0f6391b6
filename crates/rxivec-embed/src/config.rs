//! Embedder configuration.

use serde::{Deserialize, Serialize};

use crate::pooling::PoolingStrategy;

/// Configuration for the sentence embedder.
///
/// The vector dimensionality is not configured here; it is read from the
/// model's own `config.json` at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    /// Hugging Face model ID
    pub model_id: String,

    /// Maximum sequence length in tokens (default: 512)
    pub max_length: usize,

    /// Batch size for inference (default: 32)
    pub batch_size: usize,

    /// L2-normalize output vectors (default: true)
    pub normalize: bool,

    /// Pooling strategy (default: cls, what mxbai was trained with)
    pub pooling: PoolingStrategy,

    /// Use GPU if a device feature is enabled (default: true)
    pub use_gpu: bool,

    /// Override the Hub download cache directory
    pub cache_dir: Option<String>,

    /// Embedding cache capacity in entries; 0 disables the cache
    pub cache_size: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            model_id: "mixedbread-ai/mxbai-embed-large-v1".to_string(),
            max_length: 512,
            batch_size: 32,
            normalize: true,
            pooling: PoolingStrategy::Cls,
            use_gpu: true,
            cache_dir: None,
            cache_size: 10_000,
        }
    }
}

impl EmbedderConfig {
    /// Config for CPU-only inference.
    pub fn cpu() -> Self {
        Self { use_gpu: false, ..Default::default() }
    }

    /// Use a different model.
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Set the inference batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }
}
