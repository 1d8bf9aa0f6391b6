//! rxivec-embed — abstract embeddings using Candle.
//!
//! Loads a pretrained BERT-family sentence model straight from the
//! Hugging Face Hub and runs batched inference in-process. No Python,
//! no embedding service.
//!
//! # Guarantees
//! - Deterministic: a fixed model version and input string always
//!   produce the same vector.
//! - Batching is a throughput optimization only; batched and
//!   single-item calls are numerically equivalent.
//! - GPU (CUDA, Metal) behind cargo features, automatic CPU fallback.
//!
//! # Example
//! ```rust,no_run
//! use rxivec_embed::{EmbedderConfig, SentenceEmbedder};
//!
//! #[tokio::main]
//! async fn main() -> rxivec_embed::Result<()> {
//!     let embedder = SentenceEmbedder::new(EmbedderConfig::default()).await?;
//!     let vectors = embedder.embed(&["An abstract.".to_string()]).await?;
//!     println!("dim = {}", vectors[0].len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod embedder;
pub mod error;
pub mod pooling;

pub use config::EmbedderConfig;
pub use embedder::SentenceEmbedder;
pub use error::{EmbedError, Result};
pub use pooling::PoolingStrategy;
