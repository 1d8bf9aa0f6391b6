//! Sentence embedder backed by Candle's BERT implementation.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, HiddenAct, PositionEmbeddingType};
use hf_hub::api::sync::{Api, ApiBuilder};
use hf_hub::{Repo, RepoType};
use lru::LruCache;
use tokenizers::models::wordpiece::WordPieceBuilder;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::config::EmbedderConfig;
use crate::error::{EmbedError, Result};
use crate::pooling::l2_normalize;

/// Embeds abstracts with a pretrained BERT-family model.
///
/// The model is fetched from the Hugging Face Hub on first use and kept
/// resident for the whole run. Inference carries no randomness, so a given
/// input string always maps to the same vector for a fixed model version.
pub struct SentenceEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    config: EmbedderConfig,
    dim: usize,
    cache: Option<Mutex<LruCache<String, Vec<f32>>>>,
}

impl SentenceEmbedder {
    /// Download (if needed) and load the configured model.
    pub async fn new(config: EmbedderConfig) -> Result<Self> {
        let start = Instant::now();
        info!("Loading embedding model: {}", config.model_id);

        let device = Self::select_device(&config);
        debug!("Using device: {:?}", device);

        // Hub downloads use the sync API; keep them off the async runtime.
        let model_id = config.model_id.clone();
        let cache_dir = config.cache_dir.clone();
        let (bert_config, tokenizer, weights_path) =
            tokio::task::spawn_blocking(move || fetch_model_files(&model_id, cache_dir))
                .await
                .map_err(|e| EmbedError::Download(e.to_string()))??;

        let dim = bert_config.hidden_size;

        let vb = if weights_path.extension().map(|e| e == "safetensors").unwrap_or(false) {
            unsafe { VarBuilder::from_mmaped_safetensors(&[&weights_path], DType::F32, &device)? }
        } else {
            VarBuilder::from_pth(&weights_path, DType::F32, &device)?
        };
        let model = BertModel::load(vb, &bert_config)
            .map_err(|e| EmbedError::ModelLoad(e.to_string()))?;
        info!(dim, "Model loaded in {:.2}s", start.elapsed().as_secs_f32());

        let cache = NonZeroUsize::new(config.cache_size)
            .map(|n| Mutex::new(LruCache::new(n)));

        Ok(Self { model, tokenizer, device, config, dim, cache })
    }

    fn select_device(config: &EmbedderConfig) -> Device {
        if !config.use_gpu {
            return Device::Cpu;
        }

        #[cfg(feature = "cuda")]
        {
            match Device::new_cuda(0) {
                Ok(device) => {
                    info!("CUDA device available");
                    return device;
                }
                Err(e) => debug!("CUDA not available: {}, falling back to CPU", e),
            }
        }

        #[cfg(feature = "metal")]
        {
            match Device::new_metal(0) {
                Ok(device) => {
                    info!("Metal device available");
                    return device;
                }
                Err(e) => debug!("Metal not available: {}, falling back to CPU", e),
            }
        }

        Device::Cpu
    }

    /// Embed a list of texts, batching internally.
    ///
    /// Output order matches input order. Batched and single-item calls
    /// produce the same vectors.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(texts.len());

        // Serve what we can from the cache
        let mut pending: Vec<(usize, &str)> = Vec::new();
        if let Some(cache) = &self.cache {
            let mut guard = cache.lock().unwrap_or_else(|e| e.into_inner());
            for (i, text) in texts.iter().enumerate() {
                match guard.get(text) {
                    Some(hit) => indexed.push((i, hit.clone())),
                    None => pending.push((i, text.as_str())),
                }
            }
        } else {
            pending = texts.iter().enumerate().map(|(i, t)| (i, t.as_str())).collect();
        }

        for batch in pending.chunks(self.config.batch_size) {
            let batch_texts: Vec<&str> = batch.iter().map(|(_, t)| *t).collect();
            let vectors = self.forward_batch(&batch_texts)?;

            if let Some(cache) = &self.cache {
                let mut guard = cache.lock().unwrap_or_else(|e| e.into_inner());
                for ((_, text), vector) in batch.iter().zip(vectors.iter()) {
                    guard.put((*text).to_string(), vector.clone());
                }
            }
            for ((i, _), vector) in batch.iter().zip(vectors) {
                indexed.push((*i, vector));
            }
        }

        indexed.sort_by_key(|(i, _)| *i);
        debug!(
            n = texts.len(),
            "Embedded batch in {:.1}ms",
            start.elapsed().as_secs_f32() * 1000.0
        );
        Ok(indexed.into_iter().map(|(_, v)| v).collect())
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let input = [text.to_string()];
        let vectors = self.embed(&input).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::InvalidInput("no embedding produced".to_string()))
    }

    /// One tokenize → forward → pool pass over at most `batch_size` texts.
    fn forward_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbedError::Tokenizer(e.to_string()))?;

        let max_allowed = self.config.max_length.min(512);
        let mut input_ids_vec = Vec::with_capacity(texts.len());
        let mut attention_mask_vec = Vec::with_capacity(texts.len());
        let mut token_type_ids_vec = Vec::with_capacity(texts.len());

        for encoding in &encodings {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let type_ids = encoding.get_type_ids();
            let len = ids.len().min(max_allowed);

            input_ids_vec.push(ids[..len].to_vec());
            attention_mask_vec.push(mask[..len].to_vec());
            token_type_ids_vec.push(type_ids[..len].to_vec());
        }

        // Pad every row to the longest sequence in this batch
        let max_len = input_ids_vec.iter().map(|v| v.len()).max().unwrap_or(0);
        for ((ids, mask), type_ids) in input_ids_vec
            .iter_mut()
            .zip(attention_mask_vec.iter_mut())
            .zip(token_type_ids_vec.iter_mut())
        {
            let pad = max_len - ids.len();
            ids.extend(std::iter::repeat_n(0, pad));
            mask.extend(std::iter::repeat_n(0, pad));
            type_ids.extend(std::iter::repeat_n(0, pad));
        }

        let batch_size = texts.len();
        let input_ids = Tensor::new(input_ids_vec, &self.device)?.reshape((batch_size, max_len))?;
        // F32 mask: the pooling math multiplies by it
        let attention_mask = Tensor::new(attention_mask_vec, &self.device)?
            .reshape((batch_size, max_len))?
            .to_dtype(DType::F32)?;
        let token_type_ids =
            Tensor::new(token_type_ids_vec, &self.device)?.reshape((batch_size, max_len))?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = self.config.pooling.apply(&hidden, &attention_mask)?;
        let pooled = if self.config.normalize { l2_normalize(&pooled)? } else { pooled };

        Ok(pooled.to_vec2::<f32>()?)
    }

    /// Vector dimensionality, read from the model's own config.
    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn model_name(&self) -> &str {
        &self.config.model_id
    }

    pub fn is_gpu(&self) -> bool {
        matches!(self.device, Device::Cuda(_) | Device::Metal(_))
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }
}

/// Resolve config, tokenizer, and weights from the Hub (cached on disk).
fn fetch_model_files(
    model_id: &str,
    cache_dir: Option<String>,
) -> Result<(Config, Tokenizer, PathBuf)> {
    let api = match cache_dir {
        Some(dir) => ApiBuilder::new().with_cache_dir(PathBuf::from(dir)).build(),
        None => Api::new(),
    }
    .map_err(|e| EmbedError::Download(format!("API init: {e}")))?;
    let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

    let config_path = repo
        .get("config.json")
        .map_err(|e| EmbedError::Download(format!("config.json: {e}")))?;
    let bert_config = load_bert_config(&config_path)?;

    // tokenizer.json for modern repos, vocab.txt WordPiece for older BERTs
    let tokenizer = match repo.get("tokenizer.json") {
        Ok(path) => Tokenizer::from_file(&path).map_err(|e| EmbedError::Tokenizer(e.to_string()))?,
        Err(_) => {
            let vocab_path = repo
                .get("vocab.txt")
                .map_err(|e| EmbedError::Download(format!("vocab.txt: {e}")))?;
            let vocab: tokenizers::models::bpe::Vocab =
                std::fs::read_to_string(&vocab_path)?
                    .lines()
                    .enumerate()
                    .map(|(i, line)| (line.to_string(), i as u32))
                    .collect();
            let wordpiece = WordPieceBuilder::new()
                .vocab(vocab)
                .continuing_subword_prefix("##".to_string())
                .max_input_chars_per_word(100)
                .unk_token("[UNK]".to_string())
                .build()
                .map_err(|e| EmbedError::Tokenizer(format!("WordPiece build: {e}")))?;
            Tokenizer::new(wordpiece)
        }
    };

    let weights_path = repo
        .get("model.safetensors")
        .or_else(|_| repo.get("pytorch_model.bin"))
        .map_err(|e| EmbedError::Download(format!("model weights: {e}")))?;

    Ok((bert_config, tokenizer, weights_path))
}

/// Build a Candle BERT config from the repo's `config.json`, tolerating
/// fields older checkpoints leave out.
fn load_bert_config(path: &PathBuf) -> Result<Config> {
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;

    let hidden_act = match json.get("hidden_act").and_then(|v| v.as_str()) {
        Some("relu") => HiddenAct::Relu,
        Some("gelu_new") | Some("gelu_approximate") => HiddenAct::GeluApproximate,
        _ => HiddenAct::Gelu,
    };

    let get_usize = |key: &str, default: usize| {
        json.get(key).and_then(|v| v.as_u64()).map(|v| v as usize).unwrap_or(default)
    };
    let get_f64 = |key: &str, default: f64| json.get(key).and_then(|v| v.as_f64()).unwrap_or(default);

    Ok(Config {
        vocab_size: get_usize("vocab_size", 30522),
        hidden_size: get_usize("hidden_size", 768),
        num_hidden_layers: get_usize("num_hidden_layers", 12),
        num_attention_heads: get_usize("num_attention_heads", 12),
        intermediate_size: get_usize("intermediate_size", 3072),
        hidden_act,
        hidden_dropout_prob: get_f64("hidden_dropout_prob", 0.1),
        max_position_embeddings: get_usize("max_position_embeddings", 512),
        type_vocab_size: get_usize("type_vocab_size", 2),
        initializer_range: get_f64("initializer_range", 0.02),
        layer_norm_eps: get_f64("layer_norm_eps", 1e-12),
        pad_token_id: get_usize("pad_token_id", 0),
        position_embedding_type: PositionEmbeddingType::Absolute,
        use_cache: true,
        classifier_dropout: None,
        model_type: None,
    })
}
