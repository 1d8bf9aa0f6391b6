//! Pooling: token embeddings → one sentence vector.

use candle_core::Tensor;
use serde::{Deserialize, Serialize};

/// How to collapse the `(batch, seq_len, hidden)` token embeddings into
/// `(batch, hidden)` sentence embeddings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PoolingStrategy {
    /// Mean over non-padding tokens
    Mean,

    /// [CLS] token embedding (first token)
    #[default]
    Cls,

    /// Elementwise max over non-padding tokens
    Max,
}

impl PoolingStrategy {
    /// `embeddings`: `(batch, seq_len, hidden)`; `attention_mask`:
    /// `(batch, seq_len)` as F32. Returns `(batch, hidden)`.
    pub fn apply(&self, embeddings: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            PoolingStrategy::Mean => mean_pool(embeddings, attention_mask),
            PoolingStrategy::Cls => cls_pool(embeddings),
            PoolingStrategy::Max => max_pool(embeddings, attention_mask),
        }
    }
}

/// Mask-weighted mean over the sequence dimension.
fn mean_pool(embeddings: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask_expanded = attention_mask.unsqueeze(2)?.expand(embeddings.shape())?;
    let sum_embeddings = (embeddings * &mask_expanded)?.sum(1)?;

    // Token count per row, clamped so all-padding rows don't divide by zero
    let sum_mask = attention_mask.unsqueeze(2)?.sum(1)?.clamp(1e-9f32, f32::MAX)?;

    sum_embeddings.broadcast_div(&sum_mask)
}

fn cls_pool(embeddings: &Tensor) -> candle_core::Result<Tensor> {
    embeddings.narrow(1, 0, 1)?.squeeze(1)
}

/// Max over non-padding tokens; padding positions are pushed to -1e9
/// first so they never win.
fn max_pool(embeddings: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask_expanded = attention_mask.unsqueeze(2)?.expand(embeddings.shape())?;
    let mask_offset = (&mask_expanded - 1.0)?;
    let large_neg = Tensor::new(-1e9f32, embeddings.device())?;
    let masked = embeddings.broadcast_add(&mask_offset.broadcast_mul(&large_neg)?)?;
    masked.max(1)
}

/// L2-normalize `(batch, hidden)` row-wise.
pub fn l2_normalize(embeddings: &Tensor) -> candle_core::Result<Tensor> {
    let norms = embeddings.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(1e-9f32, f32::MAX)?;
    embeddings.broadcast_div(&norms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_mean_pool_skips_padding() {
        let device = Device::Cpu;
        // 2 sequences, 3 tokens, 2-dim embeddings
        let embeddings = Tensor::from_vec(
            vec![
                1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, // seq 1
                1.0, 1.0, 3.0, 3.0, 9.0, 9.0, // seq 2, last token padded
            ],
            (2, 3, 2),
            &device,
        )
        .unwrap();
        let mask = Tensor::from_vec(vec![1.0f32, 1.0, 1.0, 1.0, 1.0, 0.0], (2, 3), &device).unwrap();

        let pooled = mean_pool(&embeddings, &mask).unwrap().to_vec2::<f32>().unwrap();
        assert!((pooled[0][0] - 3.0).abs() < 1e-5);
        assert!((pooled[0][1] - 4.0).abs() < 1e-5);
        // padding token ignored: mean of (1,1) and (3,3)
        assert!((pooled[1][0] - 2.0).abs() < 1e-5);
        assert!((pooled[1][1] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_cls_pool_takes_first_token() {
        let device = Device::Cpu;
        let embeddings =
            Tensor::from_vec(vec![7.0f32, 8.0, 0.0, 0.0], (1, 2, 2), &device).unwrap();
        let pooled = cls_pool(&embeddings).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(pooled[0], vec![7.0, 8.0]);
    }

    #[test]
    fn test_l2_normalize_unit_norm() {
        let device = Device::Cpu;
        let embeddings =
            Tensor::from_vec(vec![3.0f32, 4.0, 1.0, 1.0], (2, 2), &device).unwrap();
        let normalized = l2_normalize(&embeddings).unwrap().to_vec2::<f32>().unwrap();

        assert!((normalized[0][0] - 0.6).abs() < 1e-5);
        assert!((normalized[0][1] - 0.8).abs() < 1e-5);
        for row in normalized {
            let norm: f32 = row.iter().map(|x| x * x).sum();
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_pooling_parses_from_lowercase() {
        let p: PoolingStrategy = serde_json::from_str("\"cls\"").unwrap();
        assert_eq!(p, PoolingStrategy::Cls);
        let p: PoolingStrategy = serde_json::from_str("\"mean\"").unwrap();
        assert_eq!(p, PoolingStrategy::Mean);
    }
}
