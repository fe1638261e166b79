use std::cell::RefCell;

use candle_core::{Device, Tensor};
use pylate_rs::ColBERT;

use crate::{
    embedding::{Embedder, normalize},
    error::{Error, Result},
};

pub const DEFAULT_MODEL_ID: &str = "lightonai/GTE-ModernColBERT-v1";
pub const MODEL_ENV_VAR: &str = "VECSEARCH_MODEL";

/// Select the best available compute device.
///
/// Uses CUDA when compiled with the `cuda` feature, Metal when compiled with
/// the `metal` feature, and falls back to CPU otherwise.
fn default_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            return device;
        }
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            return device;
        }
    }

    Device::Cpu
}

/// ColBERT-backed [`Embedder`].
///
/// ColBERT produces one vector per token; these are mean-pooled over the
/// token axis and L2-normalized so a whole text maps to a single vector.
/// The model is loaded lazily on the first encode call.
pub struct ColbertEmbedder {
    model: RefCell<Option<ColBERT>>,
    model_id: String,
}

impl Default for ColbertEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl ColbertEmbedder {
    /// Creates a new `ColbertEmbedder`. The model ID is resolved from:
    /// 1. The `VECSEARCH_MODEL` environment variable, if set
    /// 2. Otherwise, the default model (`lightonai/GTE-ModernColBERT-v1`)
    pub fn new() -> Self {
        let model_id = std::env::var(MODEL_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string());
        Self::with_model_id(model_id)
    }

    /// Creates a `ColbertEmbedder` with an explicit model ID, bypassing
    /// environment variable resolution.
    pub fn with_model_id(model_id: String) -> Self {
        Self {
            model: RefCell::new(None),
            model_id,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn is_loaded(&self) -> bool {
        self.model.borrow().is_some()
    }

    fn encode(&self, texts: &[String], is_query: bool) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut slot = self.model.borrow_mut();
        if slot.is_none() {
            tracing::info!(model = %self.model_id, "loading ColBERT model");
            let colbert: ColBERT = ColBERT::from(&self.model_id)
                .with_device(default_device())
                .try_into()
                .map_err(|e| {
                    Error::Embedding(format!(
                        "failed to load model {}: {e}",
                        self.model_id
                    ))
                })?;
            *slot = Some(colbert);
        }
        let Some(model) = slot.as_mut() else {
            return Err(Error::Embedding("model not loaded".to_string()));
        };

        let embeddings = model
            .encode(texts, is_query)
            .map_err(|e| Error::Embedding(format!("encode failed: {e}")))?;

        pool(&embeddings)
    }
}

/// Mean-pool a `[batch, tokens, dim]` tensor into normalized `[batch, dim]` rows.
fn pool(embeddings: &Tensor) -> Result<Vec<Vec<f32>>> {
    let mut rows = embeddings
        .mean(1)
        .and_then(|t| t.to_dtype(candle_core::DType::F32))
        .and_then(|t| t.to_vec2::<f32>())
        .map_err(map_candle_err)?;
    for row in &mut rows {
        normalize(row);
    }
    Ok(rows)
}

fn map_candle_err(e: candle_core::Error) -> Error {
    Error::Embedding(format!("tensor computation error: {e}"))
}

impl Embedder for ColbertEmbedder {
    fn id(&self) -> String {
        format!("colbert:{}", self.model_id)
    }

    fn encode_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.encode(texts, false)
    }

    fn encode_query(&self, query: &str) -> Result<Vec<f32>> {
        self.encode(&[query.to_string()], true)?
            .pop()
            .ok_or_else(|| Error::Embedding("empty query embedding".to_string()))
    }
}

impl std::fmt::Debug for ColbertEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColbertEmbedder")
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_model_id_is_kept_and_not_loaded() {
        let embedder = ColbertEmbedder::with_model_id("org/model".to_string());
        assert_eq!(embedder.model_id(), "org/model");
        assert_eq!(embedder.id(), "colbert:org/model");
        assert!(!embedder.is_loaded());
    }

    #[test]
    fn empty_batch_does_not_load_model() {
        let embedder = ColbertEmbedder::with_model_id("org/model".to_string());
        assert!(embedder.encode_documents(&[]).unwrap().is_empty());
        assert!(!embedder.is_loaded());
    }

    #[test]
    fn pool_averages_tokens_and_normalizes() {
        // batch 1, two tokens, dim 2: mean = [2, 0] -> [1, 0]
        let t = Tensor::from_vec(
            vec![1.0f32, 1.0, 3.0, -1.0],
            (1, 2, 2),
            &Device::Cpu,
        )
        .unwrap();
        let rows = pool(&t).unwrap();
        assert_eq!(rows, vec![vec![1.0, 0.0]]);
    }
}
