//! Text embedders.
//!
//! An [`Embedder`] turns text into a dense vector; the vector stores compare
//! those vectors to rank documents and terms. Two implementations ship:
//! [`HashingEmbedder`], a deterministic bag-of-words projection that needs no
//! model, and [`ColbertEmbedder`], a ColBERT model run through `pylate-rs`.

use clap::ValueEnum;

use crate::{error::Result, model_manager::ColbertEmbedder, tokenizer::tokenize};

/// Default width of [`HashingEmbedder`] vectors.
pub const DEFAULT_HASH_DIMENSION: usize = 1024;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

pub trait Embedder {
    /// Stable fingerprint of the embedding space. Collections remember the
    /// fingerprint they were built with.
    fn id(&self) -> String;

    /// Encode documents, one vector per input text.
    fn encode_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Encode a query into the same space as the documents.
    fn encode_query(&self, query: &str) -> Result<Vec<f32>>;
}

/// Which embedder the CLI should construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// ColBERT model (downloaded from HuggingFace on first use)
    Colbert,
    /// Feature-hashing bag of words, no model required
    Hash,
}

/// Construct the embedder for `kind`. `model` only applies to ColBERT.
pub fn build_embedder(
    kind: EmbedderKind,
    model: Option<&str>,
) -> Box<dyn Embedder> {
    match kind {
        EmbedderKind::Colbert => match model {
            Some(id) => Box::new(ColbertEmbedder::with_model_id(id.to_string())),
            None => Box::new(ColbertEmbedder::new()),
        },
        EmbedderKind::Hash => Box::new(HashingEmbedder::default()),
    }
}

/// Feature-hashing embedder.
///
/// Each token from [`tokenize`] is hashed with FNV-1a into one of
/// `dimension` buckets; the top hash bit picks the sign. The result is
/// L2-normalized, so texts sharing no tokens are (modulo collisions)
/// orthogonal and identical token bags map to the same vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIMENSION)
    }
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 1 { -1.0 } else { 1.0 };
            vector[bucket] += sign;
        }
        normalize(&mut vector);
        vector
    }
}

impl Embedder for HashingEmbedder {
    fn id(&self) -> String {
        format!("hash-{}", self.dimension)
    }

    fn encode_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn encode_query(&self, query: &str) -> Result<Vec<f32>> {
        Ok(self.embed(query))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// Scale `vector` to unit length in place. Zero vectors are left alone.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}
