/// Embedding provider trait and deterministic feature-hashing implementation
use crate::text::{stable_hash, tokenize};

/// Trait for embedding providers
///
/// Allows abstraction over different embedding backends. The engine holds a
/// `dyn Embedder`, so a model-backed provider can be substituted without
/// touching call sites; any replacement must be deterministic per input text
/// and emit vectors of a single fixed dimension.
pub trait Embedder: Send + Sync {
    /// Encode text into a fixed-length vector. Empty or unhashable input
    /// yields the zero vector — this never fails.
    fn embed(&self, text: &str) -> Vec<f32>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the provider name
    fn name(&self) -> &str;
}

/// Deterministic feature-hashing embedder.
///
/// Per token: hash it, map to a bucket `hash mod dim`, pick a sign from an
/// independent hash bit, accumulate, then L2-normalize the whole vector.
/// Similar texts score higher cosine similarity through shared-token
/// collisions, not semantics — an explicit stand-in for a real embedding
/// model.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(512)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut out = vec![0.0f32; self.dim];
        if self.dim == 0 {
            return out;
        }
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return out;
        }

        for token in &tokens {
            let h = stable_hash(token);
            let bucket = u32::from_str_radix(&h[..8], 16).unwrap_or(0) as usize % self.dim;
            let sign = if u32::from_str_radix(&h[8..16], 16).unwrap_or(0) % 2 == 0 {
                1.0
            } else {
                -1.0
            };
            out[bucket] += sign;
        }

        let norm = out.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut out {
                *x /= norm;
            }
        }
        out
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "hashing-embedder"
    }
}
