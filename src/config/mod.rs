//! Engine configuration: tunables, defaults, and validation.

use crate::error::{QbankError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod validator;

pub use validator::ConfigValidator;

/// Immutable retrieval tunables, supplied once at engine construction.
///
/// Every field has a fixed default, and a partial TOML/JSON document merges
/// over those defaults during deserialization. The four fusion weights are
/// not required to sum to 1 — an off-unit total rescales every fused score
/// by the same factor without changing ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Dimensionality of all deterministic embeddings.
    pub dense_dim: usize,
    /// Per-channel candidate counts.
    pub bm25_top_k: usize,
    pub dense_top_k: usize,
    pub image_top_k: usize,
    /// Reciprocal-rank-fusion constant.
    pub rrf_k: f32,
    /// Fusion weights for the sparse, dense, image, and RRF channels.
    pub sparse_weight: f32,
    pub dense_weight: f32,
    pub image_weight: f32,
    pub rrf_weight: f32,
    /// How many fused candidates are reranked.
    pub rerank_top_m: usize,
    /// How many reranked results are returned.
    pub final_top_n: usize,
    /// Rerank-score cutpoints for the near-duplicate and duplicate tiers;
    /// also the ingestion-time near-duplicate cosine threshold.
    pub near_duplicate_threshold: f32,
    pub duplicate_threshold: f32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            dense_dim: 512,
            bm25_top_k: 300,
            dense_top_k: 300,
            image_top_k: 300,
            rrf_k: 60.0,
            sparse_weight: 0.45,
            dense_weight: 0.45,
            image_weight: 0.10,
            rrf_weight: 0.15,
            rerank_top_m: 200,
            final_top_n: 20,
            near_duplicate_threshold: 0.85,
            duplicate_threshold: 0.95,
        }
    }
}

impl RagConfig {
    /// Load configuration from a TOML file, merging over defaults and
    /// validating the result.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(QbankError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| QbankError::Io {
            source: e,
            context: format!("failed to read config file: {}", path.display()),
        })?;
        let config: RagConfig = toml::from_str(&content)?;

        ConfigValidator::validate(&config)?;

        Ok(config)
    }
}
