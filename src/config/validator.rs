//! Configuration validation

use super::RagConfig;
use crate::error::{QbankError, Result, ValidationError};

/// Validates a [`RagConfig`], collecting every problem instead of failing on
/// the first one.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &RagConfig) -> Result<()> {
        let mut errors = Vec::new();

        if config.dense_dim == 0 {
            errors.push(ValidationError::new("dense_dim", "must be greater than zero"));
        }

        for (path, value) in [
            ("bm25_top_k", config.bm25_top_k),
            ("dense_top_k", config.dense_top_k),
            ("image_top_k", config.image_top_k),
            ("rerank_top_m", config.rerank_top_m),
            ("final_top_n", config.final_top_n),
        ] {
            if value == 0 {
                errors.push(ValidationError::new(path, "must be greater than zero"));
            }
        }

        if !(config.rrf_k > 0.0) {
            errors.push(ValidationError::new("rrf_k", "must be positive"));
        }

        let weights = [
            ("sparse_weight", config.sparse_weight),
            ("dense_weight", config.dense_weight),
            ("image_weight", config.image_weight),
            ("rrf_weight", config.rrf_weight),
        ];
        for (path, weight) in weights {
            if !(weight >= 0.0) {
                errors.push(ValidationError::new(path, "must be a non-negative number"));
            }
        }
        if weights.iter().all(|(_, weight)| !(*weight > 0.0)) {
            errors.push(ValidationError::new(
                "sparse_weight",
                "at least one fusion weight must be positive",
            ));
        }

        for (path, threshold) in [
            (
                "near_duplicate_threshold",
                config.near_duplicate_threshold,
            ),
            ("duplicate_threshold", config.duplicate_threshold),
        ] {
            if !(0.0..=1.0).contains(&threshold) {
                errors.push(ValidationError::new(path, "must be within [0, 1]"));
            }
        }
        if config.near_duplicate_threshold > config.duplicate_threshold {
            errors.push(ValidationError::new(
                "near_duplicate_threshold",
                "must not exceed duplicate_threshold",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(QbankError::ConfigValidation { errors })
        }
    }
}
