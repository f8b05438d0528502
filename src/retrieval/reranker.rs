//! Deterministic blended reranker.
//!
//! A placeholder for a learned cross-encoder. The contract any replacement
//! must preserve: pure function of `(query, doc_text, dense_score)`, output
//! in [0, 1], higher for more relevant candidates.

use std::sync::Arc;

use ahash::AHashSet;

use crate::embedding::Embedder;
use crate::text::{clamp01, tokenize};

const OVERLAP_WEIGHT: f32 = 0.5;
const COSINE_WEIGHT: f32 = 0.3;
const DENSE_WEIGHT: f32 = 0.2;

/// Blends token containment, embedding cosine, and the dense channel score.
pub struct BlendedReranker {
    embedder: Arc<dyn Embedder>,
}

impl BlendedReranker {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Score one query/candidate pair.
    ///
    /// Overlap is containment (`|q ∩ d| / min(|q|, |d|)`) rather than
    /// Jaccard, so a short query fully covered by a longer document scores
    /// near 1. The embedding cosine and the dense score are rescaled from
    /// [-1, 1] into [0, 1] before blending.
    pub fn score(&self, query: &str, doc_text: &str, dense_score: f32) -> f32 {
        let overlap = token_overlap(query, doc_text);
        let query_vector = self.embedder.embed(query);
        let doc_vector = self.embedder.embed(doc_text);
        let cosine: f32 = query_vector
            .iter()
            .zip(doc_vector.iter())
            .map(|(x, y)| x * y)
            .sum();

        clamp01(
            OVERLAP_WEIGHT * overlap
                + COSINE_WEIGHT * clamp01((cosine + 1.0) / 2.0)
                + DENSE_WEIGHT * clamp01((dense_score + 1.0) / 2.0),
        )
    }
}

fn token_overlap(a: &str, b: &str) -> f32 {
    let set_a: AHashSet<String> = tokenize(a).into_iter().collect();
    let set_b: AHashSet<String> = tokenize(b).into_iter().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    intersection as f32 / set_a.len().min(set_b.len()).max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;

    fn reranker() -> BlendedReranker {
        BlendedReranker::new(Arc::new(HashingEmbedder::new(256)))
    }

    #[test]
    fn test_score_in_unit_interval() {
        let reranker = reranker();
        for (query, doc, dense) in [
            ("solve for x", "solve for x", 1.0),
            ("", "anything", 0.0),
            ("alpha", "omega", -1.0),
            ("cats", "a very long document about dogs and birds", 0.3),
        ] {
            let score = reranker.score(query, doc, dense);
            assert!((0.0..=1.0).contains(&score), "{query:?} -> {score}");
        }
    }

    #[test]
    fn test_identical_pair_scores_high() {
        let reranker = reranker();
        let text = "find the derivative of the polynomial";
        let score = reranker.score(text, text, 1.0);
        assert!(score > 0.95);
    }

    #[test]
    fn test_containment_favors_covered_queries() {
        let reranker = reranker();
        let doc = "the water cycle includes evaporation condensation and precipitation";
        // Every query token appears in the document.
        let covered = reranker.score("evaporation condensation", doc, 0.0);
        let uncovered = reranker.score("plate tectonics", doc, 0.0);
        assert!(covered > uncovered);
    }

    #[test]
    fn test_deterministic() {
        let reranker = reranker();
        let a = reranker.score("magnetic field lines", "field lines of a bar magnet", 0.4);
        let b = reranker.score("magnetic field lines", "field lines of a bar magnet", 0.4);
        assert_eq!(a, b);
    }

    #[test]
    fn test_dense_score_moves_result() {
        let reranker = reranker();
        let low = reranker.score("ohm law", "voltage equals current times resistance", 0.0);
        let high = reranker.score("ohm law", "voltage equals current times resistance", 1.0);
        assert!(high > low);
    }
}
