//! Reciprocal Rank Fusion and weighted hybrid score blending.

use ahash::{AHashMap, AHashSet};

use crate::config::RagConfig;

/// Combine ranked lists by summing `1 / (k + rank + 1)` contributions per
/// document, robust to differing score scales across channels.
pub fn rrf_fuse(rankings: &[&[(String, f32)]], rrf_k: f32) -> Vec<(String, f32)> {
    let mut merged: AHashMap<String, f32> = AHashMap::new();
    for rows in rankings {
        for (rank, (qid, _)) in rows.iter().enumerate() {
            *merged.entry(qid.clone()).or_insert(0.0) += 1.0 / (rrf_k + rank as f32 + 1.0);
        }
    }

    let mut out: Vec<(String, f32)> = merged.into_iter().collect();
    out.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    out
}

/// Divide every score by the list's own maximum, mapping the channel onto
/// 0..1 relative to itself. Empty or non-positive lists normalize to
/// nothing.
fn normalize_by_max(rows: &[(String, f32)]) -> AHashMap<&str, f32> {
    let max = rows.iter().map(|(_, score)| *score).fold(f32::MIN, f32::max);
    if rows.is_empty() || max <= 0.0 {
        return AHashMap::new();
    }
    rows.iter()
        .map(|(qid, score)| (qid.as_str(), score / max))
        .collect()
}

/// Blend the three channel lists and their RRF ranking into one fused list.
///
/// Each list is max-normalized independently, then combined as a weighted
/// sum with the configured channel weights. The weights are not required to
/// sum to 1 — an off-unit total just rescales every fused score by the same
/// factor. Only positive fused scores survive, sorted descending.
pub fn fuse_hybrid_scores(
    bm25_hits: &[(String, f32)],
    dense_hits: &[(String, f32)],
    image_hits: &[(String, f32)],
    config: &RagConfig,
) -> Vec<(String, f32)> {
    let rrf = rrf_fuse(&[bm25_hits, dense_hits, image_hits], config.rrf_k);

    let bm25_norm = normalize_by_max(bm25_hits);
    let dense_norm = normalize_by_max(dense_hits);
    let image_norm = normalize_by_max(image_hits);
    let rrf_norm = normalize_by_max(&rrf);

    let mut qids: AHashSet<&str> = AHashSet::new();
    for rows in [bm25_hits, dense_hits, image_hits] {
        for (qid, _) in rows {
            qids.insert(qid.as_str());
        }
    }
    for (qid, _) in &rrf {
        qids.insert(qid.as_str());
    }

    let mut out: Vec<(String, f32)> = Vec::new();
    for qid in qids {
        let score = config.sparse_weight * bm25_norm.get(qid).copied().unwrap_or(0.0)
            + config.dense_weight * dense_norm.get(qid).copied().unwrap_or(0.0)
            + config.image_weight * image_norm.get(qid).copied().unwrap_or(0.0)
            + config.rrf_weight * rrf_norm.get(qid).copied().unwrap_or(0.0);
        if score > 0.0 {
            out.push((qid.to_string(), score));
        }
    }
    out.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    out
}
