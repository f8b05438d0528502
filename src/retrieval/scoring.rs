//! Per-channel candidate scoring, restricted to the metadata allow-list.

use ahash::{AHashMap, AHashSet};

use crate::index::{Bm25Index, VectorIndex};

/// Sparse BM25 channel.
pub fn score_sparse(
    bm25: &Bm25Index,
    query_text: &str,
    top_k: usize,
    allowed: &AHashSet<String>,
) -> Vec<(String, f32)> {
    if query_text.trim().is_empty() {
        return Vec::new();
    }
    bm25.search(query_text, top_k)
        .into_iter()
        .filter(|(qid, _)| allowed.contains(qid))
        .collect()
}

/// Dense channel: cosine against both the stem and explanation indexes,
/// taking the per-qid max — a document is dense-relevant if either its stem
/// or its explanation is close.
pub fn score_dense(
    stem_index: &VectorIndex,
    explanation_index: &VectorIndex,
    query_vector: &[f32],
    top_k: usize,
    allowed: &AHashSet<String>,
) -> Vec<(String, f32)> {
    if query_vector.is_empty() {
        return Vec::new();
    }

    let mut merged: AHashMap<String, f32> = AHashMap::new();
    for (qid, score) in stem_index
        .search(query_vector, top_k)
        .into_iter()
        .chain(explanation_index.search(query_vector, top_k))
    {
        merged
            .entry(qid)
            .and_modify(|s| *s = s.max(score))
            .or_insert(score);
    }

    let mut out: Vec<(String, f32)> = merged
        .into_iter()
        .filter(|(qid, _)| allowed.contains(qid))
        .collect();
    out.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    out.truncate(top_k);
    out
}

/// Image channel: cosine against the image index, with each image hit
/// remapped to its owning question, taking the per-qid max — a question with
/// several images is represented by its best-matching one. Empty unless the
/// query supplies an image vector.
pub fn score_image(
    image_index: &VectorIndex,
    image_owner: &AHashMap<String, String>,
    image_vector: Option<&[f32]>,
    top_k: usize,
    allowed: &AHashSet<String>,
) -> Vec<(String, f32)> {
    let Some(vector) = image_vector else {
        return Vec::new();
    };
    if vector.is_empty() {
        return Vec::new();
    }

    let mut merged: AHashMap<String, f32> = AHashMap::new();
    for (image_id, score) in image_index.search(vector, top_k) {
        let Some(qid) = image_owner.get(&image_id) else {
            continue;
        };
        if !allowed.contains(qid) {
            continue;
        }
        merged
            .entry(qid.clone())
            .and_modify(|s| *s = s.max(score))
            .or_insert(score);
    }

    let mut out: Vec<(String, f32)> = merged.into_iter().collect();
    out.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    out
}
