//! Brute-force cosine-similarity nearest-neighbor store.

use ahash::AHashMap;

use crate::embedding::cosine_similarity;

/// Generic store of `(id, vector)` pairs searched by exhaustive cosine
/// similarity.
///
/// O(corpus) per query — acceptable at target scale. The `search(vector,
/// top_k)` contract is stable, so an approximate nearest-neighbor structure
/// can replace the backing store behind the identical interface.
pub struct VectorIndex {
    rows: AHashMap<String, Vec<f32>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self {
            rows: AHashMap::new(),
        }
    }

    /// Add or overwrite entries.
    pub fn upsert<I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = (String, Vec<f32>)>,
    {
        for (id, vector) in rows {
            self.rows.insert(id, vector);
        }
    }

    /// Drop entries by id.
    pub fn remove(&mut self, ids: &[String]) {
        for id in ids {
            self.rows.remove(id);
        }
    }

    /// Cosine similarity against every stored vector of matching length.
    /// Mismatched-length vectors are silently skipped; only positive scores
    /// are returned, top-K descending.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<(String, f32)> {
        if query.is_empty() {
            return Vec::new();
        }

        let mut out: Vec<(String, f32)> = Vec::new();
        for (id, vector) in &self.rows {
            if vector.len() != query.len() {
                continue;
            }
            let score = cosine_similarity(query, vector);
            if score > 0.0 {
                out.push((id.clone(), score));
            }
        }
        out.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        out.truncate(top_k);
        out
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new()
    }
}
