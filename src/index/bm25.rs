//! Inverted-postings BM25 index over tokenized question text.

use ahash::{AHashMap, AHashSet};

use crate::text::tokenize;

const K1: f32 = 1.2;
const B: f32 = 0.75;

/// Sparse lexical index with BM25 ranking.
///
/// `add_documents` rebuilds the postings from the given row set alone —
/// callers pass the complete corpus each time, not incremental deltas.
pub struct Bm25Index {
    k1: f32,
    b: f32,
    docs: AHashMap<String, Vec<String>>,
    doc_len: AHashMap<String, usize>,
    inverted: AHashMap<String, Vec<(String, u32)>>,
    total_docs: usize,
    avg_doc_len: f32,
}

impl Bm25Index {
    pub fn new() -> Self {
        Self {
            k1: K1,
            b: B,
            docs: AHashMap::new(),
            doc_len: AHashMap::new(),
            inverted: AHashMap::new(),
            total_docs: 0,
            avg_doc_len: 0.0,
        }
    }

    /// Replace the indexed corpus with the given `(qid, text)` rows and
    /// rebuild postings and length statistics.
    pub fn add_documents(&mut self, rows: &[(String, String)]) {
        self.docs.clear();
        for (qid, text) in rows {
            self.docs.insert(qid.clone(), tokenize(text));
        }
        self.rebuild();
    }

    /// Drop documents and recompute postings and length statistics.
    pub fn remove_documents(&mut self, qids: &[String]) {
        for qid in qids {
            self.docs.remove(qid);
        }
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.doc_len.clear();
        self.inverted.clear();
        let mut total_len = 0usize;

        for (qid, tokens) in &self.docs {
            total_len += tokens.len();
            self.doc_len.insert(qid.clone(), tokens.len());
            let mut tf: AHashMap<&str, u32> = AHashMap::new();
            for token in tokens {
                *tf.entry(token.as_str()).or_insert(0) += 1;
            }
            for (term, count) in tf {
                self.inverted
                    .entry(term.to_string())
                    .or_default()
                    .push((qid.clone(), count));
            }
        }

        self.total_docs = self.docs.len();
        self.avg_doc_len = if self.total_docs > 0 {
            total_len as f32 / self.total_docs as f32
        } else {
            0.0
        };
    }

    /// Score the corpus against the query and return the top-K hits by
    /// descending BM25 score, excluding non-positive scores.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(String, f32)> {
        let q_terms: AHashSet<String> = tokenize(query).into_iter().collect();
        if q_terms.is_empty() || self.total_docs == 0 {
            return Vec::new();
        }

        let mut scores: AHashMap<&str, f32> = AHashMap::new();
        let avgdl = self.avg_doc_len.max(1.0);
        let n = self.total_docs as f32;

        for term in &q_terms {
            let Some(posting) = self.inverted.get(term) else {
                continue;
            };
            let df = posting.len() as f32;
            let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
            for (qid, tf) in posting {
                let dl = self.doc_len.get(qid).copied().unwrap_or(0).max(1) as f32;
                let tf = *tf as f32;
                let num = tf * (self.k1 + 1.0);
                let den = tf + self.k1 * (1.0 - self.b + self.b * (dl / avgdl));
                *scores.entry(qid.as_str()).or_insert(0.0) += idf * (num / den);
            }
        }

        let mut out: Vec<(String, f32)> = scores
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .map(|(qid, score)| (qid.to_string(), score))
            .collect();
        out.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        out.truncate(top_k);
        out
    }

    pub fn len(&self) -> usize {
        self.total_docs
    }

    pub fn is_empty(&self) -> bool {
        self.total_docs == 0
    }
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(qid, text)| (qid.to_string(), text.to_string()))
            .collect()
    }

    #[test]
    fn test_search_ranks_matching_documents() {
        let mut index = Bm25Index::new();
        index.add_documents(&rows(&[
            ("q1", "the quick brown fox jumps over the lazy dog"),
            ("q2", "a fast red fox leaps above a sleepy canine"),
            ("q3", "python programming language tutorial"),
        ]));
        assert_eq!(index.len(), 3);

        let hits = index.search("fox", 10);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|(_, score)| *score > 0.0));

        let hits = index.search("python tutorial", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "q3");
    }

    #[test]
    fn test_rarer_terms_weigh_more() {
        let mut index = Bm25Index::new();
        index.add_documents(&rows(&[
            ("q1", "integral calculus practice"),
            ("q2", "integral equations practice"),
            ("q3", "calculus practice problems"),
        ]));

        // "equations" appears only in q2, so q2 should win the combined query.
        let hits = index.search("integral equations", 10);
        assert_eq!(hits[0].0, "q2");
    }

    #[test]
    fn test_add_documents_replaces_corpus() {
        let mut index = Bm25Index::new();
        index.add_documents(&rows(&[("q1", "alpha beta"), ("q2", "gamma delta")]));
        index.add_documents(&rows(&[("q3", "epsilon zeta")]));

        assert_eq!(index.len(), 1);
        assert!(index.search("alpha", 10).is_empty());
        assert_eq!(index.search("epsilon", 10).len(), 1);
    }

    #[test]
    fn test_remove_documents_recomputes() {
        let mut index = Bm25Index::new();
        index.add_documents(&rows(&[
            ("q1", "shared term one"),
            ("q2", "shared term two"),
        ]));
        index.remove_documents(&["q1".to_string()]);

        assert_eq!(index.len(), 1);
        let hits = index.search("shared", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "q2");
    }

    #[test]
    fn test_empty_query_and_empty_corpus() {
        let mut index = Bm25Index::new();
        assert!(index.search("anything", 10).is_empty());
        index.add_documents(&rows(&[("q1", "content here")]));
        assert!(index.search("", 10).is_empty());
        assert!(index.search("???", 10).is_empty());
    }

    #[test]
    fn test_top_k_truncation() {
        let mut index = Bm25Index::new();
        index.add_documents(&rows(&[
            ("q1", "term extra1"),
            ("q2", "term extra2"),
            ("q3", "term extra3"),
        ]));
        let hits = index.search("term", 2);
        assert_eq!(hits.len(), 2);
    }
}
