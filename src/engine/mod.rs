//! Orchestrating engine owning the document store and all search indexes.

mod eval;
mod store;

pub use eval::{EvalMetrics, EvalRecord};

use std::sync::Arc;
use std::time::Instant;

use ahash::{AHashMap, AHashSet};
use tracing::{info, warn};

use crate::config::RagConfig;
use crate::embedding::{Embedder, HashingEmbedder};
use crate::index::{Bm25Index, VectorIndex};
use crate::ingest::{normalize_questions, IngestionInput};
use crate::question::{DedupStatus, DuplicateClass, IngestedQuestion, QuestionDocument};
use crate::retrieval::{
    fuse_hybrid_scores, score_dense, score_image, score_sparse, BlendedReranker, QueryInput,
    RetrievalCounts, RetrievalResponse, RetrievalResult,
};

/// Rerank-score cutpoint separating `similar` from `related`.
const SIMILAR_THRESHOLD: f32 = 0.65;

/// Cached per-document vectors, computed once at store time.
#[derive(Debug, Clone)]
struct DocVectors {
    stem: Vec<f32>,
    explanation: Option<Vec<f32>>,
}

/// The four search indexes plus image attribution, rebuilt as a unit.
///
/// A rebuild constructs a fresh set and swaps it in whole; a published set
/// is never mutated in place.
#[derive(Default)]
struct IndexSet {
    bm25: Bm25Index,
    stem: VectorIndex,
    explanation: VectorIndex,
    image: VectorIndex,
    image_owner: AHashMap<String, String>,
}

/// Hybrid question-retrieval engine.
///
/// Owns the qid-keyed document store, fingerprint maps, vector cache, and
/// search indexes. `ingest` mutates all of them and is serialized by `&mut
/// self`; `retrieve` and `evaluate` are read-only and safe to run
/// concurrently against a quiescent engine.
pub struct HybridQuestionEngine {
    config: RagConfig,
    embedder: Arc<dyn Embedder>,
    reranker: BlendedReranker,
    docs: AHashMap<String, QuestionDocument>,
    vectors: AHashMap<String, DocVectors>,
    exact_hash_map: AHashMap<String, String>,
    template_hash_map: AHashMap<String, Vec<String>>,
    indexes: IndexSet,
}

impl Default for HybridQuestionEngine {
    fn default() -> Self {
        Self::new(RagConfig::default())
    }
}

impl HybridQuestionEngine {
    /// Build an engine with the deterministic hashing embedder.
    pub fn new(config: RagConfig) -> Self {
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(config.dense_dim));
        Self::with_embedder(config, embedder)
    }

    /// Build the engine around a custom embedding provider.
    pub fn with_embedder(config: RagConfig, embedder: Arc<dyn Embedder>) -> Self {
        let reranker = BlendedReranker::new(Arc::clone(&embedder));
        Self {
            config,
            embedder,
            reranker,
            docs: AHashMap::new(),
            vectors: AHashMap::new(),
            exact_hash_map: AHashMap::new(),
            template_hash_map: AHashMap::new(),
            indexes: IndexSet::default(),
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn document_count(&self) -> usize {
        self.docs.len()
    }

    pub fn document(&self, qid: &str) -> Option<&QuestionDocument> {
        self.docs.get(qid)
    }

    /// All stored documents, in no particular order.
    pub fn documents(&self) -> impl Iterator<Item = &QuestionDocument> {
        self.docs.values()
    }

    /// Drop every document, fingerprint, cached vector, and index.
    fn clear(&mut self) {
        self.docs.clear();
        self.vectors.clear();
        self.exact_hash_map.clear();
        self.template_hash_map.clear();
        self.indexes = IndexSet::default();
    }

    /// Stored questions sharing the given question's template fingerprint —
    /// the same stem up to numeric parameters.
    pub fn template_peers(&self, qid: &str) -> Vec<&str> {
        let Some(doc) = self.docs.get(qid) else {
            return Vec::new();
        };
        self.template_hash_map
            .get(&doc.fingerprints.template_hash)
            .map(|peers| {
                peers
                    .iter()
                    .filter(|peer| peer.as_str() != qid)
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ingest a batch of structured questions and/or pre-extracted files.
    ///
    /// Each item is fingerprinted and classified: an exact-hash match is an
    /// `exact-duplicate` and is not stored; a nearest stem-vector neighbor
    /// at or above the near-duplicate threshold is a `near-duplicate` but is
    /// still stored as a distinct document; everything else is `new`. The
    /// exact-hash map updates per item, so exact duplicates inside one batch
    /// are caught; near-duplicate detection only sees previously committed
    /// batches because vectors index at batch end. Indexes rebuild exactly
    /// once, after the whole batch.
    pub fn ingest(&mut self, input: IngestionInput) -> Vec<IngestedQuestion> {
        info!("ingest start");
        let normalized = normalize_questions(input, self.embedder.as_ref());
        info!(count = normalized.len(), "normalized incoming questions");

        let mut out = Vec::with_capacity(normalized.len());
        for question in normalized {
            if let Some(matched) = self
                .exact_hash_map
                .get(&question.fingerprints.exact_hash)
                .cloned()
            {
                out.push(IngestedQuestion {
                    question,
                    status: DedupStatus::ExactDuplicate,
                    matched_qid: Some(matched),
                    score: Some(1.0),
                });
                continue;
            }

            let outcome = match self.find_near_duplicate(&question) {
                Some((matched, score)) if score >= self.config.near_duplicate_threshold => {
                    IngestedQuestion {
                        question: question.clone(),
                        status: DedupStatus::NearDuplicate,
                        matched_qid: Some(matched),
                        score: Some(score),
                    }
                }
                _ => IngestedQuestion {
                    question: question.clone(),
                    status: DedupStatus::New,
                    matched_qid: None,
                    score: None,
                },
            };
            self.store_question(question);
            out.push(outcome);
        }

        self.rebuild_indexes();
        info!(total_docs = self.docs.len(), "ingest done");
        out
    }

    /// Run a similarity query against the stored bank.
    pub fn retrieve(&self, query: &QueryInput) -> RetrievalResponse {
        let started = Instant::now();
        info!(
            text_len = query.text.as_deref().map_or(0, str::len),
            question_id = query.question_id.as_deref().unwrap_or(""),
            "retrieve start"
        );

        let query_text = self.resolve_query_text(query);
        let top_m = query.top_m.unwrap_or(self.config.rerank_top_m);
        let top_n = query.top_n.unwrap_or(self.config.final_top_n);
        let sparse_top_k = query.top_k.unwrap_or(self.config.bm25_top_k);
        let dense_top_k = query.top_k.unwrap_or(self.config.dense_top_k);
        let image_top_k = query.top_k.unwrap_or(self.config.image_top_k);

        let allowed = self.filter_qids(query);
        if allowed.is_empty() {
            warn!("retrieve matched no documents after metadata filtering");
            return RetrievalResponse {
                took_ms: started.elapsed().as_millis() as u64,
                query: query.clone(),
                counts: RetrievalCounts::default(),
                results: Vec::new(),
            };
        }

        let bm25_hits = score_sparse(&self.indexes.bm25, &query_text, sparse_top_k, &allowed);
        let query_vector = if query_text.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed(&query_text)
        };
        let dense_hits = score_dense(
            &self.indexes.stem,
            &self.indexes.explanation,
            &query_vector,
            dense_top_k,
            &allowed,
        );
        let image_hits = score_image(
            &self.indexes.image,
            &self.indexes.image_owner,
            query.image_vector.as_deref(),
            image_top_k,
            &allowed,
        );
        let fused = fuse_hybrid_scores(&bm25_hits, &dense_hits, &image_hits, &self.config);

        let bm25_map: AHashMap<&str, f32> =
            bm25_hits.iter().map(|(qid, s)| (qid.as_str(), *s)).collect();
        let dense_map: AHashMap<&str, f32> =
            dense_hits.iter().map(|(qid, s)| (qid.as_str(), *s)).collect();
        let image_map: AHashMap<&str, f32> =
            image_hits.iter().map(|(qid, s)| (qid.as_str(), *s)).collect();

        let mut reranked: Vec<(&QuestionDocument, f32, f32)> = Vec::new();
        for (qid, fused_score) in fused.iter().take(top_m) {
            let Some(doc) = self.docs.get(qid) else {
                continue;
            };
            let doc_text = rerank_doc_text(doc);
            let dense_score = dense_map.get(qid.as_str()).copied().unwrap_or(0.0);
            let rerank_score = self.reranker.score(&query_text, &doc_text, dense_score);
            reranked.push((doc, *fused_score, rerank_score));
        }
        reranked.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.qid.cmp(&b.0.qid))
        });

        let results: Vec<RetrievalResult> = reranked
            .iter()
            .take(top_n)
            .map(|(doc, fused_score, rerank_score)| {
                let bm25_score = bm25_map.get(doc.qid.as_str()).copied();
                let dense_score = dense_map.get(doc.qid.as_str()).copied();
                let image_score = image_map.get(doc.qid.as_str()).copied();
                RetrievalResult {
                    qid: doc.qid.clone(),
                    score: *fused_score,
                    bm25_score,
                    dense_score,
                    image_score,
                    rerank_score: *rerank_score,
                    duplicate_class: self.classify(*rerank_score),
                    reason: reason_text(bm25_score, dense_score, image_score, *rerank_score),
                    question: (*doc).clone(),
                }
            })
            .collect();

        RetrievalResponse {
            took_ms: started.elapsed().as_millis() as u64,
            query: query.clone(),
            counts: RetrievalCounts {
                bm25_candidates: bm25_hits.len(),
                dense_candidates: dense_hits.len(),
                image_candidates: image_hits.len(),
                fused_candidates: fused.len(),
                reranked_candidates: reranked.len(),
                final_results: results.len(),
            },
            results,
        }
    }

    fn resolve_query_text(&self, query: &QueryInput) -> String {
        if let Some(text) = query.text.as_deref() {
            let text = text.trim();
            if !text.is_empty() {
                return text.to_string();
            }
        }
        if let Some(qid) = &query.question_id {
            if let Some(doc) = self.docs.get(qid) {
                return doc.stem.clone();
            }
        }
        String::new()
    }

    fn filter_qids(&self, query: &QueryInput) -> AHashSet<String> {
        self.docs
            .values()
            .filter(|doc| query.filters.matches(&doc.metadata))
            .map(|doc| doc.qid.clone())
            .collect()
    }

    fn find_near_duplicate(&self, question: &QuestionDocument) -> Option<(String, f32)> {
        let vector = self.embedder.embed(&stem_source_text(question));
        self.indexes.stem.search(&vector, 5).into_iter().next()
    }

    fn store_question(&mut self, question: QuestionDocument) {
        let stem = self.embedder.embed(&stem_source_text(&question));
        let explanation = question
            .explanation
            .as_deref()
            .map(|explanation| self.embedder.embed(explanation));

        self.exact_hash_map
            .insert(question.fingerprints.exact_hash.clone(), question.qid.clone());
        self.template_hash_map
            .entry(question.fingerprints.template_hash.clone())
            .or_default()
            .push(question.qid.clone());
        self.vectors
            .insert(question.qid.clone(), DocVectors { stem, explanation });
        self.docs.insert(question.qid.clone(), question);
    }

    fn rebuild_indexes(&mut self) {
        let mut next = IndexSet::default();

        let rows: Vec<(String, String)> = self
            .docs
            .values()
            .map(|doc| (doc.qid.clone(), bm25_doc_text(doc)))
            .collect();
        next.bm25.add_documents(&rows);

        next.stem.upsert(self.docs.keys().filter_map(|qid| {
            self.vectors
                .get(qid)
                .map(|vectors| (qid.clone(), vectors.stem.clone()))
        }));
        next.explanation.upsert(self.docs.keys().filter_map(|qid| {
            self.vectors.get(qid).and_then(|vectors| {
                vectors
                    .explanation
                    .clone()
                    .map(|explanation| (qid.clone(), explanation))
            })
        }));

        for doc in self.docs.values() {
            for image in &doc.images {
                let Some(vector) = &image.image_vector else {
                    continue;
                };
                next.image
                    .upsert([(image.image_id.clone(), vector.clone())]);
                next.image_owner
                    .insert(image.image_id.clone(), doc.qid.clone());
            }
        }

        self.indexes = next;
    }

    fn classify(&self, rerank_score: f32) -> DuplicateClass {
        if rerank_score >= self.config.duplicate_threshold {
            DuplicateClass::Duplicate
        } else if rerank_score >= self.config.near_duplicate_threshold {
            DuplicateClass::NearDuplicate
        } else if rerank_score >= SIMILAR_THRESHOLD {
            DuplicateClass::Similar
        } else {
            DuplicateClass::Related
        }
    }
}

/// Text embedded for the stem vector and ingestion-time near-duplicate
/// check: the stem plus its options.
fn stem_source_text(question: &QuestionDocument) -> String {
    let mut parts = vec![question.stem.clone()];
    parts.extend(question.options.iter().cloned());
    parts.join("\n")
}

/// Candidate text handed to the reranker.
fn rerank_doc_text(question: &QuestionDocument) -> String {
    let mut parts = vec![question.stem.clone()];
    parts.extend(question.options.iter().cloned());
    parts.push(question.explanation.clone().unwrap_or_default());
    parts.join("\n")
}

/// Sparse document composition. The stem is doubled to weight it over the
/// options, explanation, image text, and metadata.
fn bm25_doc_text(question: &QuestionDocument) -> String {
    let mut parts = vec![question.stem.clone(), question.stem.clone()];
    parts.extend(question.options.iter().cloned());
    parts.push(question.explanation.clone().unwrap_or_default());
    parts.push(
        question
            .images
            .iter()
            .map(|image| image.ocr_text.clone().unwrap_or_default())
            .collect::<Vec<_>>()
            .join(" "),
    );
    parts.push(
        question
            .images
            .iter()
            .map(|image| image.caption.clone().unwrap_or_default())
            .collect::<Vec<_>>()
            .join(" "),
    );
    parts.push(serde_json::to_string(&question.metadata).unwrap_or_default());
    parts.join("\n")
}

fn reason_text(
    bm25_score: Option<f32>,
    dense_score: Option<f32>,
    image_score: Option<f32>,
    rerank_score: f32,
) -> String {
    let mut parts = Vec::new();
    if let Some(score) = bm25_score {
        parts.push(format!("bm25={score:.3}"));
    }
    if let Some(score) = dense_score {
        parts.push(format!("dense={score:.3}"));
    }
    if let Some(score) = image_score {
        parts.push(format!("image={score:.3}"));
    }
    parts.push(format!("rerank={rerank_score:.3}"));
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::QuestionInput;
    use crate::question::Fingerprints;

    fn question(qid: &str, stem: &str) -> QuestionInput {
        QuestionInput {
            qid: Some(qid.to_string()),
            stem: stem.to_string(),
            ..QuestionInput::default()
        }
    }

    fn batch(questions: Vec<QuestionInput>) -> IngestionInput {
        IngestionInput {
            questions,
            ..IngestionInput::default()
        }
    }

    #[test]
    fn test_exact_duplicate_within_one_batch() {
        let mut engine = HybridQuestionEngine::default();
        let outcomes = engine.ingest(batch(vec![
            question("q1", "State Newton's second law."),
            question("q2", "state newton's SECOND law!!"),
        ]));

        assert_eq!(outcomes[0].status, DedupStatus::New);
        assert_eq!(outcomes[1].status, DedupStatus::ExactDuplicate);
        assert_eq!(outcomes[1].matched_qid.as_deref(), Some("q1"));
        assert_eq!(outcomes[1].score, Some(1.0));
        // The duplicate is not stored.
        assert_eq!(engine.document_count(), 1);
        assert!(engine.document("q2").is_none());
    }

    #[test]
    fn test_near_duplicate_across_batches() {
        let mut engine = HybridQuestionEngine::default();
        engine.ingest(batch(vec![question(
            "q1",
            "Calculate the total perimeter of a rectangular garden plot with length eight metres and width five metres giving your final answer in metres",
        )]));

        let outcomes = engine.ingest(batch(vec![question(
            "q2",
            "Calculate the total perimeter of a rectangular garden plot with length eight metres and width six metres giving your final answer in metres",
        )]));

        assert_eq!(outcomes[0].status, DedupStatus::NearDuplicate);
        assert_eq!(outcomes[0].matched_qid.as_deref(), Some("q1"));
        let score = outcomes[0].score.unwrap();
        assert!(score >= engine.config().near_duplicate_threshold);
        // Near-duplicates are still stored as distinct documents.
        assert_eq!(engine.document_count(), 2);
    }

    #[test]
    fn test_unrelated_questions_are_new() {
        let mut engine = HybridQuestionEngine::default();
        engine.ingest(batch(vec![question(
            "q1",
            "Name the longest river in Africa.",
        )]));
        let outcomes = engine.ingest(batch(vec![question(
            "q2",
            "Balance the chemical equation for photosynthesis.",
        )]));
        assert_eq!(outcomes[0].status, DedupStatus::New);
        assert!(outcomes[0].matched_qid.is_none());
    }

    #[test]
    fn test_template_peers() {
        let mut engine = HybridQuestionEngine::default();
        engine.ingest(batch(vec![
            question("q1", "Compute 12 + 30"),
            question("q2", "Compute 7 + 45"),
            question("q3", "Name the capital of France."),
        ]));

        assert_eq!(engine.template_peers("q1"), vec!["q2"]);
        assert!(engine.template_peers("q3").is_empty());
        assert!(engine.template_peers("missing").is_empty());
    }

    #[test]
    fn test_classify_cutpoints_are_monotonic() {
        let engine = HybridQuestionEngine::default();
        assert_eq!(engine.classify(0.64), DuplicateClass::Related);
        assert_eq!(engine.classify(0.65), DuplicateClass::Similar);
        assert_eq!(engine.classify(0.84), DuplicateClass::Similar);
        assert_eq!(engine.classify(0.85), DuplicateClass::NearDuplicate);
        assert_eq!(engine.classify(0.94), DuplicateClass::NearDuplicate);
        assert_eq!(engine.classify(0.95), DuplicateClass::Duplicate);
        assert_eq!(engine.classify(1.0), DuplicateClass::Duplicate);
    }

    #[test]
    fn test_reason_text_reports_contributing_channels() {
        let reason = reason_text(Some(1.25), None, Some(0.5), 0.75);
        assert_eq!(reason, "bm25=1.250, image=0.500, rerank=0.750");
        let only_rerank = reason_text(None, None, None, 0.25);
        assert_eq!(only_rerank, "rerank=0.250");
    }

    #[test]
    fn test_bm25_doc_text_weights_stem() {
        let doc = QuestionDocument {
            qid: "q1".to_string(),
            stem: "stem words".to_string(),
            options: vec!["option one".to_string()],
            answer: None,
            explanation: Some("an explanation".to_string()),
            images: Vec::new(),
            tags: Vec::new(),
            metadata: Default::default(),
            fingerprints: Fingerprints {
                exact_hash: String::new(),
                template_hash: String::new(),
            },
            source: None,
        };
        let text = bm25_doc_text(&doc);
        assert_eq!(text.matches("stem words").count(), 2);
        assert!(text.contains("option one"));
        assert!(text.contains("an explanation"));
    }
}
