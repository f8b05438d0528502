//! Hybrid retrieval: channel scoring, score fusion, and reranking.
//!
//! Each query produces up to four channel score lists — sparse BM25, dense
//! stem/explanation cosine, image cosine, and reciprocal-rank fusion over
//! the first three — which are normalized and blended into a single fused
//! ranking before the deterministic reranker reorders the head of the list.

mod fusion;
mod reranker;
mod scoring;

pub use fusion::{fuse_hybrid_scores, rrf_fuse};
pub use reranker::BlendedReranker;
pub use scoring::{score_dense, score_image, score_sparse};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::question::{DuplicateClass, Metadata, QuestionDocument};

/// Similarity query against the stored bank.
///
/// Query text comes from `text`, or from an existing question's stem when
/// `question_id` is set ("find things like question X"). `top_k`/`top_m`/
/// `top_n` override the configured per-channel candidate count, rerank
/// depth, and final result count for this call only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryInput {
    pub text: Option<String>,
    pub image_vector: Option<Vec<f32>>,
    pub question_id: Option<String>,
    pub filters: QueryFilters,
    pub top_k: Option<usize>,
    pub top_m: Option<usize>,
    pub top_n: Option<usize>,
}

impl QueryInput {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// Metadata filters; every supplied field must match the stored document's
/// metadata exactly for the document to be eligible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryFilters {
    pub subject: Option<String>,
    pub grade_level: Option<String>,
    pub difficulty: Option<Value>,
    pub question_type: Option<String>,
    pub exam_board: Option<String>,
    pub year: Option<Value>,
}

impl QueryFilters {
    pub(crate) fn matches(&self, metadata: &Metadata) -> bool {
        fn text_matches(metadata: &Metadata, key: &str, expected: &Option<String>) -> bool {
            match expected {
                Some(want) => metadata.get(key).and_then(Value::as_str) == Some(want.as_str()),
                None => true,
            }
        }
        fn value_matches(metadata: &Metadata, key: &str, expected: &Option<Value>) -> bool {
            match expected {
                Some(want) => metadata.get(key) == Some(want),
                None => true,
            }
        }

        text_matches(metadata, "subject", &self.subject)
            && text_matches(metadata, "gradeLevel", &self.grade_level)
            && value_matches(metadata, "difficulty", &self.difficulty)
            && text_matches(metadata, "questionType", &self.question_type)
            && text_matches(metadata, "examBoard", &self.exam_board)
            && value_matches(metadata, "year", &self.year)
    }
}

/// One scored retrieval hit. Channel scores are present only when that
/// channel actually scored the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult {
    pub qid: String,
    /// Fused hybrid score.
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bm25_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dense_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_score: Option<f32>,
    pub rerank_score: f32,
    pub duplicate_class: DuplicateClass,
    /// Human-readable per-channel score breakdown.
    pub reason: String,
    pub question: QuestionDocument,
}

/// Candidate counts observed at each retrieval stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalCounts {
    pub bm25_candidates: usize,
    pub dense_candidates: usize,
    pub image_candidates: usize,
    pub fused_candidates: usize,
    pub reranked_candidates: usize,
    pub final_results: usize,
}

/// Full response for one retrieval call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResponse {
    pub took_ms: u64,
    pub query: QueryInput,
    pub counts: RetrievalCounts,
    pub results: Vec<RetrievalResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(pairs: &[(&str, Value)]) -> Metadata {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_empty_filters_match_everything() {
        let filters = QueryFilters::default();
        assert!(filters.matches(&Metadata::new()));
        assert!(filters.matches(&metadata(&[("subject", json!("Mathematics"))])));
    }

    #[test]
    fn test_each_supplied_field_must_match() {
        let filters = QueryFilters {
            subject: Some("Mathematics".to_string()),
            year: Some(json!(2024)),
            ..QueryFilters::default()
        };

        assert!(filters.matches(&metadata(&[
            ("subject", json!("Mathematics")),
            ("year", json!(2024)),
            ("difficulty", json!("easy")),
        ])));
        assert!(!filters.matches(&metadata(&[
            ("subject", json!("Mathematics")),
            ("year", json!(2025)),
        ])));
        assert!(!filters.matches(&metadata(&[("year", json!(2024))])));
    }

    #[test]
    fn test_filters_deserialize_camel_case() {
        let filters: QueryFilters = serde_json::from_str(
            r#"{"subject":"Physics","gradeLevel":"10","examBoard":"CBSE"}"#,
        )
        .unwrap();
        assert_eq!(filters.subject.as_deref(), Some("Physics"));
        assert_eq!(filters.grade_level.as_deref(), Some("10"));
        assert_eq!(filters.exam_board.as_deref(), Some("CBSE"));
    }
}
