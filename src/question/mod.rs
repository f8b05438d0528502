//! Core question-bank document model.
//!
//! A [`QuestionDocument`] is the unit of storage and retrieval. Its `qid`
//! uniquely keys exactly one document in the engine's store at any time; a
//! document is replaced only by full removal and re-add, never partially
//! mutated.

mod fingerprint;

pub use fingerprint::{build_exact_hash, build_template_hash};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Open key/value metadata attached to a question (subject, gradeLevel,
/// difficulty, questionType, examBoard, year, …). Ordered so JSON renderings
/// are stable.
pub type Metadata = BTreeMap<String, Value>;

/// A question image with optional pre-extracted text and a fixed-length
/// vector. Images lacking a supplied vector get one derived from
/// `caption + ocrText` during ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionImage {
    pub image_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_vector: Option<Vec<f32>>,
}

/// Deduplication fingerprints computed at ingestion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fingerprints {
    /// Hash of normalized stem, options (order-preserved), and answer.
    /// Collision implies textual identity.
    pub exact_hash: String,
    /// Hash of the stem with numeric literals masked. Collision implies the
    /// same question template with different numbers.
    pub template_hash: String,
}

/// Provenance of a question segmented out of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSource {
    pub file_id: String,
    pub question_no: u32,
}

/// A stored exam question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDocument {
    pub qid: String,
    pub stem: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default)]
    pub images: Vec<QuestionImage>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub fingerprints: Fingerprints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<QuestionSource>,
}

/// Outcome of one ingestion decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DedupStatus {
    #[serde(rename = "new")]
    New,
    #[serde(rename = "near-duplicate")]
    NearDuplicate,
    #[serde(rename = "exact-duplicate")]
    ExactDuplicate,
}

/// Similarity tier assigned to a retrieval result by its rerank score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateClass {
    #[serde(rename = "duplicate")]
    Duplicate,
    #[serde(rename = "near-duplicate")]
    NearDuplicate,
    #[serde(rename = "similar")]
    Similar,
    #[serde(rename = "related")]
    Related,
}

/// A question plus the deduplication verdict for it — returned from
/// `ingest`, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestedQuestion {
    pub question: QuestionDocument,
    pub status: DedupStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_qid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&DedupStatus::ExactDuplicate).unwrap(),
            "\"exact-duplicate\""
        );
        let parsed: DedupStatus = serde_json::from_str("\"near-duplicate\"").unwrap();
        assert_eq!(parsed, DedupStatus::NearDuplicate);
    }

    #[test]
    fn test_duplicate_class_wire_format() {
        assert_eq!(
            serde_json::to_string(&DuplicateClass::Related).unwrap(),
            "\"related\""
        );
    }

    #[test]
    fn test_question_document_roundtrip() {
        let doc = QuestionDocument {
            qid: "q_abc".to_string(),
            stem: "What is 2 + 2?".to_string(),
            options: vec!["3".to_string(), "4".to_string()],
            answer: Some("B".to_string()),
            explanation: None,
            images: vec![QuestionImage {
                image_id: "q_abc_img_1".to_string(),
                path: None,
                ocr_text: Some("diagram".to_string()),
                caption: None,
                image_vector: Some(vec![0.0, 1.0]),
            }],
            tags: vec!["arithmetic".to_string()],
            metadata: Metadata::new(),
            fingerprints: Fingerprints {
                exact_hash: "00".to_string(),
                template_hash: "11".to_string(),
            },
            source: None,
        };

        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"exactHash\""));
        assert!(json.contains("\"ocrText\""));

        let back: QuestionDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}
