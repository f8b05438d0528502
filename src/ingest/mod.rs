//! Ingestion input model and normalization into question documents.
//!
//! Structured question objects and pre-extracted file text both normalize
//! into [`QuestionDocument`]s here; the per-item deduplication decision is
//! made by the engine, which owns the fingerprint maps and indexes.

mod parser;

pub use parser::{parse_questions_from_text, ParsedQuestion};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::embedding::Embedder;
use crate::question::{
    build_exact_hash, build_template_hash, Fingerprints, Metadata, QuestionDocument,
    QuestionImage, QuestionSource,
};
use crate::text::stable_hash;

/// Batch of upstream items to ingest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngestionInput {
    pub version: Option<u32>,
    pub questions: Vec<QuestionInput>,
    pub files: Vec<FileInput>,
}

/// One structured question item.
///
/// Accepts both the canonical shape and the generated-question payload:
/// `stem_md`/`explanation_md` aliases, labeled `A..D` option maps, a numeric
/// `id`, and loose classification fields that are promoted into `metadata`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionInput {
    pub qid: Option<String>,
    pub id: Option<i64>,
    #[serde(alias = "stem_md")]
    pub stem: String,
    pub options: Option<OptionsInput>,
    pub answer: Option<String>,
    #[serde(alias = "explanation_md")]
    pub explanation: Option<String>,
    pub images: Vec<ImageInput>,
    pub tags: Vec<String>,
    pub metadata: Metadata,
    pub area: Option<String>,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub difficulty: Option<Value>,
    pub skill_ids: Vec<String>,
}

/// Options as an ordered list, or a labeled map keyed `A..D`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionsInput {
    List(Vec<String>),
    Labeled(BTreeMap<String, String>),
}

/// One incoming question image, with an optional precomputed vector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageInput {
    pub image_id: Option<String>,
    pub path: Option<String>,
    pub ocr_text: Option<String>,
    pub caption: Option<String>,
    pub image_vector: Option<Vec<f32>>,
}

/// Pre-extracted file content. OCR and layout extraction happen upstream —
/// only the resulting text arrives here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileInput {
    pub file_id: Option<String>,
    pub mime_type: Option<String>,
    pub content: String,
    pub scanned: bool,
}

/// Normalize a whole ingestion batch into fingerprinted documents.
pub(crate) fn normalize_questions(
    input: IngestionInput,
    embedder: &dyn Embedder,
) -> Vec<QuestionDocument> {
    let mut out = Vec::new();

    for (idx, row) in input.questions.into_iter().enumerate() {
        let QuestionInput {
            qid,
            id,
            stem,
            options,
            answer,
            explanation,
            images,
            tags,
            metadata,
            area,
            subject,
            topic,
            difficulty,
            skill_ids,
        } = row;

        let stem = stem.trim().to_string();
        let qid = qid
            .filter(|qid| !qid.is_empty())
            .unwrap_or_else(|| match id {
                Some(id) => format!("q_{id}"),
                None => format!("q_{}", stable_hash(&format!("{stem}:{idx}"))),
            });
        let options = normalize_options(options);
        let answer = normalize_answer(answer.as_deref());
        let explanation = explanation
            .as_deref()
            .map(str::trim)
            .filter(|explanation| !explanation.is_empty())
            .map(str::to_string);
        let images = normalize_images(&images, &qid, embedder);
        let metadata =
            normalize_metadata(metadata, id, area, subject, topic, difficulty, skill_ids);
        let fingerprints = Fingerprints {
            exact_hash: build_exact_hash(&stem, &options, answer.as_deref()),
            template_hash: build_template_hash(&stem),
        };

        out.push(QuestionDocument {
            qid,
            stem,
            options,
            answer,
            explanation,
            images,
            tags,
            metadata,
            fingerprints,
            source: None,
        });
    }

    for file in input.files {
        let file_id = file.file_id.clone().unwrap_or_else(|| "f".to_string());
        for parsed in parse_questions_from_text(&file.content) {
            let qid = format!(
                "q_{}",
                stable_hash(&format!("{file_id}:{}:{}", parsed.question_no, parsed.stem))
            );
            let mut metadata = Metadata::new();
            if let Some(mime_type) = &file.mime_type {
                metadata.insert(
                    "sourceMimeType".to_string(),
                    Value::String(mime_type.clone()),
                );
            }
            metadata.insert("scanned".to_string(), Value::Bool(file.scanned));
            let fingerprints = Fingerprints {
                exact_hash: build_exact_hash(
                    &parsed.stem,
                    &parsed.options,
                    parsed.answer.as_deref(),
                ),
                template_hash: build_template_hash(&parsed.stem),
            };

            out.push(QuestionDocument {
                qid,
                stem: parsed.stem,
                options: parsed.options,
                answer: parsed.answer,
                explanation: parsed.explanation,
                images: Vec::new(),
                tags: Vec::new(),
                metadata,
                fingerprints,
                source: Some(QuestionSource {
                    file_id: file_id.clone(),
                    question_no: parsed.question_no,
                }),
            });
        }
    }

    out
}

fn normalize_options(options: Option<OptionsInput>) -> Vec<String> {
    match options {
        Some(OptionsInput::List(values)) => values
            .iter()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect(),
        Some(OptionsInput::Labeled(map)) => ["A", "B", "C", "D"]
            .iter()
            .filter_map(|label| map.get(*label))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect(),
        None => Vec::new(),
    }
}

fn normalize_answer(answer: Option<&str>) -> Option<String> {
    answer
        .map(|answer| answer.trim().to_uppercase())
        .filter(|answer| !answer.is_empty())
}

fn normalize_metadata(
    mut metadata: Metadata,
    id: Option<i64>,
    area: Option<String>,
    subject: Option<String>,
    topic: Option<String>,
    difficulty: Option<Value>,
    skill_ids: Vec<String>,
) -> Metadata {
    if let Some(id) = id {
        metadata
            .entry("sourceId".to_string())
            .or_insert_with(|| Value::from(id));
    }
    for (key, value) in [("area", area), ("subject", subject), ("topic", topic)] {
        if let Some(value) = value {
            metadata
                .entry(key.to_string())
                .or_insert(Value::String(value));
        }
    }
    if let Some(difficulty) = difficulty {
        metadata
            .entry("difficulty".to_string())
            .or_insert(difficulty);
    }
    if !skill_ids.is_empty() {
        metadata.entry("skillIds".to_string()).or_insert_with(|| {
            Value::Array(skill_ids.into_iter().map(Value::String).collect())
        });
    }
    metadata
}

/// Any image lacking a supplied vector gets one derived from its caption and
/// OCR text through the deterministic embedder.
fn normalize_images(
    rows: &[ImageInput],
    qid: &str,
    embedder: &dyn Embedder,
) -> Vec<QuestionImage> {
    rows.iter()
        .enumerate()
        .map(|(idx, image)| {
            let image_id = image
                .image_id
                .clone()
                .filter(|image_id| !image_id.is_empty())
                .unwrap_or_else(|| format!("{qid}_img_{}", idx + 1));
            let image_vector = match &image.image_vector {
                Some(vector) if !vector.is_empty() => Some(vector.clone()),
                _ => Some(embedder.embed(&format!(
                    "{}\n{}",
                    image.caption.as_deref().unwrap_or(""),
                    image.ocr_text.as_deref().unwrap_or("")
                ))),
            };
            QuestionImage {
                image_id,
                path: image.path.clone(),
                ocr_text: image.ocr_text.clone(),
                caption: image.caption.clone(),
                image_vector,
            }
        })
        .collect()
}
