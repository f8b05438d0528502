//! Ranking-quality metrics over labeled query/relevant pairs.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use super::HybridQuestionEngine;
use crate::retrieval::QueryInput;

const RECALL_DEPTH: usize = 200;
const MRR_DEPTH: usize = 10;
const NDCG_DEPTH: usize = 20;

/// One labeled evaluation record: a stored question used as the query, and
/// the qids that should be retrieved for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalRecord {
    pub query_qid: String,
    pub relevant_qids: Vec<String>,
}

/// Aggregate retrieval metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalMetrics {
    /// Pooled Recall@200: total hits over total relevant across records.
    pub recall_at_k: f32,
    /// Mean reciprocal rank of the first relevant hit within the top 10.
    pub mrr_at_10: f32,
    /// Mean binary-gain NDCG@20.
    pub ndcg_at_20: f32,
}

impl HybridQuestionEngine {
    /// Evaluate retrieval quality against labeled records.
    ///
    /// Each valid record re-runs `retrieve` with the stored question's own
    /// stem as the query text at depth 200. Records with an unknown
    /// `query_qid` or an empty relevant set are skipped entirely — they are
    /// excluded from every metric's denominator. Recall is pooled across
    /// records; MRR and NDCG are averaged over the valid records.
    pub fn evaluate(&self, records: &[EvalRecord]) -> EvalMetrics {
        if records.is_empty() {
            return EvalMetrics::default();
        }

        let mut recall_hits = 0usize;
        let mut recall_total = 0usize;
        let mut mrr_sum = 0.0f32;
        let mut ndcg_sum = 0.0f32;
        let mut valid_records = 0usize;

        for record in records {
            let Some(source) = self.document(&record.query_qid) else {
                continue;
            };
            let relevant: AHashSet<&str> = record
                .relevant_qids
                .iter()
                .map(String::as_str)
                .collect();
            if relevant.is_empty() {
                continue;
            }
            valid_records += 1;

            let response = self.retrieve(&QueryInput {
                text: Some(source.stem.clone()),
                top_n: Some(RECALL_DEPTH),
                ..QueryInput::default()
            });
            let ranked: Vec<&str> = response
                .results
                .iter()
                .map(|result| result.qid.as_str())
                .collect();

            recall_hits += ranked
                .iter()
                .take(RECALL_DEPTH)
                .filter(|qid| relevant.contains(*qid))
                .count();
            recall_total += relevant.len();

            for (rank, qid) in ranked.iter().take(MRR_DEPTH).enumerate() {
                if relevant.contains(qid) {
                    mrr_sum += 1.0 / (rank as f32 + 1.0);
                    break;
                }
            }

            let mut dcg = 0.0f32;
            for (rank, qid) in ranked.iter().take(NDCG_DEPTH).enumerate() {
                if relevant.contains(qid) {
                    dcg += 1.0 / (rank as f32 + 2.0).log2();
                }
            }
            let ideal_count = NDCG_DEPTH.min(relevant.len());
            let idcg: f32 = (0..ideal_count)
                .map(|rank| 1.0 / (rank as f32 + 2.0).log2())
                .sum();
            if idcg > 0.0 {
                ndcg_sum += dcg / idcg;
            }
        }

        let denom = valid_records.max(1) as f32;
        EvalMetrics {
            recall_at_k: if recall_total > 0 {
                recall_hits as f32 / recall_total as f32
            } else {
                0.0
            },
            mrr_at_10: mrr_sum / denom,
            ndcg_at_20: ndcg_sum / denom,
        }
    }
}
