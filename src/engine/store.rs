//! JSONL persistence for the authoritative question bank.
//!
//! Only documents are persisted — indexes are always rebuilt from the bank
//! on load.

use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use super::HybridQuestionEngine;
use crate::config::RagConfig;
use crate::error::{QbankError, Result};
use crate::ingest::{IngestionInput, QuestionInput};
use crate::question::QuestionDocument;

impl HybridQuestionEngine {
    /// Write the document store as JSONL, one question per line, creating
    /// parent directories as needed. Returns the number of lines written.
    pub fn save_local_bank(&self, path: &Path) -> Result<usize> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| QbankError::Io {
                source: e,
                context: format!("failed to create bank directory: {}", parent.display()),
            })?;
        }

        let file = fs::File::create(path).map_err(|e| QbankError::Io {
            source: e,
            context: format!("failed to create bank file: {}", path.display()),
        })?;
        let mut writer = BufWriter::new(file);

        let mut docs: Vec<&QuestionDocument> = self.documents().collect();
        docs.sort_by(|a, b| a.qid.cmp(&b.qid));

        let mut count = 0usize;
        for doc in docs {
            let line = serde_json::to_string(doc).map_err(|e| QbankError::Json {
                source: e,
                context: format!("failed to serialize question {}", doc.qid),
            })?;
            writeln!(writer, "{line}").map_err(|e| QbankError::Io {
                source: e,
                context: format!("failed to write bank file: {}", path.display()),
            })?;
            count += 1;
        }
        writer.flush().map_err(|e| QbankError::Io {
            source: e,
            context: format!("failed to flush bank file: {}", path.display()),
        })?;

        info!(path = %path.display(), count, "saved local bank");
        Ok(count)
    }

    /// Replace the engine's contents with the bank at `path`, re-ingesting
    /// every line. A missing or empty file loads zero documents and is not
    /// an error. Returns the resulting document count.
    pub fn load_local_bank(&mut self, path: &Path) -> Result<usize> {
        if !path.exists() {
            warn!(path = %path.display(), "local bank file not found");
            return Ok(0);
        }

        let file = fs::File::open(path).map_err(|e| QbankError::Io {
            source: e,
            context: format!("failed to open bank file: {}", path.display()),
        })?;

        let mut questions: Vec<QuestionInput> = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| QbankError::Io {
                source: e,
                context: format!("failed to read bank file: {}", path.display()),
            })?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let question: QuestionInput =
                serde_json::from_str(line).map_err(|e| QbankError::Json {
                    source: e,
                    context: format!(
                        "failed to parse bank line {} of {}",
                        line_no + 1,
                        path.display()
                    ),
                })?;
            questions.push(question);
        }

        if questions.is_empty() {
            warn!(path = %path.display(), "local bank file is empty");
            return Ok(0);
        }

        self.clear();
        self.ingest(IngestionInput {
            questions,
            ..IngestionInput::default()
        });
        info!(path = %path.display(), count = self.document_count(), "loaded local bank");
        Ok(self.document_count())
    }

    /// Serialize the configuration and document store as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Export<'a> {
            config: &'a RagConfig,
            docs: Vec<&'a QuestionDocument>,
        }

        let mut docs: Vec<&QuestionDocument> = self.documents().collect();
        docs.sort_by(|a, b| a.qid.cmp(&b.qid));

        serde_json::to_string_pretty(&Export {
            config: self.config(),
            docs,
        })
        .map_err(|e| QbankError::Json {
            source: e,
            context: "failed to serialize engine export".to_string(),
        })
    }
}
