//! Segmentation of pre-extracted exam-paper text into question chunks.
//!
//! Splits on `Question N` / `N)` / `N.` style boundaries; when no boundary
//! is found the entire text is treated as one chunk. Within a chunk, option
//! lines, an `Answer: X` marker, and an `Explanation: ...` tail are
//! recognized; missing pieces are left absent rather than erroring.

use regex::Regex;
use std::sync::OnceLock;

/// One question recovered from plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuestion {
    pub stem: String,
    pub options: Vec<String>,
    pub answer: Option<String>,
    pub explanation: Option<String>,
    /// 1-based position of the chunk within the source text.
    pub question_no: u32,
}

fn boundary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:^|\n)\s*(?:question\s*\d+[).:]|\d+[).:])\s+").expect("boundary regex")
    })
}

fn option_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*[A-D][).:\-]\s*(.+)$").expect("option line regex"))
}

fn first_option_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\n\s*[A-D][).:\-]\s+").expect("first option regex"))
}

fn answer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\banswer\s*[:\-]\s*([A-D])\b").expect("answer regex"))
}

fn explanation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bexplanation\s*[:\-]\s*([\s\S]*)$").expect("explanation regex"))
}

/// Parse pre-extracted plain text into question chunks.
pub fn parse_questions_from_text(content: &str) -> Vec<ParsedQuestion> {
    let text = content.replace('\r', "");
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let chunks: Vec<&str> = boundary_re()
        .split(text)
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect();
    let chunks = if chunks.len() == 1 { vec![text] } else { chunks };

    let mut out = Vec::new();
    for (idx, chunk) in chunks.iter().enumerate() {
        let answer = answer_re()
            .captures(chunk)
            .map(|captures| captures[1].to_uppercase());
        let explanation = explanation_re()
            .captures(chunk)
            .map(|captures| captures[1].trim().to_string())
            .filter(|explanation| !explanation.is_empty());

        let stem = first_option_re()
            .splitn(chunk, 2)
            .next()
            .unwrap_or("")
            .trim()
            .to_string();

        let mut options = Vec::new();
        for line in chunk.lines() {
            if let Some(captures) = option_line_re().captures(line.trim()) {
                options.push(captures[1].trim().to_string());
            }
        }

        if !stem.is_empty() {
            out.push(ParsedQuestion {
                stem,
                options,
                answer,
                explanation,
                question_no: (idx + 1) as u32,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_questions_are_split() {
        let text = "Question 1. What is 2 + 2?\nA) 3\nB) 4\nAnswer: B\nExplanation: Basic addition.\n\nQuestion 2. Solve x + 1 = 3.\nA) x = 1\nB) x = 2\nAnswer: B\n";
        let parsed = parse_questions_from_text(text);

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].stem, "What is 2 + 2?");
        assert_eq!(parsed[0].options, vec!["3", "4"]);
        assert_eq!(parsed[0].answer.as_deref(), Some("B"));
        assert_eq!(parsed[0].explanation.as_deref(), Some("Basic addition."));
        assert_eq!(parsed[0].question_no, 1);

        assert_eq!(parsed[1].stem, "Solve x + 1 = 3.");
        assert_eq!(parsed[1].question_no, 2);
        assert!(parsed[1].explanation.is_none());
    }

    #[test]
    fn test_numeric_prefix_boundaries() {
        let text = "1) First stem here\nA) one\nB) two\n\n2) Second stem here\nA) three\nB) four\n";
        let parsed = parse_questions_from_text(text);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].stem, "First stem here");
        assert_eq!(parsed[1].stem, "Second stem here");
    }

    #[test]
    fn test_no_boundary_treats_text_as_one_chunk() {
        let text = "Name the capital of France.\nA) Paris\nB) London\nAnswer: A\n";
        let parsed = parse_questions_from_text(text);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].stem, "Name the capital of France.");
        assert_eq!(parsed[0].options, vec!["Paris", "London"]);
        assert_eq!(parsed[0].answer.as_deref(), Some("A"));
    }

    #[test]
    fn test_text_without_options_becomes_bare_stem() {
        let text = "Describe the process of photosynthesis in detail.";
        let parsed = parse_questions_from_text(text);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].stem, text);
        assert!(parsed[0].options.is_empty());
        assert!(parsed[0].answer.is_none());
        assert!(parsed[0].explanation.is_none());
    }

    #[test]
    fn test_empty_content() {
        assert!(parse_questions_from_text("").is_empty());
        assert!(parse_questions_from_text("   \n\n  ").is_empty());
    }

    #[test]
    fn test_carriage_returns_stripped() {
        let text = "1. Alpha?\r\nA) yes\r\nB) no\r\n\r\n2. Beta?\r\nA) up\r\nB) down\r\n";
        let parsed = parse_questions_from_text(text);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].stem, "Alpha?");
        assert_eq!(parsed[1].options, vec!["up", "down"]);
    }
}
