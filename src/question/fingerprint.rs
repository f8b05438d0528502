//! Exact and template fingerprints for deduplication.

use crate::text::{normalize_template_text, normalize_text, stable_hash};

/// Hash of the normalized stem, options (order-preserved), and answer.
///
/// Two questions collide here iff they are textually identical up to
/// normalization, including a matching options list.
pub fn build_exact_hash(stem: &str, options: &[String], answer: Option<&str>) -> String {
    let options = options
        .iter()
        .map(|option| normalize_text(option))
        .collect::<Vec<_>>()
        .join("|");
    let payload = format!(
        "{}||{}||{}",
        normalize_text(stem),
        options,
        normalize_text(answer.unwrap_or(""))
    );
    stable_hash(&payload)
}

/// Hash of the template-normalized stem only.
pub fn build_template_hash(stem: &str) -> String {
    stable_hash(&normalize_template_text(stem))
}
