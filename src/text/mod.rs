//! Text canonicalization, tokenization, and deterministic hashing.
//!
//! Every identity-bearing value in the engine (fingerprints, auto-generated
//! qids, embedding buckets) flows through `stable_hash`, so hashing must be
//! reproducible across runs and platforms — no memory addresses, no random
//! seeds.

use regex::Regex;
use std::sync::OnceLock;

/// Lowercase, strip non-alphanumeric characters, collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn numeric_literal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(\.\d+)?").expect("numeric literal regex"))
}

/// As [`normalize_text`], with every numeric literal masked by a `<num>`
/// placeholder. Two stems that differ only in numeric parameters (including
/// attached coefficients such as `2x` vs `5x`) normalize to the same
/// template text.
pub fn normalize_template_text(text: &str) -> String {
    numeric_literal_re()
        .replace_all(&normalize_text(text), "<num>")
        .into_owned()
}

/// Split normalized text on whitespace, dropping empty tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize_text(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Deterministic, platform-independent string hash.
///
/// Two interleaved 32-bit multiply-xor accumulators over the char stream,
/// finalized with shift-xor mixing and rendered as a fixed 16-hex-digit
/// string.
pub fn stable_hash(text: &str) -> String {
    let mut h1: u32 = 0xDEAD_BEEF;
    let mut h2: u32 = 0x41C6_CE57;
    for ch in text.chars() {
        let c = ch as u32;
        h1 = (h1 ^ c).wrapping_mul(2_654_435_761);
        h2 = (h2 ^ c).wrapping_mul(1_597_334_677);
    }
    h1 = ((h1 ^ (h1 >> 16)).wrapping_mul(2_246_822_507))
        ^ ((h2 ^ (h2 >> 13)).wrapping_mul(3_266_489_909));
    h2 = ((h2 ^ (h2 >> 16)).wrapping_mul(2_246_822_507))
        ^ ((h1 ^ (h1 >> 13)).wrapping_mul(3_266_489_909));
    format!("{h2:08x}{h1:08x}")
}

/// Clamp a score into [0, 1].
pub fn clamp01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(
            normalize_text("  Find the DERIVATIVE of x^2 + 3x!  "),
            "find the derivative of x 2 3x"
        );
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("??!"), "");
    }

    #[test]
    fn test_template_masks_numeric_literals() {
        assert_eq!(
            normalize_template_text("Compute 12 + 30"),
            "compute <num> <num>"
        );
        // Attached coefficients are masked too.
        assert_eq!(
            normalize_template_text("Compute 2x+3"),
            "compute <num>x <num>"
        );
    }

    #[test]
    fn test_tokenize_drops_empties() {
        assert_eq!(tokenize("Hello,   world!"), vec!["hello", "world"]);
        assert!(tokenize("").is_empty());
        assert!(tokenize("...").is_empty());
    }

    #[test]
    fn test_stable_hash_deterministic() {
        let a = stable_hash("the quick brown fox");
        let b = stable_hash("the quick brown fox");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_stable_hash_discriminates() {
        assert_ne!(stable_hash("alpha"), stable_hash("beta"));
        assert_ne!(stable_hash(""), stable_hash(" "));
    }

    #[test]
    fn test_clamp01() {
        assert_eq!(clamp01(-0.5), 0.0);
        assert_eq!(clamp01(0.25), 0.25);
        assert_eq!(clamp01(1.5), 1.0);
    }
}
