//! Stable text normalization and SHA3-256 identities.
//!
//! Questions and alternatives are addressed by content hashes, so the
//! normalization here must be deterministic across platforms and input
//! sources: NFKC first, then NUL stripping, then a codepoint cap. The cap is
//! applied last so that normalization cannot resurrect characters past it.

use sha3::{Digest, Sha3_256};
use unicode_normalization::UnicodeNormalization;

/// Maximum number of codepoints kept after normalization.
pub const NORM_MAX_CODEPOINTS: usize = 256;

/// Normalize text for hashing and key derivation: NFKC, strip NUL,
/// truncate to [`NORM_MAX_CODEPOINTS`] codepoints.
pub fn norm(text: &str) -> String {
    text.nfkc()
        .filter(|c| *c != '\0')
        .take(NORM_MAX_CODEPOINTS)
        .collect()
}

/// Content hash of a single alternative: hex SHA3-256 of the normalized text.
pub fn alt_hash(alt_text: &str) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(norm(alt_text).as_bytes());
    hex::encode(hasher.finalize())
}

/// Content hash of a question: normalized text, a newline, then the sorted
/// normalized alternatives joined by newlines.
///
/// Sorting makes the hash independent of presentation order, so shuffling
/// alternatives in a UI does not orphan the stored envelopes.
pub fn question_hash(text: &str, alternatives: &[String]) -> String {
    let mut alts: Vec<String> = alternatives.iter().map(|a| norm(a)).collect();
    alts.sort();

    let mut hasher = Sha3_256::new();
    hasher.update(norm(text).as_bytes());
    hasher.update(b"\n");
    hasher.update(alts.join("\n").as_bytes());
    hex::encode(hasher.finalize())
}

/// Diagnostics-only hash of share bytes.
///
/// Never parsed back; used so that log records can correlate shares without
/// ever containing share material.
pub fn share_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Raw SHA3-256 digest, for callers that need the bytes rather than hex.
pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norm_strips_nul_and_applies_nfkc() {
        assert_eq!(norm("a\0b"), "ab");
        // U+FB01 LATIN SMALL LIGATURE FI decomposes under NFKC.
        assert_eq!(norm("\u{fb01}le"), "file");
    }

    #[test]
    fn norm_caps_codepoints() {
        let long = "x".repeat(1000);
        assert_eq!(norm(&long).chars().count(), NORM_MAX_CODEPOINTS);
    }

    #[test]
    fn question_hash_ignores_alternative_order() {
        let a = vec!["red".to_string(), "blue".to_string(), "green".to_string()];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(question_hash("Favorite color?", &a), question_hash("Favorite color?", &b));
    }

    #[test]
    fn question_hash_changes_with_text() {
        let alts = vec!["yes".to_string(), "no".to_string()];
        assert_ne!(question_hash("Q1?", &alts), question_hash("Q2?", &alts));
    }

    #[test]
    fn alt_hash_is_stable_hex() {
        let h = alt_hash("Oslo");
        assert_eq!(h.len(), 64);
        assert_eq!(h, alt_hash("Oslo"));
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn alt_hash_normalizes_before_hashing() {
        // Fullwidth 'A' folds to ASCII 'A' under NFKC.
        assert_eq!(alt_hash("\u{ff21}"), alt_hash("A"));
    }
}
