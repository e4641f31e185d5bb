//! Entity extraction from chunk text
//!
//! Regex-driven: capitalized phrases (and every contiguous suffix of a
//! multi-word phrase) plus alphabetic tokens of length four or more. Keys are
//! case-folded so "Part A" yields both "part a" and "a".

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static CAPITALIZED_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Z][A-Za-z0-9]*(\s+[A-Z][A-Za-z0-9]*)*").expect("phrase regex")
});

static LONG_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z]{4,}\b").expect("token regex"));

/// Normalize a raw entity name into its key form
pub fn entity_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Extract the normalized entity set from a sequence of texts
///
/// The texts are scanned as one concatenated document. Output is deduplicated
/// and sorted, so repeated extraction over the same corpus is stable.
pub fn extract_entities<'a, I>(texts: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut keys = BTreeSet::new();

    for text in texts {
        for m in CAPITALIZED_PHRASE.find_iter(text) {
            let words: Vec<&str> = m.as_str().split_whitespace().collect();
            for start in 0..words.len() {
                let key = entity_key(&words[start..].join(" "));
                if !key.is_empty() {
                    keys.insert(key);
                }
            }
        }
        for m in LONG_TOKEN.find_iter(text) {
            keys.insert(entity_key(m.as_str()));
        }
    }

    keys.into_iter().collect()
}
