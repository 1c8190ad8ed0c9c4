//! Term extraction and overlap measures shared by all scoring signals

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

// Compile once
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());

const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "all", "also", "and", "any", "are", "because", "been",
    "before", "being", "below", "between", "both", "but", "can", "could", "did", "does", "doing",
    "down", "during", "each", "few", "for", "from", "further", "had", "has", "have", "having",
    "her", "here", "hers", "him", "his", "how", "into", "its", "itself", "just", "more", "most",
    "not", "now", "off", "once", "only", "other", "our", "ours", "out", "over", "own", "same",
    "she", "should", "some", "such", "than", "that", "the", "their", "theirs", "them", "then",
    "there", "these", "they", "this", "those", "through", "too", "under", "until", "very", "was",
    "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with",
    "would", "you", "your", "yours",
];

static STOP_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOP_WORDS.iter().copied().collect());

/// Lowercased content terms with punctuation, stop words and short tokens removed
pub fn extract_terms(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned = NON_WORD.replace_all(&lowered, " ");

    cleaned
        .split_whitespace()
        .filter(|term| term.chars().count() > 2 && !STOP_SET.contains(term))
        .map(str::to_string)
        .collect()
}

/// Occurrence count per term
pub fn term_frequencies(terms: &[String]) -> HashMap<&str, usize> {
    let mut frequencies = HashMap::new();
    for term in terms {
        *frequencies.entry(term.as_str()).or_insert(0) += 1;
    }
    frequencies
}

/// Frequency-weighted overlap of `query` terms found in `document`
///
/// ```text
/// overlap = Σ_t q(t) · min(q(t), d(t)) / Σ_t q(t)²
/// ```
///
/// 1.0 when every query term occurs in the document at least as often as
/// in the query, 0.0 when nothing matches or the query has no terms.
pub fn term_overlap(query: &HashMap<&str, usize>, document: &HashMap<&str, usize>) -> f64 {
    let self_weight: usize = query.values().map(|q| q * q).sum();
    if self_weight == 0 {
        return 0.0;
    }

    let shared: usize = query
        .iter()
        .map(|(term, q)| q * (*q).min(document.get(term).copied().unwrap_or(0)))
        .sum();

    shared as f64 / self_weight as f64
}

/// Jaccard similarity of two term sets; 0.0 when both are empty
pub fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
