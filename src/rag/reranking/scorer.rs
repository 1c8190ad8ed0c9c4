// Re-ranking scorer for candidate documents
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::rag::terms::{extract_terms, jaccard, term_frequencies, term_overlap};
use crate::types::{ConversationMessage, Document, RankedDocument};

/// Re-ranking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrioritizerConfig {
    /// Blend weight of query-term overlap
    pub query_weight: f64,
    /// Blend weight of recent-history overlap
    pub history_weight: f64,
    /// Blend weight of the diversity signal, applied last
    pub diversity_weight: f64,
    /// Added to the history signal for documents shown earlier in the conversation
    pub continuity_boost: f64,
    /// Number of trailing messages whose terms count as recent history
    pub history_window: usize,
    /// Smoothing added to tag frequencies before inversion
    pub tag_smoothing: f64,
}

impl Default for PrioritizerConfig {
    fn default() -> Self {
        Self {
            query_weight: 0.3,
            history_weight: 0.2,
            diversity_weight: 0.1,
            continuity_boost: 0.1,
            history_window: 3,
            tag_smoothing: 0.1,
        }
    }
}

/// Multi-signal re-ranker
///
/// Each signal blends into a running score:
/// `score' = score × (1 - w) + signal × w`. Signals run in a fixed order:
/// query overlap, history overlap, diversity.
#[derive(Debug, Clone, Default)]
pub struct DocumentPrioritizer {
    config: PrioritizerConfig,
}

impl DocumentPrioritizer {
    /// Create new prioritizer with default config
    pub fn new() -> Self {
        Self::with_config(PrioritizerConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(config: PrioritizerConfig) -> Self {
        Self { config }
    }

    /// Score, rank and cut the candidate list
    ///
    /// The result is ordered by descending priority (raw score for
    /// documents no signal touched); ties keep input order.
    pub fn prioritize(
        &self,
        documents: &[Document],
        query: &str,
        history: Option<&[ConversationMessage]>,
        max_documents: usize,
    ) -> Vec<RankedDocument> {
        let doc_terms: Vec<Vec<String>> = documents
            .iter()
            .map(|doc| extract_terms(&format!("{} {}", doc.title, doc.content)))
            .collect();
        let doc_frequencies: Vec<HashMap<&str, usize>> =
            doc_terms.iter().map(|terms| term_frequencies(terms)).collect();

        let mut scores: Vec<Option<f64>> = vec![None; documents.len()];
        let current =
            |scores: &[Option<f64>], i: usize| scores[i].or(documents[i].score).unwrap_or(0.0);

        if !query.trim().is_empty() {
            let query_terms = extract_terms(query);
            let query_frequencies = term_frequencies(&query_terms);

            for i in 0..documents.len() {
                let overlap = term_overlap(&query_frequencies, &doc_frequencies[i]);
                scores[i] = Some(blend(current(&scores, i), overlap, self.config.query_weight));
            }
        }

        if let Some(history) = history.filter(|h| !h.is_empty()) {
            let recent_start = history.len().saturating_sub(self.config.history_window);
            let history_terms: Vec<String> = history[recent_start..]
                .iter()
                .flat_map(|message| extract_terms(&message.content))
                .collect();
            let history_frequencies = term_frequencies(&history_terms);

            for (i, doc) in documents.iter().enumerate() {
                let mut signal = term_overlap(&history_frequencies, &doc_frequencies[i]);
                if history.iter().any(|message| message.references(&doc.id)) {
                    signal += self.config.continuity_boost;
                }
                scores[i] = Some(blend(current(&scores, i), signal, self.config.history_weight));
            }
        }

        if documents.len() > 2 {
            let diversity = if documents.iter().any(|doc| !doc.tags.is_empty()) {
                self.tag_rarity(documents)
            } else {
                content_uniqueness(&doc_terms)
            };

            for (i, signal) in diversity.into_iter().enumerate() {
                scores[i] = Some(blend(current(&scores, i), signal, self.config.diversity_weight));
            }
        }

        let mut ranked: Vec<RankedDocument> = documents
            .iter()
            .zip(scores)
            .map(|(doc, priority_score)| RankedDocument {
                document: doc.clone(),
                priority_score,
            })
            .collect();

        // stable: equal scores keep input order
        ranked.sort_by(|a, b| {
            let a_score = a.effective_score().unwrap_or(0.0);
            let b_score = b.effective_score().unwrap_or(0.0);
            b_score
                .partial_cmp(&a_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(max_documents);

        ranked
    }

    /// Inverse tag frequency summed over a document's tags, divided by
    /// `tag_count × document_count` and capped at 1.0
    ///
    /// Frequencies are the number of candidates carrying the tag; untagged
    /// documents score 0.
    fn tag_rarity(&self, documents: &[Document]) -> Vec<f64> {
        let mut frequencies: HashMap<&str, usize> = HashMap::new();
        for tag in documents.iter().flat_map(|doc| doc.tags.iter()) {
            *frequencies.entry(tag.as_str()).or_insert(0) += 1;
        }

        documents
            .iter()
            .map(|doc| {
                if doc.tags.is_empty() {
                    return 0.0;
                }
                let total: f64 = doc
                    .tags
                    .iter()
                    .map(|tag| {
                        let frequency = frequencies.get(tag.as_str()).copied().unwrap_or(0);
                        1.0 / (frequency as f64 + self.config.tag_smoothing)
                    })
                    .sum();
                (total / (doc.tags.len() * documents.len()) as f64).min(1.0)
            })
            .collect()
    }

    /// Get current configuration
    pub fn config(&self) -> &PrioritizerConfig {
        &self.config
    }

    /// Update configuration
    pub fn set_config(&mut self, config: PrioritizerConfig) {
        self.config = config;
    }
}

fn blend(score: f64, signal: f64, weight: f64) -> f64 {
    score * (1.0 - weight) + signal * weight
}

/// `1 - mean Jaccard similarity` of each document against every other one
fn content_uniqueness(doc_terms: &[Vec<String>]) -> Vec<f64> {
    let sets: Vec<HashSet<&str>> = doc_terms
        .iter()
        .map(|terms| terms.iter().map(String::as_str).collect())
        .collect();
    let others = sets.len().saturating_sub(1);
    if others == 0 {
        return vec![1.0; sets.len()];
    }

    sets.iter()
        .enumerate()
        .map(|(i, set)| {
            let total: f64 = sets
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, other)| jaccard(set, other))
                .sum();
            1.0 - total / others as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, content: &str, score: f64) -> Document {
        Document::new(id, "", content).with_score(score)
    }

    fn ids(ranked: &[RankedDocument]) -> Vec<&str> {
        ranked.iter().map(|r| r.document.id.as_str()).collect()
    }

    #[test]
    fn test_prioritizer_creation() {
        let prioritizer = DocumentPrioritizer::new();
        assert_eq!(prioritizer.config.query_weight, 0.3);
        assert_eq!(prioritizer.config.history_window, 3);
    }

    #[test]
    fn test_query_overlap_reorders() {
        let prioritizer = DocumentPrioritizer::new();
        let docs = vec![
            doc("a", "python decorators explained", 0.5),
            doc("b", "rust ownership and borrowing", 0.5),
        ];

        let ranked = prioritizer.prioritize(&docs, "rust ownership", None, 10);

        assert_eq!(ids(&ranked), vec!["b", "a"]);
        assert!((ranked[0].priority_score.unwrap() - 0.65).abs() < 1e-9);
        assert!((ranked[1].priority_score.unwrap() - 0.35).abs() < 1e-9);
    }

    #[test]
    fn test_untouched_documents_use_raw_score() {
        let prioritizer = DocumentPrioritizer::new();
        let docs = vec![doc("a", "first", 0.2), doc("b", "second", 0.9)];

        let ranked = prioritizer.prioritize(&docs, "", None, 10);

        assert_eq!(ids(&ranked), vec!["b", "a"]);
        assert!(ranked.iter().all(|r| r.priority_score.is_none()));
    }

    #[test]
    fn test_continuity_boost() {
        let prioritizer = DocumentPrioritizer::new();
        let docs = vec![
            doc("a", "alpha beta gamma", 0.5),
            doc("b", "delta epsilon zeta", 0.5),
        ];
        let history = vec![
            ConversationMessage::user("previous question"),
            ConversationMessage::assistant("previous answer").with_context_docs(["b"]),
        ];

        let ranked = prioritizer.prioritize(&docs, "", Some(&history), 10);

        assert_eq!(ids(&ranked), vec!["b", "a"]);
        assert!((ranked[0].priority_score.unwrap() - 0.42).abs() < 1e-9);
        assert!((ranked[1].priority_score.unwrap() - 0.40).abs() < 1e-9);
    }

    #[test]
    fn test_history_window_limits_terms() {
        let prioritizer = DocumentPrioritizer::new();
        let docs = vec![
            doc("b", "something unrelated", 0.5),
            doc("a", "kubernetes clusters", 0.5),
        ];
        let history = vec![
            ConversationMessage::user("tell me about kubernetes"),
            ConversationMessage::assistant("sure"),
            ConversationMessage::user("thanks"),
            ConversationMessage::assistant("welcome"),
        ];

        let ranked = prioritizer.prioritize(&docs, "", Some(&history), 10);

        assert_eq!(ids(&ranked), vec!["b", "a"]);
        assert_eq!(ranked[0].priority_score, ranked[1].priority_score);
    }

    #[test]
    fn test_tag_rarity_promotes_rare_tags() {
        let prioritizer = DocumentPrioritizer::new();
        let docs = vec![
            doc("a", "first", 0.5).with_tags(["common"]),
            doc("b", "second", 0.5).with_tags(["common"]),
            doc("c", "third", 0.5).with_tags(["rare"]),
        ];

        let ranked = prioritizer.prioritize(&docs, "", None, 10);

        assert_eq!(ids(&ranked), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_content_uniqueness_without_tags() {
        let prioritizer = DocumentPrioritizer::new();
        let docs = vec![
            doc("a", "rust ownership borrow", 0.5),
            doc("b", "rust ownership borrow", 0.5),
            doc("c", "python decorators generators", 0.5),
        ];

        let ranked = prioritizer.prioritize(&docs, "", None, 10);

        assert_eq!(ids(&ranked), vec!["c", "a", "b"]);
        assert!((ranked[0].priority_score.unwrap() - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_diversity_skipped_for_two_documents() {
        let prioritizer = DocumentPrioritizer::new();
        let docs = vec![
            doc("a", "same words", 0.5).with_tags(["x"]),
            doc("b", "other words", 0.5),
        ];

        let ranked = prioritizer.prioritize(&docs, "", None, 10);
        assert!(ranked.iter().all(|r| r.priority_score.is_none()));
    }

    #[test]
    fn test_max_documents() {
        let prioritizer = DocumentPrioritizer::new();
        let docs: Vec<Document> = (0..6)
            .map(|i| doc(&format!("d{}", i), "content", i as f64 / 10.0))
            .collect();

        let ranked = prioritizer.prioritize(&docs, "", None, 2);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ids(&ranked), vec!["d5", "d4"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let prioritizer = DocumentPrioritizer::new();
        let docs = vec![
            Document::new("x", "", "same"),
            Document::new("y", "", "same"),
            Document::new("z", "", "same"),
        ];

        let ranked = prioritizer.prioritize(&docs, "unrelated query", None, 10);
        assert_eq!(ids(&ranked), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_input_is_not_modified() {
        let prioritizer = DocumentPrioritizer::new();
        let docs = vec![doc("a", "rust", 0.1), doc("b", "rust", 0.2)];
        let before = docs.clone();

        let _ = prioritizer.prioritize(&docs, "rust", None, 10);
        assert_eq!(docs, before);
    }
}
