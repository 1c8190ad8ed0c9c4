//! Token-constrained allocation of ranked documents
//!
//! Every strategy guarantees
//! `Σ total_allocated ≤ available_tokens`, where each included document is
//! charged a fixed header cost plus its content allocation.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::context::TokenCounter;
use crate::rag::allocation::strategy::AllocationStrategy;
use crate::types::{AllocatedDocument, Document, RankedDocument};

/// Allocation constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Fixed cost of each document's header (default: 20)
    pub header_tokens: usize,

    /// Smallest content allocation worth including (default: 100)
    pub min_content_tokens: usize,

    /// Share of the budget offered to the top document in adaptive mode (default: 0.4)
    pub adaptive_top_share: f64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            header_tokens: 20,
            min_content_tokens: 100,
            adaptive_top_share: 0.4,
        }
    }
}

/// Divides a token budget between ranked documents
#[derive(Debug, Clone)]
pub struct Allocator {
    config: AllocatorConfig,
    counter: Arc<TokenCounter>,
}

impl Allocator {
    pub fn new(counter: Arc<TokenCounter>) -> Self {
        Self::with_config(AllocatorConfig::default(), counter)
    }

    pub fn with_config(config: AllocatorConfig, counter: Arc<TokenCounter>) -> Self {
        Self { config, counter }
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Allocate `available_tokens` across `documents`, sizing content with
    /// the heuristic estimator
    pub fn allocate(
        &self,
        documents: &[RankedDocument],
        available_tokens: usize,
        strategy: AllocationStrategy,
        query: Option<&str>,
    ) -> Vec<AllocatedDocument> {
        self.allocate_for_model(documents, available_tokens, strategy, query, None)
    }

    /// Allocate with content sized by `model_id`'s exact tokenizer when one
    /// resolves
    pub fn allocate_for_model(
        &self,
        documents: &[RankedDocument],
        available_tokens: usize,
        strategy: AllocationStrategy,
        query: Option<&str>,
        model_id: Option<&str>,
    ) -> Vec<AllocatedDocument> {
        if documents.is_empty() || available_tokens == 0 {
            return Vec::new();
        }

        let allocated = match strategy {
            AllocationStrategy::Equal => self.allocate_equal(documents, available_tokens, model_id),
            AllocationStrategy::Proportional => {
                self.allocate_proportional(documents, available_tokens, model_id)
            }
            AllocationStrategy::Prioritized => {
                self.allocate_prioritized(documents, available_tokens, model_id)
            }
            AllocationStrategy::Adaptive => {
                self.allocate_adaptive(documents, available_tokens, query, model_id)
            }
        };

        tracing::debug!(
            %strategy,
            available_tokens,
            included = allocated.len(),
            dropped = documents.len() - allocated.len(),
            used = allocated.iter().map(|d| d.total_allocated).sum::<usize>(),
            "allocated document budget"
        );

        allocated
    }

    /// Tokens the full content needs: the caller's count, else the model's
    pub fn content_tokens(&self, document: &Document, model_id: Option<&str>) -> usize {
        document
            .total_tokens
            .unwrap_or_else(|| self.counter.count(&document.content, model_id))
    }

    /// Same share for everyone, in input order; halts at the first miss
    fn allocate_equal(
        &self,
        documents: &[RankedDocument],
        available: usize,
        model_id: Option<&str>,
    ) -> Vec<AllocatedDocument> {
        let header = self.config.header_tokens;
        let content_budget = available.saturating_sub(documents.len() * header);
        let share = (content_budget / documents.len()).max(self.config.min_content_tokens);

        let mut remaining = available;
        let mut allocated = Vec::new();

        for ranked in documents {
            if remaining < share + header {
                break;
            }
            let need = self.content_tokens(&ranked.document, model_id);
            allocated.push(self.annotate(ranked, need, share, need > share));
            remaining -= share + header;
        }

        allocated
    }

    /// Shares proportional to score, highest score first
    ///
    /// Falls back to equal shares when any document lacks a score or the
    /// scores sum to zero.
    fn allocate_proportional(
        &self,
        documents: &[RankedDocument],
        available: usize,
        model_id: Option<&str>,
    ) -> Vec<AllocatedDocument> {
        let scores: Option<Vec<f64>> = documents.iter().map(|d| d.effective_score()).collect();
        let total_score: f64 = scores.iter().flatten().sum();

        if scores.is_none() || total_score <= 0.0 {
            tracing::warn!("proportional allocation needs scores on every document, using equal");
            return self.allocate_equal(documents, available, model_id);
        }

        let header = self.config.header_tokens;
        let min_content = self.config.min_content_tokens;
        let content_budget = available.saturating_sub(documents.len() * header);

        let mut pool = content_budget;
        let mut remaining = available;
        let mut allocated = Vec::new();

        for ranked in sorted_by_score(documents) {
            let score = ranked.effective_score().unwrap_or(0.0);
            let proportional = (content_budget as f64 * score / total_score).floor() as usize;
            let share = proportional.max(min_content).min(pool);

            if share < min_content || share + header > remaining {
                break;
            }

            let need = self.content_tokens(&ranked.document, model_id);
            allocated.push(self.annotate(ranked, need, share, need > share));
            pool -= share;
            remaining -= share + header;
        }

        allocated
    }

    /// Whole documents by descending score; the first one that does not fit
    /// is truncated into whatever remains, then allocation stops
    fn allocate_prioritized(
        &self,
        documents: &[RankedDocument],
        available: usize,
        model_id: Option<&str>,
    ) -> Vec<AllocatedDocument> {
        let header = self.config.header_tokens;
        let mut remaining = available;
        let mut allocated = Vec::new();

        for ranked in sorted_by_score(documents) {
            let need = self.content_tokens(&ranked.document, model_id);

            if need + header <= remaining {
                allocated.push(self.annotate(ranked, need, need, false));
                remaining -= need + header;
                continue;
            }

            if remaining > header + self.config.min_content_tokens {
                let share = remaining - header;
                tracing::debug!(id = %ranked.document.id, need, share, "truncating last document");
                allocated.push(self.annotate(ranked, need, share, true));
            }
            break;
        }

        allocated
    }

    /// Large fixed share for the top document, proportional for the rest
    fn allocate_adaptive(
        &self,
        documents: &[RankedDocument],
        available: usize,
        query: Option<&str>,
        model_id: Option<&str>,
    ) -> Vec<AllocatedDocument> {
        let has_query = query.is_some_and(|q| !q.trim().is_empty());
        let scored = documents
            .iter()
            .filter(|d| d.effective_score().is_some())
            .count();
        if !has_query || scored <= 1 {
            return self.allocate_prioritized(documents, available, model_id);
        }

        let header = self.config.header_tokens;
        let min_content = self.config.min_content_tokens;
        let ordered = sorted_by_score(documents);
        let (top, rest) = match ordered.split_first() {
            Some(split) => split,
            None => return Vec::new(),
        };

        let need = self.content_tokens(&top.document, model_id);
        let top_share = (available as f64 * self.config.adaptive_top_share).floor() as usize;
        let grant = need
            .min(top_share.max(min_content))
            .min(available.saturating_sub(header));
        if grant < need.min(min_content) || grant + header > available {
            return Vec::new();
        }

        let mut allocated = vec![self.annotate(top, need, grant, need > grant)];

        let remainder = available - grant - header;
        if !rest.is_empty() && remainder > header + min_content {
            let rest: Vec<RankedDocument> = rest.iter().map(|d| (*d).clone()).collect();
            allocated.extend(self.allocate_proportional(&rest, remainder, model_id));
        }

        allocated
    }

    fn annotate(
        &self,
        ranked: &RankedDocument,
        content_tokens: usize,
        allocated_tokens: usize,
        truncated: bool,
    ) -> AllocatedDocument {
        AllocatedDocument {
            document: ranked.document.clone(),
            priority_score: ranked.priority_score,
            header_tokens: self.config.header_tokens,
            content_tokens,
            allocated_tokens,
            total_allocated: allocated_tokens + self.config.header_tokens,
            truncated,
        }
    }
}

/// Stable descending sort by effective score; unscored documents count as 0
fn sorted_by_score(documents: &[RankedDocument]) -> Vec<&RankedDocument> {
    let mut ordered: Vec<&RankedDocument> = documents.iter().collect();
    ordered.sort_by(|a, b| {
        let a_score = a.effective_score().unwrap_or(0.0);
        let b_score = b.effective_score().unwrap_or(0.0);
        b_score
            .partial_cmp(&a_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ordered
}
