//! Candidate documents and the annotated copies produced by each stage
//!
//! The caller's `Document` list is never modified. The prioritizer wraps
//! documents in `RankedDocument`, the allocator produces
//! `AllocatedDocument`, and each stage returns fresh values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::errors::{ContextError, Result};

/// A candidate document supplied by the retrieval stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Opaque caller-supplied key
    pub id: String,
    pub title: String,
    pub content: String,

    /// Relevance score, higher is better
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,

    /// Precomputed content token count, if the caller already knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<usize>,

    /// Where the document came from (file path, URL, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            score: None,
            tags: BTreeSet::new(),
            total_tokens: None,
            source: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_total_tokens(mut self, tokens: usize) -> Self {
        self.total_tokens = Some(tokens);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Reject documents the allocation algorithms cannot handle
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ContextError::InvalidDocument {
                id: self.id.clone(),
                reason: "id must not be empty".to_string(),
            });
        }

        if self.title.trim().is_empty() && self.content.trim().is_empty() {
            return Err(ContextError::InvalidDocument {
                id: self.id.clone(),
                reason: "title and content are both empty".to_string(),
            });
        }

        if let Some(score) = self.score {
            if !score.is_finite() || score < 0.0 {
                return Err(ContextError::InvalidScore {
                    id: self.id.clone(),
                    score,
                });
            }
        }

        Ok(())
    }
}

/// A document annotated with the prioritizer's blended score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDocument {
    pub document: Document,

    /// `None` when no scoring signal touched the document
    pub priority_score: Option<f64>,
}

impl RankedDocument {
    /// Score used for ordering: priority first, raw score second
    pub fn effective_score(&self) -> Option<f64> {
        self.priority_score.or(self.document.score)
    }
}

impl From<Document> for RankedDocument {
    fn from(document: Document) -> Self {
        Self {
            document,
            priority_score: None,
        }
    }
}

/// A document with its share of the token budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatedDocument {
    pub document: Document,
    pub priority_score: Option<f64>,

    /// Fixed header cost charged against the budget
    pub header_tokens: usize,

    /// Tokens the full content needs
    pub content_tokens: usize,

    /// Tokens granted to the content
    pub allocated_tokens: usize,

    /// `header_tokens + allocated_tokens`
    pub total_allocated: usize,

    /// Content must be cut to fit `allocated_tokens`
    pub truncated: bool,
}

impl AllocatedDocument {
    pub fn effective_score(&self) -> Option<f64> {
        self.priority_score.or(self.document.score)
    }
}
