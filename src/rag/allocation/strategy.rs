//! Allocation strategy selection
//!
//! The set of strategies is closed. Strict parsing rejects unknown names
//! at the request boundary; lenient parsing is available to serving
//! layers that prefer a logged fallback over an error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ContextError;

/// How the token budget is divided between documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStrategy {
    /// Same share for every document, in input order
    Equal,
    /// Shares proportional to relevance scores
    Proportional,
    /// Whole documents by descending score, at most one truncated at the end
    #[default]
    Prioritized,
    /// Large fixed share for the top document, proportional for the rest
    Adaptive,
}

impl AllocationStrategy {
    pub const ALL: [AllocationStrategy; 4] = [
        AllocationStrategy::Equal,
        AllocationStrategy::Proportional,
        AllocationStrategy::Prioritized,
        AllocationStrategy::Adaptive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStrategy::Equal => "equal",
            AllocationStrategy::Proportional => "proportional",
            AllocationStrategy::Prioritized => "prioritized",
            AllocationStrategy::Adaptive => "adaptive",
        }
    }

    /// Parse a strategy name, falling back to `Prioritized` with a warning
    pub fn parse_lenient(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            tracing::warn!(strategy = name, "unknown allocation strategy, using prioritized");
            AllocationStrategy::Prioritized
        })
    }
}

impl FromStr for AllocationStrategy {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        AllocationStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| ContextError::UnknownStrategy(s.to_string()))
    }
}

impl fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
