//! Budget system type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for context budget planning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Floor for the response reservation (default: 256)
    pub min_reserved_tokens: usize,

    /// Share of the window always kept for the response (default: 0.15)
    pub reserve_ratio: f64,

    /// Usage share that triggers a near-limit warning (default: 0.9)
    pub warning_threshold: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            min_reserved_tokens: 256,
            reserve_ratio: 0.15,
            warning_threshold: 0.9,
        }
    }
}

/// How a model's context window is split
///
/// `system_tokens + message_tokens + reserved_tokens + available_for_context`
/// equals `context_window` unless `is_over_limit`, in which case
/// `available_for_context` is 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    pub context_window: usize,
    pub system_tokens: usize,
    pub message_tokens: usize,
    pub reserved_tokens: usize,
    pub available_for_context: usize,

    pub system_percent: f64,
    pub message_percent: f64,
    pub reserved_percent: f64,
    pub context_percent: f64,

    pub is_over_limit: bool,
}

impl BudgetAllocation {
    /// Tokens committed before any document is added
    pub fn committed_tokens(&self) -> usize {
        self.system_tokens + self.message_tokens + self.reserved_tokens
    }
}

/// Advisory budget warnings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BudgetWarning {
    /// Prompt and reservation alone exceed the window
    OverLimit { required: usize, context_window: usize },

    /// Prompt and reservation leave little room for documents
    NearLimit {
        used: usize,
        context_window: usize,
        percent: f64,
    },

    /// Response reservation is below the configured floor
    LowReserve { reserved: usize, minimum: usize },
}

impl fmt::Display for BudgetWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetWarning::OverLimit {
                required,
                context_window,
            } => write!(
                f,
                "Prompt requires {} tokens but the context window is {}; no room for documents",
                required, context_window
            ),
            BudgetWarning::NearLimit {
                used,
                context_window,
                percent,
            } => write!(
                f,
                "Prompt and response reservation use {} of {} tokens ({:.1}%)",
                used, context_window, percent
            ),
            BudgetWarning::LowReserve { reserved, minimum } => write!(
                f,
                "Only {} tokens reserved for the response (minimum {})",
                reserved, minimum
            ),
        }
    }
}
