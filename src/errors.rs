//! Error types for contextpack
//!
//! Only caller-input problems surface as errors. Tokenizer failures,
//! unknown strategy names and missing scores are absorbed by fallbacks,
//! and budget overruns are reported as data on `BudgetAllocation`.

use thiserror::Error;

/// Main error type for context assembly
#[derive(Error, Debug)]
pub enum ContextError {
    /// Document failed boundary validation
    #[error("Invalid document '{id}': {reason}")]
    InvalidDocument { id: String, reason: String },

    /// Relevance score is not a usable number
    #[error("Invalid score {score} on document '{id}': scores must be finite and non-negative")]
    InvalidScore { id: String, score: f64 },

    /// Two candidates share the same id
    #[error("Duplicate document id '{0}'")]
    DuplicateDocument(String),

    /// Strategy name outside the closed set
    #[error("Unknown allocation strategy '{0}' (expected equal, proportional, prioritized or adaptive)")]
    UnknownStrategy(String),

    /// Exact tokenizer could not be built or run
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors while saving configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for context assembly operations
pub type Result<T> = std::result::Result<T, ContextError>;
