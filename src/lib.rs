//! contextpack - token-budgeted context assembly for LLM prompts
//!
//! Given candidate documents, a query, optional conversation history and a
//! target model, decides which documents enter the prompt, how many tokens
//! each may use, and renders them into a single context block.
//!
//! # Architecture
//!
//! - **context**: token estimation, exact tokenizers, context windows
//! - **budget**: splitting the window between prompt, response and documents
//! - **rag**: prioritization, allocation strategies, formatting, pipeline

pub mod errors;
pub mod types;
pub mod context;
pub mod budget;
pub mod rag;
pub mod config;

// Re-export commonly used types
pub use errors::{ContextError, Result};
pub use types::{AllocatedDocument, ConversationMessage, Document, RankedDocument, Role};
pub use context::TokenCounter;
pub use budget::{BudgetAllocation, BudgetPlanner, BudgetWarning};
pub use rag::{
    AllocationStrategy, Allocator, AssembledContext, ContextFormatter, ContextPipeline,
    ContextRequest, DocumentPrioritizer,
};
pub use config::{Config, RequestDefaults};
