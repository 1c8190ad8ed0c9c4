//! Token estimation module
//!
//! Handles approximate and exact token counting, model registry lookups,
//! and context window sizing.

pub mod counter;
pub mod registry;
pub mod tokenizer;
pub mod window;

// Re-export commonly used types
pub use counter::{PromptTokens, TokenCounter, TokenEstimate};
pub use counter::{COMPLETION_MARKER_TOKENS, MESSAGE_OVERHEAD_TOKENS, MESSAGE_SEPARATOR_TOKENS};
pub use registry::{ModelInfo, ModelRegistry, StaticModelRegistry};
pub use tokenizer::{
    HfTokenizer, HubLoader, LocalFileLoader, ModelFamily, Tokenizer, TokenizerCache,
    TokenizerLoader, TokenizerResolver, DEFAULT_LOAD_TIMEOUT,
};
pub use window::{context_window_from_path, DEFAULT_CONTEXT_WINDOW};
