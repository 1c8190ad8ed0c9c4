//! Token counting with an exact-tokenizer fast path
//!
//! The approximate counter is a character-class heuristic, reproduced
//! exactly so budgets stay stable across deployments:
//!
//! ```text
//! tokens(text) = ⌊chars / 4⌋ + ⌊spaces / 8⌋ + ⌊newlines / 2⌋
//!              + ⌊(digits + specials) / 6⌋
//! tokens("") = 0,  tokens(non-empty) ≥ 1
//! ```
//!
//! When a model id is given and the registry resolves a tokenizer for it,
//! the exact count is used instead. Resolution and encoding failures are
//! never surfaced to the caller.
//!
//! # Complexity
//! O(n) where n = text length

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::context::registry::ModelRegistry;
use crate::context::tokenizer::{Tokenizer, TokenizerCache, TokenizerResolver};
use crate::context::window::context_window_from_path;
use crate::types::ConversationMessage;

/// Fixed cost of the role marker around every message
pub const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Fixed cost between consecutive messages
pub const MESSAGE_SEPARATOR_TOKENS: usize = 3;

/// Fixed cost of priming the assistant's reply
pub const COMPLETION_MARKER_TOKENS: usize = 2;

/// Token counter with heuristic estimation and optional exact counts
pub struct TokenCounter {
    registry: Option<Arc<dyn ModelRegistry>>,
    resolver: TokenizerResolver,
    cache: TokenizerCache,
}

impl TokenCounter {
    /// Heuristic-only counter
    pub fn new() -> Self {
        Self {
            registry: None,
            resolver: TokenizerResolver::default(),
            cache: TokenizerCache::new(),
        }
    }

    /// Counter that consults a model registry for exact tokenizers and windows
    pub fn with_registry(registry: Arc<dyn ModelRegistry>) -> Self {
        Self {
            registry: Some(registry),
            ..Self::new()
        }
    }

    /// Replace the tokenizer loader chain
    pub fn with_resolver(mut self, resolver: TokenizerResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Approximate token count for text
    pub fn estimate(&self, text: &str) -> usize {
        CharacterCounts::of(text).estimate()
    }

    /// Conservative upper bound (110% of estimate, rounded up)
    pub fn upper_bound(&self, text: &str) -> usize {
        upper_bound_of(self.estimate(text))
    }

    /// Batch estimate for multiple text segments
    pub fn estimate_batch(&self, texts: &[&str]) -> usize {
        texts.iter().map(|text| self.estimate(text)).sum()
    }

    /// Estimate with the character-class breakdown
    pub fn estimate_detailed(&self, text: &str) -> TokenEstimate {
        let counts = CharacterCounts::of(text);
        let estimate = counts.estimate();

        TokenEstimate {
            char_count: counts.chars,
            space_count: counts.spaces,
            newline_count: counts.newlines,
            digit_count: counts.digits,
            special_count: counts.specials,
            estimate,
            upper_bound: upper_bound_of(estimate),
        }
    }

    /// Token count using the model's tokenizer when one resolves
    pub fn count(&self, text: &str, model_id: Option<&str>) -> usize {
        if text.is_empty() {
            return 0;
        }

        if let Some(tokenizer) = model_id.and_then(|id| self.tokenizer_for(id)) {
            match catch_unwind(AssertUnwindSafe(|| tokenizer.count(text))) {
                Ok(Ok(count)) => return count.max(1),
                Ok(Err(e)) => {
                    tracing::debug!(model = ?model_id, error = %e, "exact count failed, using heuristic");
                }
                Err(_) => {
                    tracing::debug!(model = ?model_id, "tokenizer panicked, using heuristic");
                }
            }
        }

        self.estimate(text)
    }

    /// Tokens consumed by conversation messages and the system message
    ///
    /// Each message costs its content plus a role overhead; consecutive
    /// messages add a separator and the prompt always carries the
    /// completion marker. The system message is priced separately.
    pub fn estimate_prompt_tokens(
        &self,
        messages: &[ConversationMessage],
        system_message: Option<&str>,
        model_id: Option<&str>,
    ) -> PromptTokens {
        let content: usize = messages
            .iter()
            .map(|m| self.count(&m.content, model_id) + MESSAGE_OVERHEAD_TOKENS)
            .sum();
        let separators = messages.len().saturating_sub(1) * MESSAGE_SEPARATOR_TOKENS;

        let system_tokens = match system_message {
            Some(system) if !system.is_empty() => {
                self.count(system, model_id) + MESSAGE_OVERHEAD_TOKENS
            }
            _ => 0,
        };

        PromptTokens {
            system_tokens,
            message_tokens: content + separators + COMPLETION_MARKER_TOKENS,
        }
    }

    /// Context window for a model
    ///
    /// Prefers the registry's exact value, then path tiers on the registry
    /// path, the supplied path, or the id itself.
    pub fn context_window_for(&self, model_id: Option<&str>, model_path: Option<&str>) -> usize {
        let info = model_id.and_then(|id| self.registry.as_ref()?.get_model_info(id));

        if let Some(window) = info.as_ref().and_then(|i| i.context_window) {
            return window;
        }

        let path = info
            .as_ref()
            .map(|i| i.path.as_str())
            .or(model_path)
            .or(model_id)
            .unwrap_or("");
        context_window_from_path(path)
    }

    fn tokenizer_for(&self, model_id: &str) -> Option<Arc<dyn Tokenizer>> {
        if let Some(cached) = self.cache.get(model_id) {
            return cached;
        }

        let info = self.registry.as_ref()?.get_model_info(model_id)?;
        let resolved = match self.resolver.resolve(&info) {
            Ok(tokenizer) => Some(tokenizer),
            Err(e) => {
                tracing::debug!(model = model_id, error = %e, "no exact tokenizer");
                None
            }
        };

        self.cache.insert(model_id, resolved)
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCounter")
            .field("has_registry", &self.registry.is_some())
            .field("loaders", &self.resolver.loader_names())
            .field("cached_tokenizers", &self.cache.len())
            .finish()
    }
}

fn upper_bound_of(estimate: usize) -> usize {
    (estimate as f64 * 1.10).ceil() as usize
}

#[derive(Debug, Default, Clone, Copy)]
struct CharacterCounts {
    chars: usize,
    spaces: usize,
    newlines: usize,
    digits: usize,
    specials: usize,
}

impl CharacterCounts {
    fn of(text: &str) -> Self {
        let mut counts = Self::default();
        for c in text.chars() {
            counts.chars += 1;
            match c {
                ' ' => counts.spaces += 1,
                '\n' => counts.newlines += 1,
                c if c.is_numeric() => counts.digits += 1,
                c if c.is_whitespace() || c.is_alphanumeric() || c == '_' => {}
                _ => counts.specials += 1,
            }
        }
        counts
    }

    fn estimate(&self) -> usize {
        if self.chars == 0 {
            return 0;
        }

        let tokens = self.chars / 4
            + self.spaces / 8
            + self.newlines / 2
            + (self.digits + self.specials) / 6;
        tokens.max(1)
    }
}

/// Detailed token estimate with breakdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEstimate {
    pub char_count: usize,
    pub space_count: usize,
    pub newline_count: usize,
    pub digit_count: usize,

    /// Characters that are neither word characters nor whitespace
    pub special_count: usize,

    pub estimate: usize,

    /// Conservative upper bound (estimate × 1.10)
    pub upper_bound: usize,
}

impl TokenEstimate {
    /// Get margin between estimate and upper bound
    pub fn margin(&self) -> usize {
        self.upper_bound.saturating_sub(self.estimate)
    }
}

/// Prompt-side token usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTokens {
    pub system_tokens: usize,
    pub message_tokens: usize,
}

impl PromptTokens {
    pub fn total(&self) -> usize {
        self.system_tokens + self.message_tokens
    }
}
