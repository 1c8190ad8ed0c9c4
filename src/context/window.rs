//! Context window lookup by model name
//!
//! Used when the registry has no exact window for a model. The path (or
//! id) is matched case-insensitively against three size tiers, largest
//! tier first.

/// Window assumed when no tier matches
pub const DEFAULT_CONTEXT_WINDOW: usize = 2048;

const TIERS: &[(usize, &[&str])] = &[
    (8192, &["70b", "claude", "gpt-4"]),
    (4096, &["13b", "mistral", "7b", "llama2"]),
    (2048, &["tiny", "small", "1.1b", "1b"]),
];

/// Guess a context window from substrings of a model path or id
pub fn context_window_from_path(path: &str) -> usize {
    let lowered = path.to_lowercase();

    TIERS
        .iter()
        .find(|(_, triggers)| triggers.iter().any(|t| lowered.contains(t)))
        .map(|(window, _)| *window)
        .unwrap_or(DEFAULT_CONTEXT_WINDOW)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_very_large_tier() {
        assert_eq!(context_window_from_path("/models/Llama-2-70B-chat"), 8192);
        assert_eq!(context_window_from_path("claude-instant"), 8192);
        assert_eq!(context_window_from_path("gpt-4-turbo"), 8192);
    }

    #[test]
    fn test_large_tier() {
        assert_eq!(context_window_from_path("mistral-instruct"), 4096);
        assert_eq!(context_window_from_path("/m/llama2-13b.gguf"), 4096);
        assert_eq!(context_window_from_path("qwen-7b"), 4096);
    }

    #[test]
    fn test_small_tier() {
        assert_eq!(context_window_from_path("TinyLlama-1.1B"), 2048);
        assert_eq!(context_window_from_path("phi-small"), 2048);
    }

    #[test]
    fn test_larger_tier_wins() {
        // matches both "70b" and "tiny"
        assert_eq!(context_window_from_path("tiny-70b-merge"), 8192);
    }

    #[test]
    fn test_default() {
        assert_eq!(context_window_from_path("unknown-model"), DEFAULT_CONTEXT_WINDOW);
        assert_eq!(context_window_from_path(""), DEFAULT_CONTEXT_WINDOW);
    }
}
