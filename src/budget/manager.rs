//! Context budget planner
//! Splits a model's context window between prompt, response and documents

use crate::budget::types::{BudgetAllocation, BudgetConfig, BudgetWarning};
use crate::context::TokenCounter;
use crate::types::ConversationMessage;

/// Stateless planner for the document token allowance
#[derive(Debug, Clone, Default)]
pub struct BudgetPlanner {
    config: BudgetConfig,
}

impl BudgetPlanner {
    /// Create planner with default configuration
    pub fn new() -> Self {
        Self::with_config(BudgetConfig::default())
    }

    /// Create planner with custom configuration
    pub fn with_config(config: BudgetConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    /// Plan the token split for one request
    ///
    /// Formula:
    /// ```text
    /// reserved  = max(completion > 0 ? completion : min_reserved, ⌊window × reserve_ratio⌋)
    /// available = max(0, window - system - messages - reserved)
    /// over      = system + messages + reserved > window
    /// ```
    pub fn plan(
        &self,
        context_window: usize,
        system_tokens: usize,
        message_tokens: usize,
        completion_tokens: usize,
    ) -> BudgetAllocation {
        let requested = if completion_tokens > 0 {
            completion_tokens
        } else {
            self.config.min_reserved_tokens
        };
        let ratio_reserve = (context_window as f64 * self.config.reserve_ratio).floor() as usize;
        let reserved_tokens = requested.max(ratio_reserve);

        let committed = system_tokens + message_tokens + reserved_tokens;
        let is_over_limit = committed > context_window;
        let available_for_context = context_window.saturating_sub(committed);

        let percent = |tokens: usize| -> f64 {
            if context_window == 0 {
                return 0.0;
            }
            (tokens as f64 / context_window as f64 * 1000.0).round() / 10.0
        };

        BudgetAllocation {
            context_window,
            system_tokens,
            message_tokens,
            reserved_tokens,
            available_for_context,
            system_percent: percent(system_tokens),
            message_percent: percent(message_tokens),
            reserved_percent: percent(reserved_tokens),
            context_percent: percent(available_for_context),
            is_over_limit,
        }
    }

    /// Plan for a model using estimated prompt sizes
    pub fn plan_for_prompt(
        &self,
        counter: &TokenCounter,
        model_id: Option<&str>,
        messages: &[ConversationMessage],
        system_message: Option<&str>,
        completion_tokens: usize,
    ) -> BudgetAllocation {
        let context_window = counter.context_window_for(model_id, None);
        let prompt = counter.estimate_prompt_tokens(messages, system_message, model_id);
        self.plan(
            context_window,
            prompt.system_tokens,
            prompt.message_tokens,
            completion_tokens,
        )
    }

    /// Inspect an allocation and report advisory warnings
    pub fn check_warnings(&self, allocation: &BudgetAllocation) -> Vec<BudgetWarning> {
        let mut warnings = Vec::new();
        let committed = allocation.committed_tokens();

        if allocation.is_over_limit {
            warnings.push(BudgetWarning::OverLimit {
                required: committed,
                context_window: allocation.context_window,
            });
        } else if allocation.context_window > 0
            && committed as f64 > allocation.context_window as f64 * self.config.warning_threshold
        {
            warnings.push(BudgetWarning::NearLimit {
                used: committed,
                context_window: allocation.context_window,
                percent: (committed as f64 / allocation.context_window as f64 * 1000.0).round()
                    / 10.0,
            });
        }

        if allocation.reserved_tokens < self.config.min_reserved_tokens {
            warnings.push(BudgetWarning::LowReserve {
                reserved: allocation.reserved_tokens,
                minimum: self.config.min_reserved_tokens,
            });
        }

        for warning in &warnings {
            tracing::warn!(%warning, "context budget");
        }

        warnings
    }
}
