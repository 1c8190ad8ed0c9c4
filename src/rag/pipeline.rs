// End-to-end context assembly: budget -> prioritize -> allocate -> render
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::budget::{BudgetAllocation, BudgetPlanner};
use crate::config::{Config, RequestDefaults};
use crate::context::TokenCounter;
use crate::errors::{ContextError, Result};
use crate::rag::allocation::{AllocationStrategy, Allocator};
use crate::rag::context::{ContextFormatter, DocumentMetadata, RenderedContext};
use crate::rag::reranking::DocumentPrioritizer;
use crate::types::{ConversationMessage, Document};

/// One context assembly request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRequest {
    /// Candidate documents
    pub documents: Vec<Document>,
    /// Current user query
    pub query: String,
    /// Prior conversation, oldest first
    #[serde(default)]
    pub history: Vec<ConversationMessage>,
    #[serde(default)]
    pub model_id: Option<String>,
    /// Model file path, used for window inference when the id is unknown
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default)]
    pub system_message: Option<String>,
    #[serde(default)]
    pub strategy: AllocationStrategy,
    pub max_documents: usize,
    /// Requested response size; 0 uses the planner minimum
    #[serde(default)]
    pub completion_tokens: usize,
}

impl ContextRequest {
    pub fn new(query: impl Into<String>, documents: Vec<Document>) -> Self {
        Self::from_defaults(query, documents, &RequestDefaults::default())
    }

    /// Request seeded with the strategy, document cap and completion size
    /// from a `[defaults]` section
    pub fn from_defaults(
        query: impl Into<String>,
        documents: Vec<Document>,
        defaults: &RequestDefaults,
    ) -> Self {
        Self {
            documents,
            query: query.into(),
            history: Vec::new(),
            model_id: None,
            model_path: None,
            system_message: None,
            strategy: defaults.strategy,
            max_documents: defaults.max_documents,
            completion_tokens: defaults.completion_tokens,
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn with_model_path(mut self, path: impl Into<String>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    pub fn with_system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = Some(message.into());
        self
    }

    pub fn with_strategy(mut self, strategy: AllocationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_documents(mut self, max_documents: usize) -> Self {
        self.max_documents = max_documents;
        self
    }

    pub fn with_completion_tokens(mut self, tokens: usize) -> Self {
        self.completion_tokens = tokens;
        self
    }

    /// Reject malformed documents and duplicate ids
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.documents.len());
        for doc in &self.documents {
            doc.validate()?;
            if !seen.insert(doc.id.as_str()) {
                return Err(ContextError::DuplicateDocument(doc.id.clone()));
            }
        }
        Ok(())
    }
}

/// Result of one assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    /// Rendered context block; empty when nothing fit
    pub context: String,
    /// Included documents in rendered order
    pub documents: Vec<DocumentMetadata>,
    pub budget: BudgetAllocation,
    pub strategy: AllocationStrategy,
    /// Human-readable budget and selection warnings
    pub warnings: Vec<String>,
}

impl AssembledContext {
    pub fn document_ids(&self) -> Vec<&str> {
        self.documents.iter().map(|d| d.id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Context assembly pipeline
#[derive(Debug, Clone)]
pub struct ContextPipeline {
    counter: Arc<TokenCounter>,
    planner: BudgetPlanner,
    prioritizer: DocumentPrioritizer,
    allocator: Allocator,
    formatter: ContextFormatter,
    defaults: RequestDefaults,
}

impl ContextPipeline {
    /// Heuristic-only pipeline with default settings
    pub fn new() -> Self {
        Self::with_counter(Arc::new(TokenCounter::new()))
    }

    /// Default settings around a shared counter
    pub fn with_counter(counter: Arc<TokenCounter>) -> Self {
        Self {
            planner: BudgetPlanner::new(),
            prioritizer: DocumentPrioritizer::new(),
            allocator: Allocator::new(Arc::clone(&counter)),
            formatter: ContextFormatter::new(Arc::clone(&counter)),
            defaults: RequestDefaults::default(),
            counter,
        }
    }

    /// Build every component from configuration, including the model registry
    pub fn from_config(config: &Config) -> Self {
        let counter = Arc::new(TokenCounter::with_registry(Arc::new(config.registry())));

        Self {
            planner: BudgetPlanner::with_config(config.budget.clone()),
            prioritizer: DocumentPrioritizer::with_config(config.prioritizer.clone()),
            allocator: Allocator::with_config(config.allocator.clone(), Arc::clone(&counter)),
            formatter: ContextFormatter::with_config(config.format.clone(), Arc::clone(&counter)),
            defaults: config.defaults.clone(),
            counter,
        }
    }

    /// New request carrying this pipeline's configured defaults
    pub fn request(&self, query: impl Into<String>, documents: Vec<Document>) -> ContextRequest {
        ContextRequest::from_defaults(query, documents, &self.defaults)
    }

    /// Assemble a context block for one request
    pub fn assemble(&self, request: &ContextRequest) -> Result<AssembledContext> {
        request.validate()?;

        let model_id = request.model_id.as_deref();
        let context_window = self
            .counter
            .context_window_for(model_id, request.model_path.as_deref());

        // The query is the final user turn of the prompt
        let mut messages = request.history.clone();
        if !request.query.trim().is_empty() {
            messages.push(ConversationMessage::user(request.query.clone()));
        }
        let prompt = self.counter.estimate_prompt_tokens(
            &messages,
            request.system_message.as_deref(),
            model_id,
        );

        let budget = self.planner.plan(
            context_window,
            prompt.system_tokens,
            prompt.message_tokens,
            request.completion_tokens,
        );
        let mut warnings: Vec<String> = self
            .planner
            .check_warnings(&budget)
            .iter()
            .map(ToString::to_string)
            .collect();

        let history = (!request.history.is_empty()).then_some(request.history.as_slice());
        let ranked = self.prioritizer.prioritize(
            &request.documents,
            &request.query,
            history,
            request.max_documents,
        );

        let available = budget
            .available_for_context
            .saturating_sub(self.formatter.overhead_tokens_for_model(ranked.len(), model_id));
        let allocated = self.allocator.allocate_for_model(
            &ranked,
            available,
            request.strategy,
            Some(request.query.as_str()),
            model_id,
        );

        if allocated.len() < ranked.len() {
            tracing::debug!(
                kept = allocated.len(),
                ranked = ranked.len(),
                available,
                "documents dropped to fit budget"
            );
            warnings.push(format!(
                "{} of {} documents did not fit in {} available tokens",
                ranked.len() - allocated.len(),
                ranked.len(),
                available
            ));
        }

        let rendered = self.formatter.render_for_model(&allocated, model_id);

        Ok(AssembledContext {
            context: rendered.text,
            documents: rendered.documents,
            budget,
            strategy: request.strategy,
            warnings,
        })
    }

    /// Assemble and prepend the context to the query
    pub fn augment(&self, request: &ContextRequest) -> Result<String> {
        let assembled = self.assemble(request)?;
        let rendered = RenderedContext {
            text: assembled.context,
            documents: assembled.documents,
        };
        Ok(self.formatter.augment_prompt(&request.query, &rendered))
    }

    pub fn counter(&self) -> &Arc<TokenCounter> {
        &self.counter
    }

    pub fn formatter(&self) -> &ContextFormatter {
        &self.formatter
    }

    pub fn defaults(&self) -> &RequestDefaults {
        &self.defaults
    }
}

impl Default for ContextPipeline {
    fn default() -> Self {
        Self::new()
    }
}
