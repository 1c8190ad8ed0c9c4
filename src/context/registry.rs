//! Model registry collaborator
//!
//! The registry maps a model id to where the model lives and what family
//! it belongs to. Lookups that miss simply return `None`; callers fall
//! back to path heuristics and the approximate token counter.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Registry record for a single model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Filesystem path, tokenizer file, or hub repository id
    pub path: String,

    /// Declared family (e.g. "huggingface", "hf-hub", "gguf")
    #[serde(alias = "type")]
    pub model_type: String,

    /// Exact context window when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<usize>,
}

impl ModelInfo {
    pub fn new(path: impl Into<String>, model_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            model_type: model_type.into(),
            context_window: None,
        }
    }

    pub fn with_context_window(mut self, tokens: usize) -> Self {
        self.context_window = Some(tokens);
        self
    }
}

/// Source of model metadata
pub trait ModelRegistry: Send + Sync {
    fn get_model_info(&self, model_id: &str) -> Option<ModelInfo>;
}

/// In-memory registry, usually built from the `[[models]]` config table
#[derive(Debug, Clone, Default)]
pub struct StaticModelRegistry {
    models: HashMap<String, ModelInfo>,
}

impl StaticModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model_id: impl Into<String>, info: ModelInfo) -> Self {
        self.insert(model_id, info);
        self
    }

    pub fn insert(&mut self, model_id: impl Into<String>, info: ModelInfo) {
        self.models.insert(model_id.into(), info);
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl ModelRegistry for StaticModelRegistry {
    fn get_model_info(&self, model_id: &str) -> Option<ModelInfo> {
        self.models.get(model_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_registry_lookup() {
        let registry = StaticModelRegistry::new().with_model(
            "llama",
            ModelInfo::new("/models/llama", "huggingface").with_context_window(4096),
        );

        let info = registry.get_model_info("llama").unwrap();
        assert_eq!(info.context_window, Some(4096));
        assert!(registry.get_model_info("missing").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_model_info_accepts_type_alias() {
        let info: ModelInfo =
            serde_json::from_str(r#"{"path":"/m/x.gguf","type":"gguf"}"#).unwrap();
        assert_eq!(info.model_type, "gguf");
        assert!(info.context_window.is_none());
    }
}
