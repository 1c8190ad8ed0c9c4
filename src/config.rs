use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::budget::BudgetConfig;
use crate::context::{ModelInfo, StaticModelRegistry};
use crate::errors::{ContextError, Result};
use crate::rag::allocation::{AllocationStrategy, AllocatorConfig};
use crate::rag::context::FormatConfig;
use crate::rag::reranking::PrioritizerConfig;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub prioritizer: PrioritizerConfig,
    #[serde(default)]
    pub allocator: AllocatorConfig,
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub defaults: RequestDefaults,
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

/// Values applied to requests that leave them unset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDefaults {
    pub strategy: AllocationStrategy,
    pub max_documents: usize,
    pub completion_tokens: usize,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            strategy: AllocationStrategy::Prioritized,
            max_documents: 10,
            completion_tokens: 0,
        }
    }
}

/// One `[[models]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub path: String,
    #[serde(alias = "type")]
    pub model_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<usize>,
}

impl Config {
    /// Load configuration from the default path, or defaults if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ContextError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| ContextError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ContextError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ContextError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".contextpack").join("config.toml"))
    }

    /// Model registry built from the `[[models]]` entries
    pub fn registry(&self) -> StaticModelRegistry {
        let mut registry = StaticModelRegistry::new();
        for entry in &self.models {
            let mut info = ModelInfo::new(entry.path.clone(), entry.model_type.clone());
            info.context_window = entry.context_window;
            registry.insert(entry.id.clone(), info);
        }
        registry
    }
}
