use crate::llm::ModelTier;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the game engine and chat pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Directory for durable local state (pending-match slot).
    pub data_dir: PathBuf,
    pub retrieval: RetrievalConfig,
    pub models: ModelConfig,
}

/// Excerpt retrieval tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// How many fragments semantic search asks for.
    pub semantic_top_k: usize,
    /// Below this many usable excerpts the keyword fallback kicks in.
    pub min_excerpts: usize,
    /// Hard cap on keyword-fallback results.
    pub keyword_cap: usize,
    /// Assembled context is cut to this many characters.
    pub context_budget_chars: usize,
    /// Fiscal years of structured history included in chat context.
    pub history_years: usize,
}

/// Completion model selection and generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub standard_model: String,
    pub high_model: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl ModelConfig {
    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Standard => &self.standard_model,
            ModelTier::High => &self.high_model,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("capguess"),
            retrieval: RetrievalConfig::default(),
            models: ModelConfig::default(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            semantic_top_k: 20,
            min_excerpts: 5,
            keyword_cap: 10,
            context_budget_chars: 100_000,
            history_years: 10,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            standard_model: "gpt-4o-mini".to_string(),
            high_model: "gpt-4o".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

impl GameConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.retrieval.semantic_top_k == 0 {
            return Err("semantic_top_k must be greater than 0".into());
        }
        if self.retrieval.min_excerpts == 0 {
            return Err("min_excerpts must be greater than 0".into());
        }
        if self.retrieval.keyword_cap == 0 {
            return Err("keyword_cap must be greater than 0".into());
        }
        if self.retrieval.context_budget_chars < 1_000 {
            return Err("context_budget_chars must be at least 1000".into());
        }
        if self.retrieval.history_years == 0 {
            return Err("history_years must be greater than 0".into());
        }
        if self.models.standard_model.is_empty() || self.models.high_model.is_empty() {
            return Err("model names must not be empty".into());
        }
        if self.models.max_tokens == 0 {
            return Err("max_tokens must be greater than 0".into());
        }
        if self.models.temperature < 0.0 || self.models.temperature > 2.0 {
            return Err("temperature must be between 0.0 and 2.0".into());
        }
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}
