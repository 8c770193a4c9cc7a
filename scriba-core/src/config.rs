//! Configuration management for scriba

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory where models are stored
    pub model_dir: PathBuf,
    /// ASR model id (see `scriba list-models`), filename, or absolute path
    pub asr: String,
    /// LLM model id, filename, or absolute path, or "none" to disable note formatting
    pub llm: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        let model_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scriba")
            .join("models");

        Self {
            model_dir,
            asr: "whisper-base.en".to_string(),
            llm: "tinyllama-1.1b".to_string(),
        }
    }
}

/// LLM note-formatting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Custom system prompt for note formatting. The raw transcript is appended
    /// after the prompt. If omitted, the built-in clinical SOAP prompt is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Maximum tokens to generate per note
    pub max_tokens: usize,
    /// Sampling temperature (low values keep the note close to the transcript)
    pub temperature: f32,
    /// Context window size in tokens
    pub context_size: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_tokens: 1024,
            temperature: 0.1,
            context_size: 4096,
        }
    }
}

/// Note history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesConfig {
    /// Directory where finished consultations (audio + text) are archived
    pub history_dir: PathBuf,
    /// SQLite database holding the note history
    pub database: PathBuf,
}

impl Default for NotesConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scriba");

        Self {
            history_dir: data_dir.join("history"),
            database: data_dir.join("notes.db"),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model settings
    pub models: ModelsConfig,
    /// LLM settings
    pub llm: LlmConfig,
    /// Note history settings
    pub notes: NotesConfig,
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scriba")
            .join("config.toml")
    }

    /// Load configuration from the default path, or return defaults
    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from a specific path, or return defaults
    pub fn load_from(path: &PathBuf) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file {:?}: {}", path, e);
                    warn!("Using default configuration");
                    Self::default()
                }
            },
            Err(e) => {
                debug!("Config file not found at {:?}: {}", path, e);
                debug!("Using default configuration");
                Self::default()
            }
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::default_path())
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(path, contents).map_err(|e| format!("Failed to write config file: {}", e))?;

        info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Create default config file if it doesn't exist
    pub fn ensure_default_exists() -> Result<(), String> {
        let path = Self::default_path();
        if !path.exists() {
            info!("Creating default config at {:?}", path);
            Self::default().save_to(&path)?;
        }
        Ok(())
    }

    /// Get the path to the ASR model
    pub fn asr_model_path(&self) -> PathBuf {
        self.resolve_model_path(&self.models.asr)
    }

    /// Get the path to the LLM model, or None if note formatting is disabled
    pub fn llm_model_path(&self) -> Option<PathBuf> {
        if !self.llm_enabled() {
            return None;
        }
        Some(self.resolve_model_path(&self.models.llm))
    }

    /// Check if LLM note formatting is enabled
    pub fn llm_enabled(&self) -> bool {
        self.models.llm != "none" && !self.models.llm.is_empty()
    }

    /// Resolve a model id, filename, or absolute path against the registry
    /// and the model directory.
    fn resolve_model_path(&self, model: &str) -> PathBuf {
        let path = PathBuf::from(model);
        if path.is_absolute() {
            return path;
        }

        // Registry ids resolve to their known filename
        let filename = crate::model::get_model_registry()
            .into_iter()
            .find(|m| m.id == model)
            .map(|m| m.filename)
            .unwrap_or_else(|| model.to_string());

        self.models.model_dir.join(filename)
    }

    /// Format config as TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {}", e))
    }
}
