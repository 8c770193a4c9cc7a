//! Model management types and registry

use crate::config::Config;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Information about an available model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Unique identifier for the model
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Model type (asr, llm)
    pub model_type: ModelType,
    /// URL to download from
    pub url: String,
    /// Expected file size in bytes
    pub size_bytes: u64,
    /// SHA256 hash for verification
    pub sha256: Option<String>,
    /// Filename to save as
    pub filename: String,
}

/// Type of model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Asr,
    Llm,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::Asr => write!(f, "asr"),
            ModelType::Llm => write!(f, "llm"),
        }
    }
}

/// Status of a local model
#[derive(Debug, Clone)]
pub enum ModelStatus {
    /// Model is not downloaded
    NotDownloaded,
    /// Model is currently downloading
    Downloading { progress: f32 },
    /// Model is downloaded and ready
    Ready { path: PathBuf },
    /// Model download or verification failed
    Failed { error: String },
}

/// Built-in model registry with known models
pub fn get_model_registry() -> Vec<ModelInfo> {
    vec![
        // Whisper models (GGML format from HuggingFace)
        ModelInfo {
            id: "whisper-tiny.en".to_string(),
            name: "Whisper Tiny (English)".to_string(),
            model_type: ModelType::Asr,
            url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-tiny.en.bin".to_string(),
            size_bytes: 77_704_715, // ~74MB
            sha256: None,
            filename: "ggml-tiny.en.bin".to_string(),
        },
        ModelInfo {
            id: "whisper-base.en".to_string(),
            name: "Whisper Base (English)".to_string(),
            model_type: ModelType::Asr,
            url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.en.bin".to_string(),
            size_bytes: 147_951_465, // ~141MB
            sha256: None,
            filename: "ggml-base.en.bin".to_string(),
        },
        ModelInfo {
            id: "whisper-small.en".to_string(),
            name: "Whisper Small (English)".to_string(),
            model_type: ModelType::Asr,
            url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-small.en.bin".to_string(),
            size_bytes: 487_601_929, // ~465MB
            sha256: None,
            filename: "ggml-small.en.bin".to_string(),
        },
        // LLM models (GGUF format)
        ModelInfo {
            id: "tinyllama-1.1b".to_string(),
            name: "TinyLlama 1.1B Chat (note formatting)".to_string(),
            model_type: ModelType::Llm,
            url: "https://huggingface.co/TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF/resolve/main/tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf".to_string(),
            size_bytes: 668_788_096, // ~638MB
            sha256: None,
            filename: "tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf".to_string(),
        },
    ]
}

/// Get default models for a fresh installation
pub fn get_default_models() -> Vec<&'static str> {
    vec!["whisper-base.en", "tinyllama-1.1b"]
}

/// Report which configured model files are missing from disk.
///
/// Returns the missing paths so the caller can fail before a consultation
/// starts rather than partway through.
pub fn missing_models(config: &Config) -> Vec<PathBuf> {
    let mut missing = Vec::new();

    let asr = config.asr_model_path();
    if !asr.exists() {
        missing.push(asr);
    }

    if let Some(llm) = config.llm_model_path() {
        if !llm.exists() {
            missing.push(llm);
        }
    }

    missing
}
