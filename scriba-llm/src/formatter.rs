//! Transcript-to-SOAP-note formatting using llama.cpp

use llama_cpp::standard_sampler::{SamplerStage, StandardSampler};
use llama_cpp::{LlamaModel, LlamaParams, SessionParams};
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur during note formatting
#[derive(Error, Debug)]
pub enum FormatterError {
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Session creation failed: {0}")]
    SessionCreate(String),

    #[error("Generation failed: {0}")]
    Generation(String),
}

/// Result type for formatter operations
pub type FormatterResult<T> = Result<T, FormatterError>;

/// Default instructions for turning a raw consultation transcript into a
/// SOAP note. The transcript is unlabelled, so speaker roles have to be
/// inferred from content.
const SOAP_SYSTEM_PROMPT: &str = r#"You are an expert clinical scribe.
I will provide a raw, unlabelled transcript of a conversation between a Doctor and a Patient.
Your task is to convert this text into a professional SOAP note.

CRITICAL INSTRUCTIONS:
1. **Identify Speakers:** You must infer who is speaking. The Doctor asks questions and gives medical advice. The Patient answers and describes symptoms.
2. **No Hallucinations:** Only include information explicitly stated in the transcript. If a vital sign or diagnosis is not mentioned, do not invent it.
3. **Uncertainty:** If a detail is unclear, label it as 'Unclear' rather than guessing.
4. **Format:** Output ONLY the SOAP note. Do not add introductory text like "Here is the note."

STRUCTURE:
**S (Subjective):** What the patient feels (Symptoms, History of Present Illness). Use quotes if relevant.
**O (Objective):** What the doctor observes (Physical Exam, Vitals, Labs).
**A (Assessment):** Diagnosis or Differential Diagnosis.
**P (Plan):** Treatment, Medications (include dosage if said), and Follow-up instructions."#;

/// Configuration for the note formatter
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Maximum tokens to generate
    pub max_tokens: usize,
    /// Temperature for sampling (low keeps the note close to the transcript)
    pub temperature: f32,
    /// Context size
    pub context_size: u32,
    /// Override for the built-in SOAP system prompt
    pub system_prompt: Option<String>,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.1,
            context_size: 4096,
            system_prompt: None,
        }
    }
}

/// A formatted note with timing information
#[derive(Debug, Clone)]
pub struct FormattedNote {
    /// The structured note text
    pub text: String,
    /// Time taken for generation in milliseconds
    pub latency_ms: u64,
}

/// LLM-based note formatter using llama.cpp.
///
/// Holding a `NoteFormatter` keeps the model resident; drop it after a
/// consultation to release the memory.
pub struct NoteFormatter {
    model: LlamaModel,
    config: FormatterConfig,
}

impl NoteFormatter {
    /// Create a new formatter with the given model path
    pub fn new(model_path: &Path) -> FormatterResult<Self> {
        Self::with_config(model_path, FormatterConfig::default())
    }

    /// Create a new formatter with custom configuration
    pub fn with_config(model_path: &Path, config: FormatterConfig) -> FormatterResult<Self> {
        info!("Loading LLM model from {:?}", model_path);

        let params = LlamaParams::default();

        let model = LlamaModel::load_from_file(model_path, params)
            .map_err(|e| FormatterError::ModelLoad(e.to_string()))?;

        info!("LLM model loaded");
        Ok(Self { model, config })
    }

    /// Build the full generation prompt for a raw transcript
    pub fn build_prompt(&self, transcript: &str) -> String {
        render_prompt(self.config.system_prompt.as_deref(), transcript)
    }

    /// Rewrite a raw transcript into a structured clinical note
    pub fn format_note(&self, transcript: &str) -> FormatterResult<FormattedNote> {
        let start = Instant::now();

        let prompt = self.build_prompt(transcript);
        debug!("Formatting prompt is {} chars", prompt.len());

        let mut session_params = SessionParams::default();
        session_params.n_ctx = self.config.context_size;

        let mut session = self
            .model
            .create_session(session_params)
            .map_err(|e| FormatterError::SessionCreate(e.to_string()))?;

        session
            .advance_context(&prompt)
            .map_err(|e| FormatterError::Generation(e.to_string()))?;

        let sampler = StandardSampler::new_softmax(
            vec![
                SamplerStage::Temperature(self.config.temperature),
                SamplerStage::TopP(0.95),
                SamplerStage::MinP(0.05),
            ],
            1, // min_keep
        );

        let completions = session
            .start_completing_with(sampler, self.config.max_tokens)
            .map_err(|e| FormatterError::Generation(e.to_string()))?;

        // Notes span multiple lines; collect everything up to max_tokens/EOS
        let mut result = String::new();
        for token in completions.into_strings() {
            result.push_str(&token);
        }

        let latency_ms = start.elapsed().as_millis() as u64;
        let text = result.trim().to_string();
        debug!(
            "Note formatting completed in {}ms ({} chars in, {} chars out)",
            latency_ms,
            transcript.len(),
            text.len()
        );

        Ok(FormattedNote { text, latency_ms })
    }

    /// Get the configuration
    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }
}

/// Assemble the generation prompt: system instructions, the transcript, and
/// the completion cue.
pub fn render_prompt(system_prompt: Option<&str>, transcript: &str) -> String {
    let system = system_prompt.unwrap_or(SOAP_SYSTEM_PROMPT);
    format!("{}\n\nTRANSCRIPT:\n{}\n\nNOTE:\n", system, transcript)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FormatterConfig::default();
        assert_eq!(config.max_tokens, 1024);
        assert!((config.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.context_size, 4096);
        assert!(config.system_prompt.is_none());
    }

    #[test]
    fn test_default_prompt_structure() {
        let prompt = render_prompt(None, "my throat hurts");
        assert!(prompt.starts_with("You are an expert clinical scribe."));
        assert!(prompt.contains("SOAP"));
        assert!(prompt.contains("No Hallucinations"));
        assert!(prompt.contains("TRANSCRIPT:\nmy throat hurts"));
        assert!(prompt.ends_with("NOTE:\n"));
    }

    #[test]
    fn test_prompt_override_replaces_system_instructions() {
        let prompt = render_prompt(Some("Summarize the visit."), "hello");
        assert!(prompt.starts_with("Summarize the visit."));
        assert!(!prompt.contains("SOAP"));
        assert!(prompt.contains("TRANSCRIPT:\nhello"));
    }
}
