//! Consultation pipeline - coordinates decode, recognition, note
//! formatting, and persistence for one finished recording
//!
//! Everything runs sequentially on one blocking worker; only one
//! consultation is processed at a time and an in-flight step runs to
//! completion or fails. Each engine is constructed for the consultation
//! and dropped as soon as its step is done, so at most one large model is
//! resident at any moment.

use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use chrono::Local;
use scriba_asr::Recognizer;
use scriba_core::Config;
use scriba_llm::{FormatterConfig, NoteFormatter};
use scriba_notes::{archive_consultation, NewNote, NoteStore};

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Transcribing,
    Formatting,
    Saving,
    Done,
    Error,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Transcribing => "transcribing",
            PipelineState::Formatting => "formatting",
            PipelineState::Saving => "saving",
            PipelineState::Done => "done",
            PipelineState::Error => "error",
        }
    }
}

/// Events emitted by the pipeline
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    StateChanged(PipelineState),
    Transcript { text: String, is_partial: bool },
    Error(String),
}

/// Configuration for the pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub asr_model_path: PathBuf,
    pub llm_model_path: Option<PathBuf>,
    pub formatter: FormatterConfig,
    pub history_dir: PathBuf,
    pub database: PathBuf,
}

impl PipelineConfig {
    /// Build pipeline settings from the application config
    pub fn from_app_config(config: &Config) -> Self {
        Self {
            asr_model_path: config.asr_model_path(),
            llm_model_path: config.llm_model_path(),
            formatter: FormatterConfig {
                max_tokens: config.llm.max_tokens,
                temperature: config.llm.temperature,
                context_size: config.llm.context_size,
                system_prompt: config.llm.system_prompt.clone(),
            },
            history_dir: config.notes.history_dir.clone(),
            database: config.notes.database.clone(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            asr_model_path: PathBuf::new(),
            llm_model_path: None,
            formatter: FormatterConfig::default(),
            history_dir: PathBuf::new(),
            database: PathBuf::new(),
        }
    }
}

/// Result of a completed consultation
#[derive(Debug, Clone)]
pub struct ConsultationOutcome {
    pub note_id: i64,
    pub raw_transcript: String,
    pub cleaned_note: String,
    pub archived_audio: PathBuf,
}

/// The consultation pipeline
pub struct ConsultationPipeline {
    config: PipelineConfig,
    event_tx: mpsc::Sender<PipelineEvent>,
}

impl ConsultationPipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig, event_tx: mpsc::Sender<PipelineEvent>) -> Self {
        Self { config, event_tx }
    }

    fn send_state(&self, state: PipelineState) {
        debug!("Pipeline state: {:?}", state);
        let _ = self.event_tx.try_send(PipelineEvent::StateChanged(state));
    }

    fn send_transcript(&self, text: String, is_partial: bool) {
        let _ = self
            .event_tx
            .try_send(PipelineEvent::Transcript { text, is_partial });
    }

    fn send_error(&self, error: String) {
        error!("Pipeline error: {}", error);
        let _ = self.event_tx.try_send(PipelineEvent::Error(error));
    }

    /// Run the complete consultation pipeline (blocking).
    /// This should be called from spawn_blocking.
    pub fn run_blocking(&self, audio_path: &std::path::Path) -> Result<ConsultationOutcome, String> {
        info!("Starting consultation pipeline for {:?}", audio_path);

        if !audio_path.exists() {
            let err = format!("Recording not found: {:?}", audio_path);
            self.send_error(err.clone());
            self.send_state(PipelineState::Error);
            return Err(err);
        }

        // 1. Transcribe. The recognizer lives only for this step.
        let raw_transcript = match self.transcribe_blocking(audio_path) {
            Ok(t) => t,
            Err(e) => {
                self.send_error(e.clone());
                self.send_state(PipelineState::Error);
                return Err(e);
            }
        };

        // 2. Format into a structured note. A formatter failure degrades to
        // the raw transcript instead of losing the consultation.
        let cleaned_note = match self.format_blocking(&raw_transcript) {
            Ok(Some(note)) => note,
            Ok(None) => raw_transcript.clone(),
            Err(e) => {
                warn!("Note formatting failed, keeping raw transcript: {}", e);
                raw_transcript.clone()
            }
        };

        // 3. Archive and persist.
        match self.persist_blocking(audio_path, &raw_transcript, &cleaned_note) {
            Ok(outcome) => {
                self.send_state(PipelineState::Done);
                Ok(outcome)
            }
            Err(e) => {
                self.send_error(e.clone());
                self.send_state(PipelineState::Error);
                Err(e)
            }
        }
    }

    /// Transcribe the recording (blocking)
    fn transcribe_blocking(&self, audio_path: &std::path::Path) -> Result<String, String> {
        self.send_state(PipelineState::Transcribing);

        if !self.config.asr_model_path.exists() {
            return Err(format!(
                "Recognition model not found: {:?}",
                self.config.asr_model_path
            ));
        }

        let start = Instant::now();

        let recognizer = Recognizer::new(&self.config.asr_model_path)
            .map_err(|e| format!("Failed to load recognition model: {}", e))?;

        let transcript = recognizer
            .recognize_file(audio_path)
            .map_err(|e| format!("Transcription failed: {}", e))?;

        let text = transcript.text();
        info!(
            "Transcription complete in {:.2}s ({} chars)",
            start.elapsed().as_secs_f32(),
            text.len()
        );

        if text.is_empty() || Self::is_non_speech_marker(&text) {
            return Err("No speech recognized in recording".to_string());
        }

        // Partial if a formatting pass is still coming
        self.send_transcript(text.clone(), self.use_formatter());

        Ok(text)
    }

    fn use_formatter(&self) -> bool {
        self.config.llm_model_path.is_some()
    }

    /// Rewrite the transcript into a structured note (blocking).
    /// Returns Ok(None) when formatting is disabled.
    fn format_blocking(&self, raw_transcript: &str) -> Result<Option<String>, String> {
        let Some(ref llm_path) = self.config.llm_model_path else {
            info!("Note formatting disabled");
            return Ok(None);
        };

        self.send_state(PipelineState::Formatting);

        if !llm_path.exists() {
            return Err(format!("LLM model not found: {:?}", llm_path));
        }

        let formatter = NoteFormatter::with_config(llm_path, self.config.formatter.clone())
            .map_err(|e| format!("Failed to load LLM model: {}", e))?;

        let note = formatter
            .format_note(raw_transcript)
            .map_err(|e| format!("Note formatting failed: {}", e))?;

        info!("Note formatted in {}ms", note.latency_ms);
        self.send_transcript(note.text.clone(), false);

        Ok(Some(note.text))
    }

    /// Archive the recording and insert the note row (blocking)
    fn persist_blocking(
        &self,
        audio_path: &std::path::Path,
        raw_transcript: &str,
        cleaned_note: &str,
    ) -> Result<ConsultationOutcome, String> {
        self.send_state(PipelineState::Saving);

        let created_at = Local::now();

        let archived = archive_consultation(
            &self.config.history_dir,
            audio_path,
            raw_transcript,
            cleaned_note,
            created_at,
        )
        .map_err(|e| format!("Failed to archive consultation: {}", e))?;

        let store = NoteStore::open(&self.config.database)
            .map_err(|e| format!("Failed to open note store: {}", e))?;

        let note_id = store
            .insert(&NewNote {
                created_at_ms: created_at.timestamp_millis(),
                audio_path: archived.audio_path.to_string_lossy().into_owned(),
                raw_transcript: raw_transcript.to_string(),
                cleaned_note: cleaned_note.to_string(),
            })
            .map_err(|e| format!("Failed to save note: {}", e))?;

        info!("Saved note {} ({:?})", note_id, archived.audio_path);

        Ok(ConsultationOutcome {
            note_id,
            raw_transcript: raw_transcript.to_string(),
            cleaned_note: cleaned_note.to_string(),
            archived_audio: archived.audio_path,
        })
    }

    /// Check if text is only a recognizer non-speech marker
    fn is_non_speech_marker(text: &str) -> bool {
        let trimmed = text.trim();
        let markers = [
            "[BLANK_AUDIO]",
            "[MUSIC]",
            "[INAUDIBLE]",
            "(music)",
            "(inaudible)",
            "(silence)",
            "[SILENCE]",
        ];
        markers.iter().any(|&m| trimmed.eq_ignore_ascii_case(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_state_as_str() {
        assert_eq!(PipelineState::Idle.as_str(), "idle");
        assert_eq!(PipelineState::Transcribing.as_str(), "transcribing");
        assert_eq!(PipelineState::Formatting.as_str(), "formatting");
        assert_eq!(PipelineState::Saving.as_str(), "saving");
        assert_eq!(PipelineState::Done.as_str(), "done");
        assert_eq!(PipelineState::Error.as_str(), "error");
    }

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert!(config.asr_model_path.as_os_str().is_empty());
        assert!(config.llm_model_path.is_none());
        assert_eq!(config.formatter.max_tokens, 1024);
    }

    #[test]
    fn test_pipeline_config_from_app_config() {
        let mut app = Config::default();
        app.llm.system_prompt = Some("Summarize.".to_string());
        let config = PipelineConfig::from_app_config(&app);
        assert_eq!(config.asr_model_path, app.asr_model_path());
        assert_eq!(config.llm_model_path, app.llm_model_path());
        assert_eq!(config.formatter.system_prompt.as_deref(), Some("Summarize."));
        assert_eq!(config.history_dir, app.notes.history_dir);
    }

    #[test]
    fn test_is_non_speech_marker() {
        assert!(ConsultationPipeline::is_non_speech_marker("[BLANK_AUDIO]"));
        assert!(ConsultationPipeline::is_non_speech_marker("  (silence)  "));
        assert!(ConsultationPipeline::is_non_speech_marker("[blank_audio]"));
        assert!(!ConsultationPipeline::is_non_speech_marker("Hello world"));
        assert!(!ConsultationPipeline::is_non_speech_marker(""));
        assert!(!ConsultationPipeline::is_non_speech_marker(
            "The [MUSIC] was great"
        ));
    }

    #[test]
    fn test_run_missing_recording() {
        let (tx, mut rx) = mpsc::channel(10);
        let pipeline = ConsultationPipeline::new(PipelineConfig::default(), tx);

        let result = pipeline.run_blocking(std::path::Path::new("/nonexistent/rec.m4a"));
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("not found"));

        let mut saw_error_state = false;
        while let Ok(event) = rx.try_recv() {
            if let PipelineEvent::StateChanged(PipelineState::Error) = event {
                saw_error_state = true;
            }
        }
        assert!(saw_error_state);
    }

    #[test]
    fn test_run_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("rec.m4a");
        std::fs::write(&audio, b"bytes").unwrap();

        let (tx, _rx) = mpsc::channel(10);
        let pipeline = ConsultationPipeline::new(
            PipelineConfig {
                asr_model_path: "/nonexistent/model.bin".into(),
                ..Default::default()
            },
            tx,
        );

        let result = pipeline.run_blocking(&audio);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("model not found"));
    }

    #[test]
    fn test_events_sent() {
        let (tx, mut rx) = mpsc::channel(10);
        let pipeline = ConsultationPipeline::new(PipelineConfig::default(), tx);

        pipeline.send_state(PipelineState::Transcribing);

        let event = rx.try_recv().expect("Should receive event");
        match event {
            PipelineEvent::StateChanged(state) => {
                assert_eq!(state, PipelineState::Transcribing);
            }
            _ => panic!("Expected StateChanged event"),
        }
    }
}
