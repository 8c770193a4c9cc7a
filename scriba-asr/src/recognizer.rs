//! One-shot consultation transcription

use scriba_audio::{decode_to_mono, resample_to_recognizer, DecodeError, DecodedAudio,
    RECOGNIZER_SAMPLE_RATE};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Recognition errors
#[derive(Error, Debug)]
pub enum AsrError {
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Audio load failed: {0}")]
    AudioLoad(#[from] DecodeError),

    #[error("Recognition failed: {0}")]
    Recognition(String),
}

/// Result type for recognition operations
pub type AsrResult<T> = Result<T, AsrError>;

/// A segment of transcribed text with timing
#[derive(Debug, Clone)]
pub struct TranscriptSegment {
    /// Start time in milliseconds
    pub start_ms: i64,
    /// End time in milliseconds
    pub end_ms: i64,
    /// Transcribed text
    pub text: String,
}

impl std::fmt::Display for TranscriptSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let start_sec = self.start_ms as f64 / 1000.0;
        let end_sec = self.end_ms as f64 / 1000.0;
        write!(f, "[{:.2}s -> {:.2}s] {}", start_sec, end_sec, self.text)
    }
}

/// Complete transcription result
#[derive(Debug, Clone)]
pub struct Transcript {
    /// Individual segments
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    /// Get the full text without timestamps
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.trim())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for segment in &self.segments {
            writeln!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// Normalize a decoded buffer to the recognizer's fixed rate.
///
/// The engine only ever sees mono audio at [`RECOGNIZER_SAMPLE_RATE`]; any
/// other combination reaching it is a bug in the caller, not a runtime
/// condition. Matching rates pass through untouched.
pub fn prepare_for_recognition(audio: DecodedAudio) -> Vec<f32> {
    if audio.sample_rate == RECOGNIZER_SAMPLE_RATE {
        return audio.samples;
    }
    info!(
        "Resampling from {} Hz to {} Hz",
        audio.sample_rate, RECOGNIZER_SAMPLE_RATE
    );
    resample_to_recognizer(&audio.samples, audio.sample_rate)
}

/// Consultation recognizer backed by whisper.cpp.
///
/// Holding a `Recognizer` keeps the model resident; drop it after a
/// consultation to release the memory.
pub struct Recognizer {
    ctx: WhisperContext,
}

impl Recognizer {
    /// Load the recognition model from the given path
    pub fn new(model_path: &Path) -> AsrResult<Self> {
        info!("Loading recognition model from {:?}", model_path);

        let params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(
            model_path
                .to_str()
                .ok_or_else(|| AsrError::ModelLoad("Invalid model path".to_string()))?,
            params,
        )
        .map_err(|e| AsrError::ModelLoad(e.to_string()))?;

        info!("Recognition model loaded");
        Ok(Self { ctx })
    }

    /// Recognize a finalized utterance.
    ///
    /// `samples` must be mono at [`RECOGNIZER_SAMPLE_RATE`]; use
    /// [`prepare_for_recognition`] or [`Recognizer::recognize_file`] to get
    /// there. Each call opens a fresh decoding state, submits the whole
    /// buffer at once, and releases the state on return. No streaming or
    /// partial results.
    pub fn recognize(&self, samples: &[f32]) -> AsrResult<Transcript> {
        debug!(
            "Recognizing {} samples ({:.2}s)",
            samples.len(),
            samples.len() as f32 / RECOGNIZER_SAMPLE_RATE as f32
        );

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some("en"));
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| AsrError::Recognition(e.to_string()))?;

        state
            .full(params, samples)
            .map_err(|e| AsrError::Recognition(e.to_string()))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| AsrError::Recognition(e.to_string()))?;

        debug!("Got {} segments", num_segments);

        let mut segments = Vec::new();
        for i in 0..num_segments {
            let text = state
                .full_get_segment_text(i)
                .map_err(|e| AsrError::Recognition(e.to_string()))?;

            let start = state
                .full_get_segment_t0(i)
                .map_err(|e| AsrError::Recognition(e.to_string()))?;

            let end = state
                .full_get_segment_t1(i)
                .map_err(|e| AsrError::Recognition(e.to_string()))?;

            // Convert from centiseconds to milliseconds
            segments.push(TranscriptSegment {
                start_ms: start as i64 * 10,
                end_ms: end as i64 * 10,
                text,
            });
        }

        Ok(Transcript { segments })
    }

    /// Recognize a recorded consultation file.
    ///
    /// Decodes the container, downmixes, and resamples before submission,
    /// so the rate invariant holds by construction.
    pub fn recognize_file(&self, path: &Path) -> AsrResult<Transcript> {
        info!("Recognizing file: {:?}", path);

        let decoded = decode_to_mono(path)?;
        let samples = prepare_for_recognition(decoded);
        self.recognize(&samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start_ms: i64, end_ms: i64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start_ms,
            end_ms,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_transcript_text_joins_trimmed_segments() {
        let transcript = Transcript {
            segments: vec![
                segment(0, 1200, " My throat hurts."),
                segment(1200, 2500, " It started yesterday. "),
            ],
        };
        assert_eq!(
            transcript.text(),
            "My throat hurts. It started yesterday."
        );
    }

    #[test]
    fn test_transcript_text_empty() {
        let transcript = Transcript { segments: vec![] };
        assert_eq!(transcript.text(), "");
    }

    #[test]
    fn test_segment_display() {
        let s = segment(1500, 2750, "hello");
        assert_eq!(format!("{}", s), "[1.50s -> 2.75s] hello");
    }

    #[test]
    fn test_prepare_passes_through_matching_rate() {
        let audio = DecodedAudio {
            samples: vec![0.1, 0.2, 0.3],
            sample_rate: RECOGNIZER_SAMPLE_RATE,
        };
        let samples = prepare_for_recognition(audio);
        assert_eq!(samples, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_prepare_resamples_mismatched_rate() {
        // One second at 44.1kHz shrinks to one second at the recognizer rate
        let audio = DecodedAudio {
            samples: vec![0.0; 44100],
            sample_rate: 44100,
        };
        let samples = prepare_for_recognition(audio);
        assert_eq!(samples.len(), RECOGNIZER_SAMPLE_RATE as usize);
    }
}
