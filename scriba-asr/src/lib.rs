//! scriba-asr: batch speech recognition for recorded consultations
//!
//! Wraps the whisper.cpp session lifecycle around a single normalized
//! buffer: one finalized utterance in, one transcript out. The model is
//! loaded when a [`Recognizer`] is constructed and released when it is
//! dropped, so callers can bound peak memory by scoping the instance to a
//! single consultation.

pub mod recognizer;

pub use recognizer::{
    prepare_for_recognition, AsrError, AsrResult, Recognizer, Transcript, TranscriptSegment,
};
pub use scriba_audio::RECOGNIZER_SAMPLE_RATE;
