//! scriba-audio: decoding recorded consultations into recognizer-ready PCM
//!
//! This crate turns a finished recording (compressed container) into the
//! single-channel, fixed-rate buffer the recognition engine requires:
//! - Container demux and decode via symphonia
//! - Channel downmix to mono
//! - Linear-interpolation resampling to the recognizer rate

pub mod decode;
pub mod resample;

pub use decode::{decode_to_mono, DecodeError, DecodeResult, DecodedAudio};
pub use resample::{resample_linear, resample_to_recognizer, RECOGNIZER_SAMPLE_RATE};
