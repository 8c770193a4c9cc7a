//! scriba-llm: rewriting raw transcripts into structured clinical notes
//!
//! This crate provides llama.cpp integration for post-processing a
//! consultation transcript into a SOAP-structured note.

pub mod formatter;

pub use formatter::{
    FormattedNote, FormatterConfig, FormatterError, FormatterResult, NoteFormatter,
};
