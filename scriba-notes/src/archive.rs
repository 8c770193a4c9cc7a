//! Filesystem archive of finished consultations
//!
//! Alongside the database row, each consultation keeps a copy of the
//! recording plus plain-text exports of both transcript versions in a
//! history directory, so notes stay readable without the application.

use crate::store::StoreResult;
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Paths written for one archived consultation
#[derive(Debug, Clone)]
pub struct ArchivedConsultation {
    /// Copied recording
    pub audio_path: PathBuf,
    /// Raw transcript export (.txt)
    pub transcript_path: PathBuf,
    /// Cleaned note export (.md)
    pub note_path: PathBuf,
}

/// Copy the recording into the history directory and write the transcript
/// and note exports next to it.
///
/// File names are `consultation_<yyyyMMdd_HHmmss>` with the recording's
/// original extension preserved.
pub fn archive_consultation(
    history_dir: &Path,
    audio_src: &Path,
    raw_transcript: &str,
    cleaned_note: &str,
    created_at: DateTime<Local>,
) -> StoreResult<ArchivedConsultation> {
    fs::create_dir_all(history_dir)?;

    let base_name = format!("consultation_{}", created_at.format("%Y%m%d_%H%M%S"));

    let audio_ext = audio_src
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("m4a");
    let audio_path = history_dir.join(format!("{}.{}", base_name, audio_ext));
    fs::copy(audio_src, &audio_path)?;

    let transcript_path = history_dir.join(format!("{}.txt", base_name));
    fs::write(
        &transcript_path,
        format!("RAW TRANSCRIPT:\n\n{}", raw_transcript),
    )?;

    let note_path = history_dir.join(format!("{}.md", base_name));
    fs::write(&note_path, cleaned_note)?;

    info!("Archived consultation to {:?}", audio_path);

    Ok(ArchivedConsultation {
        audio_path,
        transcript_path,
        note_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use chrono::TimeZone;

    #[test]
    fn test_archive_writes_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let history = dir.path().join("history");

        let audio_src = dir.path().join("recording_1.m4a");
        fs::write(&audio_src, b"fake-aac-bytes").unwrap();

        let created_at = Local.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        let archived = archive_consultation(
            &history,
            &audio_src,
            "my throat hurts",
            "**S:** Patient reports sore throat.",
            created_at,
        )
        .unwrap();

        assert_eq!(
            archived.audio_path.file_name().unwrap(),
            "consultation_20260314_150926.m4a"
        );
        assert_eq!(fs::read(&archived.audio_path).unwrap(), b"fake-aac-bytes");

        let transcript = fs::read_to_string(&archived.transcript_path).unwrap();
        assert_eq!(transcript, "RAW TRANSCRIPT:\n\nmy throat hurts");

        let note = fs::read_to_string(&archived.note_path).unwrap();
        assert_eq!(note, "**S:** Patient reports sore throat.");
    }

    #[test]
    fn test_archive_preserves_extension() {
        let dir = tempfile::tempdir().unwrap();
        let audio_src = dir.path().join("recording.ogg");
        fs::write(&audio_src, b"ogg").unwrap();

        let created_at = Local.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let archived = archive_consultation(
            dir.path(),
            &audio_src,
            "raw",
            "note",
            created_at,
        )
        .unwrap();

        assert!(archived
            .audio_path
            .to_str()
            .unwrap()
            .ends_with("consultation_20260102_030405.ogg"));
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.m4a");

        let created_at = Local.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let err = archive_consultation(dir.path(), &missing, "r", "c", created_at);
        assert!(matches!(err, Err(StoreError::Io(_))));
    }
}
