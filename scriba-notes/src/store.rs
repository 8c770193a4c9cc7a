//! SQLite-backed consultation note history
//!
//! Notes are append-only apart from post-hoc edits to the cleaned text:
//! there is deliberately no delete operation.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A persisted consultation note
#[derive(Debug, Clone, serde::Serialize)]
pub struct Note {
    pub id: i64,
    pub created_at_ms: i64,
    pub audio_path: String,
    pub raw_transcript: String,
    pub cleaned_note: String,
}

/// Fields for a note that has not been persisted yet
#[derive(Debug, Clone)]
pub struct NewNote {
    pub created_at_ms: i64,
    pub audio_path: String,
    pub raw_transcript: String,
    pub cleaned_note: String,
}

/// Local note history
pub struct NoteStore {
    conn: Connection,
}

impl NoteStore {
    /// Open (or create) the note database at the given path
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        info!("Opened note store at {:?}", path);
        Ok(Self { conn })
    }

    /// Open an in-memory store (used by tests)
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self { conn })
    }

    fn init(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at_ms INTEGER NOT NULL,
                audio_path TEXT NOT NULL,
                raw_transcript TEXT NOT NULL,
                cleaned_note TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_notes_created_at
                ON notes(created_at_ms DESC);",
        )
    }

    /// Insert a finished consultation, returning its id
    pub fn insert(&self, note: &NewNote) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO notes (created_at_ms, audio_path, raw_transcript, cleaned_note)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                note.created_at_ms,
                note.audio_path,
                note.raw_transcript,
                note.cleaned_note
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Fetch a note by id
    pub fn get(&self, id: i64) -> StoreResult<Option<Note>> {
        let note = self
            .conn
            .query_row(
                "SELECT id, created_at_ms, audio_path, raw_transcript, cleaned_note
                 FROM notes WHERE id = ?1",
                params![id],
                Self::row_to_note,
            )
            .optional()?;
        Ok(note)
    }

    /// Replace the cleaned note text for a note (user edit).
    ///
    /// Only the cleaned text is mutable; the raw transcript and audio path
    /// are fixed at insert. Returns false if the id is unknown.
    pub fn update_cleaned_note(&self, id: i64, cleaned_note: &str) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE notes SET cleaned_note = ?2 WHERE id = ?1",
            params![id, cleaned_note],
        )?;
        Ok(changed > 0)
    }

    /// List all notes, newest first
    pub fn list(&self) -> StoreResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, created_at_ms, audio_path, raw_transcript, cleaned_note
             FROM notes ORDER BY created_at_ms DESC, id DESC",
        )?;
        let notes = stmt
            .query_map([], Self::row_to_note)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }

    fn row_to_note(row: &rusqlite::Row<'_>) -> rusqlite::Result<Note> {
        Ok(Note {
            id: row.get(0)?,
            created_at_ms: row.get(1)?,
            audio_path: row.get(2)?,
            raw_transcript: row.get(3)?,
            cleaned_note: row.get(4)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_note(created_at_ms: i64) -> NewNote {
        NewNote {
            created_at_ms,
            audio_path: format!("/data/history/consultation_{}.m4a", created_at_ms),
            raw_transcript: "my throat hurts".to_string(),
            cleaned_note: "**S:** Patient reports sore throat.".to_string(),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let store = NoteStore::open_in_memory().unwrap();
        let id = store.insert(&sample_note(1000)).unwrap();

        let note = store.get(id).unwrap().expect("note exists");
        assert_eq!(note.id, id);
        assert_eq!(note.created_at_ms, 1000);
        assert_eq!(note.raw_transcript, "my throat hurts");
    }

    #[test]
    fn test_get_unknown_id() {
        let store = NoteStore::open_in_memory().unwrap();
        assert!(store.get(42).unwrap().is_none());
    }

    #[test]
    fn test_list_newest_first() {
        let store = NoteStore::open_in_memory().unwrap();
        store.insert(&sample_note(1000)).unwrap();
        store.insert(&sample_note(3000)).unwrap();
        store.insert(&sample_note(2000)).unwrap();

        let notes = store.list().unwrap();
        let timestamps: Vec<i64> = notes.iter().map(|n| n.created_at_ms).collect();
        assert_eq!(timestamps, vec![3000, 2000, 1000]);
    }

    #[test]
    fn test_update_cleaned_note_only() {
        let store = NoteStore::open_in_memory().unwrap();
        let id = store.insert(&sample_note(1000)).unwrap();

        let updated = store.update_cleaned_note(id, "**S:** Edited.").unwrap();
        assert!(updated);

        let note = store.get(id).unwrap().unwrap();
        assert_eq!(note.cleaned_note, "**S:** Edited.");
        // Everything else is untouched
        assert_eq!(note.raw_transcript, "my throat hurts");
        assert_eq!(note.created_at_ms, 1000);
    }

    #[test]
    fn test_update_unknown_id_returns_false() {
        let store = NoteStore::open_in_memory().unwrap();
        assert!(!store.update_cleaned_note(7, "text").unwrap());
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("notes.db");
        let store = NoteStore::open(&db_path).unwrap();
        store.insert(&sample_note(1)).unwrap();
        assert!(db_path.exists());
    }
}
