//! scriba-notes: local persistence for finished consultations
//!
//! Two halves: a SQLite history store (browsable, cleaned text editable,
//! never deleted) and a filesystem archive of the recording plus text
//! exports.

pub mod archive;
pub mod store;

pub use archive::{archive_consultation, ArchivedConsultation};
pub use store::{NewNote, Note, NoteStore, StoreError, StoreResult};
