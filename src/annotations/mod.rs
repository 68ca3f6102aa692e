//! Annotation module
//!
//! Provides the document annotation model and its reconciliation.
//!
//! # Features
//!
//! - Highlights with a best-effort logical anchor and pinned page regions
//! - Free-text notes, the personal record and the reading position
//! - Id-keyed merge of local cache, remote snapshot and in-memory edits
//! - Whole-record last-writer-wins for single records
//! - SQLite persistence of the local cache

mod merge;
mod store;
mod types;

pub use merge::{
    combine, merge_personal_record, merge_reading_position, merge_records, resolve_latest,
    AnnotationSet, ConflictWinner, IdSet, InMemoryEdits, MergedView, Resolved,
};
pub use store::{LocalStore, MemoryLocalStore, SqliteLocalStore};
pub use types::{
    Annotation, DocumentRecords, HighlightColor, Identified, JournalEntry, LogicalAnchor, Note,
    PersonalRecord, PinnedRegion, ReadingPosition, Rect, SpatialRegion, Timestamped,
};
