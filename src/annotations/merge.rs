//! Merging the local cache, the remote snapshot and in-memory edits
//!
//! Collections merge by id: the three sources are folded in the fixed order
//! `[local cache, remote snapshot, in-memory edits]` and a later source
//! replaces an earlier one's record wholesale. Single records (the personal
//! record, the reading position) merge by timestamp, whole-record.
//!
//! Nothing here mutates its inputs.

use std::collections::HashMap;

use super::types::{
    Annotation, DocumentRecords, Identified, Note, PersonalRecord, ReadingPosition, Timestamped,
};

/// Id-keyed collection produced by [`combine`]. Keeps first-seen order.
#[derive(Debug, Clone, PartialEq)]
pub struct IdSet<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

/// Merged highlights
pub type AnnotationSet = IdSet<Annotation>;

impl<T: Identified> IdSet<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Insert, replacing any record with the same id in place
    fn upsert(&mut self, item: T) {
        match self.index.get(item.id()) {
            Some(&position) => self.items[position] = item,
            None => {
                self.index.insert(item.id().to_string(), self.items.len());
                self.items.push(item);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&position| &self.items[position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Identified> Default for IdSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IntoIterator for IdSet<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a IdSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Fold the three sources into one id-keyed set.
///
/// For an id present in several sources the record from the latest source
/// (local cache, then remote snapshot, then in-memory edits) wins entirely.
/// Missing sources count as empty.
pub fn combine<T: Identified + Clone>(
    local_cache: Option<&[T]>,
    remote_snapshot: Option<&[T]>,
    in_memory_edits: Option<&[T]>,
) -> IdSet<T> {
    [local_cache, remote_snapshot, in_memory_edits]
        .into_iter()
        .flatten()
        .flatten()
        .fold(IdSet::new(), |mut set, item| {
            set.upsert(item.clone());
            set
        })
}

/// Which side won a record-level merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictWinner {
    Local,
    Remote,
}

/// Outcome of a record-level merge
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub winner: ConflictWinner,
    pub value: T,
}

/// Whole-record last-writer-wins.
///
/// The local record wins only when strictly newer, which keeps an offline
/// edit from being clobbered by a stale read; ties go to the remote record.
pub fn resolve_latest<T: Timestamped + Clone>(
    local: Option<&T>,
    remote: Option<&T>,
) -> Option<Resolved<T>> {
    match (local, remote) {
        (Some(local), Some(remote)) if local.updated_at() > remote.updated_at() => Some(Resolved {
            winner: ConflictWinner::Local,
            value: local.clone(),
        }),
        (_, Some(remote)) => Some(Resolved {
            winner: ConflictWinner::Remote,
            value: remote.clone(),
        }),
        (Some(local), None) => Some(Resolved {
            winner: ConflictWinner::Local,
            value: local.clone(),
        }),
        (None, None) => None,
    }
}

pub fn merge_personal_record(
    local: Option<&PersonalRecord>,
    remote: Option<&PersonalRecord>,
) -> Option<Resolved<PersonalRecord>> {
    resolve_latest(local, remote)
}

pub fn merge_reading_position(
    local: Option<&ReadingPosition>,
    remote: Option<&ReadingPosition>,
) -> Option<Resolved<ReadingPosition>> {
    resolve_latest(local, remote)
}

/// Edits made in this session and not yet confirmed by the remote store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryEdits {
    pub highlights: Vec<Annotation>,
    pub notes: Vec<Note>,
}

impl InMemoryEdits {
    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty() && self.notes.is_empty()
    }
}

/// The merged view handed to the viewer
#[derive(Debug, Clone, PartialEq)]
pub struct MergedView {
    pub document_id: String,
    pub highlights: AnnotationSet,
    pub notes: IdSet<Note>,
    pub personal: Option<PersonalRecord>,
    pub position: Option<ReadingPosition>,
}

impl MergedView {
    /// Flatten back into the persisted shape
    pub fn into_records(self) -> DocumentRecords {
        DocumentRecords {
            document_id: self.document_id,
            highlights: self.highlights.into_vec(),
            notes: self.notes.into_vec(),
            personal: self.personal,
            position: self.position,
        }
    }
}

/// Merge every part of a document's records from the three sources
pub fn merge_records(
    document_id: &str,
    local: Option<&DocumentRecords>,
    remote: Option<&DocumentRecords>,
    edits: &InMemoryEdits,
) -> MergedView {
    let highlights = combine(
        local.map(|r| r.highlights.as_slice()),
        remote.map(|r| r.highlights.as_slice()),
        Some(edits.highlights.as_slice()),
    );
    let notes = combine(
        local.map(|r| r.notes.as_slice()),
        remote.map(|r| r.notes.as_slice()),
        Some(edits.notes.as_slice()),
    );

    let personal = merge_personal_record(
        local.and_then(|r| r.personal.as_ref()),
        remote.and_then(|r| r.personal.as_ref()),
    )
    .map(|resolved| resolved.value);

    let position = merge_reading_position(
        local.and_then(|r| r.position.as_ref()),
        remote.and_then(|r| r.position.as_ref()),
    )
    .map(|resolved| resolved.value);

    MergedView {
        document_id: document_id.to_string(),
        highlights,
        notes,
        personal,
        position,
    }
}
