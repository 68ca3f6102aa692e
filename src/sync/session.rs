//! Per-document sync session
//!
//! Holds the latest remote snapshot and this session's in-memory edits, and
//! produces the merged view on demand from those plus the local cache.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::annotations::{
    merge_records, Annotation, DocumentRecords, Identified, InMemoryEdits, LocalStore, MergedView,
    Note, PersonalRecord, ReadingPosition,
};
use crate::error::StoreError;

use super::remote::RemoteRecordStore;
use super::types::{RemoteSnapshot, SyncStatus};

#[derive(Default)]
struct SessionState {
    remote: Option<RemoteSnapshot>,
    edits: InMemoryEdits,
}

impl SessionState {
    /// Take a new snapshot and drop edits the remote object now reflects
    fn apply(&mut self, snapshot: RemoteSnapshot) {
        let records = &snapshot.records;
        self.edits
            .highlights
            .retain(|edit| !records.highlights.iter().any(|remote| edit.confirmed_by(remote)));
        self.edits
            .notes
            .retain(|edit| !records.notes.iter().any(|remote| edit.confirmed_by(remote)));
        self.remote = Some(snapshot);
    }
}

/// Whether a remote record is the round-tripped copy of a staged edit.
///
/// Timestamps only need to agree to the millisecond; remote stores keep no
/// finer precision.
trait ConfirmedBy {
    fn confirmed_by(&self, remote: &Self) -> bool;
}

impl ConfirmedBy for Annotation {
    fn confirmed_by(&self, remote: &Self) -> bool {
        let normalized = |record: &Annotation| Annotation {
            created_at: to_millis(record.created_at),
            ..record.clone()
        };
        self.id == remote.id && normalized(self) == normalized(remote)
    }
}

impl ConfirmedBy for Note {
    fn confirmed_by(&self, remote: &Self) -> bool {
        let normalized = |record: &Note| Note {
            created_at: to_millis(record.created_at),
            modified_at: to_millis(record.modified_at),
            ..record.clone()
        };
        self.id == remote.id && normalized(self) == normalized(remote)
    }
}

fn to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(3)
}

/// Open document's annotation state
pub struct DocumentSession {
    document_id: String,
    local: Arc<dyn LocalStore>,
    state: Arc<Mutex<SessionState>>,
    subscription: Option<JoinHandle<()>>,
}

impl DocumentSession {
    pub fn new(document_id: &str, local: Arc<dyn LocalStore>) -> Self {
        Self {
            document_id: document_id.to_string(),
            local,
            state: Arc::new(Mutex::new(SessionState::default())),
            subscription: None,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Subscribe to remote snapshots; replaces any earlier subscription
    pub fn attach(&mut self, remote: &dyn RemoteRecordStore) {
        self.detach();

        let mut stream = remote.subscribe(&self.document_id);
        let state = Arc::clone(&self.state);
        let document_id = self.document_id.clone();

        self.subscription = Some(tokio::spawn(async move {
            while let Some(snapshot) = stream.next().await {
                tracing::debug!(
                    document_id = %document_id,
                    highlights = snapshot.records.highlights.len(),
                    "Remote snapshot received"
                );
                state.lock().apply(snapshot);
            }
            tracing::info!(document_id = %document_id, "Remote subscription closed");
        }));
    }

    /// Stop listening to the remote store
    pub fn detach(&mut self) {
        if let Some(handle) = self.subscription.take() {
            handle.abort();
        }
    }

    /// Feed a snapshot directly, for callers driving the remote side themselves
    pub fn apply_snapshot(&self, snapshot: RemoteSnapshot) {
        self.state.lock().apply(snapshot);
    }

    /// Record a highlight edit; a later edit to the same id replaces it
    pub fn stage_highlight(&self, annotation: Annotation) {
        let mut state = self.state.lock();
        replace_or_push(&mut state.edits.highlights, annotation);
    }

    pub fn stage_note(&self, note: Note) {
        let mut state = self.state.lock();
        replace_or_push(&mut state.edits.notes, note);
    }

    /// Forget an uncommitted edit. Returns whether one was staged.
    pub fn discard_edit(&self, id: &str) -> bool {
        let mut state = self.state.lock();
        let before = state.edits.highlights.len() + state.edits.notes.len();
        state.edits.highlights.retain(|a| a.id != id);
        state.edits.notes.retain(|n| n.id != id);
        before != state.edits.highlights.len() + state.edits.notes.len()
    }

    pub fn status(&self) -> SyncStatus {
        let state = self.state.lock();
        SyncStatus {
            last_snapshot: state.remote.as_ref().map(|s| s.received_at),
            pending_edits: state.edits.highlights.len() + state.edits.notes.len(),
            subscribed: self
                .subscription
                .as_ref()
                .is_some_and(|handle| !handle.is_finished()),
        }
    }

    /// Merge the local cache, the latest snapshot and pending edits
    pub async fn merged(&self) -> Result<MergedView, StoreError> {
        let local = self.local.load(&self.document_id).await?;
        let (remote, edits) = {
            let state = self.state.lock();
            (
                state.remote.as_ref().map(|s| s.records.clone()),
                state.edits.clone(),
            )
        };

        Ok(merge_records(
            &self.document_id,
            local.as_ref(),
            remote.as_ref(),
            &edits,
        ))
    }

    /// Write the merged view back to the local cache as a whole collection
    pub async fn persist(&self) -> Result<MergedView, StoreError> {
        let view = self.merged().await?;
        self.local.save(&view.clone().into_records()).await?;

        tracing::info!(
            document_id = %self.document_id,
            highlights = view.highlights.len(),
            notes = view.notes.len(),
            "Persisted merged records"
        );
        Ok(view)
    }

    /// Store a personal record edit in the local cache, stamping it now
    pub async fn update_personal(&self, mut record: PersonalRecord) -> Result<(), StoreError> {
        record.touch();
        self.update_cached(|records| records.personal = Some(record))
            .await
    }

    pub async fn save_position(&self, position: ReadingPosition) -> Result<(), StoreError> {
        self.update_cached(|records| records.position = Some(position))
            .await
    }

    async fn update_cached<F>(&self, update: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut DocumentRecords),
    {
        let mut records = self
            .local
            .load(&self.document_id)
            .await?
            .unwrap_or_else(|| DocumentRecords::empty(&self.document_id));
        update(&mut records);
        self.local.save(&records).await
    }
}

impl Drop for DocumentSession {
    fn drop(&mut self) {
        self.detach();
    }
}

fn replace_or_push<T: Identified>(items: &mut Vec<T>, item: T) {
    match items.iter().position(|existing| existing.id() == item.id()) {
        Some(index) => items[index] = item,
        None => items.push(item),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;
    use crate::annotations::{HighlightColor, LogicalAnchor, MemoryLocalStore};
    use crate::sync::ChannelRemoteStore;

    fn highlight(id: &str, color: HighlightColor) -> Annotation {
        let mut annotation =
            Annotation::new_highlight("doc-1", "alpha", LogicalAnchor::new(0, 5)).with_color(color);
        annotation.id = id.to_string();
        annotation
    }

    async fn wait_for_snapshot(session: &DocumentSession) {
        for _ in 0..100 {
            if session.status().last_snapshot.is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no snapshot arrived");
    }

    #[tokio::test]
    async fn test_remote_overrides_cache() {
        let local = Arc::new(MemoryLocalStore::new());
        let mut cached = DocumentRecords::empty("doc-1");
        cached.highlights.push(highlight("id1", HighlightColor::Yellow));
        local.save(&cached).await.unwrap();

        let remote = ChannelRemoteStore::new();
        let mut published = DocumentRecords::empty("doc-1");
        published.highlights.push(highlight("id1", HighlightColor::Blue));
        remote.publish(published);

        let mut session = DocumentSession::new("doc-1", local);
        session.attach(&remote);
        wait_for_snapshot(&session).await;

        let view = session.merged().await.unwrap();
        assert_eq!(view.highlights.len(), 1);
        assert_eq!(view.highlights.get("id1").unwrap().color, HighlightColor::Blue);
    }

    #[tokio::test]
    async fn test_staged_edit_wins_until_confirmed() {
        let local: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        let session = DocumentSession::new("doc-1", local);

        let mut snapshot = DocumentRecords::empty("doc-1");
        snapshot.highlights.push(highlight("id1", HighlightColor::Blue));
        session.apply_snapshot(RemoteSnapshot::new(snapshot));

        let staged = highlight("id1", HighlightColor::Pink);
        session.stage_highlight(staged.clone());
        assert_eq!(session.status().pending_edits, 1);

        let view = session.merged().await.unwrap();
        assert_eq!(view.highlights.get("id1").unwrap().color, HighlightColor::Pink);

        let mut stale = DocumentRecords::empty("doc-1");
        stale.highlights.push(highlight("id1", HighlightColor::Blue));
        session.apply_snapshot(RemoteSnapshot::new(stale));
        assert_eq!(session.status().pending_edits, 1);

        let mut confirmed = DocumentRecords::empty("doc-1");
        confirmed.highlights.push(staged);
        session.apply_snapshot(RemoteSnapshot::new(confirmed));
        assert_eq!(session.status().pending_edits, 0);
    }

    #[tokio::test]
    async fn test_confirmation_tolerates_coarser_timestamps() {
        let local: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        let session = DocumentSession::new("doc-1", local);
        let precise = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();

        let mut staged_highlight = highlight("id1", HighlightColor::Green);
        staged_highlight.created_at = precise;
        let mut staged_note = Note::new("title", "body");
        staged_note.created_at = precise;
        staged_note.modified_at = precise;
        session.stage_highlight(staged_highlight.clone());
        session.stage_note(staged_note.clone());

        let mut round_tripped = DocumentRecords::empty("doc-1");
        let mut remote_highlight = staged_highlight;
        remote_highlight.created_at = precise.trunc_subsecs(3);
        round_tripped.highlights.push(remote_highlight.clone());
        let mut remote_note = staged_note;
        remote_note.created_at = precise.trunc_subsecs(3);
        remote_note.modified_at = precise.trunc_subsecs(3);
        round_tripped.notes.push(remote_note);
        session.apply_snapshot(RemoteSnapshot::new(round_tripped));
        assert_eq!(session.status().pending_edits, 0);

        // A later remote change to the same record is no longer masked
        let mut recolored = DocumentRecords::empty("doc-1");
        recolored.highlights.push(remote_highlight.with_color(HighlightColor::Purple));
        session.apply_snapshot(RemoteSnapshot::new(recolored));
        let view = session.merged().await.unwrap();
        assert_eq!(view.highlights.get("id1").unwrap().color, HighlightColor::Purple);
    }

    #[tokio::test]
    async fn test_restaging_replaces_edit() {
        let local: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        let session = DocumentSession::new("doc-1", local);

        session.stage_highlight(highlight("id1", HighlightColor::Green));
        session.stage_highlight(highlight("id1", HighlightColor::Purple));
        session.stage_note(Note::new("title", "body"));

        assert_eq!(session.status().pending_edits, 2);
        let view = session.merged().await.unwrap();
        assert_eq!(view.highlights.get("id1").unwrap().color, HighlightColor::Purple);

        assert!(session.discard_edit("id1"));
        assert!(!session.discard_edit("id1"));
        assert_eq!(session.status().pending_edits, 1);
    }

    #[tokio::test]
    async fn test_persist_writes_whole_collection() {
        let local = Arc::new(MemoryLocalStore::new());
        let session = DocumentSession::new("doc-1", local.clone());

        session.stage_highlight(highlight("id1", HighlightColor::Yellow));
        session.stage_note(Note::new("n", "b"));
        session.persist().await.unwrap();

        let stored = local.load("doc-1").await.unwrap().unwrap();
        assert_eq!(stored.highlights.len(), 1);
        assert_eq!(stored.notes.len(), 1);
    }

    #[tokio::test]
    async fn test_newer_local_personal_record_survives_stale_remote() {
        let local = Arc::new(MemoryLocalStore::new());
        let session = DocumentSession::new("doc-1", local.clone());

        let mut stale = PersonalRecord::new("doc-1");
        stale.summary = "stale".to_string();
        stale.updated_at = stale.updated_at - chrono::Duration::minutes(5);
        let mut snapshot = DocumentRecords::empty("doc-1");
        snapshot.personal = Some(stale);
        session.apply_snapshot(RemoteSnapshot::new(snapshot));

        let mut edit = PersonalRecord::new("doc-1");
        edit.summary = "written offline".to_string();
        session.update_personal(edit).await.unwrap();

        let view = session.merged().await.unwrap();
        assert_eq!(view.personal.unwrap().summary, "written offline");
    }

    #[tokio::test]
    async fn test_save_position_and_detach() {
        let local = Arc::new(MemoryLocalStore::new());
        let remote = ChannelRemoteStore::new();
        let mut session = DocumentSession::new("doc-1", local.clone());

        session.attach(&remote);
        assert!(session.status().subscribed);

        session
            .save_position(ReadingPosition::new("doc-1", 0.5, Some(12)))
            .await
            .unwrap();
        let stored = local.load("doc-1").await.unwrap().unwrap();
        assert_eq!(stored.position.unwrap().page_index, Some(12));

        session.detach();
        assert!(!session.status().subscribed);
    }
}
