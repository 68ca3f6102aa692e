//! Remote annotation/record store
//!
//! The remote store is observed through a push subscription delivering
//! whole-object snapshots whenever the per-user, per-document object changes.

use std::collections::HashMap;

use futures::channel::mpsc::{self, UnboundedSender};
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;

use crate::annotations::DocumentRecords;

use super::types::RemoteSnapshot;

/// Subscription source for remote snapshots
pub trait RemoteRecordStore: Send + Sync {
    /// Stream of snapshots for `document_id`, starting with the current one
    /// when the store has it
    fn subscribe(&self, document_id: &str) -> BoxStream<'static, RemoteSnapshot>;
}

/// In-process remote store that fans published snapshots out to subscribers
#[derive(Default)]
pub struct ChannelRemoteStore {
    inner: Mutex<ChannelInner>,
}

#[derive(Default)]
struct ChannelInner {
    latest: HashMap<String, DocumentRecords>,
    subscribers: HashMap<String, Vec<UnboundedSender<RemoteSnapshot>>>,
}

impl ChannelRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the remote object for `records.document_id` and notify subscribers
    pub fn publish(&self, records: DocumentRecords) -> usize {
        let mut inner = self.inner.lock();
        let document_id = records.document_id.clone();

        let delivered = match inner.subscribers.get_mut(&document_id) {
            Some(subscribers) => {
                subscribers.retain(|tx| {
                    tx.unbounded_send(RemoteSnapshot::new(records.clone()))
                        .is_ok()
                });
                subscribers.len()
            }
            None => 0,
        };

        tracing::debug!(document_id = %document_id, delivered, "Published remote snapshot");
        inner.latest.insert(document_id, records);
        delivered
    }

    pub fn subscriber_count(&self, document_id: &str) -> usize {
        self.inner
            .lock()
            .subscribers
            .get(document_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl RemoteRecordStore for ChannelRemoteStore {
    fn subscribe(&self, document_id: &str) -> BoxStream<'static, RemoteSnapshot> {
        let (tx, rx) = mpsc::unbounded();
        let mut inner = self.inner.lock();

        if let Some(current) = inner.latest.get(document_id) {
            // Receiver is alive, the send cannot fail
            let _ = tx.unbounded_send(RemoteSnapshot::new(current.clone()));
        }

        inner
            .subscribers
            .entry(document_id.to_string())
            .or_default()
            .push(tx);

        rx.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_current_then_updates() {
        let store = ChannelRemoteStore::new();
        store.publish(DocumentRecords::empty("doc-1"));

        let mut stream = store.subscribe("doc-1");
        let first = stream.next().await.unwrap();
        assert_eq!(first.records.document_id, "doc-1");

        let mut updated = DocumentRecords::empty("doc-1");
        updated.notes.push(crate::annotations::Note::new("t", "b"));
        assert_eq!(store.publish(updated), 1);

        let second = stream.next().await.unwrap();
        assert_eq!(second.records.notes.len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_subscribers_are_pruned() {
        let store = ChannelRemoteStore::new();
        let stream = store.subscribe("doc-1");
        assert_eq!(store.subscriber_count("doc-1"), 1);

        drop(stream);
        assert_eq!(store.publish(DocumentRecords::empty("doc-1")), 0);
        assert_eq!(store.subscriber_count("doc-1"), 0);
    }

    #[tokio::test]
    async fn test_snapshots_are_per_document() {
        let store = ChannelRemoteStore::new();
        let _a = store.subscribe("doc-a");

        assert_eq!(store.publish(DocumentRecords::empty("doc-b")), 0);
        assert_eq!(store.subscriber_count("doc-a"), 1);
    }
}
