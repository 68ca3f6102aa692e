//! Sync data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::annotations::DocumentRecords;

/// A whole-object snapshot pushed by the remote store (never a diff)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSnapshot {
    pub records: DocumentRecords,
    pub received_at: DateTime<Utc>,
}

impl RemoteSnapshot {
    pub fn new(records: DocumentRecords) -> Self {
        Self {
            records,
            received_at: Utc::now(),
        }
    }
}

/// Sync status for a document session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// When the latest remote snapshot arrived
    pub last_snapshot: Option<DateTime<Utc>>,
    /// In-memory edits not yet reflected by the remote store
    pub pending_edits: usize,
    /// Whether a remote subscription is attached
    pub subscribed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let status = SyncStatus {
            last_snapshot: None,
            pending_edits: 2,
            subscribed: true,
        };

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("pendingEdits"));
        assert!(json.contains("lastSnapshot"));
    }
}
