//! Sync module
//!
//! Keeps an open document's annotations reconciled with the remote store.
//! The remote side pushes whole-object snapshots; the session folds them
//! with the local cache and this session's edits.

mod remote;
mod session;
mod types;

pub use remote::{ChannelRemoteStore, RemoteRecordStore};
pub use session::DocumentSession;
pub use types::{RemoteSnapshot, SyncStatus};
