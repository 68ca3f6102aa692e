//! Folio Core
//!
//! Document payload transfers and annotation reconciliation for a reader app.
//!
//! # Modules
//!
//! - `transfer`: Deduplicated, retrying blob fetches with object-store fallback
//! - `annotations`: Annotation model, merge and local cache
//! - `sync`: Remote snapshot subscription and per-document sessions
//! - `reanchor`: Relocating highlights after the page re-renders
//! - `storage`: S3-compatible object store client

pub mod annotations;
pub mod config;
pub mod document;
pub mod error;
pub mod reanchor;
pub mod state;
pub mod storage;
pub mod sync;
pub mod transfer;

pub use config::Config;
pub use document::DocumentRef;
pub use error::{ConfigError, StorageError, StoreError, TransferError, TransferResult};
pub use state::{FolioState, StateError};
pub use transfer::TransferCoordinator;
