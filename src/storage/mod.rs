//! Storage module for the structured object-store transport
//!
//! Provider-native references (`gs://`, `s3://`) are served through an
//! S3-compatible client, which negotiates the wire protocol on its own.

mod s3_client;
mod types;

pub use s3_client::{ObjectStore, S3ObjectStore};
pub use types::ObjectRef;
