//! Error types for Folio
//!
//! Transfer failures are split into transient network errors (retried,
//! then escalated to the fallback transport), structural errors (surfaced
//! immediately) and opaque object-store errors.

use thiserror::Error;

/// Result type for blob transfers
pub type TransferResult<T> = std::result::Result<T, TransferError>;

/// Terminal or intermediate outcome of a blob transfer.
///
/// Cloneable so that one shared operation can fan its result out to every
/// caller queued on the same resource key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Host unreachable: {0}")]
    HostUnreachable(String),

    #[error("DNS lookup failed: {0}")]
    DnsFailure(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Device offline")]
    Offline,

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("Malformed locator: {0}")]
    MalformedLocator(String),

    #[error("Transfer reported success but {0} is missing")]
    MissingArtifact(String),

    #[error("Filesystem error: {0}")]
    Filesystem(String),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] StorageError),
}

impl TransferError {
    /// Whether another attempt over the same transport may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransferError::HostUnreachable(_)
                | TransferError::DnsFailure(_)
                | TransferError::ConnectionLost(_)
                | TransferError::Timeout(_)
                | TransferError::ProtocolViolation(_)
                | TransferError::Offline
        )
    }

    /// Errors that are never retried and never escalated to the fallback
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            TransferError::MalformedLocator(_)
                | TransferError::MissingArtifact(_)
                | TransferError::Filesystem(_)
        )
    }
}

impl From<std::io::Error> for TransferError {
    fn from(err: std::io::Error) -> Self {
        TransferError::Filesystem(err.to_string())
    }
}

/// Storage-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Failed to read object body: {0}")]
    BodyRead(String),

    #[error("S3 SDK error: {0}")]
    SdkError(String),
}

/// Local record store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_set() {
        assert!(TransferError::Offline.is_retryable());
        assert!(TransferError::DnsFailure("no such host".into()).is_retryable());
        assert!(TransferError::ProtocolViolation("bad frame".into()).is_retryable());
        assert!(!TransferError::HttpStatus(404).is_retryable());
        assert!(!TransferError::MalformedLocator("ftp://x".into()).is_retryable());
        assert!(!TransferError::ObjectStore(StorageError::ObjectNotFound("k".into())).is_retryable());
    }

    #[test]
    fn test_structural_errors() {
        assert!(TransferError::MissingArtifact("/tmp/a.pdf".into()).is_structural());
        assert!(TransferError::from(std::io::Error::other("disk full")).is_structural());
        assert!(!TransferError::Timeout("30s".into()).is_structural());
    }
}
