//! S3-compatible storage client
//!
//! Wraps the AWS SDK for S3-compatible storage access. Google Cloud Storage
//! is reached through its S3 interoperability endpoint.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    Client,
};
use tokio::io::AsyncWriteExt;

use crate::config::StorageConfig;
use crate::error::StorageError;

use super::types::ObjectRef;

/// Structured object-store transport
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download `object` into `staging`, returning the number of bytes written
    async fn download(&self, object: &ObjectRef, staging: &Path) -> Result<u64, StorageError>;
}

/// S3-compatible storage client
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Create a new S3 client from configuration
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "folio",
        );

        let region = config
            .region
            .clone()
            .unwrap_or_else(|| "us-east-1".to_string());

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint)
            .region(Region::new(region))
            .credentials_provider(credentials)
            .force_path_style(config.provider.force_path_style())
            .build();

        tracing::info!(endpoint = %config.endpoint, "Object store client ready");

        Self {
            client: Client::from_conf(s3_config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn download(&self, object: &ObjectRef, staging: &Path) -> Result<u64, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .send()
            .await
            .map_err(|e| classify_sdk_error(object, &e.to_string()))?;

        let mut body = response.body;
        let mut file = tokio::fs::File::create(staging)
            .await
            .map_err(|e| StorageError::BodyRead(format!("Failed to create {}: {}", staging.display(), e)))?;

        let mut written = 0u64;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| StorageError::BodyRead(e.to_string()))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| StorageError::BodyRead(e.to_string()))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| StorageError::BodyRead(e.to_string()))?;

        tracing::debug!(object = %object, bytes = written, "Object downloaded");
        Ok(written)
    }
}

/// Map SDK error text onto the storage taxonomy
fn classify_sdk_error(object: &ObjectRef, message: &str) -> StorageError {
    if message.contains("404") || message.contains("NoSuchKey") {
        StorageError::ObjectNotFound(object.to_string())
    } else if message.contains("NoSuchBucket") {
        StorageError::BucketNotFound(object.bucket.clone())
    } else if message.contains("403") || message.contains("AccessDenied") {
        StorageError::AccessDenied(object.to_string())
    } else {
        StorageError::SdkError(format!("Failed to get object {}: {}", object, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_sdk_error() {
        let object = ObjectRef::new("gs", "library", "a.pdf");

        assert_eq!(
            classify_sdk_error(&object, "service error: NoSuchKey"),
            StorageError::ObjectNotFound("gs://library/a.pdf".to_string())
        );
        assert_eq!(
            classify_sdk_error(&object, "NoSuchBucket: gone"),
            StorageError::BucketNotFound("library".to_string())
        );
        assert!(matches!(
            classify_sdk_error(&object, "status 403"),
            StorageError::AccessDenied(_)
        ));
        assert!(matches!(
            classify_sdk_error(&object, "dispatch failure"),
            StorageError::SdkError(_)
        ));
    }
}
