//! Storage types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Schemes accepted as provider-native references
const NATIVE_SCHEMES: &[&str] = &["gs", "s3"];

/// A provider-native object reference (`scheme://bucket/object`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub scheme: String,
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(scheme: &str, bucket: &str, key: &str) -> Self {
        Self {
            scheme: scheme.to_ascii_lowercase(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    /// Parse `gs://bucket/path/to/object`.
    ///
    /// Returns `None` for other schemes or when bucket or object is empty.
    pub fn parse(raw: &str) -> Option<Self> {
        let (scheme, rest) = raw.trim().split_once("://")?;
        let scheme = scheme.to_ascii_lowercase();
        if !NATIVE_SCHEMES.contains(&scheme.as_str()) {
            return None;
        }

        let (bucket, key) = rest.split_once('/')?;
        let key = key.trim_start_matches('/');
        if bucket.is_empty() || key.is_empty() {
            return None;
        }

        Some(Self::new(&scheme, bucket, key))
    }

    /// Whether `scheme` names a provider-native reference
    pub fn is_native_scheme(scheme: &str) -> bool {
        NATIVE_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str())
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
    }
}
