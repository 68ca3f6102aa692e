//! Documents backed by a remote blob

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TransferResult;
use crate::transfer::TransferCoordinator;

/// A document the viewer can open once its bytes are on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub id: String,
    /// Remote locator (`gs://`, `s3://` or an HTTP(S) URL)
    pub locator: String,
    pub local_path: PathBuf,
}

impl DocumentRef {
    pub fn new(id: &str, locator: &str, local_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.to_string(),
            locator: locator.to_string(),
            local_path: local_path.into(),
        }
    }

    /// Reference cached at `<cache_dir>/<id>.<ext>`, the extension taken from
    /// the locator's object name
    pub fn in_cache(cache_dir: &Path, id: &str, locator: &str) -> Self {
        let extension = locator_extension(locator).unwrap_or_else(|| "bin".to_string());
        Self::new(id, locator, cache_dir.join(format!("{}.{}", id, extension)))
    }

    pub fn is_cached(&self) -> bool {
        self.local_path.exists()
    }

    /// Make sure the bytes are on disk, fetching them if needed
    pub async fn ensure_local(
        &self,
        coordinator: &TransferCoordinator,
        max_attempts: u32,
    ) -> TransferResult<PathBuf> {
        if let Some(parent) = self.local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        coordinator
            .fetch(&self.locator, &self.local_path, max_attempts)
            .await
    }
}

fn locator_extension(locator: &str) -> Option<String> {
    let path = locator.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    let name = urlencoding::decode(name).ok()?;
    let name = name.rsplit('/').next()?;

    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_lowercase)
}
