//! Deduplicated blob transfers
//!
//! At most one transfer runs per resource key. Callers asking for a key that
//! is already in flight are queued on it and receive the same terminal result.
//!
//! A shared transfer walks an explicit state machine:
//!
//! ```text
//! Idle -> InFlight(object store, 1) -> Done           (translatable locators)
//!   \
//!    -> InFlight(http, 1) -> InFlight(http, 2) -> ... -> FallingBack -> Done
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::{StorageConfig, TransferConfig};
use crate::error::{TransferError, TransferResult};
use crate::storage::{ObjectStore, S3ObjectStore};

use super::dispatch::{InlineDispatcher, UiDispatcher};
use super::http::{HttpTransport, ReqwestTransport};
use super::locator::{Locator, ResourceKey};

type Waiter = oneshot::Sender<TransferResult<PathBuf>>;

/// Which transport an attempt runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Http,
    ObjectStore,
}

/// Progress of one shared transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    InFlight { transport: Transport, attempt: u32 },
    FallingBack { original: TransferError },
    Done(TransferResult<u64>),
}

/// Coordinates blob fetches across concurrent callers
#[derive(Clone)]
pub struct TransferCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    http: Arc<dyn HttpTransport>,
    object_store: Arc<dyn ObjectStore>,
    dispatcher: Arc<dyn UiDispatcher>,
    backoff_step: Duration,
    default_max_attempts: u32,
    /// Resource key -> callers waiting on the transfer for that key
    in_flight: Mutex<HashMap<ResourceKey, Vec<Waiter>>>,
}

impl TransferCoordinator {
    pub fn new(
        http: Arc<dyn HttpTransport>,
        object_store: Arc<dyn ObjectStore>,
        dispatcher: Arc<dyn UiDispatcher>,
        config: &TransferConfig,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                http,
                object_store,
                dispatcher,
                backoff_step: config.backoff_step,
                default_max_attempts: config.max_attempts.max(1),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Build a coordinator over the `reqwest` transport and the S3 client
    pub fn from_config(
        transfer: &TransferConfig,
        storage: &StorageConfig,
        dispatcher: Arc<dyn UiDispatcher>,
    ) -> TransferResult<Self> {
        let http = Arc::new(ReqwestTransport::new(transfer)?);
        let object_store = Arc::new(S3ObjectStore::new(storage));
        Ok(Self::new(http, object_store, dispatcher, transfer))
    }

    /// Headless coordinator delivering completions inline
    pub fn headless(transfer: &TransferConfig, storage: &StorageConfig) -> TransferResult<Self> {
        Self::from_config(transfer, storage, Arc::new(InlineDispatcher))
    }

    /// Fetch `locator` into `destination`.
    ///
    /// Succeeds immediately without network access when `destination`
    /// already exists. Otherwise joins the transfer in flight for the same
    /// resource key, or starts one. A caller that joined a transfer for
    /// another destination gets its own copy. `max_attempts` bounds the
    /// attempts on the generic transport; zero is treated as one.
    pub async fn fetch(
        &self,
        locator: &str,
        destination: impl AsRef<Path>,
        max_attempts: u32,
    ) -> TransferResult<PathBuf> {
        let destination = destination.as_ref().to_path_buf();
        let locator = Locator::parse(locator)?;
        let key = locator.key();

        if tokio::fs::try_exists(&destination).await? {
            tracing::debug!(key = %key, path = %destination.display(), "Cache hit, skipping transfer");
            return Ok(destination);
        }

        let (waiter, outcome) = oneshot::channel();
        let is_leader = {
            let mut in_flight = self.inner.in_flight.lock();
            match in_flight.get_mut(&key) {
                Some(waiters) => {
                    waiters.push(waiter);
                    false
                }
                None => {
                    in_flight.insert(key.clone(), vec![waiter]);
                    true
                }
            }
        };

        if is_leader {
            tracing::info!(key = %key, max_attempts, "Starting transfer");
            let inner = self.inner.clone();
            let leader_destination = destination.clone();
            tokio::spawn(async move {
                inner
                    .run_shared(key, locator, leader_destination, max_attempts.max(1))
                    .await;
            });
        } else {
            tracing::debug!(key = %key, "Joined transfer already in flight");
        }

        let shared = outcome.await.unwrap_or_else(|_| Err(abandoned()))?;
        if shared == destination {
            return Ok(shared);
        }
        place_copy(&shared, &destination).await?;
        Ok(destination)
    }

    /// Fetch with the configured attempt budget
    pub async fn fetch_default(
        &self,
        locator: &str,
        destination: impl AsRef<Path>,
    ) -> TransferResult<PathBuf> {
        self.fetch(locator, destination, self.inner.default_max_attempts)
            .await
    }

    /// Fetch in the background and hand the result to `on_complete` on the
    /// UI-affine context. Must be called from within a Tokio runtime.
    pub fn fetch_with_callback<F>(
        &self,
        locator: &str,
        destination: PathBuf,
        max_attempts: u32,
        on_complete: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(TransferResult<PathBuf>) + Send + 'static,
    {
        let coordinator = self.clone();
        let locator = locator.to_string();

        tokio::spawn(async move {
            let result = coordinator.fetch(&locator, &destination, max_attempts).await;
            coordinator
                .inner
                .dispatcher
                .dispatch(Box::new(move || on_complete(result)));
        })
    }

    /// Number of resource keys with a transfer in flight
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    pub fn is_in_flight(&self, key: &ResourceKey) -> bool {
        self.inner.in_flight.lock().contains_key(key)
    }
}

impl CoordinatorInner {
    async fn run_shared(
        &self,
        key: ResourceKey,
        locator: Locator,
        destination: PathBuf,
        max_attempts: u32,
    ) {
        let registration = Registration {
            in_flight: &self.in_flight,
            key,
            completed: false,
        };
        let outcome = self.transfer(&locator, &destination, max_attempts).await;
        registration.complete(&outcome);
    }

    async fn transfer(
        &self,
        locator: &Locator,
        destination: &Path,
        max_attempts: u32,
    ) -> TransferResult<PathBuf> {
        // A transfer for this key may have finished after the caller checked
        if tokio::fs::try_exists(destination).await? {
            tracing::debug!(path = %destination.display(), "Artifact already in place");
            return Ok(destination.to_path_buf());
        }

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let staging = staging_path(destination);
        let mut state = TransferState::Idle;

        let result = loop {
            state = match state {
                TransferState::Done(result) => break result,
                other => self.step(other, locator, &staging, max_attempts).await,
            };
        };

        match result {
            Ok(bytes) => {
                finalize(&staging, destination).await?;
                tracing::debug!(path = %destination.display(), bytes, "Artifact in place");
                Ok(destination.to_path_buf())
            }
            Err(e) => {
                discard(&staging).await;
                Err(e)
            }
        }
    }

    async fn step(
        &self,
        state: TransferState,
        locator: &Locator,
        staging: &Path,
        max_attempts: u32,
    ) -> TransferState {
        match state {
            TransferState::Idle => match locator.object_ref() {
                Some(_) => TransferState::InFlight {
                    transport: Transport::ObjectStore,
                    attempt: 1,
                },
                None => TransferState::InFlight {
                    transport: Transport::Http,
                    attempt: 1,
                },
            },

            TransferState::InFlight {
                transport: Transport::ObjectStore,
                ..
            } => {
                let result = match locator.object_ref() {
                    Some(object) => self
                        .object_store
                        .download(object, staging)
                        .await
                        .map_err(TransferError::from),
                    None => Err(TransferError::MalformedLocator(locator.to_string())),
                };
                TransferState::Done(result)
            }

            TransferState::InFlight {
                transport: Transport::Http,
                attempt,
            } => {
                let Locator::Http { url, .. } = locator else {
                    return TransferState::Done(Err(TransferError::MalformedLocator(
                        locator.to_string(),
                    )));
                };

                tracing::debug!(url = %url, attempt, max_attempts, "HTTP attempt");
                match self.http.download(url, staging).await {
                    Ok(bytes) => TransferState::Done(Ok(bytes)),
                    Err(e) if e.is_structural() => TransferState::Done(Err(e)),
                    Err(e) if e.is_retryable() && attempt < max_attempts => {
                        let delay = self.backoff_step * attempt;
                        tracing::warn!(
                            url = %url,
                            attempt,
                            error = %e,
                            delay_ms = delay.as_millis() as u64,
                            "Transient failure, retrying"
                        );
                        discard(staging).await;
                        tokio::time::sleep(delay).await;
                        TransferState::InFlight {
                            transport: Transport::Http,
                            attempt: attempt + 1,
                        }
                    }
                    Err(e) => TransferState::FallingBack { original: e },
                }
            }

            TransferState::FallingBack { original } => {
                discard(staging).await;

                let Some(object) = locator.fallback_object() else {
                    tracing::debug!(locator = %locator, "No object path to fall back to");
                    return TransferState::Done(Err(original));
                };

                tracing::info!(object = %object, error = %original, "Falling back to object store");
                match self.object_store.download(&object, staging).await {
                    Ok(bytes) => TransferState::Done(Ok(bytes)),
                    Err(fallback) => {
                        tracing::warn!(object = %object, error = %fallback, "Fallback transfer failed");
                        TransferState::Done(Err(original))
                    }
                }
            }

            done @ TransferState::Done(_) => done,
        }
    }
}

/// Registry entry owned by the task running a shared transfer.
///
/// Dropping it without completing (panic, abort) fails every queued caller
/// and frees the key for a new transfer.
struct Registration<'a> {
    in_flight: &'a Mutex<HashMap<ResourceKey, Vec<Waiter>>>,
    key: ResourceKey,
    completed: bool,
}

impl Registration<'_> {
    fn complete(mut self, outcome: &TransferResult<PathBuf>) {
        self.completed = true;
        let waiters = self.in_flight.lock().remove(&self.key).unwrap_or_default();

        match outcome {
            Ok(path) => tracing::info!(
                key = %self.key,
                path = %path.display(),
                waiters = waiters.len(),
                "Transfer complete"
            ),
            Err(e) => tracing::warn!(
                key = %self.key,
                error = %e,
                waiters = waiters.len(),
                "Transfer failed"
            ),
        }

        for waiter in waiters {
            // A waiter that went away simply misses the result
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }

        let waiters = self.in_flight.lock().remove(&self.key).unwrap_or_default();
        tracing::error!(key = %self.key, waiters = waiters.len(), "Transfer task ended without a result");
        for waiter in waiters {
            let _ = waiter.send(Err(abandoned()));
        }
    }
}

fn abandoned() -> TransferError {
    TransferError::ConnectionLost("transfer task ended without a result".to_string())
}

/// Give a caller that joined another destination's transfer its own copy
async fn place_copy(source: &Path, destination: &Path) -> TransferResult<()> {
    if tokio::fs::try_exists(destination).await? {
        return Ok(());
    }
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let staging = staging_path(destination);
    tokio::fs::copy(source, &staging).await?;
    finalize(&staging, destination).await
}

/// Sibling file the transports write into before the artifact is moved in place
fn staging_path(destination: &Path) -> PathBuf {
    let mut raw = destination.as_os_str().to_owned();
    raw.push(".part");
    PathBuf::from(raw)
}

/// Replace whatever sits at `destination` with the staged bytes
async fn finalize(staging: &Path, destination: &Path) -> TransferResult<()> {
    if !tokio::fs::try_exists(staging).await? {
        return Err(TransferError::MissingArtifact(staging.display().to_string()));
    }

    if tokio::fs::try_exists(destination).await? {
        tokio::fs::remove_file(destination).await?;
    }
    tokio::fs::rename(staging, destination).await?;

    if !tokio::fs::try_exists(destination).await? {
        return Err(TransferError::MissingArtifact(
            destination.display().to_string(),
        ));
    }
    Ok(())
}

async fn discard(staging: &Path) {
    if let Err(e) = tokio::fs::remove_file(staging).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %staging.display(), error = %e, "Failed to discard partial file");
        }
    }
}
