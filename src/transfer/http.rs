//! Generic HTTP(S) transport
//!
//! Used for locators that cannot be translated to a native reference. The
//! structured client gets one more try once this transport gives up.

use std::collections::HashMap;
use std::error::Error as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};
use reqwest::Url;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::config::TransferConfig;
use crate::error::{TransferError, TransferResult};

/// Generic URL transport
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Download `url` into `staging`, returning the number of bytes written
    async fn download(&self, url: &Url, staging: &Path) -> TransferResult<u64>;
}

/// `reqwest`-backed transport.
///
/// The wait for response headers and each chunk read are bounded by the
/// request timeout, the whole resource by the resource timeout. Responses are never served from a cache.
pub struct ReqwestTransport {
    client: reqwest::Client,
    request_timeout: Duration,
    resource_timeout: Duration,
    max_connections_per_host: usize,
    host_permits: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl ReqwestTransport {
    pub fn new(config: &TransferConfig) -> TransferResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.request_timeout)
            .pool_max_idle_per_host(config.max_connections_per_host);

        // HTTP/2 negotiation against some blob hosts fails mid-stream
        if config.prefer_http1 {
            builder = builder.http1_only();
        }

        let client = builder
            .build()
            .map_err(|e| TransferError::ProtocolViolation(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            request_timeout: config.request_timeout,
            resource_timeout: config.resource_timeout,
            max_connections_per_host: config.max_connections_per_host.max(1),
            host_permits: Mutex::new(HashMap::new()),
        })
    }

    fn permits_for(&self, host: &str) -> Arc<Semaphore> {
        let mut permits = self.host_permits.lock();
        permits
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_connections_per_host)))
            .clone()
    }

    async fn download_body(&self, url: &Url, staging: &Path) -> TransferResult<u64> {
        let mut response = timeout(self.request_timeout, self.client.get(url.clone()).send())
            .await
            .map_err(|_| {
                TransferError::Timeout(format!("no response within {:?}", self.request_timeout))
            })?
            .map_err(|e| classify(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::HttpStatus(status.as_u16()));
        }

        let mut file = tokio::fs::File::create(staging).await?;
        let mut written = 0u64;

        loop {
            let chunk = timeout(self.request_timeout, response.chunk())
                .await
                .map_err(|_| {
                    TransferError::Timeout(format!("no data for {:?}", self.request_timeout))
                })?
                .map_err(|e| classify(&e))?;

            match chunk {
                Some(bytes) => {
                    file.write_all(&bytes).await?;
                    written += bytes.len() as u64;
                }
                None => break,
            }
        }

        file.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn download(&self, url: &Url, staging: &Path) -> TransferResult<u64> {
        let host = url.host_str().unwrap_or_default().to_string();
        let permits = self.permits_for(&host);
        let _permit = permits
            .acquire_owned()
            .await
            .map_err(|_| TransferError::ConnectionLost(format!("connection pool for {} closed", host)))?;

        tracing::debug!(url = %url, host = %host, "Starting HTTP transfer");

        timeout(self.resource_timeout, self.download_body(url, staging))
            .await
            .map_err(|_| {
                TransferError::Timeout(format!("resource exceeded {:?}", self.resource_timeout))
            })?
    }
}

/// Coarse failure kind reported by the HTTP client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureSignal {
    Timeout,
    Connect,
    Body,
    Decode,
    Other,
}

fn classify(err: &reqwest::Error) -> TransferError {
    let signal = if err.is_timeout() {
        FailureSignal::Timeout
    } else if err.is_connect() {
        FailureSignal::Connect
    } else if err.is_body() {
        FailureSignal::Body
    } else if err.is_decode() {
        FailureSignal::Decode
    } else {
        FailureSignal::Other
    };

    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        chain.push_str(": ");
        chain.push_str(&inner.to_string());
        source = inner.source();
    }

    classify_signal(signal, &chain)
}

fn classify_signal(signal: FailureSignal, chain: &str) -> TransferError {
    let lower = chain.to_lowercase();
    let detail = chain.to_string();

    match signal {
        FailureSignal::Timeout => TransferError::Timeout(detail),
        FailureSignal::Connect => {
            if lower.contains("dns error") || lower.contains("failed to lookup address") {
                TransferError::DnsFailure(detail)
            } else if lower.contains("network is unreachable") || lower.contains("network is down") {
                TransferError::Offline
            } else {
                TransferError::HostUnreachable(detail)
            }
        }
        FailureSignal::Body => TransferError::ConnectionLost(detail),
        FailureSignal::Decode => TransferError::ProtocolViolation(detail),
        FailureSignal::Other => {
            if lower.contains("connection reset")
                || lower.contains("connection closed")
                || lower.contains("broken pipe")
            {
                TransferError::ConnectionLost(detail)
            } else {
                TransferError::ProtocolViolation(detail)
            }
        }
    }
}
