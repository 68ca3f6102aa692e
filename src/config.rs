//! Configuration management for Folio

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub transfer: TransferConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Gcs,
    S3,
    Minio,
    R2,
}

impl StorageProvider {
    /// Path-style addressing is required by everything except AWS proper
    pub fn force_path_style(&self) -> bool {
        !matches!(self, StorageProvider::S3)
    }
}

/// Budgets for blob transfers
#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
    /// Timeout for a single request (connect + headers + idle body)
    pub request_timeout: Duration,
    /// Timeout for the whole resource, independent of the retry counter
    pub resource_timeout: Duration,
    /// Concurrent connections allowed to one host
    pub max_connections_per_host: usize,
    /// Linear backoff unit: attempt `n` waits `n * backoff_step`
    pub backoff_step: Duration,
    /// Attempts used when the caller does not pass its own budget
    pub max_attempts: u32,
    /// Restrict the generic transport to HTTP/1.1
    pub prefer_http1: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            resource_timeout: Duration::from_secs(600),
            max_connections_per_host: 2,
            backoff_step: Duration::from_secs(2),
            max_attempts: 3,
            prefer_http1: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub cache_dir: PathBuf,
    pub database_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig {
                provider: StorageProvider::Gcs,
                endpoint: "https://storage.googleapis.com".to_string(),
                access_key: String::new(),
                secret_key: String::new(),
                region: Some("auto".to_string()),
            },
            transfer: TransferConfig::default(),
            cache: CacheConfig {
                cache_dir: PathBuf::from("./cache"),
                database_url: "sqlite:./folio.db".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = TransferConfig::default();

        Ok(Config {
            storage: StorageConfig {
                provider: match env::var("FOLIO_STORAGE_PROVIDER")
                    .unwrap_or_else(|_| "gcs".to_string())
                    .as_str()
                {
                    "s3" => StorageProvider::S3,
                    "minio" => StorageProvider::Minio,
                    "r2" => StorageProvider::R2,
                    _ => StorageProvider::Gcs,
                },
                endpoint: env::var("FOLIO_STORAGE_ENDPOINT")
                    .unwrap_or_else(|_| "https://storage.googleapis.com".to_string()),
                access_key: required("FOLIO_STORAGE_ACCESS_KEY")?,
                secret_key: required("FOLIO_STORAGE_SECRET_KEY")?,
                region: env::var("FOLIO_STORAGE_REGION").ok(),
            },
            transfer: TransferConfig {
                request_timeout: secs_or("FOLIO_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
                resource_timeout: secs_or("FOLIO_RESOURCE_TIMEOUT_SECS", defaults.resource_timeout)?,
                max_connections_per_host: parse_or(
                    "FOLIO_MAX_CONNECTIONS_PER_HOST",
                    defaults.max_connections_per_host,
                )?,
                backoff_step: secs_or("FOLIO_BACKOFF_STEP_SECS", defaults.backoff_step)?,
                max_attempts: parse_or("FOLIO_MAX_ATTEMPTS", defaults.max_attempts)?,
                prefer_http1: parse_or("FOLIO_PREFER_HTTP1", defaults.prefer_http1)?,
            },
            cache: CacheConfig {
                cache_dir: env::var("FOLIO_CACHE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./cache")),
                database_url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:./folio.db".to_string()),
            },
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

fn secs_or(key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    parse_or(key, default.as_secs()).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_transfer_budgets() {
        let config = Config::default();
        assert_eq!(config.transfer.max_connections_per_host, 2);
        assert_eq!(config.transfer.backoff_step, Duration::from_secs(2));
        assert!(config.transfer.request_timeout < config.transfer.resource_timeout);
        assert!(config.transfer.prefer_http1);
    }

    #[test]
    fn test_path_style_by_provider() {
        assert!(StorageProvider::Gcs.force_path_style());
        assert!(StorageProvider::Minio.force_path_style());
        assert!(!StorageProvider::S3.force_path_style());
    }

    #[test]
    fn test_parse_or_falls_back_when_unset() {
        let value: u32 = parse_or("FOLIO_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
