//! folio-fetch
//!
//! Fetches one document payload through the transfer coordinator.
//!
//! Usage: `folio-fetch <locator> <destination> [max_attempts]`

use anyhow::{bail, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio_core::{Config, TransferCoordinator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio_core=debug,folio_fetch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    let mut args = std::env::args().skip(1);
    let (Some(locator), Some(destination)) = (args.next(), args.next()) else {
        bail!("usage: folio-fetch <locator> <destination> [max_attempts]");
    };
    let max_attempts = match args.next() {
        Some(raw) => raw
            .parse::<u32>()
            .with_context(|| format!("invalid max_attempts: {}", raw))?,
        None => config.transfer.max_attempts,
    };

    tracing::info!("Starting folio-fetch v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Storage endpoint: {}", config.storage.endpoint);

    let coordinator = TransferCoordinator::headless(&config.transfer, &config.storage)
        .context("Failed to build transfer coordinator")?;

    let path = coordinator
        .fetch(&locator, &destination, max_attempts)
        .await
        .with_context(|| format!("Failed to fetch {}", locator))?;

    tracing::info!(path = %path.display(), "Fetched");
    Ok(())
}
