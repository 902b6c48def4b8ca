//! Blob publisher binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use blobpub_publisher::{Publisher, PublisherConfig, RunTimestamp};
use blobpub_storage::AzureContainer;

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting blobpub");

    let config = match PublisherConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid publisher configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Publisher config: {:?}", config);

    let timestamp = match std::env::var("PUBLISH_TIMESTAMP") {
        Ok(value) => match RunTimestamp::new(value) {
            Ok(ts) => ts,
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        },
        Err(_) => RunTimestamp::now(),
    };

    let container = match AzureContainer::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create container client: {}", e);
            std::process::exit(1);
        }
    };

    let publisher = Publisher::new(Arc::new(container), config);
    let report = match publisher.run(&timestamp).await {
        Ok(report) => report,
        Err(e) => {
            error!("Publishing failed: {}", e);
            std::process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize report: {}", e),
    }

    info!("Index available at {}", report.index_url);
}
