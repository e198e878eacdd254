//! pkgcenter daemon binary
//!
//! Builds a package client, keeps its cache and update list current, and
//! logs client events until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use pkgcenter_lib::config::Settings;
use pkgcenter_lib::core::PackageClient;
use pkgcenter_lib::core::paths;
use pkgcenter_lib::core::events::ClientEvent;
use pkgcenter_lib::metadata::MetadataPool;
use pkgcenter_lib::package_managers::MockBackend;

/// pkgcenter daemon - background update checks and driver detection
#[derive(Parser, Debug)]
#[command(name = "pkgcenterd")]
#[command(version)]
#[command(about = "Background service for package updates and driver detection")]
struct Args {
    /// Settings file (default: <config dir>/config.toml)
    #[arg(short, long, env = "PKGCENTER_CONFIG")]
    config: Option<PathBuf>,

    /// Metadata pool, overriding `metadata_path` from the settings
    #[arg(short, long)]
    metadata: Option<PathBuf>,

    /// JSON state for the mock backend
    #[arg(short, long)]
    backend_fixture: Option<PathBuf>,

    /// Skip the hardware driver scan
    #[arg(long)]
    no_drivers: bool,

    /// Force a cache refresh at startup
    #[arg(long)]
    refresh: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if args.metadata.is_some() {
        settings.metadata_path.clone_from(&args.metadata);
    }

    init_tracing(&settings.log_level, args.json_logs);
    tracing::info!("Starting pkgcenterd v{}", env!("CARGO_PKG_VERSION"));

    let metadata_path = settings
        .metadata_path
        .clone()
        .or_else(|| Some(paths::data_dir().join("metadata.toml")).filter(|p| p.exists()));
    let metadata = match &metadata_path {
        Some(path) => MetadataPool::load(path)
            .with_context(|| format!("Failed to load metadata from {}", path.display()))?,
        None => {
            tracing::warn!("No metadata configured, the catalog will be empty");
            MetadataPool::default()
        }
    };
    let backend = match &args.backend_fixture {
        Some(path) => MockBackend::load(path)?,
        None => MockBackend::new(),
    };

    let client = PackageClient::builder(Arc::new(backend), Arc::new(metadata))
        .settings(settings)
        .build();
    tracing::info!(
        "Using {} backend, {} cataloged packages",
        client.backend_name(),
        client.catalog().len()
    );

    let mut events = client.subscribe();
    let mut catalog_events = client.subscribe_catalog();

    match client.installed_packages().await {
        Ok(installed) => tracing::info!("{} cataloged packages installed", installed.len()),
        Err(e) => tracing::warn!("Failed to load installed packages: {e}"),
    }
    let outcome = client.update_cache(args.refresh).await;
    tracing::info!("Startup refresh: {outcome:?}");
    if !args.no_drivers {
        for driver in client.detect_drivers().await {
            tracing::info!("Driver available: {} ({})", driver.component().name, driver.component_id());
        }
    }

    let _watchers = match client.start_watchers().await {
        Ok(handles) => {
            tracing::info!("Watching {} paths", handles.watched_paths());
            Some(handles)
        }
        Err(e) => {
            tracing::warn!("File watching unavailable: {e}");
            None
        }
    };

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ClientEvent::UpdatesAvailable { count }) => {
                    tracing::info!("{count} updates available");
                }
                Ok(ClientEvent::TasksFinished) => tracing::debug!("All tasks finished"),
                Ok(ClientEvent::RestartRequired) => tracing::info!("Restart required"),
                Ok(ClientEvent::DriversDetected { count }) => {
                    tracing::debug!("{count} drivers detected");
                }
                Err(RecvError::Lagged(missed)) => tracing::warn!("Missed {missed} client events"),
                Err(RecvError::Closed) => break,
            },
            event = catalog_events.recv() => match event {
                Ok(event) => tracing::debug!("Catalog: {event:?}"),
                Err(RecvError::Lagged(missed)) => tracing::warn!("Missed {missed} catalog events"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received, cleaning up...");
                break;
            }
        }
    }

    client.shutdown();
    Ok(())
}
