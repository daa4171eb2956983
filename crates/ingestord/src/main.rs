//! Process entrypoint: wires config, store, adapters, the ingestion service, the
//! scheduler, and the sync manager together, then blocks for a shutdown signal.
//!
//! Follows the teacher's worker-binary shutdown convention: `tokio::select!` over a
//! ctrl-c future and a SIGTERM listener, logging before a clean `exit(0)`; any
//! unrecoverable init failure is logged and exits non-zero (SPEC_FULL §10.E).

use anyhow::Context;
use ingestord_core::adapters::archive::ArchiveAdapter;
use ingestord_core::adapters::lifelog::LifelogAdapter;
use ingestord_core::adapters::news::NewsAdapter;
use ingestord_core::adapters::weather::WeatherAdapter;
use ingestord_core::adapters::SourceAdapter;
use ingestord_core::config::Config;
use ingestord_core::embedder::HttpEmbedder;
use ingestord_core::ingestion::IngestionService;
use ingestord_core::observability;
use ingestord_core::scheduler::Scheduler;
use ingestord_core::store::Store;
use ingestord_core::sync_manager::SyncManager;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("ingestord failed to start: {err:?}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = Config::from_env().context("failed to load configuration")?;
    let _observability_guard = observability::init(&config.observability).context("failed to initialize observability")?;

    info!(service = %config.observability.service_name, "starting ingestord");

    let store = Arc::new(Store::open(&config.store).await.context("failed to open store")?);
    let embedder = Arc::new(HttpEmbedder::new(config.embedder.clone()));
    let ingestion = Arc::new(IngestionService::new(Arc::clone(&store), embedder, &config));

    let scheduler = Arc::new(Scheduler::new(config.scheduler.tick_interval));
    let mut sync_manager = SyncManager::new(Arc::clone(&scheduler), Arc::clone(&ingestion), &config);

    if config.limitless.is_configured() {
        let adapter: Arc<dyn SourceAdapter> = Arc::new(LifelogAdapter::new(config.limitless.clone()));
        sync_manager.register_source(adapter, Duration::from_secs(config.limitless.sync_interval_secs));
    }
    if config.news.is_configured() {
        let adapter: Arc<dyn SourceAdapter> = Arc::new(NewsAdapter::new(config.news.clone(), Arc::clone(&store)));
        sync_manager.register_source(adapter, Duration::from_secs(config.news.sync_interval_secs));
    }
    if config.weather.is_configured() {
        let adapter: Arc<dyn SourceAdapter> = Arc::new(WeatherAdapter::new(config.weather.clone()));
        sync_manager.register_source(adapter, Duration::from_secs(config.weather.sync_interval_secs));
    }
    if config.twitter.is_configured() {
        let adapter: Arc<dyn SourceAdapter> = Arc::new(ArchiveAdapter::new(config.twitter.clone(), Arc::clone(&store)));
        sync_manager.register_source(adapter, Duration::ZERO);
    }

    let registered = sync_manager.start().await.context("failed to start sync manager")?;
    if registered.is_empty() {
        error!("no sources configured; ingestord has nothing to sync");
    }

    wait_for_shutdown().await;
    info!("shutdown signal received, exiting");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
