//! geoip-server - IP geolocation over HTTP
//!
//! This is the composition root that wires together all the components.

use anyhow::Context;
use geoip_server::adapters::inbound::{ApiServer, ApiState};
use geoip_server::adapters::outbound::{FileRefreshSource, HttpRefreshSource, MaxMindOpener};
use geoip_server::application::{LookupDispatcher, RefreshScheduler};
use geoip_server::config::load_config;
use geoip_server::domain::entities::Generation;
use geoip_server::domain::ports::{DatabaseOpener, RefreshSource};
use geoip_server::infrastructure::{shutdown_signal, ResourceGuard, ShutdownController};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

/// How long the worker pool may take to finish queued lookups after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;
    cfg.validate()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting geoip-server listen={} db={} workers={}",
        cfg.listen_addr,
        cfg.db_path,
        cfg.workers
    );

    // ===== COMPOSITION ROOT =====

    // 1. Refresh source (optional)
    let source: Option<Arc<dyn RefreshSource>> = match (&cfg.update_url, &cfg.update_path) {
        (Some(url), _) => Some(Arc::new(HttpRefreshSource::new(url.clone())?)),
        (None, Some(path)) => Some(Arc::new(FileRefreshSource::new(path))),
        (None, None) => {
            tracing::info!("no refresh source configured, database will not be rotated");
            None
        }
    };

    // The startup file stands for whatever the source currently publishes
    let baseline = match &source {
        Some(source) => match source.latest_modified().await {
            Ok(modified) => Some(modified),
            Err(e) => {
                tracing::warn!("initial freshness check failed: {}", e);
                None
            }
        },
        None => None,
    };

    // 2. Startup database (fatal if unavailable)
    let opener: Arc<dyn DatabaseOpener> = Arc::new(MaxMindOpener);
    let handle = opener
        .open(Path::new(&cfg.db_path))
        .context("cannot serve without a GeoIP database")?;
    tracing::info!("GeoIP DB loaded from {}", cfg.db_path);

    let guard = Arc::new(ResourceGuard::new(
        handle,
        Generation::initial(&cfg.db_path, baseline),
    ));

    // 3. Worker pool
    let dispatcher = Arc::new(LookupDispatcher::start(
        guard.clone(),
        cfg.dispatcher_config(),
    )?);

    // 4. Shutdown wiring
    let shutdown = ShutdownController::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    // 5. Refresh scheduler
    let scheduler_task = match source {
        Some(source) => {
            let refresh = cfg.refresh_config();
            tokio::fs::create_dir_all(&refresh.data_dir)
                .await
                .with_context(|| format!("cannot create {}", refresh.data_dir.display()))?;
            let scheduler = Arc::new(RefreshScheduler::new(
                guard.clone(),
                source,
                opener,
                refresh,
            ));
            Some(scheduler.start(shutdown.clone()))
        }
        None => None,
    };

    // 6. Inbound adapter
    let server = ApiServer::new(
        cfg.listen_addr.clone(),
        ApiState::new(dispatcher.clone(), guard, shutdown.clone()),
    );
    let result = server.run().await;

    // ===== SHUTDOWN =====
    // axum has already drained open connections; stop the rest
    shutdown.shutdown();

    if let Some(task) = scheduler_task {
        if let Err(e) = task.await {
            tracing::error!("refresh scheduler task failed: {}", e);
        }
    }

    drop(server);
    match Arc::try_unwrap(dispatcher) {
        Ok(dispatcher) => {
            dispatcher.drain(DRAIN_TIMEOUT).await;
        }
        Err(_) => tracing::warn!("lookup dispatcher still referenced, skipping worker drain"),
    }

    result
}
