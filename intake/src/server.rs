use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::endpoints::VisitReply;
use crate::geoip::{CachedGeoIp, GeoIpLookup, IpApiClient};
use crate::health::{ComponentStatus, HealthHandle, HealthRegistry};
use crate::jobs::{VisitorQueue, VisitorWorker};
use crate::router;
use crate::store::{MemoryStore, MongoStore, Store};
use crate::time::SystemTime;

const STORE_PING_INTERVAL: Duration = Duration::from_secs(10);

async fn store_liveness_loop(store: Arc<dyn Store + Send + Sync>, handle: HealthHandle) {
    let mut interval = tokio::time::interval(STORE_PING_INTERVAL);
    loop {
        interval.tick().await;
        match store.ping().await {
            Ok(()) => handle.report_healthy(),
            Err(err) => {
                warn!("document store ping failed: {}", err);
                handle.report_status(ComponentStatus::Unhealthy);
            }
        }
    }
}

async fn create_store(
    config: &Config,
    liveness: &HealthRegistry,
) -> anyhow::Result<Arc<dyn Store + Send + Sync>> {
    if config.memory_store {
        warn!("MEMORY_STORE is enabled, records will be lost on restart");
        let store: Arc<dyn Store + Send + Sync> = Arc::new(MemoryStore::new());
        // Not meant for production, keep liveness failing
        liveness
            .register("memory_store", Duration::from_secs(30))
            .report_status(ComponentStatus::Unhealthy);
        return Ok(store);
    }

    let store: Arc<dyn Store + Send + Sync> = Arc::new(
        MongoStore::connect(&config.mongo_uri, &config.mongo_database)
            .await
            .context("failed to connect to mongodb")?,
    );
    let handle = liveness.register("document_store", STORE_PING_INTERVAL * 3);
    tokio::spawn(store_liveness_loop(store.clone(), handle));
    Ok(store)
}

fn create_geoip(config: &Config) -> anyhow::Result<Arc<dyn GeoIpLookup + Send + Sync>> {
    let client = IpApiClient::new(&config.geoip_url, config.geoip_timeout())
        .context("failed to build geo-ip http client")?;

    let lookup: Arc<dyn GeoIpLookup + Send + Sync> = match config.geoip_cache_ttl() {
        Some(ttl) => {
            info!(?ttl, "geo-ip lookups are cached");
            Arc::new(CachedGeoIp::new(client, config.geoip_cache_capacity, ttl))
        }
        None => Arc::new(client),
    };
    Ok(lookup)
}

/// Runs until `shutdown` resolves, then lets the visitor worker drain.
pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    config.validate().map_err(anyhow::Error::msg)?;
    let reply = VisitReply::from_config(&config)?;

    info!(
        response_mode = ?config.response_mode,
        memory_store = config.memory_store,
        "starting intake"
    );

    let liveness = HealthRegistry::new("liveness");
    let store = create_store(&config, &liveness).await?;
    let geoip = create_geoip(&config)?;

    let (visitors, jobs) = VisitorQueue::new(config.visitor_queue_capacity);
    let worker = VisitorWorker::new(
        jobs,
        geoip,
        store.clone(),
        Arc::new(SystemTime {}),
        config.visitor_max_concurrent_jobs,
        liveness.register("visitor_worker", Duration::from_secs(30)),
    );
    let worker_handle = tokio::spawn(worker.run());

    let app = router::router(
        SystemTime {},
        store,
        visitors,
        config.preview_agents(),
        reply,
        &config.public_dir,
        liveness,
        config.export_prometheus,
    )?;

    info!("listening on {:?}", listener.local_addr()?);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("server error")?;

    // The router held the last queue sender, the worker now drains and exits
    if let Err(err) = worker_handle.await {
        error!("visitor worker panicked: {}", err);
    }
    Ok(())
}
