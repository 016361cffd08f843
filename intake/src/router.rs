use std::future::ready;
use std::path::Path;
use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::{SetResponseHeader, SetResponseHeaderLayer};
use tower_http::trace::TraceLayer;

use crate::classifier::PreviewAgents;
use crate::endpoints::{self, VisitReply};
use crate::health::HealthRegistry;
use crate::jobs::VisitorQueue;
use crate::prometheus::{setup_metrics_recorder, track_metrics};
use crate::store::Store;
use crate::time::TimeSource;

const STATIC_CACHE_CONTROL: &str = "public, max-age=86400";

#[derive(Clone)]
pub struct State {
    pub store: Arc<dyn Store + Send + Sync>,
    pub timesource: Arc<dyn TimeSource + Send + Sync>,
    pub visitors: VisitorQueue,
    pub preview_agents: PreviewAgents,
    pub reply: VisitReply,
}

type StaticFiles = SetResponseHeader<ServeDir<ServeFile>, HeaderValue>;

/// Static assets from `public_dir`; unknown paths get `index.html`.
fn static_files(public_dir: &Path) -> StaticFiles {
    let assets = ServeDir::new(public_dir).fallback(ServeFile::new(public_dir.join("index.html")));
    ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static(STATIC_CACHE_CONTROL),
        ))
        .service(assets)
}

#[allow(clippy::too_many_arguments)]
pub fn router<TZ>(
    timesource: TZ,
    store: Arc<dyn Store + Send + Sync>,
    visitors: VisitorQueue,
    preview_agents: PreviewAgents,
    reply: VisitReply,
    public_dir: &Path,
    liveness: HealthRegistry,
    metrics: bool,
) -> anyhow::Result<Router>
where
    TZ: TimeSource + Send + Sync + 'static,
{
    let state = State {
        store,
        timesource: Arc::new(timesource),
        visitors,
        preview_agents,
        reply,
    };

    let assets = static_files(public_dir);

    let status_router = Router::new()
        .route("/_readiness", get(|| ready(StatusCode::OK)))
        .route("/_liveness", get(move || ready(liveness.get_status())));

    // Other methods on the API paths get the entry page like any unknown path
    let api_router = Router::new()
        .route(
            "/api/user",
            post(endpoints::user).fallback_service(assets.clone()),
        )
        .route(
            "/api/add-number",
            post(endpoints::add_number).fallback_service(assets.clone()),
        )
        .route(
            "/api/visitors",
            post(endpoints::visitors).fallback_service(assets.clone()),
        )
        .with_state(state);

    let mut router = Router::new()
        .merge(status_router)
        .merge(api_router)
        .fallback_service(assets);

    // Don't install metrics unless asked to, installing a global recorder
    // twice fails and tests build many routers
    if metrics {
        let recorder_handle = setup_metrics_recorder()?;
        router = router.route("/metrics", get(move || ready(recorder_handle.render())));
    }

    Ok(router
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .layer(CompressionLayer::new()))
}
