#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use intake::classifier::PreviewAgents;
use intake::config::Config;
use intake::endpoints::VisitReply;
use intake::geoip::{GeoIpInfo, GeoIpLookup};
use intake::health::HealthRegistry;
use intake::jobs::{JobOutcome, VisitorQueue, VisitorWorker};
use intake::router::router;
use intake::store::MemoryStore;
use intake::time::TimeSource;

pub const FIXED_TIME: &str = "10/16/2026, 03:04:05 pm";

pub const BROWSER_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 18_3_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.3 Mobile/15E148 Safari/604.1";

#[derive(Clone)]
pub struct FixedTime;

impl TimeSource for FixedTime {
    fn current_time(&self) -> String {
        FIXED_TIME.to_string()
    }
}

#[derive(Default)]
pub struct StubGeoIp {
    calls: AtomicUsize,
    info: GeoIpInfo,
}

impl StubGeoIp {
    pub fn new(info: GeoIpInfo) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            info,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeoIpLookup for StubGeoIp {
    async fn lookup(&self, _ip: &str) -> GeoIpInfo {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.info.clone()
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
    pub liveness: HealthRegistry,
    outcomes: mpsc::UnboundedReceiver<JobOutcome>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(
            Arc::new(StubGeoIp::default()),
            MemoryStore::new(),
            VisitReply::Json,
        )
    }

    /// Router plus a running visitor worker, all in memory.
    pub fn build(
        geoip: Arc<dyn GeoIpLookup + Send + Sync>,
        store: MemoryStore,
        reply: VisitReply,
    ) -> Self {
        let liveness = HealthRegistry::new("liveness");
        let (visitors, jobs) = VisitorQueue::new(64);
        let (sender, outcomes) = mpsc::unbounded_channel();

        let worker = VisitorWorker::new(
            jobs,
            geoip,
            Arc::new(store.clone()),
            Arc::new(FixedTime),
            4,
            liveness.register("visitor_worker", Duration::from_secs(30)),
        )
        .with_outcomes(sender);
        tokio::spawn(worker.run());

        let router = router(
            FixedTime,
            Arc::new(store.clone()),
            visitors,
            PreviewAgents::default(),
            reply,
            &Config::default_for_test().public_dir,
            liveness.clone(),
            false,
        )
        .expect("failed to build router");

        Self {
            router,
            store,
            liveness,
            outcomes,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn visit(&self, ip: &str, user_agent: &str) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/api/user")
                .header("x-forwarded-for", ip)
                .header("user-agent", user_agent)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: &str) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_owned()))
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Waits for the worker to finish the next visitor job.
    pub async fn next_outcome(&mut self) -> JobOutcome {
        tokio::time::timeout(Duration::from_secs(5), self.outcomes.recv())
            .await
            .expect("timed out waiting for visitor job")
            .expect("visitor worker stopped")
    }

    pub async fn assert_no_outcome(&mut self) {
        let outcome = tokio::time::timeout(Duration::from_millis(100), self.outcomes.recv()).await;
        assert!(outcome.is_err(), "unexpected visitor job: {outcome:?}");
    }
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}
