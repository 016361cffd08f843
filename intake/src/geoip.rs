use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum GeoIpError {
    #[error("geo-ip request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("geo-ip service returned {0}")]
    Status(StatusCode),
    #[error("malformed geo-ip payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Location fields of an ip-api.com style payload. Every field is optional:
/// a `status: "fail"` answer simply carries none of them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoIpInfo {
    pub city: Option<String>,
    pub region_name: Option<String>,
    pub country: Option<String>,
    pub timezone: Option<String>,
    pub isp: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl GeoIpInfo {
    pub fn is_empty(&self) -> bool {
        *self == GeoIpInfo::default()
    }
}

/// Resolves an address to its location. Lookups never fail: any error
/// degrades to an empty [`GeoIpInfo`].
#[async_trait]
pub trait GeoIpLookup {
    async fn lookup(&self, ip: &str) -> GeoIpInfo;
}

pub fn build_http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(concat!("invite-intake/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
}

pub struct IpApiClient {
    client: Client,
    base_url: String,
}

impl IpApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn fetch(&self, ip: &str) -> Result<GeoIpInfo, GeoIpError> {
        let url = format!("{}/{}", self.base_url, ip);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeoIpError::Status(status));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl GeoIpLookup for IpApiClient {
    async fn lookup(&self, ip: &str) -> GeoIpInfo {
        let start = Instant::now();
        let result = self.fetch(ip).await;
        metrics::histogram!("intake_geoip_lookup_seconds").record(start.elapsed().as_secs_f64());

        match result {
            Ok(info) => {
                metrics::counter!("intake_geoip_lookups_total", "outcome" => "ok").increment(1);
                info
            }
            Err(err) => {
                metrics::counter!("intake_geoip_lookups_total", "outcome" => "error").increment(1);
                warn!(ip, "geo-ip lookup failed, continuing without location: {}", err);
                GeoIpInfo::default()
            }
        }
    }
}

/// Per-address memo in front of another lookup. Empty answers are not kept,
/// so a transient failure is retried by the next visit.
pub struct CachedGeoIp<L> {
    inner: L,
    cache: Cache<String, GeoIpInfo>,
}

impl<L> CachedGeoIp<L> {
    pub fn new(inner: L, max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(max_capacity)
            .build();

        Self { inner, cache }
    }
}

#[async_trait]
impl<L> GeoIpLookup for CachedGeoIp<L>
where
    L: GeoIpLookup + Send + Sync,
{
    async fn lookup(&self, ip: &str) -> GeoIpInfo {
        if let Some(info) = self.cache.get(ip).await {
            debug!(ip, "geo-ip cache hit");
            metrics::counter!("intake_geoip_lookups_total", "outcome" => "cached").increment(1);
            return info;
        }

        let info = self.inner.lookup(ip).await;
        if !info.is_empty() {
            self.cache.insert(ip.to_string(), info.clone()).await;
        }
        info
    }
}
