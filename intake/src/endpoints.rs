use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context};
use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use tracing::{instrument, warn, Span};

use crate::api::{HelloResponse, IntakeError, StatusResponse, VisitorsResponse};
use crate::classifier::classify;
use crate::config::{Config, ResponseMode};
use crate::jobs::{EnqueueError, VisitorJob};
use crate::prometheus::{report_dropped_job, report_rejected_visitor};
use crate::router;
use crate::visitor::{LeadForm, LeadRecord};

/// What an accepted visitor gets back. Classification and enrichment do not
/// depend on it, and building the reply cannot fail once a visit is queued.
#[derive(Clone, Debug, PartialEq)]
pub enum VisitReply {
    Json,
    /// Entry page contents, read once at startup.
    Page(Arc<str>),
    Redirect(String),
}

impl VisitReply {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        match config.response_mode {
            ResponseMode::Json => Ok(VisitReply::Json),
            ResponseMode::Page => {
                let path = config.index_page();
                let page = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read entry page {}", path.display()))?;
                Ok(VisitReply::Page(page.into()))
            }
            ResponseMode::Redirect => match config.redirect_url.as_deref() {
                Some(url) if !url.is_empty() => Ok(VisitReply::Redirect(url.to_string())),
                _ => bail!("REDIRECT_URL is required when RESPONSE_MODE=redirect"),
            },
        }
    }

    fn respond(&self) -> Response {
        match self {
            VisitReply::Json => Json(HelloResponse::hello()).into_response(),
            VisitReply::Page(page) => Html(page.to_string()).into_response(),
            VisitReply::Redirect(url) => {
                (StatusCode::FOUND, [(header::LOCATION, url.clone())]).into_response()
            }
        }
    }
}

/// Records a visit. The reply never waits for enrichment or storage.
#[instrument(skip_all, fields(ip, user_agent))]
pub async fn user(
    State(state): State<router::State>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Result<Response, IntakeError> {
    let remote = connect_info.map(|ConnectInfo(addr)| addr);
    let visit = classify(&headers, remote, &state.preview_agents).inspect_err(|err| {
        report_rejected_visitor(match err {
            IntakeError::ClientIpUnavailable => "no_client_ip",
            _ => "preview_agent",
        })
    })?;

    Span::current().record("ip", visit.ip.as_str());
    Span::current().record("user_agent", visit.user_agent.as_str());

    match state.visitors.enqueue(VisitorJob::from(visit)) {
        Ok(_ticket) => metrics::counter!("intake_visitors_accepted_total").increment(1),
        Err(EnqueueError::Full) => {
            report_dropped_job("queue_full");
            warn!("visitor queue full, dropping visit");
        }
        Err(EnqueueError::Closed) => return Err(IntakeError::QueueClosed),
    }

    Ok(state.reply.respond())
}

fn is_urlencoded(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"))
}

/// Saves a lead and only answers once the write has completed.
#[instrument(skip_all)]
pub async fn add_number(
    State(state): State<router::State>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<StatusResponse>, IntakeError> {
    let form = if is_urlencoded(&headers) {
        LeadForm::from_urlencoded(&body)?
    } else {
        LeadForm::from_json(&body)?
    };
    let (name, number) = form.into_fields()?;

    let lead = LeadRecord::new(name, number, state.timesource.current_time());
    state.store.insert_lead(lead).await?;
    metrics::counter!("intake_leads_saved_total").increment(1);

    Ok(Json(StatusResponse {
        success: true,
        message: String::from("Lead saved"),
    }))
}

/// Every stored visitor, newest first. An empty store is a 404.
pub async fn visitors(
    State(state): State<router::State>,
) -> Result<Json<VisitorsResponse>, IntakeError> {
    let visitors = state.store.list_visitors().await?;
    if visitors.is_empty() {
        return Err(IntakeError::NoVisitors);
    }

    Ok(Json(VisitorsResponse {
        success: true,
        visitors,
    }))
}
