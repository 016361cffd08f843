use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::http::HeaderMap;

use crate::api::IntakeError;

/// Link-preview and crawler signatures that must not be counted as visitors.
pub const DEFAULT_PREVIEW_AGENTS: [&str; 7] = [
    "WhatsApp",
    "facebookexternalhit",
    "Twitterbot",
    "TelegramBot",
    "Google-PageRenderer",
    "LinkedInBot",
    "Pinterest/0.2",
];

/// Headers set by load balancers and CDNs that carry a single client address.
const PLATFORM_IP_HEADERS: [&str; 6] = [
    "x-real-ip",
    "cf-connecting-ip",
    "true-client-ip",
    "x-client-ip",
    "fastly-client-ip",
    "x-cluster-client-ip",
];

pub const UNKNOWN_USER_AGENT: &str = "Unknown";

/// Immutable denylist of User-Agent substrings, built once at startup.
#[derive(Clone, Debug)]
pub struct PreviewAgents {
    agents: Arc<[String]>,
}

impl PreviewAgents {
    pub fn new<I, S>(agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            agents: agents.into_iter().map(Into::into).collect(),
        }
    }

    /// Default signatures plus a comma-delimited list of extra ones.
    pub fn with_extra(extra: Option<&str>) -> Self {
        let extra = extra
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|agent| !agent.is_empty())
            .map(str::to_string);

        Self::new(
            DEFAULT_PREVIEW_AGENTS
                .iter()
                .map(|agent| agent.to_string())
                .chain(extra),
        )
    }

    /// Case-sensitive, unanchored: returns the first signature the UA contains.
    pub fn matching(&self, user_agent: &str) -> Option<&str> {
        self.agents
            .iter()
            .find(|agent| user_agent.contains(agent.as_str()))
            .map(String::as_str)
    }
}

impl Default for PreviewAgents {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_AGENTS)
    }
}

/// An accepted request, ready to be enriched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub ip: String,
    pub user_agent: String,
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Forwarded-for chain first, then platform headers, then the socket peer.
/// A header that does not hold an IP address is skipped.
pub fn resolve_client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> Option<String> {
    let forwarded = header_value(headers, "x-forwarded-for").and_then(|chain| {
        chain
            .split(',')
            .map(str::trim)
            .find(|entry| !entry.is_empty())
            .and_then(|first| first.parse::<IpAddr>().ok())
    });

    forwarded
        .or_else(|| {
            PLATFORM_IP_HEADERS.iter().find_map(|name| {
                header_value(headers, name).and_then(|value| value.parse::<IpAddr>().ok())
            })
        })
        .or_else(|| remote.map(|addr| addr.ip()))
        .map(|ip| ip.to_string())
}

pub fn classify(
    headers: &HeaderMap,
    remote: Option<SocketAddr>,
    preview_agents: &PreviewAgents,
) -> Result<Visit, IntakeError> {
    let ip = resolve_client_ip(headers, remote).ok_or(IntakeError::ClientIpUnavailable)?;

    let user_agent = header_value(headers, "user-agent").unwrap_or(UNKNOWN_USER_AGENT);
    if let Some(agent) = preview_agents.matching(user_agent) {
        tracing::debug!(agent, "rejected preview request");
        return Err(IntakeError::PreviewAgent);
    }

    Ok(Visit {
        ip,
        user_agent: user_agent.to_string(),
    })
}
