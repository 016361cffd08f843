use std::path::PathBuf;
use std::time::Duration;

use envconfig::Envconfig;
use tracing::Level;

use crate::classifier::PreviewAgents;
use crate::jobs::MAX_CONCURRENT_JOBS;

/// How the visitor-intake endpoint answers once a visit has been accepted.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ResponseMode {
    Json,
    Page,
    Redirect,
}

impl std::str::FromStr for ResponseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_ref() {
            "json" => Ok(ResponseMode::Json),
            "page" => Ok(ResponseMode::Page),
            "redirect" => Ok(ResponseMode::Redirect),
            _ => Err(format!(
                "Unknown response mode: {s}, must be json, page or redirect"
            )),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_ref() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {s}, must be text or json")),
        }
    }
}

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "0.0.0.0")]
    pub bind_host: String,

    #[envconfig(default = "3002")]
    pub port: u16,

    #[envconfig(default = "mongodb://localhost:27017/invite")]
    pub mongo_uri: String,

    // Only used when MONGO_URI does not name a database
    #[envconfig(default = "invite")]
    pub mongo_database: String,

    // Local debugging only, records are lost on restart
    #[envconfig(default = "false")]
    pub memory_store: bool,

    #[envconfig(default = "json")]
    pub response_mode: ResponseMode,

    pub redirect_url: Option<String>,

    #[envconfig(default = "public")]
    pub public_dir: PathBuf,

    #[envconfig(default = "http://ip-api.com/json")]
    pub geoip_url: String,

    #[envconfig(default = "3000")]
    pub geoip_timeout_ms: u64,

    // 0 disables the lookup cache
    #[envconfig(default = "0")]
    pub geoip_cache_ttl_seconds: u64,

    #[envconfig(default = "10000")]
    pub geoip_cache_capacity: u64,

    #[envconfig(default = "1024")]
    pub visitor_queue_capacity: usize,

    #[envconfig(default = "32")]
    pub visitor_max_concurrent_jobs: usize,

    pub extra_preview_agents: Option<String>, // Comma-delimited substrings

    #[envconfig(default = "false")]
    pub export_prometheus: bool,

    #[envconfig(default = "info")]
    pub log_level: Level,

    #[envconfig(default = "text")]
    pub log_format: LogFormat,
}

impl Config {
    pub fn bind(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    pub fn geoip_timeout(&self) -> Duration {
        Duration::from_millis(self.geoip_timeout_ms)
    }

    pub fn geoip_cache_ttl(&self) -> Option<Duration> {
        match self.geoip_cache_ttl_seconds {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        }
    }

    pub fn preview_agents(&self) -> PreviewAgents {
        PreviewAgents::with_extra(self.extra_preview_agents.as_deref())
    }

    pub fn index_page(&self) -> PathBuf {
        self.public_dir.join("index.html")
    }

    /// Checks the combinations envconfig cannot express on its own.
    pub fn validate(&self) -> Result<(), String> {
        if self.response_mode == ResponseMode::Redirect
            && self.redirect_url.as_deref().map_or(true, str::is_empty)
        {
            return Err("REDIRECT_URL is required when RESPONSE_MODE=redirect".to_string());
        }
        if self.visitor_queue_capacity == 0 {
            return Err("VISITOR_QUEUE_CAPACITY must be greater than 0".to_string());
        }
        if self.visitor_max_concurrent_jobs == 0 {
            return Err("VISITOR_MAX_CONCURRENT_JOBS must be greater than 0".to_string());
        }
        if self.visitor_max_concurrent_jobs > MAX_CONCURRENT_JOBS {
            return Err(format!(
                "VISITOR_MAX_CONCURRENT_JOBS must be at most {MAX_CONCURRENT_JOBS}"
            ));
        }
        Ok(())
    }

    pub fn default_for_test() -> Self {
        Config {
            bind_host: "127.0.0.1".to_string(),
            port: 0,
            mongo_uri: "mongodb://localhost:27017/invite_test".to_string(),
            mongo_database: "invite_test".to_string(),
            memory_store: true,
            response_mode: ResponseMode::Json,
            redirect_url: None,
            public_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/public")),
            geoip_url: "http://127.0.0.1:9/json".to_string(),
            geoip_timeout_ms: 500,
            geoip_cache_ttl_seconds: 0,
            geoip_cache_capacity: 100,
            visitor_queue_capacity: 16,
            visitor_max_concurrent_jobs: 4,
            extra_preview_agents: None,
            export_prometheus: false,
            log_level: Level::INFO,
            log_format: LogFormat::Text,
        }
    }
}
