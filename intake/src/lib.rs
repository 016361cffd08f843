pub mod api;
pub mod classifier;
pub mod config;
pub mod endpoints;
pub mod geoip;
pub mod health;
pub mod jobs;
pub mod prometheus;
pub mod router;
pub mod server;
pub mod store;
pub mod time;
pub mod user_agent;
pub mod visitor;
