//! Configuration types for bid-sniper

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Environment variable consulted when `scrape.api_key` is not set
pub const API_KEY_ENV: &str = "SCRAPE_API_KEY";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub sniper: SniperConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Third-party scrape API and fetch fallbacks
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScrapeConfig {
    /// Base URL of the scrape API
    #[serde(default = "default_scrape_base_url")]
    pub base_url: String,

    /// API key; falls back to `SCRAPE_API_KEY` when absent
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Prefix prepended to the listing URL by the proxy bypass strategy
    #[serde(default = "default_proxy_url")]
    pub proxy_url: Option<String>,

    /// Prices above this are treated as parse noise
    #[serde(default = "default_max_plausible_price")]
    pub max_plausible_price: Decimal,
}

fn default_scrape_base_url() -> String {
    "https://api.firecrawl.dev".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_proxy_url() -> Option<String> {
    Some("https://api.allorigins.win/raw?url=".to_string())
}
fn default_max_plausible_price() -> Decimal {
    Decimal::new(1_000_000, 0)
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: default_scrape_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            proxy_url: default_proxy_url(),
            max_plausible_price: default_max_plausible_price(),
        }
    }
}

impl ScrapeConfig {
    /// API key from config, or from the environment
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }
}

/// Snipe loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SniperConfig {
    /// Poll interval of the snipe loop (milliseconds)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Fire the bid once this many seconds (or fewer) remain
    #[serde(default = "default_snipe_threshold_secs")]
    pub snipe_threshold_secs: u64,

    /// Re-extract monitored listings older than this (seconds, 0 disables)
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Amount added on top of the current price when bidding
    #[serde(default = "default_bid_increment")]
    pub bid_increment: Decimal,

    /// Probability that a simulated bid wins
    #[serde(default = "default_success_probability")]
    pub success_probability: f64,

    /// Stop the loop once no listing is left to watch
    #[serde(default = "default_true")]
    pub stop_when_idle: bool,
}

fn default_tick_interval_ms() -> u64 {
    1000
}
fn default_snipe_threshold_secs() -> u64 {
    5
}
fn default_refresh_interval_secs() -> u64 {
    60
}
fn default_bid_increment() -> Decimal {
    Decimal::new(50, 2) // 0.50
}
fn default_success_probability() -> f64 {
    0.5
}
fn default_true() -> bool {
    true
}

impl Default for SniperConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            snipe_threshold_secs: default_snipe_threshold_secs(),
            refresh_interval_secs: default_refresh_interval_secs(),
            bid_increment: default_bid_increment(),
            success_probability: default_success_probability(),
            stop_when_idle: true,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// JSON format for log aggregation
    Json,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus scrape port; no exporter when absent
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
