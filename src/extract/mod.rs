//! Auction data extraction
//!
//! Reads a listing's title, current price and close time through a chain of
//! fetch strategies (structured scrape API, page scrape, alternate URL forms,
//! proxy bypass, direct fetch). Free-text responses go through the regex
//! field parser; the first strategy producing a plausible price wins.

mod chain;
mod client;
mod links;
pub mod parser;
mod strategy;

pub use chain::Extractor;
pub use client::{ScrapeClient, ScrapedPage, StructuredListing};
pub use links::{alternate_urls, item_id, normalize_url};
pub use strategy::{
    AlternateUrl, DirectFetch, FetchStrategy, Fetched, PageScrape, ProxyBypass, StructuredApi,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What one successful extraction learned about a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionSnapshot {
    pub title: String,
    pub current_price: Decimal,
    /// ISO 4217 code when detectable
    pub currency: Option<String>,
    pub end_time: Option<DateTime<Utc>>,
    /// Name of the strategy that produced the snapshot
    pub source: String,
}

/// One failed strategy in the fallback chain
#[derive(Debug, Clone)]
pub struct StrategyFailure {
    pub strategy: &'static str,
    pub reason: String,
}

/// Extraction errors
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Scrape API key not configured")]
    MissingApiKey,
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Scrape API reported failure: {0}")]
    Api(String),
    #[error("Empty response body")]
    EmptyBody,
    #[error("No plausible price found")]
    NoPrice,
    #[error("All extraction strategies failed: {}", describe_failures(.0))]
    AllFailed(Vec<StrategyFailure>),
}

fn describe_failures(failures: &[StrategyFailure]) -> String {
    if failures.is_empty() {
        return "no strategy configured".to_string();
    }
    failures
        .iter()
        .map(|f| format!("{}: {}", f.strategy, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Anything that can produce a fresh snapshot for a listing URL
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot(&self, url: &str) -> Result<AuctionSnapshot, ExtractError>;
}
