//! The extraction fallback chain

use super::parser::{self, end_after, parse_amount, parse_countdown, parse_timestamp};
use super::{
    item_id, normalize_url, AlternateUrl, AuctionSnapshot, DirectFetch, ExtractError,
    FetchStrategy, Fetched, PageScrape, ProxyBypass, ScrapeClient, SnapshotSource,
    StrategyFailure, StructuredApi, StructuredListing,
};
use crate::config::ScrapeConfig;
use crate::telemetry::{record_extract_attempt, record_latency, LatencyMetric};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// Runs fetch strategies in order until one yields a plausible price
pub struct Extractor {
    strategies: Vec<Box<dyn FetchStrategy>>,
    max_plausible_price: Decimal,
}

impl Extractor {
    /// Create an extractor over an explicit strategy list
    pub fn new(strategies: Vec<Box<dyn FetchStrategy>>, max_plausible_price: Decimal) -> Self {
        Self {
            strategies,
            max_plausible_price,
        }
    }

    /// Build the standard chain: structured API, page scrape, alternate
    /// URLs, proxy bypass, direct fetch. Scrape API strategies are left out
    /// when no API key is available.
    pub fn from_config(config: &ScrapeConfig) -> anyhow::Result<Self> {
        let client = Arc::new(ScrapeClient::new(config)?);
        let mut strategies: Vec<Box<dyn FetchStrategy>> = Vec::new();

        if client.has_api_key() {
            strategies.push(Box::new(StructuredApi::new(client.clone())));
            strategies.push(Box::new(PageScrape::new(client.clone())));
            strategies.push(Box::new(AlternateUrl::new(client.clone())));
        } else {
            tracing::warn!("No scrape API key configured, using direct fetch strategies only");
        }
        if let Some(prefix) = config.proxy_url.as_deref().filter(|p| !p.is_empty()) {
            strategies.push(Box::new(ProxyBypass::new(client.clone(), prefix)));
        }
        strategies.push(Box::new(DirectFetch::new(client)));

        let extractor = Self::new(strategies, config.max_plausible_price);
        tracing::info!(strategies = ?extractor.strategy_names(), "Extraction chain ready");
        Ok(extractor)
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Extract a snapshot for a listing URL
    pub async fn extract(&self, raw_url: &str) -> Result<AuctionSnapshot, ExtractError> {
        let url = normalize_url(raw_url)?;
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            let name = strategy.name();
            let started = Instant::now();
            let result = match strategy.fetch(&url).await {
                Ok(fetched) => self.interpret(fetched, name, &url, Utc::now()),
                Err(e) => Err(e),
            };
            record_latency(LatencyMetric::Extraction, started.elapsed());

            match result {
                Ok(snapshot) => {
                    record_extract_attempt(name, true);
                    tracing::info!(
                        url = %url,
                        strategy = name,
                        price = %snapshot.current_price,
                        end_time = ?snapshot.end_time,
                        "Listing extracted"
                    );
                    return Ok(snapshot);
                }
                Err(e) => {
                    record_extract_attempt(name, false);
                    tracing::warn!(url = %url, strategy = name, error = %e, "Extraction strategy failed");
                    failures.push(StrategyFailure {
                        strategy: name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(ExtractError::AllFailed(failures))
    }

    fn interpret(
        &self,
        fetched: Fetched,
        source: &str,
        url: &Url,
        now: DateTime<Utc>,
    ) -> Result<AuctionSnapshot, ExtractError> {
        let mut snapshot = match fetched {
            Fetched::Structured(listing) => {
                structured_snapshot(&listing, self.max_plausible_price, now, source)
            }
            Fetched::Pages(bodies) => pages_snapshot(&bodies, self.max_plausible_price, now, source),
        }
        .ok_or(ExtractError::NoPrice)?;

        if snapshot.title.is_empty() {
            snapshot.title = fallback_title(url);
        }
        Ok(snapshot)
    }
}

#[async_trait]
impl SnapshotSource for Extractor {
    async fn snapshot(&self, url: &str) -> Result<AuctionSnapshot, ExtractError> {
        self.extract(url).await
    }
}

/// Snapshot from the first body with a plausible price; the other bodies
/// only fill in a missing title or end time
fn pages_snapshot(
    bodies: &[String],
    max_plausible: Decimal,
    now: DateTime<Utc>,
    source: &str,
) -> Option<AuctionSnapshot> {
    let (index, mut snapshot) = bodies
        .iter()
        .enumerate()
        .find_map(|(i, body)| parser::parse_snapshot(body, max_plausible, now, source).map(|s| (i, s)))?;

    for (_, body) in bodies.iter().enumerate().filter(|(i, _)| *i != index) {
        if snapshot.end_time.is_none() {
            snapshot.end_time = parser::extract_end_time(body, now);
        }
        if snapshot.title.is_empty() {
            snapshot.title = parser::extract_title(body).unwrap_or_default();
        }
    }
    Some(snapshot)
}

fn structured_snapshot(
    listing: &StructuredListing,
    max_plausible: Decimal,
    now: DateTime<Utc>,
    source: &str,
) -> Option<AuctionSnapshot> {
    let price = match listing.current_price.as_ref()? {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => parser::extract_price(s, max_plausible)
            .map(|m| m.amount)
            .or_else(|| parse_amount(s)),
        _ => None,
    }
    .filter(|p| *p > Decimal::ZERO && *p <= max_plausible)?;

    let end_time = listing
        .end_time
        .as_deref()
        .and_then(|s| {
            parse_timestamp(s).or_else(|| parse_countdown(s).and_then(|d| end_after(now, d)))
        })
        .or_else(|| {
            listing
                .time_left
                .as_deref()
                .and_then(parse_countdown)
                .and_then(|d| end_after(now, d))
        });

    let currency = listing
        .currency
        .as_deref()
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| c.len() == 3 && c.chars().all(|ch| ch.is_ascii_alphabetic()));

    Some(AuctionSnapshot {
        title: listing
            .title
            .as_deref()
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default(),
        current_price: price,
        currency,
        end_time,
        source: source.to_string(),
    })
}

/// Title used when the page gave none
fn fallback_title(url: &Url) -> String {
    if let Some(id) = item_id(url) {
        return format!("Item {id}");
    }
    url.path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()).map(str::to_string))
        .or_else(|| url.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}
