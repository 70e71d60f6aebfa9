//! Fetch strategies of the extraction fallback chain

use super::{alternate_urls, ExtractError, ScrapeClient, StructuredListing};
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// What a strategy brought back
#[derive(Debug, Clone)]
pub enum Fetched {
    /// Fields already extracted by the scrape service
    Structured(StructuredListing),
    /// Raw page bodies for the regex parser, best candidate first
    Pages(Vec<String>),
}

/// One way of obtaining listing data
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Short name used in logs and metrics
    fn name(&self) -> &'static str;
    async fn fetch(&self, url: &Url) -> Result<Fetched, ExtractError>;
}

/// Schema-driven extraction through the scrape API
pub struct StructuredApi {
    client: Arc<ScrapeClient>,
}

impl StructuredApi {
    pub fn new(client: Arc<ScrapeClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchStrategy for StructuredApi {
    fn name(&self) -> &'static str {
        "structured_api"
    }

    async fn fetch(&self, url: &Url) -> Result<Fetched, ExtractError> {
        let listing = self.client.extract_structured(url.as_str()).await?;
        Ok(Fetched::Structured(listing))
    }
}

/// Markdown/HTML scrape of the listing page
pub struct PageScrape {
    client: Arc<ScrapeClient>,
}

impl PageScrape {
    pub fn new(client: Arc<ScrapeClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchStrategy for PageScrape {
    fn name(&self) -> &'static str {
        "page_scrape"
    }

    async fn fetch(&self, url: &Url) -> Result<Fetched, ExtractError> {
        let bodies = self.client.scrape(url.as_str()).await?.bodies();
        if bodies.is_empty() {
            return Err(ExtractError::EmptyBody);
        }
        Ok(Fetched::Pages(bodies))
    }
}

/// Scrape of the canonical and mobile forms of the listing URL
pub struct AlternateUrl {
    client: Arc<ScrapeClient>,
}

impl AlternateUrl {
    pub fn new(client: Arc<ScrapeClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchStrategy for AlternateUrl {
    fn name(&self) -> &'static str {
        "alternate_url"
    }

    async fn fetch(&self, url: &Url) -> Result<Fetched, ExtractError> {
        let alternates = alternate_urls(url);
        if alternates.is_empty() {
            return Err(ExtractError::InvalidUrl(format!(
                "no alternate form for {url}"
            )));
        }

        let mut bodies = Vec::new();
        let mut last_error = None;
        for alt in &alternates {
            match self.client.scrape(alt.as_str()).await {
                Ok(page) => bodies.extend(page.bodies()),
                Err(e) => {
                    tracing::debug!(url = %alt, error = %e, "Alternate URL scrape failed");
                    last_error = Some(e);
                }
            }
        }

        if bodies.is_empty() {
            return Err(last_error.unwrap_or(ExtractError::EmptyBody));
        }
        Ok(Fetched::Pages(bodies))
    }
}

/// Direct GET routed through a CORS/anti-bot proxy prefix
pub struct ProxyBypass {
    client: Arc<ScrapeClient>,
    proxy_prefix: String,
}

impl ProxyBypass {
    pub fn new(client: Arc<ScrapeClient>, proxy_prefix: impl Into<String>) -> Self {
        Self {
            client,
            proxy_prefix: proxy_prefix.into(),
        }
    }

    /// The proxied URL: the listing URL is percent-encoded into the prefix
    pub fn proxied(&self, url: &Url) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(url.as_str().as_bytes()).collect();
        format!("{}{}", self.proxy_prefix, encoded)
    }
}

#[async_trait]
impl FetchStrategy for ProxyBypass {
    fn name(&self) -> &'static str {
        "proxy_bypass"
    }

    async fn fetch(&self, url: &Url) -> Result<Fetched, ExtractError> {
        let body = self.client.fetch_direct(&self.proxied(url)).await?;
        Ok(Fetched::Pages(vec![body]))
    }
}

/// Plain GET of the listing page
pub struct DirectFetch {
    client: Arc<ScrapeClient>,
}

impl DirectFetch {
    pub fn new(client: Arc<ScrapeClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchStrategy for DirectFetch {
    fn name(&self) -> &'static str {
        "direct_fetch"
    }

    async fn fetch(&self, url: &Url) -> Result<Fetched, ExtractError> {
        let body = self.client.fetch_direct(url.as_str()).await?;
        Ok(Fetched::Pages(vec![body]))
    }
}
