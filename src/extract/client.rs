//! Scrape API client
//!
//! Talks to a Firecrawl-compatible scrape service: `POST /v1/scrape` returns
//! the page as markdown/HTML, or as JSON shaped by a schema when the `json`
//! format is requested. Direct GETs go out with a browser user agent.

use super::ExtractError;
use crate::config::ScrapeConfig;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Longest error body kept in an `ExtractError::Http`
const MAX_ERROR_BODY: usize = 200;

/// Page content returned by the scrape endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapedPage {
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub metadata: Option<PageMetadata>,
}

impl ScrapedPage {
    /// Every non-empty text body, markdown first
    pub fn bodies(&self) -> Vec<String> {
        let mut bodies: Vec<String> = [self.markdown.as_ref(), self.html.as_ref()]
            .into_iter()
            .flatten()
            .filter(|b| !b.trim().is_empty())
            .cloned()
            .collect();
        // The page title is only in metadata when the body lacks a heading
        if let (Some(first), Some(title)) = (
            bodies.first_mut(),
            self.metadata.as_ref().and_then(|m| m.title.as_ref()),
        ) {
            if !first.trim_start().starts_with('#') {
                *first = format!("# {title}\n\n{first}");
            }
        }
        bodies
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
}

/// Fields returned by schema-driven extraction. The service fills these
/// from its own model, so every field is optional and loosely typed.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct StructuredListing {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub current_price: Option<Value>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub time_left: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<ScrapeData>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    #[serde(flatten)]
    page: ScrapedPage,
    #[serde(default)]
    json: Option<StructuredListing>,
}

/// Client for the scrape API and for direct page fetches
pub struct ScrapeClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl ScrapeClient {
    /// Create a client from configuration
    pub fn new(config: &ScrapeConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(BROWSER_USER_AGENT)
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.resolved_api_key(),
            client,
        })
    }

    /// Whether scrape API strategies can run
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Scrape a page as markdown and HTML
    pub async fn scrape(&self, url: &str) -> Result<ScrapedPage, ExtractError> {
        let body = json!({
            "url": url,
            "formats": ["markdown", "html"],
            "onlyMainContent": false,
        });
        let data = self.post_scrape(body).await?;
        Ok(data.page)
    }

    /// Ask the scrape service to fill a listing schema for the page
    pub async fn extract_structured(&self, url: &str) -> Result<StructuredListing, ExtractError> {
        let body = json!({
            "url": url,
            "formats": ["json"],
            "jsonOptions": {
                "prompt": "Extract the auction listing title, the current bid or price, \
                           its currency code, the auction end time as ISO 8601, and the \
                           time left as shown on the page.",
                "schema": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "current_price": { "type": "number" },
                        "currency": { "type": "string" },
                        "end_time": { "type": "string" },
                        "time_left": { "type": "string" }
                    },
                    "required": ["current_price"]
                }
            }
        });
        let data = self.post_scrape(body).await?;
        data.json
            .ok_or_else(|| ExtractError::Api("response carried no json data".to_string()))
    }

    /// Plain GET of a URL, returning the body text
    pub async fn fetch_direct(&self, url: &str) -> Result<String, ExtractError> {
        tracing::debug!(url, "Direct fetch");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(http_error(status.as_u16(), &body));
        }
        if body.trim().is_empty() {
            return Err(ExtractError::EmptyBody);
        }
        Ok(body)
    }

    async fn post_scrape(&self, body: Value) -> Result<ScrapeData, ExtractError> {
        let api_key = self.api_key.as_ref().ok_or(ExtractError::MissingApiKey)?;
        let url = format!("{}/v1/scrape", self.base_url);

        tracing::debug!(url = %url, page = %body["url"], "Calling scrape API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(http_error(status, &text));
        }

        let parsed: ScrapeResponse = response.json().await?;
        if !parsed.success {
            return Err(ExtractError::Api(
                parsed.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        parsed.data.ok_or(ExtractError::EmptyBody)
    }
}

fn http_error(status: u16, body: &str) -> ExtractError {
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    ExtractError::Http { status, body }
}
