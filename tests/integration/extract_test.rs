//! Extraction chain integration tests against a mocked scrape service

use bid_sniper::config::ScrapeConfig;
use bid_sniper::extract::{
    AlternateUrl, DirectFetch, ExtractError, Extractor, FetchStrategy, Fetched, PageScrape,
    ProxyBypass, ScrapeClient, StructuredApi,
};
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING_URL: &str = "https://www.ebay.com/itm/123456789012";

fn client(server: &MockServer) -> Arc<ScrapeClient> {
    let config = ScrapeConfig {
        base_url: server.uri(),
        api_key: Some("test-key".to_string()),
        timeout_secs: 5,
        proxy_url: None,
        max_plausible_price: dec!(1000000),
    };
    Arc::new(ScrapeClient::new(&config).unwrap())
}

fn api_chain(server: &MockServer) -> Extractor {
    let client = client(server);
    let strategies: Vec<Box<dyn FetchStrategy>> = vec![
        Box::new(StructuredApi::new(client.clone())),
        Box::new(PageScrape::new(client)),
    ];
    Extractor::new(strategies, dec!(1000000))
}

#[tokio::test]
async fn test_structured_api_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({ "formats": ["json"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "json": {
                    "title": "Vintage Leica M3",
                    "current_price": 412.5,
                    "currency": "usd",
                    "end_time": "2030-01-01T12:00:00Z"
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = api_chain(&server).extract(LISTING_URL).await.unwrap();
    assert_eq!(snapshot.title, "Vintage Leica M3");
    assert_eq!(snapshot.current_price, dec!(412.5));
    assert_eq!(snapshot.currency.as_deref(), Some("USD"));
    assert!(snapshot.end_time.is_some());
    assert_eq!(snapshot.source, "structured_api");
}

#[tokio::test]
async fn test_falls_back_to_page_scrape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(body_partial_json(json!({ "formats": ["json"] })))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(body_partial_json(json!({ "formats": ["markdown", "html"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "markdown": "# Brass Pocket Watch\n\nCurrent bid: US $37.00\n\nEnds in 2h 10m",
                "metadata": { "title": "Brass Pocket Watch | eBay", "statusCode": 200 }
            }
        })))
        .mount(&server)
        .await;

    let snapshot = api_chain(&server).extract(LISTING_URL).await.unwrap();
    assert_eq!(snapshot.source, "page_scrape");
    assert_eq!(snapshot.title, "Brass Pocket Watch");
    assert_eq!(snapshot.current_price, dec!(37.00));
    assert!(snapshot.end_time.is_some());
}

#[tokio::test]
async fn test_api_reported_failure_falls_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "blocked by target"
        })))
        .mount(&server)
        .await;

    let err = api_chain(&server).extract(LISTING_URL).await.unwrap_err();
    match err {
        ExtractError::AllFailed(failures) => {
            assert_eq!(failures.len(), 2);
            assert_eq!(failures[0].strategy, "structured_api");
            assert!(failures[0].reason.contains("blocked by target"));
            assert_eq!(failures[1].strategy, "page_scrape");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_page_without_price_falls_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(body_partial_json(json!({ "formats": ["markdown", "html"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "markdown": "# Sign in\n\nPlease verify you are a human." }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/itm/42"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><title>Lot 42 | eBay</title></head>
               <body><span class="bid">Current bid: $18.25</span></body></html>"#,
        ))
        .mount(&server)
        .await;

    let client = client(&server);
    let strategies: Vec<Box<dyn FetchStrategy>> = vec![
        Box::new(PageScrape::new(client.clone())),
        Box::new(DirectFetch::new(client)),
    ];
    let extractor = Extractor::new(strategies, dec!(1000000));

    let snapshot = extractor
        .extract(&format!("{}/itm/42", server.uri()))
        .await
        .unwrap();
    assert_eq!(snapshot.source, "direct_fetch");
    assert_eq!(snapshot.title, "Lot 42");
    assert_eq!(snapshot.current_price, dec!(18.25));
}

#[tokio::test]
async fn test_proxy_bypass_encodes_target() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/raw"))
        .and(query_param("url", LISTING_URL))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "Antique Clock\nPrice: EUR 250,00\nTime left: 1d 3h",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let proxy = ProxyBypass::new(client(&server), format!("{}/raw?url=", server.uri()));
    let extractor = Extractor::new(vec![Box::new(proxy)], dec!(1000000));

    let snapshot = extractor.extract(LISTING_URL).await.unwrap();
    assert_eq!(snapshot.source, "proxy_bypass");
    assert_eq!(snapshot.current_price, dec!(250.00));
    assert!(snapshot.end_time.is_some());
}

#[tokio::test]
async fn test_http_error_body_is_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("x".repeat(1000)))
        .mount(&server)
        .await;

    let result = client(&server)
        .fetch_direct(&format!("{}/itm/1", server.uri()))
        .await;
    match result {
        Err(ExtractError::Http { status, body }) => {
            assert_eq!(status, 403);
            assert_eq!(body.len(), 200);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

const SLUG_URL: &str = "https://www.ebay.com/itm/vintage-camera/123456789012";
const CANONICAL_URL: &str = "https://www.ebay.com/itm/123456789012";
const MOBILE_URL: &str = "https://m.ebay.com/itm/123456789012";

fn page_response(markdown: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "data": { "markdown": markdown }
    }))
}

#[tokio::test]
async fn test_alternate_url_merges_canonical_and_mobile() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(body_partial_json(json!({ "url": CANONICAL_URL })))
        .respond_with(page_response("# Vintage Camera\n\nSign in to see the price"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(body_partial_json(json!({ "url": MOBILE_URL })))
        .respond_with(page_response("Current bid: $88.00\n\nEnds in 1h 5m"))
        .expect(1)
        .mount(&server)
        .await;

    let url = Url::parse(SLUG_URL).unwrap();
    match AlternateUrl::new(client(&server)).fetch(&url).await.unwrap() {
        Fetched::Pages(bodies) => {
            assert_eq!(bodies.len(), 2);
            assert!(bodies[0].contains("Vintage Camera"));
            assert!(bodies[1].contains("$88.00"));
        }
        other => panic!("unexpected fetch result: {other:?}"),
    }

    let extractor = Extractor::new(
        vec![Box::new(AlternateUrl::new(client(&server)))],
        dec!(1000000),
    );
    let snapshot = extractor.extract(SLUG_URL).await.unwrap();
    assert_eq!(snapshot.source, "alternate_url");
    assert_eq!(snapshot.current_price, dec!(88.00));
    // Title comes from the canonical page, price from the mobile one
    assert_eq!(snapshot.title, "Vintage Camera");
    assert!(snapshot.end_time.is_some());
}

#[tokio::test]
async fn test_alternate_url_survives_one_failed_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(body_partial_json(json!({ "url": CANONICAL_URL })))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream timeout"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(body_partial_json(json!({ "url": MOBILE_URL })))
        .respond_with(page_response("# Mobile Camera\n\nCurrent bid: $90.00"))
        .mount(&server)
        .await;

    let extractor = Extractor::new(
        vec![Box::new(AlternateUrl::new(client(&server)))],
        dec!(1000000),
    );
    let snapshot = extractor.extract(SLUG_URL).await.unwrap();
    assert_eq!(snapshot.current_price, dec!(90.00));
    assert_eq!(snapshot.title, "Mobile Camera");
}

#[tokio::test]
async fn test_alternate_url_reports_last_error_and_falls_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(body_partial_json(json!({ "url": CANONICAL_URL })))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream timeout"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(body_partial_json(json!({ "url": MOBILE_URL })))
        .respond_with(ResponseTemplate::new(503).set_body_string("mobile unavailable"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/itm/123456789012"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Current bid: $75.00"))
        .mount(&server)
        .await;

    let url = Url::parse(SLUG_URL).unwrap();
    match AlternateUrl::new(client(&server)).fetch(&url).await {
        Err(ExtractError::Http { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "mobile unavailable");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let client = client(&server);
    let strategies: Vec<Box<dyn FetchStrategy>> = vec![
        Box::new(AlternateUrl::new(client.clone())),
        Box::new(DirectFetch::new(client)),
    ];
    let extractor = Extractor::new(strategies, dec!(1000000));
    let snapshot = extractor
        .extract(&format!("{}/itm/123456789012", server.uri()))
        .await
        .unwrap();
    assert_eq!(snapshot.source, "direct_fetch");
    assert_eq!(snapshot.current_price, dec!(75.00));
}
