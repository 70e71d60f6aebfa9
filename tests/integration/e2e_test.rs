//! End-to-end integration tests

use bid_sniper::app::App;
use bid_sniper::cli::load_watchlist;
use bid_sniper::config::{Config, LogFormat};
use bid_sniper::listing::ListingStatus;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use serde_json::json;
use std::path::Path;
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn test_config_example_loads() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    assert_eq!(config.sniper.tick_interval_ms, 1000);
    assert_eq!(config.sniper.snipe_threshold_secs, 5);
    assert_eq!(config.sniper.bid_increment, dec!(0.50));
    assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
    assert!(config.scrape.api_key.is_none());
}

#[test]
fn test_watchlist_example_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("watchlist.toml.example");
    let entries = load_watchlist(&path).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].max_price, dec!(45.00));
}

#[test]
fn test_config_round_trips_through_toml() {
    let config = Config::default();
    let text = toml::to_string_pretty(&config).unwrap();
    let back: Config = toml::from_str(&text).unwrap();
    assert_eq!(back.scrape.base_url, config.scrape.base_url);
    assert_eq!(back.sniper.refresh_interval_secs, 60);
}

#[tokio::test]
async fn test_add_and_snipe_through_scrape_api() {
    let server = MockServer::start().await;
    let end = Utc::now() + Duration::seconds(3);
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "json": {
                    "title": "Tin toy robot",
                    "current_price": 20,
                    "currency": "USD",
                    "end_time": end.to_rfc3339()
                }
            }
        })))
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.scrape.base_url = server.uri();
    config.scrape.api_key = Some("test-key".to_string());
    config.scrape.proxy_url = None;
    config.sniper.tick_interval_ms = 20;
    config.sniper.success_probability = 1.0;

    let (app, mut events) = App::new(&config).unwrap();
    let listing = app
        .add_listing("https://www.ebay.com/itm/123456789012?_trkparms=abc", dec!(35))
        .await
        .unwrap();
    assert_eq!(listing.url, "https://www.ebay.com/itm/123456789012");
    assert_eq!(listing.current_price, dec!(20));

    // Same listing again is a duplicate while it is still active
    assert!(app
        .add_listing("https://www.ebay.com/itm/123456789012", dec!(35))
        .await
        .is_err());

    let (_shutdown_tx, shutdown) = watch::channel(false);
    tokio::time::timeout(std::time::Duration::from_secs(10), app.scheduler().run(shutdown))
        .await
        .expect("snipe loop should finish")
        .unwrap();

    let after = app.book().get(listing.id).await.unwrap();
    assert_eq!(after.status, ListingStatus::Won);

    let history = app.book().history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].amount, dec!(20.50));
    assert!(history[0].success);

    let dashboard = app.dashboard().await;
    assert_eq!(dashboard.counts.won, 1);
    assert!(events.try_recv().is_ok());
}

#[tokio::test]
async fn test_unreachable_listing_is_not_added() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(402).set_body_string("payment required"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.scrape.base_url = server.uri();
    config.scrape.api_key = Some("test-key".to_string());
    config.scrape.proxy_url = None;

    let (app, _events) = App::new(&config).unwrap();
    let result = app
        .add_listing(&format!("{}/itm/55", server.uri()), dec!(10))
        .await;
    assert!(result.is_err());
    assert!(app.book().list().await.is_empty());
}
