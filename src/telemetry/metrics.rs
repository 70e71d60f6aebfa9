//! Prometheus metrics

use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// One extraction strategy attempt
    Extraction,
    /// Simulated bid placement
    BidPlacement,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Listings not yet won, lost or failed
    ActiveListings,
    /// Listings in total
    TrackedListings,
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let metric_name = match metric {
        LatencyMetric::Extraction => "sniper_extraction_latency_ms",
        LatencyMetric::BidPlacement => "sniper_bid_placement_latency_ms",
    };

    ::metrics::histogram!(metric_name).record(duration.as_secs_f64() * 1000.0);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let metric_name = match metric {
        GaugeMetric::ActiveListings => "sniper_active_listings",
        GaugeMetric::TrackedListings => "sniper_tracked_listings",
    };

    ::metrics::gauge!(metric_name).set(value);
}

/// Count one extraction strategy attempt
pub fn record_extract_attempt(strategy: &'static str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    ::metrics::counter!("sniper_extract_attempts_total", "strategy" => strategy, "outcome" => outcome)
        .increment(1);
}

/// Count one snipe by outcome (`won`, `lost`, `rejected`, `missed`, `error`)
pub fn record_bid(outcome: &'static str) {
    ::metrics::counter!("sniper_bids_total", "outcome" => outcome).increment(1);
}
