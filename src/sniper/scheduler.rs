//! Snipe scheduling loop

use super::{plan_bid, BidExecutor, BidOutcome, SniperEvent};
use crate::config::SniperConfig;
use crate::extract::SnapshotSource;
use crate::listing::{
    BidAttempt, ListingBook, ListingError, ListingId, ListingStatus, TrackedListing,
};
use crate::telemetry::{record_bid, record_latency, set_gauge, GaugeMetric, LatencyMetric};
use chrono::{DateTime, Duration, Utc};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch, Mutex};

/// Polls the listing book on a fixed interval and fires a bid once a
/// listing's remaining time drops under the snipe threshold
pub struct SnipeScheduler {
    book: ListingBook,
    bidder: Arc<dyn BidExecutor>,
    source: Option<Arc<dyn SnapshotSource>>,
    config: SniperConfig,
    events: Option<mpsc::Sender<SniperEvent>>,
    /// Last refresh attempt per listing, successful or not
    refresh_attempts: Mutex<HashMap<ListingId, DateTime<Utc>>>,
    refreshing: AtomicBool,
}

impl SnipeScheduler {
    pub fn new(book: ListingBook, bidder: Arc<dyn BidExecutor>, config: SniperConfig) -> Self {
        Self {
            book,
            bidder,
            source: None,
            config,
            events: None,
            refresh_attempts: Mutex::new(HashMap::new()),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Re-extract monitored listings from this source
    pub fn with_source(mut self, source: Arc<dyn SnapshotSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Publish notifications on this channel
    pub fn with_events(mut self, events: mpsc::Sender<SniperEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn book(&self) -> &ListingBook {
        &self.book
    }

    fn threshold(&self) -> Duration {
        Duration::seconds(self.config.snipe_threshold_secs as i64)
    }

    /// One pass over monitored listings. Returns the number of snipes fired.
    pub async fn tick(&self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let threshold = self.threshold();
        let mut fired = 0;

        for listing in self.book.monitoring().await {
            let Some(remaining) = listing.time_remaining(now) else {
                continue;
            };

            if listing.has_ended(now) {
                let reason = "Auction ended before snipe".to_string();
                if let Err(e) = self
                    .book
                    .set_status(listing.id, ListingStatus::Lost, Some(reason.clone()))
                    .await
                {
                    tracing::warn!(id = %listing.id, error = %e, "Listing vanished before close");
                    continue;
                }
                record_bid("missed");
                tracing::warn!(id = %listing.id, title = %listing.title, "Auction ended before snipe");
                self.emit(SniperEvent::Lost {
                    listing_id: listing.id,
                    title: listing.title.clone(),
                    reason,
                });
                continue;
            }

            if remaining <= threshold {
                tracing::info!(
                    id = %listing.id,
                    remaining_secs = remaining.num_seconds(),
                    "Snipe window reached"
                );
                // A listing removed mid-pass is skipped; the pass carries on
                match self.snipe(&listing, now).await {
                    Ok(()) => fired += 1,
                    Err(e) => {
                        tracing::warn!(id = %listing.id, error = %e, "Snipe abandoned");
                    }
                }
            }
        }

        self.update_gauges().await;
        Ok(fired)
    }

    async fn snipe(&self, listing: &TrackedListing, now: DateTime<Utc>) -> Result<(), ListingError> {
        self.book
            .set_status(listing.id, ListingStatus::Bidding, None)
            .await?;

        let amount = match plan_bid(listing, self.config.bid_increment, now) {
            Ok(amount) => amount,
            Err(e) => {
                let reason = e.to_string();
                tracing::info!(id = %listing.id, reason = %reason, "Snipe skipped");
                self.book
                    .record_attempt(BidAttempt {
                        listing_id: listing.id,
                        amount: listing.max_price,
                        timestamp: now,
                        success: false,
                        failure_reason: Some(reason.clone()),
                    })
                    .await;
                self.book
                    .set_status(listing.id, ListingStatus::Lost, Some(reason.clone()))
                    .await?;
                record_bid("rejected");
                self.emit(SniperEvent::Lost {
                    listing_id: listing.id,
                    title: listing.title.clone(),
                    reason,
                });
                return Ok(());
            }
        };

        self.emit(SniperEvent::BidPlaced {
            listing_id: listing.id,
            title: listing.title.clone(),
            amount,
        });

        let started = Instant::now();
        let placed = self.bidder.place_bid(listing, amount).await;
        record_latency(LatencyMetric::BidPlacement, started.elapsed());

        match placed {
            Ok(BidOutcome {
                won,
                failure_reason,
            }) => {
                self.book
                    .record_attempt(BidAttempt {
                        listing_id: listing.id,
                        amount,
                        timestamp: Utc::now(),
                        success: won,
                        failure_reason: failure_reason.clone(),
                    })
                    .await;

                if won {
                    self.book
                        .set_status(listing.id, ListingStatus::Won, None)
                        .await?;
                    record_bid("won");
                    tracing::info!(id = %listing.id, %amount, "Snipe won");
                    self.emit(SniperEvent::Won {
                        listing_id: listing.id,
                        title: listing.title.clone(),
                        amount,
                    });
                } else {
                    let reason = failure_reason.unwrap_or_else(|| "outbid".to_string());
                    self.book
                        .set_status(listing.id, ListingStatus::Lost, Some(reason.clone()))
                        .await?;
                    record_bid("lost");
                    tracing::info!(id = %listing.id, %amount, reason = %reason, "Snipe lost");
                    self.emit(SniperEvent::Lost {
                        listing_id: listing.id,
                        title: listing.title.clone(),
                        reason,
                    });
                }
            }
            Err(e) => {
                let reason = e.to_string();
                self.book
                    .record_attempt(BidAttempt {
                        listing_id: listing.id,
                        amount,
                        timestamp: Utc::now(),
                        success: false,
                        failure_reason: Some(reason.clone()),
                    })
                    .await;
                self.book
                    .set_status(listing.id, ListingStatus::Error, Some(reason.clone()))
                    .await?;
                record_bid("error");
                tracing::error!(id = %listing.id, error = %reason, "Bid placement failed");
                self.emit(SniperEvent::Error {
                    listing_id: listing.id,
                    title: listing.title.clone(),
                    reason,
                });
            }
        }

        Ok(())
    }

    /// Re-extract monitored listings whose data is older than the refresh
    /// interval. Listings already inside the snipe window are left alone.
    /// Returns the number of listings updated.
    pub async fn refresh(&self, now: DateTime<Utc>) -> usize {
        let Some(source) = self.source.as_ref() else {
            return 0;
        };
        if self.config.refresh_interval_secs == 0 {
            return 0;
        }
        let interval = Duration::seconds(self.config.refresh_interval_secs as i64);
        let threshold = self.threshold();

        let due: Vec<TrackedListing> = {
            let mut attempts = self.refresh_attempts.lock().await;
            let due: Vec<TrackedListing> = self
                .book
                .monitoring()
                .await
                .into_iter()
                .filter(|l| {
                    let last = attempts
                        .get(&l.id)
                        .map_or(l.last_updated, |t| (*t).max(l.last_updated));
                    let outside_window = l.time_remaining(now).map_or(true, |r| r > threshold);
                    now - last >= interval && outside_window
                })
                .collect();
            for listing in &due {
                attempts.insert(listing.id, now);
            }
            due
        };
        if due.is_empty() {
            return 0;
        }

        tracing::debug!(count = due.len(), "Refreshing listings");
        let results = join_all(due.iter().map(|l| source.snapshot(&l.url))).await;

        let mut refreshed = 0;
        for (listing, result) in due.iter().zip(results) {
            match result {
                Ok(snapshot) => match self.book.apply_snapshot(listing.id, snapshot).await {
                    Ok(updated) => {
                        refreshed += 1;
                        if updated.current_price >= updated.max_price {
                            tracing::info!(
                                id = %updated.id,
                                price = %updated.current_price,
                                max = %updated.max_price,
                                "Price reached maximum"
                            );
                        }
                        self.emit(SniperEvent::Refreshed {
                            listing_id: updated.id,
                            title: updated.title.clone(),
                            price: updated.current_price,
                        });
                    }
                    // Removed while the fetch was in flight
                    Err(e) => tracing::debug!(error = %e, "Refreshed listing no longer tracked"),
                },
                Err(e) => {
                    tracing::warn!(id = %listing.id, error = %e, "Listing refresh failed");
                    self.emit(SniperEvent::RefreshFailed {
                        listing_id: listing.id,
                        title: listing.title.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        refreshed
    }

    /// Run the loop until `shutdown` flips to true, or until no active
    /// listing remains when `stop_when_idle` is set.
    ///
    /// Refreshes run as background tasks so a slow fetch never delays a
    /// snipe; at most one refresh pass is in flight.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let period = std::time::Duration::from_millis(self.config.tick_interval_ms.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(
            tick_ms = self.config.tick_interval_ms,
            threshold_secs = self.config.snipe_threshold_secs,
            "Snipe loop started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Utc::now();
                    self.spawn_refresh(now);

                    if let Err(e) = self.tick(now).await {
                        tracing::error!(error = %e, "Snipe tick failed");
                    }

                    if self.config.stop_when_idle && self.book.active_count().await == 0 {
                        tracing::info!("No active listings left, stopping snipe loop");
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Shutdown requested, stopping snipe loop");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    fn spawn_refresh(self: &Arc<Self>, now: DateTime<Utc>) {
        if self.source.is_none() || self.refreshing.swap(true, Ordering::SeqCst) {
            return;
        }
        let scheduler = Arc::clone(self);
        let pass = tokio::spawn(async move {
            let _flag = RefreshFlag(&scheduler.refreshing);
            scheduler.refresh(now).await
        });
        tokio::spawn(async move {
            if let Err(e) = pass.await {
                tracing::error!(error = %e, "Refresh pass aborted");
            }
        });
    }

    async fn update_gauges(&self) {
        let listings = self.book.list().await;
        let active = listings.iter().filter(|l| !l.status.is_terminal()).count();
        set_gauge(GaugeMetric::TrackedListings, listings.len() as f64);
        set_gauge(GaugeMetric::ActiveListings, active as f64);
    }

    fn emit(&self, event: SniperEvent) {
        if let Some(events) = &self.events {
            if let Err(e) = events.try_send(event) {
                tracing::debug!(error = %e, "Dropped sniper event");
            }
        }
    }
}

/// Clears the in-flight refresh flag when the pass ends, even by panic
struct RefreshFlag<'a>(&'a AtomicBool);

impl Drop for RefreshFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
