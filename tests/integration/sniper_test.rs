//! Snipe loop integration tests

use async_trait::async_trait;
use bid_sniper::config::SniperConfig;
use bid_sniper::extract::{AuctionSnapshot, ExtractError, SnapshotSource};
use bid_sniper::listing::{ListingBook, ListingStatus, TrackedListing};
use bid_sniper::sniper::{BidExecutor, BidOutcome, SimulatedBidder, SniperEvent, SnipeScheduler};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

/// Bidder that records every amount it is asked to place
struct RecordingBidder {
    amounts: Mutex<Vec<Decimal>>,
    fail: bool,
}

impl RecordingBidder {
    fn new(fail: bool) -> Self {
        Self {
            amounts: Mutex::new(Vec::new()),
            fail,
        }
    }

    fn amounts(&self) -> Vec<Decimal> {
        self.amounts.lock().unwrap().clone()
    }
}

#[async_trait]
impl BidExecutor for RecordingBidder {
    async fn place_bid(&self, _listing: &TrackedListing, amount: Decimal) -> anyhow::Result<BidOutcome> {
        self.amounts.lock().unwrap().push(amount);
        if self.fail {
            anyhow::bail!("marketplace unavailable");
        }
        Ok(BidOutcome::won())
    }
}

/// Source whose price climbs by one on every call
struct ClimbingSource {
    calls: AtomicUsize,
}

#[async_trait]
impl SnapshotSource for ClimbingSource {
    async fn snapshot(&self, _url: &str) -> Result<AuctionSnapshot, ExtractError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) as i64;
        Ok(snapshot(Decimal::from(10 + n), None))
    }
}

fn config() -> SniperConfig {
    SniperConfig {
        tick_interval_ms: 20,
        snipe_threshold_secs: 5,
        refresh_interval_secs: 60,
        bid_increment: dec!(2.50),
        success_probability: 1.0,
        stop_when_idle: true,
    }
}

fn snapshot(price: Decimal, ends_in_secs: Option<i64>) -> AuctionSnapshot {
    AuctionSnapshot {
        title: "Tin toy robot".to_string(),
        current_price: price,
        currency: Some("USD".to_string()),
        end_time: ends_in_secs.map(|s| Utc::now() + Duration::seconds(s)),
        source: "test".to_string(),
    }
}

#[tokio::test]
async fn test_bids_never_exceed_maximum() {
    let bidder = Arc::new(RecordingBidder::new(false));
    let scheduler = SnipeScheduler::new(ListingBook::new(), bidder.clone(), config());

    let cases = [
        (dec!(10), dec!(100)),
        (dec!(99), dec!(100)),
        (dec!(49.90), dec!(50)),
        (dec!(60), dec!(50)),
    ];
    for (i, (price, max)) in cases.iter().enumerate() {
        scheduler
            .book()
            .add(
                &format!("https://www.ebay.com/itm/{}", 1000 + i),
                *max,
                snapshot(*price, Some(3)),
            )
            .await
            .unwrap();
    }

    let fired = scheduler.tick(Utc::now()).await.unwrap();
    assert_eq!(fired, 4);

    let mut amounts = bidder.amounts();
    amounts.sort();
    // The listing already above its maximum never reaches the bidder
    assert_eq!(amounts, vec![dec!(12.50), dec!(50), dec!(100)]);

    for attempt in scheduler.book().history().await {
        let listing = scheduler.book().get(attempt.listing_id).await.unwrap();
        assert!(attempt.amount <= listing.max_price);
    }
}

#[tokio::test]
async fn test_bidder_failure_marks_error() {
    let (tx, mut rx) = mpsc::channel(16);
    let scheduler = SnipeScheduler::new(
        ListingBook::new(),
        Arc::new(RecordingBidder::new(true)),
        config(),
    )
    .with_events(tx);
    let listing = scheduler
        .book()
        .add("https://www.ebay.com/itm/1", dec!(30), snapshot(dec!(10), Some(2)))
        .await
        .unwrap();

    scheduler.tick(Utc::now()).await.unwrap();

    let after = scheduler.book().get(listing.id).await.unwrap();
    assert_eq!(after.status, ListingStatus::Error);
    assert!(after.note.unwrap().contains("marketplace unavailable"));

    let history = scheduler.book().history_for(listing.id).await;
    assert_eq!(history.len(), 1);
    assert!(!history[0].success);

    assert!(matches!(rx.recv().await, Some(SniperEvent::BidPlaced { .. })));
    assert!(matches!(rx.recv().await, Some(SniperEvent::Error { .. })));
}

#[tokio::test]
async fn test_each_listing_sniped_once() {
    let bidder = Arc::new(RecordingBidder::new(false));
    let scheduler = SnipeScheduler::new(ListingBook::new(), bidder.clone(), config());
    scheduler
        .book()
        .add("https://www.ebay.com/itm/1", dec!(30), snapshot(dec!(10), Some(4)))
        .await
        .unwrap();

    let now = Utc::now();
    scheduler.tick(now).await.unwrap();
    scheduler.tick(now + Duration::seconds(1)).await.unwrap();
    scheduler.tick(now + Duration::seconds(2)).await.unwrap();

    assert_eq!(bidder.amounts().len(), 1);
    assert_eq!(scheduler.book().history().await.len(), 1);
}

#[tokio::test]
async fn test_refresh_feeds_new_price_into_bid() {
    let source = Arc::new(ClimbingSource {
        calls: AtomicUsize::new(0),
    });
    let bidder = Arc::new(RecordingBidder::new(false));
    let scheduler =
        SnipeScheduler::new(ListingBook::new(), bidder.clone(), config()).with_source(source);
    let listing = scheduler
        .book()
        .add("https://www.ebay.com/itm/1", dec!(30), snapshot(dec!(5), Some(600)))
        .await
        .unwrap();

    let later = Utc::now() + Duration::seconds(120);
    assert_eq!(scheduler.refresh(later).await, 1);
    assert_eq!(
        scheduler.book().get(listing.id).await.unwrap().current_price,
        dec!(10)
    );

    // Close enough to the end to snipe
    let near_end = listing.end_time.unwrap() - Duration::seconds(2);
    scheduler.tick(near_end).await.unwrap();
    assert_eq!(bidder.amounts(), vec![dec!(12.50)]);
}

#[tokio::test]
async fn test_run_completes_every_listing() {
    let (tx, mut rx) = mpsc::channel(64);
    let scheduler = Arc::new(
        SnipeScheduler::new(
            ListingBook::new(),
            Arc::new(SimulatedBidder::seeded(0.5, 99)),
            config(),
        )
        .with_events(tx),
    );
    for i in 0..3 {
        scheduler
            .book()
            .add(
                &format!("https://www.ebay.com/itm/{i}"),
                dec!(40),
                snapshot(dec!(10), Some(1 + i)),
            )
            .await
            .unwrap();
    }

    let (_shutdown_tx, shutdown) = watch::channel(false);
    tokio::time::timeout(
        std::time::Duration::from_secs(10),
        Arc::clone(&scheduler).run(shutdown),
    )
    .await
    .expect("loop should finish")
    .unwrap();

    let listings = scheduler.book().list().await;
    assert!(listings.iter().all(|l| l.status.is_terminal()));
    assert_eq!(scheduler.book().history().await.len(), 3);

    let mut finished = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, SniperEvent::Won { .. } | SniperEvent::Lost { .. }) {
            finished += 1;
        }
    }
    assert_eq!(finished, 3);
}
