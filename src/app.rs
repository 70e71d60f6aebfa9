//! Application wiring

use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::extract::{Extractor, SnapshotSource};
use crate::listing::{ListingBook, TrackedListing};
use crate::sniper::{BidExecutor, SimulatedBidder, SniperEvent, SnipeScheduler};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::mpsc;

const EVENT_BUFFER: usize = 256;

/// Extraction chain, listing book and snipe loop wired together
pub struct App {
    source: Arc<dyn SnapshotSource>,
    book: ListingBook,
    scheduler: Arc<SnipeScheduler>,
}

impl App {
    /// Build the production stack from configuration
    pub fn new(config: &Config) -> anyhow::Result<(Self, mpsc::Receiver<SniperEvent>)> {
        let extractor = Extractor::from_config(&config.scrape)?;
        let bidder = SimulatedBidder::new(config.sniper.success_probability);
        Ok(Self::with_parts(config, Arc::new(extractor), Arc::new(bidder)))
    }

    /// Build around a custom snapshot source and bidder
    pub fn with_parts(
        config: &Config,
        source: Arc<dyn SnapshotSource>,
        bidder: Arc<dyn BidExecutor>,
    ) -> (Self, mpsc::Receiver<SniperEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let book = ListingBook::new();
        let scheduler = SnipeScheduler::new(book.clone(), bidder, config.sniper.clone())
            .with_source(Arc::clone(&source))
            .with_events(tx);
        let app = Self {
            source,
            book,
            scheduler: Arc::new(scheduler),
        };
        (app, rx)
    }

    /// Extract a listing and start tracking it. Nothing is added when
    /// extraction fails.
    pub async fn add_listing(&self, url: &str, max_price: Decimal) -> anyhow::Result<TrackedListing> {
        if max_price <= Decimal::ZERO {
            anyhow::bail!("Maximum price must be positive, got {max_price}");
        }
        let snapshot = self.source.snapshot(url).await?;
        let listing = self.book.add(url, max_price, snapshot).await?;
        Ok(listing)
    }

    pub fn book(&self) -> &ListingBook {
        &self.book
    }

    pub fn scheduler(&self) -> Arc<SnipeScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub async fn dashboard(&self) -> Dashboard {
        Dashboard::build(&self.book.list().await, Utc::now())
    }
}
