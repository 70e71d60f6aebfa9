//! Watch command implementation

use crate::app::App;
use crate::config::Config;
use crate::dashboard::format_history;
use crate::listing::{BidAttempt, ListingId};
use crate::sniper::SniperEvent;
use chrono::Utc;
use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::sync::watch;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Listing to snipe, as URL=MAX_PRICE (repeatable)
    #[arg(short, long = "listing", value_name = "URL=MAX")]
    pub listings: Vec<String>,

    /// TOML watchlist with [[listing]] entries
    #[arg(short, long)]
    pub watchlist: Option<PathBuf>,

    /// Write the bid history as JSON when the loop stops
    #[arg(long)]
    pub history_out: Option<PathBuf>,

    /// Seconds between dashboard refreshes on stdout
    #[arg(long, default_value = "10")]
    pub dashboard_secs: u64,
}

/// One watchlist entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WatchEntry {
    pub url: String,
    pub max_price: Decimal,
}

#[derive(Debug, Deserialize)]
struct Watchlist {
    #[serde(default, rename = "listing")]
    listings: Vec<WatchEntry>,
}

/// Parse `URL=MAX`. The split is on the last `=` so query strings survive.
pub fn parse_listing_arg(arg: &str) -> anyhow::Result<WatchEntry> {
    let (url, max) = arg
        .rsplit_once('=')
        .ok_or_else(|| anyhow::anyhow!("Expected URL=MAX, got {arg:?}"))?;
    let url = url.trim();
    if url.is_empty() {
        anyhow::bail!("Missing URL in {arg:?}");
    }
    let max_price = Decimal::from_str(max.trim())
        .map_err(|e| anyhow::anyhow!("Invalid maximum price {max:?}: {e}"))?;
    Ok(WatchEntry {
        url: url.to_string(),
        max_price,
    })
}

/// Load `[[listing]]` entries from a TOML file
pub fn load_watchlist(path: &Path) -> anyhow::Result<Vec<WatchEntry>> {
    let content = std::fs::read_to_string(path)?;
    let watchlist: Watchlist = toml::from_str(&content)?;
    Ok(watchlist.listings)
}

impl WatchArgs {
    fn entries(&self) -> anyhow::Result<Vec<WatchEntry>> {
        let mut entries = Vec::new();
        if let Some(path) = &self.watchlist {
            entries.extend(load_watchlist(path)?);
        }
        for arg in &self.listings {
            entries.push(parse_listing_arg(arg)?);
        }
        Ok(entries)
    }

    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let entries = self.entries()?;
        if entries.is_empty() {
            anyhow::bail!("Nothing to watch: pass --listing URL=MAX or --watchlist FILE");
        }

        let (app, mut events) = App::new(config)?;

        for entry in &entries {
            match app.add_listing(&entry.url, entry.max_price).await {
                Ok(listing) => println!(
                    "+ Tracking \"{}\" at {} (max {})",
                    listing.title, listing.current_price, listing.max_price
                ),
                Err(e) => {
                    tracing::warn!(url = %entry.url, error = %e, "Could not add listing");
                    println!("! Could not add {}: {e:#}", entry.url);
                }
            }
        }
        if app.book().active_count().await == 0 {
            anyhow::bail!("No listing could be added");
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut run = tokio::spawn(app.scheduler().run(shutdown_rx));
        let mut dashboard =
            tokio::time::interval(std::time::Duration::from_secs(self.dashboard_secs.max(1)));

        loop {
            tokio::select! {
                Some(event) = events.recv() => print_event(&event),
                _ = dashboard.tick() => print!("{}", app.dashboard().await.format_table()),
                result = &mut run => {
                    result??;
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received shutdown signal");
                    let _ = shutdown_tx.send(true);
                }
            }
        }
        while let Ok(event) = events.try_recv() {
            print_event(&event);
        }

        print!("{}", app.dashboard().await.format_table());

        let history = app.book().history().await;
        let titles: HashMap<ListingId, String> = app
            .book()
            .list()
            .await
            .into_iter()
            .map(|l| (l.id, l.title))
            .collect();
        println!("\nBid history");
        print!(
            "{}",
            format_history(&history, &|a: &BidAttempt| {
                titles.get(&a.listing_id).cloned().unwrap_or_default()
            })
        );

        if let Some(path) = &self.history_out {
            write_history(path, &history)?;
            println!("History written to {}", path.display());
        }

        Ok(())
    }
}

fn print_event(event: &SniperEvent) {
    let marker = match event {
        SniperEvent::Won { .. } => "✓",
        SniperEvent::Lost { .. } | SniperEvent::Error { .. } | SniperEvent::RefreshFailed { .. } => {
            "✗"
        }
        SniperEvent::BidPlaced { .. } | SniperEvent::Refreshed { .. } => "•",
    };
    println!("[{}] {marker} {event}", Utc::now().format("%H:%M:%S"));
}

fn write_history(path: &Path, history: &[BidAttempt]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(history)?;
    std::fs::write(path, json)?;
    Ok(())
}
