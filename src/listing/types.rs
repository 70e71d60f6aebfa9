//! Listing types

use crate::extract::AuctionSnapshot;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Listing identifier
pub type ListingId = Uuid;

/// Lifecycle of a tracked listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    /// Waiting for the snipe window
    Monitoring,
    /// Bid is being placed
    Bidding,
    /// Simulated bid won
    Won,
    /// Outbid, over the maximum, or ended before the snipe
    Lost,
    /// Listing could not be read
    Error,
}

impl ListingStatus {
    /// No further transitions happen from a terminal status
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Won | Self::Lost | Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monitoring => "monitoring",
            Self::Bidding => "bidding",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An auction listing the user asked us to watch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedListing {
    pub id: ListingId,
    /// Normalized listing URL
    pub url: String,
    pub title: String,
    pub current_price: Decimal,
    /// Highest amount the user is willing to bid
    pub max_price: Decimal,
    pub currency: Option<String>,
    /// Auction close; `None` when the page did not reveal it
    pub end_time: Option<DateTime<Utc>>,
    pub status: ListingStatus,
    /// Last time a snapshot was applied
    pub last_updated: DateTime<Utc>,
    pub added_at: DateTime<Utc>,
    /// Reason for an `Error` or `Lost` status
    pub note: Option<String>,
}

impl TrackedListing {
    /// Build a monitoring listing from a fresh snapshot
    pub fn new(
        url: String,
        max_price: Decimal,
        snapshot: AuctionSnapshot,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ListingId::new_v4(),
            url,
            title: snapshot.title,
            current_price: snapshot.current_price,
            max_price,
            currency: snapshot.currency,
            end_time: snapshot.end_time,
            status: ListingStatus::Monitoring,
            last_updated: now,
            added_at: now,
            note: None,
        }
    }

    /// Time left before the auction closes, clamped at zero
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.end_time
            .map(|end| (end - now).max(Duration::zero()))
    }

    /// Whether the close time has passed
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_time.is_some_and(|end| end <= now)
    }

    /// Merge a newer snapshot. Fields the snapshot could not determine keep
    /// their previous values.
    pub fn apply_snapshot(&mut self, snapshot: AuctionSnapshot, now: DateTime<Utc>) {
        if !snapshot.title.is_empty() {
            self.title = snapshot.title;
        }
        self.current_price = snapshot.current_price;
        if snapshot.currency.is_some() {
            self.currency = snapshot.currency;
        }
        if snapshot.end_time.is_some() {
            self.end_time = snapshot.end_time;
        }
        self.last_updated = now;
    }
}

/// Record of one simulated bid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidAttempt {
    pub listing_id: ListingId,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub failure_reason: Option<String>,
}

/// Listing book errors
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("Invalid listing URL: {0}")]
    InvalidUrl(String),
    #[error("Maximum price must be positive, got {0}")]
    NonPositiveMax(Decimal),
    #[error("Listing already tracked: {0}")]
    Duplicate(String),
    #[error("Unknown listing: {0}")]
    NotFound(ListingId),
}
