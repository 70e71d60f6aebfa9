//! Sniper types

use crate::listing::{ListingId, TrackedListing};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of placing one bid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidOutcome {
    pub won: bool,
    pub failure_reason: Option<String>,
}

impl BidOutcome {
    pub fn won() -> Self {
        Self {
            won: true,
            failure_reason: None,
        }
    }

    pub fn lost(reason: impl Into<String>) -> Self {
        Self {
            won: false,
            failure_reason: Some(reason.into()),
        }
    }
}

/// Reasons a bid is never placed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BidError {
    /// Current price already at or above the user's maximum
    #[error("Current price {current} is at or above maximum {max}")]
    AboveMaximum { current: Decimal, max: Decimal },
    /// Close time already passed
    #[error("Auction ended before snipe")]
    Ended,
}

/// Work out the snipe amount: one increment over the current price, capped
/// at the maximum. The result never exceeds `max_price`.
pub fn plan_bid(
    listing: &TrackedListing,
    increment: Decimal,
    now: DateTime<Utc>,
) -> Result<Decimal, BidError> {
    if listing.has_ended(now) {
        return Err(BidError::Ended);
    }
    if listing.current_price >= listing.max_price {
        return Err(BidError::AboveMaximum {
            current: listing.current_price,
            max: listing.max_price,
        });
    }
    Ok((listing.current_price + increment.max(Decimal::ZERO)).min(listing.max_price))
}

/// Notifications raised by the snipe loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SniperEvent {
    BidPlaced {
        listing_id: ListingId,
        title: String,
        amount: Decimal,
    },
    Won {
        listing_id: ListingId,
        title: String,
        amount: Decimal,
    },
    Lost {
        listing_id: ListingId,
        title: String,
        reason: String,
    },
    Error {
        listing_id: ListingId,
        title: String,
        reason: String,
    },
    Refreshed {
        listing_id: ListingId,
        title: String,
        price: Decimal,
    },
    RefreshFailed {
        listing_id: ListingId,
        title: String,
        reason: String,
    },
}

impl SniperEvent {
    pub fn listing_id(&self) -> ListingId {
        match self {
            Self::BidPlaced { listing_id, .. }
            | Self::Won { listing_id, .. }
            | Self::Lost { listing_id, .. }
            | Self::Error { listing_id, .. }
            | Self::Refreshed { listing_id, .. }
            | Self::RefreshFailed { listing_id, .. } => *listing_id,
        }
    }
}

impl std::fmt::Display for SniperEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BidPlaced { title, amount, .. } => write!(f, "Bid {amount} placed on \"{title}\""),
            Self::Won { title, amount, .. } => write!(f, "Won \"{title}\" at {amount}"),
            Self::Lost { title, reason, .. } => write!(f, "Lost \"{title}\": {reason}"),
            Self::Error { title, reason, .. } => write!(f, "Error on \"{title}\": {reason}"),
            Self::Refreshed { title, price, .. } => write!(f, "\"{title}\" now at {price}"),
            Self::RefreshFailed { title, reason, .. } => {
                write!(f, "Could not refresh \"{title}\": {reason}")
            }
        }
    }
}
