//! Snipe engine
//!
//! Watches tracked listings and places one bid per listing once its
//! remaining time falls inside the snipe threshold.

mod scheduler;
mod simulated;
mod types;

pub use scheduler::SnipeScheduler;
pub use simulated::SimulatedBidder;
pub use types::{plan_bid, BidError, BidOutcome, SniperEvent};

use crate::listing::TrackedListing;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Places bids on behalf of the user
#[async_trait]
pub trait BidExecutor: Send + Sync {
    /// Place a single bid of `amount`, never above `listing.max_price`
    async fn place_bid(&self, listing: &TrackedListing, amount: Decimal)
        -> anyhow::Result<BidOutcome>;
}
