//! In-memory listing book

use super::{BidAttempt, ListingError, ListingId, ListingStatus, TrackedListing};
use crate::extract::{normalize_url, AuctionSnapshot};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct BookState {
    listings: HashMap<ListingId, TrackedListing>,
    attempts: Vec<BidAttempt>,
}

/// Shared store of tracked listings and bid attempts
#[derive(Clone, Default)]
pub struct ListingBook {
    state: Arc<RwLock<BookState>>,
}

impl ListingBook {
    /// Create an empty book
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a listing from its first snapshot
    pub async fn add(
        &self,
        url: &str,
        max_price: Decimal,
        snapshot: AuctionSnapshot,
    ) -> Result<TrackedListing, ListingError> {
        if max_price <= Decimal::ZERO {
            return Err(ListingError::NonPositiveMax(max_price));
        }
        let url = normalize_url(url)
            .map_err(|e| ListingError::InvalidUrl(e.to_string()))?
            .to_string();

        let mut state = self.state.write().await;
        let duplicate = state
            .listings
            .values()
            .any(|l| l.url == url && !l.status.is_terminal());
        if duplicate {
            return Err(ListingError::Duplicate(url));
        }

        let listing = TrackedListing::new(url, max_price, snapshot, Utc::now());
        tracing::info!(
            id = %listing.id,
            url = %listing.url,
            price = %listing.current_price,
            max = %listing.max_price,
            "Listing added"
        );
        state.listings.insert(listing.id, listing.clone());
        Ok(listing)
    }

    /// Stop tracking a listing
    pub async fn remove(&self, id: ListingId) -> Result<TrackedListing, ListingError> {
        let mut state = self.state.write().await;
        state
            .listings
            .remove(&id)
            .ok_or(ListingError::NotFound(id))
    }

    pub async fn get(&self, id: ListingId) -> Option<TrackedListing> {
        self.state.read().await.listings.get(&id).cloned()
    }

    /// All listings, soonest-ending first; unknown end times last. Ties go
    /// to the earliest added, then to the id, so the order is stable.
    pub async fn list(&self) -> Vec<TrackedListing> {
        let state = self.state.read().await;
        let mut listings: Vec<_> = state.listings.values().cloned().collect();
        listings.sort_by(|a, b| {
            let by_end = match (a.end_time, b.end_time) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            };
            by_end
                .then_with(|| a.added_at.cmp(&b.added_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        listings
    }

    /// Listings still waiting for their snipe
    pub async fn monitoring(&self) -> Vec<TrackedListing> {
        self.list()
            .await
            .into_iter()
            .filter(|l| l.status == ListingStatus::Monitoring)
            .collect()
    }

    pub async fn update_max_price(
        &self,
        id: ListingId,
        max_price: Decimal,
    ) -> Result<(), ListingError> {
        if max_price <= Decimal::ZERO {
            return Err(ListingError::NonPositiveMax(max_price));
        }
        let mut state = self.state.write().await;
        let listing = state
            .listings
            .get_mut(&id)
            .ok_or(ListingError::NotFound(id))?;
        listing.max_price = max_price;
        Ok(())
    }

    pub async fn set_status(
        &self,
        id: ListingId,
        status: ListingStatus,
        note: Option<String>,
    ) -> Result<(), ListingError> {
        let mut state = self.state.write().await;
        let listing = state
            .listings
            .get_mut(&id)
            .ok_or(ListingError::NotFound(id))?;
        tracing::debug!(%id, from = %listing.status, to = %status, "Listing status change");
        listing.status = status;
        if note.is_some() {
            listing.note = note;
        }
        Ok(())
    }

    /// Apply a refreshed snapshot to a listing
    pub async fn apply_snapshot(
        &self,
        id: ListingId,
        snapshot: AuctionSnapshot,
    ) -> Result<TrackedListing, ListingError> {
        let mut state = self.state.write().await;
        let listing = state
            .listings
            .get_mut(&id)
            .ok_or(ListingError::NotFound(id))?;
        listing.apply_snapshot(snapshot, Utc::now());
        Ok(listing.clone())
    }

    pub async fn record_attempt(&self, attempt: BidAttempt) {
        self.state.write().await.attempts.push(attempt);
    }

    /// Every bid attempt, newest first
    pub async fn history(&self) -> Vec<BidAttempt> {
        let state = self.state.read().await;
        state.attempts.iter().rev().cloned().collect()
    }

    pub async fn history_for(&self, id: ListingId) -> Vec<BidAttempt> {
        let state = self.state.read().await;
        state
            .attempts
            .iter()
            .rev()
            .filter(|a| a.listing_id == id)
            .cloned()
            .collect()
    }

    /// Number of listings not yet in a terminal status
    pub async fn active_count(&self) -> usize {
        let state = self.state.read().await;
        state
            .listings
            .values()
            .filter(|l| !l.status.is_terminal())
            .count()
    }
}
