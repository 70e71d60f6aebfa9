//! Listing module
//!
//! Tracked auction listings and their bid history, held in memory for the
//! lifetime of the process.

mod book;
mod types;

pub use book::ListingBook;
pub use types::{BidAttempt, ListingError, ListingId, ListingStatus, TrackedListing};
