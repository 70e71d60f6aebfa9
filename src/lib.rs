//! bid-sniper: last-second bidding on online auction listings
//!
//! This library provides the core components for:
//! - Listing extraction through a fallback chain of fetch strategies
//! - Regex field parsing of unstructured listing pages
//! - In-memory tracking of listings and bid attempts
//! - A timed snipe loop with a simulated bidder
//! - Dashboard rendering and structured telemetry

pub mod app;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod extract;
pub mod listing;
pub mod sniper;
pub mod telemetry;
