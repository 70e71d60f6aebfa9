//! Simulated bidder

use super::{BidExecutor, BidOutcome};
use crate::listing::TrackedListing;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::sync::Mutex;

/// Bidder that settles every bid with a weighted coin flip
pub struct SimulatedBidder {
    success_probability: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedBidder {
    /// Create a bidder seeded from OS entropy
    pub fn new(success_probability: f64) -> Self {
        Self::with_rng(success_probability, StdRng::from_entropy())
    }

    /// Create a deterministic bidder
    pub fn seeded(success_probability: f64, seed: u64) -> Self {
        Self::with_rng(success_probability, StdRng::seed_from_u64(seed))
    }

    fn with_rng(success_probability: f64, rng: StdRng) -> Self {
        let success_probability = if success_probability.is_finite() {
            success_probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            success_probability,
            rng: Mutex::new(rng),
        }
    }

    pub fn success_probability(&self) -> f64 {
        self.success_probability
    }
}

#[async_trait]
impl BidExecutor for SimulatedBidder {
    async fn place_bid(
        &self,
        listing: &TrackedListing,
        amount: Decimal,
    ) -> anyhow::Result<BidOutcome> {
        if amount > listing.max_price {
            anyhow::bail!("Bid {} exceeds maximum {}", amount, listing.max_price);
        }

        let won = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| anyhow::anyhow!("Bidder RNG lock poisoned"))?;
            rng.gen_bool(self.success_probability)
        };

        tracing::info!(id = %listing.id, %amount, won, "Simulated bid settled");
        if won {
            Ok(BidOutcome::won())
        } else {
            Ok(BidOutcome::lost("outbid"))
        }
    }
}
