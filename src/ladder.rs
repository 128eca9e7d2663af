//! Bid Ladder (C1)
//!
//! Pure table-driven function mapping current price to minimum increment
//! (§4.4). Bands are a sorted, non-overlapping, contiguous partition of
//! `[0, infinity)`; the last band extends to infinity.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderBand {
    pub lower_bound_cents: i64,
    pub increment_cents: i64,
}

/// The production ladder table of §4.4.
pub fn production_table() -> Vec<LadderBand> {
    vec![
        LadderBand { lower_bound_cents: 0, increment_cents: 5 },
        LadderBand { lower_bound_cents: 100, increment_cents: 25 },
        LadderBand { lower_bound_cents: 500, increment_cents: 50 },
        LadderBand { lower_bound_cents: 1_000, increment_cents: 100 },
        LadderBand { lower_bound_cents: 2_500, increment_cents: 250 },
        LadderBand { lower_bound_cents: 5_000, increment_cents: 500 },
        LadderBand { lower_bound_cents: 10_000, increment_cents: 1_000 },
        LadderBand { lower_bound_cents: 25_000, increment_cents: 2_500 },
        LadderBand { lower_bound_cents: 50_000, increment_cents: 5_000 },
        LadderBand { lower_bound_cents: 100_000, increment_cents: 10_000 },
        LadderBand { lower_bound_cents: 250_000, increment_cents: 25_000 },
        LadderBand { lower_bound_cents: 500_000, increment_cents: 50_000 },
    ]
}

/// A ladder bound to one table. Pure: the same `(table, price)` always
/// produces the same increment.
#[derive(Debug, Clone)]
pub struct Ladder {
    /// Invariant: sorted ascending by `lower_bound_cents`, first band's
    /// lower bound is 0.
    bands: Vec<LadderBand>,
}

impl Ladder {
    pub fn new(mut bands: Vec<LadderBand>) -> Self {
        bands.sort_by_key(|b| b.lower_bound_cents);
        Self { bands }
    }

    pub fn production() -> Self {
        Self::new(production_table())
    }

    /// The minimum increment applicable at `current_price`.
    pub fn increment(&self, current_price: i64) -> i64 {
        self.bands
            .iter()
            .rev()
            .find(|band| current_price >= band.lower_bound_cents)
            .map(|band| band.increment_cents)
            .unwrap_or_else(|| self.bands.first().map(|b| b.increment_cents).unwrap_or(0))
    }

    /// `minNextBid(price) = price + increment(price)` (§4.4).
    pub fn min_next_bid(&self, current_price: i64) -> i64 {
        current_price + self.increment(current_price)
    }
}
