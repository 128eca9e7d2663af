//! Auction Models
//!
//! The auction entity and its lifecycle status, per §3 of the spec.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An auction listing.
///
/// All monetary fields are integer cents (I5: non-negative, <= 100_000_000).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub id: Uuid,
    pub title: String,
    pub description: String,

    pub starting_price: i64,
    pub current_price: i64,
    pub minimum_bid_increment: i64,
    pub reserve_price: Option<i64>,
    pub buy_now_price: Option<i64>,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub has_time_limit: bool,

    pub status: AuctionStatus,

    pub created_by: Uuid,
    pub winner_id: Option<Uuid>,
    pub bid_count: i32,
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last AUCTION_ENDING_SOON emission, for the scheduler's
    /// per-auction throttle (§4.8). Not part of the external contract.
    #[serde(skip)]
    pub last_ending_soon_emitted_at: Option<DateTime<Utc>>,
}

/// Auction lifecycle status (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuctionStatus {
    Pending,
    Active,
    Ended,
    Unsold,
}

impl AuctionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Unsold)
    }
}

/// Far-future sentinel end time used when `has_time_limit` is false and no
/// explicit end time was supplied at creation (§4.6: `start_time + 365 days`).
pub const NO_TIME_LIMIT_DURATION_DAYS: i64 = 365;

impl Auction {
    /// I3: reserve_met <=> (reserve_price == None || current_price >= reserve_price)
    pub fn reserve_met(&self) -> bool {
        match self.reserve_price {
            Some(reserve) => self.current_price >= reserve,
            None => true,
        }
    }

    /// §4.6 canAcceptBids: ACTIVE and now in [start_time, end_time).
    pub fn can_accept_bids(&self, now: DateTime<Utc>) -> bool {
        self.status == AuctionStatus::Active && now >= self.start_time && now < self.end_time
    }

    /// Minimum amount a new bid must reach to be accepted, given the ladder.
    pub fn minimum_next_bid(&self, increment: i64) -> i64 {
        self.current_price + increment
    }

    pub fn time_remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        (self.end_time - now).max(chrono::Duration::zero())
    }

    pub fn is_ending_soon(&self, now: DateTime<Utc>, threshold: chrono::Duration) -> bool {
        let remaining = self.end_time - now;
        remaining > chrono::Duration::zero() && remaining <= threshold
    }
}
