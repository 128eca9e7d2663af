//! Bid Models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bid placed on an auction (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub id: Uuid,
    pub auction_id: Uuid,
    pub user_id: Uuid,

    /// The visible bid amount.
    pub amount: i64,
    /// The bidder's private ceiling; `None` for a direct, non-proxy bid.
    pub max_bid: Option<i64>,
    /// Optional custom increment override for this bidder.
    pub auto_bid_step: Option<i64>,

    pub timestamp: DateTime<Utc>,

    pub is_winning: bool,
    /// True when the system (not the user) chose `amount`.
    pub is_proxy_bid: bool,

    pub is_retracted: bool,
    pub retracted_at: Option<DateTime<Utc>>,
    pub retraction_reason: Option<RetractionReason>,

    pub message: Option<String>,
    pub is_max_bid_reached: bool,
}

/// Bid presentation status, derived from the flags above (§3 Bid lifecycle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidStatus {
    Winning,
    Outbid,
    Retracted,
}

impl Bid {
    pub fn status(&self) -> BidStatus {
        if self.is_retracted {
            BidStatus::Retracted
        } else if self.is_winning {
            BidStatus::Winning
        } else {
            BidStatus::Outbid
        }
    }
}

/// Enumerated reasons a bidder may cite when retracting (§4.7 rule 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetractionReason {
    Typo,
    ItemDescriptionChanged,
    CannotContactSeller,
    Other,
}
